// On-chain account layout parsing against hand-built fixtures.

use solana_sdk::pubkey::Pubkey;

use alphavault::codec::{
    parse_handle, StealthNoteAccount, UserPositionAccount, VaultAccount, HANDLE_OFFSET,
    STEALTH_NOTE_LEN, USER_POSITION_LEN, VAULT_ACCOUNT_LEN,
};
use alphavault::VaultError;

fn vault_fixture(authority: &Pubkey, handle: u128, escrow: u64, yield_index: u128) -> Vec<u8> {
    let mut data = Vec::with_capacity(VAULT_ACCOUNT_LEN);
    data.extend_from_slice(&[0xAA; 8]);
    data.extend_from_slice(authority.as_ref());
    data.extend_from_slice(&handle.to_le_bytes());
    data.extend_from_slice(&escrow.to_le_bytes());
    data.extend_from_slice(&yield_index.to_le_bytes());
    data.push(254);
    data
}

fn note_fixture(note_id: [u8; 32], handle: u128, lamports: u64, sender: &Pubkey, claimed: bool) -> Vec<u8> {
    let mut data = Vec::with_capacity(STEALTH_NOTE_LEN);
    data.extend_from_slice(&[0x11; 8]);
    data.extend_from_slice(&note_id);
    data.extend_from_slice(&handle.to_le_bytes());
    data.extend_from_slice(&lamports.to_le_bytes());
    data.extend_from_slice(sender.as_ref());
    data.extend_from_slice(&1_700_000_000_i64.to_le_bytes());
    data.push(claimed as u8);
    data.push(253);
    data
}

#[test]
fn vault_account_parses_every_field() {
    let authority = Pubkey::new_unique();
    let data = vault_fixture(&authority, 0xDEAD_BEEF_CAFE, 42_000_000_000, 1_050_000);
    assert_eq!(data.len(), VAULT_ACCOUNT_LEN);

    let vault = VaultAccount::decode(&data).unwrap();
    assert_eq!(vault.authority, authority);
    assert_eq!(vault.handle, 0xDEAD_BEEF_CAFE);
    assert_eq!(vault.total_escrow_lamports, 42_000_000_000);
    assert_eq!(vault.yield_index, 1_050_000);
    assert_eq!(vault.bump, 254);
}

#[test]
fn handle_sits_at_the_common_offset_in_all_layouts() {
    let owner = Pubkey::new_unique();
    let handle = u128::MAX - 7;

    let vault = vault_fixture(&owner, handle, 0, 0);
    assert_eq!(parse_handle(&vault, HANDLE_OFFSET).unwrap(), handle);

    let mut position = Vec::with_capacity(USER_POSITION_LEN);
    position.extend_from_slice(&[0x22; 8]);
    position.extend_from_slice(owner.as_ref());
    position.extend_from_slice(&handle.to_le_bytes());
    position.extend_from_slice(&9_u128.to_le_bytes());
    position.push(255);
    assert_eq!(position.len(), USER_POSITION_LEN);
    assert_eq!(parse_handle(&position, HANDLE_OFFSET).unwrap(), handle);
    assert_eq!(UserPositionAccount::decode(&position).unwrap().handle, handle);

    let note = note_fixture([5; 32], handle, 1, &owner, false);
    assert_eq!(parse_handle(&note, HANDLE_OFFSET).unwrap(), handle);
}

#[test]
fn stealth_note_claimed_flag_roundtrips() {
    let sender = Pubkey::new_unique();
    let open = StealthNoteAccount::decode(&note_fixture([9; 32], 77, 500_000, &sender, false)).unwrap();
    assert!(!open.claimed);
    assert_eq!(open.lamports, 500_000);
    assert_eq!(open.sender, sender);
    assert_eq!(open.created_at, 1_700_000_000);

    let spent = StealthNoteAccount::decode(&note_fixture([9; 32], 77, 500_000, &sender, true)).unwrap();
    assert!(spent.claimed);
}

#[test]
fn decoding_is_idempotent() {
    let data = vault_fixture(&Pubkey::new_unique(), 123, 456, 789);
    let first = VaultAccount::decode(&data).unwrap();
    let second = VaultAccount::decode(&data).unwrap();
    assert_eq!(first, second);
}

#[test]
fn truncated_accounts_name_the_missing_field() {
    let data = vault_fixture(&Pubkey::new_unique(), 1, 2, 3);

    // Cut inside the escrow field.
    match VaultAccount::decode(&data[..60]) {
        Err(VaultError::Decode { field, .. }) => assert_eq!(field, "vault total escrow"),
        other => panic!("expected a decode error, got {other:?}"),
    }

    // Too short to even hold a handle.
    assert!(parse_handle(&data[..50], HANDLE_OFFSET).is_err());
}
