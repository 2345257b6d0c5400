//! Instruction assembly for the vault program. Account order is wire
//! contract: the program resolves accounts positionally, so every
//! builder here lists them in exactly the order the deployed program
//! expects, with the optional allowance pairs appended as trailing
//! accounts on the post-simulation ("real") variants only.

use sha2::{Digest, Sha256};
use solana_sdk::instruction::{AccountMeta, Instruction};
use solana_sdk::pubkey::Pubkey;
use solana_sdk::system_program;

use crate::codec::{encode_byte_vector, encode_u64_le};
use crate::config::Config;
use crate::error::VaultError;

/// One allowance authorization: the derived allowance PDA (writable)
/// followed by the address being granted decrypt rights (readonly).
#[derive(Debug, Clone, Copy)]
pub struct AllowancePair {
    pub allowance: Pubkey,
    pub allowed: Pubkey,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VaultInstruction {
    InitializeVault,
    Deposit,
    Withdraw,
    ApplyYield,
    Transfer,
    ClaimAccess,
    ClaimYield,
    CreateStealthNote,
    ClaimStealthNote,
}

/// Parsed program-side configuration: ids, seeds, and discriminators,
/// decoded once at client construction.
#[derive(Debug, Clone)]
pub struct ProgramContext {
    pub program_id: Pubkey,
    pub fhe_program_id: Pubkey,
    vault_seed: Vec<u8>,
    user_seed: Vec<u8>,
    note_seed: Vec<u8>,
    disc_initialize_vault: [u8; 8],
    disc_deposit: [u8; 8],
    disc_withdraw: [u8; 8],
    disc_apply_yield: [u8; 8],
    disc_transfer: [u8; 8],
    disc_claim_access: [u8; 8],
    disc_claim_yield: [u8; 8],
    disc_create_stealth_note: [u8; 8],
    disc_claim_stealth_note: [u8; 8],
}

fn parse_discriminator(hex_str: &str, name: &str) -> Result<[u8; 8], VaultError> {
    let bytes = hex::decode(hex_str).map_err(|e| {
        VaultError::Validation(format!("discriminator for `{name}` is not valid hex: {e}"))
    })?;
    bytes.as_slice().try_into().map_err(|_| {
        VaultError::Validation(format!(
            "discriminator for `{name}` must be 8 bytes, got {}",
            bytes.len()
        ))
    })
}

impl ProgramContext {
    pub fn from_config(cfg: &Config) -> Result<Self, VaultError> {
        let p = &cfg.program;
        let d = &p.discriminators;
        Ok(Self {
            program_id: p.vault_program_id.parse().map_err(|e| {
                VaultError::Validation(format!("invalid vault program id {}: {e}", p.vault_program_id))
            })?,
            fhe_program_id: p.fhe_program_id.parse().map_err(|e| {
                VaultError::Validation(format!("invalid FHE program id {}: {e}", p.fhe_program_id))
            })?,
            vault_seed: p.vault_seed.as_bytes().to_vec(),
            user_seed: p.user_seed.as_bytes().to_vec(),
            note_seed: p.stealth_note_seed.as_bytes().to_vec(),
            disc_initialize_vault: parse_discriminator(&d.initialize_vault, "initialize_vault")?,
            disc_deposit: parse_discriminator(&d.deposit, "deposit")?,
            disc_withdraw: parse_discriminator(&d.withdraw, "withdraw")?,
            disc_apply_yield: parse_discriminator(&d.apply_yield, "apply_yield")?,
            disc_transfer: parse_discriminator(&d.transfer, "transfer")?,
            disc_claim_access: parse_discriminator(&d.claim_access, "claim_access")?,
            disc_claim_yield: parse_discriminator(&d.claim_yield, "claim_yield")?,
            disc_create_stealth_note: parse_discriminator(&d.create_stealth_note, "create_stealth_note")?,
            disc_claim_stealth_note: parse_discriminator(&d.claim_stealth_note, "claim_stealth_note")?,
        })
    }

    pub fn discriminator(&self, ix: VaultInstruction) -> [u8; 8] {
        match ix {
            VaultInstruction::InitializeVault => self.disc_initialize_vault,
            VaultInstruction::Deposit => self.disc_deposit,
            VaultInstruction::Withdraw => self.disc_withdraw,
            VaultInstruction::ApplyYield => self.disc_apply_yield,
            VaultInstruction::Transfer => self.disc_transfer,
            VaultInstruction::ClaimAccess => self.disc_claim_access,
            VaultInstruction::ClaimYield => self.disc_claim_yield,
            VaultInstruction::CreateStealthNote => self.disc_create_stealth_note,
            VaultInstruction::ClaimStealthNote => self.disc_claim_stealth_note,
        }
    }

    // ------------------------------ PDAs ------------------------------

    pub fn vault_pda(&self) -> Pubkey {
        Pubkey::find_program_address(&[&self.vault_seed], &self.program_id).0
    }

    pub fn user_pda(&self, owner: &Pubkey) -> Pubkey {
        Pubkey::find_program_address(&[&self.user_seed, owner.as_ref()], &self.program_id).0
    }

    pub fn note_pda(&self, note_id: &[u8; 32]) -> Pubkey {
        Pubkey::find_program_address(&[&self.note_seed, note_id], &self.program_id).0
    }

    /// Allowance record address under the FHE network program:
    /// seeds are the 16-byte little-endian handle followed by the
    /// authorized address.
    pub fn allowance_pda(&self, handle: u128, allowed: &Pubkey) -> Pubkey {
        let handle_bytes = handle.to_le_bytes();
        Pubkey::find_program_address(&[&handle_bytes, allowed.as_ref()], &self.fhe_program_id).0
    }

    pub fn allowance_pair(&self, handle: u128, allowed: Pubkey) -> AllowancePair {
        AllowancePair {
            allowance: self.allowance_pda(handle, &allowed),
            allowed,
        }
    }

    // -------------------------- wire payloads --------------------------

    pub fn instruction_data(&self, ix: VaultInstruction, payload: &[u8]) -> Vec<u8> {
        let mut data = Vec::with_capacity(8 + payload.len());
        data.extend_from_slice(&self.discriminator(ix));
        data.extend_from_slice(payload);
        data
    }

    /// Common payload for amount-carrying instructions:
    /// byte-vector(ciphertext) then the plain u64 lamport amount.
    pub fn encrypted_amount_payload(ciphertext: &[u8], lamports: u64) -> Vec<u8> {
        let mut payload = encode_byte_vector(ciphertext);
        payload.extend_from_slice(&encode_u64_le(lamports));
        payload
    }

    fn append_allowances(keys: &mut Vec<AccountMeta>, allowances: &[AllowancePair]) {
        for pair in allowances {
            keys.push(AccountMeta::new(pair.allowance, false));
            keys.push(AccountMeta::new_readonly(pair.allowed, false));
        }
    }

    // ------------------------ instruction builders ------------------------

    /// One-time vault creation. The payer becomes the recorded
    /// authority; data is the bare discriminator.
    pub fn initialize_vault_ix(&self, authority: &Pubkey) -> Instruction {
        Instruction {
            program_id: self.program_id,
            accounts: vec![
                AccountMeta::new(self.vault_pda(), false),
                AccountMeta::new(*authority, true),
                AccountMeta::new_readonly(system_program::id(), false),
                AccountMeta::new_readonly(self.fhe_program_id, false),
            ],
            data: self.instruction_data(VaultInstruction::InitializeVault, &[]),
        }
    }

    /// Deposit or withdraw. `allowances` is empty for the simulation
    /// probe and for withdrawals (which never auto-authorize).
    pub fn movement_ix(
        &self,
        kind: VaultInstruction,
        signer: &Pubkey,
        ciphertext: &[u8],
        lamports: u64,
        allowances: &[AllowancePair],
    ) -> Instruction {
        debug_assert!(matches!(kind, VaultInstruction::Deposit | VaultInstruction::Withdraw));
        let mut keys = vec![
            AccountMeta::new(self.vault_pda(), false),
            AccountMeta::new(self.user_pda(signer), false),
            AccountMeta::new(*signer, true),
            AccountMeta::new_readonly(system_program::id(), false),
            AccountMeta::new_readonly(self.fhe_program_id, false),
        ];
        Self::append_allowances(&mut keys, allowances);
        Instruction {
            program_id: self.program_id,
            accounts: keys,
            data: self.instruction_data(kind, &Self::encrypted_amount_payload(ciphertext, lamports)),
        }
    }

    pub fn apply_yield_ix(&self, authority: &Pubkey, ciphertext: &[u8], lamports: u64) -> Instruction {
        Instruction {
            program_id: self.program_id,
            accounts: vec![
                AccountMeta::new(self.vault_pda(), false),
                AccountMeta::new_readonly(*authority, true),
                AccountMeta::new_readonly(system_program::id(), false),
                AccountMeta::new_readonly(self.fhe_program_id, false),
            ],
            data: self.instruction_data(
                VaultInstruction::ApplyYield,
                &Self::encrypted_amount_payload(ciphertext, lamports),
            ),
        }
    }

    pub fn transfer_ix(
        &self,
        sender: &Pubkey,
        recipient: &Pubkey,
        ciphertext: &[u8],
        lamports: u64,
        allowances: &[AllowancePair],
    ) -> Instruction {
        let mut keys = vec![
            AccountMeta::new(self.vault_pda(), false),
            AccountMeta::new(self.user_pda(sender), false),
            AccountMeta::new(self.user_pda(recipient), false),
            AccountMeta::new(*sender, true),
            AccountMeta::new_readonly(*recipient, false),
            AccountMeta::new_readonly(system_program::id(), false),
            AccountMeta::new_readonly(self.fhe_program_id, false),
        ];
        Self::append_allowances(&mut keys, allowances);
        Instruction {
            program_id: self.program_id,
            accounts: keys,
            data: self.instruction_data(
                VaultInstruction::Transfer,
                &Self::encrypted_amount_payload(ciphertext, lamports),
            ),
        }
    }

    pub fn claim_access_ix(&self, owner: &Pubkey, allowance: AllowancePair) -> Instruction {
        let mut keys = vec![
            AccountMeta::new_readonly(self.user_pda(owner), false),
            AccountMeta::new(*owner, true),
            AccountMeta::new_readonly(system_program::id(), false),
            AccountMeta::new_readonly(self.fhe_program_id, false),
        ];
        Self::append_allowances(&mut keys, &[allowance]);
        Instruction {
            program_id: self.program_id,
            accounts: keys,
            data: self.instruction_data(VaultInstruction::ClaimAccess, &[]),
        }
    }

    pub fn claim_yield_ix(&self, owner: &Pubkey) -> Instruction {
        Instruction {
            program_id: self.program_id,
            accounts: vec![
                AccountMeta::new(self.vault_pda(), false),
                AccountMeta::new(self.user_pda(owner), false),
                AccountMeta::new(*owner, true),
                AccountMeta::new_readonly(system_program::id(), false),
                AccountMeta::new_readonly(self.fhe_program_id, false),
            ],
            data: self.instruction_data(VaultInstruction::ClaimYield, &[]),
        }
    }

    pub fn create_note_ix(
        &self,
        payer: &Pubkey,
        note_id: [u8; 32],
        ciphertext: &[u8],
        lamports: u64,
    ) -> Instruction {
        // Note creation prepends the fixed 32-byte id before the
        // ciphertext vector.
        let mut payload = Vec::with_capacity(32 + 4 + ciphertext.len() + 8);
        payload.extend_from_slice(&note_id);
        payload.extend_from_slice(&Self::encrypted_amount_payload(ciphertext, lamports));
        Instruction {
            program_id: self.program_id,
            accounts: vec![
                AccountMeta::new(self.note_pda(&note_id), false),
                AccountMeta::new(*payer, true),
                AccountMeta::new_readonly(system_program::id(), false),
                AccountMeta::new_readonly(self.fhe_program_id, false),
            ],
            data: self.instruction_data(VaultInstruction::CreateStealthNote, &payload),
        }
    }

    pub fn claim_note_ix(
        &self,
        claimer: &Pubkey,
        note_id: &[u8; 32],
        secret: &str,
        allowances: &[AllowancePair],
    ) -> Instruction {
        let mut keys = vec![
            AccountMeta::new(self.vault_pda(), false),
            AccountMeta::new(self.note_pda(note_id), false),
            AccountMeta::new(self.user_pda(claimer), false),
            AccountMeta::new(*claimer, true),
            AccountMeta::new_readonly(system_program::id(), false),
            AccountMeta::new_readonly(self.fhe_program_id, false),
        ];
        Self::append_allowances(&mut keys, allowances);
        Instruction {
            program_id: self.program_id,
            accounts: keys,
            data: self.instruction_data(
                VaultInstruction::ClaimStealthNote,
                &encode_byte_vector(secret.as_bytes()),
            ),
        }
    }
}

/// Note id = sha256 of the secret passphrase. Anyone who knows the
/// passphrase can recompute the id and locate the note.
pub fn note_id_from_secret(secret: &str) -> [u8; 32] {
    Sha256::digest(secret.as_bytes()).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> ProgramContext {
        ProgramContext::from_config(&Config::default()).unwrap()
    }

    #[test]
    fn deposit_data_is_discriminator_vector_then_amount() {
        let ctx = ctx();
        let signer = Pubkey::new_unique();
        let ciphertext = [0xAB; 48];
        let ix = ctx.movement_ix(VaultInstruction::Deposit, &signer, &ciphertext, 1_500, &[]);

        assert_eq!(&ix.data[..8], &hex::decode("f223c68952e1f2b6").unwrap()[..]);
        assert_eq!(&ix.data[8..12], &48u32.to_le_bytes());
        assert_eq!(&ix.data[12..60], &ciphertext[..]);
        assert_eq!(&ix.data[60..68], &1_500u64.to_le_bytes());
        assert_eq!(ix.data.len(), 68);
    }

    #[test]
    fn movement_probe_has_five_accounts_and_real_has_nine() {
        let ctx = ctx();
        let signer = Pubkey::new_unique();
        let probe = ctx.movement_ix(VaultInstruction::Deposit, &signer, &[1, 2, 3], 1, &[]);
        assert_eq!(probe.accounts.len(), 5);
        assert!(probe.accounts[0].is_writable); // vault
        assert!(probe.accounts[1].is_writable); // position
        assert!(probe.accounts[2].is_signer);

        let pairs = [
            ctx.allowance_pair(7, signer),
            ctx.allowance_pair(9, signer),
        ];
        let real = ctx.movement_ix(VaultInstruction::Deposit, &signer, &[1, 2, 3], 1, &pairs);
        assert_eq!(real.accounts.len(), 9);
        assert!(real.accounts[5].is_writable);
        assert!(!real.accounts[6].is_writable);
        assert_eq!(real.accounts[6].pubkey, signer);
    }

    #[test]
    fn transfer_appends_sender_then_recipient_pairs() {
        let ctx = ctx();
        let sender = Pubkey::new_unique();
        let recipient = Pubkey::new_unique();
        let pairs = [
            ctx.allowance_pair(11, sender),
            ctx.allowance_pair(22, recipient),
        ];
        let ix = ctx.transfer_ix(&sender, &recipient, &[5; 10], 42, &pairs);
        assert_eq!(ix.accounts.len(), 11);
        assert_eq!(ix.accounts[8].pubkey, sender);
        assert_eq!(ix.accounts[10].pubkey, recipient);
    }

    #[test]
    fn note_payload_leads_with_note_id() {
        let ctx = ctx();
        let payer = Pubkey::new_unique();
        let note_id = note_id_from_secret("mission-007-goldeneye");
        let ix = ctx.create_note_ix(&payer, note_id, &[9; 16], 500_000_000);
        assert_eq!(&ix.data[8..40], &note_id);
        assert_eq!(&ix.data[40..44], &16u32.to_le_bytes());
        assert_eq!(&ix.data[60..68], &500_000_000u64.to_le_bytes());
    }

    #[test]
    fn claim_note_payload_is_secret_vector() {
        let ctx = ctx();
        let claimer = Pubkey::new_unique();
        let note_id = note_id_from_secret("some-long-secret");
        let ix = ctx.claim_note_ix(&claimer, &note_id, "some-long-secret", &[]);
        assert_eq!(&ix.data[8..12], &("some-long-secret".len() as u32).to_le_bytes());
        assert_eq!(&ix.data[12..], b"some-long-secret");
    }

    #[test]
    fn allowance_pda_depends_on_handle_and_address() {
        let ctx = ctx();
        let user = Pubkey::new_unique();
        let other = Pubkey::new_unique();
        assert_ne!(ctx.allowance_pda(1, &user), ctx.allowance_pda(2, &user));
        assert_ne!(ctx.allowance_pda(1, &user), ctx.allowance_pda(1, &other));
        // Deterministic for the same inputs.
        assert_eq!(ctx.allowance_pda(1, &user), ctx.allowance_pda(1, &user));
    }

    #[test]
    fn bad_program_config_is_a_typed_validation_error() {
        let mut cfg = Config::default();
        cfg.program.vault_program_id = "not-a-pubkey".into();
        assert!(matches!(
            ProgramContext::from_config(&cfg),
            Err(VaultError::Validation(_))
        ));

        let mut cfg = Config::default();
        cfg.program.discriminators.deposit = "zz".into();
        assert!(matches!(
            ProgramContext::from_config(&cfg),
            Err(VaultError::Validation(_))
        ));
    }

    #[test]
    fn initialize_carries_only_the_discriminator() {
        let ctx = ctx();
        let authority = Pubkey::new_unique();
        let ix = ctx.initialize_vault_ix(&authority);
        assert_eq!(ix.data, hex::decode("30bfa32c47813fa4").unwrap());
        assert_eq!(ix.accounts.len(), 4);
        assert_eq!(ix.accounts[0].pubkey, ctx.vault_pda());
        assert!(ix.accounts[1].is_signer);
    }

    #[test]
    fn note_id_is_sha256_of_secret() {
        let id = note_id_from_secret("mission-007-goldeneye");
        let again = note_id_from_secret("mission-007-goldeneye");
        assert_eq!(id, again);
        assert_ne!(id, note_id_from_secret("mission-008"));
    }
}
