//! Bit-exact encode/decode of the vault program's account and
//! instruction wire formats. Integers are little-endian, variable
//! length payloads carry a 4-byte LE length prefix, and every account
//! stores its 128-bit ciphertext handle at the same fixed offset.

use solana_sdk::pubkey::Pubkey;

use crate::error::VaultError;

/// Offset of the 16-byte ciphertext handle in every account layout:
/// 8 bytes of discriminator followed by a 32-byte key field
/// (authority, owner, or note id).
pub const HANDLE_OFFSET: usize = 40;
pub const HANDLE_LEN: usize = 16;

pub const VAULT_ACCOUNT_LEN: usize = 81;
pub const USER_POSITION_LEN: usize = 73;
pub const STEALTH_NOTE_LEN: usize = 106;

pub fn encode_u64_le(value: u64) -> [u8; 8] {
    value.to_le_bytes()
}

pub fn decode_u64_le(bytes: &[u8]) -> Result<u64, VaultError> {
    let arr: [u8; 8] = bytes
        .get(..8)
        .and_then(|s| s.try_into().ok())
        .ok_or(VaultError::Decode {
            field: "u64",
            expected: 8,
            offset: 0,
            actual: bytes.len(),
        })?;
    Ok(u64::from_le_bytes(arr))
}

pub fn encode_u128_le(value: u128) -> [u8; 16] {
    value.to_le_bytes()
}

pub fn decode_u128_le(bytes: &[u8]) -> Result<u128, VaultError> {
    let arr: [u8; 16] = bytes
        .get(..16)
        .and_then(|s| s.try_into().ok())
        .ok_or(VaultError::Decode {
            field: "u128",
            expected: 16,
            offset: 0,
            actual: bytes.len(),
        })?;
    Ok(u128::from_le_bytes(arr))
}

/// Borsh-style byte vector: 4-byte LE length prefix, then raw bytes.
pub fn encode_byte_vector(bytes: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(4 + bytes.len());
    out.extend_from_slice(&(bytes.len() as u32).to_le_bytes());
    out.extend_from_slice(bytes);
    out
}

pub fn decode_byte_vector(bytes: &[u8]) -> Result<Vec<u8>, VaultError> {
    let len_bytes: [u8; 4] = bytes
        .get(..4)
        .and_then(|s| s.try_into().ok())
        .ok_or(VaultError::Decode {
            field: "vector length prefix",
            expected: 4,
            offset: 0,
            actual: bytes.len(),
        })?;
    let len = u32::from_le_bytes(len_bytes) as usize;
    bytes
        .get(4..4 + len)
        .map(|s| s.to_vec())
        .ok_or(VaultError::Decode {
            field: "vector payload",
            expected: len,
            offset: 4,
            actual: bytes.len().saturating_sub(4),
        })
}

/// Reads the 16-byte little-endian ciphertext handle at `offset`.
pub fn parse_handle(data: &[u8], offset: usize) -> Result<u128, VaultError> {
    let arr: [u8; 16] = data
        .get(offset..offset + HANDLE_LEN)
        .and_then(|s| s.try_into().ok())
        .ok_or(VaultError::Decode {
            field: "ciphertext handle",
            expected: HANDLE_LEN,
            offset,
            actual: data.len(),
        })?;
    Ok(u128::from_le_bytes(arr))
}

/// Fixed-offset reader over raw account bytes. Every take names the
/// field so undersized buffers fail with a useful message instead of
/// silently yielding garbage.
struct ByteReader<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> ByteReader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, offset: 0 }
    }

    fn take(&mut self, len: usize, field: &'static str) -> Result<&'a [u8], VaultError> {
        let slice = self
            .data
            .get(self.offset..self.offset + len)
            .ok_or(VaultError::Decode {
                field,
                expected: len,
                offset: self.offset,
                actual: self.data.len(),
            })?;
        self.offset += len;
        Ok(slice)
    }

    fn skip(&mut self, len: usize, field: &'static str) -> Result<(), VaultError> {
        self.take(len, field).map(|_| ())
    }

    fn pubkey(&mut self, field: &'static str) -> Result<Pubkey, VaultError> {
        let bytes: [u8; 32] = self.take(32, field)?.try_into().unwrap();
        Ok(Pubkey::from(bytes))
    }

    fn u64_le(&mut self, field: &'static str) -> Result<u64, VaultError> {
        let bytes: [u8; 8] = self.take(8, field)?.try_into().unwrap();
        Ok(u64::from_le_bytes(bytes))
    }

    fn i64_le(&mut self, field: &'static str) -> Result<i64, VaultError> {
        let bytes: [u8; 8] = self.take(8, field)?.try_into().unwrap();
        Ok(i64::from_le_bytes(bytes))
    }

    fn u128_le(&mut self, field: &'static str) -> Result<u128, VaultError> {
        let bytes: [u8; 16] = self.take(16, field)?.try_into().unwrap();
        Ok(u128::from_le_bytes(bytes))
    }

    fn u8(&mut self, field: &'static str) -> Result<u8, VaultError> {
        Ok(self.take(1, field)?[0])
    }

    fn bool(&mut self, field: &'static str) -> Result<bool, VaultError> {
        Ok(self.u8(field)? == 1)
    }
}

/// Singleton vault record:
/// [8 discriminator][32 authority][16 handle][8 escrow u64][16 yield index u128][1 bump]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VaultAccount {
    pub authority: Pubkey,
    pub handle: u128,
    pub total_escrow_lamports: u64,
    pub yield_index: u128,
    pub bump: u8,
}

impl VaultAccount {
    pub fn decode(data: &[u8]) -> Result<Self, VaultError> {
        let mut r = ByteReader::new(data);
        r.skip(8, "vault discriminator")?;
        Ok(VaultAccount {
            authority: r.pubkey("vault authority")?,
            handle: r.u128_le("vault balance handle")?,
            total_escrow_lamports: r.u64_le("vault total escrow")?,
            yield_index: r.u128_le("vault yield index")?,
            bump: r.u8("vault bump")?,
        })
    }
}

/// Per-depositor record:
/// [8 discriminator][32 owner][16 handle][16 last yield index u128][1 bump]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserPositionAccount {
    pub owner: Pubkey,
    pub handle: u128,
    pub last_yield_index: u128,
    pub bump: u8,
}

impl UserPositionAccount {
    pub fn decode(data: &[u8]) -> Result<Self, VaultError> {
        let mut r = ByteReader::new(data);
        r.skip(8, "position discriminator")?;
        Ok(UserPositionAccount {
            owner: r.pubkey("position owner")?,
            handle: r.u128_le("position balance handle")?,
            last_yield_index: r.u128_le("position last yield index")?,
            bump: r.u8("position bump")?,
        })
    }
}

/// Pass-phrase addressed note:
/// [8 discriminator][32 note id][16 handle][8 lamports u64][32 sender][8 created_at i64][1 claimed][1 bump]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StealthNoteAccount {
    pub note_id: [u8; 32],
    pub handle: u128,
    pub lamports: u64,
    pub sender: Pubkey,
    pub created_at: i64,
    pub claimed: bool,
    pub bump: u8,
}

impl StealthNoteAccount {
    pub fn decode(data: &[u8]) -> Result<Self, VaultError> {
        let mut r = ByteReader::new(data);
        r.skip(8, "note discriminator")?;
        Ok(StealthNoteAccount {
            note_id: r.take(32, "note id")?.try_into().unwrap(),
            handle: r.u128_le("note amount handle")?,
            lamports: r.u64_le("note lamports")?,
            sender: r.pubkey("note sender")?,
            created_at: r.i64_le("note created_at")?,
            claimed: r.bool("note claimed flag")?,
            bump: r.u8("note bump")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn u64_roundtrip() {
        for v in [0u64, 1, 255, 1_000_000_000, u64::MAX] {
            assert_eq!(decode_u64_le(&encode_u64_le(v)).unwrap(), v);
        }
    }

    #[test]
    fn u128_roundtrip_beyond_u64() {
        for v in [0u128, u64::MAX as u128, (u64::MAX as u128) + 1, u128::MAX] {
            assert_eq!(decode_u128_le(&encode_u128_le(v)).unwrap(), v);
        }
    }

    #[test]
    fn byte_vector_roundtrip_and_prefix() {
        let payload = vec![7u8, 8, 9, 10, 11];
        let encoded = encode_byte_vector(&payload);
        assert_eq!(&encoded[..4], &5u32.to_le_bytes());
        assert_eq!(decode_byte_vector(&encoded).unwrap(), payload);

        let empty = encode_byte_vector(&[]);
        assert_eq!(empty, vec![0u8; 4]);
        assert!(decode_byte_vector(&empty).unwrap().is_empty());
    }

    #[test]
    fn undersized_buffers_name_the_field() {
        let err = decode_u64_le(&[1, 2, 3]).unwrap_err();
        match err {
            VaultError::Decode { field, expected, actual, .. } => {
                assert_eq!(field, "u64");
                assert_eq!(expected, 8);
                assert_eq!(actual, 3);
            }
            other => panic!("unexpected error: {other}"),
        }

        let err = VaultAccount::decode(&[0u8; 40]).unwrap_err();
        assert!(matches!(err, VaultError::Decode { field: "vault balance handle", .. }));
    }

    #[test]
    fn truncated_vector_payload_fails() {
        let mut encoded = encode_byte_vector(&[1, 2, 3, 4]);
        encoded.truncate(6);
        assert!(matches!(
            decode_byte_vector(&encoded),
            Err(VaultError::Decode { field: "vector payload", .. })
        ));
    }

    #[test]
    fn handle_sits_at_offset_40_in_every_layout() {
        let handle: u128 = 0xDEAD_BEEF_0123_4567_89AB_CDEF_0011_2233;

        let mut vault = vec![0u8; VAULT_ACCOUNT_LEN];
        vault[HANDLE_OFFSET..HANDLE_OFFSET + 16].copy_from_slice(&handle.to_le_bytes());
        assert_eq!(parse_handle(&vault, HANDLE_OFFSET).unwrap(), handle);

        let mut position = vec![0u8; USER_POSITION_LEN];
        position[HANDLE_OFFSET..HANDLE_OFFSET + 16].copy_from_slice(&handle.to_le_bytes());
        assert_eq!(parse_handle(&position, HANDLE_OFFSET).unwrap(), handle);

        let mut note = vec![0u8; STEALTH_NOTE_LEN];
        note[HANDLE_OFFSET..HANDLE_OFFSET + 16].copy_from_slice(&handle.to_le_bytes());
        assert_eq!(parse_handle(&note, HANDLE_OFFSET).unwrap(), handle);
    }

    #[test]
    fn parse_handle_rejects_short_buffer() {
        assert!(matches!(
            parse_handle(&[0u8; 50], HANDLE_OFFSET),
            Err(VaultError::Decode { field: "ciphertext handle", .. })
        ));
    }
}
