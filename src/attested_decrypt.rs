//! Attested reveal: prove wallet ownership to the covalidator and get
//! back a plaintext for a ciphertext handle, together with an
//! attestation signature over (handle, plaintext, address).
//!
//! Per handle the flow is: sign the handle's hex rendering with the
//! wallet, POST `{handle, address, signature}`, then rebuild the exact
//! byte message the covalidator signs and check its ed25519 signature
//! against the network's published key. The call is stateless; retry
//! policy is the caller's decision.

use ed25519_dalek::{Signature, Verifier, VerifyingKey};
use serde::{Deserialize, Serialize};
use solana_sdk::ed25519_program;
use solana_sdk::instruction::Instruction;
use solana_sdk::pubkey::Pubkey;

use crate::error::{classify_covalidator_rejection, VaultError, MAX_DECRYPT_BATCH};
use crate::session::WalletSigner;

#[derive(Debug, Serialize)]
struct DecryptRequest<'a> {
    handle: String,
    address: &'a str,
    signature: String,
}

#[derive(Debug, Deserialize)]
struct CovalidatorResponse {
    #[serde(default)]
    handle_value: Option<String>,
    plaintext: String,
    signature: String,
}

pub struct AttestedDecryptClient {
    endpoint: String,
    covalidator_key: VerifyingKey,
    http: reqwest::Client,
}

impl AttestedDecryptClient {
    pub fn new(endpoint: &str, covalidator_pubkey_b58: &str) -> Result<Self, VaultError> {
        let key_bytes: [u8; 32] = bs58::decode(covalidator_pubkey_b58)
            .into_vec()
            .map_err(|e| VaultError::Validation(format!("covalidator key is not base58: {e}")))?
            .try_into()
            .map_err(|_| VaultError::Validation("covalidator key must be 32 bytes".into()))?;
        let covalidator_key = VerifyingKey::from_bytes(&key_bytes)
            .map_err(|e| VaultError::Validation(format!("covalidator key is not ed25519: {e}")))?;
        Ok(Self {
            endpoint: endpoint.to_string(),
            covalidator_key,
            http: reqwest::Client::new(),
        })
    }

    /// Reveals the plaintexts for up to [`MAX_DECRYPT_BATCH`] handles.
    /// Rejects oversized batches before touching the network or the
    /// wallet.
    pub async fn decrypt_batch<S: WalletSigner>(
        &self,
        handles: &[u128],
        signer: &S,
    ) -> Result<Vec<u128>, VaultError> {
        if handles.is_empty() {
            return Err(VaultError::Validation("no handles provided for decryption".into()));
        }
        if handles.len() > MAX_DECRYPT_BATCH {
            return Err(VaultError::BatchTooLarge(handles.len()));
        }

        let address = signer.pubkey();
        let mut plaintexts = Vec::with_capacity(handles.len());
        for &handle in handles {
            plaintexts.push(self.decrypt_one(handle, &address, signer).await?);
        }
        Ok(plaintexts)
    }

    async fn decrypt_one<S: WalletSigner>(
        &self,
        handle: u128,
        address: &Pubkey,
        signer: &S,
    ) -> Result<u128, VaultError> {
        // Ownership proof: the wallet signs the handle's hex rendering.
        let message = handle_signing_message(handle);
        let wallet_signature = signer.sign_message(&message).await?;

        let address_b58 = address.to_string();
        let request = DecryptRequest {
            handle: handle.to_string(),
            address: &address_b58,
            signature: bs58::encode(&wallet_signature).into_string(),
        };
        let response = self
            .http
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| VaultError::Network(format!("covalidator unreachable: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_covalidator_rejection(status.as_u16(), &body));
        }

        let parsed: CovalidatorResponse = response
            .json()
            .await
            .map_err(|e| VaultError::CovalidatorRequestFailed(format!("bad response body: {e}")))?;
        if parsed.plaintext.is_empty() {
            return Err(VaultError::EmptyPlaintext);
        }
        let plaintext: u128 = parsed.plaintext.parse().map_err(|_| {
            VaultError::CovalidatorRequestFailed(format!(
                "plaintext `{}` is not a decimal integer",
                parsed.plaintext
            ))
        })?;

        // The attestation signs the handle as reported by the service
        // when present, else the handle we asked about.
        let attested_handle = match &parsed.handle_value {
            Some(v) => v.parse::<u128>().map_err(|_| {
                VaultError::CovalidatorRequestFailed(format!(
                    "handle_value `{v}` is not a decimal integer"
                ))
            })?,
            None => handle,
        };
        self.verify_attestation(attested_handle, plaintext, address, &parsed.signature);

        Ok(plaintext)
    }

    /// Checks the covalidator's signature over
    /// `hex(handle) || le16(plaintext) || address`.
    ///
    /// A failed check currently logs a warning instead of aborting,
    /// matching the deployed service's behavior during the alpha;
    /// integrators who need attestation to be load-bearing should
    /// treat this warning as fatal.
    fn verify_attestation(
        &self,
        handle: u128,
        plaintext: u128,
        address: &Pubkey,
        signature_b58: &str,
    ) {
        let valid = bs58::decode(signature_b58)
            .into_vec()
            .ok()
            .and_then(|bytes| Signature::from_slice(&bytes).ok())
            .map(|signature| {
                let message = attestation_message(handle, plaintext, address);
                self.covalidator_key.verify(&message, &signature).is_ok()
            })
            .unwrap_or(false);
        if !valid {
            eprintln!(
                "warning: covalidator attestation did not verify for handle {handle}; \
                 plaintext accepted anyway"
            );
        }
    }
}

/// The byte message a wallet signs to prove it may see a handle's
/// plaintext: the handle rendered as lowercase hex ASCII, no prefix.
pub fn handle_signing_message(handle: u128) -> Vec<u8> {
    format!("{handle:x}").into_bytes()
}

/// The plaintext as the covalidator serializes it: a 16-byte
/// little-endian unsigned integer, built from the low and high 64-bit
/// halves so values past 2^64 survive intact.
pub fn plaintext_le_bytes(plaintext: u128) -> [u8; 16] {
    let low = (plaintext & u64::MAX as u128) as u64;
    let high = (plaintext >> 64) as u64;
    let mut out = [0u8; 16];
    out[..8].copy_from_slice(&low.to_le_bytes());
    out[8..].copy_from_slice(&high.to_le_bytes());
    out
}

/// The exact message the covalidator attests to:
/// ASCII hex of the handle, then the 16-byte LE plaintext, then the
/// caller's raw 32-byte address.
pub fn attestation_message(handle: u128, plaintext: u128, address: &Pubkey) -> Vec<u8> {
    let handle_hex = handle_signing_message(handle);
    let mut message = Vec::with_capacity(handle_hex.len() + 16 + 32);
    message.extend_from_slice(&handle_hex);
    message.extend_from_slice(&plaintext_le_bytes(plaintext));
    message.extend_from_slice(address.as_ref());
    message
}

/// Builds an instruction for the native ed25519 verification program:
/// [1 num_signatures][1 padding][seven u16 LE offsets][64 signature]
/// [32 pubkey][message]. The reveal-only flow above does not submit
/// this; it exists for callers who want the attestation checked
/// on-chain as part of a transaction.
pub fn ed25519_verify_instruction(
    signature: &[u8; 64],
    public_key: &[u8; 32],
    message: &[u8],
) -> Instruction {
    const HEADER_LEN: u16 = 16; // 2-byte header + 7 u16 offsets
    let signature_offset = HEADER_LEN;
    let public_key_offset = signature_offset + 64;
    let message_offset = public_key_offset + 32;
    // 0xffff means "this instruction" to the verifier program.
    let current_instruction: u16 = u16::MAX;

    let mut data = Vec::with_capacity(HEADER_LEN as usize + 64 + 32 + message.len());
    data.push(1); // num_signatures
    data.push(0); // padding
    data.extend_from_slice(&signature_offset.to_le_bytes());
    data.extend_from_slice(&current_instruction.to_le_bytes());
    data.extend_from_slice(&public_key_offset.to_le_bytes());
    data.extend_from_slice(&current_instruction.to_le_bytes());
    data.extend_from_slice(&message_offset.to_le_bytes());
    data.extend_from_slice(&(message.len() as u16).to_le_bytes());
    data.extend_from_slice(&current_instruction.to_le_bytes());
    data.extend_from_slice(signature);
    data.extend_from_slice(public_key);
    data.extend_from_slice(message);

    Instruction {
        program_id: ed25519_program::id(),
        accounts: vec![],
        data,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signing_message_is_bare_lowercase_hex() {
        assert_eq!(handle_signing_message(0x2a), b"2a");
        assert_eq!(handle_signing_message(0), b"0");
        assert_eq!(
            handle_signing_message(0xDEADBEEF_0000_0001),
            b"deadbeef00000001"
        );
    }

    #[test]
    fn plaintext_bytes_cover_both_halves() {
        assert_eq!(plaintext_le_bytes(1)[0], 1);
        assert_eq!(&plaintext_le_bytes(123_456_789)[..8], &123_456_789u64.to_le_bytes());

        let big = (7u128 << 64) | 9;
        let bytes = plaintext_le_bytes(big);
        assert_eq!(&bytes[..8], &9u64.to_le_bytes());
        assert_eq!(&bytes[8..], &7u64.to_le_bytes());
        assert_eq!(bytes, big.to_le_bytes());
    }

    #[test]
    fn attestation_message_concatenates_in_order() {
        let address = Pubkey::new_unique();
        let message = attestation_message(0x2a, 5, &address);
        assert_eq!(&message[..2], b"2a");
        assert_eq!(&message[2..18], &plaintext_le_bytes(5));
        assert_eq!(&message[18..], address.as_ref());
    }

    #[test]
    fn ed25519_instruction_layout_offsets() {
        let ix = ed25519_verify_instruction(&[3; 64], &[4; 32], b"hello");
        assert_eq!(ix.program_id, ed25519_program::id());
        assert_eq!(ix.data[0], 1);
        assert_eq!(ix.data[1], 0);
        // signature offset = 16
        assert_eq!(u16::from_le_bytes([ix.data[2], ix.data[3]]), 16);
        // public key offset = 80
        assert_eq!(u16::from_le_bytes([ix.data[6], ix.data[7]]), 80);
        // message offset = 112, size = 5
        assert_eq!(u16::from_le_bytes([ix.data[10], ix.data[11]]), 112);
        assert_eq!(u16::from_le_bytes([ix.data[12], ix.data[13]]), 5);
        assert_eq!(&ix.data[16..80], &[3u8; 64][..]);
        assert_eq!(&ix.data[80..112], &[4u8; 32][..]);
        assert_eq!(&ix.data[112..], b"hello");
    }
}
