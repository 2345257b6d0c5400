//! Client-side amount encryption. Plaintext lamport amounts are turned
//! into ciphertext blobs by the threshold-encryption network before
//! they ever appear in an instruction; there is deliberately no decrypt
//! path here. Decryption is the privileged, attested flow in
//! `attested_decrypt`.

use std::future::Future;
use std::time::Duration;

use serde::Deserialize;

use crate::error::VaultError;

/// Seam over the external encryption primitive so tests can substitute
/// a local implementation.
pub trait EncryptionBackend: Send + Sync {
    /// Encrypts a non-negative 128-bit amount, returning the raw
    /// ciphertext bytes to embed in an instruction payload.
    fn encrypt(&self, amount: u128) -> impl Future<Output = Result<Vec<u8>, VaultError>> + Send;
}

/// Talks to the network's HTTP encrypt endpoint. The service returns
/// the ciphertext hex-encoded.
pub struct HttpEncryptionBackend {
    endpoint: String,
    http: reqwest::Client,
}

impl HttpEncryptionBackend {
    pub fn new(endpoint: &str) -> Self {
        Self {
            endpoint: endpoint.to_string(),
            http: reqwest::Client::new(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct EncryptResponse {
    ciphertext: String,
}

impl EncryptionBackend for HttpEncryptionBackend {
    fn encrypt(&self, amount: u128) -> impl Future<Output = Result<Vec<u8>, VaultError>> + Send {
        async move {
            let body = serde_json::json!({
                "value": amount.to_string(),
                "type": "euint128",
            });
            let response = self
                .http
                .post(&self.endpoint)
                .json(&body)
                .send()
                .await
                .map_err(|e| VaultError::EncryptionFailure(e.to_string()))?;
            let status = response.status();
            if !status.is_success() {
                let text = response.text().await.unwrap_or_default();
                return Err(VaultError::EncryptionFailure(format!(
                    "encrypt endpoint returned {status}: {text}"
                )));
            }
            let parsed: EncryptResponse = response
                .json()
                .await
                .map_err(|e| VaultError::EncryptionFailure(format!("bad encrypt response: {e}")))?;
            hex::decode(parsed.ciphertext.trim_start_matches("0x"))
                .map_err(|e| VaultError::EncryptionFailure(format!("ciphertext is not hex: {e}")))
        }
    }
}

/// Wraps a backend with the deadline the UI relies on: a hung
/// encryption service surfaces as a distinct, retryable timeout rather
/// than an indefinitely pending operation.
pub struct AmountEncryptor<B: EncryptionBackend> {
    backend: B,
    timeout: Duration,
}

impl<B: EncryptionBackend> AmountEncryptor<B> {
    pub fn new(backend: B, timeout: Duration) -> Self {
        Self { backend, timeout }
    }

    pub async fn encrypt_lamports(&self, lamports: u64) -> Result<Vec<u8>, VaultError> {
        match tokio::time::timeout(self.timeout, self.backend.encrypt(lamports as u128)).await {
            Ok(Ok(ciphertext)) => Ok(ciphertext),
            Ok(Err(e @ VaultError::EncryptionFailure(_))) => Err(e),
            Ok(Err(other)) => Err(VaultError::EncryptionFailure(other.to_string())),
            Err(_) => Err(VaultError::EncryptionTimeout(self.timeout)),
        }
    }
}
