use std::time::Duration;
use thiserror::Error;

/// Hard cap on the number of handles the covalidator accepts per call.
pub const MAX_DECRYPT_BATCH: usize = 10;

/// Every failure the client surfaces to callers. Variants are stable,
/// machine-matchable kinds; the payload strings are for humans.
#[derive(Debug, Error)]
pub enum VaultError {
    #[error("invalid input: {0}")]
    Validation(String),

    #[error("insufficient funds: {0}")]
    InsufficientFunds(String),

    #[error("wallet error: {0}")]
    Wallet(String),

    #[error("signature request was rejected or cancelled by the user")]
    UserRejected,

    #[error("encryption failed: {0}")]
    EncryptionFailure(String),

    #[error("encryption timed out after {0:?}; the encryption service may be unavailable")]
    EncryptionTimeout(Duration),

    #[error("simulation failed: {0}")]
    SimulationFailed(String),

    #[error("decrypt access has not been granted for this handle: {0}")]
    AuthorizationRequired(String),

    #[error("{0} not found")]
    NotFound(&'static str),

    /// Layout mismatch between this client and the deployed program.
    /// Not recoverable; indicates version skew.
    #[error("decode error: `{field}` needs {expected} bytes at offset {offset}, buffer has {actual}")]
    Decode {
        field: &'static str,
        expected: usize,
        offset: usize,
        actual: usize,
    },

    #[error("covalidator request failed: {0}")]
    CovalidatorRequestFailed(String),

    #[error("covalidator returned an empty plaintext")]
    EmptyPlaintext,

    #[error("decrypt batch of {0} handles exceeds the maximum of {MAX_DECRYPT_BATCH}")]
    BatchTooLarge(usize),

    #[error("network error: {0}")]
    Network(String),
}

pub type Result<T, E = VaultError> = std::result::Result<T, E>;

/// Maps an untyped chain rejection message onto the error taxonomy.
///
/// The RPC layer reports program rejections as free text, so the
/// substrings live here, in one place, instead of being scattered
/// across call sites. Anything unrecognized is reported as a plain
/// network failure with the original text preserved.
pub fn classify_chain_error(message: &str) -> VaultError {
    let lower = message.to_ascii_lowercase();
    if lower.contains("insufficient funds")
        || lower.contains("attempt to debit an account")
        || lower.contains("no record of a prior credit")
    {
        VaultError::InsufficientFunds(message.to_string())
    } else {
        VaultError::Network(message.to_string())
    }
}

/// Maps a covalidator HTTP rejection onto the taxonomy. A 403 or a
/// "not allowed" body means no allowance record exists for the handle,
/// which is recoverable via an explicit claim-access call.
pub fn classify_covalidator_rejection(status: u16, body: &str) -> VaultError {
    let lower = body.to_ascii_lowercase();
    if status == 403 || lower.contains("not allowed") || lower.contains("forbidden") {
        VaultError::AuthorizationRequired(body.to_string())
    } else {
        VaultError::CovalidatorRequestFailed(format!("status {status}: {body}"))
    }
}
