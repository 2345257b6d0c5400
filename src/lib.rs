// Library interface for the alphavault client
// This allows tests and external consumers to drive the vault pipeline

pub mod attested_decrypt;
pub mod codec;
pub mod config;
pub mod encryptor;
pub mod error;
pub mod instructions;
pub mod session;
pub mod simulation;
pub mod vault;

pub use attested_decrypt::AttestedDecryptClient;
pub use codec::{StealthNoteAccount, UserPositionAccount, VaultAccount};
pub use config::Config;
pub use encryptor::{AmountEncryptor, EncryptionBackend, HttpEncryptionBackend};
pub use error::{VaultError, MAX_DECRYPT_BATCH};
pub use instructions::{note_id_from_secret, AllowancePair, ProgramContext, VaultInstruction};
pub use session::{ClientSession, KeypairSigner, WalletSigner};
pub use vault::{NoteCreation, StealthNoteInfo, VaultClient, VaultMetadataSummary};
