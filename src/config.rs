use serde::Deserialize;
use std::{fs, path::Path};

use anyhow::{Context, Result};

/// Everything the client treats as external contract: endpoints,
/// program ids, PDA seed strings, and the 8-byte instruction
/// discriminators. Defaults match the devnet alpha deployment so the
/// binary runs without a config file.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub rpc: Rpc,
    #[serde(default)]
    pub program: Program,
    #[serde(default)]
    pub covalidator: Covalidator,
    #[serde(default)]
    pub encryption: Encryption,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Rpc {
    #[serde(default = "default_rpc_url")]
    pub url: String,
    #[serde(default = "default_cluster")]
    pub cluster: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Program {
    #[serde(default = "default_vault_program_id")]
    pub vault_program_id: String,
    /// Program id of the threshold-encryption network; also the owner
    /// of allowance PDAs.
    #[serde(default = "default_fhe_program_id")]
    pub fhe_program_id: String,
    #[serde(default = "default_vault_seed")]
    pub vault_seed: String,
    #[serde(default = "default_user_seed")]
    pub user_seed: String,
    #[serde(default = "default_note_seed")]
    pub stealth_note_seed: String,
    #[serde(default)]
    pub discriminators: Discriminators,
}

/// First 8 bytes of sha256("global:<instruction_name>"), hex encoded.
/// These are opaque constants of the deployed program, not derived here.
#[derive(Debug, Deserialize, Clone)]
pub struct Discriminators {
    #[serde(default = "default_disc_initialize_vault")]
    pub initialize_vault: String,
    #[serde(default = "default_disc_deposit")]
    pub deposit: String,
    #[serde(default = "default_disc_withdraw")]
    pub withdraw: String,
    #[serde(default = "default_disc_apply_yield")]
    pub apply_yield: String,
    #[serde(default = "default_disc_transfer")]
    pub transfer: String,
    #[serde(default = "default_disc_claim_access")]
    pub claim_access: String,
    #[serde(default = "default_disc_claim_yield")]
    pub claim_yield: String,
    #[serde(default = "default_disc_create_stealth_note")]
    pub create_stealth_note: String,
    #[serde(default = "default_disc_claim_stealth_note")]
    pub claim_stealth_note: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Covalidator {
    #[serde(default = "default_covalidator_endpoint")]
    pub endpoint: String,
    /// Base58 ed25519 key the covalidator signs attestations with.
    #[serde(default = "default_covalidator_public_key")]
    pub public_key: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Encryption {
    #[serde(default = "default_encryption_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_encryption_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_rpc_url() -> String {
    "https://api.devnet.solana.com".into()
}
fn default_cluster() -> String {
    "devnet".into()
}
fn default_vault_program_id() -> String {
    "DmfUVqYJ5DG1iWww8YXt75zsB6RdmMws5qQMBWH4ofvC".into()
}
fn default_fhe_program_id() -> String {
    "5sjEbPiqgZrYwR31ahR6Uk9wf5awoX61YGg7jExQSwaj".into()
}
fn default_vault_seed() -> String {
    "vault_v2".into()
}
fn default_user_seed() -> String {
    "user_v2".into()
}
fn default_note_seed() -> String {
    "stealth_note".into()
}
fn default_covalidator_endpoint() -> String {
    "https://grpc.solana-devnet.alpha.devnet.inco.org/crypto/getDecryptAttested".into()
}
fn default_covalidator_public_key() -> String {
    "81owXEbskUpiLv3oNJN4cZxGr93U9MGH7Tt9AvYH2U4r".into()
}
fn default_encryption_endpoint() -> String {
    "https://grpc.solana-devnet.alpha.devnet.inco.org/crypto/encrypt".into()
}
fn default_encryption_timeout_secs() -> u64 {
    30
}

fn default_disc_initialize_vault() -> String {
    "30bfa32c47813fa4".into()
}
fn default_disc_deposit() -> String {
    "f223c68952e1f2b6".into()
}
fn default_disc_withdraw() -> String {
    "b712469c946da122".into()
}
fn default_disc_apply_yield() -> String {
    "6e7ea020cbc9228f".into()
}
fn default_disc_transfer() -> String {
    "a334c8e78c0345ba".into()
}
fn default_disc_claim_access() -> String {
    "0e67cbb5aa3873da".into()
}
fn default_disc_claim_yield() -> String {
    "314a6f07ba163da5".into()
}
fn default_disc_create_stealth_note() -> String {
    "4b5aad640e9e1898".into()
}
fn default_disc_claim_stealth_note() -> String {
    "d3fe1d44d7b68a40".into()
}

impl Default for Rpc {
    fn default() -> Self {
        Self { url: default_rpc_url(), cluster: default_cluster() }
    }
}

impl Default for Program {
    fn default() -> Self {
        Self {
            vault_program_id: default_vault_program_id(),
            fhe_program_id: default_fhe_program_id(),
            vault_seed: default_vault_seed(),
            user_seed: default_user_seed(),
            stealth_note_seed: default_note_seed(),
            discriminators: Discriminators::default(),
        }
    }
}

impl Default for Discriminators {
    fn default() -> Self {
        Self {
            initialize_vault: default_disc_initialize_vault(),
            deposit: default_disc_deposit(),
            withdraw: default_disc_withdraw(),
            apply_yield: default_disc_apply_yield(),
            transfer: default_disc_transfer(),
            claim_access: default_disc_claim_access(),
            claim_yield: default_disc_claim_yield(),
            create_stealth_note: default_disc_create_stealth_note(),
            claim_stealth_note: default_disc_claim_stealth_note(),
        }
    }
}

impl Default for Covalidator {
    fn default() -> Self {
        Self {
            endpoint: default_covalidator_endpoint(),
            public_key: default_covalidator_public_key(),
        }
    }
}

impl Default for Encryption {
    fn default() -> Self {
        Self {
            endpoint: default_encryption_endpoint(),
            timeout_secs: default_encryption_timeout_secs(),
        }
    }
}

/// Read the TOML file at `p` and deserialize into `Config`.
/// *Adds context* so user errors print a friendlier message.
///
/// # Errors
/// * Returns an anyhow::Error if the file cannot be read or parsed.
pub fn load<P: AsRef<Path>>(p: P) -> Result<Config> {
    let text = fs::read_to_string(&p)
        .with_context(|| format!("couldn't read config file {}", p.as_ref().display()))?;
    load_from_str(&text)
}

pub fn load_from_str(text: &str) -> Result<Config> {
    toml::from_str(text).with_context(|| "invalid TOML in config file".to_string())
}
