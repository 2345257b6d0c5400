//! Wallet capability interface and the per-connection session object.
//!
//! A wallet is anything that can expose a public key and sign
//! transactions and raw messages; browser-extension adapters and the
//! CLI's file keypair both fit behind [`WalletSigner`]. The session
//! bundles the active RPC connection with the active signer and is
//! swapped wholesale on connect/disconnect/cluster switch, so there is
//! no ambient global state and multiple sessions can coexist.

use std::future::Future;
use std::path::Path;

use solana_client::nonblocking::rpc_client::RpcClient;
use solana_sdk::commitment_config::CommitmentConfig;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{read_keypair_file, Keypair, Signer};
use solana_sdk::transaction::Transaction;

use crate::error::VaultError;

/// Capability interface over a wallet. Signature requests are
/// user-interactive for extension-backed implementations and may be
/// cancelled; implementations map cancellation to
/// [`VaultError::UserRejected`] rather than hanging.
pub trait WalletSigner: Send + Sync {
    fn pubkey(&self) -> Pubkey;

    /// Signs a fully-built transaction (fee payer and recent blockhash
    /// already set).
    fn sign_transaction(
        &self,
        tx: Transaction,
    ) -> impl Future<Output = Result<Transaction, VaultError>> + Send;

    /// Signs an arbitrary byte message, returning the raw 64-byte
    /// ed25519 signature.
    fn sign_message(
        &self,
        message: &[u8],
    ) -> impl Future<Output = Result<Vec<u8>, VaultError>> + Send;
}

/// File-keypair wallet used by the CLI and by tests.
pub struct KeypairSigner {
    keypair: Keypair,
}

impl KeypairSigner {
    pub fn new(keypair: Keypair) -> Self {
        Self { keypair }
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, VaultError> {
        let keypair = read_keypair_file(&path).map_err(|e| {
            VaultError::Wallet(format!(
                "couldn't read keypair file {}: {e}",
                path.as_ref().display()
            ))
        })?;
        Ok(Self { keypair })
    }
}

impl WalletSigner for KeypairSigner {
    fn pubkey(&self) -> Pubkey {
        self.keypair.pubkey()
    }

    fn sign_transaction(
        &self,
        mut tx: Transaction,
    ) -> impl Future<Output = Result<Transaction, VaultError>> + Send {
        async move {
            let blockhash = tx.message.recent_blockhash;
            tx.try_partial_sign(&[&self.keypair], blockhash)
                .map_err(|e| VaultError::Wallet(format!("signing failed: {e}")))?;
            Ok(tx)
        }
    }

    fn sign_message(
        &self,
        message: &[u8],
    ) -> impl Future<Output = Result<Vec<u8>, VaultError>> + Send {
        let signature = self.keypair.sign_message(message);
        async move { Ok(signature.as_ref().to_vec()) }
    }
}

/// The active connection: RPC endpoint, cluster label, and signer.
/// Owned by one orchestrator instance; never shared through statics.
pub struct ClientSession<S: WalletSigner> {
    rpc: RpcClient,
    endpoint: String,
    cluster: String,
    signer: S,
    pubkey: Pubkey,
}

impl<S: WalletSigner> ClientSession<S> {
    pub fn new(endpoint: &str, cluster: &str, signer: S) -> Self {
        let rpc = RpcClient::new_with_commitment(
            endpoint.to_string(),
            CommitmentConfig::confirmed(),
        );
        Self::with_rpc(rpc, endpoint, cluster, signer)
    }

    /// Builds a session around an existing RPC client. Lets tests
    /// inject a mock transport.
    pub fn with_rpc(rpc: RpcClient, endpoint: &str, cluster: &str, signer: S) -> Self {
        let pubkey = signer.pubkey();
        Self {
            rpc,
            endpoint: endpoint.to_string(),
            cluster: cluster.to_string(),
            signer,
            pubkey,
        }
    }

    /// Rebinds to a different endpoint, keeping the signer. In-flight
    /// operations on the old connection are not interrupted; callers
    /// avoid racing a switch against a pending operation.
    pub fn with_endpoint(self, endpoint: &str, cluster: &str) -> Self {
        Self::new(endpoint, cluster, self.signer)
    }

    pub fn rpc(&self) -> &RpcClient {
        &self.rpc
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn cluster(&self) -> &str {
        &self.cluster
    }

    pub fn signer(&self) -> &S {
        &self.signer
    }

    pub fn pubkey(&self) -> Pubkey {
        self.pubkey
    }
}
