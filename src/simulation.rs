//! Handle discovery. Encryption on the FHE network is
//! non-deterministic, so the ciphertext handle an operation will
//! produce cannot be computed from its inputs — yet the allowance
//! accounts that authorize decrypting that handle must ride in the
//! same transaction. The way out is to dry-run the bare instruction,
//! read the post-state bytes of the affected accounts, and parse the
//! would-be handles out of them; the caller then derives allowance
//! PDAs from those handles and rebuilds the real instruction.
//!
//! Withdrawals are the documented exception: their simulated handles
//! diverge from the handles the real submission produces, so the
//! withdrawal path skips discovery and relies on a later explicit
//! claim-access call.

use solana_account_decoder::UiAccountEncoding;
use solana_client::rpc_config::{
    RpcSimulateTransactionAccountsConfig, RpcSimulateTransactionConfig,
};
use solana_sdk::account::Account;
use solana_sdk::commitment_config::CommitmentConfig;
use solana_sdk::instruction::Instruction;
use solana_sdk::message::Message;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::transaction::Transaction;

use crate::codec::{parse_handle, HANDLE_OFFSET};
use crate::error::VaultError;
use crate::session::{ClientSession, WalletSigner};

fn simulate_config(watch: &[Pubkey], sig_verify: bool) -> RpcSimulateTransactionConfig {
    RpcSimulateTransactionConfig {
        sig_verify,
        // The two flags are mutually exclusive on the RPC side; the
        // unsigned probe borrows the node's blockhash, the signed
        // fallback carries its own.
        replace_recent_blockhash: !sig_verify,
        commitment: Some(CommitmentConfig::confirmed()),
        accounts: Some(RpcSimulateTransactionAccountsConfig {
            encoding: Some(UiAccountEncoding::Base64),
            addresses: watch.iter().map(|p| p.to_string()).collect(),
        }),
        ..RpcSimulateTransactionConfig::default()
    }
}

/// Dry-runs `probe` (an instruction without trailing allowance
/// accounts) and returns the post-transaction ciphertext handles of
/// the `watch` accounts, in order.
///
/// Tries an unsigned simulation first to avoid a needless wallet
/// prompt; if the backend rejects unsigned transactions, falls back to
/// a wallet-signed simulation. Neither path submits anything.
pub async fn discover_handles<S: WalletSigner>(
    session: &ClientSession<S>,
    probe: Instruction,
    watch: &[Pubkey],
) -> Result<Vec<u128>, VaultError> {
    let payer = session.pubkey();
    let message = Message::new(&[probe], Some(&payer));
    let mut tx = Transaction::new_unsigned(message);

    let result = match session
        .rpc()
        .simulate_transaction_with_config(&tx, simulate_config(watch, false))
        .await
    {
        Ok(response) => response,
        Err(_) => {
            // Unsigned simulation refused; sign and retry. Still a
            // dry run.
            let blockhash = session
                .rpc()
                .get_latest_blockhash()
                .await
                .map_err(|e| VaultError::Network(format!("couldn't fetch blockhash: {e}")))?;
            tx.message.recent_blockhash = blockhash;
            let signed = session.signer().sign_transaction(tx).await?;
            session
                .rpc()
                .simulate_transaction_with_config(&signed, simulate_config(watch, true))
                .await
                .map_err(|e| VaultError::SimulationFailed(e.to_string()))?
        }
    };

    if let Some(err) = result.value.err {
        return Err(VaultError::SimulationFailed(format!(
            "{err:?}; logs: {:?}",
            result.value.logs.unwrap_or_default()
        )));
    }

    let accounts = result.value.accounts.ok_or_else(|| {
        VaultError::SimulationFailed("simulation returned no account data".into())
    })?;
    if accounts.len() < watch.len() {
        return Err(VaultError::SimulationFailed(format!(
            "asked for {} post-state accounts, got {}",
            watch.len(),
            accounts.len()
        )));
    }

    let mut handles = Vec::with_capacity(watch.len());
    for (address, slot) in watch.iter().zip(accounts) {
        let ui_account = slot.ok_or_else(|| {
            VaultError::SimulationFailed(format!("no post-state data for account {address}"))
        })?;
        let account: Account = ui_account.decode().ok_or_else(|| {
            VaultError::SimulationFailed(format!("undecodable post-state data for {address}"))
        })?;
        handles.push(parse_handle(&account.data, HANDLE_OFFSET)?);
    }
    Ok(handles)
}
