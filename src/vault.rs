//! Public operation surface of the client. Each entry point validates
//! its inputs before any network call, runs the advisory pre-flight
//! checks, sequences encryption, handle discovery, and instruction
//! assembly, then signs and submits through the active session.
//!
//! Pre-flight balance checks are UX, not security: they can go stale
//! between check and submission, and the on-chain program's own
//! validation is always the authoritative rejection. Mid-flight
//! failures (after a signature was produced) are never retried here,
//! to rule out double submission.

use solana_sdk::commitment_config::CommitmentConfig;
use solana_sdk::instruction::Instruction;
use solana_sdk::message::Message;
use solana_sdk::native_token::LAMPORTS_PER_SOL;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::transaction::Transaction;

use serde::Serialize;

use crate::attested_decrypt::AttestedDecryptClient;
use crate::codec::{StealthNoteAccount, UserPositionAccount, VaultAccount};
use crate::config::Config;
use crate::encryptor::{AmountEncryptor, EncryptionBackend, HttpEncryptionBackend};
use crate::error::{classify_chain_error, VaultError};
use crate::instructions::{note_id_from_secret, ProgramContext, VaultInstruction};
use crate::session::{ClientSession, WalletSigner};
use crate::simulation::discover_handles;

/// Kept aside from every deposit so the wallet can still pay fees.
const FEE_BUFFER_LAMPORTS: u64 = LAMPORTS_PER_SOL / 100; // 0.01 SOL

const MIN_SECRET_LEN: usize = 8;

/// Parsed vault metadata, shaped for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VaultMetadataSummary {
    pub authority: String,
    pub bump: u8,
    /// Decimal rendering of the 128-bit balance handle.
    pub encrypted_balance_handle: String,
    /// Little-endian 16-byte hex of the same handle, for debugging.
    pub encrypted_balance_handle_hex_le: String,
    pub total_escrow_lamports: u64,
    pub yield_index: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StealthNoteInfo {
    pub note_id: String,
    pub encrypted_amount_handle: String,
    pub lamports: u64,
    pub sender: String,
    pub created_at: i64,
    pub claimed: bool,
}

#[derive(Debug, Clone)]
pub struct NoteCreation {
    pub signature: String,
    pub note_id: String,
}

/// One instance per logical session; holds no statics, so tests and
/// multiple tabs/processes can run clients side by side.
pub struct VaultClient<S: WalletSigner, B: EncryptionBackend = HttpEncryptionBackend> {
    config: Config,
    program: ProgramContext,
    encryptor: AmountEncryptor<B>,
    decrypt: AttestedDecryptClient,
    session: Option<ClientSession<S>>,
}

impl<S: WalletSigner> VaultClient<S, HttpEncryptionBackend> {
    pub fn new(config: Config) -> anyhow::Result<Self> {
        let backend = HttpEncryptionBackend::new(&config.encryption.endpoint);
        Self::with_backend(config, backend)
    }
}

impl<S: WalletSigner, B: EncryptionBackend> VaultClient<S, B> {
    pub fn with_backend(config: Config, backend: B) -> anyhow::Result<Self> {
        let program = ProgramContext::from_config(&config)?;
        let decrypt =
            AttestedDecryptClient::new(&config.covalidator.endpoint, &config.covalidator.public_key)?;
        let timeout = std::time::Duration::from_secs(config.encryption.timeout_secs);
        Ok(Self {
            config,
            program,
            encryptor: AmountEncryptor::new(backend, timeout),
            decrypt,
            session: None,
        })
    }

    pub fn program(&self) -> &ProgramContext {
        &self.program
    }

    // ---------------------------- session ----------------------------

    /// Binds a wallet, creating the session against the configured
    /// endpoint. Returns the wallet's address.
    pub fn connect_with_signer(&mut self, signer: S) -> Result<Pubkey, VaultError> {
        let session = ClientSession::new(&self.config.rpc.url, &self.config.rpc.cluster, signer);
        let pubkey = session.pubkey();
        self.session = Some(session);
        Ok(pubkey)
    }

    /// Installs a prebuilt session (tests inject a mock RPC this way).
    pub fn attach_session(&mut self, session: ClientSession<S>) {
        self.session = Some(session);
    }

    /// Drops the session wholesale. Any decrypted values cached by a
    /// UI on top of this client must be purged at the same time.
    pub fn disconnect(&mut self) {
        self.session = None;
    }

    /// Points the client at a different cluster. Does not interrupt
    /// in-flight operations; callers avoid racing a switch against a
    /// pending call.
    pub fn set_rpc_endpoint(&mut self, url: &str, cluster: &str) {
        self.config.rpc.url = url.to_string();
        self.config.rpc.cluster = cluster.to_string();
        if let Some(session) = self.session.take() {
            self.session = Some(session.with_endpoint(url, cluster));
        }
    }

    fn session(&self) -> Result<&ClientSession<S>, VaultError> {
        self.session
            .as_ref()
            .ok_or_else(|| VaultError::Wallet("connect a wallet before this operation".into()))
    }

    // --------------------------- operations ---------------------------

    /// One-time vault creation; the connected wallet becomes the
    /// recorded authority.
    pub async fn initialize_vault(&self) -> Result<String, VaultError> {
        let session = self.session()?;
        let me = session.pubkey();
        if self.fetch_vault_state().await.is_ok() {
            return Err(VaultError::Validation("vault is already initialized".into()));
        }
        let ix = self.program.initialize_vault_ix(&me);
        self.send_instruction(ix).await
    }

    pub async fn deposit(&self, amount_sol: f64) -> Result<String, VaultError> {
        self.submit_movement(VaultInstruction::Deposit, amount_sol).await
    }

    pub async fn withdraw(&self, amount_sol: f64) -> Result<String, VaultError> {
        self.submit_movement(VaultInstruction::Withdraw, amount_sol).await
    }

    async fn submit_movement(
        &self,
        kind: VaultInstruction,
        amount_sol: f64,
    ) -> Result<String, VaultError> {
        let lamports = lamports_from_sol(amount_sol)?;
        let session = self.session()?;
        let me = session.pubkey();
        let user_pda = self.program.user_pda(&me);

        match kind {
            VaultInstruction::Deposit => {
                let required = lamports_with_fee_buffer(lamports)?;
                let wallet_lamports = session
                    .rpc()
                    .get_balance(&me)
                    .await
                    .map_err(|e| VaultError::Network(e.to_string()))?;
                if wallet_lamports < required {
                    return Err(VaultError::InsufficientFunds(format!(
                        "wallet holds {wallet_lamports} lamports; {lamports} plus a \
                         {FEE_BUFFER_LAMPORTS}-lamport fee buffer are needed"
                    )));
                }
            }
            VaultInstruction::Withdraw => {
                let escrow = session
                    .rpc()
                    .get_balance(&user_pda)
                    .await
                    .map_err(|e| VaultError::Network(e.to_string()))?;
                if escrow < lamports {
                    return Err(VaultError::InsufficientFunds(format!(
                        "vault escrow holds {escrow} lamports, {lamports} requested"
                    )));
                }
            }
            _ => unreachable!("submit_movement only handles deposit and withdraw"),
        }

        let ciphertext = self.encryptor.encrypt_lamports(lamports).await?;
        let probe = self.program.movement_ix(kind, &me, &ciphertext, lamports, &[]);

        if kind == VaultInstruction::Withdraw {
            // Simulated withdrawal handles do not match the handles the
            // real submission produces, so there is no auto-authorize
            // here; a follow-up claim-access grants decrypt rights.
            println!("[vault] submitting withdrawal; run claim-access afterwards to decrypt the new balance");
            return self.send_instruction(probe).await;
        }

        println!("[vault] simulating deposit to discover the new balance handles...");
        let watch = [user_pda, self.program.vault_pda()];
        match discover_handles(session, probe.clone(), &watch).await {
            Ok(handles) => {
                let pairs = [
                    self.program.allowance_pair(handles[0], me),
                    self.program.allowance_pair(handles[1], me),
                ];
                let ix = self.program.movement_ix(kind, &me, &ciphertext, lamports, &pairs);
                self.send_instruction(ix).await
            }
            Err(VaultError::SimulationFailed(msg)) => {
                // Degraded mode: the deposit lands, but the balance is
                // not decryptable until a claim-access call.
                eprintln!("[vault] simulation failed ({msg}); depositing without auto-authorize");
                self.send_instruction(probe).await
            }
            Err(other) => Err(other),
        }
    }

    pub async fn transfer(&self, amount_sol: f64, recipient: &Pubkey) -> Result<String, VaultError> {
        let lamports = lamports_from_sol(amount_sol)?;
        let session = self.session()?;
        let me = session.pubkey();
        if recipient == &me {
            return Err(VaultError::Validation("cannot transfer to self".into()));
        }

        let sender_pda = self.program.user_pda(&me);
        let escrow = session
            .rpc()
            .get_balance(&sender_pda)
            .await
            .map_err(|e| VaultError::Network(e.to_string()))?;
        if escrow < lamports {
            return Err(VaultError::InsufficientFunds(format!(
                "vault escrow holds {escrow} lamports, {lamports} requested"
            )));
        }

        let ciphertext = self.encryptor.encrypt_lamports(lamports).await?;
        let probe = self.program.transfer_ix(&me, recipient, &ciphertext, lamports, &[]);

        println!("[vault] simulating transfer to discover both parties' new handles...");
        let watch = [sender_pda, self.program.user_pda(recipient)];
        match discover_handles(session, probe.clone(), &watch).await {
            Ok(handles) => {
                let pairs = [
                    self.program.allowance_pair(handles[0], me),
                    self.program.allowance_pair(handles[1], *recipient),
                ];
                let ix = self.program.transfer_ix(&me, recipient, &ciphertext, lamports, &pairs);
                self.send_instruction(ix).await
            }
            Err(VaultError::SimulationFailed(msg)) => {
                eprintln!("[vault] simulation failed ({msg}); transferring without auto-authorize");
                self.send_instruction(probe).await
            }
            Err(other) => Err(other),
        }
    }

    /// Adds yield to the vault. Only the vault's recorded authority
    /// succeeds on-chain; the check below just saves a doomed
    /// signature round-trip.
    pub async fn apply_yield(&self, amount_sol: f64) -> Result<String, VaultError> {
        let lamports = lamports_from_sol(amount_sol)?;
        let session = self.session()?;
        let me = session.pubkey();

        if let Ok(state) = self.fetch_vault_state().await {
            if state.authority != me.to_string() {
                eprintln!(
                    "[vault] warning: connected wallet is not the vault authority; \
                     the program will reject this"
                );
            }
        }

        let ciphertext = self.encryptor.encrypt_lamports(lamports).await?;
        let ix = self.program.apply_yield_ix(&me, &ciphertext, lamports);
        self.send_instruction(ix).await
    }

    pub async fn claim_yield(&self) -> Result<String, VaultError> {
        let session = self.session()?;
        let ix = self.program.claim_yield_ix(&session.pubkey());
        self.send_instruction(ix).await
    }

    /// Grants the connected wallet decrypt rights over its own current
    /// balance handle. Needed after receiving a transfer or after a
    /// withdrawal (whose handle discovery is skipped by design).
    pub async fn claim_access(&self) -> Result<String, VaultError> {
        let session = self.session()?;
        let me = session.pubkey();
        let data = self
            .fetch_account_data(&self.program.user_pda(&me), "user position")
            .await?;
        let position = UserPositionAccount::decode(&data)?;
        let pair = self.program.allowance_pair(position.handle, me);
        let ix = self.program.claim_access_ix(&me, pair);
        self.send_instruction(ix).await
    }

    pub async fn create_stealth_note(
        &self,
        amount_sol: f64,
        secret: &str,
    ) -> Result<NoteCreation, VaultError> {
        let lamports = lamports_from_sol(amount_sol)?;
        validate_secret(secret)?;
        let session = self.session()?;
        let me = session.pubkey();

        let required = lamports_with_fee_buffer(lamports)?;
        let wallet_lamports = session
            .rpc()
            .get_balance(&me)
            .await
            .map_err(|e| VaultError::Network(e.to_string()))?;
        if wallet_lamports < required {
            return Err(VaultError::InsufficientFunds(format!(
                "wallet holds {wallet_lamports} lamports; {lamports} plus a \
                 {FEE_BUFFER_LAMPORTS}-lamport fee buffer are needed"
            )));
        }

        let note_id = note_id_from_secret(secret);
        let ciphertext = self.encryptor.encrypt_lamports(lamports).await?;
        let ix = self.program.create_note_ix(&me, note_id, &ciphertext, lamports);
        let signature = self.send_instruction(ix).await?;
        Ok(NoteCreation {
            signature,
            note_id: hex::encode(note_id),
        })
    }

    pub async fn claim_stealth_note(&self, secret: &str) -> Result<String, VaultError> {
        if secret.trim().is_empty() {
            return Err(VaultError::Validation("secret passphrase is empty".into()));
        }
        let session = self.session()?;
        let me = session.pubkey();
        let note_id = note_id_from_secret(secret);

        let data = self
            .fetch_account_data(&self.program.note_pda(&note_id), "stealth note")
            .await?;
        let note = StealthNoteAccount::decode(&data)?;
        if note.claimed {
            return Err(VaultError::Validation(
                "this stealth note has already been claimed".into(),
            ));
        }

        let probe = self.program.claim_note_ix(&me, &note_id, secret, &[]);
        println!("[vault] simulating note claim to discover the new handles...");
        let watch = [self.program.user_pda(&me), self.program.vault_pda()];
        match discover_handles(session, probe.clone(), &watch).await {
            Ok(handles) => {
                let pairs = [
                    self.program.allowance_pair(handles[0], me),
                    self.program.allowance_pair(handles[1], me),
                ];
                let ix = self.program.claim_note_ix(&me, &note_id, secret, &pairs);
                self.send_instruction(ix).await
            }
            Err(VaultError::SimulationFailed(msg)) => {
                eprintln!("[vault] simulation failed ({msg}); claiming without auto-authorize");
                self.send_instruction(probe).await
            }
            Err(other) => Err(other),
        }
    }

    /// Looks up the note a secret maps to. `None` means no note exists
    /// for that passphrase.
    pub async fn check_stealth_note(&self, secret: &str) -> Result<Option<StealthNoteInfo>, VaultError> {
        let note_id = note_id_from_secret(secret);
        let data = match self
            .fetch_account_data(&self.program.note_pda(&note_id), "stealth note")
            .await
        {
            Ok(data) => data,
            Err(VaultError::NotFound(_)) => return Ok(None),
            Err(other) => return Err(other),
        };
        let note = StealthNoteAccount::decode(&data)?;
        Ok(Some(StealthNoteInfo {
            note_id: hex::encode(note.note_id),
            encrypted_amount_handle: note.handle.to_string(),
            lamports: note.lamports,
            sender: note.sender.to_string(),
            created_at: note.created_at,
            claimed: note.claimed,
        }))
    }

    /// Attested reveal of a handle's plaintext. The result is returned
    /// to the caller and never cached here; a UI must treat it as
    /// ephemeral and purge it on disconnect or visibility loss.
    pub async fn decrypt_balance(&self, handle: u128) -> Result<u128, VaultError> {
        let session = self.session()?;
        let plaintexts = self.decrypt.decrypt_batch(&[handle], session.signer()).await?;
        plaintexts.into_iter().next().ok_or(VaultError::EmptyPlaintext)
    }

    // ----------------------------- reads -----------------------------

    pub async fn fetch_vault_state(&self) -> Result<VaultMetadataSummary, VaultError> {
        let data = self.fetch_account_data(&self.program.vault_pda(), "vault").await?;
        let vault = VaultAccount::decode(&data)?;
        Ok(VaultMetadataSummary {
            authority: vault.authority.to_string(),
            bump: vault.bump,
            encrypted_balance_handle: vault.handle.to_string(),
            encrypted_balance_handle_hex_le: hex::encode(vault.handle.to_le_bytes()),
            total_escrow_lamports: vault.total_escrow_lamports,
            yield_index: vault.yield_index.to_string(),
        })
    }

    pub async fn fetch_user_position_handle(&self) -> Result<u128, VaultError> {
        let session = self.session()?;
        let me = session.pubkey();
        let data = self
            .fetch_account_data(&self.program.user_pda(&me), "user position")
            .await?;
        Ok(UserPositionAccount::decode(&data)?.handle)
    }

    /// Escrowed lamports held by the user's position PDA. Tracked as
    /// the account's native balance, not as an account field.
    pub async fn fetch_user_escrow_balance(&self) -> Result<u64, VaultError> {
        let session = self.session()?;
        let me = session.pubkey();
        session
            .rpc()
            .get_balance(&self.program.user_pda(&me))
            .await
            .map_err(|e| VaultError::Network(e.to_string()))
    }

    pub async fn fetch_user_yield_index(&self) -> Result<u128, VaultError> {
        let session = self.session()?;
        let me = session.pubkey();
        let data = self
            .fetch_account_data(&self.program.user_pda(&me), "user position")
            .await?;
        Ok(UserPositionAccount::decode(&data)?.last_yield_index)
    }

    // ---------------------------- plumbing ----------------------------

    async fn fetch_account_data(
        &self,
        address: &Pubkey,
        what: &'static str,
    ) -> Result<Vec<u8>, VaultError> {
        let session = self.session()?;
        let response = session
            .rpc()
            .get_account_with_commitment(address, CommitmentConfig::confirmed())
            .await
            .map_err(|e| VaultError::Network(e.to_string()))?;
        match response.value {
            Some(account) => Ok(account.data),
            None => Err(VaultError::NotFound(what)),
        }
    }

    async fn send_instruction(&self, ix: Instruction) -> Result<String, VaultError> {
        let session = self.session()?;
        let payer = session.pubkey();
        let message = Message::new(&[ix], Some(&payer));
        let mut tx = Transaction::new_unsigned(message);
        tx.message.recent_blockhash = session
            .rpc()
            .get_latest_blockhash()
            .await
            .map_err(|e| VaultError::Network(format!("couldn't fetch blockhash: {e}")))?;

        let signed = session.signer().sign_transaction(tx).await?;
        let signature = session
            .rpc()
            .send_and_confirm_transaction(&signed)
            .await
            .map_err(|e| classify_chain_error(&e.to_string()))?;
        Ok(signature.to_string())
    }
}

fn lamports_from_sol(amount_sol: f64) -> Result<u64, VaultError> {
    if !amount_sol.is_finite() || amount_sol <= 0.0 {
        return Err(VaultError::Validation(
            "amount must be a positive number of SOL".into(),
        ));
    }
    let lamports = (amount_sol * LAMPORTS_PER_SOL as f64).round();
    // `u64::MAX as f64` rounds up to 2^64, which the cast below would
    // saturate; reject it along with everything above.
    if lamports >= u64::MAX as f64 {
        return Err(VaultError::Validation("amount is too large".into()));
    }
    Ok(lamports as u64)
}

fn lamports_with_fee_buffer(lamports: u64) -> Result<u64, VaultError> {
    lamports.checked_add(FEE_BUFFER_LAMPORTS).ok_or_else(|| {
        VaultError::Validation("amount plus the fee buffer exceeds the lamport range".into())
    })
}

fn validate_secret(secret: &str) -> Result<(), VaultError> {
    if secret.trim().len() < MIN_SECRET_LEN {
        return Err(VaultError::Validation(format!(
            "secret passphrase must be at least {MIN_SECRET_LEN} characters"
        )));
    }
    Ok(())
}
