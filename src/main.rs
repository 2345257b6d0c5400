use clap::{Parser, Subcommand};
use solana_sdk::native_token::LAMPORTS_PER_SOL;
use solana_sdk::pubkey::Pubkey;
use std::str::FromStr;

use alphavault::{config, Config, KeypairSigner, VaultClient};

#[derive(Parser)]
#[command(author, version, about = "alphavault - confidential balance vault client")]
struct Cli {
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Path to the signing keypair (JSON byte array, solana-keygen format)
    #[arg(short, long, default_value = "wallet.json")]
    keypair: String,

    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Show vault metadata (authority, escrow, yield index, balance handle)
    Status,
    /// One-time vault creation; the signing wallet becomes the authority
    Init,
    /// Deposit SOL into the vault under an encrypted balance
    Deposit { amount_sol: f64 },
    /// Withdraw SOL from your encrypted position
    Withdraw { amount_sol: f64 },
    /// Transfer encrypted value to another vault user
    Transfer {
        amount_sol: f64,
        recipient: String,
    },
    /// Add yield to the vault (authority only)
    ApplyYield { amount_sol: f64 },
    /// Fold accrued yield into your encrypted balance
    ClaimYield,
    /// Grant yourself decrypt rights over your current balance handle
    ClaimAccess,
    /// Lock SOL under a secret passphrase for an unnamed recipient
    NoteCreate {
        amount_sol: f64,
        secret: String,
    },
    /// Claim a stealth note by its secret passphrase
    NoteClaim { secret: String },
    /// Look up a stealth note without claiming it
    NoteCheck { secret: String },
    /// Show your encrypted position and decrypt its balance
    Position,
    /// Attested decrypt of an arbitrary handle you have access to
    Decrypt { handle: u128 },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let cfg = match config::load(&cli.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("⚠️  Could not read config from '{}': {e}; using devnet defaults", cli.config);
            Config::default()
        }
    };

    let signer = KeypairSigner::from_file(&cli.keypair)?;
    let mut client = VaultClient::new(cfg)?;
    let me = client.connect_with_signer(signer)?;
    println!("🔑 Wallet: {me}");

    match cli.cmd {
        Cmd::Status => {
            let state = client.fetch_vault_state().await?;
            println!("🏦 Vault");
            println!("   Authority:      {}", state.authority);
            println!(
                "   Total escrow:   {} SOL ({} lamports)",
                sol(state.total_escrow_lamports),
                state.total_escrow_lamports
            );
            println!("   Yield index:    {}", state.yield_index);
            println!("   Balance handle: {}", state.encrypted_balance_handle);
            println!("   Handle (hex):   {}", state.encrypted_balance_handle_hex_le);
        }
        Cmd::Init => {
            let sig = client.initialize_vault().await?;
            println!("✅ Vault initialized: {sig}");
        }
        Cmd::Deposit { amount_sol } => {
            let sig = client.deposit(amount_sol).await?;
            println!("✅ Deposited {amount_sol} SOL: {sig}");
        }
        Cmd::Withdraw { amount_sol } => {
            let sig = client.withdraw(amount_sol).await?;
            println!("✅ Withdrew {amount_sol} SOL: {sig}");
            println!("   Run `claim-access` to regain decrypt rights over the new balance.");
        }
        Cmd::Transfer { amount_sol, recipient } => {
            let recipient = Pubkey::from_str(&recipient)
                .map_err(|e| anyhow::anyhow!("invalid recipient address: {e}"))?;
            let sig = client.transfer(amount_sol, &recipient).await?;
            println!("✅ Transferred {amount_sol} SOL to {recipient}: {sig}");
        }
        Cmd::ApplyYield { amount_sol } => {
            let sig = client.apply_yield(amount_sol).await?;
            println!("✅ Applied {amount_sol} SOL of yield: {sig}");
        }
        Cmd::ClaimYield => {
            let sig = client.claim_yield().await?;
            println!("✅ Yield claimed: {sig}");
        }
        Cmd::ClaimAccess => {
            let sig = client.claim_access().await?;
            println!("✅ Decrypt access claimed: {sig}");
        }
        Cmd::NoteCreate { amount_sol, secret } => {
            let created = client.create_stealth_note(amount_sol, &secret).await?;
            println!("✅ Stealth note created: {}", created.signature);
            println!("   Note id: {}", created.note_id);
            println!("   Share the secret passphrase out of band; anyone holding it can claim.");
        }
        Cmd::NoteClaim { secret } => {
            let sig = client.claim_stealth_note(&secret).await?;
            println!("✅ Stealth note claimed: {sig}");
        }
        Cmd::NoteCheck { secret } => match client.check_stealth_note(&secret).await? {
            Some(note) => {
                println!("📝 Stealth note {}", note.note_id);
                println!("   Amount:  {} SOL ({} lamports)", sol(note.lamports), note.lamports);
                println!("   Sender:  {}", note.sender);
                println!("   Created: {}", note.created_at);
                println!("   Claimed: {}", note.claimed);
            }
            None => println!("📝 No stealth note exists for that secret"),
        },
        Cmd::Position => {
            let escrow = client.fetch_user_escrow_balance().await?;
            let yield_index = client.fetch_user_yield_index().await?;
            let handle = client.fetch_user_position_handle().await?;
            println!("👤 Position");
            println!("   Escrow:         {} SOL ({escrow} lamports)", sol(escrow));
            println!("   Yield index:    {yield_index}");
            println!("   Balance handle: {handle}");
            print!("   Decrypting balance via covalidator... ");
            match client.decrypt_balance(handle).await {
                Ok(plaintext) => {
                    println!("done");
                    println!("   Balance:        {} SOL ({plaintext} lamports)", sol_u128(plaintext));
                }
                Err(e) => {
                    println!();
                    eprintln!("⚠️  Decrypt failed: {e}");
                    eprintln!("   If access was never granted, run `claim-access` first.");
                }
            }
        }
        Cmd::Decrypt { handle } => {
            let plaintext = client.decrypt_balance(handle).await?;
            println!("🔓 Handle {handle} decrypts to {plaintext}");
        }
    }

    Ok(())
}

fn sol(lamports: u64) -> f64 {
    lamports as f64 / LAMPORTS_PER_SOL as f64
}

fn sol_u128(lamports: u128) -> f64 {
    lamports as f64 / LAMPORTS_PER_SOL as f64
}
