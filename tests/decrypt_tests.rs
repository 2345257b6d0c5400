// Attested decrypt flow against a local mock covalidator.

use std::io::Read;
use std::sync::mpsc;

use ed25519_dalek::{Signature, Signer as _, SigningKey, Verifier, VerifyingKey};
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_sdk::signature::Keypair;
use tiny_http::{Header, Response, Server};

use alphavault::attested_decrypt::attestation_message;
use alphavault::{
    AttestedDecryptClient, ClientSession, Config, KeypairSigner, VaultClient, VaultError,
    WalletSigner, MAX_DECRYPT_BATCH,
};

fn covalidator_signing_key() -> SigningKey {
    SigningKey::from_bytes(&[7u8; 32])
}

fn covalidator_key_b58() -> String {
    bs58::encode(covalidator_signing_key().verifying_key().as_bytes()).into_string()
}

/// Serves exactly one request, replying with `body` at `status`, and
/// forwards the request body it saw over the channel.
fn one_shot_server(status: u16, body: String) -> (String, mpsc::Receiver<String>) {
    let server = Server::http("127.0.0.1:0").unwrap();
    let port = server.server_addr().to_ip().unwrap().port();
    let (tx, rx) = mpsc::channel();
    std::thread::spawn(move || {
        if let Ok(mut request) = server.recv() {
            let mut seen = String::new();
            let _ = request.as_reader().read_to_string(&mut seen);
            let _ = tx.send(seen);
            let header = Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..]).unwrap();
            let _ = request.respond(Response::from_string(body).with_status_code(status).with_header(header));
        }
    });
    (format!("http://127.0.0.1:{port}/crypto/getDecryptAttested"), rx)
}

#[tokio::test]
async fn decrypts_a_handle_with_a_valid_attestation() {
    let handle: u128 = 42;
    let plaintext: u128 = 123_456_789;
    let wallet = KeypairSigner::new(Keypair::new());
    let wallet_pubkey = wallet.pubkey();

    let attestation = covalidator_signing_key()
        .sign(&attestation_message(handle, plaintext, &wallet_pubkey));
    let body = serde_json::json!({
        "handle_value": handle.to_string(),
        "plaintext": plaintext.to_string(),
        "signature": bs58::encode(attestation.to_bytes()).into_string(),
    })
    .to_string();

    let (endpoint, requests) = one_shot_server(200, body);
    let client = AttestedDecryptClient::new(&endpoint, &covalidator_key_b58()).unwrap();
    let plaintexts = client.decrypt_batch(&[handle], &wallet).await.unwrap();
    assert_eq!(plaintexts, vec![plaintext]);

    // The request must carry the decimal handle, the base58 address,
    // and a wallet signature over the handle's hex rendering.
    let seen: serde_json::Value = serde_json::from_str(&requests.recv().unwrap()).unwrap();
    assert_eq!(seen["handle"], "42");
    assert_eq!(seen["address"], wallet_pubkey.to_string());
    let signature_bytes = bs58::decode(seen["signature"].as_str().unwrap()).into_vec().unwrap();
    let wallet_key = VerifyingKey::from_bytes(&wallet_pubkey.to_bytes()).unwrap();
    let signature = Signature::from_slice(&signature_bytes).unwrap();
    assert!(
        wallet_key.verify(b"2a", &signature).is_ok(),
        "wallet signature must cover the hex rendering of the handle"
    );
}

#[tokio::test]
async fn orchestrator_decrypts_a_balance_through_the_session() {
    let handle: u128 = 42;
    let plaintext: u128 = 123_456_789;
    let wallet = KeypairSigner::new(Keypair::new());
    let wallet_pubkey = wallet.pubkey();

    let attestation = covalidator_signing_key()
        .sign(&attestation_message(handle, plaintext, &wallet_pubkey));
    let body = serde_json::json!({
        "plaintext": plaintext.to_string(),
        "signature": bs58::encode(attestation.to_bytes()).into_string(),
    })
    .to_string();
    let (endpoint, _requests) = one_shot_server(200, body);

    let mut cfg = Config::default();
    cfg.covalidator.endpoint = endpoint;
    cfg.covalidator.public_key = covalidator_key_b58();

    let mut client = VaultClient::new(cfg).unwrap();

    // No session yet: the reveal must be refused before any request.
    match client.decrypt_balance(handle).await {
        Err(VaultError::Wallet(_)) => {}
        other => panic!("expected a wallet error without a session, got {other:?}"),
    }

    let rpc = RpcClient::new_mock("fails".to_string());
    client.attach_session(ClientSession::with_rpc(rpc, "mock://", "devnet", wallet));
    assert_eq!(client.decrypt_balance(handle).await.unwrap(), plaintext);
}

#[tokio::test]
async fn oversized_batches_are_rejected_before_any_network_call() {
    let wallet = KeypairSigner::new(Keypair::new());
    // Unroutable endpoint: reaching the network would hang or error
    // differently, so the typed rejection proves the early exit.
    let client = AttestedDecryptClient::new("http://127.0.0.1:1", &covalidator_key_b58()).unwrap();

    let handles = vec![1u128; MAX_DECRYPT_BATCH + 1];
    match client.decrypt_batch(&handles, &wallet).await {
        Err(VaultError::BatchTooLarge(n)) => assert_eq!(n, MAX_DECRYPT_BATCH + 1),
        other => panic!("expected BatchTooLarge, got {other:?}"),
    }

    match client.decrypt_batch(&[], &wallet).await {
        Err(VaultError::Validation(_)) => {}
        other => panic!("expected a validation error for empty input, got {other:?}"),
    }
}

#[tokio::test]
async fn empty_plaintext_is_a_typed_error() {
    let body = serde_json::json!({"plaintext": "", "signature": ""}).to_string();
    let (endpoint, _requests) = one_shot_server(200, body);
    let client = AttestedDecryptClient::new(&endpoint, &covalidator_key_b58()).unwrap();
    let wallet = KeypairSigner::new(Keypair::new());

    match client.decrypt_batch(&[7], &wallet).await {
        Err(VaultError::EmptyPlaintext) => {}
        other => panic!("expected EmptyPlaintext, got {other:?}"),
    }
}

#[tokio::test]
async fn forbidden_responses_map_to_authorization_required() {
    let (endpoint, _requests) = one_shot_server(403, "decrypt not allowed for this address".into());
    let client = AttestedDecryptClient::new(&endpoint, &covalidator_key_b58()).unwrap();
    let wallet = KeypairSigner::new(Keypair::new());

    match client.decrypt_batch(&[7], &wallet).await {
        Err(VaultError::AuthorizationRequired(_)) => {}
        other => panic!("expected AuthorizationRequired, got {other:?}"),
    }
}

#[test]
fn rejects_malformed_covalidator_keys() {
    assert!(AttestedDecryptClient::new("http://x", "not-base58!!!").is_err());
    assert!(AttestedDecryptClient::new("http://x", &bs58::encode([1u8; 16]).into_string()).is_err());
}
