//! A scripted JSON-RPC node on top of wiremock.

use std::time::Duration;

use near_kit_core::*;
use serde_json::{Value, json};
use wiremock::matchers::{body_partial_json, method};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const ALICE: &str = "alice.testnet";
pub const ALICE_KEY: &str = "ed25519:3D4YudUahN1nawWogh8pAKSj92sUNMdbZGjn7kERKzYoTy8tnFQuwoGUC51DowKqorvkr2pytJSnwuSbsNVfqygr";

pub const CHAIN_NONCE: u64 = 500;
pub const BLOCK_HEIGHT: u64 = 1_000;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn fast_retry() -> RetryConfig {
    RetryConfig {
        max_retries: 2,
        initial_delay_ms: 1,
        max_delay_ms: 2,
    }
}

pub fn fast_poll() -> PollConfig {
    PollConfig {
        interval: Duration::from_millis(5),
        timeout: Duration::from_millis(100),
    }
}

pub fn block_hash() -> CryptoHash {
    CryptoHash::hash(b"block-1000")
}

pub fn alice_public_key() -> PublicKey {
    ALICE_KEY.parse::<SecretKey>().unwrap().public_key()
}

/// A client signing as alice against `server`.
pub fn alice_client(server: &MockServer) -> Near {
    Near::custom(server.uri())
        .credentials(ALICE_KEY, ALICE)
        .unwrap()
        .retry_config(fast_retry())
        .poll_config(fast_poll())
        .build()
        .unwrap()
}

// ============================================================================
// Responses
// ============================================================================

pub fn rpc_ok(result: Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "jsonrpc": "2.0",
        "id": 0,
        "result": result,
    }))
}

pub fn rpc_err(cause: &str, info: Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "jsonrpc": "2.0",
        "id": 0,
        "error": {
            "name": "HANDLER_ERROR",
            "cause": {"name": cause, "info": info},
            "code": -32000,
            "message": "Server error",
        },
    }))
}

pub fn invalid_nonce(tx_nonce: u64, ak_nonce: u64) -> ResponseTemplate {
    rpc_err(
        "INVALID_TRANSACTION",
        json!({"TxExecutionError": {"InvalidTxError": {
            "InvalidNonce": {"tx_nonce": tx_nonce, "ak_nonce": ak_nonce},
        }}}),
    )
}

pub fn access_key(nonce: u64) -> Value {
    json!({
        "nonce": nonce,
        "permission": "FullAccess",
        "block_height": BLOCK_HEIGHT,
        "block_hash": block_hash(),
    })
}

pub fn block() -> Value {
    json!({
        "author": "node.testnet",
        "header": {
            "height": BLOCK_HEIGHT,
            "hash": block_hash(),
            "prev_hash": CryptoHash::default(),
            "epoch_id": CryptoHash::default(),
            "timestamp": 1_700_000_000_000_000_000u64,
            "gas_price": "100000000",
        },
    })
}

pub fn outcome(level: &str) -> Value {
    json!({
        "final_execution_status": level,
        "status": {"SuccessValue": ""},
    })
}

pub fn failed_outcome(failure: Value) -> Value {
    json!({
        "final_execution_status": "EXECUTED_OPTIMISTIC",
        "status": {"Failure": failure},
    })
}

// ============================================================================
// Mounting and inspection
// ============================================================================

pub async fn mount(server: &MockServer, rpc_method: &str, response: ResponseTemplate) {
    Mock::given(method("POST"))
        .and(body_partial_json(json!({"method": rpc_method})))
        .respond_with(response)
        .mount(server)
        .await;
}

/// Serve `response` for the next `times` calls only. Mounted first, it
/// shadows later mocks for the same method until used up.
pub async fn mount_times(
    server: &MockServer,
    rpc_method: &str,
    response: ResponseTemplate,
    times: u64,
) {
    Mock::given(method("POST"))
        .and(body_partial_json(json!({"method": rpc_method})))
        .respond_with(response)
        .up_to_n_times(times)
        .mount(server)
        .await;
}

/// A node that knows alice's key and accepts transactions.
pub async fn mount_happy_node(server: &MockServer) {
    mount(server, "query", rpc_ok(access_key(CHAIN_NONCE))).await;
    mount(server, "block", rpc_ok(block())).await;
    mount(server, "send_tx", rpc_ok(outcome("EXECUTED_OPTIMISTIC"))).await;
}

/// JSON bodies of the requests received for `rpc_method`, in order.
pub async fn requests_for(server: &MockServer, rpc_method: &str) -> Vec<Value> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter_map(|request| request.body_json::<Value>().ok())
        .filter(|body| body["method"] == rpc_method)
        .collect()
}

/// Decode the signed transactions submitted through `send_tx`.
pub async fn sent_transactions(server: &MockServer) -> Vec<SignedTransaction> {
    requests_for(server, "send_tx")
        .await
        .iter()
        .map(|body| {
            let encoded = body["params"]["signed_tx_base64"].as_str().unwrap();
            SignedTransaction::from_base64(encoded).unwrap()
        })
        .collect()
}
