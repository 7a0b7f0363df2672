//! RpcClient against a mock node: retries, error classification, headers.

use std::time::{Duration, Instant};

use near_kit_core::*;
use serde_json::json;
use wiremock::matchers::{header, method};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::mock_node::*;

fn client(server: &MockServer) -> RpcClient {
    RpcClient::builder(server.uri())
        .retry_config(fast_retry())
        .build()
        .unwrap()
}

// =============================================================================
// Retry policy
// =============================================================================

#[tokio::test]
async fn test_retryable_status_is_retried_until_exhausted() {
    init_tracing();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
        .mount(&server)
        .await;

    let err = client(&server).gas_price(None).await.unwrap_err();

    match err {
        RpcError::Network {
            status_code,
            retryable,
            ..
        } => {
            assert_eq!(status_code, Some(503));
            assert!(retryable);
        }
        other => panic!("expected network error, got {other:?}"),
    }
    // First attempt plus max_retries.
    assert_eq!(requests_for(&server, "gas_price").await.len(), 3);
}

#[tokio::test]
async fn test_recovers_after_transient_failure() {
    let server = MockServer::start().await;
    mount_times(&server, "gas_price", ResponseTemplate::new(502), 1).await;
    mount(&server, "gas_price", rpc_ok(json!({"gas_price": "100000000"}))).await;

    let price = client(&server).gas_price(None).await.unwrap();

    assert_eq!(price.gas_price, NearToken::from_yoctonear(100_000_000));
    assert_eq!(requests_for(&server, "gas_price").await.len(), 2);
}

#[tokio::test]
async fn test_client_error_status_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(400).set_body_string("bad request"))
        .mount(&server)
        .await;

    let err = client(&server).gas_price(None).await.unwrap_err();

    assert!(!err.is_retryable());
    assert!(matches!(
        err,
        RpcError::Network {
            status_code: Some(400),
            ..
        }
    ));
    assert_eq!(requests_for(&server, "gas_price").await.len(), 1);
}

#[tokio::test]
async fn test_error_envelope_is_classified_on_non_retryable_status() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "jsonrpc": "2.0",
            "id": 0,
            "error": {
                "name": "REQUEST_VALIDATION_ERROR",
                "cause": {"name": "PARSE_ERROR", "info": {}},
                "code": -32700,
                "message": "Parse error",
                "data": "invalid params",
            },
        })))
        .mount(&server)
        .await;

    let err = client(&server).gas_price(None).await.unwrap_err();

    assert_eq!(err, RpcError::ParseError("invalid params".to_string()));
    assert_eq!(requests_for(&server, "gas_price").await.len(), 1);
}

#[tokio::test]
async fn test_rate_limit_with_error_body_is_retried() {
    init_tracing();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(429).set_body_json(json!({"error": "rate limit exceeded"})),
        )
        .mount(&server)
        .await;

    let err = client(&server).gas_price(None).await.unwrap_err();

    match err {
        RpcError::Network {
            status_code,
            retryable,
            payload,
            ..
        } => {
            assert_eq!(status_code, Some(429));
            assert!(retryable);
            assert_eq!(payload, Some(json!("rate limit exceeded")));
        }
        other => panic!("expected network error, got {other:?}"),
    }
    assert_eq!(requests_for(&server, "gas_price").await.len(), 3);
}

#[tokio::test]
async fn test_server_error_envelope_is_retried_then_recovers() {
    let server = MockServer::start().await;
    mount_times(
        &server,
        "gas_price",
        ResponseTemplate::new(503).set_body_json(json!({
            "jsonrpc": "2.0",
            "id": 0,
            "error": {
                "name": "INTERNAL_ERROR",
                "cause": {"name": "INTERNAL_ERROR", "info": {}},
                "code": -32000,
                "message": "Server error",
            },
        })),
        1,
    )
    .await;
    mount(&server, "gas_price", rpc_ok(json!({"gas_price": "100000000"}))).await;

    let price = client(&server).gas_price(None).await.unwrap();

    assert_eq!(price.gas_price, NearToken::from_yoctonear(100_000_000));
    assert_eq!(requests_for(&server, "gas_price").await.len(), 2);
}

#[tokio::test]
async fn test_connection_refused_is_retryable() {
    // Nothing listens on the discard port.
    let err = RpcClient::builder("http://127.0.0.1:9")
        .retry_config(fast_retry())
        .build()
        .unwrap()
        .gas_price(None)
        .await
        .unwrap_err();

    assert!(err.is_retryable(), "got {err:?}");
}

// =============================================================================
// Query error classification
// =============================================================================

#[tokio::test]
async fn test_missing_method_is_a_contract_call_error() {
    let server = MockServer::start().await;
    mount(
        &server,
        "query",
        rpc_ok(json!({
            "error": "wasm execution failed with error: FunctionCallError(MethodResolveError(MethodNotFound)): Method get_count does not exist",
            "logs": [],
            "block_height": BLOCK_HEIGHT,
            "block_hash": block_hash(),
        })),
    )
    .await;

    let contract: AccountId = "counter.testnet".parse().unwrap();
    let err = client(&server)
        .view_function(&contract, "get_count", b"{}", BlockReference::optimistic())
        .await
        .unwrap_err();

    match err {
        RpcError::ContractCall {
            contract_id,
            method_name,
            ..
        } => {
            assert_eq!(contract_id, contract);
            assert_eq!(method_name.as_deref(), Some("get_count"));
        }
        other => panic!("expected contract call error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_contract_panic_message_is_extracted() {
    let server = MockServer::start().await;
    mount(
        &server,
        "query",
        rpc_ok(json!({
            "error": "wasm execution failed with error: FunctionCallError(HostError(GuestPanic { panic_msg: \"Smart contract panicked: counter overflow\")))",
            "logs": [],
            "block_height": BLOCK_HEIGHT,
            "block_hash": block_hash(),
        })),
    )
    .await;

    let err = client(&server)
        .view_function(
            &"counter.testnet".parse().unwrap(),
            "increment",
            b"{}",
            BlockReference::final_(),
        )
        .await
        .unwrap_err();

    assert!(
        matches!(&err, RpcError::ContractCall { panic: Some(p), .. } if p == "counter overflow"),
        "got {err:?}"
    );
}

#[tokio::test]
async fn test_unknown_account() {
    let server = MockServer::start().await;
    mount(
        &server,
        "query",
        rpc_err(
            "UNKNOWN_ACCOUNT",
            json!({"requested_account_id": "ghost.testnet", "block_height": BLOCK_HEIGHT}),
        ),
    )
    .await;

    let err = client(&server)
        .view_account(&"ghost.testnet".parse().unwrap(), BlockReference::final_())
        .await
        .unwrap_err();

    assert!(err.is_account_not_found());
}

#[tokio::test]
async fn test_unknown_access_key_uses_query_context() {
    let server = MockServer::start().await;
    mount(
        &server,
        "query",
        rpc_err("UNKNOWN_ACCESS_KEY", json!({"block_height": BLOCK_HEIGHT})),
    )
    .await;

    let account: AccountId = ALICE.parse().unwrap();
    let err = client(&server)
        .view_access_key(&account, &alice_public_key(), BlockReference::final_())
        .await
        .unwrap_err();

    assert_eq!(
        err,
        RpcError::AccessKeyNotFound {
            account_id: account,
            public_key: alice_public_key(),
        }
    );
}

#[tokio::test]
async fn test_unrecognized_error_keeps_payload() {
    let server = MockServer::start().await;
    mount(
        &server,
        "block",
        rpc_err("SOMETHING_NEW", json!({"detail": 1})),
    )
    .await;

    let err = client(&server)
        .block(BlockReference::final_())
        .await
        .unwrap_err();

    match err {
        RpcError::Network {
            retryable, payload, ..
        } => {
            assert!(!retryable);
            assert_eq!(payload.unwrap()["cause"]["name"], "SOMETHING_NEW");
        }
        other => panic!("expected unclassified error, got {other:?}"),
    }
}

// =============================================================================
// Requests
// =============================================================================

#[tokio::test]
async fn test_query_params_carry_block_reference() {
    let server = MockServer::start().await;
    mount(&server, "query", rpc_ok(access_key(CHAIN_NONCE))).await;

    let key = client(&server)
        .view_access_key(
            &ALICE.parse().unwrap(),
            &alice_public_key(),
            BlockReference::optimistic(),
        )
        .await
        .unwrap();
    assert_eq!(key.nonce, CHAIN_NONCE);

    let requests = requests_for(&server, "query").await;
    let params = &requests[0]["params"];
    assert_eq!(params["request_type"], "view_access_key");
    assert_eq!(params["account_id"], ALICE);
    assert_eq!(params["public_key"], alice_public_key().to_string());
    assert_eq!(params["finality"], "optimistic");
}

#[tokio::test]
async fn test_default_headers_are_sent() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(header("x-api-key", "secret"))
        .respond_with(rpc_ok(block()))
        .mount(&server)
        .await;

    let client = RpcClient::builder(server.uri())
        .header("x-api-key", "secret")
        .build()
        .unwrap();
    let block = client.block(BlockReference::final_()).await.unwrap();

    assert_eq!(block.header.height, BLOCK_HEIGHT);
    assert_eq!(block.header.hash, block_hash());
}

#[tokio::test]
async fn test_broadcast_async_returns_hash() {
    let server = MockServer::start().await;
    let hash = CryptoHash::hash(b"tx");
    mount(&server, "broadcast_tx_async", rpc_ok(json!(hash))).await;

    let secret: SecretKey = ALICE_KEY.parse().unwrap();
    let signed = Transaction {
        signer_id: ALICE.parse().unwrap(),
        public_key: secret.public_key(),
        nonce: 1,
        receiver_id: "bob.testnet".parse().unwrap(),
        block_hash: block_hash(),
        actions: vec![Action::transfer(NearToken::from_near(1))],
    }
    .sign(&secret)
    .unwrap();

    let returned = client(&server).broadcast_tx_async(&signed).await.unwrap();
    assert_eq!(returned, hash);

    let requests = requests_for(&server, "broadcast_tx_async").await;
    assert_eq!(requests[0]["params"][0], signed.to_base64());
}

// =============================================================================
// Outcome polling
// =============================================================================

#[tokio::test]
async fn test_wait_for_outcome_polls_until_level_reached() {
    let server = MockServer::start().await;
    mount_times(&server, "tx", rpc_err("UNKNOWN_TRANSACTION", json!({})), 1).await;
    mount_times(&server, "tx", rpc_ok(outcome("INCLUDED")), 1).await;
    mount(&server, "tx", rpc_ok(outcome("FINAL"))).await;

    let hash = CryptoHash::hash(b"tx");
    let outcome = client(&server)
        .wait_for_outcome(
            &hash,
            &ALICE.parse().unwrap(),
            TxExecutionStatus::Final,
            fast_poll(),
        )
        .await
        .unwrap();

    assert_eq!(outcome.reached(), TxExecutionStatus::Final);
    assert_eq!(requests_for(&server, "tx").await.len(), 3);
}

#[tokio::test]
async fn test_wait_for_outcome_times_out() {
    let server = MockServer::start().await;
    mount(&server, "tx", rpc_ok(outcome("INCLUDED"))).await;

    let hash = CryptoHash::hash(b"stuck");
    let err = client(&server)
        .wait_for_outcome(
            &hash,
            &ALICE.parse().unwrap(),
            TxExecutionStatus::Final,
            fast_poll(),
        )
        .await
        .unwrap_err();

    match err {
        RpcError::TransactionTimeout {
            transaction_hash,
            waited,
        } => {
            assert_eq!(transaction_hash, hash);
            assert!(waited >= fast_poll().timeout);
        }
        other => panic!("expected timeout, got {other:?}"),
    }
}

#[tokio::test]
async fn test_wait_for_outcome_gives_up_on_a_slow_status_query() {
    let server = MockServer::start().await;
    mount(
        &server,
        "tx",
        rpc_ok(outcome("FINAL")).set_delay(Duration::from_secs(2)),
    )
    .await;

    let hash = CryptoHash::hash(b"slow");
    let started = Instant::now();
    let err = client(&server)
        .wait_for_outcome(
            &hash,
            &ALICE.parse().unwrap(),
            TxExecutionStatus::Final,
            fast_poll(),
        )
        .await
        .unwrap_err();

    assert!(
        matches!(err, RpcError::TransactionTimeout { transaction_hash, .. } if transaction_hash == hash),
        "got {err:?}"
    );
    assert!(started.elapsed() < Duration::from_secs(1));
}
