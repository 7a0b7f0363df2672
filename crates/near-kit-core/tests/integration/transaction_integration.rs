//! The send pipeline against a mock node.

use std::collections::HashSet;

use near_kit_core::*;
use serde_json::json;
use wiremock::{MockServer, ResponseTemplate};

use crate::mock_node::*;

// =============================================================================
// Happy path
// =============================================================================

#[tokio::test]
async fn test_transfer_end_to_end() {
    init_tracing();
    let server = MockServer::start().await;
    mount_happy_node(&server).await;
    let near = alice_client(&server);

    let outcome = near
        .transfer("bob.testnet", NearToken::from_near(1))
        .await
        .unwrap();

    assert!(outcome.is_success());
    assert!(
        outcome
            .reached()
            .satisfies(TxExecutionStatus::ExecutedOptimistic)
    );

    let queries = requests_for(&server, "query").await;
    assert_eq!(queries.len(), 1);
    assert_eq!(queries[0]["params"]["request_type"], "view_access_key");
    assert_eq!(queries[0]["params"]["finality"], "optimistic");

    let blocks = requests_for(&server, "block").await;
    assert_eq!(blocks[0]["params"]["finality"], "final");

    let sent = sent_transactions(&server).await;
    assert_eq!(sent.len(), 1);
    let signed = &sent[0];
    assert!(signed.verify());
    assert_eq!(signed.transaction.signer_id.as_str(), ALICE);
    assert_eq!(signed.transaction.public_key, alice_public_key());
    assert_eq!(signed.transaction.receiver_id.as_str(), "bob.testnet");
    assert_eq!(signed.transaction.nonce, CHAIN_NONCE + 1);
    assert_eq!(signed.transaction.block_hash, block_hash());
    assert_eq!(
        signed.transaction.actions,
        vec![Action::transfer(NearToken::from_near(1))]
    );

    let send = requests_for(&server, "send_tx").await;
    assert_eq!(send[0]["params"]["wait_until"], "EXECUTED_OPTIMISTIC");
}

#[tokio::test]
async fn test_nonce_is_cached_between_sends() {
    let server = MockServer::start().await;
    mount_happy_node(&server).await;
    let near = alice_client(&server);

    for _ in 0..3 {
        near.transfer("bob.testnet", NearToken::from_near(1))
            .await
            .unwrap();
    }

    assert_eq!(requests_for(&server, "query").await.len(), 1);
    let nonces: Vec<u64> = sent_transactions(&server)
        .await
        .iter()
        .map(|tx| tx.transaction.nonce)
        .collect();
    assert_eq!(nonces, [501, 502, 503]);
}

#[tokio::test]
async fn test_concurrent_sends_share_one_fetch() {
    let server = MockServer::start().await;
    mount_happy_node(&server).await;
    let near = alice_client(&server);

    let (a, b, c) = tokio::join!(
        near.transfer("bob.testnet", NearToken::from_near(1)).send(),
        near.transfer("carol.testnet", NearToken::from_near(2)).send(),
        near.call("app.testnet", "ping").args(json!({})).send(),
    );
    a.unwrap();
    b.unwrap();
    c.unwrap();

    assert_eq!(requests_for(&server, "query").await.len(), 1);
    let nonces: HashSet<u64> = sent_transactions(&server)
        .await
        .iter()
        .map(|tx| tx.transaction.nonce)
        .collect();
    assert_eq!(nonces, HashSet::from([501, 502, 503]));
}

#[tokio::test]
async fn test_rotating_signer_keeps_a_nonce_per_key() {
    let server = MockServer::start().await;
    mount_happy_node(&server).await;

    let keys = vec![SecretKey::generate_ed25519(), SecretKey::generate_ed25519()];
    let signer = RotatingSigner::new(ALICE, keys).unwrap();
    let public_keys = signer.public_keys();
    let near = Near::custom(server.uri())
        .signer(signer)
        .retry_config(fast_retry())
        .build()
        .unwrap();

    for _ in 0..4 {
        near.transfer("bob.testnet", NearToken::from_near(1))
            .await
            .unwrap();
    }

    // One fetch per key.
    assert_eq!(requests_for(&server, "query").await.len(), 2);
    let sent: Vec<(PublicKey, u64)> = sent_transactions(&server)
        .await
        .into_iter()
        .map(|tx| (tx.transaction.public_key, tx.transaction.nonce))
        .collect();
    assert_eq!(
        sent,
        [
            (public_keys[0].clone(), 501),
            (public_keys[1].clone(), 501),
            (public_keys[0].clone(), 502),
            (public_keys[1].clone(), 502),
        ]
    );
}

#[tokio::test]
async fn test_keystore_signer_sends() {
    let server = MockServer::start().await;
    mount_happy_node(&server).await;

    let store = InMemoryKeyStore::new();
    let signer = KeyStoreSigner::import(
        &store,
        ALICE,
        ALICE_KEY.parse::<KeyPair>().unwrap(),
    )
    .unwrap();
    let near = Near::custom(server.uri()).signer(signer).build().unwrap();

    near.transfer("bob.testnet", NearToken::from_near(1))
        .await
        .unwrap();

    assert_eq!(store.list().unwrap(), [ALICE.parse::<AccountId>().unwrap()]);
    assert!(sent_transactions(&server).await[0].verify());
}

// =============================================================================
// Invalid nonce recovery
// =============================================================================

#[tokio::test]
async fn test_invalid_nonce_is_retried_once_with_chain_nonce() {
    let server = MockServer::start().await;
    mount(&server, "query", rpc_ok(access_key(CHAIN_NONCE))).await;
    mount(&server, "block", rpc_ok(block())).await;
    mount_times(&server, "send_tx", invalid_nonce(501, 510), 1).await;
    mount(&server, "send_tx", rpc_ok(outcome("EXECUTED_OPTIMISTIC"))).await;
    let near = alice_client(&server);

    let outcome = near
        .transfer("bob.testnet", NearToken::from_near(1))
        .await
        .unwrap();
    assert!(outcome.is_success());

    let sent = sent_transactions(&server).await;
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[0].transaction.nonce, 501);
    assert_eq!(sent[1].transaction.nonce, 511);
    assert!(sent[1].verify());
    // The retry reuses the cache; no second fetch.
    assert_eq!(requests_for(&server, "query").await.len(), 1);

    near.transfer("bob.testnet", NearToken::from_near(1))
        .await
        .unwrap();
    assert_eq!(sent_transactions(&server).await[2].transaction.nonce, 512);
}

#[tokio::test]
async fn test_invalid_nonce_twice_surfaces_error() {
    let server = MockServer::start().await;
    mount(&server, "query", rpc_ok(access_key(CHAIN_NONCE))).await;
    mount(&server, "block", rpc_ok(block())).await;
    mount(&server, "send_tx", invalid_nonce(501, 900)).await;
    let near = alice_client(&server);

    let err = near
        .transfer("bob.testnet", NearToken::from_near(1))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        Error::Rpc(RpcError::InvalidNonce { ak_nonce: 900, .. })
    ));
    assert_eq!(sent_transactions(&server).await.len(), 2);
}

#[tokio::test]
async fn test_other_errors_are_not_retried() {
    let server = MockServer::start().await;
    mount(&server, "query", rpc_ok(access_key(CHAIN_NONCE))).await;
    mount(&server, "block", rpc_ok(block())).await;
    mount(
        &server,
        "send_tx",
        rpc_err(
            "INVALID_TRANSACTION",
            json!({"TxExecutionError": {"InvalidTxError": {"NotEnoughBalance": {
                "signer_id": ALICE,
                "balance": "100",
                "cost": "1000000000000000000000000",
            }}}}),
        ),
    )
    .await;
    let near = alice_client(&server);

    let err = near
        .transfer("bob.testnet", NearToken::from_near(1))
        .await
        .unwrap_err();

    match err {
        Error::Rpc(RpcError::InsufficientBalance {
            required,
            available,
        }) => {
            assert_eq!(required, NearToken::from_near(1));
            assert_eq!(available, NearToken::from_yoctonear(100));
        }
        other => panic!("expected insufficient balance, got {other:?}"),
    }
    assert_eq!(sent_transactions(&server).await.len(), 1);
}

// =============================================================================
// Waiting
// =============================================================================

#[tokio::test]
async fn test_node_timeout_falls_back_to_polling() {
    let server = MockServer::start().await;
    mount(&server, "query", rpc_ok(access_key(CHAIN_NONCE))).await;
    mount(&server, "block", rpc_ok(block())).await;
    mount(&server, "send_tx", rpc_err("TIMEOUT_ERROR", json!({}))).await;
    mount(&server, "tx", rpc_ok(outcome("FINAL"))).await;
    let near = alice_client(&server);

    let outcome = near
        .transfer("bob.testnet", NearToken::from_near(1))
        .wait_until(TxExecutionStatus::Final)
        .await
        .unwrap();
    assert!(outcome.is_success());

    let polls = requests_for(&server, "tx").await;
    let signed = &sent_transactions(&server).await[0];
    assert_eq!(polls[0]["params"]["tx_hash"], signed.hash().to_string());
    assert_eq!(polls[0]["params"]["sender_account_id"], ALICE);
    assert_eq!(polls[0]["params"]["wait_until"], "FINAL");
}

#[tokio::test]
async fn test_http_408_from_send_falls_back_to_polling() {
    let server = MockServer::start().await;
    mount(&server, "query", rpc_ok(access_key(CHAIN_NONCE))).await;
    mount(&server, "block", rpc_ok(block())).await;
    mount(
        &server,
        "send_tx",
        ResponseTemplate::new(408).set_body_json(json!({
            "jsonrpc": "2.0",
            "id": 0,
            "error": {
                "name": "HANDLER_ERROR",
                "cause": {"name": "TIMEOUT_ERROR", "info": {}},
                "code": -32000,
                "message": "Server error",
            },
        })),
    )
    .await;
    mount(&server, "tx", rpc_ok(outcome("FINAL"))).await;
    let near = alice_client(&server);

    let outcome = near
        .transfer("bob.testnet", NearToken::from_near(1))
        .wait_until(TxExecutionStatus::Final)
        .await
        .unwrap();

    assert!(outcome.is_success());
    // The same signed transaction is resubmitted, then polled.
    let sent = sent_transactions(&server).await;
    assert_eq!(sent.len(), 3);
    assert!(sent.iter().all(|tx| tx.hash() == sent[0].hash()));
    assert_eq!(requests_for(&server, "tx").await.len(), 1);
}

#[tokio::test]
async fn test_outcome_below_threshold_is_polled() {
    let server = MockServer::start().await;
    mount(&server, "query", rpc_ok(access_key(CHAIN_NONCE))).await;
    mount(&server, "block", rpc_ok(block())).await;
    mount(&server, "send_tx", rpc_ok(outcome("INCLUDED"))).await;
    mount(&server, "tx", rpc_ok(outcome("EXECUTED"))).await;
    let near = alice_client(&server);

    let outcome = near
        .transfer("bob.testnet", NearToken::from_near(1))
        .wait_until(TxExecutionStatus::Executed)
        .await
        .unwrap();

    assert_eq!(outcome.reached(), TxExecutionStatus::Executed);
    assert_eq!(requests_for(&server, "tx").await.len(), 1);
}

#[tokio::test]
async fn test_polling_gives_up_with_transaction_timeout() {
    let server = MockServer::start().await;
    mount(&server, "query", rpc_ok(access_key(CHAIN_NONCE))).await;
    mount(&server, "block", rpc_ok(block())).await;
    mount(&server, "send_tx", rpc_err("TIMEOUT_ERROR", json!({}))).await;
    mount(&server, "tx", rpc_err("UNKNOWN_TRANSACTION", json!({}))).await;
    let near = alice_client(&server);

    let err = near
        .transfer("bob.testnet", NearToken::from_near(1))
        .await
        .unwrap_err();

    let signed = &sent_transactions(&server).await[0];
    assert!(matches!(
        err,
        Error::Rpc(RpcError::TransactionTimeout { transaction_hash, .. })
            if transaction_hash == signed.hash()
    ));
}

// =============================================================================
// Execution failures
// =============================================================================

#[tokio::test]
async fn test_contract_panic_in_outcome() {
    let server = MockServer::start().await;
    mount(&server, "query", rpc_ok(access_key(CHAIN_NONCE))).await;
    mount(&server, "block", rpc_ok(block())).await;
    mount(
        &server,
        "send_tx",
        rpc_ok(failed_outcome(json!({"ActionError": {
            "index": 0,
            "kind": {"FunctionCallError": {"HostError": {"GuestPanic": {"panic_msg": "not enough stock"}}}},
        }}))),
    )
    .await;
    let near = alice_client(&server);

    let err = near
        .call("shop.testnet", "buy")
        .args(json!({"item": "apple"}))
        .deposit(NearToken::from_near(1))
        .await
        .unwrap_err();

    match err {
        Error::Rpc(RpcError::ContractCall {
            contract_id, panic, ..
        }) => {
            assert_eq!(contract_id.as_str(), "shop.testnet");
            assert_eq!(panic.as_deref(), Some("not enough stock"));
        }
        other => panic!("expected contract call error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_gas_exhaustion_in_outcome() {
    let server = MockServer::start().await;
    mount(&server, "query", rpc_ok(access_key(CHAIN_NONCE))).await;
    mount(&server, "block", rpc_ok(block())).await;
    mount(
        &server,
        "send_tx",
        rpc_ok(failed_outcome(json!({"ActionError": {
            "index": 0,
            "kind": {"FunctionCallError": {"HostError": "GasExceeded"}},
        }}))),
    )
    .await;
    let near = alice_client(&server);

    let err = near
        .call("app.testnet", "heavy")
        .gas(Gas::from_tgas(5))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Rpc(RpcError::GasLimitExceeded { .. })));
}

// =============================================================================
// Sign without sending
// =============================================================================

#[tokio::test]
async fn test_sign_only_consumes_a_nonce() {
    let server = MockServer::start().await;
    mount_happy_node(&server).await;
    let near = alice_client(&server);

    let signed = near
        .transaction("bob.testnet")
        .transfer(NearToken::from_near(1))
        .sign()
        .await
        .unwrap();
    assert_eq!(signed.transaction.nonce, 501);
    assert!(signed.verify());
    assert!(requests_for(&server, "send_tx").await.is_empty());

    near.transfer("bob.testnet", NearToken::from_near(1))
        .await
        .unwrap();
    assert_eq!(sent_transactions(&server).await[0].transaction.nonce, 502);

    near.invalidate_nonce(&ALICE.parse().unwrap(), &alice_public_key());
    near.transfer("bob.testnet", NearToken::from_near(1))
        .await
        .unwrap();
    assert_eq!(requests_for(&server, "query").await.len(), 2);
    assert_eq!(sent_transactions(&server).await[1].transaction.nonce, 501);
}

// =============================================================================
// Meta-transactions
// =============================================================================

#[tokio::test]
async fn test_delegate_then_relay() {
    let server = MockServer::start().await;
    mount_happy_node(&server).await;
    let near = alice_client(&server);

    let result = near
        .call("guestbook.testnet", "add_message")
        .args(json!({"text": "hello"}))
        .delegate(DelegateOptions::default())
        .await
        .unwrap();

    let delegate = &result.signed_delegate_action.delegate_action;
    assert_eq!(delegate.nonce, CHAIN_NONCE + 1);
    assert_eq!(delegate.max_block_height, BLOCK_HEIGHT + 200);
    assert_eq!(delegate.public_key, alice_public_key());
    assert!(result.signed_delegate_action.verify());

    let decoded = SignedDelegateAction::from_base64(&result.payload).unwrap();
    assert_eq!(decoded, result.signed_delegate_action);

    let relayer = Near::custom(server.uri())
        .signer(InMemorySigner::from_secret_key(
            "relayer.testnet".parse().unwrap(),
            SecretKey::generate_ed25519(),
        ))
        .build()
        .unwrap();
    relayer
        .transaction(decoded.sender_id().as_str())
        .signed_delegate_action(decoded.clone())
        .await
        .unwrap();

    let sent = sent_transactions(&server).await;
    let relayed = &sent[0].transaction;
    assert_eq!(relayed.signer_id.as_str(), "relayer.testnet");
    assert_eq!(relayed.receiver_id.as_str(), ALICE);
    assert_eq!(relayed.actions, vec![Action::delegate(decoded)]);
}

#[tokio::test]
async fn test_delegate_with_explicit_height_skips_block_query() {
    let server = MockServer::start().await;
    mount_happy_node(&server).await;
    let near = alice_client(&server);

    let result = near
        .transaction("bob.testnet")
        .transfer(NearToken::from_near(1))
        .delegate(DelegateOptions::with_max_height(5_000))
        .await
        .unwrap();

    assert_eq!(
        result.signed_delegate_action.delegate_action.max_block_height,
        5_000
    );
    assert!(requests_for(&server, "block").await.is_empty());
}
