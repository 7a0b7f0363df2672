//! NEP-413 sign and verify round trips, with the key check served by a mock
//! node.

use near_kit_core::*;
use serde_json::json;
use wiremock::{MockServer, ResponseTemplate};

use crate::mock_node::*;

fn login_params() -> nep413::SignMessageParams {
    nep413::SignMessageParams {
        message: "Login to MyApp".to_string(),
        recipient: "myapp.com".to_string(),
        nonce: nep413::generate_nonce(),
        callback_url: None,
        state: Some("session-1".to_string()),
    }
}

async fn signed_login(near: &Near) -> (nep413::SignedMessage, nep413::SignMessageParams) {
    let params = login_params();
    let signed = near.sign_message(&params).await.unwrap();
    (signed, params)
}

#[tokio::test]
async fn test_full_access_key_verifies() {
    let server = MockServer::start().await;
    mount(&server, "query", rpc_ok(access_key(CHAIN_NONCE))).await;
    let near = alice_client(&server);

    let (signed, params) = signed_login(&near).await;
    assert!(
        near.verify_message(&signed, &params, nep413::VerifyOptions::default())
            .await
            .unwrap()
    );

    let queries = requests_for(&server, "query").await;
    assert_eq!(queries[0]["params"]["public_key"], alice_public_key().to_string());
}

#[tokio::test]
async fn test_function_call_key_is_rejected() {
    let server = MockServer::start().await;
    mount(
        &server,
        "query",
        rpc_ok(json!({
            "nonce": 1,
            "permission": {"FunctionCall": {
                "allowance": null,
                "receiver_id": "myapp.com",
                "method_names": [],
            }},
            "block_height": BLOCK_HEIGHT,
            "block_hash": block_hash(),
        })),
    )
    .await;
    let near = alice_client(&server);

    let (signed, params) = signed_login(&near).await;
    assert!(
        !near
            .verify_message(&signed, &params, nep413::VerifyOptions::default())
            .await
            .unwrap()
    );
    // Without the full-access requirement the signature alone decides.
    assert!(
        near.verify_message(
            &signed,
            &params,
            nep413::VerifyOptions {
                require_full_access: false
            },
        )
        .await
        .unwrap()
    );
}

#[tokio::test]
async fn test_unknown_key_is_rejected() {
    let server = MockServer::start().await;
    mount(&server, "query", rpc_err("UNKNOWN_ACCESS_KEY", json!({}))).await;
    let near = alice_client(&server);

    let (signed, params) = signed_login(&near).await;
    assert!(
        !near
            .verify_message(&signed, &params, nep413::VerifyOptions::default())
            .await
            .unwrap()
    );
}

#[tokio::test]
async fn test_tampered_message_fails_without_rpc() {
    let server = MockServer::start().await;
    let near = alice_client(&server);

    let (signed, mut params) = signed_login(&near).await;
    params.recipient = "evil.com".to_string();

    assert!(
        !near
            .verify_message(&signed, &params, nep413::VerifyOptions::default())
            .await
            .unwrap()
    );
    assert!(requests_for(&server, "query").await.is_empty());
}

#[tokio::test]
async fn test_node_outage_is_an_error_not_a_rejection() {
    let server = MockServer::start().await;
    mount(&server, "query", ResponseTemplate::new(503)).await;
    let near = alice_client(&server);

    let (signed, params) = signed_login(&near).await;
    let err = near
        .verify_message(&signed, &params, nep413::VerifyOptions::default())
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Rpc(e) if e.is_retryable()));
}

#[tokio::test]
async fn test_auth_payload_round_trip() {
    let server = MockServer::start().await;
    mount(&server, "query", rpc_ok(access_key(CHAIN_NONCE))).await;
    let near = alice_client(&server);

    let (signed, params) = signed_login(&near).await;
    let body = serde_json::to_string(&nep413::AuthPayload::from_signed(signed, &params)).unwrap();

    // What a backend does with the posted body.
    let payload: nep413::AuthPayload = serde_json::from_str(&body).unwrap();
    let claimed = payload.to_params();
    assert_eq!(claimed, params);
    assert!(
        nep413::verify(
            &payload.signed_message,
            &claimed,
            near.rpc(),
            nep413::VerifyOptions::default(),
        )
        .await
        .unwrap()
    );
}
