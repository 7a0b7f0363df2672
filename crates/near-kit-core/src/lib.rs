//! Transaction signing, nonce management and RPC plumbing for NEAR Protocol.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use near_kit_core::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Error> {
//!     let near = Near::testnet()
//!         .credentials("ed25519:...", "alice.testnet")?
//!         .build()?;
//!
//!     let outcome = near
//!         .transfer("bob.testnet", NearToken::from_near(1))
//!         .wait_until(TxExecutionStatus::Final)
//!         .await?;
//!     println!("success: {}", outcome.is_success());
//!
//!     Ok(())
//! }
//! ```
//!
//! # Layers
//!
//! - [`types`] - byte-exact wire encodings: transactions, actions, delegate
//!   actions (NEP-366) and signed messages ([`nep413`])
//! - [`RpcClient`] - JSON-RPC transport with retries and a typed error
//!   taxonomy ([`RpcError`])
//! - [`NonceManager`] - concurrent senders on one key never reuse a nonce
//! - [`TransactionBuilder`] - sign, send and wait, retrying once on a stale
//!   nonce
//! - [`Near`] - the facade tying a signer, an RPC client and a nonce cache
//!   together

pub mod client;
pub mod error;
pub mod types;

pub use error::{
    Error, KeyStoreError, ParseHashError, ParseKeyError, RpcError, SignerError, WalletError,
};
pub use types::nep413;
pub use types::*;

pub use client::{
    CallBuilder, DEFAULT_CALL_GAS, DelegateOptions, DelegateResult, InMemoryKeyStore,
    InMemorySigner, KeyStore, KeyStoreSigner, MAINNET, Near, NearBuilder, NetworkConfig,
    NonceManager, PollConfig, QueryContext, RetryConfig, RotatingSigner, RpcClient,
    RpcClientBuilder, Signer, SignerWallet, SigningBackend, SigningKey, TESTNET,
    TransactionBuilder, TransactionRequest, WalletAccount, WalletAdapter, classify_failure,
    parse_query_error, parse_rpc_error,
};
