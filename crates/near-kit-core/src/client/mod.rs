//! Client module for interacting with NEAR Protocol.
//!
//! - [`Near`] - The main client, the single entry point for all operations
//! - [`RpcClient`] - Low-level JSON-RPC client with retry logic
//! - [`NonceManager`] - Per-key nonce cache shared by concurrent senders
//!
//! # Signers
//!
//! | Signer | Use Case |
//! |--------|----------|
//! | [`InMemorySigner`] | Simple scripts with a private key in memory |
//! | [`RotatingSigner`] | High-throughput with multiple keys (avoids nonce collisions) |
//! | [`KeyStoreSigner`] | Keys held in a [`KeyStore`] |
//!
//! # Transaction Builders
//!
//! - [`TransactionBuilder`] - Multi-action transaction builder
//! - [`CallBuilder`] - Function call builder (part of transactions)

mod keystore;
mod near;
mod nonce_manager;
mod rpc;
mod signer;
mod transaction;
mod wallet;

pub use keystore::{InMemoryKeyStore, KeyStore};
pub use near::{Near, NearBuilder};
pub use nonce_manager::NonceManager;
pub use rpc::{
    MAINNET, NetworkConfig, PollConfig, QueryContext, RetryConfig, RpcClient, RpcClientBuilder,
    TESTNET, classify_failure, parse_query_error, parse_rpc_error,
};
pub use signer::{
    InMemorySigner, KeyStoreSigner, RotatingSigner, Signer, SigningBackend, SigningKey,
};
pub use transaction::{
    CallBuilder, DEFAULT_CALL_GAS, DelegateOptions, DelegateResult, TransactionBuilder,
};
pub use wallet::{SignerWallet, TransactionRequest, WalletAccount, WalletAdapter};
