//! Error types for near-kit-core.
//!
//! # Error Hierarchy
//!
//! - [`Error`](enum@Error) - Main error type, returned by most operations
//!   - [`RpcError`] - Classified RPC and execution failures
//!   - [`ParseKeyError`] - Invalid key or signature format
//!   - [`ParseHashError`] - Invalid hash format
//!   - [`SignerError`] - Signing operation failures
//!   - [`KeyStoreError`] - Key storage failures
//!   - [`WalletError`] - Wallet adapter failures
//!
//! Every variant is a stable discriminant. Callers branch on the variant,
//! never on the rendered message:
//!
//! ```rust,no_run
//! use near_kit_core::*;
//!
//! # async fn example(near: Near) -> Result<(), Error> {
//! match near.transfer("bob.testnet", NearToken::from_near(1)).await {
//!     Ok(outcome) => println!("success: {}", outcome.is_success()),
//!     Err(Error::Rpc(RpcError::InsufficientBalance { required, available })) => {
//!         println!("need {required}, have {available}");
//!     }
//!     Err(Error::Rpc(e)) if e.is_retryable() => println!("try again later: {e}"),
//!     Err(e) => return Err(e),
//! }
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use near_token::NearToken;
use serde_json::Value;
use thiserror::Error;

use crate::types::{AccountId, CryptoHash, DelegateDecodeError, PublicKey};

/// Error parsing a public key, secret key or signature.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ParseKeyError {
    #[error("Invalid key format: expected 'ed25519:...' or 'secp256k1:...'")]
    InvalidFormat,

    #[error("Unknown key type: '{0}'")]
    UnknownKeyType(String),

    #[error("Invalid base58 encoding: {0}")]
    InvalidBase58(String),

    #[error("Invalid key length: expected {expected} bytes, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    #[error("Invalid curve point: key bytes do not represent a valid point on the curve")]
    InvalidCurvePoint,
}

/// Error parsing a crypto hash.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ParseHashError {
    #[error("Invalid base58 encoding: {0}")]
    InvalidBase58(String),

    #[error("Invalid hash length: expected 32 bytes, got {0}")]
    InvalidLength(usize),
}

/// Error during signing operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SignerError {
    #[error("Signing failed: {0}")]
    SigningFailed(String),

    #[error("Invalid secret key: {0}")]
    InvalidSecretKey(String),

    #[error("Signer has no keys")]
    NoKeys,
}

/// Error during key storage operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum KeyStoreError {
    #[error("Key not found for account: {0}")]
    KeyNotFound(AccountId),

    #[error("Key store backend error: {0}")]
    Backend(String),
}

/// Error reported by a wallet adapter.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum WalletError {
    #[error("Wallet does not support {0}")]
    Unsupported(&'static str),

    #[error("Account {0} is not managed by this wallet")]
    UnknownAccount(AccountId),

    #[error("Wallet rejected the request: {0}")]
    Rejected(String),

    #[error("Wallet error: {0}")]
    Other(String),
}

// ============================================================================
// RPC Errors
// ============================================================================

/// Classified RPC and execution errors.
///
/// Cloneable so that a single failed request can be reported to every
/// caller waiting on it.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum RpcError {
    // ─── Network/Transport ───
    #[error("Network error: {message}")]
    Network {
        message: String,
        status_code: Option<u16>,
        retryable: bool,
        /// Raw error payload when the envelope could not be classified.
        payload: Option<Value>,
    },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    // ─── Account Errors ───
    #[error("Account not found: {0}")]
    AccountNotFound(AccountId),

    #[error("Invalid account ID: {0}")]
    InvalidAccount(String),

    #[error("Access key not found: {account_id} / {public_key}")]
    AccessKeyNotFound {
        account_id: AccountId,
        public_key: PublicKey,
    },

    // ─── Contract Errors ───
    #[error("Contract not deployed on account: {0}")]
    ContractNotDeployed(AccountId),

    #[error("Contract call failed on {contract_id}: {message}")]
    ContractCall {
        contract_id: AccountId,
        method_name: Option<String>,
        panic: Option<String>,
        message: String,
    },

    // ─── Block Errors ───
    #[error("Block not found: {0}")]
    UnknownBlock(String),

    // ─── Transaction Errors ───
    #[error("Transaction not found: {0}")]
    UnknownTransaction(String),

    #[error("Invalid transaction: {message}")]
    InvalidTransaction {
        message: String,
        details: Option<Value>,
    },

    #[error("Invalid nonce: transaction nonce {tx_nonce} must be greater than access key nonce {ak_nonce}")]
    InvalidNonce { tx_nonce: u64, ak_nonce: u64 },

    #[error("Insufficient balance: required {required}, available {available}")]
    InsufficientBalance {
        required: NearToken,
        available: NearToken,
    },

    #[error("Gas limit exceeded: {message}")]
    GasLimitExceeded { message: String },

    #[error("Execution failed: {message}")]
    ExecutionFailed { message: String, details: Value },

    // ─── Node Errors ───
    #[error("Shard unavailable: {0}")]
    ShardUnavailable(String),

    #[error("Node not synced: {0}")]
    NodeNotSynced(String),

    #[error("Internal server error: {0}")]
    InternalError(String),

    // ─── Request Errors ───
    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Request timeout: {message}")]
    RequestTimeout {
        message: String,
        transaction_hash: Option<String>,
    },

    /// The client stopped waiting. The transaction may still execute.
    #[error("Stopped waiting for transaction {transaction_hash} after {waited:?}")]
    TransactionTimeout {
        transaction_hash: CryptoHash,
        waited: Duration,
    },
}

impl RpcError {
    /// Check if this error is retryable.
    ///
    /// Only transport failures flagged at classification time are retried.
    /// Semantic errors reported by the node are surfaced as-is.
    pub fn is_retryable(&self) -> bool {
        matches!(self, RpcError::Network { retryable: true, .. })
    }

    /// Create a network error.
    pub fn network(message: impl Into<String>, status_code: Option<u16>, retryable: bool) -> Self {
        RpcError::Network {
            message: message.into(),
            status_code,
            retryable,
            payload: None,
        }
    }

    /// Create a non-retryable network error carrying an unclassified payload.
    pub fn unclassified(message: impl Into<String>, payload: Value) -> Self {
        RpcError::Network {
            message: message.into(),
            status_code: None,
            retryable: false,
            payload: Some(payload),
        }
    }

    /// Returns true if this error indicates the account was not found.
    pub fn is_account_not_found(&self) -> bool {
        matches!(self, RpcError::AccountNotFound(_))
    }
}

// ============================================================================
// Main Error Type
// ============================================================================

/// Main error type for near-kit-core operations.
#[derive(Debug, Error)]
pub enum Error {
    // ─── Configuration ───
    #[error("No signer configured. Call .signer() on NearBuilder or .sign_with() on the transaction.")]
    NoSigner,

    #[error("Invalid configuration: {0}")]
    Config(String),

    // ─── Parsing ───
    #[error("Invalid account ID: {0}")]
    InvalidAccountId(#[from] near_account_id::ParseAccountError),

    #[error(transparent)]
    InvalidKey(#[from] ParseKeyError),

    #[error(transparent)]
    ParseHash(#[from] ParseHashError),

    // ─── Signing ───
    #[error("Signing failed: {0}")]
    Signing(#[from] SignerError),

    // ─── RPC ───
    #[error(transparent)]
    Rpc(#[from] RpcError),

    // ─── Transaction ───
    #[error("Invalid transaction: {0}")]
    InvalidTransaction(String),

    // ─── Collaborators ───
    #[error(transparent)]
    KeyStore(#[from] KeyStoreError),

    #[error(transparent)]
    Wallet(#[from] WalletError),

    // ─── Serialization ───
    #[error("Delegate action decode error: {0}")]
    DelegateDecode(#[from] DelegateDecodeError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Borsh error: {0}")]
    Borsh(#[from] borsh::io::Error),
}
