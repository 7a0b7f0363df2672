//! The main Near client.

use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;

use crate::error::Error;
use crate::types::nep413::{self, SignMessageParams, SignedMessage, VerifyOptions};
use crate::types::{
    AccessKeyListView, AccountId, AccountView, BlockReference, NearToken, PublicKey,
    TxExecutionStatus,
};

use super::nonce_manager::NonceManager;
use super::rpc::{MAINNET, NetworkConfig, PollConfig, RetryConfig, RpcClient, TESTNET};
use super::signer::{InMemorySigner, Signer};
use super::transaction::{CallBuilder, TransactionBuilder};
use super::wallet::SignerWallet;

/// The main client for interacting with NEAR Protocol.
///
/// Owns the RPC client, an optional signer, and the nonce cache shared by
/// every transaction sent through it. Cloning is cheap and clones share all
/// three.
///
/// # Example
///
/// ```rust,no_run
/// use near_kit_core::*;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Error> {
///     // Read-only client (no signer)
///     let near = Near::testnet().build()?;
///     let account = near.account("alice.testnet").await?;
///     println!("Balance: {}", account.amount);
///
///     // Client with signer for transactions
///     let near = Near::testnet()
///         .credentials("ed25519:...", "alice.testnet")?
///         .build()?;
///     near.transfer("bob.testnet", NearToken::from_near(1)).await?;
///
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct Near {
    rpc: Arc<RpcClient>,
    signer: Option<Arc<dyn Signer>>,
    nonces: Arc<NonceManager>,
    network_id: Option<&'static str>,
    wait_until: TxExecutionStatus,
    poll: PollConfig,
}

impl Near {
    /// Create a builder for mainnet.
    pub fn mainnet() -> NearBuilder {
        NearBuilder::new(MAINNET.rpc_url, Some(MAINNET.network_id))
    }

    /// Create a builder for testnet.
    pub fn testnet() -> NearBuilder {
        NearBuilder::new(TESTNET.rpc_url, Some(TESTNET.network_id))
    }

    /// Create a builder with a custom RPC URL.
    pub fn custom(rpc_url: impl Into<String>) -> NearBuilder {
        NearBuilder::new(rpc_url, None)
    }

    /// Create a builder from a network preset.
    pub fn network(config: NetworkConfig) -> NearBuilder {
        NearBuilder::new(config.rpc_url, Some(config.network_id))
    }

    /// Create a configured client from environment variables.
    ///
    /// - `NEAR_NETWORK`: `"mainnet"`, `"testnet"`, or a custom RPC URL.
    ///   Defaults to testnet.
    /// - `NEAR_ACCOUNT_ID` and `NEAR_PRIVATE_KEY`: signing credentials. Both
    ///   or neither must be set.
    pub fn from_env() -> Result<Near, Error> {
        let builder = match std::env::var("NEAR_NETWORK").as_deref() {
            Ok("mainnet") => Near::mainnet(),
            Ok("testnet") | Err(_) => Near::testnet(),
            Ok(url) => Near::custom(url),
        };

        let account_id = std::env::var("NEAR_ACCOUNT_ID").ok();
        let private_key = std::env::var("NEAR_PRIVATE_KEY").ok();
        let builder = match (account_id, private_key) {
            (Some(account_id), Some(private_key)) => {
                builder.credentials(private_key, account_id)?
            }
            (None, None) => builder,
            (Some(_), None) => {
                return Err(Error::Config(
                    "NEAR_ACCOUNT_ID is set but NEAR_PRIVATE_KEY is not".to_string(),
                ));
            }
            (None, Some(_)) => {
                return Err(Error::Config(
                    "NEAR_PRIVATE_KEY is set but NEAR_ACCOUNT_ID is not".to_string(),
                ));
            }
        };
        builder.build()
    }

    /// Get the underlying RPC client.
    pub fn rpc(&self) -> &RpcClient {
        &self.rpc
    }

    pub fn rpc_url(&self) -> &str {
        self.rpc.url()
    }

    /// `"mainnet"`/`"testnet"` for presets, `None` for custom endpoints.
    pub fn network_id(&self) -> Option<&'static str> {
        self.network_id
    }

    /// The signer's account ID, if a signer is configured.
    pub fn account_id(&self) -> Option<&AccountId> {
        self.signer.as_ref().map(|s| s.account_id())
    }

    pub(crate) fn signer(&self) -> Option<&Arc<dyn Signer>> {
        self.signer.as_ref()
    }

    // ========================================================================
    // Read Operations
    // ========================================================================

    /// Call a view function with JSON arguments and decode the JSON result.
    ///
    /// ```rust,no_run
    /// # use near_kit_core::*;
    /// # async fn example(near: Near) -> Result<(), Error> {
    /// let count: u64 = near.view("counter.testnet", "get_count", serde_json::json!({})).await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn view<T: DeserializeOwned>(
        &self,
        contract_id: impl AsRef<str>,
        method: &str,
        args: impl serde::Serialize,
    ) -> Result<T, Error> {
        let contract_id: AccountId = contract_id.as_ref().parse()?;
        let args = serde_json::to_vec(&args)?;
        let result = self
            .rpc
            .view_function(&contract_id, method, &args, BlockReference::optimistic())
            .await?;
        Ok(result.json()?)
    }

    /// Get account information.
    pub async fn account(&self, account_id: impl AsRef<str>) -> Result<AccountView, Error> {
        let account_id: AccountId = account_id.as_ref().parse()?;
        Ok(self
            .rpc
            .view_account(&account_id, BlockReference::optimistic())
            .await?)
    }

    /// List the access keys of an account.
    pub async fn access_keys(
        &self,
        account_id: impl AsRef<str>,
    ) -> Result<AccessKeyListView, Error> {
        let account_id: AccountId = account_id.as_ref().parse()?;
        Ok(self
            .rpc
            .view_access_key_list(&account_id, BlockReference::optimistic())
            .await?)
    }

    // ========================================================================
    // Off-Chain Signing (NEP-413)
    // ========================================================================

    /// Sign a message for authentication or proof of account ownership.
    ///
    /// ```rust,no_run
    /// # use near_kit_core::*;
    /// # async fn example(near: Near) -> Result<(), Error> {
    /// let signed = near.sign_message(&nep413::SignMessageParams {
    ///     message: "Login to MyApp".to_string(),
    ///     recipient: "myapp.com".to_string(),
    ///     nonce: nep413::generate_nonce(),
    ///     callback_url: None,
    ///     state: None,
    /// }).await?;
    /// println!("Signed by: {}", signed.account_id);
    /// # Ok(())
    /// # }
    /// ```
    pub async fn sign_message(&self, params: &SignMessageParams) -> Result<SignedMessage, Error> {
        let signer = self.signer.as_ref().ok_or(Error::NoSigner)?;
        let key = signer.key();
        Ok(key.sign_nep413(signer.account_id(), params).await?)
    }

    /// Verify a signed message, checking on chain that the key belongs to
    /// the claimed account.
    pub async fn verify_message(
        &self,
        signed: &SignedMessage,
        params: &SignMessageParams,
        options: VerifyOptions,
    ) -> Result<bool, Error> {
        nep413::verify(signed, params, &self.rpc, options).await
    }

    // ========================================================================
    // Write Operations (Transaction Builders)
    // ========================================================================

    /// Create a transaction builder for multi-action transactions.
    ///
    /// ```rust,no_run
    /// # use near_kit_core::*;
    /// # async fn example(near: Near) -> Result<(), Error> {
    /// near.transaction("app.alice.testnet")
    ///     .create_account()
    ///     .transfer(NearToken::from_near(5))
    ///     .deploy(std::fs::read("contract.wasm").unwrap_or_default())
    ///     .call("init")
    ///     .args(serde_json::json!({ "owner": "alice.testnet" }))
    ///     .send()
    ///     .await?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn transaction(&self, receiver_id: impl AsRef<str>) -> TransactionBuilder {
        TransactionBuilder::new(
            self.rpc.clone(),
            self.nonces.clone(),
            self.signer.clone(),
            receiver_id,
        )
        .wait_until(self.wait_until)
        .poll_config(self.poll)
    }

    /// Transfer NEAR tokens.
    pub fn transfer(&self, receiver: impl AsRef<str>, amount: NearToken) -> TransactionBuilder {
        self.transaction(receiver).transfer(amount)
    }

    /// Call a function on a contract.
    pub fn call(&self, contract_id: impl AsRef<str>, method: &str) -> CallBuilder {
        self.transaction(contract_id).call(method)
    }

    /// Drop the cached nonce for a key, forcing the next transaction to
    /// refetch it from chain.
    pub fn invalidate_nonce(&self, account_id: &AccountId, public_key: &PublicKey) {
        self.nonces.invalidate(account_id, public_key);
    }

    /// This client as a [`WalletAdapter`](crate::WalletAdapter).
    pub fn wallet(&self) -> SignerWallet {
        SignerWallet::new(self.clone())
    }
}

impl std::fmt::Debug for Near {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Near")
            .field("rpc", &self.rpc)
            .field("account_id", &self.account_id())
            .field("network_id", &self.network_id)
            .field("nonces", &self.nonces)
            .finish()
    }
}

// ============================================================================
// NearBuilder
// ============================================================================

/// Builder for creating a [`Near`] client.
///
/// ```rust,no_run
/// use near_kit_core::*;
///
/// # fn example() -> Result<(), Error> {
/// let near = Near::testnet()
///     .credentials("ed25519:...", "alice.testnet")?
///     .retry_config(RetryConfig { max_retries: 5, ..Default::default() })
///     .header("x-api-key", "secret")
///     .wait_until(TxExecutionStatus::Final)
///     .build()?;
/// # Ok(())
/// # }
/// ```
pub struct NearBuilder {
    rpc_url: String,
    network_id: Option<&'static str>,
    signer: Option<Arc<dyn Signer>>,
    retry_config: RetryConfig,
    headers: Vec<(String, String)>,
    timeout: Option<Duration>,
    wait_until: TxExecutionStatus,
    poll: PollConfig,
}

impl NearBuilder {
    fn new(rpc_url: impl Into<String>, network_id: Option<&'static str>) -> Self {
        Self {
            rpc_url: rpc_url.into(),
            network_id,
            signer: None,
            retry_config: RetryConfig::default(),
            headers: Vec::new(),
            timeout: None,
            wait_until: TxExecutionStatus::default(),
            poll: PollConfig::default(),
        }
    }

    /// Set the signer for transactions.
    pub fn signer(mut self, signer: impl Signer + 'static) -> Self {
        self.signer = Some(Arc::new(signer));
        self
    }

    /// Sign with an [`InMemorySigner`] built from a key string and account ID.
    pub fn credentials(
        self,
        private_key: impl AsRef<str>,
        account_id: impl AsRef<str>,
    ) -> Result<Self, Error> {
        let signer = InMemorySigner::new(account_id, private_key)?;
        Ok(self.signer(signer))
    }

    pub fn retry_config(mut self, config: RetryConfig) -> Self {
        self.retry_config = config;
        self
    }

    /// Add a header sent with every RPC request.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Per-request HTTP timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Default execution level transactions wait for.
    pub fn wait_until(mut self, status: TxExecutionStatus) -> Self {
        self.wait_until = status;
        self
    }

    pub fn poll_config(mut self, poll: PollConfig) -> Self {
        self.poll = poll;
        self
    }

    /// Build the client.
    ///
    /// Fails only if a header name or value is invalid or the HTTP client
    /// cannot be constructed.
    pub fn build(self) -> Result<Near, Error> {
        let mut rpc = RpcClient::builder(self.rpc_url).retry_config(self.retry_config);
        for (name, value) in self.headers {
            rpc = rpc.header(name, value);
        }
        if let Some(timeout) = self.timeout {
            rpc = rpc.timeout(timeout);
        }

        Ok(Near {
            rpc: Arc::new(rpc.build()?),
            signer: self.signer,
            nonces: Arc::new(NonceManager::new()),
            network_id: self.network_id,
            wait_until: self.wait_until,
            poll: self.poll,
        })
    }
}
