//! Low-level JSON-RPC client for NEAR.
//!
//! Transport failures and retryable HTTP statuses are retried with
//! exponential backoff. Error envelopes returned by the node with any other
//! status are classified into [`RpcError`] variants once and never retried.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use base64::{Engine as _, engine::general_purpose::STANDARD};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::error::{Error, RpcError};
use crate::types::{
    AccessKeyListView, AccessKeyView, AccountId, AccountView, BlockReference, BlockView,
    CryptoHash, FinalExecutionOutcome, GasPrice, NearToken, PublicKey, SignedTransaction,
    StatusResponse, TxExecutionStatus, ViewFunctionResult,
};

/// Network configuration presets.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NetworkConfig {
    /// The RPC URL for this network.
    pub rpc_url: &'static str,
    /// The network identifier (e.g., "mainnet", "testnet").
    pub network_id: &'static str,
}

/// Mainnet configuration.
pub const MAINNET: NetworkConfig = NetworkConfig {
    rpc_url: "https://free.rpc.fastnear.com",
    network_id: "mainnet",
};

/// Testnet configuration.
pub const TESTNET: NetworkConfig = NetworkConfig {
    rpc_url: "https://test.rpc.fastnear.com",
    network_id: "testnet",
};

/// Retry configuration for RPC calls.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryConfig {
    /// Maximum number of retries after the first attempt.
    pub max_retries: u32,
    /// Initial delay in milliseconds.
    pub initial_delay_ms: u64,
    /// Maximum delay in milliseconds.
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay_ms: 500,
            max_delay_ms: 5000,
        }
    }
}

impl RetryConfig {
    /// Backoff before retry number `attempt + 1`.
    fn delay(&self, attempt: u32) -> Duration {
        let factor = 2u64.checked_pow(attempt).unwrap_or(u64::MAX);
        let delay = self
            .initial_delay_ms
            .saturating_mul(factor)
            .min(self.max_delay_ms);
        Duration::from_millis(delay)
    }
}

/// How [`RpcClient::wait_for_outcome`] polls.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PollConfig {
    /// Pause between status queries.
    pub interval: Duration,
    /// Give up after this long.
    pub timeout: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            timeout: Duration::from_secs(60),
        }
    }
}

/// What a request was about, used to classify its errors.
///
/// Node error messages are ambiguous on their own: "does not exist" can
/// refer to an account, an access key or a contract method.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct QueryContext {
    pub account_id: Option<AccountId>,
    pub public_key: Option<PublicKey>,
    pub contract_id: Option<AccountId>,
    pub method_name: Option<String>,
}

impl QueryContext {
    pub fn account(account_id: &AccountId) -> Self {
        Self {
            account_id: Some(account_id.clone()),
            ..Self::default()
        }
    }

    pub fn access_key(account_id: &AccountId, public_key: &PublicKey) -> Self {
        Self {
            account_id: Some(account_id.clone()),
            public_key: Some(public_key.clone()),
            ..Self::default()
        }
    }

    pub fn function_call(contract_id: &AccountId, method_name: &str) -> Self {
        Self {
            contract_id: Some(contract_id.clone()),
            method_name: Some(method_name.to_string()),
            ..Self::default()
        }
    }
}

/// JSON-RPC request structure.
#[derive(Serialize)]
struct JsonRpcRequest<'a, P: Serialize> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: P,
}

// ============================================================================
// Builder
// ============================================================================

/// Builder for [`RpcClient`].
#[derive(Debug)]
pub struct RpcClientBuilder {
    url: String,
    headers: Vec<(String, String)>,
    timeout: Option<Duration>,
    retry_config: RetryConfig,
}

impl RpcClientBuilder {
    /// Send this header with every request, e.g. an API key.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Per-request timeout. Unset means no timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn retry_config(mut self, retry_config: RetryConfig) -> Self {
        self.retry_config = retry_config;
        self
    }

    /// Fails on a malformed header or if the HTTP client cannot be created.
    pub fn build(self) -> Result<RpcClient, Error> {
        let mut headers = HeaderMap::new();
        for (name, value) in &self.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| Error::Config(format!("Invalid header name {name:?}: {e}")))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| Error::Config(format!("Invalid value for header {name}: {e}")))?;
            headers.insert(name, value);
        }

        let mut builder = reqwest::Client::builder().default_headers(headers);
        if let Some(timeout) = self.timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| Error::Config(format!("Failed to build HTTP client: {e}")))?;

        Ok(RpcClient {
            url: self.url,
            client,
            retry_config: self.retry_config,
            request_id: AtomicU64::new(0),
        })
    }
}

// ============================================================================
// RpcClient
// ============================================================================

/// Low-level JSON-RPC client for NEAR.
pub struct RpcClient {
    url: String,
    client: reqwest::Client,
    retry_config: RetryConfig,
    request_id: AtomicU64,
}

impl RpcClient {
    /// Create a client with default headers, no timeout and default retries.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            client: reqwest::Client::new(),
            retry_config: RetryConfig::default(),
            request_id: AtomicU64::new(0),
        }
    }

    pub fn builder(url: impl Into<String>) -> RpcClientBuilder {
        RpcClientBuilder {
            url: url.into(),
            headers: Vec::new(),
            timeout: None,
            retry_config: RetryConfig::default(),
        }
    }

    /// Get the RPC URL.
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn retry_config(&self) -> &RetryConfig {
        &self.retry_config
    }

    /// Make a raw RPC call with retries.
    pub async fn call<P: Serialize, R: DeserializeOwned>(
        &self,
        method: &str,
        params: P,
    ) -> Result<R, RpcError> {
        self.call_with_context(method, params, &QueryContext::default())
            .await
    }

    /// Like [`call`](Self::call), classifying errors against `context`.
    pub async fn call_with_context<P: Serialize, R: DeserializeOwned>(
        &self,
        method: &str,
        params: P,
        context: &QueryContext,
    ) -> Result<R, RpcError> {
        let mut attempt = 0;
        loop {
            let request = JsonRpcRequest {
                jsonrpc: "2.0",
                id: self.request_id.fetch_add(1, Ordering::Relaxed),
                method,
                params: &params,
            };

            match self.try_call(&request, context).await {
                Ok(result) => return Ok(result),
                Err(e) if e.is_retryable() && attempt < self.retry_config.max_retries => {
                    let delay = self.retry_config.delay(attempt);
                    attempt += 1;
                    warn!(
                        method,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "RPC request failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Single attempt to make an RPC call.
    async fn try_call<R: DeserializeOwned>(
        &self,
        request: &JsonRpcRequest<'_, impl Serialize>,
        context: &QueryContext,
    ) -> Result<R, RpcError> {
        let response = self
            .client
            .post(&self.url)
            .json(request)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| RpcError::network(format!("Failed to read response: {e}"), None, true))?;

        let envelope: Option<Value> = serde_json::from_str(&body).ok();
        let error = envelope.as_ref().and_then(|e| e.get("error"));
        let code = status.as_u16();

        // Gateways answer 429/5xx with their own `{"error": ...}` bodies, so
        // a retryable status is retried whatever the body says.
        if is_retryable_status(code) {
            return Err(RpcError::Network {
                message: format!("HTTP {status}: {body}"),
                status_code: Some(code),
                retryable: true,
                payload: error.cloned(),
            });
        }

        if let Some(error) = error {
            return Err(parse_rpc_error(error, context));
        }

        if !status.is_success() {
            return Err(RpcError::network(
                format!("HTTP {status}: {body}"),
                Some(code),
                false,
            ));
        }

        let mut envelope = envelope
            .ok_or_else(|| RpcError::InvalidResponse(format!("Response is not JSON: {body}")))?;
        let result = envelope
            .get_mut("result")
            .map(Value::take)
            .ok_or_else(|| RpcError::InvalidResponse("Missing result in response".to_string()))?;

        serde_json::from_value(result).map_err(|e| RpcError::InvalidResponse(e.to_string()))
    }

    /// Run a `query` request. Query results carrying an `error` string are
    /// classified with `context`.
    async fn query<R: DeserializeOwned>(
        &self,
        mut params: serde_json::Map<String, Value>,
        block: &BlockReference,
        context: &QueryContext,
    ) -> Result<R, RpcError> {
        params.extend(block.to_rpc_params());
        let result: Value = self
            .call_with_context("query", Value::Object(params), context)
            .await?;

        if let Some(message) = result.get("error").and_then(Value::as_str) {
            return Err(parse_query_error(message, context));
        }

        serde_json::from_value(result).map_err(|e| RpcError::InvalidResponse(e.to_string()))
    }

    // ========================================================================
    // High-level RPC methods
    // ========================================================================

    /// View account information.
    pub async fn view_account(
        &self,
        account_id: &AccountId,
        block: BlockReference,
    ) -> Result<AccountView, RpcError> {
        let params = object(json!({
            "request_type": "view_account",
            "account_id": account_id,
        }));
        self.query(params, &block, &QueryContext::account(account_id))
            .await
    }

    /// View access key information.
    pub async fn view_access_key(
        &self,
        account_id: &AccountId,
        public_key: &PublicKey,
        block: BlockReference,
    ) -> Result<AccessKeyView, RpcError> {
        let params = object(json!({
            "request_type": "view_access_key",
            "account_id": account_id,
            "public_key": public_key,
        }));
        self.query(
            params,
            &block,
            &QueryContext::access_key(account_id, public_key),
        )
        .await
    }

    /// View all access keys for an account.
    pub async fn view_access_key_list(
        &self,
        account_id: &AccountId,
        block: BlockReference,
    ) -> Result<AccessKeyListView, RpcError> {
        let params = object(json!({
            "request_type": "view_access_key_list",
            "account_id": account_id,
        }));
        self.query(params, &block, &QueryContext::account(account_id))
            .await
    }

    /// Call a view function on a contract.
    pub async fn view_function(
        &self,
        contract_id: &AccountId,
        method_name: &str,
        args: &[u8],
        block: BlockReference,
    ) -> Result<ViewFunctionResult, RpcError> {
        let params = object(json!({
            "request_type": "call_function",
            "account_id": contract_id,
            "method_name": method_name,
            "args_base64": STANDARD.encode(args),
        }));
        self.query(
            params,
            &block,
            &QueryContext::function_call(contract_id, method_name),
        )
        .await
    }

    /// Get block information.
    pub async fn block(&self, block: BlockReference) -> Result<BlockView, RpcError> {
        self.call("block", block.to_rpc_params()).await
    }

    /// Get node status.
    pub async fn status(&self) -> Result<StatusResponse, RpcError> {
        self.call("status", json!([])).await
    }

    /// Get the gas price at a block, or the latest one.
    pub async fn gas_price(&self, block_hash: Option<&CryptoHash>) -> Result<GasPrice, RpcError> {
        self.call("gas_price", json!([block_hash])).await
    }

    /// Send a signed transaction and wait on the node up to `wait_until`.
    pub async fn send_tx(
        &self,
        signed_tx: &SignedTransaction,
        wait_until: TxExecutionStatus,
    ) -> Result<FinalExecutionOutcome, RpcError> {
        let params = json!({
            "signed_tx_base64": signed_tx.to_base64(),
            "wait_until": wait_until,
        });
        self.call_with_context("send_tx", params, &tx_context(signed_tx))
            .await
    }

    /// Submit without waiting. Returns the transaction hash.
    pub async fn broadcast_tx_async(
        &self,
        signed_tx: &SignedTransaction,
    ) -> Result<CryptoHash, RpcError> {
        self.call_with_context(
            "broadcast_tx_async",
            json!([signed_tx.to_base64()]),
            &tx_context(signed_tx),
        )
        .await
    }

    /// Submit and wait for final execution.
    pub async fn broadcast_tx_commit(
        &self,
        signed_tx: &SignedTransaction,
    ) -> Result<FinalExecutionOutcome, RpcError> {
        self.call_with_context(
            "broadcast_tx_commit",
            json!([signed_tx.to_base64()]),
            &tx_context(signed_tx),
        )
        .await
    }

    /// Get transaction status, waiting on the node up to `wait_until`.
    pub async fn tx_status(
        &self,
        tx_hash: &CryptoHash,
        sender_id: &AccountId,
        wait_until: TxExecutionStatus,
    ) -> Result<FinalExecutionOutcome, RpcError> {
        let params = json!({
            "tx_hash": tx_hash,
            "sender_account_id": sender_id,
            "wait_until": wait_until,
        });
        self.call("tx", params).await
    }

    /// Poll [`tx_status`](Self::tx_status) until the transaction reaches
    /// `wait_until`.
    ///
    /// Past `poll.timeout` this fails with
    /// [`RpcError::TransactionTimeout`]: the client stopped waiting, the
    /// transaction itself may still land.
    pub async fn wait_for_outcome(
        &self,
        tx_hash: &CryptoHash,
        sender_id: &AccountId,
        wait_until: TxExecutionStatus,
        poll: PollConfig,
    ) -> Result<FinalExecutionOutcome, RpcError> {
        let started = tokio::time::Instant::now();
        let timed_out = |waited: Duration| RpcError::TransactionTimeout {
            transaction_hash: *tx_hash,
            waited,
        };
        loop {
            let remaining = poll.timeout.saturating_sub(started.elapsed());
            let status = tokio::time::timeout(
                remaining,
                self.tx_status(tx_hash, sender_id, wait_until),
            )
            .await
            .map_err(|_| timed_out(started.elapsed()))?;

            match status {
                Ok(outcome) if outcome.reached().satisfies(wait_until) => return Ok(outcome),
                Ok(outcome) => {
                    debug!(%tx_hash, reached = outcome.reached().as_str(), "transaction not there yet");
                }
                Err(RpcError::UnknownTransaction(_) | RpcError::RequestTimeout { .. }) => {
                    debug!(%tx_hash, "transaction not visible yet");
                }
                Err(e) if e.is_retryable() => {
                    debug!(%tx_hash, error = %e, "status query failed, polling again");
                }
                Err(e) => return Err(e),
            }

            let waited = started.elapsed();
            if waited >= poll.timeout {
                return Err(timed_out(waited));
            }
            tokio::time::sleep(poll.interval.min(poll.timeout - waited)).await;
        }
    }
}

impl std::fmt::Debug for RpcClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcClient")
            .field("url", &self.url)
            .field("retry_config", &self.retry_config)
            .finish()
    }
}

// ============================================================================
// Error classification
// ============================================================================

/// Classify a JSON-RPC `error` object.
///
/// Uses `cause.name` first, then the message text against `context`.
/// Anything unrecognized becomes a non-retryable [`RpcError::Network`]
/// carrying the raw object.
pub fn parse_rpc_error(error: &Value, context: &QueryContext) -> RpcError {
    let message = error
        .get("message")
        .and_then(Value::as_str)
        .unwrap_or("Unknown RPC error");
    let data = error.get("data");
    let data_str = data.and_then(Value::as_str);
    let cause = error.get("cause");
    let info = cause.and_then(|c| c.get("info"));
    let info_str = |field| str_field(info, field);
    let detail = data_str.unwrap_or(message);

    let classified = match cause.and_then(|c| c.get("name")).and_then(Value::as_str) {
        Some("UNKNOWN_ACCOUNT") => info_str("requested_account_id")
            .and_then(|a| a.parse().ok())
            .or_else(|| context.account_id.clone())
            .map(RpcError::AccountNotFound),
        Some("INVALID_ACCOUNT") => Some(RpcError::InvalidAccount(
            info_str("requested_account_id").unwrap_or(detail).to_string(),
        )),
        Some("UNKNOWN_ACCESS_KEY") => {
            let account_id = info_str("requested_account_id")
                .and_then(|a| a.parse().ok())
                .or_else(|| context.account_id.clone());
            let public_key = info_str("public_key")
                .and_then(|k| k.parse().ok())
                .or_else(|| context.public_key.clone());
            account_id.zip(public_key).map(|(account_id, public_key)| {
                RpcError::AccessKeyNotFound {
                    account_id,
                    public_key,
                }
            })
        }
        Some("UNKNOWN_BLOCK") => Some(RpcError::UnknownBlock(detail.to_string())),
        Some("UNKNOWN_TRANSACTION") => Some(RpcError::UnknownTransaction(
            info_str("requested_transaction_hash")
                .unwrap_or(detail)
                .to_string(),
        )),
        Some("NO_CONTRACT_CODE") => info_str("contract_account_id")
            .or_else(|| info_str("account_id"))
            .and_then(|a| a.parse().ok())
            .or_else(|| context.contract_id.clone())
            .map(RpcError::ContractNotDeployed),
        Some("CONTRACT_EXECUTION_ERROR") => {
            let text = info_str("vm_error").unwrap_or(detail);
            context
                .contract_id
                .clone()
                .or_else(|| info_str("contract_id").and_then(|c| c.parse().ok()))
                .map(|contract_id| RpcError::ContractCall {
                    contract_id,
                    method_name: context.method_name.clone(),
                    panic: extract_panic(text),
                    message: text.to_string(),
                })
        }
        Some("UNAVAILABLE_SHARD") => Some(RpcError::ShardUnavailable(detail.to_string())),
        Some("NO_SYNCED_BLOCKS" | "NOT_SYNCED_YET") => {
            Some(RpcError::NodeNotSynced(detail.to_string()))
        }
        Some("INVALID_TRANSACTION") => Some(
            info.and_then(classify_tx_error)
                .or_else(|| data.and_then(classify_tx_error))
                .unwrap_or_else(|| RpcError::InvalidTransaction {
                    message: detail.to_string(),
                    details: info.or(data).cloned(),
                }),
        ),
        Some("TIMEOUT_ERROR") => Some(RpcError::RequestTimeout {
            message: detail.to_string(),
            transaction_hash: info_str("transaction_hash").map(String::from),
        }),
        Some("PARSE_ERROR") => Some(RpcError::ParseError(detail.to_string())),
        Some("INTERNAL_ERROR") => Some(RpcError::InternalError(detail.to_string())),
        _ => None,
    };

    classified
        .or_else(|| data_str.and_then(|text| classify_query_message(text, context)))
        .unwrap_or_else(|| RpcError::unclassified(detail, error.clone()))
}

/// Classify the `error` string of a query result.
///
/// A contract or method in the context wins over text matching, so a
/// missing method is reported as a contract call error and never as a
/// missing key.
pub fn parse_query_error(message: &str, context: &QueryContext) -> RpcError {
    classify_query_message(message, context)
        .unwrap_or_else(|| RpcError::network(message, None, false))
}

fn classify_query_message(message: &str, context: &QueryContext) -> Option<RpcError> {
    if context.contract_id.is_some() || context.method_name.is_some() {
        // Without a contract id the account being queried is the contract.
        let Some(contract_id) = context.contract_id.as_ref().or(context.account_id.as_ref())
        else {
            return Some(RpcError::network(message, None, false));
        };
        if message.contains("CodeDoesNotExist") {
            return Some(RpcError::ContractNotDeployed(contract_id.clone()));
        }
        return Some(RpcError::ContractCall {
            contract_id: contract_id.clone(),
            method_name: context.method_name.clone(),
            panic: extract_panic(message),
            message: message.to_string(),
        });
    }

    if !message.contains("does not exist") {
        return None;
    }
    match (&context.account_id, &context.public_key) {
        (Some(account_id), Some(public_key)) => Some(RpcError::AccessKeyNotFound {
            account_id: account_id.clone(),
            public_key: public_key.clone(),
        }),
        (Some(account_id), None) => Some(RpcError::AccountNotFound(account_id.clone())),
        _ => None,
    }
}

/// Classify the `Failure` status of an execution outcome.
///
/// `receiver_id` names the contract when the failure is a function call
/// error.
pub fn classify_failure(failure: &Value, receiver_id: &AccountId) -> RpcError {
    if let Some(tx_error) = classify_tx_error(failure) {
        return tx_error;
    }

    let message = failure.to_string();
    let Some(kind) = failure.get("ActionError").and_then(|a| a.get("kind")) else {
        return RpcError::ExecutionFailed {
            message,
            details: failure.clone(),
        };
    };

    if let Some(call_error) = kind.get("FunctionCallError") {
        if let Some(host_error) = call_error.get("HostError") {
            if matches!(
                host_error.as_str(),
                Some("GasExceeded" | "GasLimitExceeded")
            ) {
                return RpcError::GasLimitExceeded { message };
            }
            if let Some(panic) = host_error
                .get("GuestPanic")
                .and_then(|p| p.get("panic_msg"))
                .and_then(Value::as_str)
            {
                return RpcError::ContractCall {
                    contract_id: receiver_id.clone(),
                    method_name: None,
                    panic: Some(panic.to_string()),
                    message,
                };
            }
        }
        if let Some(text) = call_error.get("ExecutionError").and_then(Value::as_str) {
            if text.contains("Exceeded the prepaid gas")
                || text.contains("Exceeded the maximum amount of gas")
            {
                return RpcError::GasLimitExceeded {
                    message: text.to_string(),
                };
            }
            return RpcError::ContractCall {
                contract_id: receiver_id.clone(),
                method_name: None,
                panic: extract_panic(text).or_else(|| Some(text.to_string())),
                message: text.to_string(),
            };
        }
    }

    if let Some(missing) = kind.get("AccountDoesNotExist") {
        if let Some(account_id) = missing
            .get("account_id")
            .and_then(Value::as_str)
            .and_then(|a| a.parse().ok())
        {
            return RpcError::AccountNotFound(account_id);
        }
    }

    if let Some(lack) = kind.get("LackBalanceForState") {
        // The node reports only the amount the account must hold.
        return RpcError::InsufficientBalance {
            required: yocto_field(lack, "amount"),
            available: NearToken::from_yoctonear(0),
        };
    }

    RpcError::ExecutionFailed {
        message,
        details: failure.clone(),
    }
}

/// Transaction-level validation errors, found under `InvalidTxError` with
/// or without a `TxExecutionError` wrapper.
fn classify_tx_error(value: &Value) -> Option<RpcError> {
    let tx_error = value
        .get("TxExecutionError")
        .unwrap_or(value)
        .get("InvalidTxError")?;

    if let Some(nonce) = tx_error.get("InvalidNonce") {
        return Some(RpcError::InvalidNonce {
            tx_nonce: nonce.get("tx_nonce")?.as_u64()?,
            ak_nonce: nonce.get("ak_nonce")?.as_u64()?,
        });
    }

    if let Some(balance) = tx_error.get("NotEnoughBalance") {
        return Some(RpcError::InsufficientBalance {
            required: yocto_field(balance, "cost"),
            available: yocto_field(balance, "balance"),
        });
    }

    if let Some(missing) = tx_error
        .get("InvalidAccessKeyError")
        .and_then(|e| e.get("AccessKeyNotFound"))
    {
        let account_id = missing.get("account_id")?.as_str()?.parse().ok()?;
        let public_key = missing.get("public_key")?.as_str()?.parse().ok()?;
        return Some(RpcError::AccessKeyNotFound {
            account_id,
            public_key,
        });
    }

    if let Some(missing) = tx_error.get("SignerDoesNotExist") {
        let account_id = missing.get("signer_id")?.as_str()?.parse().ok()?;
        return Some(RpcError::AccountNotFound(account_id));
    }

    Some(RpcError::InvalidTransaction {
        message: tx_error.to_string(),
        details: Some(value.clone()),
    })
}

/// Pull the message out of "Smart contract panicked: ..." text.
fn extract_panic(message: &str) -> Option<String> {
    const MARKER: &str = "Smart contract panicked: ";
    let start = message.find(MARKER)? + MARKER.len();
    let rest = &message[start..];
    let end = rest.find("\")").unwrap_or(rest.len());
    Some(rest[..end].to_string())
}

fn str_field<'a>(value: Option<&'a Value>, field: &str) -> Option<&'a str> {
    value.and_then(|v| v.get(field)).and_then(Value::as_str)
}

/// Yocto amounts arrive as decimal strings.
fn yocto_field(value: &Value, field: &str) -> NearToken {
    let yocto = value
        .get(field)
        .and_then(Value::as_str)
        .and_then(|s| s.parse().ok())
        .unwrap_or(0);
    NearToken::from_yoctonear(yocto)
}

// ============================================================================
// Helper functions
// ============================================================================

/// HTTP statuses worth retrying; every other 4xx is final.
fn is_retryable_status(status: u16) -> bool {
    matches!(status, 408 | 429 | 500 | 502 | 503 | 504)
}

fn transport_error(e: reqwest::Error) -> RpcError {
    let retryable = e.is_connect() || e.is_timeout() || e.is_request();
    RpcError::network(
        format!("HTTP request failed: {e}"),
        e.status().map(|s| s.as_u16()),
        retryable,
    )
}

fn tx_context(signed_tx: &SignedTransaction) -> QueryContext {
    QueryContext::access_key(
        &signed_tx.transaction.signer_id,
        &signed_tx.transaction.public_key,
    )
}

fn object(value: Value) -> serde_json::Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => serde_json::Map::new(),
    }
}
