//! Transaction builder for fluent multi-action transactions.
//!
//! Allows chaining multiple actions (transfers, function calls, account creation, etc.)
//! into a single atomic transaction. All actions either succeed together or fail together.
//!
//! Sending runs the full pipeline: pick a key, allocate a nonce, fetch a
//! recent block hash, sign, broadcast, and wait until the requested
//! [`TxExecutionStatus`] is reached.
//!
//! # Example
//!
//! ```rust,no_run
//! # use near_kit_core::*;
//! # async fn example(near: Near) -> Result<(), Error> {
//! let new_public_key: PublicKey = "ed25519:6E8sCci9badyRkXb3JoRpBj5p8C6Tw41ELDZoiihKEtp".parse()?;
//! near.transaction("new.alice.testnet")
//!     .create_account()
//!     .transfer(NearToken::from_near(5))
//!     .add_full_access_key(new_public_key)
//!     .send()
//!     .await?;
//! # Ok(())
//! # }
//! ```

use std::future::{Future, IntoFuture};
use std::pin::Pin;
use std::sync::Arc;

use tracing::debug;

use crate::error::{Error, RpcError};
use crate::types::{
    AccessKey, AccountId, Action, BlockReference, DelegateAction, FinalExecutionOutcome, Gas,
    NearToken, NonDelegateAction, PublicKey, SignedDelegateAction, SignedTransaction, Transaction,
    TxExecutionStatus,
};

use super::nonce_manager::NonceManager;
use super::rpc::{PollConfig, RpcClient, classify_failure};
use super::signer::{Signer, SigningKey};

/// Gas attached to a function call unless [`CallBuilder::gas`] says otherwise.
pub const DEFAULT_CALL_GAS: Gas = Gas::from_tgas(30);

// ============================================================================
// Delegate Action Types
// ============================================================================

/// Options for creating a delegate action (meta-transaction).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DelegateOptions {
    /// Explicit block height at which the delegate action expires.
    pub max_block_height: Option<u64>,
    /// Blocks past the current final height, used when `max_block_height`
    /// is unset.
    pub block_height_offset: u64,
    /// Nonce to use instead of allocating one from the nonce cache.
    pub nonce: Option<u64>,
}

impl Default for DelegateOptions {
    fn default() -> Self {
        Self {
            max_block_height: None,
            block_height_offset: 200,
            nonce: None,
        }
    }
}

impl DelegateOptions {
    pub fn with_offset(offset: u64) -> Self {
        Self {
            block_height_offset: offset,
            ..Default::default()
        }
    }

    pub fn with_max_height(height: u64) -> Self {
        Self {
            max_block_height: Some(height),
            ..Default::default()
        }
    }
}

/// A signed delegate action plus its relayer payload.
#[derive(Clone, Debug)]
pub struct DelegateResult {
    pub signed_delegate_action: SignedDelegateAction,
    /// Base64 of the prefixed encoding, ready for HTTP/JSON transport.
    pub payload: String,
}

impl DelegateResult {
    pub fn sender_id(&self) -> &AccountId {
        self.signed_delegate_action.sender_id()
    }

    pub fn receiver_id(&self) -> &AccountId {
        self.signed_delegate_action.receiver_id()
    }
}

// ============================================================================
// TransactionBuilder
// ============================================================================

/// Builder for constructing multi-action transactions.
///
/// Created via [`Near::transaction`](crate::Near::transaction). Await it, or
/// call [`send`](Self::send), to submit.
pub struct TransactionBuilder {
    rpc: Arc<RpcClient>,
    nonces: Arc<NonceManager>,
    signer: Option<Arc<dyn Signer>>,
    receiver_id: Option<AccountId>,
    actions: Vec<Action>,
    wait_until: TxExecutionStatus,
    poll: PollConfig,
    /// First error hit while building, reported when the builder runs.
    deferred: Option<Error>,
}

/// Everything needed to sign once the nonce and block hash are known.
struct Prepared {
    key: SigningKey,
    transaction: Transaction,
}

impl Prepared {
    async fn sign(&self) -> Result<SignedTransaction, Error> {
        let signature = self.key.sign(self.transaction.hash().as_bytes()).await?;
        Ok(SignedTransaction {
            transaction: self.transaction.clone(),
            signature,
        })
    }
}

impl TransactionBuilder {
    pub(crate) fn new(
        rpc: Arc<RpcClient>,
        nonces: Arc<NonceManager>,
        signer: Option<Arc<dyn Signer>>,
        receiver_id: impl AsRef<str>,
    ) -> Self {
        let (receiver_id, deferred) = match receiver_id.as_ref().parse::<AccountId>() {
            Ok(id) => (Some(id), None),
            Err(e) => (None, Some(e.into())),
        };
        Self {
            rpc,
            nonces,
            signer,
            receiver_id,
            actions: Vec::new(),
            wait_until: TxExecutionStatus::default(),
            poll: PollConfig::default(),
            deferred,
        }
    }

    fn defer(&mut self, error: Error) {
        self.deferred.get_or_insert(error);
    }

    // ========================================================================
    // Action methods
    // ========================================================================

    /// Add a create account action.
    pub fn create_account(mut self) -> Self {
        self.actions.push(Action::create_account());
        self
    }

    /// Add a deploy contract action.
    pub fn deploy(mut self, code: impl Into<Vec<u8>>) -> Self {
        self.actions.push(Action::deploy_contract(code.into()));
        self
    }

    /// Start a function call. Configure it on the returned [`CallBuilder`].
    pub fn call(self, method: &str) -> CallBuilder {
        CallBuilder::new(self, method.to_string())
    }

    pub fn transfer(mut self, amount: NearToken) -> Self {
        self.actions.push(Action::transfer(amount));
        self
    }

    pub fn stake(mut self, amount: NearToken, public_key: PublicKey) -> Self {
        self.actions.push(Action::stake(amount, public_key));
        self
    }

    pub fn add_full_access_key(mut self, public_key: PublicKey) -> Self {
        self.actions.push(Action::add_full_access_key(public_key));
        self
    }

    /// Add a key limited to calling `method_names` on `receiver_id`. An empty
    /// list allows every method.
    pub fn add_function_call_key(
        mut self,
        public_key: PublicKey,
        receiver_id: AccountId,
        method_names: Vec<String>,
        allowance: Option<NearToken>,
    ) -> Self {
        self.actions.push(Action::add_function_call_key(
            public_key,
            receiver_id,
            method_names,
            allowance,
        ));
        self
    }

    /// Add a key with an explicit [`AccessKey`].
    pub fn add_key(mut self, public_key: PublicKey, access_key: AccessKey) -> Self {
        self.actions.push(Action::AddKey(crate::types::AddKeyAction {
            public_key,
            access_key,
        }));
        self
    }

    pub fn delete_key(mut self, public_key: PublicKey) -> Self {
        self.actions.push(Action::delete_key(public_key));
        self
    }

    /// Delete the receiver account, sending its balance to `beneficiary_id`.
    pub fn delete_account(mut self, beneficiary_id: AccountId) -> Self {
        self.actions.push(Action::delete_account(beneficiary_id));
        self
    }

    /// Relay a delegate action signed by someone else.
    ///
    /// ```rust,no_run
    /// # use near_kit_core::*;
    /// # async fn example(relayer: Near, payload: &str) -> Result<(), Error> {
    /// let signed = SignedDelegateAction::from_base64(payload)?;
    /// relayer
    ///     .transaction(signed.sender_id().as_str())
    ///     .signed_delegate_action(signed)
    ///     .send()
    ///     .await?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn signed_delegate_action(mut self, signed_delegate: SignedDelegateAction) -> Self {
        self.actions.push(Action::delegate(signed_delegate));
        self
    }

    /// Append an already-built action.
    pub fn add_action(mut self, action: Action) -> Self {
        self.actions.push(action);
        self
    }

    pub fn actions(&self) -> &[Action] {
        &self.actions
    }

    // ========================================================================
    // Configuration
    // ========================================================================

    /// Override the signer for this transaction.
    pub fn sign_with(mut self, signer: impl Signer + 'static) -> Self {
        self.signer = Some(Arc::new(signer));
        self
    }

    /// Set the execution level to wait for.
    pub fn wait_until(mut self, status: TxExecutionStatus) -> Self {
        self.wait_until = status;
        self
    }

    /// How to poll if the node stops waiting before `wait_until` is reached.
    pub fn poll_config(mut self, poll: PollConfig) -> Self {
        self.poll = poll;
        self
    }

    // ========================================================================
    // Execution
    // ========================================================================

    /// Send the transaction. Equivalent to awaiting the builder.
    pub fn send(self) -> Pin<Box<dyn Future<Output = Result<FinalExecutionOutcome, Error>> + Send>> {
        Box::pin(self.execute())
    }

    /// Allocate a nonce and sign, without broadcasting.
    ///
    /// The nonce is consumed. Invalidate it through
    /// [`Near::invalidate_nonce`](crate::Near::invalidate_nonce) if the
    /// result is never submitted.
    pub async fn sign(self) -> Result<SignedTransaction, Error> {
        let (_, prepared) = self.prepare().await?;
        prepared.sign().await
    }

    /// Build and sign a delegate action for a relayer to submit (NEP-366).
    ///
    /// ```rust,no_run
    /// # use near_kit_core::*;
    /// # async fn example(near: Near) -> Result<(), Error> {
    /// let result = near
    ///     .call("guestbook.testnet", "add_message")
    ///     .args(serde_json::json!({ "text": "Hello!" }))
    ///     .delegate(DelegateOptions::default())
    ///     .await?;
    /// println!("payload for the relayer: {}", result.payload);
    /// # Ok(())
    /// # }
    /// ```
    pub async fn delegate(self, options: DelegateOptions) -> Result<DelegateResult, Error> {
        if let Some(error) = self.deferred {
            return Err(error);
        }
        let receiver_id = self.receiver_id.ok_or_else(missing_receiver)?;
        if self.actions.is_empty() {
            return Err(Error::InvalidTransaction(
                "Delegate action requires at least one action".to_string(),
            ));
        }

        let actions = self
            .actions
            .into_iter()
            .map(NonDelegateAction::try_from)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| {
                Error::InvalidTransaction(
                    "Delegate actions cannot contain nested signed delegate actions".to_string(),
                )
            })?;

        let signer = self.signer.ok_or(Error::NoSigner)?;
        let sender_id = signer.account_id().clone();
        let key = signer.key();
        let public_key = key.public_key().clone();

        let nonce = match options.nonce {
            Some(nonce) => nonce,
            None => {
                self.nonces
                    .get_next_nonce(
                        &sender_id,
                        &public_key,
                        fetch_access_key_nonce(&self.rpc, &sender_id, &public_key),
                    )
                    .await?
            }
        };

        let max_block_height = match options.max_block_height {
            Some(height) => height,
            None => {
                let block = self.rpc.block(BlockReference::final_()).await?;
                block.header.height + options.block_height_offset
            }
        };

        let delegate_action = DelegateAction {
            sender_id,
            receiver_id,
            actions,
            nonce,
            max_block_height,
            public_key,
        };
        debug!(
            sender_id = %delegate_action.sender_id,
            receiver_id = %delegate_action.receiver_id,
            nonce,
            max_block_height,
            "signing delegate action"
        );

        let signature = key.sign(delegate_action.hash().as_bytes()).await?;
        let signed_delegate_action = delegate_action.sign(signature);
        let payload = signed_delegate_action.to_base64();

        Ok(DelegateResult {
            signed_delegate_action,
            payload,
        })
    }

    /// Resolve the key, nonce and block hash. Returns the receiver id too so
    /// failures can be attributed.
    async fn prepare(self) -> Result<(AccountId, Prepared), Error> {
        if let Some(error) = self.deferred {
            return Err(error);
        }
        let receiver_id = self.receiver_id.ok_or_else(missing_receiver)?;
        if self.actions.is_empty() {
            return Err(Error::InvalidTransaction(
                "Transaction must have at least one action".to_string(),
            ));
        }

        let signer = self.signer.ok_or(Error::NoSigner)?;
        let signer_id = signer.account_id().clone();
        let key = signer.key();
        let public_key = key.public_key().clone();

        let nonce = self
            .nonces
            .get_next_nonce(
                &signer_id,
                &public_key,
                fetch_access_key_nonce(&self.rpc, &signer_id, &public_key),
            )
            .await?;

        let block = self.rpc.block(BlockReference::final_()).await?;
        debug!(%signer_id, %receiver_id, nonce, block_hash = %block.header.hash, "transaction prepared");

        let transaction = Transaction {
            signer_id,
            public_key,
            nonce,
            receiver_id: receiver_id.clone(),
            block_hash: block.header.hash,
            actions: self.actions,
        };
        Ok((receiver_id, Prepared { key, transaction }))
    }

    async fn execute(self) -> Result<FinalExecutionOutcome, Error> {
        let rpc = self.rpc.clone();
        let nonces = self.nonces.clone();
        let wait_until = self.wait_until;
        let poll = self.poll;

        let (receiver_id, mut prepared) = self.prepare().await?;
        let mut nonce_retried = false;

        loop {
            let signed = prepared.sign().await?;
            let hash = signed.hash();
            debug!(%hash, nonce = signed.transaction.nonce, wait_until = wait_until.as_str(), "sending transaction");

            let result = match rpc.send_tx(&signed, wait_until).await {
                Ok(outcome) if outcome.reached().satisfies(wait_until) => Ok(outcome),
                // A node that times out answers 408 and may still include the
                // transaction.
                Ok(_)
                | Err(
                    RpcError::RequestTimeout { .. }
                    | RpcError::Network {
                        status_code: Some(408),
                        ..
                    },
                ) => {
                    rpc.wait_for_outcome(&hash, &signed.transaction.signer_id, wait_until, poll)
                        .await
                }
                Err(e) => Err(e),
            };

            let error = match result {
                Ok(outcome) => match outcome.failure() {
                    None => return Ok(outcome),
                    Some(failure) => classify_failure(failure, &receiver_id),
                },
                Err(e) => e,
            };

            match error {
                RpcError::InvalidNonce { tx_nonce, ak_nonce } if !nonce_retried => {
                    nonce_retried = true;
                    let transaction = &mut prepared.transaction;
                    transaction.nonce = nonces.update_and_get_next(
                        &transaction.signer_id,
                        &transaction.public_key,
                        ak_nonce,
                    );
                    debug!(tx_nonce, ak_nonce, retry_nonce = transaction.nonce, "invalid nonce, retrying once");
                }
                error => return Err(error.into()),
            }
        }
    }
}

impl IntoFuture for TransactionBuilder {
    type Output = Result<FinalExecutionOutcome, Error>;
    type IntoFuture = Pin<Box<dyn Future<Output = Self::Output> + Send>>;

    fn into_future(self) -> Self::IntoFuture {
        self.send()
    }
}

impl std::fmt::Debug for TransactionBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionBuilder")
            .field("receiver_id", &self.receiver_id)
            .field("actions", &self.actions.len())
            .field("wait_until", &self.wait_until)
            .finish()
    }
}

/// Nonce fetch for the nonce cache. Owns its inputs so the shared fetch can
/// outlive the caller that started it.
fn fetch_access_key_nonce(
    rpc: &Arc<RpcClient>,
    account_id: &AccountId,
    public_key: &PublicKey,
) -> impl FnOnce() -> Pin<Box<dyn Future<Output = Result<u64, RpcError>> + Send>> {
    let rpc = rpc.clone();
    let account_id = account_id.clone();
    let public_key = public_key.clone();
    move || {
        Box::pin(async move {
            let access_key = rpc
                .view_access_key(&account_id, &public_key, BlockReference::optimistic())
                .await?;
            Ok(access_key.nonce)
        })
    }
}

fn missing_receiver() -> Error {
    Error::InvalidTransaction("Transaction has no receiver".to_string())
}

// ============================================================================
// CallBuilder
// ============================================================================

/// Builder for configuring a function call within a transaction.
///
/// Created via [`TransactionBuilder::call`]. Set args, gas, and deposit,
/// then keep chaining actions or send.
pub struct CallBuilder {
    builder: TransactionBuilder,
    method: String,
    args: Vec<u8>,
    gas: Gas,
    deposit: NearToken,
}

impl CallBuilder {
    fn new(builder: TransactionBuilder, method: String) -> Self {
        Self {
            builder,
            method,
            args: Vec::new(),
            gas: DEFAULT_CALL_GAS,
            deposit: NearToken::from_yoctonear(0),
        }
    }

    /// Set JSON arguments.
    pub fn args<A: serde::Serialize>(mut self, args: A) -> Self {
        match serde_json::to_vec(&args) {
            Ok(bytes) => self.args = bytes,
            Err(e) => self.builder.defer(e.into()),
        }
        self
    }

    /// Set raw byte arguments.
    pub fn args_raw(mut self, args: Vec<u8>) -> Self {
        self.args = args;
        self
    }

    /// Set Borsh-encoded arguments.
    pub fn args_borsh<A: borsh::BorshSerialize>(mut self, args: A) -> Self {
        match borsh::to_vec(&args) {
            Ok(bytes) => self.args = bytes,
            Err(e) => self.builder.defer(e.into()),
        }
        self
    }

    pub fn gas(mut self, gas: Gas) -> Self {
        self.gas = gas;
        self
    }

    /// Set attached deposit.
    pub fn deposit(mut self, amount: NearToken) -> Self {
        self.deposit = amount;
        self
    }

    /// Finish this call and return to the transaction builder.
    pub fn finish(self) -> TransactionBuilder {
        let mut builder = self.builder;
        builder.actions.push(Action::function_call(
            self.method,
            self.args,
            self.gas,
            self.deposit,
        ));
        builder
    }

    // ========================================================================
    // Chaining methods (delegate to TransactionBuilder after finishing)
    // ========================================================================

    pub fn call(self, method: &str) -> CallBuilder {
        self.finish().call(method)
    }

    pub fn transfer(self, amount: NearToken) -> TransactionBuilder {
        self.finish().transfer(amount)
    }

    pub fn sign_with(self, signer: impl Signer + 'static) -> TransactionBuilder {
        self.finish().sign_with(signer)
    }

    pub fn wait_until(self, status: TxExecutionStatus) -> TransactionBuilder {
        self.finish().wait_until(status)
    }

    pub async fn delegate(self, options: DelegateOptions) -> Result<DelegateResult, Error> {
        self.finish().delegate(options).await
    }

    pub async fn sign(self) -> Result<SignedTransaction, Error> {
        self.finish().sign().await
    }

    pub fn send(self) -> Pin<Box<dyn Future<Output = Result<FinalExecutionOutcome, Error>> + Send>> {
        self.finish().send()
    }
}

impl IntoFuture for CallBuilder {
    type Output = Result<FinalExecutionOutcome, Error>;
    type IntoFuture = Pin<Box<dyn Future<Output = Self::Output> + Send>>;

    fn into_future(self) -> Self::IntoFuture {
        self.send()
    }
}
