//! Wallet adapter boundary.
//!
//! A [`WalletAdapter`] signs and submits on behalf of accounts it manages,
//! typically by handing the request to an external wallet. [`SignerWallet`]
//! adapts a configured [`Near`] client to the same interface so code written
//! against wallets also runs with local keys.

use futures::future::BoxFuture;

use crate::error::{Error, WalletError};
use crate::types::nep413::{SignMessageParams, SignedMessage};
use crate::types::{AccountId, Action, FinalExecutionOutcome, PublicKey};

use super::near::Near;

/// An account exposed by a wallet.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WalletAccount {
    pub account_id: AccountId,
    /// Key the wallet signs with, when it discloses one.
    pub public_key: Option<PublicKey>,
}

/// A transaction for a wallet to sign and send.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransactionRequest {
    /// Account to sign as. `None` lets the wallet pick.
    pub signer_id: Option<AccountId>,
    pub receiver_id: AccountId,
    pub actions: Vec<Action>,
}

/// Capabilities an external wallet provides.
pub trait WalletAdapter: Send + Sync {
    /// Accounts the wallet can sign for.
    fn get_accounts(&self) -> BoxFuture<'_, Result<Vec<WalletAccount>, WalletError>>;

    fn sign_and_send_transaction(
        &self,
        request: TransactionRequest,
    ) -> BoxFuture<'_, Result<FinalExecutionOutcome, WalletError>>;

    /// Sign a NEP-413 message. Wallets without message signing keep the
    /// default.
    fn sign_message<'a>(
        &'a self,
        params: &'a SignMessageParams,
    ) -> BoxFuture<'a, Result<SignedMessage, WalletError>> {
        let _ = params;
        Box::pin(async { Err(WalletError::Unsupported("sign_message")) })
    }
}

/// A [`WalletAdapter`] backed by a [`Near`] client and its signer.
#[derive(Clone, Debug)]
pub struct SignerWallet {
    near: Near,
}

impl SignerWallet {
    pub fn new(near: Near) -> Self {
        Self { near }
    }

    fn account_id(&self) -> Result<&AccountId, WalletError> {
        self.near
            .account_id()
            .ok_or_else(|| WalletError::Other(Error::NoSigner.to_string()))
    }
}

fn wallet_error(error: Error) -> WalletError {
    match error {
        Error::Wallet(e) => e,
        e => WalletError::Other(e.to_string()),
    }
}

impl WalletAdapter for SignerWallet {
    fn get_accounts(&self) -> BoxFuture<'_, Result<Vec<WalletAccount>, WalletError>> {
        Box::pin(async move {
            let accounts = match self.near.signer() {
                Some(signer) => vec![WalletAccount {
                    account_id: signer.account_id().clone(),
                    public_key: signer.stable_public_key(),
                }],
                None => Vec::new(),
            };
            Ok(accounts)
        })
    }

    fn sign_and_send_transaction(
        &self,
        request: TransactionRequest,
    ) -> BoxFuture<'_, Result<FinalExecutionOutcome, WalletError>> {
        Box::pin(async move {
            let account_id = self.account_id()?;
            match request.signer_id {
                Some(signer_id) if &signer_id != account_id => {
                    return Err(WalletError::UnknownAccount(signer_id));
                }
                _ => {}
            }

            let builder = request
                .actions
                .into_iter()
                .fold(self.near.transaction(request.receiver_id), |tx, action| {
                    tx.add_action(action)
                });
            builder.await.map_err(wallet_error)
        })
    }

    fn sign_message<'a>(
        &'a self,
        params: &'a SignMessageParams,
    ) -> BoxFuture<'a, Result<SignedMessage, WalletError>> {
        Box::pin(async move { self.near.sign_message(params).await.map_err(wallet_error) })
    }
}
