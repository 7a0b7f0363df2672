//! Key storage.
//!
//! A [`KeyStore`] maps account ids to key pairs. The transaction pipeline
//! only ever reads from one (through
//! [`KeyStoreSigner`](crate::KeyStoreSigner)); persistent backends such as
//! credential files or an OS keychain live outside this crate and implement
//! the trait.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use crate::error::KeyStoreError;
use crate::types::{AccountId, KeyPair};

/// Storage for account key pairs.
pub trait KeyStore: Send + Sync {
    /// The key pair for `account_id`, if one is stored.
    fn get(&self, account_id: &AccountId) -> Result<Option<KeyPair>, KeyStoreError>;

    /// Store a key pair, replacing any previous one for the account.
    fn add(&self, account_id: &AccountId, key_pair: KeyPair) -> Result<(), KeyStoreError>;

    fn remove(&self, account_id: &AccountId) -> Result<(), KeyStoreError>;

    /// Accounts with a stored key.
    fn list(&self) -> Result<Vec<AccountId>, KeyStoreError>;
}

/// Process-local key store.
#[derive(Default)]
pub struct InMemoryKeyStore {
    keys: RwLock<HashMap<AccountId, KeyPair>>,
}

impl InMemoryKeyStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyStore for InMemoryKeyStore {
    fn get(&self, account_id: &AccountId) -> Result<Option<KeyPair>, KeyStoreError> {
        let keys = self.keys.read().unwrap_or_else(PoisonError::into_inner);
        Ok(keys.get(account_id).cloned())
    }

    fn add(&self, account_id: &AccountId, key_pair: KeyPair) -> Result<(), KeyStoreError> {
        let mut keys = self.keys.write().unwrap_or_else(PoisonError::into_inner);
        keys.insert(account_id.clone(), key_pair);
        Ok(())
    }

    fn remove(&self, account_id: &AccountId) -> Result<(), KeyStoreError> {
        let mut keys = self.keys.write().unwrap_or_else(PoisonError::into_inner);
        keys.remove(account_id);
        Ok(())
    }

    fn list(&self) -> Result<Vec<AccountId>, KeyStoreError> {
        let keys = self.keys.read().unwrap_or_else(PoisonError::into_inner);
        let mut accounts: Vec<_> = keys.keys().cloned().collect();
        accounts.sort();
        Ok(accounts)
    }
}

impl std::fmt::Debug for InMemoryKeyStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let keys = self.keys.read().unwrap_or_else(PoisonError::into_inner);
        f.debug_struct("InMemoryKeyStore")
            .field("accounts", &keys.len())
            .finish()
    }
}
