//! Signers: who signs, and with which key.
//!
//! [`Signer::key`] is called once per transaction. Each returned
//! [`SigningKey`] carries its public key, which is also the nonce-cache key,
//! so signers with several keys spread load across independent nonce
//! sequences.
//!
//! | Signer | Keys |
//! |--------|------|
//! | [`InMemorySigner`] | one secret key held in process |
//! | [`RotatingSigner`] | several keys of one account, round-robin |
//! | [`KeyStoreSigner`] | one key read from a [`KeyStore`] |
//!
//! # Example
//!
//! ```rust,no_run
//! use near_kit_core::{InMemorySigner, Near, NearToken};
//!
//! # async fn example() -> Result<(), near_kit_core::Error> {
//! let signer = InMemorySigner::new(
//!     "alice.testnet",
//!     "ed25519:3D4YudUahN1nawWogh8pAKSj92sUNMdbZGjn7kERKzYoTy8tnFQuwoGUC51DowKqorvkr2pytJSnwuSbsNVfqygr"
//! )?;
//!
//! let near = Near::testnet().signer(signer).build()?;
//! near.transfer("bob.testnet", NearToken::from_near(1)).await?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use futures::future::BoxFuture;

use crate::client::keystore::KeyStore;
use crate::error::{Error, KeyStoreError, SignerError};
use crate::types::nep413::{self, SignMessageParams, SignedMessage};
use crate::types::{AccountId, KeyPair, PublicKey, SecretKey, Signature};

// ============================================================================
// Signer Trait
// ============================================================================

/// Source of signing keys for one account.
///
/// # Example Implementation
///
/// ```rust,ignore
/// use near_kit_core::{AccountId, SecretKey, Signer, SigningKey};
///
/// struct MyCustomSigner {
///     account_id: AccountId,
///     secret_key: SecretKey,
/// }
///
/// impl Signer for MyCustomSigner {
///     fn account_id(&self) -> &AccountId {
///         &self.account_id
///     }
///
///     fn key(&self) -> SigningKey {
///         SigningKey::new(self.secret_key.clone())
///     }
/// }
/// ```
pub trait Signer: Send + Sync {
    /// The account this signer signs for.
    fn account_id(&self) -> &AccountId;

    /// Get a key for signing.
    ///
    /// For single-key signers this always returns the same key. Rotating
    /// signers claim the next key in rotation.
    fn key(&self) -> SigningKey;

    /// The public key every [`key`](Self::key) call returns, if there is
    /// only one. Reading it never advances a rotation.
    fn stable_public_key(&self) -> Option<PublicKey> {
        None
    }
}

impl Signer for Arc<dyn Signer> {
    fn account_id(&self) -> &AccountId {
        (**self).account_id()
    }

    fn key(&self) -> SigningKey {
        (**self).key()
    }

    fn stable_public_key(&self) -> Option<PublicKey> {
        (**self).stable_public_key()
    }
}

// ============================================================================
// SigningKey
// ============================================================================

/// A public key plus the ability to sign with its secret half.
///
/// Signing is async so that backends such as hardware wallets or remote
/// key services can implement [`SigningBackend`].
#[derive(Clone)]
pub struct SigningKey {
    public_key: PublicKey,
    backend: Arc<dyn SigningBackend>,
}

impl SigningKey {
    /// Create a new signing key from a secret key.
    pub fn new(secret_key: SecretKey) -> Self {
        let public_key = secret_key.public_key();
        Self {
            public_key,
            backend: Arc::new(secret_key),
        }
    }

    /// Wrap an external signing backend.
    pub fn from_backend(public_key: PublicKey, backend: Arc<dyn SigningBackend>) -> Self {
        Self {
            public_key,
            backend,
        }
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.public_key
    }

    /// Sign a message, typically a 32-byte hash.
    pub async fn sign(&self, message: &[u8]) -> Result<Signature, SignerError> {
        self.backend.sign(message).await
    }

    /// Sign a NEP-413 message for off-chain authentication.
    ///
    /// ```rust,ignore
    /// use near_kit_core::{nep413, InMemorySigner, Signer};
    ///
    /// let signer = InMemorySigner::new("alice.testnet", "ed25519:...")?;
    /// let params = nep413::SignMessageParams {
    ///     message: "Login to MyApp".to_string(),
    ///     recipient: "myapp.com".to_string(),
    ///     nonce: nep413::generate_nonce(),
    ///     callback_url: None,
    ///     state: None,
    /// };
    /// let signed = signer.key().sign_nep413(signer.account_id(), &params).await?;
    /// ```
    pub async fn sign_nep413(
        &self,
        account_id: &AccountId,
        params: &SignMessageParams,
    ) -> Result<SignedMessage, SignerError> {
        let hash = nep413::hash_message(params);
        let signature = self.sign(hash.as_bytes()).await?;

        Ok(SignedMessage {
            account_id: account_id.clone(),
            public_key: self.public_key.clone(),
            signature,
            state: params.state.clone(),
        })
    }
}

impl std::fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningKey")
            .field("public_key", &self.public_key)
            .finish()
    }
}

/// Something that can produce signatures without exposing key material.
pub trait SigningBackend: Send + Sync {
    fn sign<'a>(&'a self, message: &'a [u8]) -> BoxFuture<'a, Result<Signature, SignerError>>;
}

impl SigningBackend for SecretKey {
    fn sign<'a>(&'a self, message: &'a [u8]) -> BoxFuture<'a, Result<Signature, SignerError>> {
        let signature = SecretKey::sign(self, message);
        Box::pin(async move { signature })
    }
}

// ============================================================================
// InMemorySigner
// ============================================================================

/// A signer with a single key stored in memory.
///
/// Suitable for scripts, bots, and testing.
#[derive(Clone)]
pub struct InMemorySigner {
    account_id: AccountId,
    secret_key: SecretKey,
    public_key: PublicKey,
}

impl InMemorySigner {
    /// Create a new signer from an account id and an `ed25519:...` or
    /// `secp256k1:...` secret key.
    pub fn new(account_id: impl AsRef<str>, secret_key: impl AsRef<str>) -> Result<Self, Error> {
        let account_id: AccountId = account_id.as_ref().parse()?;
        let secret_key: SecretKey = secret_key.as_ref().parse()?;
        Ok(Self::from_secret_key(account_id, secret_key))
    }

    pub fn from_secret_key(account_id: AccountId, secret_key: SecretKey) -> Self {
        let public_key = secret_key.public_key();
        Self {
            account_id,
            secret_key,
            public_key,
        }
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.public_key
    }
}

impl std::fmt::Debug for InMemorySigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemorySigner")
            .field("account_id", &self.account_id)
            .field("public_key", &self.public_key)
            .finish()
    }
}

impl Signer for InMemorySigner {
    fn account_id(&self) -> &AccountId {
        &self.account_id
    }

    fn key(&self) -> SigningKey {
        SigningKey::new(self.secret_key.clone())
    }

    fn stable_public_key(&self) -> Option<PublicKey> {
        Some(self.public_key.clone())
    }
}

// ============================================================================
// RotatingSigner
// ============================================================================

/// A signer that rotates through multiple keys of one account.
///
/// Each key has its own nonce sequence, so spreading concurrent
/// transactions across keys avoids nonce contention.
pub struct RotatingSigner {
    account_id: AccountId,
    keys: Vec<SecretKey>,
    counter: AtomicUsize,
}

impl RotatingSigner {
    /// Fails if `keys` is empty.
    pub fn new(account_id: impl AsRef<str>, keys: Vec<SecretKey>) -> Result<Self, Error> {
        if keys.is_empty() {
            return Err(SignerError::NoKeys.into());
        }

        Ok(Self {
            account_id: account_id.as_ref().parse()?,
            keys,
            counter: AtomicUsize::new(0),
        })
    }

    pub fn from_key_strings(
        account_id: impl AsRef<str>,
        keys: &[impl AsRef<str>],
    ) -> Result<Self, Error> {
        let parsed: Result<Vec<SecretKey>, _> = keys.iter().map(|k| k.as_ref().parse()).collect();
        Self::new(account_id, parsed?)
    }

    pub fn key_count(&self) -> usize {
        self.keys.len()
    }

    pub fn public_keys(&self) -> Vec<PublicKey> {
        self.keys.iter().map(SecretKey::public_key).collect()
    }
}

impl std::fmt::Debug for RotatingSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RotatingSigner")
            .field("account_id", &self.account_id)
            .field("key_count", &self.keys.len())
            .field("counter", &self.counter.load(Ordering::Relaxed))
            .finish()
    }
}

impl Signer for RotatingSigner {
    fn account_id(&self) -> &AccountId {
        &self.account_id
    }

    fn key(&self) -> SigningKey {
        let idx = self.counter.fetch_add(1, Ordering::Relaxed) % self.keys.len();
        SigningKey::new(self.keys[idx].clone())
    }

    fn stable_public_key(&self) -> Option<PublicKey> {
        match self.keys.as_slice() {
            [only] => Some(only.public_key()),
            _ => None,
        }
    }
}

// ============================================================================
// KeyStoreSigner
// ============================================================================

/// A signer whose key comes from a [`KeyStore`].
///
/// The key is read once, at construction.
#[derive(Clone)]
pub struct KeyStoreSigner {
    inner: InMemorySigner,
}

impl KeyStoreSigner {
    /// Load the key for `account_id`.
    pub fn new(store: &dyn KeyStore, account_id: impl AsRef<str>) -> Result<Self, Error> {
        let account_id: AccountId = account_id.as_ref().parse()?;
        let key_pair = store
            .get(&account_id)?
            .ok_or_else(|| KeyStoreError::KeyNotFound(account_id.clone()))?;
        Ok(Self {
            inner: InMemorySigner::from_secret_key(account_id, key_pair.secret_key),
        })
    }

    /// Save `key_pair` for `account_id` in `store`, then sign with it.
    pub fn import(
        store: &dyn KeyStore,
        account_id: impl AsRef<str>,
        key_pair: KeyPair,
    ) -> Result<Self, Error> {
        let account_id: AccountId = account_id.as_ref().parse()?;
        store.add(&account_id, key_pair.clone())?;
        Ok(Self {
            inner: InMemorySigner::from_secret_key(account_id, key_pair.secret_key),
        })
    }

    pub fn public_key(&self) -> &PublicKey {
        self.inner.public_key()
    }
}

impl std::fmt::Debug for KeyStoreSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyStoreSigner")
            .field("account_id", &self.inner.account_id)
            .field("public_key", &self.inner.public_key)
            .finish()
    }
}

impl Signer for KeyStoreSigner {
    fn account_id(&self) -> &AccountId {
        self.inner.account_id()
    }

    fn key(&self) -> SigningKey {
        self.inner.key()
    }

    fn stable_public_key(&self) -> Option<PublicKey> {
        self.inner.stable_public_key()
    }
}

// ============================================================================
// Tests
// ============================================================================
