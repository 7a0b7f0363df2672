//! The transaction envelope.

use base64::{Engine as _, engine::general_purpose::STANDARD};
use borsh::{BorshDeserialize, BorshSerialize};

use super::{AccountId, Action, CryptoHash, PublicKey, SecretKey, Signature, borsh_bytes};
use crate::error::{Error, SignerError};

/// An unsigned transaction. Field order is the wire order.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct Transaction {
    /// Signs and pays.
    pub signer_id: AccountId,
    pub public_key: PublicKey,
    /// Must exceed the access key's current nonce.
    pub nonce: u64,
    pub receiver_id: AccountId,
    /// A recent block hash; bounds how long the transaction stays valid.
    pub block_hash: CryptoHash,
    pub actions: Vec<Action>,
}

impl Transaction {
    /// Canonical bytes of the unsigned transaction.
    pub fn to_bytes(&self) -> Vec<u8> {
        borsh_bytes(self)
    }

    /// SHA-256 of [`to_bytes`](Self::to_bytes). This is what gets signed and
    /// what the network reports as the transaction hash.
    pub fn hash(&self) -> CryptoHash {
        CryptoHash::hash(&self.to_bytes())
    }

    /// Sign with a local secret key.
    pub fn sign(self, secret_key: &SecretKey) -> Result<SignedTransaction, SignerError> {
        let signature = secret_key.sign(self.hash().as_bytes())?;
        Ok(SignedTransaction {
            transaction: self,
            signature,
        })
    }
}

/// A signed transaction ready to be broadcast.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct SignedTransaction {
    pub transaction: Transaction,
    pub signature: Signature,
}

impl SignedTransaction {
    pub fn hash(&self) -> CryptoHash {
        self.transaction.hash()
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        borsh_bytes(self)
    }

    /// Base64 form expected by the broadcast RPC methods.
    pub fn to_base64(&self) -> String {
        STANDARD.encode(self.to_bytes())
    }

    /// Whether the signature matches the transaction's own public key.
    pub fn verify(&self) -> bool {
        self.signature
            .verify(self.hash().as_bytes(), &self.transaction.public_key)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        Ok(borsh::from_slice(bytes)?)
    }

    pub fn from_base64(s: &str) -> Result<Self, Error> {
        let bytes = STANDARD
            .decode(s)
            .map_err(|e| Error::InvalidTransaction(format!("Invalid base64: {}", e)))?;
        Self::from_bytes(&bytes)
    }
}
