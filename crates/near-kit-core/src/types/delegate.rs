//! Delegate actions (meta-transactions) and their framed encoding.
//!
//! A delegate action is signed by the sender and submitted, and paid for,
//! by a relayer. Two framings exist:
//!
//! - [`DelegateAction::serialize_for_signing`]: the `u32` little-endian
//!   [`DELEGATE_ACTION_PREFIX`] followed by the delegate action body. This is
//!   what gets hashed and signed, so a signed delegate action can never be
//!   replayed as a transaction.
//! - [`encode_signed_delegate_action`]: the same prefix followed by the
//!   signed delegate action, so a relayer can tell the blob apart from a raw
//!   signed transaction before decoding it.
//!
//! Inside a transaction, [`Action::Delegate`](super::Action::Delegate)
//! carries the signed delegate action without a prefix.

use base64::{Engine as _, engine::general_purpose::STANDARD};
use borsh::{BorshDeserialize, BorshSerialize};

use super::{AccountId, CryptoHash, NonDelegateAction, PublicKey, Signature, borsh_bytes};

/// Discriminator for delegate-action payloads: `2^30 + 366`.
pub const DELEGATE_ACTION_PREFIX: u32 = (1 << 30) + 366;

const PREFIX_LEN: usize = std::mem::size_of::<u32>();

/// Actions `sender_id` authorizes a relayer to submit on its behalf.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct DelegateAction {
    pub sender_id: AccountId,
    pub receiver_id: AccountId,
    pub actions: Vec<NonDelegateAction>,
    /// Nonce of `public_key` on `sender_id`.
    pub nonce: u64,
    /// Last block height at which a relayer may still submit this.
    pub max_block_height: u64,
    pub public_key: PublicKey,
}

/// A delegate action with the sender's signature over
/// [`DelegateAction::hash`].
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct SignedDelegateAction {
    pub delegate_action: DelegateAction,
    pub signature: Signature,
}

/// Canonical encoding of a delegate action body, without any prefix.
pub fn serialize_delegate_action(delegate_action: &DelegateAction) -> Vec<u8> {
    borsh_bytes(delegate_action)
}

fn prefixed(body: Vec<u8>) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(PREFIX_LEN + body.len());
    bytes.extend_from_slice(&DELEGATE_ACTION_PREFIX.to_le_bytes());
    bytes.extend_from_slice(&body);
    bytes
}

impl DelegateAction {
    /// The exact bytes covered by the sender's signature.
    pub fn serialize_for_signing(&self) -> Vec<u8> {
        prefixed(serialize_delegate_action(self))
    }

    /// SHA-256 of [`serialize_for_signing`](Self::serialize_for_signing).
    pub fn hash(&self) -> CryptoHash {
        CryptoHash::hash(&self.serialize_for_signing())
    }

    /// Attach a signature produced over [`hash`](Self::hash).
    pub fn sign(self, signature: Signature) -> SignedDelegateAction {
        SignedDelegateAction {
            delegate_action: self,
            signature,
        }
    }
}

impl SignedDelegateAction {
    /// Unframed encoding, as embedded in [`Action::Delegate`](super::Action::Delegate).
    pub fn to_bytes(&self) -> Vec<u8> {
        borsh_bytes(self)
    }

    /// Prefixed encoding, base64 encoded for JSON transport to a relayer.
    pub fn to_base64(&self) -> String {
        STANDARD.encode(encode_signed_delegate_action(self))
    }

    /// Inverse of [`to_base64`](Self::to_base64).
    pub fn from_base64(s: &str) -> Result<Self, DecodeError> {
        let bytes = STANDARD.decode(s.trim())?;
        decode_signed_delegate_action(&bytes)
    }

    /// Check the sender's signature against the embedded public key.
    pub fn verify(&self) -> bool {
        let hash = self.delegate_action.hash();
        self.signature
            .verify(hash.as_bytes(), &self.delegate_action.public_key)
    }

    pub fn sender_id(&self) -> &AccountId {
        &self.delegate_action.sender_id
    }

    pub fn receiver_id(&self) -> &AccountId {
        &self.delegate_action.receiver_id
    }
}

/// Prefix a signed delegate action so relayers can recognize it.
pub fn encode_signed_delegate_action(signed: &SignedDelegateAction) -> Vec<u8> {
    prefixed(signed.to_bytes())
}

/// Decode the output of [`encode_signed_delegate_action`].
///
/// Fails with a [`DecodeError`] on short input, a foreign prefix, or a
/// malformed body, including trailing bytes.
pub fn decode_signed_delegate_action(bytes: &[u8]) -> Result<SignedDelegateAction, DecodeError> {
    let Some((prefix, body)) = bytes.split_first_chunk::<PREFIX_LEN>() else {
        return Err(DecodeError::Truncated { len: bytes.len() });
    };
    let found = u32::from_le_bytes(*prefix);
    if found != DELEGATE_ACTION_PREFIX {
        return Err(DecodeError::MissingPrefix { found });
    }
    Ok(borsh::from_slice(body)?)
}

/// Error decoding a signed delegate action.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("base64 decode error: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("input too short for a delegate action prefix ({len} bytes)")]
    Truncated { len: usize },

    #[error("expected delegate action prefix {expected}, found {found}", expected = DELEGATE_ACTION_PREFIX)]
    MissingPrefix { found: u32 },

    #[error("borsh decode error: {0}")]
    Borsh(#[from] borsh::io::Error),
}
