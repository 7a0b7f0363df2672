//! NEP-413 off-chain message signing.
//!
//! A wallet proves control of an account by signing a framed message
//! instead of a transaction. The frame is the `u32` little-endian
//! [`NEP413_TAG`] followed by the borsh encoding of
//! `{ message, nonce, recipient, callback_url }`, and the signature covers
//! the SHA-256 of that frame. The tag makes the frame unparseable as a
//! transaction, so a signed message can never be replayed on chain.
//!
//! Tracking seen nonces (replay protection) is up to the verifier.
//!
//! ```rust
//! use near_kit_core::{KeyPair, nep413};
//!
//! let key = KeyPair::random();
//! let params = nep413::SignMessageParams {
//!     message: "Login to MyApp".to_string(),
//!     recipient: "myapp.com".to_string(),
//!     nonce: nep413::generate_nonce(),
//!     callback_url: None,
//!     state: None,
//! };
//!
//! let hash = nep413::hash_message(&params);
//! let signed = nep413::SignedMessage {
//!     account_id: "alice.testnet".parse().unwrap(),
//!     public_key: key.public_key.clone(),
//!     signature: key.secret_key.sign(hash.as_bytes()).unwrap(),
//!     state: None,
//! };
//! assert!(nep413::verify_signature(&signed, &params));
//! ```

use base64::{Engine as _, engine::general_purpose::STANDARD};
use borsh::BorshSerialize;
use rand::RngCore;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_with::{hex::Hex, serde_as};
use tracing::debug;

use crate::client::RpcClient;
use crate::error::{Error, RpcError};
use crate::types::{
    AccessKeyPermissionView, AccountId, BlockReference, CryptoHash, KeyType, PublicKey, Signature,
    borsh_bytes,
};

/// `2^31 + 413`. Too large to be the length prefix of a valid signer id.
pub const NEP413_TAG: u32 = (1 << 31) + 413;

// ============================================================================
// Types
// ============================================================================

/// What the user is asked to sign.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignMessageParams {
    pub message: String,
    /// Who the signature is meant for, e.g. `"myapp.com"`.
    pub recipient: String,
    /// Use [`generate_nonce`].
    pub nonce: [u8; 32],
    pub callback_url: Option<String>,
    /// Echoed back in the [`SignedMessage`]; not signed.
    pub state: Option<String>,
}

#[derive(BorshSerialize)]
struct Payload<'a> {
    message: &'a str,
    nonce: [u8; 32],
    recipient: &'a str,
    callback_url: Option<&'a str>,
}

/// A wallet's answer to a sign-message request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignedMessage {
    pub account_id: AccountId,
    pub public_key: PublicKey,
    /// Base64 in JSON.
    #[serde(
        serialize_with = "serialize_signature_base64",
        deserialize_with = "deserialize_signature"
    )]
    pub signature: Signature,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
}

/// The JSON body a frontend typically posts to a backend to log in.
#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthPayload {
    pub signed_message: SignedMessage,
    #[serde_as(as = "Hex")]
    pub nonce: [u8; 32],
    pub message: String,
    pub recipient: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub callback_url: Option<String>,
}

impl AuthPayload {
    pub fn from_signed(signed_message: SignedMessage, params: &SignMessageParams) -> Self {
        Self {
            signed_message,
            nonce: params.nonce,
            message: params.message.clone(),
            recipient: params.recipient.clone(),
            callback_url: params.callback_url.clone(),
        }
    }

    /// The parameters the client claims to have signed.
    pub fn to_params(&self) -> SignMessageParams {
        SignMessageParams {
            message: self.message.clone(),
            recipient: self.recipient.clone(),
            nonce: self.nonce,
            callback_url: self.callback_url.clone(),
            state: self.signed_message.state.clone(),
        }
    }
}

/// Options for [`verify`].
#[derive(Debug, Clone)]
pub struct VerifyOptions {
    /// Also require the key to be a full-access key of the claimed account.
    pub require_full_access: bool,
}

impl Default for VerifyOptions {
    fn default() -> Self {
        Self {
            require_full_access: true,
        }
    }
}

// ============================================================================
// Core Functions
// ============================================================================

/// 32 bytes from the OS random number generator.
pub fn generate_nonce() -> [u8; 32] {
    let mut nonce = [0u8; 32];
    rand::rngs::OsRng.fill_bytes(&mut nonce);
    nonce
}

/// The exact byte frame that gets hashed and signed.
pub fn serialize_message(params: &SignMessageParams) -> Vec<u8> {
    let payload = Payload {
        message: &params.message,
        nonce: params.nonce,
        recipient: &params.recipient,
        callback_url: params.callback_url.as_deref(),
    };
    let mut frame = NEP413_TAG.to_le_bytes().to_vec();
    frame.extend_from_slice(&borsh_bytes(&payload));
    frame
}

/// SHA-256 of [`serialize_message`]; the value a signer signs.
pub fn hash_message(params: &SignMessageParams) -> CryptoHash {
    CryptoHash::hash(&serialize_message(params))
}

/// Cryptographic check only: was this exact (message, recipient, nonce,
/// callback_url) signed by `signed.public_key`?
///
/// Does not check that the key belongs to `signed.account_id`; see
/// [`verify`].
pub fn verify_signature(signed: &SignedMessage, params: &SignMessageParams) -> bool {
    let hash = hash_message(params);
    signed.signature.verify(hash.as_bytes(), &signed.public_key)
}

/// Full check: the signature is valid and the key is an access key of the
/// claimed account (a full-access one, unless disabled in `options`).
///
/// A missing account or key yields `Ok(false)`; transport failures are
/// returned as errors so callers can retry instead of rejecting the user.
pub async fn verify(
    signed: &SignedMessage,
    params: &SignMessageParams,
    rpc: &RpcClient,
    options: VerifyOptions,
) -> Result<bool, Error> {
    if !verify_signature(signed, params) {
        return Ok(false);
    }
    if !options.require_full_access {
        return Ok(true);
    }

    match rpc
        .view_access_key(
            &signed.account_id,
            &signed.public_key,
            BlockReference::optimistic(),
        )
        .await
    {
        Ok(key) => Ok(matches!(key.permission, AccessKeyPermissionView::FullAccess)),
        Err(RpcError::AccessKeyNotFound { .. } | RpcError::AccountNotFound(_)) => {
            debug!(account_id = %signed.account_id, "NEP-413 key is not on the account");
            Ok(false)
        }
        Err(e) => Err(e.into()),
    }
}

// ============================================================================
// Serde Helpers
// ============================================================================

fn serialize_signature_base64<S: Serializer>(
    signature: &Signature,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&STANDARD.encode(signature.as_bytes()))
}

/// Accepts base64 (the NEP-413 form) or `curve:base58`.
fn deserialize_signature<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Signature, D::Error> {
    use serde::de::Error as _;

    let s = String::deserialize(deserializer)?;
    if s.contains(':') {
        return s.parse().map_err(D::Error::custom);
    }

    let bytes = STANDARD.decode(&s).map_err(D::Error::custom)?;
    let key_type = match bytes.len() {
        64 => KeyType::Ed25519,
        65 => KeyType::Secp256k1,
        n => {
            return Err(D::Error::custom(format!(
                "invalid signature length {n}, expected 64 or 65 bytes"
            )));
        }
    };
    Signature::from_parts(key_type, bytes).map_err(D::Error::custom)
}

// ============================================================================
// Tests
// ============================================================================
