//! Cryptographic key types.
//!
//! Text form is `<curve>:<base58>`; wire form is a one-byte [`KeyType`]
//! followed by the raw key or signature bytes.

use std::fmt::{self, Debug, Display};
use std::io;
use std::str::FromStr;

use borsh::{BorshDeserialize, BorshSerialize};
use ed25519_dalek::Signer as _;
use k256::ecdsa::signature::hazmat::PrehashVerifier;
use rand::rngs::OsRng;
use serde_with::{DeserializeFromStr, SerializeDisplay};

use crate::error::{ParseKeyError, SignerError};

/// Key type identifier, doubling as the wire discriminant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum KeyType {
    Ed25519 = 0,
    Secp256k1 = 1,
}

impl KeyType {
    pub fn as_str(&self) -> &'static str {
        match self {
            KeyType::Ed25519 => "ed25519",
            KeyType::Secp256k1 => "secp256k1",
        }
    }

    /// Public key length in bytes. Secp256k1 keys are uncompressed without
    /// the leading `0x04`.
    pub fn public_key_len(&self) -> usize {
        match self {
            KeyType::Ed25519 => 32,
            KeyType::Secp256k1 => 64,
        }
    }

    /// Signature length in bytes. Secp256k1 signatures carry a trailing
    /// recovery id.
    pub fn signature_len(&self) -> usize {
        match self {
            KeyType::Ed25519 => 64,
            KeyType::Secp256k1 => 65,
        }
    }
}

impl TryFrom<u8> for KeyType {
    type Error = ParseKeyError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(KeyType::Ed25519),
            1 => Ok(KeyType::Secp256k1),
            _ => Err(ParseKeyError::UnknownKeyType(value.to_string())),
        }
    }
}

impl FromStr for KeyType {
    type Err = ParseKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ed25519" => Ok(KeyType::Ed25519),
            "secp256k1" => Ok(KeyType::Secp256k1),
            other => Err(ParseKeyError::UnknownKeyType(other.to_string())),
        }
    }
}

/// Split `curve:base58` into its key type and decoded bytes.
fn split_prefixed(s: &str) -> Result<(KeyType, Vec<u8>), ParseKeyError> {
    let (key_type, data) = s.split_once(':').ok_or(ParseKeyError::InvalidFormat)?;
    let key_type: KeyType = key_type.parse()?;
    let data = bs58::decode(data)
        .into_vec()
        .map_err(|e| ParseKeyError::InvalidBase58(e.to_string()))?;
    Ok((key_type, data))
}

fn check_len(expected: usize, data: &[u8]) -> Result<(), ParseKeyError> {
    if data.len() != expected {
        return Err(ParseKeyError::InvalidLength {
            expected,
            actual: data.len(),
        });
    }
    Ok(())
}

fn invalid_data(e: impl Display) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, e.to_string())
}

// ============================================================================
// PublicKey
// ============================================================================

/// Ed25519 or Secp256k1 public key. Always a valid curve point.
#[derive(Clone, PartialEq, Eq, Hash, SerializeDisplay, DeserializeFromStr)]
pub struct PublicKey {
    key_type: KeyType,
    data: Vec<u8>,
}

impl PublicKey {
    /// Build a public key from raw bytes, validating length and curve point.
    pub fn from_parts(key_type: KeyType, data: Vec<u8>) -> Result<Self, ParseKeyError> {
        check_len(key_type.public_key_len(), &data)?;
        match key_type {
            KeyType::Ed25519 => {
                let bytes: [u8; 32] = data
                    .as_slice()
                    .try_into()
                    .map_err(|_| ParseKeyError::InvalidCurvePoint)?;
                ed25519_dalek::VerifyingKey::from_bytes(&bytes)
                    .map_err(|_| ParseKeyError::InvalidCurvePoint)?;
            }
            KeyType::Secp256k1 => {
                secp256k1_verifying_key(&data).ok_or(ParseKeyError::InvalidCurvePoint)?;
            }
        }
        Ok(Self { key_type, data })
    }

    pub fn key_type(&self) -> KeyType {
        self.key_type
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }
}

fn secp256k1_verifying_key(data: &[u8]) -> Option<k256::ecdsa::VerifyingKey> {
    let mut sec1 = Vec::with_capacity(65);
    sec1.push(0x04);
    sec1.extend_from_slice(data);
    k256::ecdsa::VerifyingKey::from_sec1_bytes(&sec1).ok()
}

impl FromStr for PublicKey {
    type Err = ParseKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (key_type, data) = split_prefixed(s)?;
        Self::from_parts(key_type, data)
    }
}

impl TryFrom<&str> for PublicKey {
    type Error = ParseKeyError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}",
            self.key_type.as_str(),
            bs58::encode(&self.data).into_string()
        )
    }
}

impl Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", self)
    }
}

impl BorshSerialize for PublicKey {
    fn serialize<W: io::Write>(&self, writer: &mut W) -> io::Result<()> {
        writer.write_all(&[self.key_type as u8])?;
        writer.write_all(&self.data)
    }
}

impl BorshDeserialize for PublicKey {
    fn deserialize_reader<R: io::Read>(reader: &mut R) -> io::Result<Self> {
        let key_type = KeyType::try_from(u8::deserialize_reader(reader)?).map_err(invalid_data)?;
        let mut data = vec![0u8; key_type.public_key_len()];
        reader.read_exact(&mut data)?;
        Self::from_parts(key_type, data).map_err(invalid_data)
    }
}

// ============================================================================
// SecretKey
// ============================================================================

/// Ed25519 or Secp256k1 secret key.
#[derive(Clone)]
pub enum SecretKey {
    Ed25519(ed25519_dalek::SigningKey),
    Secp256k1(k256::ecdsa::SigningKey),
}

impl SecretKey {
    pub fn generate_ed25519() -> Self {
        SecretKey::Ed25519(ed25519_dalek::SigningKey::generate(&mut OsRng))
    }

    pub fn generate_secp256k1() -> Self {
        SecretKey::Secp256k1(k256::ecdsa::SigningKey::random(&mut OsRng))
    }

    pub fn ed25519_from_bytes(bytes: [u8; 32]) -> Self {
        SecretKey::Ed25519(ed25519_dalek::SigningKey::from_bytes(&bytes))
    }

    pub fn key_type(&self) -> KeyType {
        match self {
            SecretKey::Ed25519(_) => KeyType::Ed25519,
            SecretKey::Secp256k1(_) => KeyType::Secp256k1,
        }
    }

    /// Derive the public key.
    pub fn public_key(&self) -> PublicKey {
        match self {
            SecretKey::Ed25519(key) => PublicKey {
                key_type: KeyType::Ed25519,
                data: key.verifying_key().to_bytes().to_vec(),
            },
            SecretKey::Secp256k1(key) => PublicKey {
                key_type: KeyType::Secp256k1,
                // Drop the SEC1 uncompressed tag byte.
                data: key.verifying_key().to_encoded_point(false).as_bytes()[1..].to_vec(),
            },
        }
    }

    /// Sign a message.
    ///
    /// Secp256k1 treats `message` as an already-hashed digest; every payload
    /// this crate signs is a 32-byte SHA-256 hash.
    pub fn sign(&self, message: &[u8]) -> Result<Signature, SignerError> {
        match self {
            SecretKey::Ed25519(key) => Ok(Signature {
                key_type: KeyType::Ed25519,
                data: key.sign(message).to_bytes().to_vec(),
            }),
            SecretKey::Secp256k1(key) => {
                let (signature, recovery_id) = key
                    .sign_prehash_recoverable(message)
                    .map_err(|e| SignerError::SigningFailed(e.to_string()))?;
                let mut data = signature.to_bytes().to_vec();
                data.push(recovery_id.to_byte());
                Ok(Signature {
                    key_type: KeyType::Secp256k1,
                    data,
                })
            }
        }
    }

    fn secret_bytes(&self) -> Vec<u8> {
        match self {
            SecretKey::Ed25519(key) => {
                // Expanded form: seed followed by public key.
                let mut bytes = key.to_bytes().to_vec();
                bytes.extend_from_slice(&key.verifying_key().to_bytes());
                bytes
            }
            SecretKey::Secp256k1(key) => key.to_bytes().to_vec(),
        }
    }
}

impl FromStr for SecretKey {
    type Err = ParseKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (key_type, data) = split_prefixed(s)?;
        match key_type {
            // 32-byte seed or 64-byte expanded key (seed + public key).
            KeyType::Ed25519 => {
                if data.len() != 32 && data.len() != 64 {
                    return Err(ParseKeyError::InvalidLength {
                        expected: 64,
                        actual: data.len(),
                    });
                }
                let mut seed = [0u8; 32];
                seed.copy_from_slice(&data[..32]);
                Ok(Self::ed25519_from_bytes(seed))
            }
            KeyType::Secp256k1 => {
                check_len(32, &data)?;
                k256::ecdsa::SigningKey::from_slice(&data)
                    .map(SecretKey::Secp256k1)
                    .map_err(|_| ParseKeyError::InvalidCurvePoint)
            }
        }
    }
}

impl Display for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}",
            self.key_type().as_str(),
            bs58::encode(self.secret_bytes()).into_string()
        )
    }
}

impl Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecretKey({}:***)", self.key_type().as_str())
    }
}

// ============================================================================
// Signature
// ============================================================================

/// A signature tagged with the curve that produced it.
#[derive(Clone, PartialEq, Eq, SerializeDisplay, DeserializeFromStr)]
pub struct Signature {
    key_type: KeyType,
    data: Vec<u8>,
}

impl Signature {
    /// Build a signature from raw bytes, validating only the length.
    pub fn from_parts(key_type: KeyType, data: Vec<u8>) -> Result<Self, ParseKeyError> {
        check_len(key_type.signature_len(), &data)?;
        Ok(Self { key_type, data })
    }

    pub fn key_type(&self) -> KeyType {
        self.key_type
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Verify this signature over `message` against `public_key`.
    ///
    /// Never panics: mismatched curves or malformed bytes simply fail.
    pub fn verify(&self, message: &[u8], public_key: &PublicKey) -> bool {
        if self.key_type != public_key.key_type() {
            return false;
        }

        match self.key_type {
            KeyType::Ed25519 => {
                let Ok(pk_bytes) = <[u8; 32]>::try_from(public_key.as_bytes()) else {
                    return false;
                };
                let Ok(verifying_key) = ed25519_dalek::VerifyingKey::from_bytes(&pk_bytes) else {
                    return false;
                };
                let Ok(signature) = ed25519_dalek::Signature::from_slice(&self.data) else {
                    return false;
                };
                verifying_key.verify_strict(message, &signature).is_ok()
            }
            KeyType::Secp256k1 => {
                let Some(verifying_key) = secp256k1_verifying_key(public_key.as_bytes()) else {
                    return false;
                };
                let Some(Ok(signature)) = self
                    .data
                    .get(..64)
                    .map(k256::ecdsa::Signature::from_slice)
                else {
                    return false;
                };
                verifying_key.verify_prehash(message, &signature).is_ok()
            }
        }
    }
}

impl FromStr for Signature {
    type Err = ParseKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (key_type, data) = split_prefixed(s)?;
        Self::from_parts(key_type, data)
    }
}

impl Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}",
            self.key_type.as_str(),
            bs58::encode(&self.data).into_string()
        )
    }
}

impl Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature({})", self)
    }
}

impl BorshSerialize for Signature {
    fn serialize<W: io::Write>(&self, writer: &mut W) -> io::Result<()> {
        writer.write_all(&[self.key_type as u8])?;
        writer.write_all(&self.data)
    }
}

impl BorshDeserialize for Signature {
    fn deserialize_reader<R: io::Read>(reader: &mut R) -> io::Result<Self> {
        let key_type = KeyType::try_from(u8::deserialize_reader(reader)?).map_err(invalid_data)?;
        let mut data = vec![0u8; key_type.signature_len()];
        reader.read_exact(&mut data)?;
        Ok(Self { key_type, data })
    }
}

// ============================================================================
// KeyPair
// ============================================================================

/// A secret key together with its derived public key.
#[derive(Clone)]
pub struct KeyPair {
    pub secret_key: SecretKey,
    pub public_key: PublicKey,
}

impl KeyPair {
    pub fn random() -> Self {
        Self::from_secret_key(SecretKey::generate_ed25519())
    }

    pub fn random_secp256k1() -> Self {
        Self::from_secret_key(SecretKey::generate_secp256k1())
    }

    pub fn from_secret_key(secret_key: SecretKey) -> Self {
        let public_key = secret_key.public_key();
        Self {
            secret_key,
            public_key,
        }
    }
}

impl FromStr for KeyPair {
    type Err = ParseKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse().map(Self::from_secret_key)
    }
}

impl Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("public_key", &self.public_key)
            .field("secret_key", &"***")
            .finish()
    }
}
