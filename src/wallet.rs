//! Wallet keypairs and addresses
//!
//! A keypair is exported as the 64-byte `seed ‖ public_key` secret, base58
//! encoded. The address is the base58 encoding of the public key alone.

use crate::base58::{self, CodecError};
use ed25519_dalek::{Signer, SigningKey};
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use zeroize::{Zeroize, Zeroizing};

/// Length of the exported secret (`seed ‖ public_key`)
pub const SECRET_KEY_LENGTH: usize = 64;

/// Errors raised while importing or deriving key material
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyError {
    #[error("Invalid key length: expected 64 bytes, got {0}")]
    InvalidKeyLength(usize),

    #[error("Invalid keypair: all-zero key rejected")]
    AllZero,

    /// The public half does not belong to the seed half
    #[error("Invalid keypair: public key does not match seed")]
    PublicKeyMismatch,

    #[error("Invalid private key encoding: {0}")]
    Codec(#[from] CodecError),
}

/// A 32-byte on-chain address (account key, mint, program id)
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Address([u8; 32]);

impl Address {
    /// The native system program id (all zero bytes)
    pub const SYSTEM_PROGRAM: Address = Address([0u8; 32]);

    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_bytes(self) -> [u8; 32] {
        self.0
    }
}

impl FromStr for Address {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        base58::decode_32(s).map(Self)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&base58::encode(&self.0))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self)
    }
}

impl From<[u8; 32]> for Address {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Ed25519 signing keypair
///
/// The seed is zeroized on drop by `SigningKey`. `Debug` never prints it.
#[derive(Clone)]
pub struct Keypair {
    signing_key: SigningKey,
}

impl Keypair {
    /// Generate a fresh keypair from the OS CSPRNG
    pub fn generate() -> Self {
        let mut seed = [0u8; 32];
        OsRng.fill_bytes(&mut seed);
        let keypair = Self::from_seed(&seed);
        seed.zeroize();
        keypair
    }

    /// Build a keypair from a 32-byte seed
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(seed),
        }
    }

    /// Import the 64-byte `seed ‖ public_key` secret
    pub fn from_secret_bytes(bytes: &[u8]) -> Result<Self, KeyError> {
        let secret: &[u8; SECRET_KEY_LENGTH] = bytes
            .try_into()
            .map_err(|_| KeyError::InvalidKeyLength(bytes.len()))?;
        if secret.iter().all(|&b| b == 0) {
            return Err(KeyError::AllZero);
        }
        SigningKey::from_keypair_bytes(secret)
            .map(|signing_key| Self { signing_key })
            .map_err(|_| KeyError::PublicKeyMismatch)
    }

    /// Import a base58-encoded 64-byte secret
    pub fn from_base58(encoded: &str) -> Result<Self, KeyError> {
        let bytes = Zeroizing::new(base58::decode(encoded.trim())?);
        Self::from_secret_bytes(&bytes)
    }

    pub fn seed(&self) -> Zeroizing<[u8; 32]> {
        Zeroizing::new(self.signing_key.to_bytes())
    }

    pub fn public_key(&self) -> [u8; 32] {
        self.signing_key.verifying_key().to_bytes()
    }

    pub fn address(&self) -> Address {
        Address(self.public_key())
    }

    /// The exported `seed ‖ public_key` representation
    pub fn to_secret_bytes(&self) -> Zeroizing<[u8; SECRET_KEY_LENGTH]> {
        Zeroizing::new(self.signing_key.to_keypair_bytes())
    }

    /// The exported private key string handed to the owner exactly once
    pub fn to_base58(&self) -> Zeroizing<String> {
        Zeroizing::new(base58::encode(self.to_secret_bytes().as_slice()))
    }

    /// Ed25519 signature over `message`
    pub fn sign(&self, message: &[u8]) -> [u8; 64] {
        self.signing_key.sign(message).to_bytes()
    }
}

impl fmt::Debug for Keypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Keypair")
            .field("address", &self.address())
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// Derive the address from a 64-byte secret without validating the seed half
pub fn derive_address(secret: &[u8]) -> Result<String, KeyError> {
    if secret.len() != SECRET_KEY_LENGTH {
        return Err(KeyError::InvalidKeyLength(secret.len()));
    }
    Ok(base58::encode(&secret[32..]))
}
