//! Signed transaction output ready for broadcast

use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::fmt;

use crate::base58;

/// Length of one Ed25519 signature slot in the wire format
pub const SIGNATURE_LENGTH: usize = 64;

/// A fully signed transaction in wire format
///
/// The fee payer's signature doubles as the transaction id, so it is kept
/// alongside the bytes for logging before the RPC answers.
#[derive(Clone, PartialEq, Eq)]
pub struct SignedTransaction {
    bytes: Vec<u8>,
    signature: [u8; SIGNATURE_LENGTH],
}

impl SignedTransaction {
    pub(crate) fn new(bytes: Vec<u8>, signature: [u8; SIGNATURE_LENGTH]) -> Self {
        Self { bytes, signature }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    /// Raw first signature
    pub fn signature(&self) -> &[u8; SIGNATURE_LENGTH] {
        &self.signature
    }

    /// Transaction id as reported by explorers
    pub fn signature_base58(&self) -> String {
        base58::encode(&self.signature)
    }

    /// Encoding expected by `sendTransaction` with `encoding: "base64"`
    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.bytes)
    }
}

impl fmt::Debug for SignedTransaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignedTransaction")
            .field("signature", &self.signature_base58())
            .field("len", &self.bytes.len())
            .finish()
    }
}
