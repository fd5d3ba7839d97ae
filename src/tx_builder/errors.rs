//! Error types for transaction construction and signing
//!
//! Layout errors (`EncodingError`) are raised before any bytes leave the
//! process; key and signing failures are `CryptoError`. Neither is ever
//! retryable: the same inputs always produce the same failure.

use crate::base58::CodecError;
use crate::wallet::KeyError;
use thiserror::Error;

/// Failure while laying out transaction bytes
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EncodingError {
    /// Recipient or blockhash did not decode to exactly 32 bytes
    #[error("Invalid address length: expected 32 bytes, got {0}")]
    InvalidAddressLength(usize),

    /// Amount is negative, non-finite or does not fit in u64 lamports
    #[error("Amount overflow: {0} does not fit in u64 lamports")]
    AmountOverflow(String),

    /// A compact-u16 length prefix was asked to carry a value above u16::MAX
    #[error("Compact length overflow: {0}")]
    CompactLengthOverflow(usize),

    /// The opaque transaction cannot hold the signature layout it declares
    #[error("Malformed transaction: {0}")]
    MalformedTransaction(String),

    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),
}

/// Failure while handling key material
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    #[error("Key import failed: {0}")]
    KeyImport(#[from] KeyError),
}

/// Unified error for the transaction builder
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransactionBuilderError {
    #[error(transparent)]
    Encoding(#[from] EncodingError),

    #[error(transparent)]
    Crypto(#[from] CryptoError),
}

impl TransactionBuilderError {
    /// Get the error category for metrics and observability
    pub fn category(&self) -> &'static str {
        match self {
            Self::Encoding(EncodingError::MalformedTransaction(_)) => "malformed_transaction",
            Self::Encoding(EncodingError::AmountOverflow(_)) => "amount_overflow",
            Self::Encoding(_) => "encoding",
            Self::Crypto(_) => "crypto",
        }
    }
}

impl From<CodecError> for TransactionBuilderError {
    fn from(err: CodecError) -> Self {
        match err {
            CodecError::InvalidAddressLength(len) => {
                Self::Encoding(EncodingError::InvalidAddressLength(len))
            }
            other => Self::Encoding(EncodingError::Codec(other)),
        }
    }
}
