//! Signing of externally built transactions
//!
//! The aggregator returns a complete, unsigned transaction. Only the
//! signature framing is interpreted here: if the first byte carries the
//! `0x80` marker bit the signature count is the following byte and the
//! slots start at offset 2, otherwise the first byte is the count and the
//! slots start at offset 1. Everything after the slots is the message and
//! is signed as-is. Only the first 64-byte slot is ever written.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use tracing::warn;

use super::errors::{EncodingError, TransactionBuilderError};
use super::output::{SignedTransaction, SIGNATURE_LENGTH};
use crate::base58::CodecError;
use crate::wallet::Keypair;

/// Marker bit on the first byte of a versioned transaction
pub const VERSION_PREFIX_MASK: u8 = 0x80;

/// Where the signature slots and the message live inside a transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignatureLayout {
    pub signature_count: usize,
    pub signatures_start: usize,
    pub message_start: usize,
}

impl SignatureLayout {
    /// Compute the layout from the leading framing bytes
    pub fn parse(tx: &[u8]) -> Result<Self, EncodingError> {
        let first = *tx
            .first()
            .ok_or_else(|| EncodingError::MalformedTransaction("empty buffer".to_string()))?;

        let (signature_count, signatures_start) = if first & VERSION_PREFIX_MASK != 0 {
            let count = *tx.get(1).ok_or_else(|| {
                EncodingError::MalformedTransaction("missing signature count".to_string())
            })?;
            (count as usize, 2)
        } else {
            (first as usize, 1)
        };

        if signature_count == 0 {
            return Err(EncodingError::MalformedTransaction(
                "transaction declares no signature slots".to_string(),
            ));
        }

        let message_start = signatures_start + signature_count * SIGNATURE_LENGTH;
        if tx.len() < message_start {
            return Err(EncodingError::MalformedTransaction(format!(
                "buffer is {} bytes, message starts at {}",
                tx.len(),
                message_start
            )));
        }

        Ok(Self {
            signature_count,
            signatures_start,
            message_start,
        })
    }
}

/// Sign the message region of `tx` in place and write the first slot
pub fn sign_in_place(tx: &mut [u8], signer: &Keypair) -> Result<[u8; 64], EncodingError> {
    let layout = SignatureLayout::parse(tx)?;
    if layout.signature_count > 1 {
        // Only the fee payer slot is filled; other signers must co-sign elsewhere
        warn!(
            signature_count = layout.signature_count,
            "Opaque transaction declares multiple signers, filling slot 0 only"
        );
    }

    let signature = signer.sign(&tx[layout.message_start..]);
    let slot = layout.signatures_start..layout.signatures_start + SIGNATURE_LENGTH;
    tx[slot].copy_from_slice(&signature);
    Ok(signature)
}

/// Sign raw transaction bytes returned by the aggregator
pub fn sign_versioned(
    mut tx: Vec<u8>,
    signer: &Keypair,
) -> Result<SignedTransaction, TransactionBuilderError> {
    let signature = sign_in_place(&mut tx, signer)?;
    Ok(SignedTransaction::new(tx, signature))
}

/// Decode a base64 transaction and sign it
pub fn sign_versioned_base64(
    encoded: &str,
    signer: &Keypair,
) -> Result<SignedTransaction, TransactionBuilderError> {
    let tx = STANDARD
        .decode(encoded.trim())
        .map_err(|e| CodecError::InvalidBase64(e.to_string()))?;
    sign_versioned(tx, signer)
}
