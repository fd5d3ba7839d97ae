//! Transaction construction and signing without a chain SDK
//!
//! ## Architecture
//!
//! - **compact**: compact-u16 length prefixes used throughout the wire format
//! - **transfer**: hand-built legacy message for a native lamport transfer
//! - **versioned**: in-place signing of aggregator-built transactions
//! - **output**: the signed, broadcast-ready transaction
//! - **errors**: `EncodingError` / `CryptoError` taxonomy
//!
//! Everything here is synchronous and CPU-bound; network access lives in
//! the RPC manager and swap client.

pub mod compact;
pub mod errors;
pub mod output;
pub mod transfer;
pub mod versioned;

pub use errors::{CryptoError, EncodingError, TransactionBuilderError};
pub use output::SignedTransaction;
pub use transfer::{
    build_transfer, encode_transfer_message, lamports_from_sol,
    TransferInstruction, LAMPORTS_PER_SOL,
};
pub use versioned::{sign_versioned, sign_versioned_base64, SignatureLayout};
