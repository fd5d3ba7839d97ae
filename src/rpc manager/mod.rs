//! RPC Manager Module
//!
//! Thin JSON-RPC access to the chain: blockhash, balances, token balances
//! and transaction submission, each with ordered endpoint fallback.

use async_trait::async_trait;

use crate::tx_builder::SignedTransaction;
use crate::wallet::Address;

// Submodules
pub mod rpc_client;
pub mod rpc_config;
pub mod rpc_errors;

// Re-exports for convenience
pub use rpc_client::JsonRpcClient;
pub use rpc_config::{ConfigError, RpcClientConfig};
pub use rpc_errors::{RetryPolicy, RpcManagerError};

/// Chain access used by the bundle engine
///
/// Implemented by [`JsonRpcClient`]; tests substitute in-process mocks.
#[async_trait]
pub trait ChainRpc: Send + Sync {
    /// Recent blockhash as raw bytes
    async fn get_latest_blockhash(&self) -> Result<[u8; 32], RpcManagerError>;

    /// Native balance in lamports
    async fn get_balance(&self, address: &Address) -> Result<u64, RpcManagerError>;

    /// Raw token amount of `mint` held by `owner` (zero if no account)
    async fn get_token_balance(&self, owner: &Address, mint: &Address) -> Result<u64, RpcManagerError>;

    /// Submit a signed transaction, returning its signature
    async fn send_transaction(&self, tx: &SignedTransaction) -> Result<String, RpcManagerError>;
}
