//! Bundler - multi-wallet Solana bundler and volume engine
//!
//! Transactions are encoded and signed by hand (no chain SDK): native
//! transfers are laid out byte by byte, aggregator swaps are signed in
//! place. Wallet operations run in fixed-size concurrent batches with
//! per-wallet failure isolation.

pub mod base58;
pub mod bundle_engine;
pub mod config;
pub mod endpoints;
pub mod fallback;
pub mod metrics;
pub mod notify;
pub mod observability;
pub mod session;
pub mod swap;
pub mod tx_builder;
pub mod types;
pub mod volume;
pub mod wallet;

// Component modules with non-standard paths (directories with spaces)
#[path = "rpc manager/mod.rs"]
pub mod rpc_manager;

#[cfg(any(test, feature = "test_utils"))]
pub mod test_utils;

// Re-export commonly used types
pub use bundle_engine::{BundleEngine, CycleParams, EngineConfig, EngineError, WalletExecutor};
pub use config::Config;
pub use rpc_manager::{ChainRpc, JsonRpcClient, RpcManagerError};
pub use swap::{JupiterClient, SwapAggregator, SwapError};
pub use types::{BatchResult, CycleOutcome, FailureKind, GeneratedSession};
pub use wallet::{Address, Keypair};
