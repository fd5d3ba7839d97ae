//! Swap aggregator access
//!
//! Quotes and swap transactions come from a Jupiter-style aggregator. The
//! quote is an opaque JSON value forwarded verbatim to swap-build; the
//! returned transaction is handed unsigned to the versioned signer.

use async_trait::async_trait;
use nonempty::{nonempty, NonEmpty};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::rpc_manager::rpc_config::{validate_endpoints, ConfigError};
use crate::wallet::Address;

pub mod jupiter;
pub mod swap_errors;

pub use jupiter::JupiterClient;
pub use swap_errors::SwapError;

/// Wrapped SOL mint, the base asset of every swap
pub const SOL_MINT: &str = "So11111111111111111111111111111111111111112";

/// A JSON value produced by an external party and passed through untouched
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExternalOpaque(Value);

impl ExternalOpaque {
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    pub fn into_inner(self) -> Value {
        self.0
    }

    /// Quoted output amount, accepting both string and numeric encodings
    pub fn out_amount(&self) -> Option<u64> {
        match self.get("outAmount")? {
            Value::String(s) => s.parse().ok(),
            Value::Number(n) => n.as_u64(),
            _ => None,
        }
    }
}

/// Priority fee passed to swap-build as `prioritizationFeeLamports`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "RawPriorityFee", into = "RawPriorityFee")]
pub enum PriorityFee {
    #[default]
    Auto,
    Lamports(u64),
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum RawPriorityFee {
    Lamports(u64),
    Text(String),
}

impl TryFrom<RawPriorityFee> for PriorityFee {
    type Error = String;

    fn try_from(raw: RawPriorityFee) -> Result<Self, Self::Error> {
        match raw {
            RawPriorityFee::Lamports(lamports) => Ok(PriorityFee::Lamports(lamports)),
            RawPriorityFee::Text(text) if text.eq_ignore_ascii_case("auto") => Ok(PriorityFee::Auto),
            RawPriorityFee::Text(text) => Err(format!(
                "priority fee must be \"auto\" or lamports, got {:?}",
                text
            )),
        }
    }
}

impl From<PriorityFee> for RawPriorityFee {
    fn from(fee: PriorityFee) -> Self {
        match fee {
            PriorityFee::Auto => RawPriorityFee::Text("auto".to_string()),
            PriorityFee::Lamports(lamports) => RawPriorityFee::Lamports(lamports),
        }
    }
}

/// Parameters of a single quote request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuoteRequest {
    pub input_mint: Address,
    pub output_mint: Address,
    /// Input amount in the input asset's smallest unit
    pub amount: u64,
    pub slippage_bps: u16,
}

/// Aggregator client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwapClientConfig {
    /// Ordered list of aggregator base URLs
    #[serde(default = "default_endpoints")]
    pub endpoints: NonEmpty<String>,

    /// Sent as `x-api-key` when present
    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_endpoints() -> NonEmpty<String> {
    nonempty![
        "https://lite-api.jup.ag/swap/v1".to_string(),
        "https://api.jup.ag/swap/v1".to_string()
    ]
}

fn default_timeout_ms() -> u64 {
    15_000
}

impl Default for SwapClientConfig {
    fn default() -> Self {
        Self {
            endpoints: default_endpoints(),
            api_key: None,
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl SwapClientConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_endpoints("swap", &self.endpoints)?;
        if self.timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "swap timeout must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Quote + swap-build, the two aggregator calls the engine needs
#[async_trait]
pub trait SwapAggregator: Send + Sync {
    async fn quote(&self, request: &QuoteRequest) -> Result<ExternalOpaque, SwapError>;

    /// Unsigned transaction bytes for `signer` executing `quote`
    async fn build_swap_transaction(
        &self,
        quote: &ExternalOpaque,
        signer: &Address,
        priority_fee: PriorityFee,
    ) -> Result<Vec<u8>, SwapError>;
}
