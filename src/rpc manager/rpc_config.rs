use nonempty::NonEmpty;
use serde::{Deserialize, Serialize};

use super::rpc_errors::RetryPolicy;

/// JSON-RPC client configuration
///
/// `endpoints` is an ordered priority list: index 0 is always tried first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcClientConfig {
    /// Ordered list of RPC endpoints
    pub endpoints: NonEmpty<String>,

    /// Request timeout in milliseconds, applied per endpoint attempt
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Extra passes over the endpoint list for idempotent reads
    #[serde(default = "default_read_retries")]
    pub read_retries: u32,

    /// `maxRetries` passed to the provider on `sendTransaction`
    #[serde(default = "default_send_max_retries")]
    pub send_max_retries: u32,

    /// Commitment level for reads
    #[serde(default = "default_commitment")]
    pub commitment: String,
}

fn default_timeout_ms() -> u64 {
    15_000
}

fn default_read_retries() -> u32 {
    2
}

fn default_send_max_retries() -> u32 {
    3
}

fn default_commitment() -> String {
    "confirmed".to_string()
}

impl Default for RpcClientConfig {
    fn default() -> Self {
        Self::from_endpoints(NonEmpty::new(
            "https://api.mainnet-beta.solana.com".to_string(),
        ))
    }
}

impl RpcClientConfig {
    /// Create a default configuration from a list of URLs
    pub fn from_endpoints(endpoints: NonEmpty<String>) -> Self {
        Self {
            endpoints,
            timeout_ms: default_timeout_ms(),
            read_retries: default_read_retries(),
            send_max_retries: default_send_max_retries(),
            commitment: default_commitment(),
        }
    }

    /// Parse a comma-separated endpoint list (e.g. the `RPC_ENDPOINTS` variable)
    pub fn parse_endpoint_list(value: &str) -> Result<NonEmpty<String>, ConfigError> {
        let urls: Vec<String> = value
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        NonEmpty::from_vec(urls)
            .ok_or_else(|| ConfigError::ValidationError("No endpoints provided".to_string()))
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::with_max_retries(self.read_retries)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_endpoints("rpc", &self.endpoints)?;

        if self.timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "rpc timeout must be > 0".to_string(),
            ));
        }

        Ok(())
    }
}

/// Reject duplicate or non-http(s) URLs in an ordered endpoint list
pub fn validate_endpoints(section: &str, endpoints: &NonEmpty<String>) -> Result<(), ConfigError> {
    let mut seen_urls = std::collections::HashSet::new();
    for url in endpoints.iter() {
        if !seen_urls.insert(url) {
            return Err(ConfigError::ValidationError(format!(
                "Duplicate {} URL: {}",
                section,
                crate::fallback::redact_endpoint(url)
            )));
        }

        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(ConfigError::ValidationError(format!(
                "Invalid {} URL format: {}",
                section,
                crate::fallback::redact_endpoint(url)
            )));
        }
    }
    Ok(())
}

/// Configuration-related errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    IoError(String),
    ParseError(String),
    ValidationError(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::IoError(msg) => write!(f, "IO error: {}", msg),
            ConfigError::ParseError(msg) => write!(f, "Parse error: {}", msg),
            ConfigError::ValidationError(msg) => write!(f, "Validation error: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}
