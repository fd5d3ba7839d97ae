//! Configuration module for the bundler
//!
//! This module handles configuration loading from TOML files and
//! environment variables, and converts the file sections into the
//! per-component configuration types.

use nonempty::{nonempty, NonEmpty};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::bundle_engine::EngineConfig;
use crate::rpc_manager::rpc_config::{validate_endpoints, ConfigError, RpcClientConfig};
use crate::swap::{PriorityFee, SwapClientConfig};
use crate::volume::VolumeConfig;

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// JSON-RPC providers
    #[serde(default)]
    pub rpc: RpcConfig,

    /// Swap aggregator
    #[serde(default)]
    pub swap: SwapConfig,

    /// Batch engine
    #[serde(default)]
    pub engine: EngineConfig,

    /// Automated volume sessions
    #[serde(default)]
    pub volume: VolumeConfig,

    #[serde(default)]
    pub notifications: NotificationConfig,

    /// Monitoring and metrics
    #[serde(default)]
    pub monitoring: MonitoringConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcConfig {
    /// Ordered list of RPC endpoints, first is preferred
    #[serde(default = "default_rpc_endpoints")]
    pub endpoints: NonEmpty<String>,

    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Retries of idempotent reads after the whole list has failed
    #[serde(default = "default_read_retries")]
    pub read_retries: u32,

    /// Provider-side retries requested on `sendTransaction`
    #[serde(default = "default_send_max_retries")]
    pub send_max_retries: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwapConfig {
    /// Ordered list of aggregator base URLs
    #[serde(default = "default_swap_endpoints")]
    pub endpoints: NonEmpty<String>,

    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// `"auto"` or a fixed number of lamports
    #[serde(default)]
    pub priority_fee: PriorityFee,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotificationConfig {
    /// Discord-compatible webhook
    #[serde(default)]
    pub webhook_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringConfig {
    /// Enable Prometheus metrics
    #[serde(default = "default_true")]
    pub enable_metrics: bool,

    /// Metrics port
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,
}

// Default value functions
fn default_rpc_endpoints() -> NonEmpty<String> { nonempty!["https://api.mainnet-beta.solana.com".to_string()] }
fn default_swap_endpoints() -> NonEmpty<String> { SwapClientConfig::default().endpoints }
fn default_timeout_secs() -> u64 { 15 }
fn default_read_retries() -> u32 { 2 }
fn default_send_max_retries() -> u32 { 3 }
fn default_metrics_port() -> u16 { 9090 }
fn default_true() -> bool { true }

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            endpoints: default_rpc_endpoints(),
            timeout_secs: default_timeout_secs(),
            read_retries: default_read_retries(),
            send_max_retries: default_send_max_retries(),
        }
    }
}

impl Default for SwapConfig {
    fn default() -> Self {
        Self {
            endpoints: default_swap_endpoints(),
            api_key: None,
            timeout_secs: default_timeout_secs(),
            priority_fee: PriorityFee::default(),
        }
    }
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            enable_metrics: default_true(),
            metrics_port: default_metrics_port(),
        }
    }
}

impl Config {
    /// Load configuration from TOML file
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load `.env`, the TOML file and environment variable overrides
    pub fn from_file_with_env(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        let mut config = Self::from_file(path)?;
        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Apply `RPC_ENDPOINTS`, `SWAP_ENDPOINTS`, `SWAP_API_KEY` and
    /// `ADMIN_WEBHOOK_URL` from `lookup`
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup("RPC_ENDPOINTS") {
            self.rpc.endpoints = RpcClientConfig::parse_endpoint_list(&value)?;
        }
        if let Some(value) = lookup("SWAP_ENDPOINTS") {
            self.swap.endpoints = RpcClientConfig::parse_endpoint_list(&value)?;
        }
        if let Some(key) = lookup("SWAP_API_KEY").filter(|k| !k.trim().is_empty()) {
            self.swap.api_key = Some(key.trim().to_string());
        }
        if let Some(url) = lookup("ADMIN_WEBHOOK_URL").filter(|u| !u.trim().is_empty()) {
            self.notifications.webhook_url = Some(url.trim().to_string());
        }
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_endpoints("rpc", &self.rpc.endpoints)?;
        validate_endpoints("swap", &self.swap.endpoints)?;

        if self.rpc.timeout_secs == 0 || self.swap.timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "timeout_secs must be > 0".to_string(),
            ));
        }

        self.engine
            .validate()
            .map_err(|e| ConfigError::ValidationError(e.to_string()))?;
        self.volume
            .validate()
            .map_err(|e| ConfigError::ValidationError(e.to_string()))?;

        if let Some(url) = &self.notifications.webhook_url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(ConfigError::ValidationError(
                    "webhook_url must be an http(s) URL".to_string(),
                ));
            }
        }

        Ok(())
    }

    pub fn rpc_client_config(&self) -> RpcClientConfig {
        let mut config = RpcClientConfig::from_endpoints(self.rpc.endpoints.clone());
        config.timeout_ms = self.rpc.timeout_secs.saturating_mul(1_000);
        config.read_retries = self.rpc.read_retries;
        config.send_max_retries = self.rpc.send_max_retries;
        config
    }

    pub fn swap_client_config(&self) -> SwapClientConfig {
        SwapClientConfig {
            endpoints: self.swap.endpoints.clone(),
            api_key: self.swap.api_key.clone(),
            timeout_ms: self.swap.timeout_secs.saturating_mul(1_000),
        }
    }

    /// Engine section with the swap priority fee applied
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            priority_fee: self.swap.priority_fee,
            ..self.engine.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.rpc.timeout_secs, 15);
        assert_eq!(config.swap.endpoints.len(), 2);
        assert_eq!(config.engine.batch_size, 5);
        assert_eq!(config.engine.wallets_per_session, 25);
        assert_eq!(config.engine.fee_reserve_lamports, 5_000_000);
        assert_eq!(config.volume.max_cycles, 100);
        assert_eq!(config.monitoring.metrics_port, 9090);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[rpc]
endpoints = ["https://rpc-a.example", "https://rpc-b.example"]
timeout_secs = 5

[swap]
priority_fee = 250000

[engine]
batch_size = 3
sell_slippage_bps = 3000

[volume]
max_cycles = 10
"#
        )
        .unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.rpc.endpoints.len(), 2);
        assert_eq!(config.rpc.read_retries, 2);
        assert_eq!(config.swap.priority_fee, PriorityFee::Lamports(250_000));
        assert_eq!(config.engine.batch_size, 3);
        assert_eq!(config.engine.buy_slippage_bps, 500);
        assert_eq!(config.volume.max_cycles, 10);
        assert!(config.validate().is_ok());

        let rpc = config.rpc_client_config();
        assert_eq!(rpc.timeout_ms, 5_000);
        assert_eq!(rpc.endpoints.first(), "https://rpc-a.example");
        assert_eq!(
            config.engine_config().priority_fee,
            PriorityFee::Lamports(250_000)
        );
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("RPC_ENDPOINTS", "https://x.example, https://y.example"),
            ("SWAP_API_KEY", " key "),
            ("ADMIN_WEBHOOK_URL", "https://hooks.example/abc"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config
            .apply_overrides(|key| env.get(key).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.rpc.endpoints.len(), 2);
        assert_eq!(config.rpc.endpoints.last(), "https://y.example");
        assert_eq!(config.swap.api_key.as_deref(), Some("key"));
        assert_eq!(
            config.notifications.webhook_url.as_deref(),
            Some("https://hooks.example/abc")
        );

        let mut config = Config::default();
        assert!(config
            .apply_overrides(|key| (key == "SWAP_ENDPOINTS").then(|| " , ".to_string()))
            .is_err());
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = Config::default();
        config.engine.batch_size = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.volume.settle_delay_min_ms = 9_000;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.swap.endpoints = nonempty!["ftp://bad.example".to_string()];
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.notifications.webhook_url = Some("hooks.example".to_string());
        assert!(config.validate().is_err());
    }
}
