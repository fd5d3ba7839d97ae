use thiserror::Error;
use tokio_retry::strategy::{jitter, ExponentialBackoff};

use crate::fallback::{redact_endpoint, EndpointFailure};

/// RPC client error types
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RpcManagerError {
    /// Transport-level errors (network, connection)
    #[error("Transport error: {message} (endpoint: {endpoint})")]
    Transport { endpoint: String, message: String },

    /// Timeout errors
    #[error("Timeout after {timeout_ms}ms (endpoint: {endpoint})")]
    Timeout { endpoint: String, timeout_ms: u64 },

    /// Non-2xx HTTP status
    #[error("HTTP status {status} (endpoint: {endpoint})")]
    HttpStatus { endpoint: String, status: u16 },

    /// Body was not a JSON-RPC envelope or lacked the expected fields
    #[error("Invalid response: {message} (endpoint: {endpoint})")]
    InvalidResponse { endpoint: String, message: String },

    /// The provider answered with a JSON-RPC error object
    #[error("RPC response error: {message} (endpoint: {endpoint}, code: {code:?})")]
    RpcResponse {
        endpoint: String,
        message: String,
        code: Option<i64>,
    },

    /// Every configured endpoint failed; carries the last observed error
    #[error("All {attempted} RPC endpoints failed; last error: {last_error}")]
    AllEndpointsFailed {
        attempted: usize,
        last_error: Box<RpcManagerError>,
    },

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl RpcManagerError {
    pub(crate) fn transport(endpoint: &str, err: &reqwest::Error, timeout_ms: u64) -> Self {
        let endpoint = redact_endpoint(endpoint);
        if err.is_timeout() {
            RpcManagerError::Timeout {
                endpoint,
                timeout_ms,
            }
        } else {
            RpcManagerError::Transport {
                endpoint,
                // reqwest includes the full URL (and any api key) in its message
                message: err.without_url_message(),
            }
        }
    }

    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        match self {
            RpcManagerError::Transport { .. } => true,
            RpcManagerError::Timeout { .. } => true,
            RpcManagerError::HttpStatus { status, .. } => *status == 429 || *status >= 500,
            RpcManagerError::InvalidResponse { .. } => false,
            RpcManagerError::RpcResponse { .. } => false,
            RpcManagerError::AllEndpointsFailed { last_error, .. } => last_error.is_retryable(),
            RpcManagerError::Configuration(_) => false,
        }
    }

    /// Get the endpoint associated with this error, if any
    pub fn endpoint(&self) -> Option<&str> {
        match self {
            RpcManagerError::Transport { endpoint, .. } => Some(endpoint),
            RpcManagerError::Timeout { endpoint, .. } => Some(endpoint),
            RpcManagerError::HttpStatus { endpoint, .. } => Some(endpoint),
            RpcManagerError::InvalidResponse { endpoint, .. } => Some(endpoint),
            RpcManagerError::RpcResponse { endpoint, .. } => Some(endpoint),
            _ => None,
        }
    }
}

impl EndpointFailure for RpcManagerError {
    fn should_advance(&self) -> bool {
        matches!(
            self,
            RpcManagerError::Transport { .. }
                | RpcManagerError::Timeout { .. }
                | RpcManagerError::HttpStatus { .. }
                | RpcManagerError::InvalidResponse { .. }
        )
    }

    fn exhausted(attempted: usize, last: Self) -> Self {
        RpcManagerError::AllEndpointsFailed {
            attempted,
            last_error: Box::new(last),
        }
    }
}

trait WithoutUrl {
    fn without_url_message(&self) -> String;
}

impl WithoutUrl for reqwest::Error {
    fn without_url_message(&self) -> String {
        let mut err = self.to_string();
        if let Some(url) = self.url() {
            err = err.replace(url.as_str(), &redact_endpoint(url.as_str()));
        }
        err
    }
}

/// Retry policy for idempotent RPC reads
///
/// Applied on top of endpoint fallback: one attempt walks the whole
/// endpoint list, a retry walks it again after a jittered backoff.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,

    /// Base delay in milliseconds
    pub base_delay_ms: u64,

    /// Maximum delay in milliseconds
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay_ms: 200,
            max_delay_ms: 2_000,
        }
    }
}

impl RetryPolicy {
    pub fn with_max_retries(max_retries: u32) -> Self {
        Self {
            max_retries,
            ..Self::default()
        }
    }

    /// Jittered exponential delays fed to `tokio_retry`
    pub fn delays(&self) -> impl Iterator<Item = std::time::Duration> {
        // ExponentialBackoff yields base^n, so scale a base of 2 by factor
        ExponentialBackoff::from_millis(2)
            .factor(self.base_delay_ms / 2)
            .max_delay(std::time::Duration::from_millis(self.max_delay_ms))
            .map(jitter)
            .take(self.max_retries as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_is_retryable() {
        assert!(RpcManagerError::Transport {
            endpoint: "test".to_string(),
            message: "connection failed".to_string(),
        }
        .is_retryable());

        assert!(RpcManagerError::Timeout {
            endpoint: "test".to_string(),
            timeout_ms: 15_000,
        }
        .is_retryable());

        assert!(RpcManagerError::HttpStatus {
            endpoint: "test".to_string(),
            status: 503,
        }
        .is_retryable());

        assert!(!RpcManagerError::HttpStatus {
            endpoint: "test".to_string(),
            status: 400,
        }
        .is_retryable());

        assert!(!RpcManagerError::RpcResponse {
            endpoint: "test".to_string(),
            message: "Blockhash not found".to_string(),
            code: Some(-32002),
        }
        .is_retryable());
    }

    #[test]
    fn test_rpc_error_object_does_not_advance() {
        let err = RpcManagerError::RpcResponse {
            endpoint: "a".to_string(),
            message: "invalid".to_string(),
            code: Some(-32602),
        };
        assert!(!err.should_advance());
        assert!(RpcManagerError::HttpStatus {
            endpoint: "a".to_string(),
            status: 500
        }
        .should_advance());
    }

    #[test]
    fn test_exhausted_wraps_last_error() {
        let last = RpcManagerError::Timeout {
            endpoint: "https://b".to_string(),
            timeout_ms: 15_000,
        };
        let err = RpcManagerError::exhausted(2, last.clone());
        assert_eq!(
            err,
            RpcManagerError::AllEndpointsFailed {
                attempted: 2,
                last_error: Box::new(last)
            }
        );
        assert!(err.is_retryable());
        assert!(err.to_string().contains("All 2 RPC endpoints failed"));
    }

    #[test]
    fn test_error_endpoint() {
        let err = RpcManagerError::Timeout {
            endpoint: "https://test.com".to_string(),
            timeout_ms: 5000,
        };
        assert_eq!(err.endpoint(), Some("https://test.com"));
        assert_eq!(RpcManagerError::Configuration("x".to_string()).endpoint(), None);
    }

    #[test]
    fn test_retry_policy_delays() {
        let policy = RetryPolicy::with_max_retries(3);
        let delays: Vec<_> = policy.delays().collect();
        assert_eq!(delays.len(), 3);
        assert!(delays
            .iter()
            .all(|d| *d <= std::time::Duration::from_millis(policy.max_delay_ms)));

        assert_eq!(RetryPolicy::with_max_retries(0).delays().count(), 0);
    }
}
