use thiserror::Error;

use crate::fallback::{redact_endpoint, EndpointFailure};

/// Swap aggregator error types
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SwapError {
    #[error("Transport error: {message} (endpoint: {endpoint})")]
    Transport { endpoint: String, message: String },

    #[error("Timeout after {timeout_ms}ms (endpoint: {endpoint})")]
    Timeout { endpoint: String, timeout_ms: u64 },

    #[error("HTTP status {status} (endpoint: {endpoint})")]
    HttpStatus { endpoint: String, status: u16 },

    #[error("Invalid response: {message} (endpoint: {endpoint})")]
    InvalidResponse { endpoint: String, message: String },

    /// The aggregator answered but found no usable route
    #[error("No route available: {reason}")]
    NoRouteAvailable { reason: String },

    /// Swap-build answered without a `swapTransaction` field
    #[error("No swap transaction returned (endpoint: {endpoint})")]
    MissingSwapTransaction { endpoint: String },

    #[error("All {attempted} swap endpoints failed; last error: {last_error}")]
    AllEndpointsFailed {
        attempted: usize,
        last_error: Box<SwapError>,
    },

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl SwapError {
    pub(crate) fn transport(endpoint: &str, err: &reqwest::Error, timeout_ms: u64) -> Self {
        let endpoint = redact_endpoint(endpoint);
        if err.is_timeout() {
            SwapError::Timeout {
                endpoint,
                timeout_ms,
            }
        } else {
            let mut message = err.to_string();
            if let Some(url) = err.url() {
                message = message.replace(url.as_str(), &redact_endpoint(url.as_str()));
            }
            SwapError::Transport { endpoint, message }
        }
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            SwapError::Transport { .. } | SwapError::Timeout { .. } => true,
            SwapError::HttpStatus { status, .. } => *status == 429 || *status >= 500,
            SwapError::AllEndpointsFailed { last_error, .. } => last_error.is_retryable(),
            _ => false,
        }
    }

    /// Expected outcome rather than a fault
    pub fn is_no_route(&self) -> bool {
        matches!(self, SwapError::NoRouteAvailable { .. })
    }
}

impl EndpointFailure for SwapError {
    fn should_advance(&self) -> bool {
        matches!(
            self,
            SwapError::Transport { .. }
                | SwapError::Timeout { .. }
                | SwapError::HttpStatus { .. }
                | SwapError::InvalidResponse { .. }
        )
    }

    fn exhausted(attempted: usize, last: Self) -> Self {
        SwapError::AllEndpointsFailed {
            attempted,
            last_error: Box::new(last),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_route_is_final() {
        let err = SwapError::NoRouteAvailable {
            reason: "Could not find any route".to_string(),
        };
        assert!(!err.should_advance());
        assert!(!err.is_retryable());
        assert!(err.is_no_route());
    }

    #[test]
    fn test_http_status_advances() {
        let err = SwapError::HttpStatus {
            endpoint: "https://lite-api.jup.ag/swap/v1".to_string(),
            status: 500,
        };
        assert!(err.should_advance());
        assert!(err.is_retryable());

        let exhausted = SwapError::exhausted(2, err);
        assert!(exhausted.to_string().starts_with("All 2 swap endpoints failed"));
    }

    #[test]
    fn test_missing_transaction_does_not_advance() {
        let err = SwapError::MissingSwapTransaction {
            endpoint: "https://api.jup.ag/swap/v1".to_string(),
        };
        assert!(!err.should_advance());
    }
}
