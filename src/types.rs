//! Common types used throughout the application

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::wallet::Address;

/// Structured reason attached to a failed wallet operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Balance at or below the fee reserve
    InsufficientBalance,
    /// Aggregator found no route
    NoRouteAvailable,
    /// Nothing to sell
    NoTokensToSell,
    /// Every fallback endpoint failed
    AllEndpointsFailed,
    /// The RPC provider returned a JSON-RPC error object
    RpcError,
    /// Single endpoint or transport failure that was not retried further
    Network,
    /// Transaction layout failure
    Encoding,
    /// Key or signing failure
    Crypto,
    /// The wallet's task panicked or was aborted
    TaskFailed,
}

impl FailureKind {
    /// Low-balance and no-route conditions are normal outcomes
    pub fn is_expected(self) -> bool {
        matches!(
            self,
            FailureKind::InsufficientBalance
                | FailureKind::NoRouteAvailable
                | FailureKind::NoTokensToSell
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FailureKind::InsufficientBalance => "insufficient_balance",
            FailureKind::NoRouteAvailable => "no_route_available",
            FailureKind::NoTokensToSell => "no_tokens_to_sell",
            FailureKind::AllEndpointsFailed => "all_endpoints_failed",
            FailureKind::RpcError => "rpc_error",
            FailureKind::Network => "network",
            FailureKind::Encoding => "encoding",
            FailureKind::Crypto => "crypto",
            FailureKind::TaskFailed => "task_failed",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one wallet's operation within a batch call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchResult {
    pub wallet_index: usize,
    pub public_key: Address,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tx_signature: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureKind>,
}

impl BatchResult {
    pub fn succeeded(wallet_index: usize, public_key: Address, tx_signature: String) -> Self {
        Self {
            wallet_index,
            public_key,
            success: true,
            tx_signature: Some(tx_signature),
            error: None,
            failure: None,
        }
    }

    pub fn failed(
        wallet_index: usize,
        public_key: Address,
        error: impl Into<String>,
        kind: FailureKind,
    ) -> Self {
        Self {
            wallet_index,
            public_key,
            success: false,
            tx_signature: None,
            error: Some(error.into()),
            failure: Some(kind),
        }
    }
}

/// Count successful entries in a batch result list
pub fn success_count(results: &[BatchResult]) -> usize {
    results.iter().filter(|r| r.success).count()
}

/// Result of one automated buy-then-sell cycle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CycleOutcome {
    /// Buy and sell both landed
    Complete {
        buy_signature: String,
        sell_signature: String,
    },
    /// Buy landed, sell failed; buy-side volume still counts
    BuyOnly {
        buy_signature: String,
        sell_error: String,
    },
    /// Nothing was traded
    Failed { error: String, kind: FailureKind },
}

impl CycleOutcome {
    /// Buy leg landed
    pub fn is_counted(&self) -> bool {
        !matches!(self, CycleOutcome::Failed { .. })
    }

    /// Number of legs that generated volume
    pub fn legs(&self) -> u64 {
        match self {
            CycleOutcome::Complete { .. } => 2,
            CycleOutcome::BuyOnly { .. } => 1,
            CycleOutcome::Failed { .. } => 0,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            CycleOutcome::Complete { .. } => "complete",
            CycleOutcome::BuyOnly { .. } => "buy_only",
            CycleOutcome::Failed { .. } => "failed",
        }
    }
}

/// A freshly generated wallet, the only place its private key is returned
#[derive(Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletExport {
    pub index: usize,
    pub public_key: Address,
    pub private_key: String,
}

impl fmt::Debug for WalletExport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WalletExport")
            .field("index", &self.index)
            .field("public_key", &self.public_key)
            .field("private_key", &"<redacted>")
            .finish()
    }
}

/// Result of `generate_wallets`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedSession {
    pub session_id: Uuid,
    pub wallets: Vec<WalletExport>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_result_serialization() {
        let ok = BatchResult::succeeded(0, Address::new([1u8; 32]), "sig".to_string());
        let json = serde_json::to_value(&ok).unwrap();
        assert_eq!(json["walletIndex"], 0);
        assert_eq!(json["success"], true);
        assert_eq!(json["txSignature"], "sig");
        assert!(json.get("error").is_none());

        let failed = BatchResult::failed(
            3,
            Address::new([2u8; 32]),
            "InsufficientBalance",
            FailureKind::InsufficientBalance,
        );
        let json = serde_json::to_value(&failed).unwrap();
        assert_eq!(json["error"], "InsufficientBalance");
        assert_eq!(json["failure"], "insufficient_balance");
        assert_eq!(success_count(&[ok, failed]), 1);
    }

    #[test]
    fn test_cycle_outcome_legs() {
        let complete = CycleOutcome::Complete {
            buy_signature: "a".into(),
            sell_signature: "b".into(),
        };
        let partial = CycleOutcome::BuyOnly {
            buy_signature: "a".into(),
            sell_error: "timeout".into(),
        };
        let failed = CycleOutcome::Failed {
            error: "No tokens to sell".into(),
            kind: FailureKind::NoTokensToSell,
        };
        assert_eq!((complete.legs(), partial.legs(), failed.legs()), (2, 1, 0));
        assert!(partial.is_counted());
        assert!(!failed.is_counted());
    }

    #[test]
    fn test_wallet_export_debug_redacts_key() {
        let export = WalletExport {
            index: 0,
            public_key: Address::new([5u8; 32]),
            private_key: "5KQwr...secret".to_string(),
        };
        let debug = format!("{:?}", export);
        assert!(!debug.contains("secret"));
        assert!(debug.contains("<redacted>"));
    }

    #[test]
    fn test_expected_failures() {
        assert!(FailureKind::NoTokensToSell.is_expected());
        assert!(!FailureKind::AllEndpointsFailed.is_expected());
    }
}
