//! Observability module for correlation and tracing

use serde::{Deserialize, Serialize};
use tracing::Span;
use uuid::Uuid;

/// Correlation ID for tracking one caller request across batches
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct CorrelationId(String);

impl CorrelationId {
    /// Create a new correlation ID
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Get the inner string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for CorrelationId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for CorrelationId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Context attached to every batch operation
///
/// The span carries `operation`, `session_id` and `correlation_id`, so
/// every per-wallet log line emitted inside it can be tied back to the call.
#[derive(Debug, Clone)]
pub struct OperationContext {
    pub operation: &'static str,
    pub session_id: Uuid,
    pub correlation_id: CorrelationId,
}

impl OperationContext {
    pub fn new(operation: &'static str, session_id: Uuid) -> Self {
        Self {
            operation,
            session_id,
            correlation_id: CorrelationId::new(),
        }
    }

    pub fn span(&self) -> Span {
        tracing::info_span!(
            "batch",
            operation = self.operation,
            session_id = %self.session_id,
            correlation_id = %self.correlation_id,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_correlation_ids_are_unique() {
        let a = CorrelationId::new();
        let b = CorrelationId::new();
        assert_ne!(a, b);
        assert_eq!(a.as_str().len(), 36);
        assert_eq!(CorrelationId::from("abc").to_string(), "abc");
    }

    #[test]
    fn test_operation_context() {
        let session_id = Uuid::new_v4();
        let ctx = OperationContext::new("fund", session_id);
        assert_eq!(ctx.operation, "fund");
        assert_eq!(ctx.session_id, session_id);
        let _entered = ctx.span().entered();
    }
}
