//! Error types for crossmem

use thiserror::Error;

/// Main error type for crossmem operations
#[derive(Error, Debug)]
pub enum CrossmemError {
    /// A single referenced entity (memory id, session) does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// The configured token budget cannot hold even a minimal transfer
    #[error("Token budget exceeded: {required} tokens required, {available} available")]
    BudgetExceeded { required: usize, available: usize },

    /// Observed state contradicts a data invariant (internal bug)
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    /// A partition changed underneath a multi-phase operation; retry with a fresh read
    #[error("Concurrent modification: {0}")]
    ConcurrentModification(String),

    /// Operation was cancelled by the caller before completion
    #[error("Cancelled: {0}")]
    Cancelled(String),

    /// Malformed caller input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Snapshot persistence errors
    #[error("Storage error: {0}")]
    Storage(String),

    /// HTTP API errors
    #[error("API error: {0}")]
    Api(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl CrossmemError {
    /// Short machine-readable name, used in API error bodies
    pub fn kind(&self) -> &'static str {
        match self {
            CrossmemError::NotFound(_) => "not_found",
            CrossmemError::BudgetExceeded { .. } => "budget_exceeded",
            CrossmemError::InvariantViolation(_) => "invariant_violation",
            CrossmemError::ConcurrentModification(_) => "concurrent_modification",
            CrossmemError::Cancelled(_) => "cancelled",
            CrossmemError::InvalidInput(_) => "invalid_input",
            CrossmemError::Config(_) => "config",
            CrossmemError::Storage(_) => "storage",
            CrossmemError::Api(_) => "api",
            CrossmemError::Io(_) => "io",
            CrossmemError::Serialization(_) => "serialization",
        }
    }

    /// Whether the caller can reasonably retry or branch on this error
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, CrossmemError::InvariantViolation(_))
    }
}

impl From<serde_json::Error> for CrossmemError {
    fn from(e: serde_json::Error) -> Self {
        CrossmemError::Serialization(e.to_string())
    }
}

/// Result type alias for crossmem operations
pub type Result<T> = std::result::Result<T, CrossmemError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_budget_exceeded_message() {
        let err = CrossmemError::BudgetExceeded {
            required: 12,
            available: 0,
        };
        assert_eq!(
            err.to_string(),
            "Token budget exceeded: 12 tokens required, 0 available"
        );
        assert_eq!(err.kind(), "budget_exceeded");
    }

    #[test]
    fn test_invariant_violation_is_not_recoverable() {
        assert!(!CrossmemError::InvariantViolation("negative total".into()).is_recoverable());
        assert!(CrossmemError::NotFound("abc".into()).is_recoverable());
        assert!(CrossmemError::ConcurrentModification("s1".into()).is_recoverable());
    }
}
