//! Domain-specific error types following panic-free policy.

use thiserror::Error;

/// Errors that can occur in domain operations.
///
/// Session lifecycle transitions never fail; these errors come from
/// validating data that crosses a boundary (loaded stores, thresholds).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A structural invariant of the session store does not hold
    #[error("Invariant violated: {reason}")]
    InvariantViolation { reason: String },

    /// Invalid field value
    #[error("Invalid {field}: {value} (expected {expected})")]
    InvalidFieldValue {
        field: String,
        value: String,
        expected: String,
    },
}

impl DomainError {
    pub(crate) fn invariant(reason: impl Into<String>) -> Self {
        Self::InvariantViolation {
            reason: reason.into(),
        }
    }
}

/// Result type for domain operations.
pub type DomainResult<T> = Result<T, DomainError>;
