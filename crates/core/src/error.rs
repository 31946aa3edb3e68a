//! Domain error model.

use thiserror::Error;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Keep this focused on deterministic, business/domain failures (validation,
/// business rules, uniqueness, conflicts). Infrastructure concerns belong
/// elsewhere.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// An input failed validation before anything was written.
    #[error("validation failed on `{field}`: {message}")]
    Validation { field: &'static str, message: String },

    /// Not enough open stock to satisfy an outbound request.
    #[error("insufficient stock (available={available}, requested={requested})")]
    InsufficientStock { available: i64, requested: i64 },

    /// A business rule rejected the operation (already distributed fee,
    /// consumed lot, already-linked sale, ...).
    #[error("business rule violated: {0}")]
    BusinessRule(String),

    /// A uniqueness constraint would be violated (lot code, fee month).
    #[error("duplicate {entity}: {key}")]
    Duplicate { entity: &'static str, key: String },

    /// An identifier was invalid (e.g. parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// A referenced record does not exist.
    #[error("{entity} not found: {key}")]
    NotFound { entity: &'static str, key: String },

    /// A conflict occurred (e.g. stale version / optimistic concurrency).
    #[error("conflict: {0}")]
    Conflict(String),
}

impl DomainError {
    pub fn validation(field: &'static str, msg: impl Into<String>) -> Self {
        Self::Validation {
            field,
            message: msg.into(),
        }
    }

    pub fn business(msg: impl Into<String>) -> Self {
        Self::BusinessRule(msg.into())
    }

    pub fn duplicate(entity: &'static str, key: impl core::fmt::Display) -> Self {
        Self::Duplicate {
            entity,
            key: key.to_string(),
        }
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn not_found(entity: &'static str, key: impl core::fmt::Display) -> Self {
        Self::NotFound {
            entity,
            key: key.to_string(),
        }
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    /// Whether retrying the whole transaction may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }
}
