//! Error type returned by the costing services.

use thiserror::Error;

use tradeerp_core::DomainError;

use crate::ledger::StoreError;

pub type EngineResult<T> = Result<T, EngineError>;

#[derive(Debug, Error)]
pub enum EngineError {
    /// Deterministic domain failure (validation, business rule, not found, ...).
    #[error(transparent)]
    Domain(DomainError),

    /// One attempt lost an optimistic concurrency race. Retried internally.
    #[error("concurrent modification: {0}")]
    Concurrency(String),

    /// Every attempt conflicted with a concurrent transaction.
    #[error("gave up after {attempts} attempts due to concurrent modifications: {last}")]
    RetriesExhausted { attempts: u32, last: String },

    /// The ledger itself failed.
    #[error("ledger failure: {0}")]
    Store(StoreError),
}

impl EngineError {
    pub fn domain(&self) -> Option<&DomainError> {
        match self {
            EngineError::Domain(err) => Some(err),
            _ => None,
        }
    }

    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            EngineError::Concurrency(_) | EngineError::RetriesExhausted { .. }
        )
    }
}

impl From<DomainError> for EngineError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::Conflict(msg) => EngineError::Concurrency(msg),
            other => EngineError::Domain(other),
        }
    }
}

impl From<StoreError> for EngineError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::Conflict(msg) => EngineError::Concurrency(msg),
            StoreError::UniqueViolation { entity, key } => {
                EngineError::Domain(DomainError::Duplicate { entity, key })
            }
            other => EngineError::Store(other),
        }
    }
}
