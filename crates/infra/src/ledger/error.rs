use thiserror::Error;

use stockledger_core::{DomainError, ProductId};

use crate::store::StoreError;

/// Caller-facing error of every ledger operation.
///
/// Every variant is a recoverable, typed failure. A call that fails leaves
/// quantity and history exactly as they were.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("invalid quantity: {0} (must be a positive integer)")]
    InvalidQuantity(i64),

    #[error("insufficient stock: requested {requested}, available {available}")]
    InsufficientStock { requested: i64, available: i64 },

    #[error("product {0} is inactive")]
    InactiveProduct(ProductId),

    /// Unknown product, supplier, or actor (or an inactive actor).
    #[error("not found: {0}")]
    NotFound(String),

    #[error("validation failed: {0}")]
    Validation(String),

    /// Duplicate SKU, username or supplier, a supplier still in use, or the
    /// write kept losing version races.
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("persistence failure: {0}")]
    PersistenceFailure(#[source] StoreError),
}

impl From<DomainError> for LedgerError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::InvalidQuantity(q) => LedgerError::InvalidQuantity(q),
            DomainError::InsufficientStock {
                requested,
                available,
            } => LedgerError::InsufficientStock {
                requested,
                available,
            },
            DomainError::InactiveProduct(id) => LedgerError::InactiveProduct(id),
            DomainError::Conflict(msg) => LedgerError::Conflict(msg),
            DomainError::Validation(msg)
            | DomainError::InvariantViolation(msg)
            | DomainError::InvalidId(msg) => LedgerError::Validation(msg),
        }
    }
}

impl From<StoreError> for LedgerError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::Concurrency(msg) | StoreError::Duplicate(msg) | StoreError::InUse(msg) => {
                LedgerError::Conflict(msg)
            }
            StoreError::MissingReference(what) => LedgerError::NotFound(what),
            other => LedgerError::PersistenceFailure(other),
        }
    }
}
