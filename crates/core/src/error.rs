use thiserror::Error;

use crate::id::ProductId;

pub type DomainResult<T> = Result<T, DomainError>;

/// Rule violations detected by pure domain code.
///
/// Nothing here touches storage: a `DomainError` always means the input or
/// the current state was wrong, never that a backend failed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("validation failed: {0}")]
    Validation(String),

    /// Movement magnitudes must be strictly positive.
    #[error("invalid quantity: {0} (must be a positive integer)")]
    InvalidQuantity(i64),

    #[error("insufficient stock: requested {requested}, available {available}")]
    InsufficientStock { requested: i64, available: i64 },

    #[error("product {0} is inactive")]
    InactiveProduct(ProductId),

    /// Internal state that should be impossible (overflow, mismatched ids).
    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// The requested state change is already in effect or contradicts it.
    #[error("conflict: {0}")]
    Conflict(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        DomainError::Validation(msg.into())
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        DomainError::InvariantViolation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        DomainError::InvalidId(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        DomainError::Conflict(msg.into())
    }

    /// True for failures caused by the caller's input rather than by stock
    /// levels or product state.
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            DomainError::Validation(_) | DomainError::InvalidQuantity(_) | DomainError::InvalidId(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_carry_the_numbers() {
        let err = DomainError::InsufficientStock { requested: 20, available: 15 };
        assert_eq!(err.to_string(), "insufficient stock: requested 20, available 15");
        assert_eq!(
            DomainError::InvalidQuantity(-3).to_string(),
            "invalid quantity: -3 (must be a positive integer)"
        );
    }

    #[test]
    fn input_errors_are_distinguished_from_state_errors() {
        assert!(DomainError::InvalidQuantity(0).is_input_error());
        assert!(DomainError::validation("blank").is_input_error());
        assert!(!DomainError::InactiveProduct(ProductId::new()).is_input_error());
        assert!(!DomainError::InsufficientStock { requested: 1, available: 0 }.is_input_error());
    }
}
