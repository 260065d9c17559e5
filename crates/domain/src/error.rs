//! Domain error types.

use thiserror::Error;

use crate::cart::CartError;
use crate::order::OrderError;
use crate::payment::PaymentError;

/// Coarse classification of a failure, used by callers to pick a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed input; nothing was changed.
    Validation,
    /// The operation is not allowed in the entity's current lifecycle state.
    StateConflict,
    /// The requested status change is not an edge of the transition graph.
    InvalidTransition,
    /// The referenced entity or line does not exist.
    NotFound,
    /// A uniqueness or compare-and-set check failed.
    Conflict,
    /// A size limit (such as distinct cart lines) would be exceeded.
    CapacityExceeded,
    /// Infrastructure failure outside the caller's control.
    Internal,
}

impl ErrorKind {
    /// Returns the kind name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation",
            ErrorKind::StateConflict => "state_conflict",
            ErrorKind::InvalidTransition => "invalid_transition",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Conflict => "conflict",
            ErrorKind::CapacityExceeded => "capacity_exceeded",
            ErrorKind::Internal => "internal",
        }
    }

    /// Returns true for failures caused by a business rule rather than a fault.
    pub fn is_business_rule(&self) -> bool {
        !matches!(self, ErrorKind::Internal)
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Errors raised by any aggregate in the domain.
#[derive(Debug, Error)]
pub enum DomainError {
    /// An error occurred in the cart aggregate.
    #[error("Cart error: {0}")]
    Cart(#[from] CartError),

    /// An error occurred in the order aggregate.
    #[error("Order error: {0}")]
    Order(#[from] OrderError),

    /// An error occurred in the payment aggregate.
    #[error("Payment error: {0}")]
    Payment(#[from] PaymentError),
}

impl DomainError {
    /// Classifies the error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            DomainError::Cart(e) => e.kind(),
            DomainError::Order(e) => e.kind(),
            DomainError::Payment(e) => e.kind(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::order::OrderStatus;

    #[test]
    fn test_kind_delegates_to_aggregate_error() {
        let err: DomainError = OrderError::InvalidTransition {
            from: OrderStatus::Shipped,
            to: OrderStatus::Cancelled,
        }
        .into();
        assert_eq!(err.kind(), ErrorKind::InvalidTransition);

        let err: DomainError = CartError::CapacityExceeded { max: 50 }.into();
        assert_eq!(err.kind(), ErrorKind::CapacityExceeded);
    }

    #[test]
    fn test_only_internal_is_not_business_rule() {
        assert!(ErrorKind::Validation.is_business_rule());
        assert!(ErrorKind::Conflict.is_business_rule());
        assert!(!ErrorKind::Internal.is_business_rule());
    }
}
