//! Payment aggregate and related types.

mod aggregate;
mod method;
mod state;

pub use aggregate::{Payment, PaymentRecord};
pub use method::{ParsePaymentMethodError, PaymentMethod};
pub use state::{ParsePaymentStatusError, PaymentStatus};

use thiserror::Error;

use crate::error::ErrorKind;

/// Errors that can occur during payment operations.
#[derive(Debug, Error)]
pub enum PaymentError {
    /// Order ID is required.
    #[error("Order ID is required")]
    OrderIdRequired,

    /// Amount outside the accepted range.
    #[error("Invalid payment amount: {cents} cents")]
    InvalidAmount { cents: i64 },

    /// Gateway transaction ID too long.
    #[error("Transaction ID is {length} characters (max {max})", max = Payment::MAX_TRANSACTION_ID_LENGTH)]
    TransactionIdTooLong { length: usize },

    /// Status change that is not an edge of the transition graph.
    #[error("Invalid transition from {from} to {to}")]
    InvalidTransition {
        from: PaymentStatus,
        to: PaymentStatus,
    },

    /// The amount is frozen once the payment leaves Pending.
    #[error("Cannot change the amount of a payment in {status} status")]
    AmountLocked { status: PaymentStatus },
}

impl PaymentError {
    /// Classifies the error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            PaymentError::OrderIdRequired
            | PaymentError::InvalidAmount { .. }
            | PaymentError::TransactionIdTooLong { .. } => ErrorKind::Validation,
            PaymentError::InvalidTransition { .. } => ErrorKind::InvalidTransition,
            PaymentError::AmountLocked { .. } => ErrorKind::StateConflict,
        }
    }
}
