use std::time::Duration;

use common::{CartId, OrderId, UserId};
use domain::ErrorKind;
use thiserror::Error;

/// Errors that can occur when interacting with a store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The referenced row does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// The cart was claimed by another checkout.
    #[error("Cart {cart_id} was already converted into order {order_id}")]
    CartAlreadyConverted { cart_id: CartId, order_id: OrderId },

    /// The user already owns an unconverted cart.
    #[error("User {user_id} already has an open cart")]
    OpenCartExists { user_id: UserId },

    /// Another order already uses this number.
    #[error("Order number already taken: {0}")]
    DuplicateOrderNumber(String),

    /// The unit of work ran past its deadline and was rolled back.
    #[error("Transaction timed out after {0:?}")]
    Timeout(Duration),

    /// The unit of work was cancelled and rolled back.
    #[error("Transaction cancelled")]
    Cancelled,

    /// A persisted row could not be turned back into a domain object.
    #[error("Corrupt row: {0}")]
    Corrupt(String),

    /// Failure injected by the in-memory store.
    #[error("Injected failure: {0}")]
    Injected(String),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

impl StoreError {
    pub(crate) fn not_found(entity: &'static str, id: impl std::fmt::Display) -> Self {
        StoreError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub(crate) fn corrupt(err: impl std::fmt::Display) -> Self {
        StoreError::Corrupt(err.to_string())
    }

    /// Classifies the error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            StoreError::NotFound { .. } => ErrorKind::NotFound,
            StoreError::CartAlreadyConverted { .. }
            | StoreError::OpenCartExists { .. }
            | StoreError::DuplicateOrderNumber(_) => ErrorKind::Conflict,
            StoreError::Timeout(_)
            | StoreError::Cancelled
            | StoreError::Corrupt(_)
            | StoreError::Injected(_)
            | StoreError::Database(_)
            | StoreError::Migration(_) => ErrorKind::Internal,
        }
    }

    /// Returns true for failures worth retrying with a fresh order number.
    pub fn is_order_number_conflict(&self) -> bool {
        matches!(self, StoreError::DuplicateOrderNumber(_))
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
