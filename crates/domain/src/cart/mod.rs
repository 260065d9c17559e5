//! Cart aggregate and related types.

mod aggregate;
mod item;

pub use aggregate::{Cart, CartRecord};
pub use item::{CartItem, CartItemRecord};

use common::{CartId, OrderId, ProductId};
use thiserror::Error;

use crate::error::ErrorKind;

/// Errors that can occur during cart operations.
#[derive(Debug, Error)]
pub enum CartError {
    /// User ID is required.
    #[error("User ID is required")]
    UserIdRequired,

    /// Product ID is required.
    #[error("Product ID is required")]
    ProductIdRequired,

    /// Quantity outside the accepted range.
    #[error("Invalid quantity: {quantity} (must be between {min} and {max})", min = CartItem::MIN_QUANTITY, max = CartItem::MAX_QUANTITY)]
    InvalidQuantity { quantity: u32 },

    /// Adding to an existing line would push it past the per-line maximum.
    #[error("Quantity for {product_id} would become {requested} (max {max})", max = CartItem::MAX_QUANTITY)]
    QuantityLimitExceeded { product_id: ProductId, requested: u32 },

    /// Removing more units than the line holds.
    #[error("Cannot remove {requested} units from a line holding {available}")]
    InsufficientQuantity { requested: u32, available: u32 },

    /// Unit price outside the accepted range.
    #[error("Invalid unit price: {cents} cents")]
    InvalidPrice { cents: i64 },

    /// The cart already holds the maximum number of distinct products.
    #[error("Cart cannot hold more than {max} distinct products")]
    CapacityExceeded { max: usize },

    /// Item not found in cart.
    #[error("Item not found in cart: {product_id}")]
    ItemNotFound { product_id: ProductId },

    /// The cart has no lines to check out.
    #[error("Cart {cart_id} is empty")]
    Empty { cart_id: CartId },

    /// The cart was already turned into an order.
    #[error("Cart {cart_id} was already converted into order {order_id}")]
    AlreadyConverted { cart_id: CartId, order_id: OrderId },
}

impl CartError {
    /// Classifies the error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            CartError::UserIdRequired
            | CartError::ProductIdRequired
            | CartError::InvalidQuantity { .. }
            | CartError::QuantityLimitExceeded { .. }
            | CartError::InvalidPrice { .. } => ErrorKind::Validation,
            CartError::InsufficientQuantity { .. } | CartError::Empty { .. } => {
                ErrorKind::StateConflict
            }
            CartError::CapacityExceeded { .. } => ErrorKind::CapacityExceeded,
            CartError::ItemNotFound { .. } => ErrorKind::NotFound,
            CartError::AlreadyConverted { .. } => ErrorKind::Conflict,
        }
    }
}
