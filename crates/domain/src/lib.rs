//! Domain layer for the commerce lifecycle engine.
//!
//! This crate provides the aggregates whose invariants the rest of the
//! system relies on:
//! - Cart with its per-product lines and size limits
//! - Order with its status state machine and immutable line snapshots
//! - Payment with its own status state machine
//!
//! Nothing here performs I/O; stores and services live in other crates.

pub mod cart;
pub mod error;
pub mod money;
pub mod order;
pub mod payment;

pub use cart::{Cart, CartError, CartItem, CartItemRecord, CartRecord};
pub use error::{DomainError, ErrorKind};
pub use money::Money;
pub use order::{
    Order, OrderError, OrderItem, OrderItemRecord, OrderLine, OrderNumber, OrderRecord,
    OrderStatus,
};
pub use payment::{Payment, PaymentError, PaymentMethod, PaymentRecord, PaymentStatus};
