//! Checkout settings.

use std::time::Duration;

use crate::order_number::{NumberPartition, OrderNumberGenerator};

/// Settings for [`CheckoutService`](crate::CheckoutService).
#[derive(Debug, Clone)]
pub struct CheckoutConfig {
    /// Leading part of every order number.
    pub order_number_prefix: String,
    pub partition: NumberPartition,
    /// Deadline for one checkout transaction.
    pub timeout: Duration,
    /// How many transactions to try before giving up on order-number
    /// collisions.
    pub max_attempts: u32,
}

impl CheckoutConfig {
    pub fn order_numbers(&self) -> OrderNumberGenerator {
        OrderNumberGenerator::new(&self.order_number_prefix, self.partition)
    }
}

impl Default for CheckoutConfig {
    fn default() -> Self {
        Self {
            order_number_prefix: "ORD".to_string(),
            partition: NumberPartition::Year,
            timeout: Duration::from_secs(5),
            max_attempts: 5,
        }
    }
}
