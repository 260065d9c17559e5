//! Order line snapshots.

use chrono::{DateTime, Utc};
use common::{OrderId, OrderItemId, ProductId};
use serde::Serialize;

use super::OrderError;
use crate::money::Money;

/// Product data resolved at checkout for one cart line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderLine {
    pub product_id: ProductId,
    pub product_name: String,
    pub quantity: u32,
    pub unit_price: Money,
}

impl OrderLine {
    pub fn new(
        product_id: ProductId,
        product_name: impl Into<String>,
        quantity: u32,
        unit_price: Money,
    ) -> Self {
        Self {
            product_id,
            product_name: product_name.into(),
            quantity,
            unit_price,
        }
    }
}

/// Immutable snapshot of a purchased product.
///
/// Name and price are copied at order creation and never follow later
/// catalog changes. `total_price` always equals `quantity * unit_price`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderItem {
    id: OrderItemId,
    order_id: OrderId,
    product_id: ProductId,
    product_name: String,
    quantity: u32,
    unit_price: Money,
    total_price: Money,
    created_at: DateTime<Utc>,
}

/// Persisted state of an order line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderItemRecord {
    pub id: OrderItemId,
    pub order_id: OrderId,
    pub product_id: ProductId,
    pub product_name: String,
    pub quantity: u32,
    pub unit_price: Money,
    pub total_price: Money,
    pub created_at: DateTime<Utc>,
}

impl OrderItem {
    pub const MIN_QUANTITY: u32 = 1;
    pub const MAX_QUANTITY: u32 = 999;
    pub const MIN_PRODUCT_NAME_LENGTH: usize = 2;
    pub const MAX_PRODUCT_NAME_LENGTH: usize = 200;

    /// Snapshots a resolved line for an order.
    pub fn snapshot(order_id: OrderId, line: OrderLine) -> Result<Self, OrderError> {
        if line.product_id.is_nil() {
            return Err(OrderError::ProductIdRequired);
        }
        let product_name = validate_product_name(&line.product_name)?;
        if !(Self::MIN_QUANTITY..=Self::MAX_QUANTITY).contains(&line.quantity) {
            return Err(OrderError::InvalidQuantity {
                quantity: line.quantity,
            });
        }
        if !line.unit_price.is_within_bounds() {
            return Err(OrderError::InvalidUnitPrice {
                cents: line.unit_price.cents(),
            });
        }

        Ok(Self {
            id: OrderItemId::new(),
            order_id,
            product_id: line.product_id,
            product_name,
            quantity: line.quantity,
            unit_price: line.unit_price,
            total_price: line.unit_price.multiply(line.quantity),
            created_at: Utc::now(),
        })
    }

    /// Rebuilds a line from its persisted state, checking the price invariant.
    pub fn restore(record: OrderItemRecord) -> Result<Self, OrderError> {
        let expected = record.unit_price.multiply(record.quantity);
        if record.total_price != expected {
            return Err(OrderError::TotalPriceMismatch {
                expected: expected.cents(),
                actual: record.total_price.cents(),
            });
        }

        Ok(Self {
            id: record.id,
            order_id: record.order_id,
            product_id: record.product_id,
            product_name: record.product_name,
            quantity: record.quantity,
            unit_price: record.unit_price,
            total_price: record.total_price,
            created_at: record.created_at,
        })
    }

    pub fn to_record(&self) -> OrderItemRecord {
        OrderItemRecord {
            id: self.id,
            order_id: self.order_id,
            product_id: self.product_id,
            product_name: self.product_name.clone(),
            quantity: self.quantity,
            unit_price: self.unit_price,
            total_price: self.total_price,
            created_at: self.created_at,
        }
    }

    pub fn id(&self) -> OrderItemId {
        self.id
    }

    pub fn order_id(&self) -> OrderId {
        self.order_id
    }

    pub fn product_id(&self) -> ProductId {
        self.product_id
    }

    pub fn product_name(&self) -> &str {
        &self.product_name
    }

    pub fn quantity(&self) -> u32 {
        self.quantity
    }

    pub fn unit_price(&self) -> Money {
        self.unit_price
    }

    pub fn total_price(&self) -> Money {
        self.total_price
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Volume discount tier: 10% from ten units, 5% from five.
    pub fn quantity_discount_percent(&self) -> u8 {
        match self.quantity {
            10.. => 10,
            5.. => 5,
            _ => 0,
        }
    }

    /// Returns the line total after the volume discount.
    pub fn discounted_total(&self) -> Money {
        self.total_price.less_percent(self.quantity_discount_percent())
    }

    /// Returns how much the volume discount takes off the line total.
    pub fn discount_amount(&self) -> Money {
        self.total_price - self.discounted_total()
    }
}

fn validate_product_name(name: &str) -> Result<String, OrderError> {
    let trimmed = name.trim();
    let len = trimmed.chars().count();
    if !(OrderItem::MIN_PRODUCT_NAME_LENGTH..=OrderItem::MAX_PRODUCT_NAME_LENGTH).contains(&len) {
        return Err(OrderError::InvalidProductName { length: len });
    }
    Ok(trimmed.to_string())
}
