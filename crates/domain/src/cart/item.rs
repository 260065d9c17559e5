//! Cart line.

use chrono::{DateTime, Utc};
use common::{CartId, CartItemId, ProductId};
use serde::Serialize;

use super::CartError;
use crate::money::Money;

/// One product line inside a cart.
///
/// The unit price is the catalog price captured when the product was first
/// added; checkout does not rely on it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CartItem {
    id: CartItemId,
    cart_id: CartId,
    product_id: ProductId,
    quantity: u32,
    unit_price: Money,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// Persisted state of a cart line, used to rehydrate a [`CartItem`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartItemRecord {
    pub id: CartItemId,
    pub cart_id: CartId,
    pub product_id: ProductId,
    pub quantity: u32,
    pub unit_price: Money,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CartItem {
    /// Smallest quantity a line may hold.
    pub const MIN_QUANTITY: u32 = 1;

    /// Largest quantity a line may hold.
    pub const MAX_QUANTITY: u32 = 999;

    /// Creates a new line after validating product, quantity and price.
    pub fn new(
        cart_id: CartId,
        product_id: ProductId,
        quantity: u32,
        unit_price: Money,
    ) -> Result<Self, CartError> {
        if product_id.is_nil() {
            return Err(CartError::ProductIdRequired);
        }
        validate_quantity(quantity)?;
        if !unit_price.is_within_bounds() {
            return Err(CartError::InvalidPrice {
                cents: unit_price.cents(),
            });
        }

        let now = Utc::now();
        Ok(Self {
            id: CartItemId::new(),
            cart_id,
            product_id,
            quantity,
            unit_price,
            created_at: now,
            updated_at: now,
        })
    }

    /// Rebuilds a line from its persisted state.
    pub fn restore(record: CartItemRecord) -> Self {
        Self {
            id: record.id,
            cart_id: record.cart_id,
            product_id: record.product_id,
            quantity: record.quantity,
            unit_price: record.unit_price,
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }

    pub fn to_record(&self) -> CartItemRecord {
        CartItemRecord {
            id: self.id,
            cart_id: self.cart_id,
            product_id: self.product_id,
            quantity: self.quantity,
            unit_price: self.unit_price,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }

    pub fn id(&self) -> CartItemId {
        self.id
    }

    pub fn cart_id(&self) -> CartId {
        self.cart_id
    }

    pub fn product_id(&self) -> ProductId {
        self.product_id
    }

    pub fn quantity(&self) -> u32 {
        self.quantity
    }

    pub fn unit_price(&self) -> Money {
        self.unit_price
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Returns quantity times the captured unit price.
    pub fn line_total(&self) -> Money {
        self.unit_price.multiply(self.quantity)
    }

    pub fn is_at_minimum(&self) -> bool {
        self.quantity == Self::MIN_QUANTITY
    }

    pub fn is_at_maximum(&self) -> bool {
        self.quantity == Self::MAX_QUANTITY
    }

    pub fn can_increment(&self) -> bool {
        self.quantity < Self::MAX_QUANTITY
    }

    pub fn can_decrement(&self) -> bool {
        self.quantity > Self::MIN_QUANTITY
    }

    /// Replaces the quantity.
    pub fn update_quantity(&mut self, quantity: u32) -> Result<(), CartError> {
        validate_quantity(quantity)?;
        self.quantity = quantity;
        self.touch();
        Ok(())
    }

    /// Adds units to the line, rejecting results above the per-line maximum.
    pub fn add_quantity(&mut self, additional: u32) -> Result<(), CartError> {
        if additional == 0 {
            return Err(CartError::InvalidQuantity {
                quantity: additional,
            });
        }
        let requested = self.quantity.saturating_add(additional);
        if requested > Self::MAX_QUANTITY {
            return Err(CartError::QuantityLimitExceeded {
                product_id: self.product_id,
                requested,
            });
        }
        self.quantity = requested;
        self.touch();
        Ok(())
    }

    /// Removes units from the line. The line must keep at least one unit;
    /// dropping it entirely is the cart's job.
    pub fn remove_quantity(&mut self, units: u32) -> Result<(), CartError> {
        if units == 0 {
            return Err(CartError::InvalidQuantity { quantity: units });
        }
        if units >= self.quantity {
            return Err(CartError::InsufficientQuantity {
                requested: units,
                available: self.quantity,
            });
        }
        self.quantity -= units;
        self.touch();
        Ok(())
    }

    pub fn increment(&mut self) -> Result<(), CartError> {
        self.add_quantity(1)
    }

    /// Decrements by one unit; a no-op at the minimum.
    pub fn decrement(&mut self) {
        if self.can_decrement() {
            self.quantity -= 1;
            self.touch();
        }
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

pub(super) fn validate_quantity(quantity: u32) -> Result<(), CartError> {
    if !(CartItem::MIN_QUANTITY..=CartItem::MAX_QUANTITY).contains(&quantity) {
        return Err(CartError::InvalidQuantity { quantity });
    }
    Ok(())
}
