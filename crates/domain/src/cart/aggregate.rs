//! Cart aggregate implementation.

use chrono::{DateTime, Utc};
use common::{CartId, OrderId, ProductId, UserId};
use serde::Serialize;

use super::item::validate_quantity;
use super::{CartError, CartItem};
use crate::money::Money;

/// Cart aggregate root.
///
/// Holds a user's pending selection, one line per product in insertion
/// order. A cart lives until checkout claims it for an order; after that it
/// is read-only and the user gets a fresh cart on the next add.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Cart {
    id: CartId,
    user_id: UserId,
    items: Vec<CartItem>,
    converted_order_id: Option<OrderId>,
    converted_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// Persisted state of a cart, used to rehydrate a [`Cart`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartRecord {
    pub id: CartId,
    pub user_id: UserId,
    pub items: Vec<CartItem>,
    pub converted_order_id: Option<OrderId>,
    pub converted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Cart {
    /// Maximum number of distinct products per cart.
    pub const MAX_DISTINCT_ITEMS: usize = 50;

    /// Creates an empty cart for a user.
    pub fn new(user_id: UserId) -> Result<Self, CartError> {
        if user_id.is_nil() {
            return Err(CartError::UserIdRequired);
        }

        let now = Utc::now();
        Ok(Self {
            id: CartId::new(),
            user_id,
            items: Vec::new(),
            converted_order_id: None,
            converted_at: None,
            created_at: now,
            updated_at: now,
        })
    }

    /// Rebuilds a cart from its persisted state.
    pub fn restore(record: CartRecord) -> Self {
        Self {
            id: record.id,
            user_id: record.user_id,
            items: record.items,
            converted_order_id: record.converted_order_id,
            converted_at: record.converted_at,
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }

    /// Returns the persisted state of this cart.
    pub fn to_record(&self) -> CartRecord {
        CartRecord {
            id: self.id,
            user_id: self.user_id,
            items: self.items.clone(),
            converted_order_id: self.converted_order_id,
            converted_at: self.converted_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

// Query methods
impl Cart {
    pub fn id(&self) -> CartId {
        self.id
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    /// Returns the lines in insertion order.
    pub fn items(&self) -> &[CartItem] {
        &self.items
    }

    /// Returns the line for a product, if any.
    pub fn item(&self, product_id: ProductId) -> Option<&CartItem> {
        self.items.iter().find(|i| i.product_id() == product_id)
    }

    pub fn has_item(&self, product_id: ProductId) -> bool {
        self.item(product_id).is_some()
    }

    /// Returns the number of distinct product lines.
    pub fn distinct_items(&self) -> usize {
        self.items.len()
    }

    /// Returns the total number of units across all lines.
    pub fn total_quantity(&self) -> u32 {
        self.items.iter().map(CartItem::quantity).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Returns the sum of line totals at the prices captured in the cart.
    pub fn subtotal(&self) -> Money {
        self.items.iter().map(CartItem::line_total).sum()
    }

    pub fn converted_order_id(&self) -> Option<OrderId> {
        self.converted_order_id
    }

    pub fn converted_at(&self) -> Option<DateTime<Utc>> {
        self.converted_at
    }

    pub fn is_converted(&self) -> bool {
        self.converted_order_id.is_some()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}

// Command methods
impl Cart {
    /// Adds units of a product.
    ///
    /// An existing line for the product is incremented instead of duplicated;
    /// its captured price is kept. Only a new line counts against
    /// [`Cart::MAX_DISTINCT_ITEMS`]. Returns the affected line.
    pub fn add_item(
        &mut self,
        product_id: ProductId,
        quantity: u32,
        unit_price: Money,
    ) -> Result<&CartItem, CartError> {
        self.ensure_open()?;
        if product_id.is_nil() {
            return Err(CartError::ProductIdRequired);
        }
        validate_quantity(quantity)?;

        let index = match self.position(product_id) {
            Some(index) => {
                self.items[index].add_quantity(quantity)?;
                index
            }
            None => {
                if self.items.len() >= Self::MAX_DISTINCT_ITEMS {
                    return Err(CartError::CapacityExceeded {
                        max: Self::MAX_DISTINCT_ITEMS,
                    });
                }
                let item = CartItem::new(self.id, product_id, quantity, unit_price)?;
                self.items.push(item);
                self.items.len() - 1
            }
        };

        self.touch();
        Ok(&self.items[index])
    }

    /// Removes the line for a product. Absent products are ignored.
    ///
    /// Returns the removed line.
    pub fn remove_item(&mut self, product_id: ProductId) -> Result<Option<CartItem>, CartError> {
        self.ensure_open()?;

        let removed = self.position(product_id).map(|i| self.items.remove(i));
        if removed.is_some() {
            self.touch();
        }
        Ok(removed)
    }

    /// Sets the quantity of an existing line.
    pub fn update_item_quantity(
        &mut self,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<&CartItem, CartError> {
        self.ensure_open()?;
        validate_quantity(quantity)?;

        let index = self
            .position(product_id)
            .ok_or(CartError::ItemNotFound { product_id })?;
        self.items[index].update_quantity(quantity)?;

        self.touch();
        Ok(&self.items[index])
    }

    /// Removes every line.
    pub fn clear(&mut self) -> Result<(), CartError> {
        self.ensure_open()?;
        self.items.clear();
        self.touch();
        Ok(())
    }

    /// Marks the cart as consumed by an order.
    ///
    /// Fails if the cart was already converted or has nothing to convert.
    pub fn mark_converted(&mut self, order_id: OrderId) -> Result<(), CartError> {
        self.ensure_open()?;
        if self.is_empty() {
            return Err(CartError::Empty { cart_id: self.id });
        }

        let now = Utc::now();
        self.converted_order_id = Some(order_id);
        self.converted_at = Some(now);
        self.updated_at = now;
        Ok(())
    }

    fn ensure_open(&self) -> Result<(), CartError> {
        match self.converted_order_id {
            Some(order_id) => Err(CartError::AlreadyConverted {
                cart_id: self.id,
                order_id,
            }),
            None => Ok(()),
        }
    }

    fn position(&self, product_id: ProductId) -> Option<usize> {
        self.items.iter().position(|i| i.product_id() == product_id)
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}
