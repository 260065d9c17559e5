//! Human-facing order numbers.

use serde::{Deserialize, Serialize};

use super::OrderError;

/// Unique, human-readable order identifier such as `ORD-2026-000042`.
///
/// Stored trimmed and upper-cased; between 5 and 50 characters.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct OrderNumber(String);

impl OrderNumber {
    pub const MIN_LENGTH: usize = 5;
    pub const MAX_LENGTH: usize = 50;

    /// Validates and normalizes an order number.
    pub fn parse(value: &str) -> Result<Self, OrderError> {
        let normalized = value.trim().to_uppercase();
        let length = normalized.chars().count();
        if !(Self::MIN_LENGTH..=Self::MAX_LENGTH).contains(&length) {
            return Err(OrderError::InvalidOrderNumber { length });
        }
        Ok(Self(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for OrderNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for OrderNumber {
    type Error = OrderError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<OrderNumber> for String {
    fn from(number: OrderNumber) -> Self {
        number.0
    }
}

impl AsRef<str> for OrderNumber {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
