//! Strongly typed entity identifiers.
//!
//! Every entity is keyed by a UUID. Wrapping each one in its own type keeps a
//! `CartId` from being passed where an `OrderId` is expected.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Creates a new random identifier.
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Creates an identifier from an existing UUID.
            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Returns the underlying UUID.
            pub fn as_uuid(&self) -> Uuid {
                self.0
            }

            /// Returns true for the all-zero UUID, which is never a valid key.
            pub fn is_nil(&self) -> bool {
                self.0.is_nil()
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl std::str::FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s).map(Self)
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }

        impl From<$name> for Uuid {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

entity_id!(
    /// Identifier of a registered user.
    UserId
);

entity_id!(
    /// Identifier of a shopping cart.
    CartId
);

entity_id!(
    /// Identifier of a single cart line.
    CartItemId
);

entity_id!(
    /// Internal identifier of an order (distinct from its human-facing order number).
    OrderId
);

entity_id!(
    /// Identifier of an order line snapshot.
    OrderItemId
);

entity_id!(
    /// Identifier of a payment attempt.
    PaymentId
);

entity_id!(
    /// Identifier of a catalog product.
    ProductId
);

entity_id!(
    /// Identifier of a shipping address.
    AddressId
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_creates_unique_ids() {
        let id1 = OrderId::new();
        let id2 = OrderId::new();
        assert_ne!(id1, id2);
    }

    #[test]
    fn from_uuid_preserves_value() {
        let uuid = Uuid::new_v4();
        let id = CartId::from_uuid(uuid);
        assert_eq!(id.as_uuid(), uuid);
        assert_eq!(Uuid::from(id), uuid);
    }

    #[test]
    fn nil_uuid_is_detected() {
        assert!(UserId::from_uuid(Uuid::nil()).is_nil());
        assert!(!UserId::new().is_nil());
    }

    #[test]
    fn parses_from_string() {
        let id = ProductId::new();
        let parsed: ProductId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
        assert!("not-a-uuid".parse::<ProductId>().is_err());
    }

    #[test]
    fn serializes_as_bare_uuid() {
        let uuid = Uuid::new_v4();
        let id = PaymentId::from_uuid(uuid);
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{uuid}\""));
    }
}
