//! Persistence gateways and the transactional scope coordinator.
//!
//! Gateways are traits implemented by a unit-of-work handle, so every read
//! and write of one logical operation goes through the same transaction.
//! Two backends are provided: an in-memory store for tests and a
//! PostgreSQL store built on `sqlx`.

pub mod error;
pub mod memory;
pub mod postgres;
pub mod scope;
pub mod store;

pub use error::{Result, StoreError};
pub use memory::{InMemoryStore, InMemoryTx};
pub use postgres::{PostgresStore, PostgresTx};
pub use scope::TransactionScope;
pub use store::{
    CartStore, OrderStore, PaymentStore, Product, ProductCatalog, TransactionalStore, UnitOfWork,
};
