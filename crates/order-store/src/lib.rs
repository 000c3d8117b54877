//! Persistence boundary for orders and the catalog.
//!
//! Orders are single documents keyed by their business key
//! ([`OrderId`]), never by a storage-internal identifier. Every mutation
//! is one atomic conditional update so concurrent callbacks for the same
//! order cannot lose each other's writes.

pub mod error;
pub mod memory;
pub mod postgres;
pub mod reaper;
pub mod store;

pub use common::OrderId;
pub use error::{Result, StoreError};
pub use memory::{InMemoryCatalogStore, InMemoryOrderStore};
pub use postgres::{PostgresCatalogStore, PostgresOrderStore};
pub use reaper::spawn_ttl_reaper;
pub use store::{CatalogStore, OrderStore, UpsertOutcome};
