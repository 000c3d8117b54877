use domain::CatalogError;
use thiserror::Error;

use crate::OrderId;

/// Errors that can occur when interacting with the order or catalog store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// An order with this business key already exists.
    #[error("Order already exists: {0}")]
    DuplicateOrder(OrderId),

    /// The backend refused or could not serve the request.
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// A stored row could not be mapped back into the domain.
    #[error("Corrupt record for {key}: {reason}")]
    Corrupt { key: String, reason: String },

    /// A catalog item failed validation before being stored.
    #[error("Invalid catalog item: {0}")]
    InvalidItem(#[from] CatalogError),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
