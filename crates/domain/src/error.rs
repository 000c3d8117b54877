//! Domain error types.

use thiserror::Error;

use crate::order::ItemId;

/// Errors raised while pricing a cart against the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PricingError {
    /// The cart has no lines.
    #[error("Cart has no items")]
    EmptyCart,

    /// A cart line asked for zero units.
    #[error("Invalid quantity for item {item_id}: must be greater than 0")]
    InvalidQuantity { item_id: ItemId },

    /// A cart line references an item the catalog does not know.
    #[error("Unknown item: {item_id}")]
    UnknownItem { item_id: ItemId },

    /// A cart line references a size the item is not sold in.
    #[error("Unknown size '{size}' for item {item_id}")]
    UnknownSize { item_id: ItemId, size: String },

    /// The total does not fit in the money representation.
    #[error("Cost overflow while pricing item {item_id}")]
    Overflow { item_id: ItemId },
}

/// Errors raised when a catalog item is malformed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CatalogError {
    /// The same size label appears more than once on an item.
    #[error("Duplicate size '{size}' on item {item_id}")]
    DuplicateSize { item_id: ItemId, size: String },

    /// A size is priced below zero.
    #[error("Negative cost for size '{size}' on item {item_id}")]
    NegativeCost { item_id: ItemId, size: String },
}
