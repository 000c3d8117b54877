//! Domain layer for the checkout system.
//!
//! This crate holds the pure parts of checkout, with no I/O:
//! - Catalog and cart types
//! - The pricing engine that turns a cart into a priced quote
//! - The order entity and its payment-status precedence rules

pub mod cart;
pub mod catalog;
pub mod error;
pub mod order;
pub mod pricing;

pub use cart::{CartLine, CustomerDetails, PostalAddress};
pub use catalog::{CatalogItem, SizeOption};
pub use error::{CatalogError, PricingError};
pub use order::{
    ItemId, Money, Order, OrderOrigin, OrderPatch, OrderStatus, PatchOutcome, PaymentSignal,
    RepricePatch,
};
pub use pricing::{PricedLine, PurchaseQuote, price_cart, to_major_units};
