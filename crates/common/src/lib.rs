//! Shared identifier types for the checkout system.

mod types;

pub use types::{OrderId, ParseOrderIdError};
