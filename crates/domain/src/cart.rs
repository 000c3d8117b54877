//! Client-submitted cart types.
//!
//! Everything here comes from the browser and is untrusted. In particular a
//! cart line carries no cost: any cost-like fields the client sends are
//! dropped during deserialization and prices always come from the catalog.

use serde::{Deserialize, Serialize};

use crate::order::ItemId;

/// One line of a cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    #[serde(alias = "UUID", alias = "itemID")]
    pub item_id: ItemId,

    /// Size label, matched against the catalog item's sizes.
    pub size: String,

    #[serde(alias = "amount")]
    pub quantity: u32,

    #[serde(default)]
    pub image: Option<String>,
}

impl CartLine {
    pub fn new(item_id: impl Into<ItemId>, size: impl Into<String>, quantity: u32) -> Self {
        Self {
            item_id: item_id.into(),
            size: size.into(),
            quantity,
            image: None,
        }
    }
}

/// Contact and delivery details entered at checkout.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerDetails {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub address: Option<PostalAddress>,
}

impl CustomerDetails {
    /// Returns true when no contact field is set.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PostalAddress {
    pub line1: String,
    pub line2: Option<String>,
    pub city: String,
    pub postal_code: String,
    pub country: String,
}
