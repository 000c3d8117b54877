//! Catalog types, read-only to checkout.

use serde::{Deserialize, Serialize};

use crate::error::CatalogError;
use crate::order::{ItemId, Money};

/// One size an item is sold in, with its unit cost.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SizeOption {
    /// Size label as shown in the storefront (e.g. "M").
    pub label: String,

    /// Unit cost in minor units.
    pub cost: Money,
}

impl SizeOption {
    pub fn new(label: impl Into<String>, cost: Money) -> Self {
        Self {
            label: label.into(),
            cost,
        }
    }
}

/// A storefront item as stored in the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogItem {
    pub id: ItemId,
    pub name: String,
    #[serde(default)]
    pub image: Option<String>,
    /// Only published items are listed in the storefront. Pricing still
    /// resolves unpublished items so in-flight carts keep working.
    #[serde(default)]
    pub published: bool,
    pub sizes: Vec<SizeOption>,
}

impl CatalogItem {
    /// Creates a published item with no sizes.
    pub fn new(id: impl Into<ItemId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            image: None,
            published: true,
            sizes: Vec::new(),
        }
    }

    /// Adds a size option.
    pub fn with_size(mut self, label: impl Into<String>, cost: Money) -> Self {
        self.sizes.push(SizeOption::new(label, cost));
        self
    }

    /// Sets the published flag.
    pub fn published(mut self, published: bool) -> Self {
        self.published = published;
        self
    }

    /// Looks up a size by label.
    pub fn size(&self, label: &str) -> Option<&SizeOption> {
        self.sizes.iter().find(|s| s.label == label)
    }

    /// Checks that every size label is unique and no cost is negative.
    pub fn validate(&self) -> Result<(), CatalogError> {
        for (i, size) in self.sizes.iter().enumerate() {
            if size.cost.is_negative() {
                return Err(CatalogError::NegativeCost {
                    item_id: self.id.clone(),
                    size: size.label.clone(),
                });
            }
            if self.sizes[..i].iter().any(|s| s.label == size.label) {
                return Err(CatalogError::DuplicateSize {
                    item_id: self.id.clone(),
                    size: size.label.clone(),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_size_lookup() {
        let item = CatalogItem::new("A", "Tee")
            .with_size("S", Money::from_minor(900))
            .with_size("M", Money::from_minor(1000));

        assert_eq!(item.size("M").unwrap().cost, Money::from_minor(1000));
        assert!(item.size("XL").is_none());
    }

    #[test]
    fn test_validate_rejects_duplicate_size() {
        let item = CatalogItem::new("A", "Tee")
            .with_size("M", Money::from_minor(1000))
            .with_size("M", Money::from_minor(1200));

        assert_eq!(
            item.validate(),
            Err(CatalogError::DuplicateSize {
                item_id: ItemId::new("A"),
                size: "M".to_string(),
            })
        );
    }

    #[test]
    fn test_validate_rejects_negative_cost() {
        let item = CatalogItem::new("A", "Tee").with_size("M", Money::from_minor(-1));
        assert!(matches!(
            item.validate(),
            Err(CatalogError::NegativeCost { .. })
        ));
    }

    #[test]
    fn test_deserialize_defaults() {
        let item: CatalogItem = serde_json::from_value(serde_json::json!({
            "id": "A",
            "name": "Tee",
            "sizes": [{ "label": "M", "cost": 1000 }]
        }))
        .unwrap();

        assert!(!item.published);
        assert!(item.image.is_none());
        assert!(item.validate().is_ok());
    }
}
