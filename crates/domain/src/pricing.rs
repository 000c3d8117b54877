//! Pricing engine: turns an untrusted cart into a priced quote.
//!
//! Pure and deterministic. The same cart and catalog snapshot always yield
//! the same quote, and costs come exclusively from the catalog.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::cart::CartLine;
use crate::catalog::CatalogItem;
use crate::error::PricingError;
use crate::order::{ItemId, Money};

/// Number of decimal places between minor and major units of the
/// settlement currency.
pub const MINOR_UNIT_SCALE: u32 = 2;

/// A cart line enriched with catalog data and its cost.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PricedLine {
    pub item_id: ItemId,
    pub size: String,
    pub quantity: u32,
    #[serde(default)]
    pub image: Option<String>,
    pub name: String,
    pub unit_cost: Money,
    /// `unit_cost * quantity`.
    pub line_cost: Money,
}

/// The priced result of a cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseQuote {
    pub items: Vec<PricedLine>,
    /// Total in minor units; this is what the processor is asked to charge.
    pub total: Money,
}

impl PurchaseQuote {
    /// Total in major units, as stored on the order for display.
    pub fn total_major(&self) -> Decimal {
        to_major_units(self.total)
    }
}

/// Converts minor units to major units of the settlement currency.
///
/// This is the only place that knows how minor and major units relate.
pub fn to_major_units(money: Money) -> Decimal {
    Decimal::new(money.minor_units(), MINOR_UNIT_SCALE)
}

/// Prices a cart against a catalog snapshot.
///
/// Fails on the first line that cannot be priced; nothing partial is
/// returned.
pub fn price_cart(
    cart: &[CartLine],
    catalog: &[CatalogItem],
) -> Result<PurchaseQuote, PricingError> {
    if cart.is_empty() {
        return Err(PricingError::EmptyCart);
    }

    let mut items = Vec::with_capacity(cart.len());
    let mut total = Money::zero();

    for line in cart {
        if line.quantity == 0 {
            return Err(PricingError::InvalidQuantity {
                item_id: line.item_id.clone(),
            });
        }

        let item = catalog
            .iter()
            .find(|item| item.id == line.item_id)
            .ok_or_else(|| PricingError::UnknownItem {
                item_id: line.item_id.clone(),
            })?;

        let size = item
            .size(&line.size)
            .ok_or_else(|| PricingError::UnknownSize {
                item_id: line.item_id.clone(),
                size: line.size.clone(),
            })?;

        let overflow = || PricingError::Overflow {
            item_id: line.item_id.clone(),
        };
        let line_cost = size.cost.checked_multiply(line.quantity).ok_or_else(overflow)?;
        total = total.checked_add(line_cost).ok_or_else(overflow)?;

        items.push(PricedLine {
            item_id: line.item_id.clone(),
            size: line.size.clone(),
            quantity: line.quantity,
            image: line.image.clone(),
            name: item.name.clone(),
            unit_cost: size.cost,
            line_cost,
        });
    }

    Ok(PurchaseQuote { items, total })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> Vec<CatalogItem> {
        vec![
            CatalogItem::new("A", "Classic Tee")
                .with_size("S", Money::from_minor(900))
                .with_size("M", Money::from_minor(1000)),
            CatalogItem::new("B", "Hoodie").with_size("L", Money::from_minor(4550)),
        ]
    }

    #[test]
    fn test_single_line_quote() {
        let quote = price_cart(&[CartLine::new("A", "M", 2)], &catalog()).unwrap();

        assert_eq!(quote.total, Money::from_minor(2000));
        assert_eq!(quote.items.len(), 1);
        assert_eq!(quote.items[0].name, "Classic Tee");
        assert_eq!(quote.items[0].unit_cost, Money::from_minor(1000));
        assert_eq!(quote.items[0].line_cost, Money::from_minor(2000));
    }

    #[test]
    fn test_total_is_sum_of_lines() {
        let cart = vec![
            CartLine::new("A", "S", 3),
            CartLine::new("B", "L", 1),
            CartLine::new("A", "M", 1),
        ];
        let quote = price_cart(&cart, &catalog()).unwrap();

        let sum: i64 = quote.items.iter().map(|l| l.line_cost.minor_units()).sum();
        assert_eq!(quote.total.minor_units(), sum);
        assert_eq!(quote.total, Money::from_minor(900 * 3 + 4550 + 1000));
    }

    #[test]
    fn test_total_major_units() {
        let quote = price_cart(&[CartLine::new("B", "L", 1)], &catalog()).unwrap();
        assert_eq!(quote.total_major().to_string(), "45.50");
    }

    #[test]
    fn test_deterministic_regardless_of_catalog_order() {
        let cart = vec![CartLine::new("A", "M", 2), CartLine::new("B", "L", 1)];
        let mut reversed = catalog();
        reversed.reverse();

        assert_eq!(
            price_cart(&cart, &catalog()).unwrap(),
            price_cart(&cart, &reversed).unwrap()
        );
    }

    #[test]
    fn test_image_reference_is_carried() {
        let mut line = CartLine::new("A", "M", 1);
        line.image = Some("tee.png".to_string());

        let quote = price_cart(&[line], &catalog()).unwrap();
        assert_eq!(quote.items[0].image.as_deref(), Some("tee.png"));
    }

    #[test]
    fn test_unknown_item() {
        let err = price_cart(&[CartLine::new("Z", "M", 1)], &catalog()).unwrap_err();
        assert_eq!(
            err,
            PricingError::UnknownItem {
                item_id: ItemId::new("Z")
            }
        );
    }

    #[test]
    fn test_unknown_size() {
        let err = price_cart(&[CartLine::new("A", "XL", 1)], &catalog()).unwrap_err();
        assert!(matches!(err, PricingError::UnknownSize { size, .. } if size == "XL"));
    }

    #[test]
    fn test_zero_quantity_rejected() {
        let err = price_cart(&[CartLine::new("A", "M", 0)], &catalog()).unwrap_err();
        assert!(matches!(err, PricingError::InvalidQuantity { .. }));
    }

    #[test]
    fn test_empty_cart_rejected() {
        assert_eq!(price_cart(&[], &catalog()), Err(PricingError::EmptyCart));
    }

    #[test]
    fn test_overflow_is_reported() {
        let catalog = vec![CatalogItem::new("X", "Gold").with_size("M", Money::from_minor(i64::MAX))];
        let err = price_cart(&[CartLine::new("X", "M", 2)], &catalog).unwrap_err();
        assert!(matches!(err, PricingError::Overflow { .. }));
    }
}
