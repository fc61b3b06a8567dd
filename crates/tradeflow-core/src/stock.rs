//! # Stock Rules
//!
//! Movement sign conventions, requirement aggregation and availability
//! checks used before any stock is decremented.
//!
//! ## Sign Convention
//! ```text
//! ┌──────────────┬──────────────┬──────────────────────────────────────────┐
//! │ MovementType │ Sign         │ Written by                               │
//! ├──────────────┼──────────────┼──────────────────────────────────────────┤
//! │ Purchase     │ + (in)       │ goods receipt on a purchase order        │
//! │ Sale         │ − (out)      │ sales order creation                     │
//! │ Return       │ + (in)       │ deleting/cancelling a sales order        │
//! │ Adjustment   │ as given     │ manual stock correction                  │
//! │ Transfer     │ as given     │ moves between locations                  │
//! └──────────────┴──────────────┴──────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use ts_rs::TS;

use crate::error::{CoreError, CoreResult};
use crate::types::Product;

// =============================================================================
// Movement Type
// =============================================================================

/// Why a product's stock changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum MovementType {
    Purchase,
    Sale,
    Adjustment,
    Return,
    Transfer,
}

impl MovementType {
    /// Applies the sign convention to a movement quantity.
    ///
    /// ## Example
    /// ```rust
    /// use tradeflow_core::stock::MovementType;
    ///
    /// assert_eq!(MovementType::Sale.signed_quantity(4), -4);
    /// assert_eq!(MovementType::Purchase.signed_quantity(4), 4);
    /// assert_eq!(MovementType::Adjustment.signed_quantity(-2), -2);
    /// ```
    pub fn signed_quantity(&self, quantity: i64) -> i64 {
        match self {
            MovementType::Purchase | MovementType::Return => quantity.abs(),
            MovementType::Sale => -quantity.abs(),
            MovementType::Adjustment | MovementType::Transfer => quantity,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MovementType::Purchase => "purchase",
            MovementType::Sale => "sale",
            MovementType::Adjustment => "adjustment",
            MovementType::Return => "return",
            MovementType::Transfer => "transfer",
        }
    }
}

impl fmt::Display for MovementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Requirements
// =============================================================================

/// Total quantity of one product needed by an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockRequirement {
    pub product_id: String,
    pub quantity: i64,
}

/// Merges lines of the same product into a single requirement.
///
/// Requirements come out in the order each product is first seen, so stock
/// rows are always touched in a deterministic order.
///
/// ## Example
/// ```rust
/// use tradeflow_core::stock::aggregate_requirements;
///
/// let reqs = aggregate_requirements([("a", 2), ("b", 1), ("a", 3)]);
/// assert_eq!(reqs.len(), 2);
/// assert_eq!(reqs[0].product_id, "a");
/// assert_eq!(reqs[0].quantity, 5);
/// ```
pub fn aggregate_requirements<'a, I>(lines: I) -> Vec<StockRequirement>
where
    I: IntoIterator<Item = (&'a str, i64)>,
{
    let mut requirements: Vec<StockRequirement> = Vec::new();
    for (product_id, quantity) in lines {
        match requirements.iter_mut().find(|r| r.product_id == product_id) {
            Some(existing) => existing.quantity += quantity,
            None => requirements.push(StockRequirement {
                product_id: product_id.to_string(),
                quantity,
            }),
        }
    }
    requirements
}

/// Checks that a product has at least `requested` units on hand.
///
/// Services load products outside the write transaction, so this is an
/// early rejection; the guarded decrement in the repository is what holds
/// under concurrent orders.
pub fn check_availability(product: &Product, requested: i64) -> CoreResult<()> {
    if product.stock_quantity < requested {
        return Err(CoreError::InsufficientStock {
            sku: product.sku.clone(),
            available: product.stock_quantity,
            requested,
        });
    }
    Ok(())
}

impl Product {
    /// Whether stock is at or below the product's minimum level.
    ///
    /// Products without a minimum level are never low.
    pub fn is_low_stock(&self) -> bool {
        self.min_stock_level
            .is_some_and(|min| self.stock_quantity <= min)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ProductType;
    use chrono::Utc;

    fn product(stock: i64, min: Option<i64>) -> Product {
        let now = Utc::now();
        Product {
            id: "p-1".to_string(),
            sku: "WIDGET-01".to_string(),
            barcode: None,
            name: "Widget".to_string(),
            description: None,
            product_type: ProductType::Standard,
            unit: None,
            category_id: None,
            price_cents: 1000,
            cost_cents: 600,
            sales_tax_bps: 0,
            purchase_tax_bps: 0,
            stock_quantity: stock,
            min_stock_level: min,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_signed_quantity() {
        assert_eq!(MovementType::Sale.signed_quantity(3), -3);
        assert_eq!(MovementType::Sale.signed_quantity(-3), -3);
        assert_eq!(MovementType::Return.signed_quantity(3), 3);
        assert_eq!(MovementType::Purchase.signed_quantity(-3), 3);
        assert_eq!(MovementType::Transfer.signed_quantity(-7), -7);
    }

    #[test]
    fn test_aggregate_keeps_first_seen_order() {
        let reqs = aggregate_requirements([("b", 1), ("a", 2), ("b", 4), ("c", 1), ("a", 1)]);
        let flat: Vec<_> = reqs.iter().map(|r| (r.product_id.as_str(), r.quantity)).collect();
        assert_eq!(flat, [("b", 5), ("a", 3), ("c", 1)]);
    }

    #[test]
    fn test_check_availability() {
        let p = product(6, None);
        assert!(check_availability(&p, 6).is_ok());

        let err = check_availability(&p, 8).unwrap_err();
        match err {
            CoreError::InsufficientStock {
                sku,
                available,
                requested,
            } => {
                assert_eq!(sku, "WIDGET-01");
                assert_eq!(available, 6);
                assert_eq!(requested, 8);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_low_stock() {
        assert!(product(5, Some(5)).is_low_stock());
        assert!(product(0, Some(1)).is_low_stock());
        assert!(!product(6, Some(5)).is_low_stock());
        assert!(!product(0, None).is_low_stock());
    }
}
