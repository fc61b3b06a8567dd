//! # Pricing Pipeline
//!
//! Line-item and order totals for sales and purchase orders.
//!
//! ## The Fold
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Order Pricing                                   │
//! │                                                                         │
//! │  LineInput ──► price_line ──► PricedLine                                │
//! │    qty, unit_price, discount, tax_rate                                  │
//! │                                                                         │
//! │    gross      = qty × unit_price                                        │
//! │    line_total = gross − discount                                        │
//! │    tax        = line_total × tax_rate        (rounded per line)         │
//! │                                                                         │
//! │  [PricedLine] + OrderAdjustments ──► recompute_totals ──► OrderTotals   │
//! │                                                                         │
//! │    subtotal   = Σ line_total                                            │
//! │    item_tax   = Σ tax                                                   │
//! │    order_tax  = subtotal × order_tax_rate    (rounded once)             │
//! │    tax        = item_tax + order_tax                                    │
//! │    discount   = Σ line discount + order_discount                        │
//! │    total      = subtotal + tax − order_discount                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Lines keep their input order. Nothing here touches stock or the database;
//! callers price first, then persist the result.
//!
//! ## Example
//! ```rust
//! use tradeflow_core::money::{Money, TaxRate};
//! use tradeflow_core::pricing::{price_order, LineInput, OrderAdjustments};
//!
//! let lines = vec![LineInput {
//!     product_id: "p-1".to_string(),
//!     quantity: 2,
//!     unit_price: Money::from_cents(5000),
//!     discount: Money::from_cents(1000),
//!     tax_rate: TaxRate::from_bps(1000),
//! }];
//!
//! let order = price_order(&lines, OrderAdjustments::default()).unwrap();
//! assert_eq!(order.totals.subtotal.cents(), 9000);
//! assert_eq!(order.totals.tax.cents(), 900);
//! assert_eq!(order.totals.total.cents(), 9900);
//! ```

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::{Money, TaxRate};
use crate::validation::{validate_percentage, validate_quantity};
use crate::MAX_ORDER_LINES;

// =============================================================================
// Inputs
// =============================================================================

/// One line of an order before pricing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineInput {
    pub product_id: String,
    pub quantity: i64,
    pub unit_price: Money,
    /// Absolute discount on the whole line (not per unit).
    pub discount: Money,
    pub tax_rate: TaxRate,
}

/// Order-level tax and discount applied after the line fold.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct OrderAdjustments {
    /// Tax applied on the order subtotal, on top of item taxes.
    pub tax_rate: TaxRate,
    /// Absolute discount taken off the order total.
    pub discount: Money,
}

// =============================================================================
// Outputs
// =============================================================================

/// A line after pricing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PricedLine {
    pub product_id: String,
    pub quantity: i64,
    pub unit_price: Money,
    pub discount: Money,
    pub tax_rate: TaxRate,
    /// quantity × unit_price
    pub gross: Money,
    /// gross − discount
    pub line_total: Money,
    /// line_total × tax_rate
    pub tax: Money,
}

impl PricedLine {
    /// Line total including its own tax.
    #[inline]
    pub fn total_with_tax(&self) -> Money {
        self.line_total + self.tax
    }
}

/// Aggregated totals for an order or purchase order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct OrderTotals {
    /// Σ quantity × unit_price
    pub gross: Money,
    /// Σ line discounts
    pub line_discount: Money,
    /// Order-level discount
    pub order_discount: Money,
    /// line_discount + order_discount
    pub discount: Money,
    /// Σ line_total (after line discounts, before tax)
    pub subtotal: Money,
    /// Σ line tax
    pub item_tax: Money,
    /// subtotal × order tax rate
    pub order_tax: Money,
    /// item_tax + order_tax
    pub tax: Money,
    /// subtotal + tax − order_discount
    pub total: Money,
}

/// Priced lines together with their totals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PricedOrder {
    pub lines: Vec<PricedLine>,
    pub totals: OrderTotals,
}

// =============================================================================
// Operations
// =============================================================================

/// Prices a single line.
///
/// ## Errors
/// - quantity ≤ 0 or above the per-line maximum
/// - negative unit price or negative discount
/// - discount larger than quantity × unit price
/// - tax rate above 100%
pub fn price_line(input: &LineInput) -> CoreResult<PricedLine> {
    validate_quantity(input.quantity)?;

    if input.unit_price.is_negative() {
        return Err(ValidationError::MustNotBeNegative {
            field: "unit_price".to_string(),
        }
        .into());
    }
    if input.discount.is_negative() {
        return Err(ValidationError::MustNotBeNegative {
            field: "discount".to_string(),
        }
        .into());
    }
    validate_percentage("tax_rate", input.tax_rate)?;

    let gross = input
        .unit_price
        .checked_mul_quantity(input.quantity)
        .ok_or_else(|| CoreError::AmountOverflow("line gross".to_string()))?;

    if input.discount > gross {
        return Err(CoreError::DiscountTooLarge {
            target: "line amount".to_string(),
            discount: input.discount.to_string(),
            amount: gross.to_string(),
        });
    }

    let line_total = gross - input.discount;
    let tax = line_total.percent_of(input.tax_rate);

    Ok(PricedLine {
        product_id: input.product_id.clone(),
        quantity: input.quantity,
        unit_price: input.unit_price,
        discount: input.discount,
        tax_rate: input.tax_rate,
        gross,
        line_total,
        tax,
    })
}

/// Prices every line and folds them into order totals.
///
/// ## Errors
/// - empty line list
/// - any line error from [`price_line`]
/// - order discount negative or larger than the subtotal
/// - order tax rate above 100%
pub fn price_order(lines: &[LineInput], adjustments: OrderAdjustments) -> CoreResult<PricedOrder> {
    if lines.is_empty() {
        return Err(CoreError::EmptyOrder);
    }
    if lines.len() > MAX_ORDER_LINES {
        return Err(CoreError::TooManyLines {
            max: MAX_ORDER_LINES,
        });
    }

    let priced = lines
        .iter()
        .map(price_line)
        .collect::<CoreResult<Vec<_>>>()?;

    let totals = recompute_totals(&priced, adjustments)?;

    Ok(PricedOrder {
        lines: priced,
        totals,
    })
}

/// Folds already-priced lines into order totals.
///
/// Line amounts are taken as stored; only the aggregation and the
/// order-level adjustments are computed here. The maintenance pass uses this
/// to check persisted orders against their own items.
pub fn recompute_totals(lines: &[PricedLine], adjustments: OrderAdjustments) -> CoreResult<OrderTotals> {
    if lines.is_empty() {
        return Err(CoreError::EmptyOrder);
    }
    if adjustments.discount.is_negative() {
        return Err(ValidationError::MustNotBeNegative {
            field: "order discount".to_string(),
        }
        .into());
    }
    validate_percentage("order tax_rate", adjustments.tax_rate)?;

    let overflow = || CoreError::AmountOverflow("order totals".to_string());

    let mut totals = OrderTotals::default();
    for line in lines {
        totals.gross = totals.gross.checked_add(line.gross).ok_or_else(overflow)?;
        totals.line_discount = totals
            .line_discount
            .checked_add(line.discount)
            .ok_or_else(overflow)?;
        totals.subtotal = totals
            .subtotal
            .checked_add(line.line_total)
            .ok_or_else(overflow)?;
        totals.item_tax = totals.item_tax.checked_add(line.tax).ok_or_else(overflow)?;
    }

    if adjustments.discount > totals.subtotal {
        return Err(CoreError::DiscountTooLarge {
            target: "order subtotal".to_string(),
            discount: adjustments.discount.to_string(),
            amount: totals.subtotal.to_string(),
        });
    }

    totals.order_discount = adjustments.discount;
    totals.discount = totals.line_discount + totals.order_discount;
    totals.order_tax = totals.subtotal.percent_of(adjustments.tax_rate);
    totals.tax = totals.item_tax + totals.order_tax;
    totals.total = totals
        .subtotal
        .checked_add(totals.tax)
        .ok_or_else(overflow)?
        - totals.order_discount;

    Ok(totals)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn line(product: &str, qty: i64, price: i64, discount: i64, tax_bps: u32) -> LineInput {
        LineInput {
            product_id: product.to_string(),
            quantity: qty,
            unit_price: Money::from_cents(price),
            discount: Money::from_cents(discount),
            tax_rate: TaxRate::from_bps(tax_bps),
        }
    }

    #[test]
    fn test_price_line_formula() {
        // 3 × 12.50 = 37.50, − 2.50 = 35.00, 8.25% tax = 2.8875 → 2.89
        let priced = price_line(&line("p", 3, 1250, 250, 825)).unwrap();
        assert_eq!(priced.gross.cents(), 3750);
        assert_eq!(priced.line_total.cents(), 3500);
        assert_eq!(priced.tax.cents(), 289);
        assert_eq!(priced.total_with_tax().cents(), 3789);
    }

    #[test]
    fn test_price_line_rejects_bad_input() {
        assert!(price_line(&line("p", 0, 100, 0, 0)).is_err());
        assert!(price_line(&line("p", -2, 100, 0, 0)).is_err());
        assert!(price_line(&line("p", 1, -100, 0, 0)).is_err());
        assert!(price_line(&line("p", 1, 100, -1, 0)).is_err());
        assert!(price_line(&line("p", 1, 100, 0, 10_001)).is_err());

        let err = price_line(&line("p", 2, 100, 201, 0)).unwrap_err();
        assert!(matches!(err, CoreError::DiscountTooLarge { .. }));
    }

    #[test]
    fn test_full_discount_yields_zero_line() {
        let priced = price_line(&line("p", 2, 100, 200, 1000)).unwrap();
        assert!(priced.line_total.is_zero());
        assert!(priced.tax.is_zero());
    }

    #[test]
    fn test_free_line_is_allowed() {
        let priced = price_line(&line("sample", 5, 0, 0, 1000)).unwrap();
        assert!(priced.line_total.is_zero());
    }

    #[test]
    fn test_price_order_totals() {
        let lines = vec![
            line("a", 2, 5000, 1000, 1000), // 90.00 + 9.00 tax
            line("b", 1, 2000, 0, 500),     // 20.00 + 1.00 tax
        ];
        let adjustments = OrderAdjustments {
            tax_rate: TaxRate::from_bps(200), // 2% of 110.00 = 2.20
            discount: Money::from_cents(500),
        };

        let order = price_order(&lines, adjustments).unwrap();
        let t = order.totals;
        assert_eq!(t.gross.cents(), 12000);
        assert_eq!(t.line_discount.cents(), 1000);
        assert_eq!(t.order_discount.cents(), 500);
        assert_eq!(t.discount.cents(), 1500);
        assert_eq!(t.subtotal.cents(), 11000);
        assert_eq!(t.item_tax.cents(), 1000);
        assert_eq!(t.order_tax.cents(), 220);
        assert_eq!(t.tax.cents(), 1220);
        assert_eq!(t.total.cents(), 11000 + 1220 - 500);
    }

    #[test]
    fn test_price_order_preserves_line_order() {
        let lines = vec![line("z", 1, 100, 0, 0), line("a", 1, 100, 0, 0), line("m", 1, 100, 0, 0)];
        let order = price_order(&lines, OrderAdjustments::default()).unwrap();
        let ids: Vec<_> = order.lines.iter().map(|l| l.product_id.as_str()).collect();
        assert_eq!(ids, ["z", "a", "m"]);
    }

    #[test]
    fn test_price_order_rejects_empty() {
        let err = price_order(&[], OrderAdjustments::default()).unwrap_err();
        assert!(matches!(err, CoreError::EmptyOrder));
    }

    #[test]
    fn test_order_discount_cannot_exceed_subtotal() {
        let lines = vec![line("a", 1, 1000, 0, 2000)];
        let adjustments = OrderAdjustments {
            tax_rate: TaxRate::zero(),
            discount: Money::from_cents(1001),
        };
        let err = price_order(&lines, adjustments).unwrap_err();
        assert!(matches!(err, CoreError::DiscountTooLarge { .. }));

        // Equal to the subtotal is fine: only tax remains.
        let adjustments = OrderAdjustments {
            tax_rate: TaxRate::zero(),
            discount: Money::from_cents(1000),
        };
        let order = price_order(&lines, adjustments).unwrap();
        assert_eq!(order.totals.total.cents(), 200);
    }

    #[test]
    fn test_rounding_is_per_line_not_per_order() {
        // Each 0.10 line at 5% is 0.005 → 0.01; three lines give 0.03 where
        // one rounding on 0.30 would give 0.02.
        let lines = vec![line("a", 1, 10, 0, 500), line("b", 1, 10, 0, 500), line("c", 1, 10, 0, 500)];
        let order = price_order(&lines, OrderAdjustments::default()).unwrap();
        assert_eq!(order.totals.item_tax.cents(), 3);
    }

    #[test]
    fn test_recompute_matches_price_order() {
        let lines = vec![line("a", 4, 999, 100, 825), line("b", 7, 1234, 0, 1300)];
        let adjustments = OrderAdjustments {
            tax_rate: TaxRate::from_bps(150),
            discount: Money::from_cents(250),
        };
        let order = price_order(&lines, adjustments).unwrap();
        let again = recompute_totals(&order.lines, adjustments).unwrap();
        assert_eq!(order.totals, again);
    }

    #[test]
    fn test_line_overflow_is_reported() {
        let err = price_line(&line("a", 999_999, i64::MAX / 10, 0, 0)).unwrap_err();
        assert!(matches!(err, CoreError::AmountOverflow(_)));
    }
}
