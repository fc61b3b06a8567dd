//! # Money Module
//!
//! Provides the `Money` and `TaxRate` types for handling monetary values
//! and percentages safely.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │  In floating point:                                                     │
//! │    0.1 + 0.2 = 0.30000000000000004  ❌ WRONG!                           │
//! │                                                                         │
//! │  Order lines are stored as DECIMAL(10,2) amounts. We keep them as      │
//! │  integer cents end to end:                                              │
//! │    "12.50" ──parse──► 1250 cents ──price──► 1250 cents ──► "12.50"      │
//! │                                                                         │
//! │  Percentages are basis points: 8.25% = 825 bps                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use tradeflow_core::money::{Money, TaxRate};
//!
//! let price: Money = "12.50".parse().unwrap();
//! let line = price * 3; // 37.50
//! let tax = line.percent_of(TaxRate::from_bps(1000)); // 10%
//! assert_eq!(tax.cents(), 375);
//! assert_eq!(tax.to_string(), "3.75");
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign};
use std::str::FromStr;
use ts_rs::TS;

use crate::error::ValidationError;

/// Basis points in 100%.
pub const BPS_PER_WHOLE: u32 = 10_000;

// =============================================================================
// Money Type
// =============================================================================

/// Represents a monetary value in the smallest currency unit (cents).
///
/// ## Design Decisions
/// - **i64 (signed)**: Negative values appear for credits and adjustments
/// - **Single field tuple struct**: Zero-cost abstraction over i64
/// - **Serializes as the integer cent count**
///
/// ## Where Money is Used
/// ```text
/// ┌─────────────────────────────────────────────────────────────────────────┐
/// │  Product.price_cents ──► LineInput.unit_price ──► PricedLine.line_total │
/// │                                                        │                │
/// │                                     OrderTotals.subtotal ◄┘             │
/// │                                            │                            │
/// │           OrderTotals.total ──► Invoice.total ──► Balance.due           │
/// └─────────────────────────────────────────────────────────────────────────┘
/// ```
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize, TS,
)]
#[ts(export)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from cents (the smallest currency unit).
    ///
    /// ## Example
    /// ```rust
    /// use tradeflow_core::money::Money;
    ///
    /// let price = Money::from_cents(1099); // 10.99
    /// assert_eq!(price.cents(), 1099);
    /// ```
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    /// Returns the value in cents (smallest currency unit).
    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    /// Returns the major unit portion (truncated toward zero).
    #[inline]
    pub const fn major(&self) -> i64 {
        self.0 / 100
    }

    /// Returns the minor unit portion (always 0-99).
    #[inline]
    pub const fn minor(&self) -> i64 {
        (self.0 % 100).abs()
    }

    /// Returns zero money value.
    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    /// Checks if the value is zero.
    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Checks if the value is positive (greater than zero).
    #[inline]
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }

    /// Checks if the value is negative (less than zero).
    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Returns the absolute value.
    #[inline]
    pub const fn abs(&self) -> Self {
        Money(self.0.abs())
    }

    /// Applies a percentage to this amount, rounding half away from zero.
    ///
    /// ## Rounding
    /// ```text
    /// 10.00 × 8.25% = 0.825  → 0.83
    /// -10.00 × 8.25% = -0.825 → -0.83
    /// 0.10 × 5% = 0.005      → 0.01
    /// ```
    ///
    /// The product is computed in i128 so large line totals cannot overflow
    /// before the division.
    ///
    /// ## Example
    /// ```rust
    /// use tradeflow_core::money::{Money, TaxRate};
    ///
    /// let tax = Money::from_cents(1000).percent_of(TaxRate::from_bps(825));
    /// assert_eq!(tax.cents(), 83);
    /// ```
    pub fn percent_of(&self, rate: TaxRate) -> Money {
        let product = self.0 as i128 * rate.bps() as i128;
        Money::from_cents(round_half_away(product, BPS_PER_WHOLE as i128) as i64)
    }

    /// Multiplies money by a quantity.
    #[inline]
    pub const fn multiply_quantity(&self, qty: i64) -> Self {
        Money(self.0 * qty)
    }

    /// Multiplies money by a quantity, returning `None` on overflow.
    #[inline]
    pub fn checked_mul_quantity(&self, qty: i64) -> Option<Self> {
        self.0.checked_mul(qty).map(Money)
    }

    /// Adds two amounts, returning `None` on overflow.
    #[inline]
    pub fn checked_add(&self, other: Money) -> Option<Self> {
        self.0.checked_add(other.0).map(Money)
    }

    /// Subtracts, clamping the result at zero.
    ///
    /// Used for outstanding balances, which never go negative.
    #[inline]
    pub fn saturating_sub_to_zero(&self, other: Money) -> Self {
        Money((self.0 - other.0).max(0))
    }
}

/// Integer division of `n` by `d` (d > 0) rounding half away from zero.
fn round_half_away(n: i128, d: i128) -> i128 {
    let half = d / 2;
    if n >= 0 {
        (n + half) / d
    } else {
        (n - half) / d
    }
}

// =============================================================================
// Money Trait Implementations
// =============================================================================

/// Plain two-decimal rendering, e.g. `12.50` or `-3.05`.
///
/// Currency symbols and locale formatting belong to the presentation layer.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(f, "{}{}.{:02}", sign, self.major().abs(), self.minor())
    }
}

/// Parses decimal strings such as `"12.50"`, `"-3"`, `"0.5"`.
///
/// At most two fractional digits are accepted; anything finer than a cent
/// is rejected rather than silently rounded.
impl FromStr for Money {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let cents = parse_fixed_2(s.trim(), "amount")?;
        Ok(Money(cents))
    }
}

impl Add for Money {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Money(self.0 + other.0)
    }
}

impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 += other.0;
    }
}

impl Sub for Money {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Money(self.0 - other.0)
    }
}

impl SubAssign for Money {
    #[inline]
    fn sub_assign(&mut self, other: Self) {
        self.0 -= other.0;
    }
}

impl Neg for Money {
    type Output = Self;

    #[inline]
    fn neg(self) -> Self {
        Money(-self.0)
    }
}

/// Multiplication by quantity.
impl Mul<i64> for Money {
    type Output = Self;

    #[inline]
    fn mul(self, qty: i64) -> Self {
        Money(self.0 * qty)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + m)
    }
}

impl<'a> Sum<&'a Money> for Money {
    fn sum<I: Iterator<Item = &'a Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + *m)
    }
}

// =============================================================================
// Tax Rate
// =============================================================================

/// A percentage represented in basis points (bps).
///
/// Used for tax rates and percentage discounts alike.
///
/// ## Why Basis Points?
/// 1 basis point = 0.01% = 1/10000
/// 825 bps = 8.25%
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TaxRate(u32);

impl TaxRate {
    /// Creates a tax rate from basis points.
    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        TaxRate(bps)
    }

    /// Creates a tax rate from a percentage (for convenience in seeds and tests).
    pub fn from_percentage(pct: f64) -> Self {
        TaxRate((pct * 100.0).round().max(0.0) as u32)
    }

    /// Returns the rate in basis points.
    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }

    /// Returns the rate as a percentage (for display only).
    #[inline]
    pub fn percentage(&self) -> f64 {
        self.0 as f64 / 100.0
    }

    /// Zero tax rate.
    #[inline]
    pub const fn zero() -> Self {
        TaxRate(0)
    }

    /// Checks if tax rate is zero.
    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Whether the rate exceeds 100%.
    #[inline]
    pub const fn exceeds_whole(&self) -> bool {
        self.0 > BPS_PER_WHOLE
    }
}

impl fmt::Display for TaxRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}%", self.0 / 100, self.0 % 100)
    }
}

/// Parses percentages such as `"8.25"` or `"5"` (a trailing `%` is allowed).
impl FromStr for TaxRate {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let s = s.strip_suffix('%').unwrap_or(s).trim_end();
        let bps = parse_fixed_2(s, "percentage")?;
        if bps < 0 {
            return Err(ValidationError::MustNotBeNegative {
                field: "percentage".to_string(),
            });
        }
        let bps = u32::try_from(bps).map_err(|_| ValidationError::OutOfRange {
            field: "percentage".to_string(),
            min: 0,
            max: BPS_PER_WHOLE as i64,
        })?;
        Ok(TaxRate(bps))
    }
}

/// Parses a decimal with at most two fractional digits into hundredths.
fn parse_fixed_2(s: &str, field: &str) -> Result<i64, ValidationError> {
    let invalid = |reason: &str| ValidationError::InvalidFormat {
        field: field.to_string(),
        reason: reason.to_string(),
    };

    let (negative, digits) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s.strip_prefix('+').unwrap_or(s)),
    };

    let (whole, frac) = match digits.split_once('.') {
        Some((w, f)) => (w, f),
        None => (digits, ""),
    };

    if whole.is_empty() && frac.is_empty() {
        return Err(invalid("expected a decimal number"));
    }
    if !whole.chars().all(|c| c.is_ascii_digit()) || !frac.chars().all(|c| c.is_ascii_digit()) {
        return Err(invalid("expected a decimal number"));
    }
    if frac.len() > 2 {
        return Err(invalid("at most two decimal places are allowed"));
    }

    let whole_val: i64 = if whole.is_empty() {
        0
    } else {
        whole.parse().map_err(|_| invalid("number is too large"))?
    };
    let frac_val: i64 = match frac.len() {
        0 => 0,
        1 => frac.parse::<i64>().map_err(|_| invalid("expected a decimal number"))? * 10,
        _ => frac.parse().map_err(|_| invalid("expected a decimal number"))?,
    };

    let value = whole_val
        .checked_mul(100)
        .and_then(|v| v.checked_add(frac_val))
        .ok_or_else(|| invalid("number is too large"))?;

    Ok(if negative { -value } else { value })
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_cents() {
        let money = Money::from_cents(1099);
        assert_eq!(money.cents(), 1099);
        assert_eq!(money.major(), 10);
        assert_eq!(money.minor(), 99);
    }

    #[test]
    fn test_display() {
        assert_eq!(Money::from_cents(1099).to_string(), "10.99");
        assert_eq!(Money::from_cents(500).to_string(), "5.00");
        assert_eq!(Money::from_cents(-550).to_string(), "-5.50");
        assert_eq!(Money::from_cents(-5).to_string(), "-0.05");
        assert_eq!(Money::from_cents(0).to_string(), "0.00");
    }

    #[test]
    fn test_parse() {
        assert_eq!("12.50".parse::<Money>().unwrap().cents(), 1250);
        assert_eq!("12.5".parse::<Money>().unwrap().cents(), 1250);
        assert_eq!("-3".parse::<Money>().unwrap().cents(), -300);
        assert_eq!("0.05".parse::<Money>().unwrap().cents(), 5);
        assert_eq!(".5".parse::<Money>().unwrap().cents(), 50);
        assert_eq!(" 7 ".parse::<Money>().unwrap().cents(), 700);

        assert!("".parse::<Money>().is_err());
        assert!("abc".parse::<Money>().is_err());
        assert!("1.234".parse::<Money>().is_err());
        assert!("1.2.3".parse::<Money>().is_err());
        assert!("99999999999999999999".parse::<Money>().is_err());
    }

    #[test]
    fn test_arithmetic() {
        let a = Money::from_cents(1000);
        let b = Money::from_cents(500);

        assert_eq!((a + b).cents(), 1500);
        assert_eq!((a - b).cents(), 500);
        assert_eq!((a * 3).cents(), 3000);
        assert_eq!((-a).cents(), -1000);

        let total: Money = [a, b, b].iter().sum();
        assert_eq!(total.cents(), 2000);
    }

    #[test]
    fn test_percent_of_rounds_half_away_from_zero() {
        let rate = TaxRate::from_bps(825);
        assert_eq!(Money::from_cents(1000).percent_of(rate).cents(), 83);
        assert_eq!(Money::from_cents(-1000).percent_of(rate).cents(), -83);

        // 0.10 × 5% = 0.005 → 0.01
        assert_eq!(Money::from_cents(10).percent_of(TaxRate::from_bps(500)).cents(), 1);
        // 0.10 × 4% = 0.004 → 0.00
        assert_eq!(Money::from_cents(10).percent_of(TaxRate::from_bps(400)).cents(), 0);
    }

    #[test]
    fn test_percent_of_large_amount_does_not_overflow() {
        let big = Money::from_cents(i64::MAX / 2);
        let tax = big.percent_of(TaxRate::from_bps(10_000));
        assert_eq!(tax, big);
    }

    #[test]
    fn test_checked_ops() {
        assert!(Money::from_cents(i64::MAX).checked_mul_quantity(2).is_none());
        assert!(Money::from_cents(i64::MAX).checked_add(Money::from_cents(1)).is_none());
        assert_eq!(
            Money::from_cents(300).checked_mul_quantity(4),
            Some(Money::from_cents(1200))
        );
    }

    #[test]
    fn test_saturating_sub_to_zero() {
        let due = Money::from_cents(500).saturating_sub_to_zero(Money::from_cents(800));
        assert!(due.is_zero());
    }

    #[test]
    fn test_tax_rate_parse_and_display() {
        assert_eq!("8.25".parse::<TaxRate>().unwrap().bps(), 825);
        assert_eq!("5".parse::<TaxRate>().unwrap().bps(), 500);
        assert_eq!("12.5%".parse::<TaxRate>().unwrap().bps(), 1250);
        assert!("-1".parse::<TaxRate>().is_err());
        assert!("8.255".parse::<TaxRate>().is_err());

        assert_eq!(TaxRate::from_bps(825).to_string(), "8.25%");
        assert_eq!(TaxRate::from_bps(500).to_string(), "5.00%");
    }

    #[test]
    fn test_tax_rate_from_percentage() {
        let rate = TaxRate::from_percentage(8.25);
        assert_eq!(rate.bps(), 825);
        assert!((rate.percentage() - 8.25).abs() < 0.001);
        assert!(TaxRate::from_bps(10_001).exceeds_whole());
        assert!(!TaxRate::from_bps(10_000).exceeds_whole());
    }
}
