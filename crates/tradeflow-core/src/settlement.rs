//! # Settlement
//!
//! Payment status derivation and balance bookkeeping shared by sales orders
//! and purchase orders.
//!
//! ## Status Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   paid = 0            0 < paid < total         paid ≥ total             │
//! │  ┌────────┐  payment  ┌───────────────┐ payment ┌──────┐                │
//! │  │ Unpaid │ ────────► │ PartiallyPaid │ ──────► │ Paid │                │
//! │  └────────┘           └───────────────┘         └──────┘                │
//! │                                                                         │
//! │  Refunded is only ever set explicitly; it is never derived.            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use ts_rs::TS;

use crate::error::{CoreError, CoreResult};
use crate::money::Money;

// =============================================================================
// Payment Status
// =============================================================================

/// Payment state of an order, purchase order or invoice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    #[default]
    Unpaid,
    PartiallyPaid,
    Paid,
    Refunded,
}

impl PaymentStatus {
    /// Derives the status from a document total and the amount paid so far.
    ///
    /// A zero-total document counts as paid.
    ///
    /// ## Example
    /// ```rust
    /// use tradeflow_core::money::Money;
    /// use tradeflow_core::settlement::PaymentStatus;
    ///
    /// let total = Money::from_cents(10_000);
    /// assert_eq!(PaymentStatus::derive(total, Money::zero()), PaymentStatus::Unpaid);
    /// assert_eq!(PaymentStatus::derive(total, Money::from_cents(4_000)), PaymentStatus::PartiallyPaid);
    /// assert_eq!(PaymentStatus::derive(total, total), PaymentStatus::Paid);
    /// ```
    pub fn derive(total: Money, paid: Money) -> Self {
        if paid >= total {
            PaymentStatus::Paid
        } else if !paid.is_positive() {
            PaymentStatus::Unpaid
        } else {
            PaymentStatus::PartiallyPaid
        }
    }

    /// Stored/serialized name.
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Unpaid => "unpaid",
            PaymentStatus::PartiallyPaid => "partially_paid",
            PaymentStatus::Paid => "paid",
            PaymentStatus::Refunded => "refunded",
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Balance
// =============================================================================

/// Total, paid and outstanding amounts of a payable document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Balance {
    pub total: Money,
    pub paid: Money,
    /// max(total − paid, 0)
    pub due: Money,
}

impl Balance {
    /// Builds a balance from the document total and what has been paid.
    pub fn new(total: Money, paid: Money) -> Self {
        Balance {
            total,
            paid,
            due: total.saturating_sub_to_zero(paid),
        }
    }

    /// Payment status implied by this balance.
    pub fn status(&self) -> PaymentStatus {
        PaymentStatus::derive(self.total, self.paid)
    }

    /// Whether nothing remains to be paid.
    pub fn is_settled(&self) -> bool {
        self.due.is_zero()
    }

    /// Applies a payment and returns the resulting balance.
    ///
    /// ## Errors
    /// - `InvalidPaymentAmount` when amount ≤ 0
    /// - `AlreadyPaid` when nothing is due
    /// - `Overpayment` when amount > due
    ///
    /// ## Example
    /// ```rust
    /// use tradeflow_core::money::Money;
    /// use tradeflow_core::settlement::{Balance, PaymentStatus};
    ///
    /// let balance = Balance::new(Money::from_cents(5_000), Money::zero());
    /// let after = balance.apply(Money::from_cents(2_000)).unwrap();
    /// assert_eq!(after.due.cents(), 3_000);
    /// assert_eq!(after.status(), PaymentStatus::PartiallyPaid);
    ///
    /// assert!(after.apply(Money::from_cents(3_001)).is_err());
    /// ```
    pub fn apply(&self, amount: Money) -> CoreResult<Balance> {
        if !amount.is_positive() {
            return Err(CoreError::InvalidPaymentAmount {
                reason: "amount must be greater than zero".to_string(),
            });
        }
        if self.is_settled() {
            return Err(CoreError::AlreadyPaid);
        }
        if amount > self.due {
            return Err(CoreError::Overpayment {
                amount: amount.to_string(),
                due: self.due.to_string(),
            });
        }
        Ok(Balance::new(self.total, self.paid + amount))
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
