//! Purchase orders, purchase invoices, supplier payments and goods receipts.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use ts_rs::TS;

use crate::money::{Money, TaxRate};
use crate::pricing::OrderAdjustments;
use crate::settlement::{Balance, PaymentStatus};
use crate::types::{NewLineItem, PaymentMethod, PaymentRecordStatus};

// =============================================================================
// Purchase Order Status
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PurchaseOrderStatus {
    #[default]
    Pending,
    Approved,
    Ordered,
    /// Some goods received.
    Partial,
    /// All goods received and stocked.
    Received,
    Cancelled,
}

impl PurchaseOrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PurchaseOrderStatus::Pending => "pending",
            PurchaseOrderStatus::Approved => "approved",
            PurchaseOrderStatus::Ordered => "ordered",
            PurchaseOrderStatus::Partial => "partial",
            PurchaseOrderStatus::Received => "received",
            PurchaseOrderStatus::Cancelled => "cancelled",
        }
    }

    /// Whether goods can still be booked into stock.
    pub fn can_receive(&self) -> bool {
        !matches!(
            self,
            PurchaseOrderStatus::Received | PurchaseOrderStatus::Cancelled
        )
    }
}

impl fmt::Display for PurchaseOrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Purchase Order
// =============================================================================

/// An order placed with a supplier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct PurchaseOrder {
    pub id: String,
    /// `PO-...`, unique.
    pub po_number: String,
    pub supplier_id: String,
    pub status: PurchaseOrderStatus,
    pub payment_status: PaymentStatus,
    #[ts(as = "String")]
    pub order_date: NaiveDate,
    #[ts(as = "Option<String>")]
    pub expected_date: Option<NaiveDate>,
    pub subtotal_cents: i64,
    pub item_tax_cents: i64,
    pub order_tax_bps: u32,
    pub order_tax_cents: i64,
    pub tax_cents: i64,
    pub order_discount_cents: i64,
    pub discount_cents: i64,
    pub total_cents: i64,
    pub notes: Option<String>,
    pub created_by: Option<String>,
    #[ts(as = "Option<String>")]
    pub received_at: Option<DateTime<Utc>>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl PurchaseOrder {
    #[inline]
    pub fn total(&self) -> Money {
        Money::from_cents(self.total_cents)
    }

    pub fn adjustments(&self) -> OrderAdjustments {
        OrderAdjustments {
            tax_rate: TaxRate::from_bps(self.order_tax_bps),
            discount: Money::from_cents(self.order_discount_cents),
        }
    }
}

/// A priced line of a purchase order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct PurchaseOrderItem {
    pub id: String,
    pub purchase_order_id: String,
    pub product_id: String,
    pub quantity: i64,
    pub unit_cost_cents: i64,
    pub discount_cents: i64,
    /// Snapshot of the purchase tax applied to this line.
    pub tax_bps: u32,
    pub line_total_cents: i64,
    pub tax_cents: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

/// Input for creating a purchase order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewPurchaseOrder {
    pub supplier_id: String,
    #[ts(as = "Option<String>")]
    pub order_date: Option<NaiveDate>,
    #[ts(as = "Option<String>")]
    pub expected_date: Option<NaiveDate>,
    #[serde(default)]
    pub order_tax_bps: u32,
    #[serde(default)]
    pub order_discount_cents: i64,
    pub notes: Option<String>,
    /// `unit_price_cents` is the unit cost; defaults to the product cost.
    pub items: Vec<NewLineItem>,
}

/// A purchase order with its items and payment balance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PurchaseOrderDetail {
    pub order: PurchaseOrder,
    pub items: Vec<PurchaseOrderItem>,
    pub balance: Balance,
}

/// A purchase order row in a listing, with paid and due amounts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PurchaseOrderSummary {
    pub order: PurchaseOrder,
    pub supplier_name: String,
    pub balance: Balance,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PurchaseOrderFilter {
    pub status: Option<PurchaseOrderStatus>,
    pub supplier_id: Option<String>,
    /// Matches PO number or supplier name.
    pub search: Option<String>,
}

// =============================================================================
// Purchase Invoice
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PurchaseInvoiceStatus {
    #[default]
    Draft,
    Received,
    Paid,
    Overdue,
    Cancelled,
}

/// A supplier's invoice for a purchase order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct PurchaseInvoice {
    pub id: String,
    /// `PINV-...`, unique.
    pub invoice_number: String,
    pub purchase_order_id: String,
    pub supplier_id: String,
    #[ts(as = "String")]
    pub invoice_date: NaiveDate,
    #[ts(as = "Option<String>")]
    pub due_date: Option<NaiveDate>,
    pub status: PurchaseInvoiceStatus,
    pub total_cents: i64,
    pub notes: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// Purchase Payment
// =============================================================================

/// Money paid to a supplier against a purchase order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct PurchasePayment {
    pub id: String,
    /// Caller-supplied reference or a generated `PAY-...`.
    pub reference_number: String,
    pub purchase_order_id: String,
    pub purchase_invoice_id: Option<String>,
    pub amount_cents: i64,
    #[ts(as = "String")]
    pub payment_date: NaiveDate,
    pub payment_method: PaymentMethod,
    pub status: PaymentRecordStatus,
    pub notes: Option<String>,
    pub created_by: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewPurchasePayment {
    pub purchase_order_id: String,
    pub purchase_invoice_id: Option<String>,
    pub amount_cents: i64,
    #[ts(as = "Option<String>")]
    pub payment_date: Option<NaiveDate>,
    #[serde(default)]
    pub payment_method: PaymentMethod,
    pub reference_number: Option<String>,
    pub notes: Option<String>,
}

// =============================================================================
// Goods Receipt
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum ReceiptStatus {
    Pending,
    Partial,
    #[default]
    Completed,
    Rejected,
}

/// A goods receipt note for a purchase order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct PurchaseReceipt {
    pub id: String,
    /// `GRN-...`, unique.
    pub receipt_number: String,
    pub purchase_order_id: String,
    #[ts(as = "String")]
    pub receipt_date: NaiveDate,
    pub status: ReceiptStatus,
    pub notes: Option<String>,
    pub received_by: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewReceipt {
    #[ts(as = "Option<String>")]
    pub receipt_date: Option<NaiveDate>,
    #[serde(default)]
    pub status: ReceiptStatus,
    pub notes: Option<String>,
}

impl ReceiptStatus {
    /// Purchase order status implied by a receipt, if any.
    pub fn order_status(&self) -> Option<PurchaseOrderStatus> {
        match self {
            ReceiptStatus::Completed => Some(PurchaseOrderStatus::Received),
            ReceiptStatus::Partial => Some(PurchaseOrderStatus::Partial),
            ReceiptStatus::Pending | ReceiptStatus::Rejected => None,
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_receipt_drives_po_status() {
        assert_eq!(
            ReceiptStatus::Completed.order_status(),
            Some(PurchaseOrderStatus::Received)
        );
        assert_eq!(
            ReceiptStatus::Partial.order_status(),
            Some(PurchaseOrderStatus::Partial)
        );
        assert_eq!(ReceiptStatus::Rejected.order_status(), None);
    }

    #[test]
    fn test_can_receive() {
        assert!(PurchaseOrderStatus::Ordered.can_receive());
        assert!(PurchaseOrderStatus::Partial.can_receive());
        assert!(!PurchaseOrderStatus::Received.can_receive());
        assert!(!PurchaseOrderStatus::Cancelled.can_receive());
    }
}
