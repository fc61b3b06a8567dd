//! Sales orders, invoices, payments and deliveries.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use ts_rs::TS;

use crate::error::CoreResult;
use crate::money::{Money, TaxRate};
use crate::pricing::{price_line, LineInput, OrderAdjustments, PricedLine};
use crate::settlement::{Balance, PaymentStatus};
use crate::types::NewLineItem;

// =============================================================================
// Order Status
// =============================================================================

/// Fulfilment status of a sales order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[default]
    Pending,
    Confirmed,
    Processing,
    Shipped,
    InTransit,
    Delivered,
    Cancelled,
    Returned,
    Failed,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::Processing => "processing",
            OrderStatus::Shipped => "shipped",
            OrderStatus::InTransit => "in_transit",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
            OrderStatus::Returned => "returned",
            OrderStatus::Failed => "failed",
        }
    }

    /// Orders can only be deleted before anything left the warehouse.
    pub fn can_delete(&self) -> bool {
        matches!(self, OrderStatus::Pending | OrderStatus::Cancelled)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Sales Order
// =============================================================================

/// A customer order with its stored totals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct SalesOrder {
    pub id: String,
    /// `ORD-...`, unique.
    pub order_number: String,
    pub customer_id: String,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    #[ts(as = "String")]
    pub order_date: NaiveDate,
    #[ts(as = "Option<String>")]
    pub expected_delivery_date: Option<NaiveDate>,
    pub shipping_address: Option<String>,
    /// Σ line totals (after line discounts, before tax).
    pub subtotal_cents: i64,
    pub item_tax_cents: i64,
    pub order_tax_bps: u32,
    pub order_tax_cents: i64,
    /// item tax + order tax
    pub tax_cents: i64,
    pub order_discount_cents: i64,
    /// line discounts + order discount
    pub discount_cents: i64,
    pub total_cents: i64,
    pub notes: Option<String>,
    pub created_by: Option<String>,
    #[ts(as = "Option<String>")]
    pub delivered_at: Option<DateTime<Utc>>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl SalesOrder {
    #[inline]
    pub fn total(&self) -> Money {
        Money::from_cents(self.total_cents)
    }

    /// The order-level tax rate and discount used when totals were computed.
    pub fn adjustments(&self) -> OrderAdjustments {
        OrderAdjustments {
            tax_rate: TaxRate::from_bps(self.order_tax_bps),
            discount: Money::from_cents(self.order_discount_cents),
        }
    }
}

/// A priced line of a sales order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct SalesOrderItem {
    pub id: String,
    pub order_id: String,
    pub product_id: String,
    pub quantity: i64,
    pub unit_price_cents: i64,
    pub discount_cents: i64,
    pub tax_bps: u32,
    /// quantity × unit price − discount
    pub line_total_cents: i64,
    pub tax_cents: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl SalesOrderItem {
    /// Prices the stored quantity, unit price, discount and tax rate afresh.
    ///
    /// Stored `line_total_cents` and `tax_cents` are ignored, so the result
    /// shows what the line should hold.
    pub fn reprice(&self) -> CoreResult<PricedLine> {
        price_line(&LineInput {
            product_id: self.product_id.clone(),
            quantity: self.quantity,
            unit_price: Money::from_cents(self.unit_price_cents),
            discount: Money::from_cents(self.discount_cents),
            tax_rate: TaxRate::from_bps(self.tax_bps),
        })
    }

    /// True when the stored line total or tax differs from `priced`.
    pub fn differs_from(&self, priced: &PricedLine) -> bool {
        self.line_total_cents != priced.line_total.cents() || self.tax_cents != priced.tax.cents()
    }
}

/// Input for creating a sales order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewSalesOrder {
    pub customer_id: String,
    /// Defaults to today.
    #[ts(as = "Option<String>")]
    pub order_date: Option<NaiveDate>,
    #[ts(as = "Option<String>")]
    pub expected_delivery_date: Option<NaiveDate>,
    /// Defaults to the customer's address.
    pub shipping_address: Option<String>,
    #[serde(default)]
    pub order_tax_bps: u32,
    #[serde(default)]
    pub order_discount_cents: i64,
    pub notes: Option<String>,
    pub items: Vec<NewLineItem>,
}

/// A sales order with its items and payment balance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SalesOrderDetail {
    pub order: SalesOrder,
    pub items: Vec<SalesOrderItem>,
    pub balance: Balance,
}

/// Filters for listing sales orders.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SalesOrderFilter {
    pub status: Option<OrderStatus>,
    pub payment_status: Option<PaymentStatus>,
    pub customer_id: Option<String>,
    /// Matches order number or customer name.
    pub search: Option<String>,
}

// =============================================================================
// Invoice
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    #[default]
    Draft,
    Sent,
    Paid,
    Overdue,
    Cancelled,
}

impl InvoiceStatus {
    /// Open invoices still expect money.
    pub fn is_open(&self) -> bool {
        !matches!(self, InvoiceStatus::Paid | InvoiceStatus::Cancelled)
    }
}

/// An invoice raised against a sales order. One per order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Invoice {
    pub id: String,
    /// `INV-...`, unique.
    pub invoice_number: String,
    pub order_id: String,
    pub customer_id: String,
    #[ts(as = "String")]
    pub invoice_date: NaiveDate,
    #[ts(as = "Option<String>")]
    pub due_date: Option<NaiveDate>,
    pub status: InvoiceStatus,
    pub total_cents: i64,
    pub notes: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

/// An invoice with what has been paid against its order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct InvoiceWithBalance {
    pub invoice: Invoice,
    pub balance: Balance,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct InvoiceFilter {
    pub status: Option<InvoiceStatus>,
    pub customer_id: Option<String>,
    /// Only invoices that are neither paid nor cancelled.
    #[serde(default)]
    pub unpaid_only: bool,
}

// =============================================================================
// Payment
// =============================================================================

/// How money was moved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    #[default]
    Cash,
    CreditCard,
    DebitCard,
    BankTransfer,
    Cheque,
    Online,
    Other,
}

/// Processing state of a single payment record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PaymentRecordStatus {
    Pending,
    #[default]
    Completed,
    Failed,
    Refunded,
}

/// Money received against a sales order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Payment {
    pub id: String,
    /// Caller-supplied reference or a generated `REC-...`.
    pub reference_number: String,
    pub order_id: String,
    pub invoice_id: Option<String>,
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

impl Payment {
    #[inline]
    pub fn amount(&self) -> Money {
        Money::from_cents(self.amount_cents)
    }
}

/// Input for recording a customer payment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewPayment {
    pub order_id: String,
    /// Resolved from the order's invoice when omitted.
    pub invoice_id: Option<String>,
    pub amount_cents: i64,
    #[ts(as = "Option<String>")]
    pub payment_date: Option<NaiveDate>,
    #[serde(default)]
    pub payment_method: PaymentMethod,
    pub reference_number: Option<String>,
    pub notes: Option<String>,
}

// =============================================================================
// Delivery
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    #[default]
    Pending,
    Confirmed,
    InTransit,
    Delivered,
    Cancelled,
    Failed,
    Returned,
}

impl DeliveryStatus {
    /// Order status implied by a delivery update, if any.
    pub fn order_status(&self) -> Option<OrderStatus> {
        match self {
            DeliveryStatus::Delivered => Some(OrderStatus::Delivered),
            DeliveryStatus::InTransit => Some(OrderStatus::Shipped),
            _ => None,
        }
    }
}

/// A shipment of a sales order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Delivery {
    pub id: String,
    /// `DEL-...`, unique.
    pub delivery_number: String,
    pub order_id: String,
    #[ts(as = "Option<String>")]
    pub delivery_date: Option<NaiveDate>,
    pub delivery_address: Option<String>,
    pub carrier: Option<String>,
    pub tracking_number: Option<String>,
    pub status: DeliveryStatus,
    pub notes: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

/// Input for recording a delivery.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewDelivery {
    #[ts(as = "Option<String>")]
    pub delivery_date: Option<NaiveDate>,
    /// Defaults to the order's shipping address.
    pub delivery_address: Option<String>,
    pub carrier: Option<String>,
    pub tracking_number: Option<String>,
    #[serde(default)]
    pub status: DeliveryStatus,
    pub notes: Option<String>,
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_status_names() {
        assert_eq!(OrderStatus::InTransit.to_string(), "in_transit");
        let json = serde_json::to_string(&OrderStatus::InTransit).unwrap();
        assert_eq!(json, "\"in_transit\"");
    }

    #[test]
    fn test_can_delete() {
        assert!(OrderStatus::Pending.can_delete());
        assert!(OrderStatus::Cancelled.can_delete());
        assert!(!OrderStatus::Shipped.can_delete());
        assert!(!OrderStatus::Delivered.can_delete());
    }

    #[test]
    fn test_delivery_drives_order_status() {
        assert_eq!(DeliveryStatus::Delivered.order_status(), Some(OrderStatus::Delivered));
        assert_eq!(DeliveryStatus::InTransit.order_status(), Some(OrderStatus::Shipped));
        assert_eq!(DeliveryStatus::Pending.order_status(), None);
    }

    #[test]
    fn test_invoice_open() {
        assert!(InvoiceStatus::Draft.is_open());
        assert!(InvoiceStatus::Overdue.is_open());
        assert!(!InvoiceStatus::Paid.is_open());
        assert!(!InvoiceStatus::Cancelled.is_open());
    }

    #[test]
    fn test_item_reprice_ignores_stored_amounts() {
        let mut item = SalesOrderItem {
            id: "i".to_string(),
            order_id: "o".to_string(),
            product_id: "p".to_string(),
            quantity: 3,
            unit_price_cents: 1250,
            discount_cents: 250,
            tax_bps: 825,
            line_total_cents: 3500,
            tax_cents: 289,
            created_at: Utc::now(),
        };
        let line = item.reprice().unwrap();
        assert_eq!(line.gross.cents(), 3750);
        assert_eq!(line.line_total.cents(), 3500);
        assert_eq!(line.tax.cents(), 289);
        assert!(!item.differs_from(&line));

        item.line_total_cents = 3000;
        assert!(item.differs_from(&item.reprice().unwrap()));
        assert_eq!(item.reprice().unwrap().line_total.cents(), 3500);

        item.quantity = 0;
        assert!(item.reprice().is_err());
    }
}
