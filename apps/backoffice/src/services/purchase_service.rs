//! Purchase service.
//!
//! Purchase orders are priced with the same pipeline as sales orders, from
//! product cost and purchase tax. Stock only moves when goods are received
//! with a completed receipt.

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use serde::Serialize;
use tracing::{debug, info};
use uuid::Uuid;

use super::{clean, line_input, load_line_products, today};
use crate::error::{ServiceError, ServiceResult};
use crate::AppState;
use tradeflow_core::pricing::price_order;
use tradeflow_core::validation::{
    validate_amount_cents, validate_date_range, validate_payment_amount, validate_percentage,
    validate_search_query, validate_uuid,
};
use tradeflow_core::{
    Balance, CoreError, Money, NewPurchaseOrder, NewPurchasePayment, NewReceipt, OrderAdjustments,
    Page, PageRequest, PaymentRecordStatus, PaymentStatus, PurchaseInvoice, PurchaseInvoiceStatus,
    PurchaseOrder, PurchaseOrderDetail, PurchaseOrderFilter, PurchaseOrderItem,
    PurchaseOrderStatus, PurchaseOrderSummary, PurchasePayment, PurchaseReceipt, TaxRate,
};
use tradeflow_db::document_number;

/// A stored supplier payment and the purchase order balance after it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordedPurchasePayment {
    pub payment: PurchasePayment,
    pub balance: Balance,
    pub payment_status: PaymentStatus,
}

/// Purchase service implementation.
#[derive(Debug, Clone)]
pub struct PurchaseService {
    state: Arc<AppState>,
}

impl PurchaseService {
    /// Create a new purchase service.
    pub fn new(state: Arc<AppState>) -> Self {
        PurchaseService { state }
    }

    // =========================================================================
    // Purchase Orders
    // =========================================================================

    /// Prices and stores a purchase order. Lines default to the product's
    /// cost and purchase tax rate.
    pub async fn create_order(
        &self,
        input: NewPurchaseOrder,
        user: Option<&str>,
    ) -> ServiceResult<PurchaseOrderDetail> {
        debug!(supplier_id = %input.supplier_id, lines = input.items.len(), "create_purchase_order");
        validate_uuid("supplier_id", &input.supplier_id)?;

        let db = &self.state.db;
        let supplier = db
            .suppliers()
            .get_by_id(&input.supplier_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Supplier", &input.supplier_id))?;
        if !supplier.is_active {
            return Err(CoreError::invalid_state("Supplier", "inactive", "receive orders").into());
        }

        validate_amount_cents("order_discount", input.order_discount_cents)?;
        validate_percentage("order_tax", TaxRate::from_bps(input.order_tax_bps))?;
        let order_date = input.order_date.unwrap_or_else(today);
        if let Some(expected) = input.expected_date {
            validate_date_range("expected_date", order_date, expected)?;
        }

        let products = load_line_products(db, &input.items).await?;
        let lines: Vec<_> = input
            .items
            .iter()
            .zip(&products)
            .map(|(item, product)| line_input(item, product.cost(), product.purchase_tax()))
            .collect();
        let priced = price_order(
            &lines,
            OrderAdjustments {
                tax_rate: TaxRate::from_bps(input.order_tax_bps),
                discount: Money::from_cents(input.order_discount_cents),
            },
        )?;

        let totals = priced.totals;
        let now = Utc::now();
        let order = PurchaseOrder {
            id: Uuid::new_v4().to_string(),
            po_number: document_number("PO"),
            supplier_id: supplier.id.clone(),
            status: PurchaseOrderStatus::Pending,
            payment_status: PaymentStatus::derive(totals.total, Money::zero()),
            order_date,
            expected_date: input.expected_date,
            subtotal_cents: totals.subtotal.cents(),
            item_tax_cents: totals.item_tax.cents(),
            order_tax_bps: input.order_tax_bps,
            order_tax_cents: totals.order_tax.cents(),
            tax_cents: totals.tax.cents(),
            order_discount_cents: totals.order_discount.cents(),
            discount_cents: totals.discount.cents(),
            total_cents: totals.total.cents(),
            notes: clean(input.notes),
            created_by: user.map(str::to_string),
            received_at: None,
            created_at: now,
            updated_at: now,
        };

        let items: Vec<PurchaseOrderItem> = priced
            .lines
            .iter()
            .map(|line| PurchaseOrderItem {
                id: Uuid::new_v4().to_string(),
                purchase_order_id: order.id.clone(),
                product_id: line.product_id.clone(),
                quantity: line.quantity,
                unit_cost_cents: line.unit_price.cents(),
                discount_cents: line.discount.cents(),
                tax_bps: line.tax_rate.bps(),
                line_total_cents: line.line_total.cents(),
                tax_cents: line.tax.cents(),
                created_at: now,
            })
            .collect();

        db.purchases().create_order(&order, &items).await?;
        info!(
            po_id = %order.id,
            po_number = %order.po_number,
            supplier = %supplier.code,
            total = %totals.total,
            "Purchase order created"
        );

        Ok(PurchaseOrderDetail {
            balance: Balance::new(order.total(), Money::zero()),
            order,
            items,
        })
    }

    pub async fn get_order(&self, id: &str) -> ServiceResult<PurchaseOrderDetail> {
        let order = self.find_order(id).await?;
        let items = self.state.db.purchases().get_items(id).await?;
        let paid = self.state.db.purchases().total_paid(id).await?;

        Ok(PurchaseOrderDetail {
            balance: Balance::new(order.total(), paid),
            order,
            items,
        })
    }

    /// Lists purchase orders with supplier name and balance.
    pub async fn list_orders(
        &self,
        mut filter: PurchaseOrderFilter,
        page: PageRequest,
    ) -> ServiceResult<Page<PurchaseOrderSummary>> {
        filter.search = match filter.search.as_deref() {
            Some(term) => validate_search_query(term)?,
            None => None,
        };

        let page = self
            .state
            .db
            .purchases()
            .list_orders(&filter, self.state.page(page))
            .await?;
        Ok(page)
    }

    /// Sets a PO status by hand. Receiving is done through
    /// [`PurchaseService::receive_goods`] so stock follows.
    pub async fn update_status(&self, id: &str, status: PurchaseOrderStatus) -> ServiceResult<()> {
        if matches!(status, PurchaseOrderStatus::Received | PurchaseOrderStatus::Partial) {
            return Err(ServiceError::validation(
                "Use a goods receipt to mark a purchase order received",
            ));
        }

        let order = self.find_order(id).await?;
        if order.status == PurchaseOrderStatus::Received {
            return Err(CoreError::invalid_state("Purchase order", "received", "change status").into());
        }

        self.state.db.purchases().update_status(id, status).await?;
        info!(po_id = %id, from = %order.status, to = %status, "Purchase order status updated");
        Ok(())
    }

    pub async fn delete_order(&self, id: &str) -> ServiceResult<()> {
        self.state.db.purchases().delete_order(id).await?;
        info!(po_id = %id, "Purchase order deleted");
        Ok(())
    }

    // =========================================================================
    // Supplier Invoices
    // =========================================================================

    /// Books the supplier's invoice for a purchase order.
    pub async fn create_invoice(
        &self,
        po_id: &str,
        due_date: Option<NaiveDate>,
        notes: Option<String>,
    ) -> ServiceResult<PurchaseInvoice> {
        let order = self.find_order(po_id).await?;
        if order.status == PurchaseOrderStatus::Cancelled {
            return Err(CoreError::invalid_state("Purchase order", "cancelled", "be invoiced").into());
        }

        let invoice_date = today();
        if let Some(due) = due_date {
            validate_date_range("due_date", invoice_date, due)?;
        }

        let now = Utc::now();
        let invoice = PurchaseInvoice {
            id: Uuid::new_v4().to_string(),
            invoice_number: document_number("PINV"),
            purchase_order_id: order.id.clone(),
            supplier_id: order.supplier_id.clone(),
            invoice_date,
            due_date,
            status: if order.payment_status == PaymentStatus::Paid {
                PurchaseInvoiceStatus::Paid
            } else {
                PurchaseInvoiceStatus::Received
            },
            total_cents: order.total_cents,
            notes: clean(notes),
            created_at: now,
            updated_at: now,
        };

        self.state.db.purchases().create_invoice(&invoice).await?;
        info!(invoice_id = %invoice.id, number = %invoice.invoice_number, po_id = %order.id, "Purchase invoice created");

        Ok(invoice)
    }

    // =========================================================================
    // Supplier Payments
    // =========================================================================

    /// Records a payment to a supplier. Reference defaults to `PAY-…`.
    ///
    /// ## Errors
    /// * `PaymentError` - non-positive amount, overpayment, already paid
    /// * `ValidationError` - invoice of another purchase order
    pub async fn record_payment(
        &self,
        input: NewPurchasePayment,
        user: Option<&str>,
    ) -> ServiceResult<RecordedPurchasePayment> {
        validate_payment_amount(input.amount_cents).map_err(|e| {
            ServiceError::from(CoreError::InvalidPaymentAmount {
                reason: e.to_string(),
            })
        })?;

        let order = self.find_order(&input.purchase_order_id).await?;
        if order.status == PurchaseOrderStatus::Cancelled {
            return Err(CoreError::invalid_state("Purchase order", "cancelled", "take payments").into());
        }

        let repo = self.state.db.purchases();
        let invoice_id = match input.purchase_invoice_id {
            Some(invoice_id) => {
                let invoice = repo
                    .get_invoice(&invoice_id)
                    .await?
                    .ok_or_else(|| ServiceError::not_found("Purchase invoice", &invoice_id))?;
                if invoice.purchase_order_id != order.id {
                    return Err(ServiceError::validation(format!(
                        "Invoice {} does not belong to purchase order {}",
                        invoice.invoice_number, order.po_number
                    )));
                }
                Some(invoice.id)
            }
            None => repo
                .get_invoice_by_order(&order.id)
                .await?
                .map(|invoice| invoice.id),
        };

        let payment = PurchasePayment {
            id: Uuid::new_v4().to_string(),
            reference_number: clean(input.reference_number)
                .unwrap_or_else(|| document_number("PAY")),
            purchase_order_id: order.id.clone(),
            purchase_invoice_id: invoice_id,
            amount_cents: input.amount_cents,
            payment_date: input.payment_date.unwrap_or_else(today),
            payment_method: input.payment_method,
            status: PaymentRecordStatus::Completed,
            notes: clean(input.notes),
            created_by: user.map(str::to_string),
            created_at: Utc::now(),
        };

        let balance = repo.record_payment(&payment).await?;

        Ok(RecordedPurchasePayment {
            payment_status: balance.status(),
            payment,
            balance,
        })
    }

    pub async fn list_payments(&self, po_id: &str) -> ServiceResult<Vec<PurchasePayment>> {
        self.find_order(po_id).await?;
        Ok(self.state.db.purchases().list_payments(po_id).await?)
    }

    // =========================================================================
    // Goods Receipts
    // =========================================================================

    /// Records a goods receipt note. A completed receipt books every
    /// stocked line into stock and marks the PO received.
    pub async fn receive_goods(
        &self,
        po_id: &str,
        input: NewReceipt,
        user: Option<&str>,
    ) -> ServiceResult<PurchaseReceipt> {
        let receipt = PurchaseReceipt {
            id: Uuid::new_v4().to_string(),
            receipt_number: document_number("GRN"),
            purchase_order_id: po_id.to_string(),
            receipt_date: input.receipt_date.unwrap_or_else(today),
            status: input.status,
            notes: clean(input.notes),
            received_by: user.map(str::to_string),
            created_at: Utc::now(),
        };

        self.state.db.purchases().receive_goods(&receipt).await?;
        info!(po_id = %po_id, receipt = %receipt.receipt_number, status = ?receipt.status, "Goods receipt recorded");

        Ok(receipt)
    }

    pub async fn list_receipts(&self, po_id: &str) -> ServiceResult<Vec<PurchaseReceipt>> {
        self.find_order(po_id).await?;
        Ok(self.state.db.purchases().list_receipts(po_id).await?)
    }

    async fn find_order(&self, id: &str) -> ServiceResult<PurchaseOrder> {
        self.state
            .db
            .purchases()
            .get_order(id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Purchase order", id))
    }
}
