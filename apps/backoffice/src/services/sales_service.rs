//! Sales service.
//!
//! ## Create Order Flow
//! ```text
//! NewSalesOrder
//!      │
//!      ├── customer exists and is active
//!      ├── load products (line order), default price/tax from product
//!      ├── price_order ─► PricedOrder { lines, totals }
//!      ├── aggregate stock requirements (stocked products only)
//!      ├── early availability check
//!      ▼
//! SalesRepository::create_order (one transaction)
//!      order + items + guarded decrements + Sale movements + customer balance
//! ```

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{clean, line_input, load_line_products, today};
use crate::error::{ServiceError, ServiceResult};
use crate::AppState;
use tradeflow_core::pricing::price_order;
use tradeflow_core::stock::{aggregate_requirements, check_availability};
use tradeflow_core::validation::{
    validate_amount_cents, validate_date_range, validate_payment_amount, validate_percentage,
    validate_search_query, validate_uuid,
};
use tradeflow_core::{
    Balance, CoreError, Delivery, Invoice, InvoiceFilter, InvoiceStatus, InvoiceWithBalance, Money,
    NewDelivery, NewPayment, NewSalesOrder, OrderAdjustments, OrderStatus, Page, PageRequest,
    Payment, PaymentRecordStatus, PaymentStatus, SalesOrder, SalesOrderDetail, SalesOrderFilter,
    SalesOrderItem, TaxRate,
};
use tradeflow_db::document_number;

/// A stored payment and the order balance after it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordedPayment {
    pub payment: Payment,
    pub balance: Balance,
    pub payment_status: PaymentStatus,
}

/// Sales service implementation.
#[derive(Debug, Clone)]
pub struct SalesService {
    state: Arc<AppState>,
}

impl SalesService {
    /// Create a new sales service.
    pub fn new(state: Arc<AppState>) -> Self {
        SalesService { state }
    }

    // =========================================================================
    // Orders
    // =========================================================================

    /// Prices and stores a sales order, taking stock for every stocked line.
    ///
    /// ## Errors
    /// * `NotFound` - unknown customer or product
    /// * `ValidationError` - empty order, bad quantities, oversized discounts
    /// * `InsufficientStock` - nothing is written
    pub async fn create_order(
        &self,
        input: NewSalesOrder,
        user: Option<&str>,
    ) -> ServiceResult<SalesOrderDetail> {
        debug!(customer_id = %input.customer_id, lines = input.items.len(), "create_order");
        validate_uuid("customer_id", &input.customer_id)?;

        let db = &self.state.db;
        let customer = db
            .customers()
            .get_by_id(&input.customer_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Customer", &input.customer_id))?;
        if !customer.is_active {
            return Err(CoreError::invalid_state("Customer", "inactive", "place orders").into());
        }

        validate_amount_cents("order_discount", input.order_discount_cents)?;
        validate_percentage("order_tax", TaxRate::from_bps(input.order_tax_bps))?;
        let order_date = input.order_date.unwrap_or_else(today);
        if let Some(expected) = input.expected_delivery_date {
            validate_date_range("expected_delivery_date", order_date, expected)?;
        }

        let products = load_line_products(db, &input.items).await?;
        let lines: Vec<_> = input
            .items
            .iter()
            .zip(&products)
            .map(|(item, product)| line_input(item, product.price(), product.sales_tax()))
            .collect();
        let priced = price_order(
            &lines,
            OrderAdjustments {
                tax_rate: TaxRate::from_bps(input.order_tax_bps),
                discount: Money::from_cents(input.order_discount_cents),
            },
        )?;

        let requirements = aggregate_requirements(
            priced
                .lines
                .iter()
                .zip(&products)
                .filter(|(_, product)| product.product_type.tracks_stock())
                .map(|(line, _)| (line.product_id.as_str(), line.quantity)),
        );
        for requirement in &requirements {
            if let Some(product) = products.iter().find(|p| p.id == requirement.product_id) {
                check_availability(product, requirement.quantity)?;
            }
        }

        let totals = priced.totals;
        let now = Utc::now();
        let order = SalesOrder {
            id: Uuid::new_v4().to_string(),
            order_number: document_number("ORD"),
            customer_id: customer.id.clone(),
            status: OrderStatus::Pending,
            payment_status: PaymentStatus::derive(totals.total, Money::zero()),
            order_date,
            expected_delivery_date: input.expected_delivery_date,
            shipping_address: clean(input.shipping_address).or_else(|| customer.address.clone()),
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
            delivered_at: None,
            created_at: now,
            updated_at: now,
        };

        let items: Vec<SalesOrderItem> = priced
            .lines
            .iter()
            .map(|line| SalesOrderItem {
                id: Uuid::new_v4().to_string(),
                order_id: order.id.clone(),
                product_id: line.product_id.clone(),
                quantity: line.quantity,
                unit_price_cents: line.unit_price.cents(),
                discount_cents: line.discount.cents(),
                tax_bps: line.tax_rate.bps(),
                line_total_cents: line.line_total.cents(),
                tax_cents: line.tax.cents(),
                created_at: now,
            })
            .collect();

        db.sales().create_order(&order, &items, &requirements).await?;

        info!(
            order_id = %order.id,
            order_number = %order.order_number,
            total = %totals.total,
            items = items.len(),
            "Sales order created"
        );
        let mut projected = customer;
        projected.outstanding_balance_cents += order.total_cents;
        if projected.is_over_credit_limit() {
            warn!(
                customer_id = %projected.id,
                outstanding = %projected.outstanding_balance(),
                limit = %projected.credit_limit(),
                "Customer is over their credit limit"
            );
        }

        Ok(SalesOrderDetail {
            balance: Balance::new(order.total(), Money::zero()),
            order,
            items,
        })
    }

    /// An order with its items and current balance.
    pub async fn get_order(&self, id: &str) -> ServiceResult<SalesOrderDetail> {
        let order = self.find_order(id).await?;
        let items = self.state.db.sales().get_items(id).await?;
        let paid = self.state.db.sales().total_paid(id).await?;

        Ok(SalesOrderDetail {
            balance: Balance::new(order.total(), paid),
            order,
            items,
        })
    }

    pub async fn list_orders(
        &self,
        mut filter: SalesOrderFilter,
        page: PageRequest,
    ) -> ServiceResult<Page<SalesOrder>> {
        filter.search = match filter.search.as_deref() {
            Some(term) => validate_search_query(term)?,
            None => None,
        };

        let page = self
            .state
            .db
            .sales()
            .list_orders(&filter, self.state.page(page))
            .await?;
        Ok(page)
    }

    pub async fn update_order_status(&self, id: &str, status: OrderStatus) -> ServiceResult<()> {
        let order = self.find_order(id).await?;
        self.state.db.sales().update_order_status(id, status).await?;
        info!(order_id = %id, from = %order.status, to = %status, "Order status updated");
        Ok(())
    }

    /// Deletes a pending or cancelled order with no payments, returning its stock.
    pub async fn delete_order(&self, id: &str, user: Option<&str>) -> ServiceResult<()> {
        self.state.db.sales().delete_order(id, user).await?;
        info!(order_id = %id, "Sales order deleted");
        Ok(())
    }

    // =========================================================================
    // Invoices
    // =========================================================================

    /// Issues the invoice for an order. Each order has at most one.
    pub async fn create_invoice(
        &self,
        order_id: &str,
        due_date: Option<NaiveDate>,
        notes: Option<String>,
    ) -> ServiceResult<Invoice> {
        let order = self.find_order(order_id).await?;
        if order.status == OrderStatus::Cancelled {
            return Err(CoreError::invalid_state("Sales order", "cancelled", "be invoiced").into());
        }

        let invoice_date = today();
        if let Some(due) = due_date {
            validate_date_range("due_date", invoice_date, due)?;
        }

        let now = Utc::now();
        let invoice = Invoice {
            id: Uuid::new_v4().to_string(),
            invoice_number: document_number("INV"),
            order_id: order.id.clone(),
            customer_id: order.customer_id.clone(),
            invoice_date,
            due_date,
            status: if order.payment_status == PaymentStatus::Paid {
                InvoiceStatus::Paid
            } else {
                InvoiceStatus::Draft
            },
            total_cents: order.total_cents,
            notes: clean(notes),
            created_at: now,
            updated_at: now,
        };

        self.state.db.sales().create_invoice(&invoice).await?;
        info!(invoice_id = %invoice.id, number = %invoice.invoice_number, order_id = %order.id, "Invoice created");

        Ok(invoice)
    }

    pub async fn get_invoice(&self, id: &str) -> ServiceResult<Invoice> {
        self.state
            .db
            .sales()
            .get_invoice(id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Invoice", id))
    }

    /// Sets an invoice's status. Paid also marks the order paid.
    pub async fn update_invoice_status(&self, id: &str, status: InvoiceStatus) -> ServiceResult<()> {
        self.state.db.sales().update_invoice_status(id, status).await?;
        info!(invoice_id = %id, ?status, "Invoice status updated");
        Ok(())
    }

    /// Invoices with paid and due amounts.
    pub async fn list_invoices(
        &self,
        filter: InvoiceFilter,
        page: PageRequest,
    ) -> ServiceResult<Page<InvoiceWithBalance>> {
        let page = self
            .state
            .db
            .sales()
            .list_invoices(&filter, self.state.page(page))
            .await?;
        Ok(page)
    }

    // =========================================================================
    // Payments
    // =========================================================================

    /// Records a customer payment against an order.
    ///
    /// The invoice defaults to the order's invoice and the reference number
    /// to a generated `REC-…` number.
    ///
    /// ## Errors
    /// * `PaymentError` - non-positive amount, overpayment, already paid
    /// * `ValidationError` - invoice of another order
    pub async fn record_payment(
        &self,
        input: NewPayment,
        user: Option<&str>,
    ) -> ServiceResult<RecordedPayment> {
        validate_payment_amount(input.amount_cents).map_err(|e| {
            ServiceError::from(CoreError::InvalidPaymentAmount {
                reason: e.to_string(),
            })
        })?;

        let order = self.find_order(&input.order_id).await?;
        if order.status == OrderStatus::Cancelled {
            return Err(CoreError::invalid_state("Sales order", "cancelled", "take payments").into());
        }

        let invoice_id = match input.invoice_id {
            Some(invoice_id) => {
                let invoice = self.get_invoice(&invoice_id).await?;
                if invoice.order_id != order.id {
                    return Err(ServiceError::validation(format!(
                        "Invoice {} does not belong to order {}",
                        invoice.invoice_number, order.order_number
                    )));
                }
                Some(invoice.id)
            }
            None => self
                .state
                .db
                .sales()
                .get_invoice_by_order(&order.id)
                .await?
                .map(|invoice| invoice.id),
        };

        let payment = Payment {
            id: Uuid::new_v4().to_string(),
            reference_number: clean(input.reference_number)
                .unwrap_or_else(|| document_number("REC")),
            order_id: order.id.clone(),
            invoice_id,
            amount_cents: input.amount_cents,
            payment_date: input.payment_date.unwrap_or_else(today),
            payment_method: input.payment_method,
            status: PaymentRecordStatus::Completed,
            notes: clean(input.notes),
            created_by: user.map(str::to_string),
            created_at: Utc::now(),
        };

        let balance = self.state.db.sales().record_payment(&payment).await?;

        info!(
            order_id = %order.id,
            payment_id = %payment.id,
            amount = %payment.amount(),
            due = %balance.due,
            "Payment recorded"
        );

        Ok(RecordedPayment {
            payment_status: balance.status(),
            payment,
            balance,
        })
    }

    pub async fn list_payments(&self, order_id: &str) -> ServiceResult<Vec<Payment>> {
        self.find_order(order_id).await?;
        Ok(self.state.db.sales().list_payments(order_id).await?)
    }

    // =========================================================================
    // Deliveries
    // =========================================================================

    /// Records a delivery. InTransit ships the order, Delivered delivers it.
    pub async fn record_delivery(&self, order_id: &str, input: NewDelivery) -> ServiceResult<Delivery> {
        let order = self.find_order(order_id).await?;
        if order.status == OrderStatus::Cancelled {
            return Err(CoreError::invalid_state("Sales order", "cancelled", "be delivered").into());
        }

        let now = Utc::now();
        let delivery = Delivery {
            id: Uuid::new_v4().to_string(),
            delivery_number: document_number("DEL"),
            order_id: order.id.clone(),
            delivery_date: input.delivery_date,
            delivery_address: clean(input.delivery_address).or_else(|| order.shipping_address.clone()),
            carrier: clean(input.carrier),
            tracking_number: clean(input.tracking_number),
            status: input.status,
            notes: clean(input.notes),
            created_at: now,
            updated_at: now,
        };

        self.state.db.sales().record_delivery(&delivery).await?;
        info!(order_id = %order.id, delivery_id = %delivery.id, status = ?delivery.status, "Delivery recorded");

        Ok(delivery)
    }

    pub async fn list_deliveries(&self, order_id: &str) -> ServiceResult<Vec<Delivery>> {
        self.find_order(order_id).await?;
        Ok(self.state.db.sales().list_deliveries(order_id).await?)
    }

    async fn find_order(&self, id: &str) -> ServiceResult<SalesOrder> {
        self.state
            .db
            .sales()
            .get_order(id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Sales order", id))
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
