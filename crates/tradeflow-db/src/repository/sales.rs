//! # Sales Repository
//!
//! Database operations for sales orders, invoices, payments and deliveries.
//!
//! ## Order Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Sales Order Lifecycle                             │
//! │                                                                         │
//! │  1. CREATE (one transaction)                                           │
//! │     ├── INSERT sales_orders                                            │
//! │     ├── INSERT sales_order_items (position keeps input order)          │
//! │     ├── guarded stock decrement + Sale movement per product            │
//! │     └── customer outstanding balance += total                          │
//! │         any shortfall → nothing above is kept                          │
//! │                                                                         │
//! │  2. INVOICE  → one invoice per order (INV-…)                           │
//! │                                                                         │
//! │  3. PAY (one transaction, repeatable)                                  │
//! │     ├── Balance::apply (no overpayment, not already paid)              │
//! │     ├── INSERT payments                                                │
//! │     ├── payment_status re-derived; invoice Paid once settled           │
//! │     └── customer outstanding balance −= amount                         │
//! │                                                                         │
//! │  4. DELIVER  → InTransit ⇒ Shipped, Delivered ⇒ Delivered              │
//! │                                                                         │
//! │  (DELETE)    → pending/cancelled without payments; stock Returned      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use tracing::{debug, info};

use super::{apply_stock_movement, like_pattern, shift_customer_balance, MovementRecord};
use crate::error::{DbError, DbResult};
use tradeflow_core::{
    Balance, CoreError, Delivery, Invoice, InvoiceFilter, InvoiceStatus, InvoiceWithBalance, Money,
    MovementType, OrderStatus, OrderTotals, Page, PageRequest, Payment, PaymentStatus, SalesOrder,
    SalesOrderFilter, SalesOrderItem, StockRequirement,
};

/// `stock_movements.reference_type` for sales orders.
const SALES_ORDER_REF: &str = "sales_order";

/// Repository for sales database operations.
#[derive(Debug, Clone)]
pub struct SalesRepository {
    pool: SqlitePool,
}

/// Invoice row joined with the amount paid on its order.
#[derive(Debug, sqlx::FromRow)]
struct InvoiceRow {
    #[sqlx(flatten)]
    invoice: Invoice,
    paid_cents: i64,
}

impl SalesRepository {
    /// Creates a new SalesRepository.
    pub fn new(pool: SqlitePool) -> Self {
        SalesRepository { pool }
    }

    // =========================================================================
    // Orders
    // =========================================================================

    /// Persists a priced order with its items and stock effects.
    ///
    /// ## Arguments
    /// * `order` - Priced order header
    /// * `items` - Priced lines, in input order
    /// * `requirements` - Aggregated stock to take (stocked products only)
    ///
    /// ## Returns
    /// * `Err(DbError::InsufficientStock)` - a product is short; nothing written
    pub async fn create_order(
        &self,
        order: &SalesOrder,
        items: &[SalesOrderItem],
        requirements: &[StockRequirement],
    ) -> DbResult<()> {
        debug!(
            id = %order.id,
            order_number = %order.order_number,
            items = items.len(),
            "Creating sales order"
        );

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO sales_orders (
                id, order_number, customer_id, status, payment_status,
                order_date, expected_delivery_date, shipping_address,
                subtotal_cents, item_tax_cents, order_tax_bps, order_tax_cents, tax_cents,
                order_discount_cents, discount_cents, total_cents,
                notes, created_by, delivered_at, created_at, updated_at
            ) VALUES (
                ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11,
                ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21
            )
            "#,
        )
        .bind(&order.id)
        .bind(&order.order_number)
        .bind(&order.customer_id)
        .bind(order.status)
        .bind(order.payment_status)
        .bind(order.order_date)
        .bind(order.expected_delivery_date)
        .bind(&order.shipping_address)
        .bind(order.subtotal_cents)
        .bind(order.item_tax_cents)
        .bind(order.order_tax_bps)
        .bind(order.order_tax_cents)
        .bind(order.tax_cents)
        .bind(order.order_discount_cents)
        .bind(order.discount_cents)
        .bind(order.total_cents)
        .bind(&order.notes)
        .bind(&order.created_by)
        .bind(order.delivered_at)
        .bind(order.created_at)
        .bind(order.updated_at)
        .execute(&mut *tx)
        .await?;

        for (position, item) in items.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO sales_order_items (
                    id, order_id, product_id, quantity, unit_price_cents, discount_cents,
                    tax_bps, line_total_cents, tax_cents, position, created_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
                "#,
            )
            .bind(&item.id)
            .bind(&order.id)
            .bind(&item.product_id)
            .bind(item.quantity)
            .bind(item.unit_price_cents)
            .bind(item.discount_cents)
            .bind(item.tax_bps)
            .bind(item.line_total_cents)
            .bind(item.tax_cents)
            .bind(position as i64)
            .bind(item.created_at)
            .execute(&mut *tx)
            .await?;
        }

        for requirement in requirements {
            apply_stock_movement(
                &mut tx,
                MovementRecord {
                    product_id: &requirement.product_id,
                    movement_type: MovementType::Sale,
                    quantity: requirement.quantity,
                    reference_type: Some(SALES_ORDER_REF),
                    reference_id: Some(&order.id),
                    notes: Some(&order.order_number),
                    created_by: order.created_by.as_deref(),
                },
            )
            .await?;
        }

        shift_customer_balance(&mut tx, &order.customer_id, order.total_cents).await?;

        tx.commit().await?;

        info!(order_number = %order.order_number, total = %order.total(), "Sales order created");
        Ok(())
    }

    /// Gets an order by ID.
    pub async fn get_order(&self, id: &str) -> DbResult<Option<SalesOrder>> {
        let order = sqlx::query_as::<_, SalesOrder>("SELECT * FROM sales_orders WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(order)
    }

    /// Gets an order's items in their original order.
    pub async fn get_items(&self, order_id: &str) -> DbResult<Vec<SalesOrderItem>> {
        let items = sqlx::query_as::<_, SalesOrderItem>(
            "SELECT * FROM sales_order_items WHERE order_id = ?1 ORDER BY position",
        )
        .bind(order_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(items)
    }

    /// Lists orders, newest first.
    ///
    /// `search` matches the order number and the customer name.
    pub async fn list_orders(
        &self,
        filter: &SalesOrderFilter,
        page: PageRequest,
    ) -> DbResult<Page<SalesOrder>> {
        debug!(?filter, page = page.page, "Listing sales orders");

        let mut count = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM sales_orders o WHERE 1 = 1");
        push_order_filters(&mut count, filter);
        let total: i64 = count.build_query_scalar().fetch_one(&self.pool).await?;

        let mut select = QueryBuilder::<Sqlite>::new("SELECT o.* FROM sales_orders o WHERE 1 = 1");
        push_order_filters(&mut select, filter);
        select
            .push(" ORDER BY o.order_date DESC, o.created_at DESC LIMIT ")
            .push_bind(page.limit())
            .push(" OFFSET ")
            .push_bind(page.offset());
        let items = select
            .build_query_as::<SalesOrder>()
            .fetch_all(&self.pool)
            .await?;

        Ok(Page {
            items,
            total,
            page: page.page,
            per_page: page.per_page(),
        })
    }

    /// Every order, oldest first (maintenance scans).
    pub async fn all_orders(&self) -> DbResult<Vec<SalesOrder>> {
        let orders = sqlx::query_as::<_, SalesOrder>(
            "SELECT * FROM sales_orders ORDER BY created_at",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(orders)
    }

    /// Sets an order's status. Delivered also stamps `delivered_at`.
    pub async fn update_order_status(&self, id: &str, status: OrderStatus) -> DbResult<()> {
        debug!(id = %id, status = %status, "Updating order status");

        let mut conn = self.pool.acquire().await?;
        set_order_status(&mut conn, id, status).await
    }

    /// Rewrites an order's stored totals.
    ///
    /// The customer's outstanding balance moves by the change in total and
    /// the payment status is re-derived against what was already paid.
    pub async fn update_totals(&self, id: &str, totals: &OrderTotals) -> DbResult<()> {
        let mut tx = self.pool.begin().await?;
        write_totals(&mut tx, id, totals).await?;
        tx.commit().await?;
        Ok(())
    }

    /// Rewrites repriced item amounts and the order totals together.
    ///
    /// `items` carry the corrected `line_total_cents` and `tax_cents`; items
    /// of other orders are left alone.
    pub async fn reprice_order(
        &self,
        id: &str,
        items: &[SalesOrderItem],
        totals: &OrderTotals,
    ) -> DbResult<()> {
        debug!(id = %id, items = items.len(), "Repricing sales order");

        let mut tx = self.pool.begin().await?;

        for item in items {
            sqlx::query(
                r#"
                UPDATE sales_order_items SET line_total_cents = ?3, tax_cents = ?4
                WHERE id = ?1 AND order_id = ?2
                "#,
            )
            .bind(&item.id)
            .bind(id)
            .bind(item.line_total_cents)
            .bind(item.tax_cents)
            .execute(&mut *tx)
            .await?;
        }
        write_totals(&mut tx, id, totals).await?;

        tx.commit().await?;
        Ok(())
    }

    /// Deletes a pending or cancelled order that has no payments.
    ///
    /// Stock taken by the order comes back as Return movements and the
    /// customer's outstanding balance drops by the order total.
    pub async fn delete_order(&self, id: &str, deleted_by: Option<&str>) -> DbResult<()> {
        debug!(id = %id, "Deleting sales order");

        let mut tx = self.pool.begin().await?;

        let order = fetch_order(&mut tx, id).await?;
        if !order.status.can_delete() {
            return Err(CoreError::invalid_state("Sales order", order.status.as_str(), "delete").into());
        }

        let payments: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM payments WHERE order_id = ?1")
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;
        if payments > 0 {
            return Err(CoreError::invalid_state("Sales order", "partly settled", "delete").into());
        }

        let taken: Vec<(String, i64)> = sqlx::query_as(
            r#"
            SELECT product_id, -SUM(quantity)
            FROM stock_movements
            WHERE reference_type = ?1 AND reference_id = ?2 AND movement_type = 'sale'
            GROUP BY product_id
            "#,
        )
        .bind(SALES_ORDER_REF)
        .bind(id)
        .fetch_all(&mut *tx)
        .await?;

        for (product_id, quantity) in &taken {
            apply_stock_movement(
                &mut tx,
                MovementRecord {
                    product_id,
                    movement_type: MovementType::Return,
                    quantity: *quantity,
                    reference_type: Some(SALES_ORDER_REF),
                    reference_id: Some(id),
                    notes: Some("order deleted"),
                    created_by: deleted_by,
                },
            )
            .await?;
        }

        shift_customer_balance(&mut tx, &order.customer_id, -order.total_cents).await?;

        sqlx::query("DELETE FROM sales_orders WHERE id = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        info!(order_number = %order.order_number, restored = taken.len(), "Sales order deleted");
        Ok(())
    }

    // =========================================================================
    // Invoices
    // =========================================================================

    /// Inserts an invoice.
    ///
    /// ## Returns
    /// * `Err(DbError::UniqueViolation)` - the order already has an invoice
    pub async fn create_invoice(&self, invoice: &Invoice) -> DbResult<()> {
        debug!(order_id = %invoice.order_id, number = %invoice.invoice_number, "Creating invoice");

        sqlx::query(
            r#"
            INSERT INTO invoices (
                id, invoice_number, order_id, customer_id, invoice_date, due_date,
                status, total_cents, notes, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
        )
        .bind(&invoice.id)
        .bind(&invoice.invoice_number)
        .bind(&invoice.order_id)
        .bind(&invoice.customer_id)
        .bind(invoice.invoice_date)
        .bind(invoice.due_date)
        .bind(invoice.status)
        .bind(invoice.total_cents)
        .bind(&invoice.notes)
        .bind(invoice.created_at)
        .bind(invoice.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::UniqueViolation { field, .. } if field.ends_with("order_id") => {
                DbError::duplicate("invoice for order", &invoice.order_id)
            }
            other => other,
        })?;

        Ok(())
    }

    pub async fn get_invoice(&self, id: &str) -> DbResult<Option<Invoice>> {
        let invoice = sqlx::query_as::<_, Invoice>("SELECT * FROM invoices WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(invoice)
    }

    pub async fn get_invoice_by_order(&self, order_id: &str) -> DbResult<Option<Invoice>> {
        let invoice = sqlx::query_as::<_, Invoice>("SELECT * FROM invoices WHERE order_id = ?1")
            .bind(order_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(invoice)
    }

    /// Sets an invoice's status. Paid also marks its order as paid.
    pub async fn update_invoice_status(&self, id: &str, status: InvoiceStatus) -> DbResult<()> {
        debug!(id = %id, ?status, "Updating invoice status");

        let mut tx = self.pool.begin().await?;

        let order_id: Option<String> = sqlx::query_scalar("SELECT order_id FROM invoices WHERE id = ?1")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;
        let order_id = order_id.ok_or_else(|| DbError::not_found("Invoice", id))?;

        let now = Utc::now();
        sqlx::query("UPDATE invoices SET status = ?2, updated_at = ?3 WHERE id = ?1")
            .bind(id)
            .bind(status)
            .bind(now)
            .execute(&mut *tx)
            .await?;

        if status == InvoiceStatus::Paid {
            sqlx::query("UPDATE sales_orders SET payment_status = ?2, updated_at = ?3 WHERE id = ?1")
                .bind(&order_id)
                .bind(PaymentStatus::Paid)
                .bind(now)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// Lists invoices with what has been paid against each, newest first.
    pub async fn list_invoices(
        &self,
        filter: &InvoiceFilter,
        page: PageRequest,
    ) -> DbResult<Page<InvoiceWithBalance>> {
        let mut count = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM invoices i WHERE 1 = 1");
        push_invoice_filters(&mut count, filter);
        let total: i64 = count.build_query_scalar().fetch_one(&self.pool).await?;

        let mut select = QueryBuilder::<Sqlite>::new(
            r#"
            SELECT i.*,
                COALESCE((
                    SELECT SUM(p.amount_cents) FROM payments p
                    WHERE p.order_id = i.order_id AND p.status = 'completed'
                ), 0) AS paid_cents
            FROM invoices i
            WHERE 1 = 1
            "#,
        );
        push_invoice_filters(&mut select, filter);
        select
            .push(" ORDER BY i.invoice_date DESC, i.created_at DESC LIMIT ")
            .push_bind(page.limit())
            .push(" OFFSET ")
            .push_bind(page.offset());
        let rows = select
            .build_query_as::<InvoiceRow>()
            .fetch_all(&self.pool)
            .await?;

        let items = rows
            .into_iter()
            .map(|row| {
                let balance = Balance::new(
                    Money::from_cents(row.invoice.total_cents),
                    Money::from_cents(row.paid_cents),
                );
                InvoiceWithBalance {
                    invoice: row.invoice,
                    balance,
                }
            })
            .collect();

        Ok(Page {
            items,
            total,
            page: page.page,
            per_page: page.per_page(),
        })
    }

    // =========================================================================
    // Payments
    // =========================================================================

    /// Sum of completed payments on an order.
    pub async fn total_paid(&self, order_id: &str) -> DbResult<Money> {
        let mut conn = self.pool.acquire().await?;
        completed_paid(&mut conn, order_id).await
    }

    /// Records a payment against its order.
    ///
    /// The balance check runs on the same connection as the insert, so two
    /// payments cannot both fit into the same remaining due.
    ///
    /// ## Returns
    /// The order's balance after this payment.
    ///
    /// ## Errors
    /// * `DbError::NotFound` - order doesn't exist
    /// * `DbError::Rule(AlreadyPaid)` - order is marked paid, even without payment rows
    /// * `DbError::Rule(InvalidState)` - order was refunded
    /// * `DbError::Rule(Overpayment | InvalidPaymentAmount)`
    pub async fn record_payment(&self, payment: &Payment) -> DbResult<Balance> {
        debug!(
            order_id = %payment.order_id,
            amount = %payment.amount(),
            reference = %payment.reference_number,
            "Recording payment"
        );

        let mut tx = self.pool.begin().await?;

        let order = fetch_order(&mut tx, &payment.order_id).await?;
        match order.payment_status {
            PaymentStatus::Paid => return Err(CoreError::AlreadyPaid.into()),
            PaymentStatus::Refunded => {
                return Err(CoreError::invalid_state(
                    format!("Order {}", order.order_number),
                    "refunded",
                    "take payments",
                )
                .into())
            }
            PaymentStatus::Unpaid | PaymentStatus::PartiallyPaid => {}
        }
        let paid = completed_paid(&mut tx, &order.id).await?;
        let balance = Balance::new(order.total(), paid).apply(payment.amount())?;

        sqlx::query(
            r#"
            INSERT INTO payments (
                id, reference_number, order_id, invoice_id, amount_cents, payment_date,
                payment_method, status, notes, created_by, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
        )
        .bind(&payment.id)
        .bind(&payment.reference_number)
        .bind(&payment.order_id)
        .bind(&payment.invoice_id)
        .bind(payment.amount_cents)
        .bind(payment.payment_date)
        .bind(payment.payment_method)
        .bind(payment.status)
        .bind(&payment.notes)
        .bind(&payment.created_by)
        .bind(payment.created_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::UniqueViolation { field, .. } if field.ends_with("reference_number") => {
                DbError::duplicate("reference_number", &payment.reference_number)
            }
            other => other,
        })?;

        let now = Utc::now();
        sqlx::query("UPDATE sales_orders SET payment_status = ?2, updated_at = ?3 WHERE id = ?1")
            .bind(&order.id)
            .bind(balance.status())
            .bind(now)
            .execute(&mut *tx)
            .await?;

        if balance.is_settled() {
            sqlx::query(
                r#"
                UPDATE invoices SET status = 'paid', updated_at = ?2
                WHERE order_id = ?1 AND status != 'cancelled'
                "#,
            )
            .bind(&order.id)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }

        shift_customer_balance(&mut tx, &order.customer_id, -payment.amount_cents).await?;

        tx.commit().await?;

        info!(
            order_number = %order.order_number,
            due = %balance.due,
            status = %balance.status(),
            "Payment recorded"
        );
        Ok(balance)
    }

    /// Payments on an order, oldest first.
    pub async fn list_payments(&self, order_id: &str) -> DbResult<Vec<Payment>> {
        let payments = sqlx::query_as::<_, Payment>(
            "SELECT * FROM payments WHERE order_id = ?1 ORDER BY created_at",
        )
        .bind(order_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(payments)
    }

    // =========================================================================
    // Deliveries
    // =========================================================================

    /// Records a delivery and moves the order status along with it.
    pub async fn record_delivery(&self, delivery: &Delivery) -> DbResult<()> {
        debug!(
            order_id = %delivery.order_id,
            number = %delivery.delivery_number,
            status = ?delivery.status,
            "Recording delivery"
        );

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO deliveries (
                id, delivery_number, order_id, delivery_date, delivery_address,
                carrier, tracking_number, status, notes, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
        )
        .bind(&delivery.id)
        .bind(&delivery.delivery_number)
        .bind(&delivery.order_id)
        .bind(delivery.delivery_date)
        .bind(&delivery.delivery_address)
        .bind(&delivery.carrier)
        .bind(&delivery.tracking_number)
        .bind(delivery.status)
        .bind(&delivery.notes)
        .bind(delivery.created_at)
        .bind(delivery.updated_at)
        .execute(&mut *tx)
        .await?;

        if let Some(status) = delivery.status.order_status() {
            set_order_status(&mut tx, &delivery.order_id, status).await?;
        }

        tx.commit().await?;
        Ok(())
    }

    pub async fn list_deliveries(&self, order_id: &str) -> DbResult<Vec<Delivery>> {
        let deliveries = sqlx::query_as::<_, Delivery>(
            "SELECT * FROM deliveries WHERE order_id = ?1 ORDER BY created_at",
        )
        .bind(order_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(deliveries)
    }
}

// =============================================================================
// Connection-level Helpers
// =============================================================================

async fn fetch_order(conn: &mut SqliteConnection, id: &str) -> DbResult<SalesOrder> {
    sqlx::query_as::<_, SalesOrder>("SELECT * FROM sales_orders WHERE id = ?1")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| DbError::not_found("Sales order", id))
}

async fn completed_paid(conn: &mut SqliteConnection, order_id: &str) -> DbResult<Money> {
    let paid: i64 = sqlx::query_scalar(
        r#"
        SELECT COALESCE(SUM(amount_cents), 0) FROM payments
        WHERE order_id = ?1 AND status = 'completed'
        "#,
    )
    .bind(order_id)
    .fetch_one(&mut *conn)
    .await?;

    Ok(Money::from_cents(paid))
}

/// Stores `totals` on an order and moves the customer balance by the change.
///
/// A refunded order keeps its status, and so does an order marked paid
/// without any payment rows behind it.
async fn write_totals(conn: &mut SqliteConnection, id: &str, totals: &OrderTotals) -> DbResult<()> {
    let order = fetch_order(conn, id).await?;
    let paid = completed_paid(conn, id).await?;
    let status = match order.payment_status {
        PaymentStatus::Refunded => PaymentStatus::Refunded,
        PaymentStatus::Paid if paid.is_zero() => PaymentStatus::Paid,
        _ => PaymentStatus::derive(totals.total, paid),
    };

    sqlx::query(
        r#"
        UPDATE sales_orders SET
            subtotal_cents = ?2, item_tax_cents = ?3, order_tax_cents = ?4, tax_cents = ?5,
            discount_cents = ?6, total_cents = ?7, payment_status = ?8, updated_at = ?9
        WHERE id = ?1
        "#,
    )
    .bind(id)
    .bind(totals.subtotal.cents())
    .bind(totals.item_tax.cents())
    .bind(totals.order_tax.cents())
    .bind(totals.tax.cents())
    .bind(totals.discount.cents())
    .bind(totals.total.cents())
    .bind(status)
    .bind(Utc::now())
    .execute(&mut *conn)
    .await?;

    let drift = totals.total.cents() - order.total_cents;
    if drift != 0 {
        shift_customer_balance(conn, &order.customer_id, drift).await?;
    }
    Ok(())
}

async fn set_order_status(conn: &mut SqliteConnection, id: &str, status: OrderStatus) -> DbResult<()> {
    let now = Utc::now();
    let delivered_at = (status == OrderStatus::Delivered).then_some(now);

    let result = sqlx::query(
        r#"
        UPDATE sales_orders
        SET status = ?2, delivered_at = COALESCE(?3, delivered_at), updated_at = ?4
        WHERE id = ?1
        "#,
    )
    .bind(id)
    .bind(status)
    .bind(delivered_at)
    .bind(now)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::not_found("Sales order", id));
    }
    Ok(())
}

fn push_order_filters(qb: &mut QueryBuilder<'_, Sqlite>, filter: &SalesOrderFilter) {
    if let Some(status) = filter.status {
        qb.push(" AND o.status = ").push_bind(status);
    }
    if let Some(payment_status) = filter.payment_status {
        qb.push(" AND o.payment_status = ").push_bind(payment_status);
    }
    if let Some(customer_id) = &filter.customer_id {
        qb.push(" AND o.customer_id = ").push_bind(customer_id.clone());
    }
    if let Some(term) = &filter.search {
        let pattern = like_pattern(term);
        qb.push(" AND (o.order_number LIKE ")
            .push_bind(pattern.clone())
            .push(" ESCAPE '\\' OR o.customer_id IN (SELECT id FROM customers WHERE name LIKE ")
            .push_bind(pattern)
            .push(" ESCAPE '\\'))");
    }
}

fn push_invoice_filters(qb: &mut QueryBuilder<'_, Sqlite>, filter: &InvoiceFilter) {
    if let Some(status) = filter.status {
        qb.push(" AND i.status = ").push_bind(status);
    }
    if let Some(customer_id) = &filter.customer_id {
        qb.push(" AND i.customer_id = ").push_bind(customer_id.clone());
    }
    if filter.unpaid_only {
        qb.push(" AND i.status NOT IN ('paid', 'cancelled')");
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::document_number;
    use crate::repository::test_support::*;
    use crate::Database;
    use chrono::{NaiveDate, Utc};
    use tradeflow_core::{Customer, DeliveryStatus, PaymentMethod, PaymentRecordStatus, Product};
    use uuid::Uuid;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 14).unwrap()
    }

    /// One line per (product, qty); 10.00 each, no tax, for easy totals.
    fn order_for(customer: &Customer, lines: &[(&Product, i64)]) -> (SalesOrder, Vec<SalesOrderItem>) {
        let now = Utc::now();
        let id = Uuid::new_v4().to_string();
        let items: Vec<SalesOrderItem> = lines
            .iter()
            .map(|(product, qty)| SalesOrderItem {
                id: Uuid::new_v4().to_string(),
                order_id: id.clone(),
                product_id: product.id.clone(),
                quantity: *qty,
                unit_price_cents: 1_000,
                discount_cents: 0,
                tax_bps: 0,
                line_total_cents: 1_000 * qty,
                tax_cents: 0,
                created_at: now,
            })
            .collect();
        let total: i64 = items.iter().map(|i| i.line_total_cents).sum();

        let order = SalesOrder {
            id,
            order_number: document_number("ORD"),
            customer_id: customer.id.clone(),
            status: OrderStatus::Pending,
            payment_status: PaymentStatus::Unpaid,
            order_date: day(),
            expected_delivery_date: None,
            shipping_address: customer.address.clone(),
            subtotal_cents: total,
            item_tax_cents: 0,
            order_tax_bps: 0,
            order_tax_cents: 0,
            tax_cents: 0,
            order_discount_cents: 0,
            discount_cents: 0,
            total_cents: total,
            notes: None,
            created_by: None,
            delivered_at: None,
            created_at: now,
            updated_at: now,
        };
        (order, items)
    }

    fn requirements(items: &[SalesOrderItem]) -> Vec<StockRequirement> {
        tradeflow_core::stock::aggregate_requirements(
            items.iter().map(|i| (i.product_id.as_str(), i.quantity)),
        )
    }

    fn payment(order: &SalesOrder, cents: i64) -> Payment {
        Payment {
            id: Uuid::new_v4().to_string(),
            reference_number: document_number("REC"),
            order_id: order.id.clone(),
            invoice_id: None,
            amount_cents: cents,
            payment_date: day(),
            payment_method: PaymentMethod::Cash,
            status: PaymentRecordStatus::Completed,
            notes: None,
            created_by: None,
            created_at: Utc::now(),
        }
    }

    async fn placed_order(db: &Database, stock: i64, qty: i64) -> (Customer, Product, SalesOrder) {
        let customer = customer(db, "Order Customer").await;
        let product = stocked_product(db, "SO-1", 1_000, stock).await;
        let (order, items) = order_for(&customer, &[(&product, qty)]);
        db.sales()
            .create_order(&order, &items, &requirements(&items))
            .await
            .unwrap();
        (customer, product, order)
    }

    #[tokio::test]
    async fn test_create_order_takes_stock_and_books_balance() {
        let db = test_db().await;
        let (customer, product, order) = placed_order(&db, 10, 3).await;

        let stock = db.products().get_by_id(&product.id).await.unwrap().unwrap();
        assert_eq!(stock.stock_quantity, 7);

        let c = db.customers().get_by_id(&customer.id).await.unwrap().unwrap();
        assert_eq!(c.outstanding_balance_cents, 3_000);

        let items = db.sales().get_items(&order.id).await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].line_total_cents, 3_000);
    }

    #[tokio::test]
    async fn test_shortfall_rolls_back_everything() {
        let db = test_db().await;
        let customer = customer(&db, "Short").await;
        let plenty = stocked_product(&db, "PLENTY", 1_000, 100).await;
        let scarce = stocked_product(&db, "SCARCE", 1_000, 1).await;

        let (order, items) = order_for(&customer, &[(&plenty, 5), (&scarce, 2)]);
        let err = db
            .sales()
            .create_order(&order, &items, &requirements(&items))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::InsufficientStock { ref sku, .. } if sku == "SCARCE"));

        assert!(db.sales().get_order(&order.id).await.unwrap().is_none());
        let plenty = db.products().get_by_id(&plenty.id).await.unwrap().unwrap();
        assert_eq!(plenty.stock_quantity, 100);
        let movements = db
            .products()
            .list_movements(&plenty.id, PageRequest::default())
            .await
            .unwrap();
        assert_eq!(movements.total, 1, "only the opening adjustment remains");
        let c = db.customers().get_by_id(&customer.id).await.unwrap().unwrap();
        assert_eq!(c.outstanding_balance_cents, 0);
    }

    #[tokio::test]
    async fn test_items_keep_input_order() {
        let db = test_db().await;
        let customer = customer(&db, "Ordering").await;
        let a = stocked_product(&db, "A", 1_000, 10).await;
        let b = stocked_product(&db, "B", 1_000, 10).await;
        let (order, items) = order_for(&customer, &[(&b, 1), (&a, 2), (&b, 3)]);
        db.sales()
            .create_order(&order, &items, &requirements(&items))
            .await
            .unwrap();

        let stored: Vec<i64> = db
            .sales()
            .get_items(&order.id)
            .await
            .unwrap()
            .iter()
            .map(|i| i.quantity)
            .collect();
        assert_eq!(stored, vec![1, 2, 3]);

        let b = db.products().get_by_id(&b.id).await.unwrap().unwrap();
        assert_eq!(b.stock_quantity, 6);
    }

    #[tokio::test]
    async fn test_payments_progress_status_and_reject_overpayment() {
        let db = test_db().await;
        let (customer, _, order) = placed_order(&db, 10, 5).await;

        let after_first = db.sales().record_payment(&payment(&order, 2_000)).await.unwrap();
        assert_eq!(after_first.status(), PaymentStatus::PartiallyPaid);
        assert_eq!(after_first.due.cents(), 3_000);

        let err = db
            .sales()
            .record_payment(&payment(&order, 3_001))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Rule(CoreError::Overpayment { .. })));

        let settled = db.sales().record_payment(&payment(&order, 3_000)).await.unwrap();
        assert!(settled.is_settled());

        let err = db.sales().record_payment(&payment(&order, 1)).await.unwrap_err();
        assert!(matches!(err, DbError::Rule(CoreError::AlreadyPaid)));

        let stored = db.sales().get_order(&order.id).await.unwrap().unwrap();
        assert_eq!(stored.payment_status, PaymentStatus::Paid);
        assert_eq!(db.sales().total_paid(&order.id).await.unwrap().cents(), 5_000);
        assert_eq!(db.sales().list_payments(&order.id).await.unwrap().len(), 2);

        let c = db.customers().get_by_id(&customer.id).await.unwrap().unwrap();
        assert_eq!(c.outstanding_balance_cents, 0);
    }

    #[tokio::test]
    async fn test_settling_payment_marks_invoice_paid() {
        let db = test_db().await;
        let (_, _, order) = placed_order(&db, 10, 1).await;

        let now = Utc::now();
        let invoice = Invoice {
            id: Uuid::new_v4().to_string(),
            invoice_number: document_number("INV"),
            order_id: order.id.clone(),
            customer_id: order.customer_id.clone(),
            invoice_date: day(),
            due_date: None,
            status: InvoiceStatus::Sent,
            total_cents: order.total_cents,
            notes: None,
            created_at: now,
            updated_at: now,
        };
        db.sales().create_invoice(&invoice).await.unwrap();

        let mut second = invoice.clone();
        second.id = Uuid::new_v4().to_string();
        second.invoice_number = document_number("INV");
        let err = db.sales().create_invoice(&second).await.unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { .. }));

        let unpaid = db
            .sales()
            .list_invoices(
                &InvoiceFilter {
                    unpaid_only: true,
                    ..Default::default()
                },
                PageRequest::default(),
            )
            .await
            .unwrap();
        assert_eq!(unpaid.total, 1);
        assert_eq!(unpaid.items[0].balance.due.cents(), 1_000);

        db.sales().record_payment(&payment(&order, 1_000)).await.unwrap();

        let stored = db.sales().get_invoice(&invoice.id).await.unwrap().unwrap();
        assert_eq!(stored.status, InvoiceStatus::Paid);

        let unpaid = db
            .sales()
            .list_invoices(
                &InvoiceFilter {
                    unpaid_only: true,
                    ..Default::default()
                },
                PageRequest::default(),
            )
            .await
            .unwrap();
        assert_eq!(unpaid.total, 0);
    }

    #[tokio::test]
    async fn test_invoice_paid_marks_order_paid() {
        let db = test_db().await;
        let (_, _, order) = placed_order(&db, 10, 1).await;
        let now = Utc::now();
        let invoice = Invoice {
            id: Uuid::new_v4().to_string(),
            invoice_number: document_number("INV"),
            order_id: order.id.clone(),
            customer_id: order.customer_id.clone(),
            invoice_date: day(),
            due_date: None,
            status: InvoiceStatus::Draft,
            total_cents: order.total_cents,
            notes: None,
            created_at: now,
            updated_at: now,
        };
        db.sales().create_invoice(&invoice).await.unwrap();

        db.sales()
            .update_invoice_status(&invoice.id, InvoiceStatus::Paid)
            .await
            .unwrap();

        let stored = db.sales().get_order(&order.id).await.unwrap().unwrap();
        assert_eq!(stored.payment_status, PaymentStatus::Paid);

        let err = db.sales().record_payment(&payment(&order, 500)).await.unwrap_err();
        assert!(matches!(err, DbError::Rule(CoreError::AlreadyPaid)));

        let stored = db.sales().get_order(&order.id).await.unwrap().unwrap();
        assert_eq!(stored.payment_status, PaymentStatus::Paid);
        assert!(db.sales().list_payments(&order.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_refunded_order_takes_no_payments() {
        let db = test_db().await;
        let (_, _, order) = placed_order(&db, 10, 1).await;
        sqlx::query("UPDATE sales_orders SET payment_status = 'refunded' WHERE id = ?1")
            .bind(&order.id)
            .execute(db.pool())
            .await
            .unwrap();

        let err = db.sales().record_payment(&payment(&order, 100)).await.unwrap_err();
        assert!(matches!(err, DbError::Rule(CoreError::InvalidState { .. })));
    }

    #[tokio::test]
    async fn test_delete_restores_stock_and_balance() {
        let db = test_db().await;
        let (customer, product, order) = placed_order(&db, 10, 4).await;

        db.sales().delete_order(&order.id, None).await.unwrap();

        assert!(db.sales().get_order(&order.id).await.unwrap().is_none());
        let p = db.products().get_by_id(&product.id).await.unwrap().unwrap();
        assert_eq!(p.stock_quantity, 10);
        let c = db.customers().get_by_id(&customer.id).await.unwrap().unwrap();
        assert_eq!(c.outstanding_balance_cents, 0);

        let movements = db
            .products()
            .list_movements(&product.id, PageRequest::default())
            .await
            .unwrap();
        assert!(movements
            .items
            .iter()
            .any(|m| m.movement_type == MovementType::Return && m.quantity == 4));
    }

    #[tokio::test]
    async fn test_delete_rejected_when_shipped_or_paid() {
        let db = test_db().await;
        let (_, _, order) = placed_order(&db, 10, 2).await;

        db.sales().record_payment(&payment(&order, 500)).await.unwrap();
        let err = db.sales().delete_order(&order.id, None).await.unwrap_err();
        assert!(matches!(err, DbError::Rule(CoreError::InvalidState { .. })));

        db.sales()
            .update_order_status(&order.id, OrderStatus::Shipped)
            .await
            .unwrap();
        let err = db.sales().delete_order(&order.id, None).await.unwrap_err();
        assert!(matches!(err, DbError::Rule(CoreError::InvalidState { ref current, .. }) if current == "shipped"));
    }

    #[tokio::test]
    async fn test_delivery_moves_order_status() {
        let db = test_db().await;
        let (_, _, order) = placed_order(&db, 10, 1).await;

        let now = Utc::now();
        let mut delivery = Delivery {
            id: Uuid::new_v4().to_string(),
            delivery_number: document_number("DEL"),
            order_id: order.id.clone(),
            delivery_date: Some(day()),
            delivery_address: order.shipping_address.clone(),
            carrier: Some("DHL".to_string()),
            tracking_number: None,
            status: DeliveryStatus::InTransit,
            notes: None,
            created_at: now,
            updated_at: now,
        };
        db.sales().record_delivery(&delivery).await.unwrap();
        let stored = db.sales().get_order(&order.id).await.unwrap().unwrap();
        assert_eq!(stored.status, OrderStatus::Shipped);
        assert!(stored.delivered_at.is_none());

        delivery.id = Uuid::new_v4().to_string();
        delivery.delivery_number = document_number("DEL");
        delivery.status = DeliveryStatus::Delivered;
        db.sales().record_delivery(&delivery).await.unwrap();
        let stored = db.sales().get_order(&order.id).await.unwrap().unwrap();
        assert_eq!(stored.status, OrderStatus::Delivered);
        assert!(stored.delivered_at.is_some());
        assert_eq!(db.sales().list_deliveries(&order.id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_list_orders_filters() {
        let db = test_db().await;
        let (_, _, order) = placed_order(&db, 10, 1).await;

        let by_number = db
            .sales()
            .list_orders(
                &SalesOrderFilter {
                    search: Some(order.order_number.clone()),
                    ..Default::default()
                },
                PageRequest::default(),
            )
            .await
            .unwrap();
        assert_eq!(by_number.total, 1);

        let by_customer_name = db
            .sales()
            .list_orders(
                &SalesOrderFilter {
                    search: Some("order cust".to_string()),
                    ..Default::default()
                },
                PageRequest::default(),
            )
            .await
            .unwrap();
        assert_eq!(by_customer_name.total, 1);

        let paid = db
            .sales()
            .list_orders(
                &SalesOrderFilter {
                    payment_status: Some(PaymentStatus::Paid),
                    ..Default::default()
                },
                PageRequest::default(),
            )
            .await
            .unwrap();
        assert_eq!(paid.total, 0);
    }

    #[tokio::test]
    async fn test_update_totals_shifts_balance() {
        let db = test_db().await;
        let (customer, _, order) = placed_order(&db, 10, 2).await;

        let totals = OrderTotals {
            subtotal: Money::from_cents(2_500),
            total: Money::from_cents(2_500),
            ..Default::default()
        };
        db.sales().update_totals(&order.id, &totals).await.unwrap();

        let stored = db.sales().get_order(&order.id).await.unwrap().unwrap();
        assert_eq!(stored.total_cents, 2_500);
        let c = db.customers().get_by_id(&customer.id).await.unwrap().unwrap();
        assert_eq!(c.outstanding_balance_cents, 2_500);
    }

    #[tokio::test]
    async fn test_reprice_order_rewrites_items_and_totals() {
        let db = test_db().await;
        let (_, _, order) = placed_order(&db, 10, 2).await;
        let mut items = db.sales().get_items(&order.id).await.unwrap();
        items[0].line_total_cents = 1_234;
        items[0].tax_cents = 12;

        let totals = OrderTotals {
            subtotal: Money::from_cents(1_234),
            item_tax: Money::from_cents(12),
            tax: Money::from_cents(12),
            total: Money::from_cents(1_246),
            ..Default::default()
        };
        db.sales().reprice_order(&order.id, &items, &totals).await.unwrap();

        let stored = db.sales().get_items(&order.id).await.unwrap();
        assert_eq!(stored[0].line_total_cents, 1_234);
        assert_eq!(stored[0].tax_cents, 12);
        let stored = db.sales().get_order(&order.id).await.unwrap().unwrap();
        assert_eq!(stored.total_cents, 1_246);
        assert_eq!(stored.payment_status, PaymentStatus::Unpaid);
    }

    #[tokio::test]
    async fn test_update_totals_keeps_invoice_settled_status() {
        let db = test_db().await;
        let (_, _, order) = placed_order(&db, 10, 2).await;
        sqlx::query("UPDATE sales_orders SET payment_status = 'paid' WHERE id = ?1")
            .bind(&order.id)
            .execute(db.pool())
            .await
            .unwrap();

        let totals = OrderTotals {
            subtotal: Money::from_cents(2_500),
            total: Money::from_cents(2_500),
            ..Default::default()
        };
        db.sales().update_totals(&order.id, &totals).await.unwrap();

        let stored = db.sales().get_order(&order.id).await.unwrap().unwrap();
        assert_eq!(stored.payment_status, PaymentStatus::Paid);
    }
}
