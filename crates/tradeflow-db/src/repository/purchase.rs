//! # Purchase Repository
//!
//! Database operations for purchase orders, supplier invoices, supplier
//! payments and goods receipts.
//!
//! ## Receiving Goods
//! ```text
//! receive_goods(po, receipt)
//!      │
//!      ├── PO received or cancelled? ──► InvalidState, nothing written
//!      │
//!      ├── INSERT purchase_receipts
//!      │
//!      ├── Completed ──► +qty Purchase movement per item ──► PO Received
//!      ├── Partial   ──► PO Partial (stock waits for the completing receipt)
//!      └── Pending / Rejected ──► receipt only
//! ```

use chrono::Utc;
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use tracing::{debug, info};

use super::{apply_stock_movement, like_pattern, MovementRecord};
use crate::error::{DbError, DbResult};
use tradeflow_core::{
    Balance, CoreError, Money, MovementType, Page, PageRequest, PaymentStatus, PurchaseInvoice,
    PurchaseOrder, PurchaseOrderFilter, PurchaseOrderItem, PurchaseOrderStatus,
    PurchaseOrderSummary, PurchasePayment, PurchaseReceipt, ReceiptStatus,
};

/// `stock_movements.reference_type` for purchase orders.
const PURCHASE_ORDER_REF: &str = "purchase_order";

/// Repository for purchase database operations.
#[derive(Debug, Clone)]
pub struct PurchaseRepository {
    pool: SqlitePool,
}

/// Purchase order row joined with its supplier name and amount paid.
#[derive(Debug, sqlx::FromRow)]
struct SummaryRow {
    #[sqlx(flatten)]
    order: PurchaseOrder,
    supplier_name: String,
    paid_cents: i64,
}

impl PurchaseRepository {
    /// Creates a new PurchaseRepository.
    pub fn new(pool: SqlitePool) -> Self {
        PurchaseRepository { pool }
    }

    // =========================================================================
    // Purchase Orders
    // =========================================================================

    /// Persists a priced purchase order and its items in one transaction.
    ///
    /// Stock is untouched until goods are received.
    pub async fn create_order(&self, order: &PurchaseOrder, items: &[PurchaseOrderItem]) -> DbResult<()> {
        debug!(id = %order.id, po_number = %order.po_number, items = items.len(), "Creating purchase order");

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO purchase_orders (
                id, po_number, supplier_id, status, payment_status, order_date, expected_date,
                subtotal_cents, item_tax_cents, order_tax_bps, order_tax_cents, tax_cents,
                order_discount_cents, discount_cents, total_cents,
                notes, created_by, received_at, created_at, updated_at
            ) VALUES (
                ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10,
                ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20
            )
            "#,
        )
        .bind(&order.id)
        .bind(&order.po_number)
        .bind(&order.supplier_id)
        .bind(order.status)
        .bind(order.payment_status)
        .bind(order.order_date)
        .bind(order.expected_date)
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
        .bind(order.received_at)
        .bind(order.created_at)
        .bind(order.updated_at)
        .execute(&mut *tx)
        .await?;

        for (position, item) in items.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO purchase_order_items (
                    id, purchase_order_id, product_id, quantity, unit_cost_cents, discount_cents,
                    tax_bps, line_total_cents, tax_cents, position, created_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
                "#,
            )
            .bind(&item.id)
            .bind(&order.id)
            .bind(&item.product_id)
            .bind(item.quantity)
            .bind(item.unit_cost_cents)
            .bind(item.discount_cents)
            .bind(item.tax_bps)
            .bind(item.line_total_cents)
            .bind(item.tax_cents)
            .bind(position as i64)
            .bind(item.created_at)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        info!(po_number = %order.po_number, total = %order.total(), "Purchase order created");
        Ok(())
    }

    pub async fn get_order(&self, id: &str) -> DbResult<Option<PurchaseOrder>> {
        let order = sqlx::query_as::<_, PurchaseOrder>("SELECT * FROM purchase_orders WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(order)
    }

    /// Items in their original order.
    pub async fn get_items(&self, purchase_order_id: &str) -> DbResult<Vec<PurchaseOrderItem>> {
        let items = sqlx::query_as::<_, PurchaseOrderItem>(
            "SELECT * FROM purchase_order_items WHERE purchase_order_id = ?1 ORDER BY position",
        )
        .bind(purchase_order_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(items)
    }

    /// Lists purchase orders with supplier name and paid/due, newest first.
    ///
    /// `search` matches the PO number and the supplier name.
    pub async fn list_orders(
        &self,
        filter: &PurchaseOrderFilter,
        page: PageRequest,
    ) -> DbResult<Page<PurchaseOrderSummary>> {
        debug!(?filter, page = page.page, "Listing purchase orders");

        let mut count = QueryBuilder::<Sqlite>::new(
            "SELECT COUNT(*) FROM purchase_orders po JOIN suppliers s ON s.id = po.supplier_id WHERE 1 = 1",
        );
        push_filters(&mut count, filter);
        let total: i64 = count.build_query_scalar().fetch_one(&self.pool).await?;

        let mut select = QueryBuilder::<Sqlite>::new(
            r#"
            SELECT po.*, s.name AS supplier_name,
                COALESCE((
                    SELECT SUM(pp.amount_cents) FROM purchase_payments pp
                    WHERE pp.purchase_order_id = po.id AND pp.status = 'completed'
                ), 0) AS paid_cents
            FROM purchase_orders po
            JOIN suppliers s ON s.id = po.supplier_id
            WHERE 1 = 1
            "#,
        );
        push_filters(&mut select, filter);
        select
            .push(" ORDER BY po.order_date DESC, po.created_at DESC LIMIT ")
            .push_bind(page.limit())
            .push(" OFFSET ")
            .push_bind(page.offset());
        let rows = select
            .build_query_as::<SummaryRow>()
            .fetch_all(&self.pool)
            .await?;

        let items = rows
            .into_iter()
            .map(|row| {
                let balance = Balance::new(row.order.total(), Money::from_cents(row.paid_cents));
                PurchaseOrderSummary {
                    order: row.order,
                    supplier_name: row.supplier_name,
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

    pub async fn update_status(&self, id: &str, status: PurchaseOrderStatus) -> DbResult<()> {
        debug!(id = %id, status = %status, "Updating purchase order status");

        let mut conn = self.pool.acquire().await?;
        set_status(&mut conn, id, status).await
    }

    /// Deletes a purchase order that has not been (partly) received or paid.
    pub async fn delete_order(&self, id: &str) -> DbResult<()> {
        let mut tx = self.pool.begin().await?;

        let order = fetch_order(&mut tx, id).await?;
        if matches!(
            order.status,
            PurchaseOrderStatus::Received | PurchaseOrderStatus::Partial
        ) {
            return Err(CoreError::invalid_state("Purchase order", order.status.as_str(), "delete").into());
        }

        let payments: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM purchase_payments WHERE purchase_order_id = ?1")
                .bind(id)
                .fetch_one(&mut *tx)
                .await?;
        if payments > 0 {
            return Err(CoreError::invalid_state("Purchase order", "partly settled", "delete").into());
        }

        sqlx::query("DELETE FROM purchase_orders WHERE id = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        info!(po_number = %order.po_number, "Purchase order deleted");
        Ok(())
    }

    /// Every purchase order, oldest first.
    pub async fn all_orders(&self) -> DbResult<Vec<PurchaseOrder>> {
        let orders = sqlx::query_as::<_, PurchaseOrder>("SELECT * FROM purchase_orders ORDER BY created_at")
            .fetch_all(&self.pool)
            .await?;

        Ok(orders)
    }

    // =========================================================================
    // Supplier Invoices
    // =========================================================================

    pub async fn create_invoice(&self, invoice: &PurchaseInvoice) -> DbResult<()> {
        debug!(po_id = %invoice.purchase_order_id, number = %invoice.invoice_number, "Creating purchase invoice");

        sqlx::query(
            r#"
            INSERT INTO purchase_invoices (
                id, invoice_number, purchase_order_id, supplier_id, invoice_date, due_date,
                status, total_cents, notes, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
        )
        .bind(&invoice.id)
        .bind(&invoice.invoice_number)
        .bind(&invoice.purchase_order_id)
        .bind(&invoice.supplier_id)
        .bind(invoice.invoice_date)
        .bind(invoice.due_date)
        .bind(invoice.status)
        .bind(invoice.total_cents)
        .bind(&invoice.notes)
        .bind(invoice.created_at)
        .bind(invoice.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn get_invoice(&self, id: &str) -> DbResult<Option<PurchaseInvoice>> {
        let invoice =
            sqlx::query_as::<_, PurchaseInvoice>("SELECT * FROM purchase_invoices WHERE id = ?1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(invoice)
    }

    /// Most recent supplier invoice for a purchase order.
    pub async fn get_invoice_by_order(&self, purchase_order_id: &str) -> DbResult<Option<PurchaseInvoice>> {
        let invoice = sqlx::query_as::<_, PurchaseInvoice>(
            r#"
            SELECT * FROM purchase_invoices
            WHERE purchase_order_id = ?1
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(purchase_order_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(invoice)
    }

    // =========================================================================
    // Supplier Payments
    // =========================================================================

    pub async fn total_paid(&self, purchase_order_id: &str) -> DbResult<Money> {
        let mut conn = self.pool.acquire().await?;
        completed_paid(&mut conn, purchase_order_id).await
    }

    /// Records a supplier payment under the same settlement rules as sales.
    ///
    /// The PO's payment status is re-derived and its open invoices are
    /// marked paid once nothing is due.
    pub async fn record_payment(&self, payment: &PurchasePayment) -> DbResult<Balance> {
        debug!(
            po_id = %payment.purchase_order_id,
            amount_cents = payment.amount_cents,
            reference = %payment.reference_number,
            "Recording purchase payment"
        );

        let mut tx = self.pool.begin().await?;

        let order = fetch_order(&mut tx, &payment.purchase_order_id).await?;
        match order.payment_status {
            PaymentStatus::Paid => return Err(CoreError::AlreadyPaid.into()),
            PaymentStatus::Refunded => {
                return Err(CoreError::invalid_state(
                    format!("Purchase order {}", order.po_number),
                    "refunded",
                    "take payments",
                )
                .into())
            }
            PaymentStatus::Unpaid | PaymentStatus::PartiallyPaid => {}
        }
        let paid = completed_paid(&mut tx, &order.id).await?;
        let balance =
            Balance::new(order.total(), paid).apply(Money::from_cents(payment.amount_cents))?;

        sqlx::query(
            r#"
            INSERT INTO purchase_payments (
                id, reference_number, purchase_order_id, purchase_invoice_id, amount_cents,
                payment_date, payment_method, status, notes, created_by, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
        )
        .bind(&payment.id)
        .bind(&payment.reference_number)
        .bind(&payment.purchase_order_id)
        .bind(&payment.purchase_invoice_id)
        .bind(payment.amount_cents)
        .bind(payment.payment_date)
        .bind(payment.payment_method)
        .bind(payment.status)
        .bind(&payment.notes)
        .bind(&payment.created_by)
        .bind(payment.created_at)
        .execute(&mut *tx)
        .await?;

        let now = Utc::now();
        sqlx::query("UPDATE purchase_orders SET payment_status = ?2, updated_at = ?3 WHERE id = ?1")
            .bind(&order.id)
            .bind(balance.status())
            .bind(now)
            .execute(&mut *tx)
            .await?;

        if balance.is_settled() {
            sqlx::query(
                r#"
                UPDATE purchase_invoices SET status = 'paid', updated_at = ?2
                WHERE purchase_order_id = ?1 AND status != 'cancelled'
                "#,
            )
            .bind(&order.id)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        info!(po_number = %order.po_number, due = %balance.due, "Purchase payment recorded");
        Ok(balance)
    }

    pub async fn list_payments(&self, purchase_order_id: &str) -> DbResult<Vec<PurchasePayment>> {
        let payments = sqlx::query_as::<_, PurchasePayment>(
            "SELECT * FROM purchase_payments WHERE purchase_order_id = ?1 ORDER BY created_at",
        )
        .bind(purchase_order_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(payments)
    }

    // =========================================================================
    // Goods Receipts
    // =========================================================================

    /// Books a goods receipt against a purchase order.
    ///
    /// ## Errors
    /// * `DbError::Rule(InvalidState)` - PO already received or cancelled
    pub async fn receive_goods(&self, receipt: &PurchaseReceipt) -> DbResult<()> {
        debug!(
            po_id = %receipt.purchase_order_id,
            number = %receipt.receipt_number,
            status = ?receipt.status,
            "Receiving goods"
        );

        let mut tx = self.pool.begin().await?;

        let order = fetch_order(&mut tx, &receipt.purchase_order_id).await?;
        if !order.status.can_receive() {
            return Err(CoreError::invalid_state(
                "Purchase order",
                order.status.as_str(),
                "receive goods",
            )
            .into());
        }

        sqlx::query(
            r#"
            INSERT INTO purchase_receipts (
                id, receipt_number, purchase_order_id, receipt_date, status,
                notes, received_by, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(&receipt.id)
        .bind(&receipt.receipt_number)
        .bind(&receipt.purchase_order_id)
        .bind(receipt.receipt_date)
        .bind(receipt.status)
        .bind(&receipt.notes)
        .bind(&receipt.received_by)
        .bind(receipt.created_at)
        .execute(&mut *tx)
        .await?;

        if receipt.status == ReceiptStatus::Completed {
            let lines: Vec<(String, i64)> = sqlx::query_as(
                r#"
                SELECT i.product_id, i.quantity
                FROM purchase_order_items i
                JOIN products p ON p.id = i.product_id
                WHERE i.purchase_order_id = ?1 AND p.product_type != 'service'
                ORDER BY i.position
                "#,
            )
            .bind(&order.id)
            .fetch_all(&mut *tx)
            .await?;

            for (product_id, quantity) in &lines {
                apply_stock_movement(
                    &mut tx,
                    MovementRecord {
                        product_id,
                        movement_type: MovementType::Purchase,
                        quantity: *quantity,
                        reference_type: Some(PURCHASE_ORDER_REF),
                        reference_id: Some(&order.id),
                        notes: Some(&receipt.receipt_number),
                        created_by: receipt.received_by.as_deref(),
                    },
                )
                .await?;
            }
        }

        if let Some(status) = receipt.status.order_status() {
            set_status(&mut tx, &order.id, status).await?;
        }

        tx.commit().await?;

        info!(po_number = %order.po_number, receipt = %receipt.receipt_number, "Goods received");
        Ok(())
    }

    pub async fn list_receipts(&self, purchase_order_id: &str) -> DbResult<Vec<PurchaseReceipt>> {
        let receipts = sqlx::query_as::<_, PurchaseReceipt>(
            "SELECT * FROM purchase_receipts WHERE purchase_order_id = ?1 ORDER BY created_at",
        )
        .bind(purchase_order_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(receipts)
    }
}

// =============================================================================
// Connection-level Helpers
// =============================================================================

async fn fetch_order(conn: &mut SqliteConnection, id: &str) -> DbResult<PurchaseOrder> {
    sqlx::query_as::<_, PurchaseOrder>("SELECT * FROM purchase_orders WHERE id = ?1")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| DbError::not_found("Purchase order", id))
}

async fn completed_paid(conn: &mut SqliteConnection, purchase_order_id: &str) -> DbResult<Money> {
    let paid: i64 = sqlx::query_scalar(
        r#"
        SELECT COALESCE(SUM(amount_cents), 0) FROM purchase_payments
        WHERE purchase_order_id = ?1 AND status = 'completed'
        "#,
    )
    .bind(purchase_order_id)
    .fetch_one(&mut *conn)
    .await?;

    Ok(Money::from_cents(paid))
}

async fn set_status(conn: &mut SqliteConnection, id: &str, status: PurchaseOrderStatus) -> DbResult<()> {
    let now = Utc::now();
    let received_at = (status == PurchaseOrderStatus::Received).then_some(now);

    let result = sqlx::query(
        r#"
        UPDATE purchase_orders
        SET status = ?2, received_at = COALESCE(?3, received_at), updated_at = ?4
        WHERE id = ?1
        "#,
    )
    .bind(id)
    .bind(status)
    .bind(received_at)
    .bind(now)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::not_found("Purchase order", id));
    }
    Ok(())
}

fn push_filters(qb: &mut QueryBuilder<'_, Sqlite>, filter: &PurchaseOrderFilter) {
    if let Some(status) = filter.status {
        qb.push(" AND po.status = ").push_bind(status);
    }
    if let Some(supplier_id) = &filter.supplier_id {
        qb.push(" AND po.supplier_id = ").push_bind(supplier_id.clone());
    }
    if let Some(term) = &filter.search {
        let pattern = like_pattern(term);
        qb.push(" AND (po.po_number LIKE ")
            .push_bind(pattern.clone())
            .push(" ESCAPE '\\' OR s.name LIKE ")
            .push_bind(pattern)
            .push(" ESCAPE '\\')");
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
    use chrono::NaiveDate;
    use tradeflow_core::{PaymentMethod, PaymentRecordStatus, Product, Supplier};
    use uuid::Uuid;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 4, 1).unwrap()
    }

    fn po_for(supplier: &Supplier, lines: &[(&Product, i64)]) -> (PurchaseOrder, Vec<PurchaseOrderItem>) {
        let now = Utc::now();
        let id = Uuid::new_v4().to_string();
        let items: Vec<PurchaseOrderItem> = lines
            .iter()
            .map(|(product, qty)| PurchaseOrderItem {
                id: Uuid::new_v4().to_string(),
                purchase_order_id: id.clone(),
                product_id: product.id.clone(),
                quantity: *qty,
                unit_cost_cents: 400,
                discount_cents: 0,
                tax_bps: 500,
                line_total_cents: 400 * qty,
                tax_cents: 20 * qty,
                created_at: now,
            })
            .collect();
        let subtotal: i64 = items.iter().map(|i| i.line_total_cents).sum();
        let tax: i64 = items.iter().map(|i| i.tax_cents).sum();

        let order = PurchaseOrder {
            id,
            po_number: document_number("PO"),
            supplier_id: supplier.id.clone(),
            status: PurchaseOrderStatus::Ordered,
            payment_status: PaymentStatus::Unpaid,
            order_date: day(),
            expected_date: None,
            subtotal_cents: subtotal,
            item_tax_cents: tax,
            order_tax_bps: 0,
            order_tax_cents: 0,
            tax_cents: tax,
            order_discount_cents: 0,
            discount_cents: 0,
            total_cents: subtotal + tax,
            notes: None,
            created_by: None,
            received_at: None,
            created_at: now,
            updated_at: now,
        };
        (order, items)
    }

    fn receipt(order: &PurchaseOrder, status: ReceiptStatus) -> PurchaseReceipt {
        PurchaseReceipt {
            id: Uuid::new_v4().to_string(),
            receipt_number: document_number("GRN"),
            purchase_order_id: order.id.clone(),
            receipt_date: day(),
            status,
            notes: None,
            received_by: None,
            created_at: Utc::now(),
        }
    }

    fn supplier_payment(order: &PurchaseOrder, cents: i64) -> PurchasePayment {
        PurchasePayment {
            id: Uuid::new_v4().to_string(),
            reference_number: document_number("PAY"),
            purchase_order_id: order.id.clone(),
            purchase_invoice_id: None,
            amount_cents: cents,
            payment_date: day(),
            payment_method: PaymentMethod::BankTransfer,
            status: PaymentRecordStatus::Completed,
            notes: None,
            created_by: None,
            created_at: Utc::now(),
        }
    }

    async fn placed_po(db: &Database) -> (Product, Product, PurchaseOrder) {
        let supplier = supplier(db, "ACME").await;
        let bolts = stocked_product(db, "BOLT", 100, 4).await;
        let nuts = stocked_product(db, "NUT", 100, 0).await;
        let (order, items) = po_for(&supplier, &[(&bolts, 10), (&nuts, 25)]);
        db.purchases().create_order(&order, &items).await.unwrap();
        (bolts, nuts, order)
    }

    #[tokio::test]
    async fn test_completed_receipt_adds_stock_per_item() {
        let db = test_db().await;
        let (bolts, nuts, order) = placed_po(&db).await;

        db.purchases()
            .receive_goods(&receipt(&order, ReceiptStatus::Completed))
            .await
            .unwrap();

        let bolts_after = db.products().get_by_id(&bolts.id).await.unwrap().unwrap();
        let nuts_after = db.products().get_by_id(&nuts.id).await.unwrap().unwrap();
        assert_eq!(bolts_after.stock_quantity, 14);
        assert_eq!(nuts_after.stock_quantity, 25);

        let movements = db
            .products()
            .list_movements(&nuts.id, PageRequest::default())
            .await
            .unwrap();
        assert_eq!(movements.total, 1);
        assert_eq!(movements.items[0].movement_type, MovementType::Purchase);

        let stored = db.purchases().get_order(&order.id).await.unwrap().unwrap();
        assert_eq!(stored.status, PurchaseOrderStatus::Received);
        assert!(stored.received_at.is_some());
        assert_eq!(db.purchases().list_receipts(&order.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_receiving_twice_is_rejected() {
        let db = test_db().await;
        let (bolts, _, order) = placed_po(&db).await;

        db.purchases()
            .receive_goods(&receipt(&order, ReceiptStatus::Completed))
            .await
            .unwrap();
        let err = db
            .purchases()
            .receive_goods(&receipt(&order, ReceiptStatus::Completed))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Rule(CoreError::InvalidState { .. })));

        let bolts_after = db.products().get_by_id(&bolts.id).await.unwrap().unwrap();
        assert_eq!(bolts_after.stock_quantity, 14);
    }

    #[tokio::test]
    async fn test_partial_receipt_only_moves_status() {
        let db = test_db().await;
        let (bolts, _, order) = placed_po(&db).await;

        db.purchases()
            .receive_goods(&receipt(&order, ReceiptStatus::Partial))
            .await
            .unwrap();

        let stored = db.purchases().get_order(&order.id).await.unwrap().unwrap();
        assert_eq!(stored.status, PurchaseOrderStatus::Partial);
        let bolts_after = db.products().get_by_id(&bolts.id).await.unwrap().unwrap();
        assert_eq!(bolts_after.stock_quantity, 4);
    }

    #[tokio::test]
    async fn test_payments_rederive_po_status() {
        let db = test_db().await;
        let (_, _, order) = placed_po(&db).await;
        let total = order.total_cents;

        let first = db
            .purchases()
            .record_payment(&supplier_payment(&order, 1_000))
            .await
            .unwrap();
        assert_eq!(first.status(), PaymentStatus::PartiallyPaid);

        let stored = db.purchases().get_order(&order.id).await.unwrap().unwrap();
        assert_eq!(stored.payment_status, PaymentStatus::PartiallyPaid);

        let err = db
            .purchases()
            .record_payment(&supplier_payment(&order, total))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Rule(CoreError::Overpayment { .. })));

        db.purchases()
            .record_payment(&supplier_payment(&order, total - 1_000))
            .await
            .unwrap();
        let stored = db.purchases().get_order(&order.id).await.unwrap().unwrap();
        assert_eq!(stored.payment_status, PaymentStatus::Paid);
        assert_eq!(db.purchases().total_paid(&order.id).await.unwrap().cents(), total);
    }

    #[tokio::test]
    async fn test_list_includes_supplier_and_balance() {
        let db = test_db().await;
        let (_, _, order) = placed_po(&db).await;
        db.purchases()
            .record_payment(&supplier_payment(&order, 500))
            .await
            .unwrap();

        let page = db
            .purchases()
            .list_orders(
                &PurchaseOrderFilter {
                    search: Some("acme".to_string()),
                    ..Default::default()
                },
                PageRequest::default(),
            )
            .await
            .unwrap();
        assert_eq!(page.total, 1);
        let summary = &page.items[0];
        assert_eq!(summary.supplier_name, "Supplier ACME");
        assert_eq!(summary.balance.paid.cents(), 500);
        assert_eq!(summary.balance.due.cents(), order.total_cents - 500);
    }

    #[tokio::test]
    async fn test_delete_rules() {
        let db = test_db().await;
        let (_, _, order) = placed_po(&db).await;
        db.purchases()
            .receive_goods(&receipt(&order, ReceiptStatus::Completed))
            .await
            .unwrap();
        let err = db.purchases().delete_order(&order.id).await.unwrap_err();
        assert!(matches!(err, DbError::Rule(CoreError::InvalidState { .. })));

        let supplier = supplier(&db, "OTHER").await;
        let widget = stocked_product(&db, "WIDGET", 100, 0).await;
        let (fresh, items) = po_for(&supplier, &[(&widget, 1)]);
        db.purchases().create_order(&fresh, &items).await.unwrap();
        db.purchases().delete_order(&fresh.id).await.unwrap();
        assert!(db.purchases().get_order(&fresh.id).await.unwrap().is_none());
        assert!(db.purchases().get_items(&fresh.id).await.unwrap().is_empty());
    }
}
