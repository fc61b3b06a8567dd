//! # Repository Module
//!
//! Database repository implementations for Tradeflow.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Repository Pattern                                   │
//! │                                                                         │
//! │  Service (apps/backoffice)                                             │
//! │       │                                                                 │
//! │       │  db.sales().create_order(&order, &items, &requirements)        │
//! │       ▼                                                                 │
//! │  SalesRepository                                                       │
//! │  ├── create_order   ← one transaction: order, items, stock, balance   │
//! │  ├── get_order / list_orders                                           │
//! │  └── record_payment ← balance check inside the transaction            │
//! │       │                                                                 │
//! │       │  SQL                                                            │
//! │       ▼                                                                 │
//! │  SQLite Database                                                       │
//! │                                                                         │
//! │  Services validate and price; repositories only persist and enforce    │
//! │  the rules that need the database state at write time.                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`CustomerRepository`](customer::CustomerRepository) - Customers and balances
//! - [`SupplierRepository`](supplier::SupplierRepository) - Suppliers
//! - [`ProductRepository`](product::ProductRepository) - Products and stock movements
//! - [`SalesRepository`](sales::SalesRepository) - Orders, invoices, payments, deliveries
//! - [`PurchaseRepository`](purchase::PurchaseRepository) - POs, invoices, payments, receipts
//! - [`AccountingRepository`](accounting::AccountingRepository) - Heads, ledger, payroll, tax
//! - [`StaffRepository`](staff::StaffRepository) - Departments, staff, leaves

pub mod accounting;
pub mod customer;
pub mod product;
pub mod purchase;
pub mod sales;
pub mod staff;
pub mod supplier;

use chrono::{NaiveDate, Utc};
use sqlx::SqliteConnection;
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use tradeflow_core::{MovementType, StockMovement};

// =============================================================================
// Shared Helpers
// =============================================================================

/// Inclusive date range for ledger and report queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

impl DateRange {
    pub fn new(from: NaiveDate, to: NaiveDate) -> Self {
        DateRange { from, to }
    }
}

/// Generates a human-readable document number.
///
/// ## Format
/// `{PREFIX}-{YYYYMMDD}-{8 hex chars}`
///
/// ```text
/// ORD-20250115-3F9A12C0
/// │   │        │
/// │   │        └── first 8 chars of a v4 UUID, uppercased
/// │   └─────────── creation date (UTC)
/// └─────────────── document kind (ORD, INV, REC, DEL, PO, PINV, PAY, GRN)
/// ```
pub fn document_number(prefix: &str) -> String {
    let suffix: String = Uuid::new_v4()
        .simple()
        .to_string()
        .chars()
        .take(8)
        .collect();
    format!(
        "{}-{}-{}",
        prefix,
        Utc::now().format("%Y%m%d"),
        suffix.to_uppercase()
    )
}

/// Builds a LIKE pattern matching `term` anywhere, with wildcards escaped.
///
/// Use with `LIKE ? ESCAPE '\'`.
pub(crate) fn like_pattern(term: &str) -> String {
    let mut pattern = String::with_capacity(term.len() + 2);
    pattern.push('%');
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

/// A stock change to apply and record.
#[derive(Debug, Clone)]
pub(crate) struct MovementRecord<'a> {
    pub product_id: &'a str,
    pub movement_type: MovementType,
    /// Unsigned for Purchase/Sale/Return; signed for Adjustment/Transfer.
    pub quantity: i64,
    pub reference_type: Option<&'a str>,
    pub reference_id: Option<&'a str>,
    pub notes: Option<&'a str>,
    pub created_by: Option<&'a str>,
}

/// Moves stock and records the movement, on the caller's connection.
///
/// ## Guarded Update
/// ```text
/// UPDATE products SET stock_quantity = stock_quantity + delta
/// WHERE id = ? AND stock_quantity + delta >= 0
///      │
///      ├── 1 row  → insert stock_movements row
///      └── 0 rows → product missing (NotFound) or short (InsufficientStock)
/// ```
///
/// Always called with a transaction's connection so a shortfall on any line
/// rolls back everything written before it.
pub(crate) async fn apply_stock_movement(
    conn: &mut SqliteConnection,
    record: MovementRecord<'_>,
) -> DbResult<StockMovement> {
    let delta = record.movement_type.signed_quantity(record.quantity);
    let now = Utc::now();

    debug!(
        product_id = %record.product_id,
        movement = %record.movement_type,
        delta = delta,
        "Applying stock movement"
    );

    let result = sqlx::query(
        r#"
        UPDATE products
        SET stock_quantity = stock_quantity + ?1, updated_at = ?2
        WHERE id = ?3 AND stock_quantity + ?1 >= 0
        "#,
    )
    .bind(delta)
    .bind(now)
    .bind(record.product_id)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        let current: Option<(String, i64)> =
            sqlx::query_as("SELECT sku, stock_quantity FROM products WHERE id = ?1")
                .bind(record.product_id)
                .fetch_optional(&mut *conn)
                .await?;

        return Err(match current {
            Some((sku, available)) => DbError::InsufficientStock {
                sku,
                available,
                requested: -delta,
            },
            None => DbError::not_found("Product", record.product_id),
        });
    }

    let movement = StockMovement {
        id: Uuid::new_v4().to_string(),
        product_id: record.product_id.to_string(),
        movement_type: record.movement_type,
        quantity: delta,
        reference_type: record.reference_type.map(str::to_string),
        reference_id: record.reference_id.map(str::to_string),
        notes: record.notes.map(str::to_string),
        created_by: record.created_by.map(str::to_string),
        created_at: now,
    };

    sqlx::query(
        r#"
        INSERT INTO stock_movements (
            id, product_id, movement_type, quantity,
            reference_type, reference_id, notes, created_by, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
        "#,
    )
    .bind(&movement.id)
    .bind(&movement.product_id)
    .bind(movement.movement_type)
    .bind(movement.quantity)
    .bind(&movement.reference_type)
    .bind(&movement.reference_id)
    .bind(&movement.notes)
    .bind(&movement.created_by)
    .bind(movement.created_at)
    .execute(&mut *conn)
    .await?;

    Ok(movement)
}

/// Shifts a customer's outstanding balance by `delta_cents`.
pub(crate) async fn shift_customer_balance(
    conn: &mut SqliteConnection,
    customer_id: &str,
    delta_cents: i64,
) -> DbResult<()> {
    let result = sqlx::query(
        r#"
        UPDATE customers
        SET outstanding_balance_cents = outstanding_balance_cents + ?1, updated_at = ?2
        WHERE id = ?3
        "#,
    )
    .bind(delta_cents)
    .bind(Utc::now())
    .bind(customer_id)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::not_found("Customer", customer_id));
    }
    Ok(())
}

// =============================================================================
// Test Support
// =============================================================================

#[cfg(test)]
pub(crate) mod test_support {
    use chrono::Utc;
    use uuid::Uuid;

    use crate::{Database, DbConfig};
    use tradeflow_core::{Customer, Product, ProductType, Supplier};

    pub async fn test_db() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    pub async fn customer(db: &Database, name: &str) -> Customer {
        let now = Utc::now();
        let customer = Customer {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            email: Some(format!("{}@example.com", name.to_lowercase().replace(' ', "."))),
            phone: None,
            company: None,
            address: Some("1 Harbour Road".to_string()),
            city: None,
            country: None,
            tax_id: None,
            credit_limit_cents: 500_000,
            outstanding_balance_cents: 0,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        db.customers().insert(&customer).await.unwrap();
        customer
    }

    pub async fn supplier(db: &Database, code: &str) -> Supplier {
        let now = Utc::now();
        let supplier = Supplier {
            id: Uuid::new_v4().to_string(),
            code: code.to_string(),
            name: format!("Supplier {code}"),
            contact_person: None,
            email: None,
            phone: None,
            address: None,
            city: None,
            country: None,
            tax_id: None,
            payment_terms: Some("NET30".to_string()),
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        db.suppliers().insert(&supplier).await.unwrap();
        supplier
    }

    pub fn product(sku: &str, price_cents: i64, stock: i64) -> Product {
        let now = Utc::now();
        Product {
            id: Uuid::new_v4().to_string(),
            sku: sku.to_string(),
            barcode: None,
            name: format!("Product {sku}"),
            description: None,
            product_type: ProductType::Standard,
            unit: Some("pcs".to_string()),
            category_id: None,
            price_cents,
            cost_cents: price_cents / 2,
            sales_tax_bps: 1000,
            purchase_tax_bps: 500,
            stock_quantity: stock,
            min_stock_level: Some(5),
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    pub async fn stocked_product(db: &Database, sku: &str, price_cents: i64, stock: i64) -> Product {
        let product = product(sku, price_cents, stock);
        db.products().insert(&product, None).await.unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;

    #[test]
    fn test_document_number_format() {
        let number = document_number("ORD");
        let parts: Vec<&str> = number.split('-').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "ORD");
        assert_eq!(parts[1].len(), 8);
        assert_eq!(parts[2].len(), 8);
        assert_eq!(parts[2], parts[2].to_uppercase());
    }

    #[test]
    fn test_document_numbers_differ() {
        assert_ne!(document_number("INV"), document_number("INV"));
    }

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("abc"), "%abc%");
        assert_eq!(like_pattern("50%_off"), "%50\\%\\_off%");
        assert_eq!(like_pattern("a\\b"), "%a\\\\b%");
    }

    #[tokio::test]
    async fn test_guarded_decrement_rejects_shortfall() {
        let db = test_db().await;
        let product = stocked_product(&db, "WID-1", 1_000, 3).await;

        let mut conn = db.pool().acquire().await.unwrap();
        let err = apply_stock_movement(
            &mut conn,
            MovementRecord {
                product_id: &product.id,
                movement_type: MovementType::Sale,
                quantity: 4,
                reference_type: None,
                reference_id: None,
                notes: None,
                created_by: None,
            },
        )
        .await
        .unwrap_err();

        match err {
            DbError::InsufficientStock {
                sku,
                available,
                requested,
            } => {
                assert_eq!(sku, "WID-1");
                assert_eq!(available, 3);
                assert_eq!(requested, 4);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_movement_sign_is_recorded() {
        let db = test_db().await;
        let product = stocked_product(&db, "WID-2", 1_000, 10).await;

        let mut conn = db.pool().acquire().await.unwrap();
        let movement = apply_stock_movement(
            &mut conn,
            MovementRecord {
                product_id: &product.id,
                movement_type: MovementType::Sale,
                quantity: 4,
                reference_type: Some("sales_order"),
                reference_id: Some("order-1"),
                notes: None,
                created_by: None,
            },
        )
        .await
        .unwrap();
        drop(conn);

        assert_eq!(movement.quantity, -4);
        let stored = db.products().get_by_id(&product.id).await.unwrap().unwrap();
        assert_eq!(stored.stock_quantity, 6);
    }

    #[tokio::test]
    async fn test_unknown_product_is_not_found() {
        let db = test_db().await;
        let mut conn = db.pool().acquire().await.unwrap();
        let err = apply_stock_movement(
            &mut conn,
            MovementRecord {
                product_id: "missing",
                movement_type: MovementType::Purchase,
                quantity: 1,
                reference_type: None,
                reference_id: None,
                notes: None,
                created_by: None,
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));
    }
}
