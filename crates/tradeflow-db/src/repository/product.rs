//! # Product Repository
//!
//! Database operations for products and their stock ledger.
//!
//! ## Stock Ledger
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    How Stock Changes                                    │
//! │                                                                         │
//! │  Every change goes through a delta update plus a movement row:         │
//! │                                                                         │
//! │     UPDATE products SET stock_quantity = stock_quantity + delta        │
//! │     INSERT INTO stock_movements (movement_type, quantity = delta ...)  │
//! │                                                                         │
//! │  opening stock   → Adjustment (+n)                                     │
//! │  adjust_stock    → Adjustment (±n)                                     │
//! │  sales order     → Sale (−n)         (sales repository)                │
//! │  order deleted   → Return (+n)       (sales repository)                │
//! │  goods received  → Purchase (+n)     (purchase repository)             │
//! │                                                                         │
//! │  Σ movements for a product = its stock_quantity                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use tracing::debug;

use super::{apply_stock_movement, like_pattern, MovementRecord};
use crate::error::{DbError, DbResult};
use tradeflow_core::{
    Category, MovementType, Page, PageRequest, Product, ProductFilter, StockMovement,
};

/// Repository for product database operations.
///
/// ## Usage
/// ```rust,ignore
/// let repo = db.products();
/// let product = repo.get_by_sku("WID-001").await?;
/// repo.adjust_stock(&product.id, -2, Some("damaged"), None).await?;
/// ```
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

impl ProductRepository {
    /// Creates a new ProductRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository { pool }
    }

    /// Inserts a new product.
    ///
    /// A non-zero `stock_quantity` is booked as an opening Adjustment
    /// movement in the same transaction.
    ///
    /// ## Returns
    /// * `Ok(Product)` - The inserted product
    /// * `Err(DbError::UniqueViolation)` - SKU already exists
    pub async fn insert(&self, product: &Product, created_by: Option<&str>) -> DbResult<Product> {
        debug!(sku = %product.sku, "Inserting product");

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO products (
                id, sku, barcode, name, description, product_type, unit, category_id,
                price_cents, cost_cents, sales_tax_bps, purchase_tax_bps,
                stock_quantity, min_stock_level, is_active, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, 0, ?13, ?14, ?15, ?16)
            "#,
        )
        .bind(&product.id)
        .bind(&product.sku)
        .bind(&product.barcode)
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.product_type)
        .bind(&product.unit)
        .bind(&product.category_id)
        .bind(product.price_cents)
        .bind(product.cost_cents)
        .bind(product.sales_tax_bps)
        .bind(product.purchase_tax_bps)
        .bind(product.min_stock_level)
        .bind(product.is_active)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::UniqueViolation { .. } => DbError::duplicate("sku", &product.sku),
            other => other,
        })?;

        if product.stock_quantity != 0 {
            apply_stock_movement(
                &mut tx,
                MovementRecord {
                    product_id: &product.id,
                    movement_type: MovementType::Adjustment,
                    quantity: product.stock_quantity,
                    reference_type: None,
                    reference_id: None,
                    notes: Some("opening stock"),
                    created_by,
                },
            )
            .await?;
        }

        tx.commit().await?;

        Ok(product.clone())
    }

    /// Gets a product by its ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>("SELECT * FROM products WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(product)
    }

    /// Gets a product by its SKU.
    pub async fn get_by_sku(&self, sku: &str) -> DbResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>("SELECT * FROM products WHERE sku = ?1")
            .bind(sku)
            .fetch_optional(&self.pool)
            .await?;

        Ok(product)
    }

    /// Lists products by name. `filter.search` matches SKU, name and barcode.
    pub async fn list(&self, filter: &ProductFilter, page: PageRequest) -> DbResult<Page<Product>> {
        debug!(?filter, page = page.page, "Listing products");

        let mut count = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM products WHERE 1 = 1");
        push_filters(&mut count, filter);
        let total: i64 = count.build_query_scalar().fetch_one(&self.pool).await?;

        let mut select = QueryBuilder::<Sqlite>::new("SELECT * FROM products WHERE 1 = 1");
        push_filters(&mut select, filter);
        select
            .push(" ORDER BY name LIMIT ")
            .push_bind(page.limit())
            .push(" OFFSET ")
            .push_bind(page.offset());
        let items = select
            .build_query_as::<Product>()
            .fetch_all(&self.pool)
            .await?;

        Ok(Page {
            items,
            total,
            page: page.page,
            per_page: page.per_page(),
        })
    }

    /// Updates catalog fields of an existing product.
    ///
    /// Stock is never written here; use [`adjust_stock`](Self::adjust_stock).
    pub async fn update(&self, product: &Product) -> DbResult<()> {
        debug!(id = %product.id, "Updating product");

        let result = sqlx::query(
            r#"
            UPDATE products SET
                barcode = ?2, name = ?3, description = ?4, product_type = ?5, unit = ?6,
                category_id = ?7, price_cents = ?8, cost_cents = ?9, sales_tax_bps = ?10,
                purchase_tax_bps = ?11, min_stock_level = ?12, is_active = ?13, updated_at = ?14
            WHERE id = ?1
            "#,
        )
        .bind(&product.id)
        .bind(&product.barcode)
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.product_type)
        .bind(&product.unit)
        .bind(&product.category_id)
        .bind(product.price_cents)
        .bind(product.cost_cents)
        .bind(product.sales_tax_bps)
        .bind(product.purchase_tax_bps)
        .bind(product.min_stock_level)
        .bind(product.is_active)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", &product.id));
        }

        Ok(())
    }

    /// Soft-deletes or restores a product.
    pub async fn set_active(&self, id: &str, active: bool) -> DbResult<()> {
        let result = sqlx::query("UPDATE products SET is_active = ?2, updated_at = ?3 WHERE id = ?1")
            .bind(id)
            .bind(active)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }
        Ok(())
    }

    /// Manually corrects stock by `delta` and records an Adjustment.
    ///
    /// ## Returns
    /// * `Err(DbError::InsufficientStock)` - delta would make stock negative
    pub async fn adjust_stock(
        &self,
        id: &str,
        delta: i64,
        reason: Option<&str>,
        created_by: Option<&str>,
    ) -> DbResult<StockMovement> {
        debug!(id = %id, delta = delta, "Adjusting stock");

        let mut tx = self.pool.begin().await?;
        let movement = apply_stock_movement(
            &mut tx,
            MovementRecord {
                product_id: id,
                movement_type: MovementType::Adjustment,
                quantity: delta,
                reference_type: None,
                reference_id: None,
                notes: reason,
                created_by,
            },
        )
        .await?;
        tx.commit().await?;

        Ok(movement)
    }

    /// Lists a product's stock movements, newest first.
    pub async fn list_movements(
        &self,
        product_id: &str,
        page: PageRequest,
    ) -> DbResult<Page<StockMovement>> {
        let total: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM stock_movements WHERE product_id = ?1")
                .bind(product_id)
                .fetch_one(&self.pool)
                .await?;

        let items = sqlx::query_as::<_, StockMovement>(
            r#"
            SELECT * FROM stock_movements
            WHERE product_id = ?1
            ORDER BY created_at DESC, rowid DESC
            LIMIT ?2 OFFSET ?3
            "#,
        )
        .bind(product_id)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;

        Ok(Page {
            items,
            total,
            page: page.page,
            per_page: page.per_page(),
        })
    }

    /// Active stocked products at or below their minimum level, most short first.
    pub async fn low_stock(&self, page: PageRequest) -> DbResult<Page<Product>> {
        const LOW_STOCK: &str = r#"
            is_active = 1
            AND product_type != 'service'
            AND min_stock_level IS NOT NULL
            AND stock_quantity <= min_stock_level
        "#;

        let total: i64 =
            sqlx::query_scalar(&format!("SELECT COUNT(*) FROM products WHERE {LOW_STOCK}"))
                .fetch_one(&self.pool)
                .await?;

        let items = sqlx::query_as::<_, Product>(&format!(
            "SELECT * FROM products WHERE {LOW_STOCK} \
             ORDER BY stock_quantity - min_stock_level, name LIMIT ?1 OFFSET ?2"
        ))
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;

        Ok(Page {
            items,
            total,
            page: page.page,
            per_page: page.per_page(),
        })
    }

    /// Gets the total number of products.
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    // =========================================================================
    // Categories
    // =========================================================================

    /// Inserts a category. Names are unique.
    pub async fn insert_category(&self, category: &Category) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO categories (id, name, description, parent_id, is_active, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(&category.id)
        .bind(&category.name)
        .bind(&category.description)
        .bind(&category.parent_id)
        .bind(category.is_active)
        .bind(category.created_at)
        .bind(category.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::UniqueViolation { .. } => DbError::duplicate("name", &category.name),
            other => other,
        })?;

        Ok(())
    }

    pub async fn get_category(&self, id: &str) -> DbResult<Option<Category>> {
        let category = sqlx::query_as::<_, Category>("SELECT * FROM categories WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(category)
    }

    /// Categories by name, optionally only the active ones.
    pub async fn list_categories(&self, active: Option<bool>) -> DbResult<Vec<Category>> {
        let mut select = QueryBuilder::<Sqlite>::new("SELECT * FROM categories WHERE 1 = 1");
        if let Some(active) = active {
            select.push(" AND is_active = ").push_bind(active);
        }
        select.push(" ORDER BY name");

        let categories = select
            .build_query_as::<Category>()
            .fetch_all(&self.pool)
            .await?;
        Ok(categories)
    }

    pub async fn update_category(&self, category: &Category) -> DbResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE categories SET
                name = ?2, description = ?3, parent_id = ?4, is_active = ?5, updated_at = ?6
            WHERE id = ?1
            "#,
        )
        .bind(&category.id)
        .bind(&category.name)
        .bind(&category.description)
        .bind(&category.parent_id)
        .bind(category.is_active)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::UniqueViolation { .. } => DbError::duplicate("name", &category.name),
            other => other,
        })?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Category", &category.id));
        }
        Ok(())
    }
}

fn push_filters(qb: &mut QueryBuilder<'_, Sqlite>, filter: &ProductFilter) {
    if let Some(term) = &filter.search {
        let pattern = like_pattern(term);
        qb.push(" AND (sku LIKE ")
            .push_bind(pattern.clone())
            .push(" ESCAPE '\\' OR name LIKE ")
            .push_bind(pattern.clone())
            .push(" ESCAPE '\\' OR barcode LIKE ")
            .push_bind(pattern)
            .push(" ESCAPE '\\')");
    }
    if let Some(active) = filter.active {
        qb.push(" AND is_active = ").push_bind(active);
    }
    if let Some(category_id) = &filter.category_id {
        qb.push(" AND category_id = ").push_bind(category_id.clone());
    }
}

#[cfg(test)]
mod tests {
    use crate::repository::test_support::*;
    use crate::DbError;
    use chrono::Utc;
    use tradeflow_core::{Category, MovementType, PageRequest, ProductFilter, ProductType};

    fn category(id: &str, name: &str, parent_id: Option<&str>) -> Category {
        let now = Utc::now();
        Category {
            id: id.to_string(),
            name: name.to_string(),
            description: None,
            parent_id: parent_id.map(str::to_string),
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_opening_stock_recorded_as_adjustment() {
        let db = test_db().await;
        let product = stocked_product(&db, "WID-001", 1_250, 12).await;

        let stored = db.products().get_by_id(&product.id).await.unwrap().unwrap();
        assert_eq!(stored.stock_quantity, 12);

        let movements = db
            .products()
            .list_movements(&product.id, PageRequest::default())
            .await
            .unwrap();
        assert_eq!(movements.total, 1);
        assert_eq!(movements.items[0].movement_type, MovementType::Adjustment);
        assert_eq!(movements.items[0].quantity, 12);
    }

    #[tokio::test]
    async fn test_duplicate_sku_rejected() {
        let db = test_db().await;
        stocked_product(&db, "DUP", 100, 0).await;

        let err = db
            .products()
            .insert(&product("DUP", 200, 0), None)
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { field, .. } if field == "sku"));
    }

    #[tokio::test]
    async fn test_adjust_stock_both_directions() {
        let db = test_db().await;
        let p = stocked_product(&db, "ADJ", 100, 10).await;

        db.products().adjust_stock(&p.id, -3, Some("damaged"), None).await.unwrap();
        db.products().adjust_stock(&p.id, 5, Some("recount"), None).await.unwrap();

        let stored = db.products().get_by_sku("ADJ").await.unwrap().unwrap();
        assert_eq!(stored.stock_quantity, 12);

        let err = db
            .products()
            .adjust_stock(&p.id, -13, None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::InsufficientStock { available: 12, requested: 13, .. }));
    }

    #[tokio::test]
    async fn test_low_stock_excludes_services_and_unset_levels() {
        let db = test_db().await;
        stocked_product(&db, "LOW", 100, 2).await;
        stocked_product(&db, "OK", 100, 50).await;

        let mut unset = product("UNSET", 100, 0);
        unset.min_stock_level = None;
        db.products().insert(&unset, None).await.unwrap();

        let mut service = product("SVC", 100, 0);
        service.product_type = ProductType::Service;
        db.products().insert(&service, None).await.unwrap();

        let low = db.products().low_stock(PageRequest::default()).await.unwrap();
        assert_eq!(low.total, 1);
        assert_eq!(low.items[0].sku, "LOW");
    }

    #[tokio::test]
    async fn test_update_keeps_stock() {
        let db = test_db().await;
        let mut p = stocked_product(&db, "UPD", 100, 7).await;
        p.price_cents = 150;
        p.stock_quantity = 999;
        db.products().update(&p).await.unwrap();

        let stored = db.products().get_by_id(&p.id).await.unwrap().unwrap();
        assert_eq!(stored.price_cents, 150);
        assert_eq!(stored.stock_quantity, 7);
        assert_eq!(db.products().count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_categories_and_category_filter() {
        let db = test_db().await;
        let repo = db.products();
        repo.insert_category(&category("c-hw", "Hardware", None)).await.unwrap();
        repo.insert_category(&category("c-fix", "Fixings", Some("c-hw"))).await.unwrap();

        let err = repo
            .insert_category(&category("c-dup", "Hardware", None))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { field, .. } if field == "name"));

        let mut bolt = product("BOLT", 100, 0);
        bolt.category_id = Some("c-fix".to_string());
        repo.insert(&bolt, None).await.unwrap();
        repo.insert(&product("LOOSE", 100, 0), None).await.unwrap();

        let fixings = repo
            .list(
                &ProductFilter {
                    category_id: Some("c-fix".to_string()),
                    ..Default::default()
                },
                PageRequest::default(),
            )
            .await
            .unwrap();
        assert_eq!(fixings.total, 1);
        assert_eq!(fixings.items[0].sku, "BOLT");

        let mut fixings = repo.get_category("c-fix").await.unwrap().unwrap();
        assert_eq!(fixings.parent_id.as_deref(), Some("c-hw"));
        fixings.is_active = false;
        repo.update_category(&fixings).await.unwrap();
        assert_eq!(repo.list_categories(Some(true)).await.unwrap().len(), 1);
        assert_eq!(repo.list_categories(None).await.unwrap().len(), 2);
    }
}
