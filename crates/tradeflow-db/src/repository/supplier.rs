//! # Supplier Repository
//!
//! Database operations for suppliers. Codes are unique.

use chrono::Utc;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use tracing::debug;

use super::like_pattern;
use crate::error::{DbError, DbResult};
use tradeflow_core::{Page, PageRequest, Supplier};

/// Repository for supplier database operations.
#[derive(Debug, Clone)]
pub struct SupplierRepository {
    pool: SqlitePool,
}

impl SupplierRepository {
    /// Creates a new SupplierRepository.
    pub fn new(pool: SqlitePool) -> Self {
        SupplierRepository { pool }
    }

    /// Inserts a new supplier.
    ///
    /// ## Returns
    /// * `Err(DbError::UniqueViolation)` - code already used
    pub async fn insert(&self, supplier: &Supplier) -> DbResult<()> {
        debug!(id = %supplier.id, code = %supplier.code, "Inserting supplier");

        sqlx::query(
            r#"
            INSERT INTO suppliers (
                id, code, name, contact_person, email, phone, address, city,
                country, tax_id, payment_terms, is_active, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
            "#,
        )
        .bind(&supplier.id)
        .bind(&supplier.code)
        .bind(&supplier.name)
        .bind(&supplier.contact_person)
        .bind(&supplier.email)
        .bind(&supplier.phone)
        .bind(&supplier.address)
        .bind(&supplier.city)
        .bind(&supplier.country)
        .bind(&supplier.tax_id)
        .bind(&supplier.payment_terms)
        .bind(supplier.is_active)
        .bind(supplier.created_at)
        .bind(supplier.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::UniqueViolation { .. } => DbError::duplicate("code", &supplier.code),
            other => other,
        })?;

        Ok(())
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Supplier>> {
        let supplier = sqlx::query_as::<_, Supplier>("SELECT * FROM suppliers WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(supplier)
    }

    pub async fn get_by_code(&self, code: &str) -> DbResult<Option<Supplier>> {
        let supplier = sqlx::query_as::<_, Supplier>("SELECT * FROM suppliers WHERE code = ?1")
            .bind(code)
            .fetch_optional(&self.pool)
            .await?;

        Ok(supplier)
    }

    /// Lists suppliers by name. `search` matches name and code.
    pub async fn list(
        &self,
        search: Option<&str>,
        active: Option<bool>,
        page: PageRequest,
    ) -> DbResult<Page<Supplier>> {
        debug!(search = ?search, active = ?active, page = page.page, "Listing suppliers");

        let mut count = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM suppliers WHERE 1 = 1");
        push_filters(&mut count, search, active);
        let total: i64 = count.build_query_scalar().fetch_one(&self.pool).await?;

        let mut select = QueryBuilder::<Sqlite>::new("SELECT * FROM suppliers WHERE 1 = 1");
        push_filters(&mut select, search, active);
        select
            .push(" ORDER BY name LIMIT ")
            .push_bind(page.limit())
            .push(" OFFSET ")
            .push_bind(page.offset());
        let items = select
            .build_query_as::<Supplier>()
            .fetch_all(&self.pool)
            .await?;

        Ok(Page {
            items,
            total,
            page: page.page,
            per_page: page.per_page(),
        })
    }

    /// Writes every editable field. The code is immutable.
    pub async fn update(&self, supplier: &Supplier) -> DbResult<()> {
        debug!(id = %supplier.id, "Updating supplier");

        let result = sqlx::query(
            r#"
            UPDATE suppliers SET
                name = ?2, contact_person = ?3, email = ?4, phone = ?5, address = ?6,
                city = ?7, country = ?8, tax_id = ?9, payment_terms = ?10,
                is_active = ?11, updated_at = ?12
            WHERE id = ?1
            "#,
        )
        .bind(&supplier.id)
        .bind(&supplier.name)
        .bind(&supplier.contact_person)
        .bind(&supplier.email)
        .bind(&supplier.phone)
        .bind(&supplier.address)
        .bind(&supplier.city)
        .bind(&supplier.country)
        .bind(&supplier.tax_id)
        .bind(&supplier.payment_terms)
        .bind(supplier.is_active)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Supplier", &supplier.id));
        }
        Ok(())
    }

    /// Soft-deletes or restores a supplier.
    pub async fn set_active(&self, id: &str, active: bool) -> DbResult<()> {
        let result = sqlx::query("UPDATE suppliers SET is_active = ?2, updated_at = ?3 WHERE id = ?1")
            .bind(id)
            .bind(active)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Supplier", id));
        }
        Ok(())
    }
}

fn push_filters(qb: &mut QueryBuilder<'_, Sqlite>, search: Option<&str>, active: Option<bool>) {
    if let Some(term) = search {
        let pattern = like_pattern(term);
        qb.push(" AND (name LIKE ")
            .push_bind(pattern.clone())
            .push(" ESCAPE '\\' OR code LIKE ")
            .push_bind(pattern)
            .push(" ESCAPE '\\')");
    }
    if let Some(active) = active {
        qb.push(" AND is_active = ").push_bind(active);
    }
}

#[cfg(test)]
mod tests {
    use crate::repository::test_support::*;
    use crate::DbError;
    use tradeflow_core::PageRequest;

    #[tokio::test]
    async fn test_duplicate_code_rejected() {
        let db = test_db().await;
        let first = supplier(&db, "ACME").await;

        let mut copy = first.clone();
        copy.id = uuid::Uuid::new_v4().to_string();
        let err = db.suppliers().insert(&copy).await.unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { field, .. } if field == "code"));
    }

    #[tokio::test]
    async fn test_search_by_code() {
        let db = test_db().await;
        supplier(&db, "ACME").await;
        supplier(&db, "GLOBEX").await;

        let page = db
            .suppliers()
            .list(Some("glob"), None, PageRequest::default())
            .await
            .unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].code, "GLOBEX");
    }

    #[tokio::test]
    async fn test_update_and_deactivate() {
        let db = test_db().await;
        let mut acme = supplier(&db, "ACME").await;
        acme.payment_terms = Some("NET60".to_string());
        db.suppliers().update(&acme).await.unwrap();
        db.suppliers().set_active(&acme.id, false).await.unwrap();

        let stored = db.suppliers().get_by_code("ACME").await.unwrap().unwrap();
        assert_eq!(stored.payment_terms.as_deref(), Some("NET60"));
        assert!(!stored.is_active);
    }
}
