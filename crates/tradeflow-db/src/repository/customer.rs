//! # Customer Repository
//!
//! Database operations for customers.
//!
//! Outstanding balances are not written here directly: the sales repository
//! shifts them inside the order and payment transactions.

use chrono::Utc;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use tracing::debug;

use super::like_pattern;
use crate::error::{DbError, DbResult};
use tradeflow_core::{Customer, Page, PageRequest};

/// Repository for customer database operations.
///
/// ## Usage
/// ```rust,ignore
/// let repo = db.customers();
/// let page = repo.list(Some("acme"), Some(true), PageRequest::default()).await?;
/// ```
#[derive(Debug, Clone)]
pub struct CustomerRepository {
    pool: SqlitePool,
}

impl CustomerRepository {
    /// Creates a new CustomerRepository.
    pub fn new(pool: SqlitePool) -> Self {
        CustomerRepository { pool }
    }

    /// Inserts a new customer.
    ///
    /// ## Returns
    /// * `Err(DbError::UniqueViolation)` - email already used
    pub async fn insert(&self, customer: &Customer) -> DbResult<()> {
        debug!(id = %customer.id, name = %customer.name, "Inserting customer");

        sqlx::query(
            r#"
            INSERT INTO customers (
                id, name, email, phone, company, address, city, country, tax_id,
                credit_limit_cents, outstanding_balance_cents, is_active,
                created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
            "#,
        )
        .bind(&customer.id)
        .bind(&customer.name)
        .bind(&customer.email)
        .bind(&customer.phone)
        .bind(&customer.company)
        .bind(&customer.address)
        .bind(&customer.city)
        .bind(&customer.country)
        .bind(&customer.tax_id)
        .bind(customer.credit_limit_cents)
        .bind(customer.outstanding_balance_cents)
        .bind(customer.is_active)
        .bind(customer.created_at)
        .bind(customer.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::UniqueViolation { .. } => {
                DbError::duplicate("email", customer.email.clone().unwrap_or_default())
            }
            other => other,
        })?;

        Ok(())
    }

    /// Gets a customer by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Customer>> {
        let customer = sqlx::query_as::<_, Customer>("SELECT * FROM customers WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(customer)
    }

    /// Gets a customer by email (case-insensitive).
    pub async fn find_by_email(&self, email: &str) -> DbResult<Option<Customer>> {
        let customer = sqlx::query_as::<_, Customer>(
            "SELECT * FROM customers WHERE email = ?1 COLLATE NOCASE",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(customer)
    }

    /// Lists customers, newest first.
    ///
    /// ## Arguments
    /// * `search` - matched against name, email and company
    /// * `active` - `Some(true)` for active only, `None` for all
    pub async fn list(
        &self,
        search: Option<&str>,
        active: Option<bool>,
        page: PageRequest,
    ) -> DbResult<Page<Customer>> {
        debug!(search = ?search, active = ?active, page = page.page, "Listing customers");

        let mut count = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM customers WHERE 1 = 1");
        push_filters(&mut count, search, active);
        let total: i64 = count.build_query_scalar().fetch_one(&self.pool).await?;

        let mut select = QueryBuilder::<Sqlite>::new("SELECT * FROM customers WHERE 1 = 1");
        push_filters(&mut select, search, active);
        select
            .push(" ORDER BY created_at DESC, name LIMIT ")
            .push_bind(page.limit())
            .push(" OFFSET ")
            .push_bind(page.offset());
        let items = select
            .build_query_as::<Customer>()
            .fetch_all(&self.pool)
            .await?;

        Ok(Page {
            items,
            total,
            page: page.page,
            per_page: page.per_page(),
        })
    }

    /// Writes every editable field of an existing customer.
    ///
    /// The outstanding balance is left untouched.
    pub async fn update(&self, customer: &Customer) -> DbResult<()> {
        debug!(id = %customer.id, "Updating customer");

        let result = sqlx::query(
            r#"
            UPDATE customers SET
                name = ?2, email = ?3, phone = ?4, company = ?5, address = ?6,
                city = ?7, country = ?8, tax_id = ?9, credit_limit_cents = ?10,
                is_active = ?11, updated_at = ?12
            WHERE id = ?1
            "#,
        )
        .bind(&customer.id)
        .bind(&customer.name)
        .bind(&customer.email)
        .bind(&customer.phone)
        .bind(&customer.company)
        .bind(&customer.address)
        .bind(&customer.city)
        .bind(&customer.country)
        .bind(&customer.tax_id)
        .bind(customer.credit_limit_cents)
        .bind(customer.is_active)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Customer", &customer.id));
        }
        Ok(())
    }

    /// Soft-deletes or restores a customer.
    pub async fn set_active(&self, id: &str, active: bool) -> DbResult<()> {
        debug!(id = %id, active = active, "Setting customer active flag");

        let result = sqlx::query("UPDATE customers SET is_active = ?2, updated_at = ?3 WHERE id = ?1")
            .bind(id)
            .bind(active)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Customer", id));
        }
        Ok(())
    }
}

fn push_filters(qb: &mut QueryBuilder<'_, Sqlite>, search: Option<&str>, active: Option<bool>) {
    if let Some(term) = search {
        let pattern = like_pattern(term);
        qb.push(" AND (name LIKE ")
            .push_bind(pattern.clone())
            .push(" ESCAPE '\\' OR email LIKE ")
            .push_bind(pattern.clone())
            .push(" ESCAPE '\\' OR company LIKE ")
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
    async fn test_insert_and_get() {
        let db = test_db().await;
        let created = customer(&db, "Ada Lovelace").await;

        let loaded = db.customers().get_by_id(&created.id).await.unwrap().unwrap();
        assert_eq!(loaded.name, "Ada Lovelace");
        assert_eq!(loaded.outstanding_balance_cents, 0);
        assert!(loaded.is_active);

        let by_email = db
            .customers()
            .find_by_email("ADA.LOVELACE@example.com")
            .await
            .unwrap();
        assert_eq!(by_email.map(|c| c.id), Some(created.id));
    }

    #[tokio::test]
    async fn test_duplicate_email_rejected() {
        let db = test_db().await;
        let first = customer(&db, "Grace Hopper").await;

        let mut second = first.clone();
        second.id = uuid::Uuid::new_v4().to_string();
        let err = db.customers().insert(&second).await.unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { field, .. } if field == "email"));
    }

    #[tokio::test]
    async fn test_list_search_and_active_filter() {
        let db = test_db().await;
        customer(&db, "Alan Turing").await;
        let hidden = customer(&db, "Alan Kay").await;
        customer(&db, "Barbara Liskov").await;
        db.customers().set_active(&hidden.id, false).await.unwrap();

        let all_alans = db
            .customers()
            .list(Some("alan"), None, PageRequest::default())
            .await
            .unwrap();
        assert_eq!(all_alans.total, 2);

        let active_alans = db
            .customers()
            .list(Some("alan"), Some(true), PageRequest::default())
            .await
            .unwrap();
        assert_eq!(active_alans.total, 1);
        assert_eq!(active_alans.items[0].name, "Alan Turing");
    }

    #[tokio::test]
    async fn test_list_paginates() {
        let db = test_db().await;
        for i in 0..5 {
            customer(&db, &format!("Customer {i}")).await;
        }

        let page = db
            .customers()
            .list(None, None, PageRequest::new(2, 2))
            .await
            .unwrap();
        assert_eq!(page.total, 5);
        assert_eq!(page.items.len(), 2);
        assert_eq!(page.total_pages(), 3);
    }

    #[tokio::test]
    async fn test_search_treats_percent_literally() {
        let db = test_db().await;
        customer(&db, "Plain Name").await;

        let page = db
            .customers()
            .list(Some("%"), None, PageRequest::default())
            .await
            .unwrap();
        assert_eq!(page.total, 0);
    }

    #[tokio::test]
    async fn test_update_missing_customer() {
        let db = test_db().await;
        let mut ghost = customer(&db, "Ghost").await;
        ghost.id = "missing".to_string();
        let err = db.customers().update(&ghost).await.unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));
    }
}
