//! Customer service.
//!
//! Customer CRUD. Outstanding balances are maintained by the sales
//! repository and are never written here.

use std::sync::Arc;

use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use super::clean;
use crate::error::{ServiceError, ServiceResult};
use crate::AppState;
use tradeflow_core::validation::{
    validate_amount_cents, validate_email, validate_name, validate_search_query,
};
use tradeflow_core::{Customer, CustomerUpdate, NewCustomer, Page, PageRequest};

/// Customer service implementation.
#[derive(Debug, Clone)]
pub struct CustomerService {
    state: Arc<AppState>,
}

impl CustomerService {
    /// Create a new customer service.
    pub fn new(state: Arc<AppState>) -> Self {
        CustomerService { state }
    }

    /// Creates a customer. Emails are unique when given.
    pub async fn create(&self, input: NewCustomer) -> ServiceResult<Customer> {
        validate_name("name", &input.name)?;
        let email = clean(input.email);
        if let Some(email) = &email {
            validate_email(email)?;
        }
        validate_amount_cents("credit_limit", input.credit_limit_cents)?;

        let now = Utc::now();
        let customer = Customer {
            id: Uuid::new_v4().to_string(),
            name: input.name.trim().to_string(),
            email,
            phone: clean(input.phone),
            company: clean(input.company),
            address: clean(input.address),
            city: clean(input.city),
            country: clean(input.country),
            tax_id: clean(input.tax_id),
            credit_limit_cents: input.credit_limit_cents,
            outstanding_balance_cents: 0,
            is_active: true,
            created_at: now,
            updated_at: now,
        };

        self.state.db.customers().insert(&customer).await?;
        info!(customer_id = %customer.id, name = %customer.name, "Customer created");

        Ok(customer)
    }

    pub async fn get(&self, id: &str) -> ServiceResult<Customer> {
        self.state
            .db
            .customers()
            .get_by_id(id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Customer", id))
    }

    /// Lists customers. `search` matches name, email and company.
    pub async fn list(
        &self,
        search: Option<&str>,
        active: Option<bool>,
        page: PageRequest,
    ) -> ServiceResult<Page<Customer>> {
        let search = match search {
            Some(term) => validate_search_query(term)?,
            None => None,
        };

        let page = self
            .state
            .db
            .customers()
            .list(search.as_deref(), active, self.state.page(page))
            .await?;
        Ok(page)
    }

    /// Applies a partial update.
    pub async fn update(&self, id: &str, update: CustomerUpdate) -> ServiceResult<Customer> {
        let mut customer = self.get(id).await?;

        if let Some(name) = update.name {
            validate_name("name", &name)?;
            customer.name = name.trim().to_string();
        }
        if update.email.is_some() {
            customer.email = clean(update.email);
            if let Some(email) = &customer.email {
                validate_email(email)?;
            }
        }
        if let Some(limit) = update.credit_limit_cents {
            validate_amount_cents("credit_limit", limit)?;
            customer.credit_limit_cents = limit;
        }
        if update.phone.is_some() {
            customer.phone = clean(update.phone);
        }
        if update.company.is_some() {
            customer.company = clean(update.company);
        }
        if update.address.is_some() {
            customer.address = clean(update.address);
        }
        if update.city.is_some() {
            customer.city = clean(update.city);
        }
        if update.country.is_some() {
            customer.country = clean(update.country);
        }
        if update.tax_id.is_some() {
            customer.tax_id = clean(update.tax_id);
        }
        if let Some(active) = update.is_active {
            customer.is_active = active;
        }

        self.state.db.customers().update(&customer).await?;
        info!(customer_id = %id, "Customer updated");

        self.get(id).await
    }

    /// Soft-deletes a customer.
    pub async fn deactivate(&self, id: &str) -> ServiceResult<()> {
        self.state.db.customers().set_active(id, false).await?;
        info!(customer_id = %id, "Customer deactivated");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::error::ErrorCode;
    use crate::services::test_support::*;
    use crate::AppConfig;
    use tradeflow_core::{CustomerUpdate, NewCustomer, PageRequest};

    #[tokio::test]
    async fn test_create_trims_and_drops_blank_fields() {
        let services = test_services().await;
        let customer = services
            .customers
            .create(NewCustomer {
                name: "  Ada Byron ".to_string(),
                email: Some("   ".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();

        assert_eq!(customer.name, "Ada Byron");
        assert_eq!(customer.email, None);
        assert_eq!(customer.outstanding_balance_cents, 0);
    }

    #[tokio::test]
    async fn test_rejects_bad_email_and_duplicates() {
        let services = test_services().await;
        let err = services
            .customers
            .create(NewCustomer {
                name: "Ada".to_string(),
                email: Some("not-an-email".to_string()),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationError);

        customer(&services, "Ada").await;
        let err = services
            .customers
            .create(NewCustomer {
                name: "Ada Again".to_string(),
                email: Some("ada@example.com".to_string()),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::Conflict);
    }

    #[tokio::test]
    async fn test_update_and_deactivate() {
        let services = test_services().await;
        let ada = customer(&services, "Ada").await;

        let updated = services
            .customers
            .update(
                &ada.id,
                CustomerUpdate {
                    company: Some("Analytical Engines".to_string()),
                    credit_limit_cents: Some(50_000),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.company.as_deref(), Some("Analytical Engines"));
        assert_eq!(updated.credit_limit_cents, 50_000);
        assert_eq!(updated.email, ada.email);

        services.customers.deactivate(&ada.id).await.unwrap();
        let active = services
            .customers
            .list(None, Some(true), PageRequest::default())
            .await
            .unwrap();
        assert_eq!(active.total, 0);
    }

    #[tokio::test]
    async fn test_get_unknown() {
        let services = test_services().await;
        let err = services.customers.get("missing").await.unwrap_err();
        assert_eq!(err.code, ErrorCode::NotFound);
    }

    #[tokio::test]
    async fn test_list_uses_configured_page_size() {
        let services = test_services_with(AppConfig {
            default_page_size: 2,
            max_page_size: 3,
            ..AppConfig::default()
        })
        .await;
        for name in ["Ada", "Byron", "Clara", "Dora"] {
            customer(&services, name).await;
        }

        let page = services
            .customers
            .list(None, None, PageRequest::default())
            .await
            .unwrap();
        assert_eq!(page.per_page, 2);
        assert_eq!(page.items.len(), 2);
        assert_eq!(page.total, 4);

        let page = services
            .customers
            .list(None, None, PageRequest::new(1, 50))
            .await
            .unwrap();
        assert_eq!(page.items.len(), 3);
    }
}
