//! Supplier service.

use std::sync::Arc;

use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use super::clean;
use crate::error::{ServiceError, ServiceResult};
use crate::AppState;
use tradeflow_core::validation::{validate_code, validate_email, validate_name, validate_search_query};
use tradeflow_core::{NewSupplier, Page, PageRequest, Supplier, SupplierUpdate};

/// Supplier service implementation.
#[derive(Debug, Clone)]
pub struct SupplierService {
    state: Arc<AppState>,
}

impl SupplierService {
    /// Create a new supplier service.
    pub fn new(state: Arc<AppState>) -> Self {
        SupplierService { state }
    }

    /// Creates a supplier. Codes are unique and stored upper-case.
    pub async fn create(&self, input: NewSupplier) -> ServiceResult<Supplier> {
        validate_code("code", &input.code)?;
        validate_name("name", &input.name)?;
        let email = clean(input.email);
        if let Some(email) = &email {
            validate_email(email)?;
        }

        let now = Utc::now();
        let supplier = Supplier {
            id: Uuid::new_v4().to_string(),
            code: input.code.trim().to_uppercase(),
            name: input.name.trim().to_string(),
            contact_person: clean(input.contact_person),
            email,
            phone: clean(input.phone),
            address: clean(input.address),
            city: clean(input.city),
            country: clean(input.country),
            tax_id: clean(input.tax_id),
            payment_terms: clean(input.payment_terms),
            is_active: true,
            created_at: now,
            updated_at: now,
        };

        self.state.db.suppliers().insert(&supplier).await?;
        info!(supplier_id = %supplier.id, code = %supplier.code, "Supplier created");

        Ok(supplier)
    }

    pub async fn get(&self, id: &str) -> ServiceResult<Supplier> {
        self.state
            .db
            .suppliers()
            .get_by_id(id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Supplier", id))
    }

    pub async fn get_by_code(&self, code: &str) -> ServiceResult<Supplier> {
        self.state
            .db
            .suppliers()
            .get_by_code(&code.trim().to_uppercase())
            .await?
            .ok_or_else(|| ServiceError::not_found("Supplier", code))
    }

    pub async fn list(
        &self,
        search: Option<&str>,
        active: Option<bool>,
        page: PageRequest,
    ) -> ServiceResult<Page<Supplier>> {
        let search = match search {
            Some(term) => validate_search_query(term)?,
            None => None,
        };

        let page = self
            .state
            .db
            .suppliers()
            .list(search.as_deref(), active, self.state.page(page))
            .await?;
        Ok(page)
    }

    /// Applies a partial update. The code cannot change.
    pub async fn update(&self, id: &str, update: SupplierUpdate) -> ServiceResult<Supplier> {
        let mut supplier = self.get(id).await?;

        if let Some(name) = update.name {
            validate_name("name", &name)?;
            supplier.name = name.trim().to_string();
        }
        if update.email.is_some() {
            supplier.email = clean(update.email);
            if let Some(email) = &supplier.email {
                validate_email(email)?;
            }
        }
        if update.contact_person.is_some() {
            supplier.contact_person = clean(update.contact_person);
        }
        if update.phone.is_some() {
            supplier.phone = clean(update.phone);
        }
        if update.address.is_some() {
            supplier.address = clean(update.address);
        }
        if update.city.is_some() {
            supplier.city = clean(update.city);
        }
        if update.country.is_some() {
            supplier.country = clean(update.country);
        }
        if update.tax_id.is_some() {
            supplier.tax_id = clean(update.tax_id);
        }
        if update.payment_terms.is_some() {
            supplier.payment_terms = clean(update.payment_terms);
        }
        if let Some(active) = update.is_active {
            supplier.is_active = active;
        }

        self.state.db.suppliers().update(&supplier).await?;
        info!(supplier_id = %id, "Supplier updated");

        self.get(id).await
    }

    /// Soft-deletes a supplier.
    pub async fn deactivate(&self, id: &str) -> ServiceResult<()> {
        self.state.db.suppliers().set_active(id, false).await?;
        info!(supplier_id = %id, "Supplier deactivated");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::error::ErrorCode;
    use crate::services::test_support::*;
    use tradeflow_core::{NewSupplier, PageRequest, SupplierUpdate};

    #[tokio::test]
    async fn test_code_normalised_and_unique() {
        let services = test_services().await;
        let acme = services
            .suppliers
            .create(NewSupplier {
                code: " sup-acme ".to_string(),
                name: "Acme".to_string(),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(acme.code, "SUP-ACME");

        let err = services
            .suppliers
            .create(NewSupplier {
                code: "SUP-ACME".to_string(),
                name: "Acme Two".to_string(),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::Conflict);

        let found = services.suppliers.get_by_code("sup-acme").await.unwrap();
        assert_eq!(found.id, acme.id);
    }

    #[tokio::test]
    async fn test_rejects_invalid_code() {
        let services = test_services().await;
        let err = services
            .suppliers
            .create(NewSupplier {
                code: "has space".to_string(),
                name: "Spacey".to_string(),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationError);
    }

    #[tokio::test]
    async fn test_update_and_search() {
        let services = test_services().await;
        let globex = supplier(&services, "GLOBEX").await;
        supplier(&services, "INITECH").await;

        services
            .suppliers
            .update(
                &globex.id,
                SupplierUpdate {
                    payment_terms: Some("NET45".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let page = services
            .suppliers
            .list(Some("glob"), None, PageRequest::default())
            .await
            .unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].payment_terms.as_deref(), Some("NET45"));
    }
}
