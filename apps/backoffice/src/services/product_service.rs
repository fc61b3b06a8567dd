//! Product service.
//!
//! Catalog CRUD, categories and manual stock corrections. Stock only
//! changes through movements: the opening quantity on create,
//! [`ProductService::adjust_stock`], and the sales and purchase flows.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use super::clean;
use crate::error::{ServiceError, ServiceResult};
use crate::AppState;
use tradeflow_core::validation::{
    validate_amount_cents, validate_name, validate_percentage, validate_search_query, validate_sku,
};
use tradeflow_core::{
    Category, CoreError, NewCategory, NewProduct, Page, PageRequest, Product, ProductFilter,
    ProductUpdate, StockMovement, TaxRate, ValidationError,
};

/// Product service implementation.
#[derive(Debug, Clone)]
pub struct ProductService {
    state: Arc<AppState>,
}

impl ProductService {
    /// Create a new product service.
    pub fn new(state: Arc<AppState>) -> Self {
        ProductService { state }
    }

    /// Creates a product. A non-zero opening stock is recorded as an
    /// Adjustment movement.
    pub async fn create(&self, input: NewProduct, user: Option<&str>) -> ServiceResult<Product> {
        validate_sku(&input.sku)?;
        validate_name("name", &input.name)?;
        validate_amount_cents("price", input.price_cents)?;
        validate_amount_cents("cost", input.cost_cents)?;
        validate_amount_cents("stock_quantity", input.stock_quantity)?;
        validate_percentage("sales_tax", TaxRate::from_bps(input.sales_tax_bps))?;
        validate_percentage("purchase_tax", TaxRate::from_bps(input.purchase_tax_bps))?;
        if let Some(min) = input.min_stock_level {
            validate_amount_cents("min_stock_level", min)?;
        }
        if !input.product_type.tracks_stock() && input.stock_quantity != 0 {
            return Err(ServiceError::validation("Service products cannot hold stock"));
        }
        let category_id = clean(input.category_id);
        if let Some(category_id) = &category_id {
            self.ensure_category(category_id).await?;
        }

        let now = Utc::now();
        let product = Product {
            id: Uuid::new_v4().to_string(),
            sku: input.sku.trim().to_string(),
            barcode: clean(input.barcode),
            name: input.name.trim().to_string(),
            description: clean(input.description),
            product_type: input.product_type,
            unit: clean(input.unit),
            category_id,
            price_cents: input.price_cents,
            cost_cents: input.cost_cents,
            sales_tax_bps: input.sales_tax_bps,
            purchase_tax_bps: input.purchase_tax_bps,
            stock_quantity: input.stock_quantity,
            min_stock_level: input.min_stock_level,
            is_active: true,
            created_at: now,
            updated_at: now,
        };

        let product = self.state.db.products().insert(&product, user).await?;
        info!(product_id = %product.id, sku = %product.sku, stock = product.stock_quantity, "Product created");

        Ok(product)
    }

    pub async fn get(&self, id: &str) -> ServiceResult<Product> {
        self.state
            .db
            .products()
            .get_by_id(id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Product", id))
    }

    pub async fn get_by_sku(&self, sku: &str) -> ServiceResult<Product> {
        self.state
            .db
            .products()
            .get_by_sku(sku.trim())
            .await?
            .ok_or_else(|| ServiceError::not_found("Product", sku))
    }

    /// Lists products. `filter.search` matches SKU, name and barcode.
    pub async fn list(&self, mut filter: ProductFilter, page: PageRequest) -> ServiceResult<Page<Product>> {
        filter.search = match filter.search {
            Some(term) => validate_search_query(&term)?,
            None => None,
        };

        let page = self
            .state
            .db
            .products()
            .list(&filter, self.state.page(page))
            .await?;
        Ok(page)
    }

    /// Applies a partial update. Stock is not editable here.
    pub async fn update(&self, id: &str, update: ProductUpdate) -> ServiceResult<Product> {
        let mut product = self.get(id).await?;

        if let Some(name) = update.name {
            validate_name("name", &name)?;
            product.name = name.trim().to_string();
        }
        if let Some(price) = update.price_cents {
            validate_amount_cents("price", price)?;
            product.price_cents = price;
        }
        if let Some(cost) = update.cost_cents {
            validate_amount_cents("cost", cost)?;
            product.cost_cents = cost;
        }
        if let Some(bps) = update.sales_tax_bps {
            validate_percentage("sales_tax", TaxRate::from_bps(bps))?;
            product.sales_tax_bps = bps;
        }
        if let Some(bps) = update.purchase_tax_bps {
            validate_percentage("purchase_tax", TaxRate::from_bps(bps))?;
            product.purchase_tax_bps = bps;
        }
        if let Some(min) = update.min_stock_level {
            validate_amount_cents("min_stock_level", min)?;
            product.min_stock_level = Some(min);
        }
        if let Some(product_type) = update.product_type {
            if !product_type.tracks_stock() && product.stock_quantity != 0 {
                return Err(CoreError::invalid_state(
                    "Product",
                    "holding stock",
                    "become a service",
                )
                .into());
            }
            product.product_type = product_type;
        }
        if update.barcode.is_some() {
            product.barcode = clean(update.barcode);
        }
        if update.description.is_some() {
            product.description = clean(update.description);
        }
        if update.unit.is_some() {
            product.unit = clean(update.unit);
        }
        if update.category_id.is_some() {
            product.category_id = clean(update.category_id);
            if let Some(category_id) = &product.category_id {
                self.ensure_category(category_id).await?;
            }
        }
        if let Some(active) = update.is_active {
            product.is_active = active;
        }

        self.state.db.products().update(&product).await?;
        info!(product_id = %id, "Product updated");

        self.get(id).await
    }

    /// Soft-deletes a product.
    pub async fn deactivate(&self, id: &str) -> ServiceResult<()> {
        self.state.db.products().set_active(id, false).await?;
        info!(product_id = %id, "Product deactivated");
        Ok(())
    }

    /// Corrects stock by `delta` (positive adds, negative removes).
    ///
    /// ## Errors
    /// * `ValidationError` - zero delta
    /// * `BusinessLogic` - service products have no stock
    /// * `InsufficientStock` - the correction would go below zero
    pub async fn adjust_stock(
        &self,
        id: &str,
        delta: i64,
        reason: Option<&str>,
        user: Option<&str>,
    ) -> ServiceResult<StockMovement> {
        if delta == 0 {
            return Err(ValidationError::InvalidFormat {
                field: "delta".to_string(),
                reason: "must not be zero".to_string(),
            }
            .into());
        }

        let product = self.get(id).await?;
        if !product.product_type.tracks_stock() {
            return Err(CoreError::invalid_state("Product", "a service", "adjust stock").into());
        }

        let movement = self
            .state
            .db
            .products()
            .adjust_stock(id, delta, reason, user)
            .await?;

        let after = product.stock_quantity + delta;
        info!(product_id = %id, sku = %product.sku, delta, stock = after, "Stock adjusted");
        if product.min_stock_level.is_some_and(|min| after <= min) {
            warn!(sku = %product.sku, stock = after, "Product at or below minimum stock");
        }

        Ok(movement)
    }

    /// A product's stock movements, newest first.
    pub async fn movements(&self, id: &str, page: PageRequest) -> ServiceResult<Page<StockMovement>> {
        self.get(id).await?;
        let page = self
            .state
            .db
            .products()
            .list_movements(id, self.state.page(page))
            .await?;
        Ok(page)
    }

    /// Active products at or below their minimum stock level.
    pub async fn low_stock(&self, page: PageRequest) -> ServiceResult<Page<Product>> {
        let page = self.state.db.products().low_stock(self.state.page(page)).await?;
        Ok(page)
    }

    // =========================================================================
    // Categories
    // =========================================================================

    /// Creates a category, optionally under an existing parent.
    pub async fn create_category(&self, input: NewCategory) -> ServiceResult<Category> {
        validate_name("name", &input.name)?;
        let parent_id = clean(input.parent_id);
        if let Some(parent_id) = &parent_id {
            self.get_category(parent_id).await?;
        }

        let now = Utc::now();
        let category = Category {
            id: Uuid::new_v4().to_string(),
            name: input.name.trim().to_string(),
            description: clean(input.description),
            parent_id,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        self.state.db.products().insert_category(&category).await?;
        info!(category_id = %category.id, name = %category.name, "Category created");

        Ok(category)
    }

    pub async fn get_category(&self, id: &str) -> ServiceResult<Category> {
        self.state
            .db
            .products()
            .get_category(id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Category", id))
    }

    pub async fn list_categories(&self, active: Option<bool>) -> ServiceResult<Vec<Category>> {
        Ok(self.state.db.products().list_categories(active).await?)
    }

    /// Renames a category or moves it under another parent.
    ///
    /// A category cannot be its own ancestor.
    pub async fn update_category(&self, id: &str, input: NewCategory) -> ServiceResult<Category> {
        validate_name("name", &input.name)?;
        let mut category = self.get_category(id).await?;

        let parent_id = clean(input.parent_id);
        let mut ancestor = parent_id.clone();
        while let Some(ancestor_id) = ancestor {
            if ancestor_id == category.id {
                return Err(ServiceError::validation("A category cannot be nested under itself"));
            }
            ancestor = self.get_category(&ancestor_id).await?.parent_id;
        }

        category.name = input.name.trim().to_string();
        category.description = clean(input.description);
        category.parent_id = parent_id;
        category.updated_at = Utc::now();

        self.state.db.products().update_category(&category).await?;
        info!(category_id = %id, "Category updated");
        Ok(category)
    }

    /// Soft-deletes a category. Its products keep the reference.
    pub async fn deactivate_category(&self, id: &str) -> ServiceResult<()> {
        let mut category = self.get_category(id).await?;
        category.is_active = false;
        self.state.db.products().update_category(&category).await?;
        info!(category_id = %id, "Category deactivated");
        Ok(())
    }

    /// Products may only be filed under an active category.
    async fn ensure_category(&self, id: &str) -> ServiceResult<()> {
        let category = self.get_category(id).await?;
        if !category.is_active {
            return Err(CoreError::invalid_state(
                format!("Category {}", category.name),
                "inactive",
                "take products",
            )
            .into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::error::ErrorCode;
    use crate::services::test_support::*;
    use tradeflow_core::{
        MovementType, NewCategory, NewProduct, PageRequest, ProductFilter, ProductType,
        ProductUpdate,
    };

    #[tokio::test]
    async fn test_opening_stock_recorded() {
        let services = test_services().await;
        let bolt = product(&services, "HW-BOLT", 250, 40).await;
        assert_eq!(bolt.stock_quantity, 40);

        let moves = services
            .products
            .movements(&bolt.id, PageRequest::default())
            .await
            .unwrap();
        assert_eq!(moves.total, 1);
        assert_eq!(moves.items[0].movement_type, MovementType::Adjustment);
        assert_eq!(moves.items[0].quantity, 40);
    }

    #[tokio::test]
    async fn test_create_validation() {
        let services = test_services().await;
        let err = services
            .products
            .create(
                NewProduct {
                    sku: "HW-1".to_string(),
                    name: "Bolt".to_string(),
                    price_cents: -1,
                    ..Default::default()
                },
                None,
            )
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationError);

        let err = services
            .products
            .create(
                NewProduct {
                    sku: "HW-2".to_string(),
                    name: "Bolt".to_string(),
                    sales_tax_bps: 10_001,
                    ..Default::default()
                },
                None,
            )
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationError);

        let err = services
            .products
            .create(
                NewProduct {
                    sku: "SV-1".to_string(),
                    name: "Fitting".to_string(),
                    product_type: ProductType::Service,
                    stock_quantity: 3,
                    ..Default::default()
                },
                None,
            )
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationError);
    }

    #[tokio::test]
    async fn test_duplicate_sku_conflicts() {
        let services = test_services().await;
        product(&services, "HW-BOLT", 250, 0).await;
        let err = services
            .products
            .create(
                NewProduct {
                    sku: "HW-BOLT".to_string(),
                    name: "Other".to_string(),
                    ..Default::default()
                },
                None,
            )
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::Conflict);
    }

    #[tokio::test]
    async fn test_adjust_stock() {
        let services = test_services().await;
        let bolt = product(&services, "HW-BOLT", 250, 10).await;

        services
            .products
            .adjust_stock(&bolt.id, -4, Some("damaged"), Some("clerk"))
            .await
            .unwrap();
        assert_eq!(services.products.get(&bolt.id).await.unwrap().stock_quantity, 6);

        let err = services
            .products
            .adjust_stock(&bolt.id, -7, None, None)
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::InsufficientStock);

        let err = services
            .products
            .adjust_stock(&bolt.id, 0, None, None)
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationError);
    }

    #[tokio::test]
    async fn test_update_keeps_stock() {
        let services = test_services().await;
        let bolt = product(&services, "HW-BOLT", 250, 10).await;

        let updated = services
            .products
            .update(
                &bolt.id,
                ProductUpdate {
                    price_cents: Some(300),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.price_cents, 300);
        assert_eq!(updated.stock_quantity, 10);

        let err = services
            .products
            .update(
                &bolt.id,
                ProductUpdate {
                    product_type: Some(ProductType::Service),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::BusinessLogic);
    }

    #[tokio::test]
    async fn test_low_stock() {
        let services = test_services().await;
        product(&services, "LOW", 100, 3).await;
        product(&services, "OK", 100, 50).await;

        let low = services.products.low_stock(PageRequest::default()).await.unwrap();
        assert_eq!(low.total, 1);
        assert_eq!(low.items[0].sku, "LOW");
    }

    #[tokio::test]
    async fn test_categories_file_products() {
        let services = test_services().await;
        let hardware = services
            .products
            .create_category(NewCategory {
                name: "Hardware".to_string(),
                ..Default::default()
            })
            .await
            .unwrap();
        let fixings = services
            .products
            .create_category(NewCategory {
                name: " Fixings ".to_string(),
                parent_id: Some(hardware.id.clone()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(fixings.name, "Fixings");

        let bolt = services
            .products
            .create(
                NewProduct {
                    sku: "HW-BOLT".to_string(),
                    name: "Bolt".to_string(),
                    price_cents: 250,
                    category_id: Some(fixings.id.clone()),
                    ..Default::default()
                },
                None,
            )
            .await
            .unwrap();
        product(&services, "HW-NUT", 100, 0).await;

        let filed = services
            .products
            .list(
                ProductFilter {
                    category_id: Some(fixings.id.clone()),
                    ..Default::default()
                },
                PageRequest::default(),
            )
            .await
            .unwrap();
        assert_eq!(filed.total, 1);
        assert_eq!(filed.items[0].id, bolt.id);

        // hardware under its own child would be a cycle
        let err = services
            .products
            .update_category(
                &hardware.id,
                NewCategory {
                    name: "Hardware".to_string(),
                    parent_id: Some(fixings.id.clone()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationError);

        services.products.deactivate_category(&fixings.id).await.unwrap();
        let err = services
            .products
            .update(
                &bolt.id,
                ProductUpdate {
                    category_id: Some(fixings.id.clone()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::BusinessLogic);

        let cleared = services
            .products
            .update(
                &bolt.id,
                ProductUpdate {
                    category_id: Some(String::new()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(cleared.category_id, None);
        assert_eq!(services.products.list_categories(Some(true)).await.unwrap().len(), 1);
    }
}
