//! Service implementations.
//!
//! Each service validates input, applies business rules from
//! `tradeflow-core`, and hands multi-row writes to a single repository
//! call so they commit or roll back together.

pub mod accounting_service;
pub mod customer_service;
pub mod maintenance_service;
pub mod product_service;
pub mod purchase_service;
pub mod sales_service;
pub mod staff_service;
pub mod supplier_service;

use chrono::{NaiveDate, Utc};
use tradeflow_core::pricing::LineInput;
use tradeflow_core::validation::validate_uuid;
use tradeflow_core::{CoreError, Money, NewLineItem, Product, TaxRate, MAX_ORDER_LINES};
use tradeflow_db::Database;

use crate::error::{ServiceError, ServiceResult};

/// Today's date in UTC, the default for document dates.
pub(crate) fn today() -> NaiveDate {
    Utc::now().date_naive()
}

/// Trims an optional text field, mapping blank input to `None`.
pub(crate) fn clean(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Loads the product of every requested line, in line order.
///
/// Inactive products cannot be put on new orders.
pub(crate) async fn load_line_products(
    db: &Database,
    items: &[NewLineItem],
) -> ServiceResult<Vec<Product>> {
    if items.len() > MAX_ORDER_LINES {
        return Err(CoreError::TooManyLines {
            max: MAX_ORDER_LINES,
        }
        .into());
    }

    let mut products: Vec<Product> = Vec::with_capacity(items.len());
    for item in items {
        validate_uuid("product_id", &item.product_id)?;
        if let Some(seen) = products.iter().find(|p| p.id == item.product_id) {
            products.push(seen.clone());
            continue;
        }

        let product = db
            .products()
            .get_by_id(&item.product_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Product", &item.product_id))?;
        if !product.is_active {
            return Err(CoreError::invalid_state(
                format!("Product {}", product.sku),
                "inactive",
                "be ordered",
            )
            .into());
        }
        products.push(product);
    }
    Ok(products)
}

/// Builds a pricing input, falling back to the product's price and tax
/// rate where the line leaves them out.
pub(crate) fn line_input(
    item: &NewLineItem,
    default_price: Money,
    default_tax: TaxRate,
) -> LineInput {
    LineInput {
        product_id: item.product_id.clone(),
        quantity: item.quantity,
        unit_price: item
            .unit_price_cents
            .map(Money::from_cents)
            .unwrap_or(default_price),
        discount: Money::from_cents(item.discount_cents),
        tax_rate: item.tax_bps.map(TaxRate::from_bps).unwrap_or(default_tax),
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;

    use tradeflow_core::{Customer, NewCustomer, NewProduct, NewSupplier, Product, Supplier};
    use tradeflow_db::{Database, DbConfig};

    use super::*;
    use crate::{AppConfig, AppState, Services};

    pub async fn test_services() -> Services {
        test_services_with(AppConfig::default()).await
    }

    pub async fn test_services_with(config: AppConfig) -> Services {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        Services::new(Arc::new(AppState::new(db, config)))
    }

    pub async fn customer(services: &Services, name: &str) -> Customer {
        services
            .customers
            .create(NewCustomer {
                name: name.to_string(),
                email: Some(format!("{}@example.com", name.to_lowercase().replace(' ', "."))),
                address: Some("1 Harbour Road".to_string()),
                credit_limit_cents: 1_000_000,
                ..Default::default()
            })
            .await
            .unwrap()
    }

    pub async fn supplier(services: &Services, code: &str) -> Supplier {
        services
            .suppliers
            .create(NewSupplier {
                code: code.to_string(),
                name: format!("Supplier {code}"),
                ..Default::default()
            })
            .await
            .unwrap()
    }

    /// A stocked product taxed at 10% on sales and 5% on purchases.
    pub async fn product(services: &Services, sku: &str, price_cents: i64, stock: i64) -> Product {
        services
            .products
            .create(
                NewProduct {
                    sku: sku.to_string(),
                    name: format!("Product {sku}"),
                    price_cents,
                    cost_cents: price_cents / 2,
                    sales_tax_bps: 1000,
                    purchase_tax_bps: 500,
                    stock_quantity: stock,
                    min_stock_level: Some(5),
                    ..Default::default()
                },
                None,
            )
            .await
            .unwrap()
    }
}
