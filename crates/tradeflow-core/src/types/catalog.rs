//! Products and stock movements.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::{Money, TaxRate};
use crate::stock::MovementType;

// =============================================================================
// Product Type
// =============================================================================

/// What kind of item a product is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum ProductType {
    #[default]
    Standard,
    RawMaterial,
    FinishedGood,
    /// Not stocked; sales never decrement inventory.
    Service,
}

impl ProductType {
    /// Whether orders for this product move stock.
    pub fn tracks_stock(&self) -> bool {
        !matches!(self, ProductType::Service)
    }
}

// =============================================================================
// Category
// =============================================================================

/// A product category. Categories nest through `parent_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Category {
    pub id: String,
    /// Unique.
    pub name: String,
    pub description: Option<String>,
    pub parent_id: Option<String>,
    pub is_active: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

/// Input for creating or renaming a category.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewCategory {
    pub name: String,
    pub description: Option<String>,
    pub parent_id: Option<String>,
}

// =============================================================================
// Product
// =============================================================================

/// A product that can be bought and sold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Product {
    pub id: String,
    /// Stock Keeping Unit, unique.
    pub sku: String,
    pub barcode: Option<String>,
    pub name: String,
    pub description: Option<String>,
    pub product_type: ProductType,
    /// Unit of measure (pcs, kg, box...).
    pub unit: Option<String>,
    pub category_id: Option<String>,
    /// Selling price in cents.
    pub price_cents: i64,
    /// Purchase cost in cents.
    pub cost_cents: i64,
    /// Default tax on sales order lines (825 = 8.25%).
    pub sales_tax_bps: u32,
    /// Default tax on purchase order lines.
    pub purchase_tax_bps: u32,
    pub stock_quantity: i64,
    pub min_stock_level: Option<i64>,
    pub is_active: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Product {
    #[inline]
    pub fn price(&self) -> Money {
        Money::from_cents(self.price_cents)
    }

    #[inline]
    pub fn cost(&self) -> Money {
        Money::from_cents(self.cost_cents)
    }

    #[inline]
    pub fn sales_tax(&self) -> TaxRate {
        TaxRate::from_bps(self.sales_tax_bps)
    }

    #[inline]
    pub fn purchase_tax(&self) -> TaxRate {
        TaxRate::from_bps(self.purchase_tax_bps)
    }
}

/// Input for creating a product.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewProduct {
    pub sku: String,
    pub barcode: Option<String>,
    pub name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub product_type: ProductType,
    pub unit: Option<String>,
    pub category_id: Option<String>,
    pub price_cents: i64,
    #[serde(default)]
    pub cost_cents: i64,
    #[serde(default)]
    pub sales_tax_bps: u32,
    #[serde(default)]
    pub purchase_tax_bps: u32,
    /// Opening stock. Recorded as an adjustment movement when non-zero.
    #[serde(default)]
    pub stock_quantity: i64,
    pub min_stock_level: Option<i64>,
}

/// Partial product update. Stock only changes through movements.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ProductUpdate {
    pub barcode: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub product_type: Option<ProductType>,
    pub unit: Option<String>,
    /// Blank clears the category.
    pub category_id: Option<String>,
    pub price_cents: Option<i64>,
    pub cost_cents: Option<i64>,
    pub sales_tax_bps: Option<u32>,
    pub purchase_tax_bps: Option<u32>,
    pub min_stock_level: Option<i64>,
    pub is_active: Option<bool>,
}

/// Filters for listing products.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ProductFilter {
    /// Matches SKU, name or barcode.
    pub search: Option<String>,
    pub active: Option<bool>,
    pub category_id: Option<String>,
}

// =============================================================================
// Stock Movement
// =============================================================================

/// One change to a product's stock, signed per [`MovementType::signed_quantity`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct StockMovement {
    pub id: String,
    pub product_id: String,
    pub movement_type: MovementType,
    /// Positive for stock in, negative for stock out.
    pub quantity: i64,
    /// `sales_order`, `purchase_order`, `manual`...
    pub reference_type: Option<String>,
    pub reference_id: Option<String>,
    pub notes: Option<String>,
    pub created_by: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}
