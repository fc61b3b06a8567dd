//! # Tradeflow Back Office
//!
//! Service layer for the Tradeflow business back office.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Back Office Services                             │
//! │                                                                         │
//! │  ┌────────────────┐  ┌────────────────┐  ┌────────────────────────────┐│
//! │  │ SalesService   │  │PurchaseService │  │  AccountingService         ││
//! │  │                │  │                │  │                            ││
//! │  │ • create_order │  │ • create_order │  │ • incomes / expenses       ││
//! │  │ • invoices     │  │ • invoices     │  │ • payroll, tax submissions ││
//! │  │ • payments     │  │ • payments     │  │ • overview, tax position   ││
//! │  │ • deliveries   │  │ • receive_goods│  │                            ││
//! │  └────────────────┘  └────────────────┘  └────────────────────────────┘│
//! │                                                                         │
//! │  ┌────────────────┐  ┌────────────────┐  ┌────────────────────────────┐│
//! │  │CustomerService │  │ ProductService │  │  StaffService              ││
//! │  │SupplierService │  │ • stock adjust │  │  MaintenanceService        ││
//! │  └────────────────┘  └────────────────┘  └────────────────────────────┘│
//! │                                                                         │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │  AppState { db: Database, config: AppConfig }                    │  │
//! │  └──────────────────────────────────────────────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration
//! See [`config`] for the `TRADEFLOW_*` environment variables.

pub mod config;
pub mod error;
pub mod services;

use std::sync::Arc;

use tracing::info;
use tradeflow_core::PageRequest;
use tradeflow_db::Database;

// Re-exports
pub use config::{AppConfig, ConfigError};
pub use error::{ErrorCode, ServiceError, ServiceResult};
pub use services::{
    accounting_service::AccountingService, customer_service::CustomerService,
    maintenance_service::MaintenanceService, product_service::ProductService,
    purchase_service::PurchaseService, sales_service::SalesService,
    staff_service::StaffService, supplier_service::SupplierService,
};

/// Shared application state.
#[derive(Debug)]
pub struct AppState {
    pub db: Database,
    pub config: AppConfig,
}

impl AppState {
    pub fn new(db: Database, config: AppConfig) -> Self {
        AppState { db, config }
    }

    /// Connects the database described by `config` and applies migrations.
    pub async fn connect(config: AppConfig) -> ServiceResult<Self> {
        let db = Database::new(config.db_config()).await?;
        info!(path = %config.database_path, "Database connected");
        Ok(AppState { db, config })
    }

    /// Resolves a caller's page request against the configured sizes.
    ///
    /// An unset page size takes `default_page_size`; every size is capped
    /// at `max_page_size`.
    pub fn page(&self, page: PageRequest) -> PageRequest {
        page.or_page_size(self.config.default_page_size)
            .clamp(self.config.max_page_size)
    }
}

/// Every service over one shared state.
#[derive(Debug, Clone)]
pub struct Services {
    pub state: Arc<AppState>,
    pub customers: CustomerService,
    pub suppliers: SupplierService,
    pub products: ProductService,
    pub sales: SalesService,
    pub purchases: PurchaseService,
    pub accounting: AccountingService,
    pub staff: StaffService,
    pub maintenance: MaintenanceService,
}

impl Services {
    pub fn new(state: Arc<AppState>) -> Self {
        Services {
            customers: CustomerService::new(state.clone()),
            suppliers: SupplierService::new(state.clone()),
            products: ProductService::new(state.clone()),
            sales: SalesService::new(state.clone()),
            purchases: PurchaseService::new(state.clone()),
            accounting: AccountingService::new(state.clone()),
            staff: StaffService::new(state.clone()),
            maintenance: MaintenanceService::new(state.clone()),
            state,
        }
    }
}
