//! # tradeflow-db: Database Layer for Tradeflow
//!
//! SQLite persistence for the back office, built on sqlx.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Tradeflow Data Flow                              │
//! │                                                                         │
//! │  SalesService::create_order                                            │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                   tradeflow-db (THIS CRATE)                     │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌─────────────────┐   ┌──────────────┐  │   │
//! │  │   │   Database    │    │  Repositories   │   │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │    │                 │   │  (embedded)  │  │   │
//! │  │   │               │    │ Customer/Supp.  │   │ 001_parties  │  │   │
//! │  │   │ SqlitePool    │◄───│ Product         │   │ 002_catalog  │  │   │
//! │  │   │ Connection    │    │ Sales/Purchase  │   │ 003_sales    │  │   │
//! │  │   │ Management    │    │ Staff/Accounting│   │ ...          │  │   │
//! │  │   └───────────────┘    └─────────────────┘   └──────────────┘  │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     SQLite Database (WAL)                       │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - One repository per business module
//!
//! ## Usage
//!
//! ```rust,ignore
//! use tradeflow_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("tradeflow.db")).await?;
//! let customer = db.customers().get_by_id(&id).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use migrations::MigrationStatus;
pub use pool::{Database, DbConfig};

pub use repository::accounting::AccountingRepository;
pub use repository::customer::CustomerRepository;
pub use repository::product::ProductRepository;
pub use repository::purchase::PurchaseRepository;
pub use repository::sales::SalesRepository;
pub use repository::staff::StaffRepository;
pub use repository::supplier::SupplierRepository;
pub use repository::{document_number, DateRange};
