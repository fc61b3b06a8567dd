//! # tradeflow-core: Pure Business Logic for Tradeflow
//!
//! This crate holds the business rules of the back office as pure functions
//! with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Tradeflow Architecture                           │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                 backoffice (services + CLI)                     │   │
//! │  │   SalesService, PurchaseService, AccountingService, ...         │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │             ★ tradeflow-core (THIS CRATE) ★                     │   │
//! │  │                                                                 │   │
//! │  │  ┌─────────┐ ┌─────────┐ ┌────────────┐ ┌───────┐ ┌──────────┐ │   │
//! │  │  │  money  │ │ pricing │ │ settlement │ │ stock │ │validation│ │   │
//! │  │  │  Money  │ │ lines → │ │  Payment   │ │ moves │ │  rules   │ │   │
//! │  │  │ TaxRate │ │ totals  │ │  Status    │ │ avail │ │  checks  │ │   │
//! │  │  └─────────┘ └─────────┘ └────────────┘ └───────┘ └──────────┘ │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                  tradeflow-db (Database Layer)                  │   │
//! │  │              SQLite queries, migrations, repositories           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain records (Customer, Product, SalesOrder, ...)
//! - [`money`] - Money and TaxRate with integer arithmetic
//! - [`pricing`] - Line and order total computation
//! - [`settlement`] - Payment status and balances
//! - [`stock`] - Movement types and availability checks
//! - [`validation`] - Input validation
//! - [`error`] - Domain error types
//!
//! ## Example Usage
//!
//! ```rust
//! use tradeflow_core::money::{Money, TaxRate};
//! use tradeflow_core::pricing::{price_order, LineInput, OrderAdjustments};
//! use tradeflow_core::settlement::{Balance, PaymentStatus};
//!
//! let lines = [LineInput {
//!     product_id: "p-1".into(),
//!     quantity: 4,
//!     unit_price: Money::from_cents(2_500),
//!     discount: Money::zero(),
//!     tax_rate: TaxRate::from_bps(1_000),
//! }];
//! let order = price_order(&lines, OrderAdjustments::default()).unwrap();
//! assert_eq!(order.totals.total.cents(), 11_000);
//!
//! let balance = Balance::new(order.totals.total, Money::from_cents(5_000));
//! assert_eq!(balance.status(), PaymentStatus::PartiallyPaid);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod money;
pub mod pricing;
pub mod settlement;
pub mod stock;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, ValidationError};
pub use money::{Money, TaxRate};
pub use pricing::{OrderAdjustments, OrderTotals, PricedLine, PricedOrder};
pub use settlement::{Balance, PaymentStatus};
pub use stock::{MovementType, StockRequirement};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum quantity on a single order line.
///
/// ## Business Reason
/// Catches typos (an extra zero or three) before they reserve stock.
pub const MAX_LINE_QUANTITY: i64 = 1_000_000;

/// Maximum lines on a single sales or purchase order.
pub const MAX_ORDER_LINES: usize = 500;

/// Default page size for listings when the caller does not ask for one.
pub const DEFAULT_PAGE_SIZE: u32 = 20;
