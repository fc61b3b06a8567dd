//! Maintenance service.
//!
//! Housekeeping behind the `backoffice` CLI commands.
//!
//! ## Totals Recalculation
//! ```text
//! for each sales order:
//!     items ──► reprice (qty × unit price − discount, line tax)
//!                 │
//!                 └──► recompute_totals(order adjustments)
//!                            │
//!     any item changed, or subtotal / tax / discount / total off by > 1¢
//!                            └──► reprice_order (items + header, balance follows)
//!
//!     pricing error ──► warn, count as skipped, carry on
//! ```

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::ServiceResult;
use crate::AppState;
use tradeflow_core::pricing::recompute_totals;
use tradeflow_core::{CoreResult, OrderTotals, Page, PageRequest, Product, SalesOrder, SalesOrderItem};
use tradeflow_db::MigrationStatus;

/// Stored totals within this many cents of the recomputed value are left alone.
const TOTAL_TOLERANCE_CENTS: i64 = 1;

/// Result of [`MaintenanceService::recalculate_order_totals`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RecalcReport {
    pub checked: usize,
    pub fixed: usize,
    /// Orders whose stored rows could not be priced.
    pub skipped: usize,
}

/// Result of [`MaintenanceService::check`].
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub database_ok: bool,
    pub migrations_applied: usize,
    pub migrations_total: usize,
}

impl HealthReport {
    pub fn is_healthy(&self) -> bool {
        self.database_ok && self.migrations_applied >= self.migrations_total
    }
}

/// An order's items and totals as they should be stored.
struct Repriced {
    changed_items: Vec<SalesOrderItem>,
    totals: OrderTotals,
}

fn reprice(order: &SalesOrder, items: &[SalesOrderItem]) -> CoreResult<Repriced> {
    let mut lines = Vec::with_capacity(items.len());
    let mut changed_items = Vec::new();
    for item in items {
        let line = item.reprice()?;
        if item.differs_from(&line) {
            let mut fixed = item.clone();
            fixed.line_total_cents = line.line_total.cents();
            fixed.tax_cents = line.tax.cents();
            changed_items.push(fixed);
        }
        lines.push(line);
    }

    let totals = recompute_totals(&lines, order.adjustments())?;
    Ok(Repriced {
        changed_items,
        totals,
    })
}

fn totals_drifted(order: &SalesOrder, totals: &OrderTotals) -> bool {
    [
        (order.subtotal_cents, totals.subtotal),
        (order.tax_cents, totals.tax),
        (order.discount_cents, totals.discount),
        (order.total_cents, totals.total),
    ]
    .iter()
    .any(|(stored, computed)| (computed.cents() - stored).abs() > TOTAL_TOLERANCE_CENTS)
}

/// Maintenance service implementation.
#[derive(Debug, Clone)]
pub struct MaintenanceService {
    state: Arc<AppState>,
}

impl MaintenanceService {
    /// Create a new maintenance service.
    pub fn new(state: Arc<AppState>) -> Self {
        MaintenanceService { state }
    }

    /// Reprices every sales order's items and rewrites whatever drifted.
    ///
    /// Orders that cannot be priced from their stored rows are logged and
    /// skipped; the pass carries on with the rest.
    pub async fn recalculate_order_totals(&self) -> ServiceResult<RecalcReport> {
        let repo = self.state.db.sales();
        let orders = repo.all_orders().await?;
        info!(orders = orders.len(), "Recalculating order totals");

        let mut report = RecalcReport::default();
        for order in &orders {
            report.checked += 1;

            let items = repo.get_items(&order.id).await?;
            if items.is_empty() {
                warn!(order_number = %order.order_number, "Order has no items, skipping");
                report.skipped += 1;
                continue;
            }

            let repriced = match reprice(order, &items) {
                Ok(repriced) => repriced,
                Err(e) => {
                    warn!(order_number = %order.order_number, error = %e, "Order cannot be repriced, skipping");
                    report.skipped += 1;
                    continue;
                }
            };

            if repriced.changed_items.is_empty() && !totals_drifted(order, &repriced.totals) {
                debug!(order_number = %order.order_number, "Order total ok");
                continue;
            }

            warn!(
                order_number = %order.order_number,
                items_fixed = repriced.changed_items.len(),
                stored = order.total_cents,
                recomputed = repriced.totals.total.cents(),
                "Order amounts drifted, fixing"
            );
            repo.reprice_order(&order.id, &repriced.changed_items, &repriced.totals)
                .await?;
            report.fixed += 1;
        }

        info!(
            checked = report.checked,
            fixed = report.fixed,
            skipped = report.skipped,
            "Order totals recalculated"
        );
        Ok(report)
    }

    /// Active stocked products at or below their minimum level.
    pub async fn low_stock(&self, page: PageRequest) -> ServiceResult<Page<Product>> {
        let page = self.state.db.products().low_stock(self.state.page(page)).await?;
        Ok(page)
    }

    /// Database connectivity and migration state.
    pub async fn check(&self) -> ServiceResult<HealthReport> {
        let database_ok = self.state.db.health_check().await;
        let MigrationStatus { total, applied } = self.state.db.migration_status().await?;

        Ok(HealthReport {
            database_ok,
            migrations_applied: applied,
            migrations_total: total,
        })
    }
}
