//! # Domain Types
//!
//! Core domain records used throughout Tradeflow.
//!
//! ## Type Map
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  party        catalog          sales              purchase              │
//! │  ─────────    ─────────────    ───────────────    ──────────────────    │
//! │  Customer     Product          SalesOrder         PurchaseOrder         │
//! │  Supplier     StockMovement    SalesOrderItem     PurchaseOrderItem     │
//! │                                Invoice            PurchaseInvoice       │
//! │                                Payment            PurchasePayment       │
//! │                                Delivery           PurchaseReceipt       │
//! │                                                                         │
//! │  accounting                    staff                                    │
//! │  ───────────────────────────   ─────────────────────                    │
//! │  CreditHead / DebitHead        Department                               │
//! │  Income / Expense / Payroll    Staff                                    │
//! │  TaxSubmission                 Leave                                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Conventions
//! - `id`: UUID v4 string, immutable
//! - Business numbers (`order_number`, `po_number`, ...) are human-readable
//! - Amounts are `*_cents: i64`, percentages are `*_bps: u32`
//! - `New*` structs are service inputs, `*Update` structs are partial updates

use serde::{Deserialize, Serialize};
use ts_rs::TS;

pub mod accounting;
pub mod catalog;
pub mod party;
pub mod purchase;
pub mod sales;
pub mod staff;

pub use accounting::*;
pub use catalog::*;
pub use party::*;
pub use purchase::*;
pub use sales::*;
pub use staff::*;

// =============================================================================
// Line Items (shared by sales and purchase orders)
// =============================================================================

/// A requested order line.
///
/// `unit_price_cents` and `tax_bps` fall back to the product's own price
/// (sales: price, purchase: cost) and tax rate when omitted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewLineItem {
    pub product_id: String,
    pub quantity: i64,
    pub unit_price_cents: Option<i64>,
    #[serde(default)]
    pub discount_cents: i64,
    pub tax_bps: Option<u32>,
}

// =============================================================================
// Pagination
// =============================================================================

/// One page of a listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Total rows matching the filter (all pages).
    pub total: i64,
    /// 1-based page number.
    pub page: u32,
    pub per_page: u32,
}

impl<T> Page<T> {
    /// Number of pages needed for `total` rows.
    pub fn total_pages(&self) -> u32 {
        if self.per_page == 0 {
            return 0;
        }
        ((self.total.max(0) as u64).div_ceil(self.per_page as u64)) as u32
    }

    /// Maps the items, keeping the paging information.
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            page: self.page,
            per_page: self.per_page,
        }
    }
}

/// Requested page. Page numbers start at 1.
///
/// `per_page` left unset takes the caller's configured default, see
/// [`PageRequest::or_page_size`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PageRequest {
    pub page: u32,
    #[serde(default)]
    pub per_page: Option<u32>,
}

impl PageRequest {
    pub fn new(page: u32, per_page: u32) -> Self {
        PageRequest {
            page: page.max(1),
            per_page: Some(per_page.max(1)),
        }
    }

    /// Fills an unset `per_page` with `size`.
    pub fn or_page_size(self, size: u32) -> Self {
        PageRequest::new(self.page, self.per_page.unwrap_or(size))
    }

    /// Caps `per_page` at `max`.
    pub fn clamp(self, max: u32) -> Self {
        PageRequest::new(self.page, self.per_page().min(max.max(1)))
    }

    /// Page size, [`DEFAULT_PAGE_SIZE`](crate::DEFAULT_PAGE_SIZE) when unset.
    pub fn per_page(&self) -> u32 {
        self.per_page.unwrap_or(crate::DEFAULT_PAGE_SIZE).max(1)
    }

    /// SQL OFFSET for this page.
    pub fn offset(&self) -> i64 {
        (self.page.max(1) as i64 - 1) * self.per_page() as i64
    }

    /// SQL LIMIT for this page.
    pub fn limit(&self) -> i64 {
        self.per_page() as i64
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        PageRequest {
            page: 1,
            per_page: None,
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_request_offset() {
        assert_eq!(PageRequest::new(1, 20).offset(), 0);
        assert_eq!(PageRequest::new(3, 20).offset(), 40);
        // Page 0 is treated as page 1.
        assert_eq!(PageRequest::new(0, 20).offset(), 0);
    }

    #[test]
    fn test_page_request_clamp() {
        let req = PageRequest::new(2, 500).clamp(100);
        assert_eq!(req.per_page(), 100);
        assert_eq!(req.page, 2);
    }

    #[test]
    fn test_page_request_unset_size() {
        let req = PageRequest::default();
        assert_eq!(req.per_page, None);
        assert_eq!(req.limit(), crate::DEFAULT_PAGE_SIZE as i64);
        assert_eq!(req.or_page_size(7).per_page(), 7);
        assert_eq!(PageRequest::new(1, 30).or_page_size(7).per_page(), 30);
    }

    #[test]
    fn test_total_pages() {
        let page: Page<u8> = Page {
            items: vec![],
            total: 41,
            page: 1,
            per_page: 20,
        };
        assert_eq!(page.total_pages(), 3);
    }
}
