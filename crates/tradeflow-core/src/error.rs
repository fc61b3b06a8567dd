//! # Error Types
//!
//! Domain-specific error types for tradeflow-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  tradeflow-core errors (this file)                                     │
//! │  ├── CoreError        - Business rule violations                       │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  tradeflow-db errors (separate crate)                                  │
//! │  └── DbError          - Database operation failures                    │
//! │                                                                         │
//! │  backoffice errors (in app)                                            │
//! │  └── ServiceError     - What callers see (code + message)              │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → ServiceError ← DbError            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
///
/// These errors represent business rule violations found by the pure
/// pricing, settlement and stock functions.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Insufficient stock to fulfil an order line.
    ///
    /// ## When This Occurs
    /// - A sales order asks for more units than the product has on hand
    /// - Several lines of the same product add up to more than stock
    ///
    /// ## User Workflow
    /// ```text
    /// Create order (WIDGET x 5, WIDGET x 3)
    ///      │
    ///      ▼
    /// Aggregate: WIDGET x 8, available = 6
    ///      │
    ///      ▼
    /// InsufficientStock { sku: "WIDGET", available: 6, requested: 8 }
    ///      │
    ///      ▼
    /// Order rejected, nothing written
    /// ```
    #[error("Insufficient stock for {sku}: available {available}, requested {requested}")]
    InsufficientStock {
        sku: String,
        available: i64,
        requested: i64,
    },

    /// An order or purchase order was submitted without any lines.
    #[error("Order must contain at least one item")]
    EmptyOrder,

    /// Too many lines on a single document.
    #[error("Order cannot have more than {max} items")]
    TooManyLines { max: usize },

    /// A discount is larger than the amount it applies to.
    ///
    /// ## When This Occurs
    /// - Line discount greater than quantity × unit price
    /// - Order-level discount greater than the order subtotal
    #[error("Discount {discount} exceeds {target} {amount}")]
    DiscountTooLarge {
        target: String,
        discount: String,
        amount: String,
    },

    /// Money arithmetic left the representable range.
    #[error("Amount overflow while computing {0}")]
    AmountOverflow(String),

    /// Payment would exceed the outstanding balance.
    #[error("Payment of {amount} exceeds the outstanding balance of {due}")]
    Overpayment { amount: String, due: String },

    /// The document has nothing left to pay.
    #[error("Document is already fully paid")]
    AlreadyPaid,

    /// Payment amount is invalid.
    #[error("Invalid payment amount: {reason}")]
    InvalidPaymentAmount { reason: String },

    /// A record is not in a state that allows the requested operation.
    ///
    /// ## When This Occurs
    /// - Deleting a sales order that has already shipped
    /// - Receiving goods on a purchase order that was already received
    /// - Approving a leave that was already rejected
    #[error("{entity} is {current}, cannot {action}")]
    InvalidState {
        entity: String,
        current: String,
        action: String,
    },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl CoreError {
    /// Creates an InvalidState error.
    pub fn invalid_state(
        entity: impl Into<String>,
        current: impl Into<String>,
        action: impl Into<String>,
    ) -> Self {
        CoreError::InvalidState {
            entity: entity.into(),
            current: current.into(),
            action: action.into(),
        }
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These errors occur when user input doesn't meet requirements.
/// Used for early validation before business logic runs.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Value must not be negative.
    #[error("{field} cannot be negative")]
    MustNotBeNegative { field: String },

    /// Invalid format (e.g., invalid UUID, invalid email, bad decimal).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// End of a date range lies before its start.
    #[error("{field}: end date {end} is before start date {start}")]
    InvalidDateRange {
        field: String,
        start: String,
        end: String,
    },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = CoreError::InsufficientStock {
            sku: "WIDGET-01".to_string(),
            available: 3,
            requested: 5,
        };
        assert_eq!(
            err.to_string(),
            "Insufficient stock for WIDGET-01: available 3, requested 5"
        );

        let err = CoreError::invalid_state("Purchase order", "received", "receive goods");
        assert_eq!(
            err.to_string(),
            "Purchase order is received, cannot receive goods"
        );
    }

    #[test]
    fn test_validation_error_messages() {
        let err = ValidationError::Required {
            field: "sku".to_string(),
        };
        assert_eq!(err.to_string(), "sku is required");

        let err = ValidationError::MustNotBeNegative {
            field: "discount".to_string(),
        };
        assert_eq!(err.to_string(), "discount cannot be negative");
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let validation_err = ValidationError::Required {
            field: "sku".to_string(),
        };
        let core_err: CoreError = validation_err.into();
        assert!(matches!(core_err, CoreError::Validation(_)));
    }
}
