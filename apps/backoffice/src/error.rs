//! # Service Error Type
//!
//! Unified error type for the service layer.
//!
//! ## Error Handling Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Flow in Tradeflow                              │
//! │                                                                         │
//! │  Service call (e.g. SalesService::create_order)                         │
//! │         │                                                               │
//! │         ▼                                                               │
//! │  Validation Error? ── ValidationError ──────────┐                       │
//! │         │                                       │                       │
//! │         ▼                                       ▼                       │
//! │  Business rule? ───── CoreError ──────────► ServiceError                │
//! │         │                                  { code, message }            │
//! │         ▼                                       ▲                       │
//! │  Database Error? ──── DbError ──────────────────┘                       │
//! │                       (Rule(CoreError) unwrapped first)                 │
//! │                                                                         │
//! │  A REST boundary maps `code` with `ErrorCode::http_status()`.           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::Serialize;
use tradeflow_core::{CoreError, ValidationError};
use tradeflow_db::DbError;

/// Error returned by every service operation.
///
/// ## Serialization
/// ```json
/// {
///   "code": "INSUFFICIENT_STOCK",
///   "message": "Insufficient stock for HW-BOLT-M8: 6 available, 8 requested"
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceError {
    /// Machine-readable error code for programmatic handling
    pub code: ErrorCode,

    /// Human-readable error message for display
    pub message: String,
}

/// Error codes for service results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Resource not found (404)
    NotFound,

    /// Input validation failed (400)
    ValidationError,

    /// Unique key already taken (409)
    Conflict,

    /// Not enough stock for an order (409)
    InsufficientStock,

    /// Payment rejected by settlement rules (422)
    PaymentError,

    /// Operation not allowed in the current state (422)
    BusinessLogic,

    /// Database operation failed (500)
    DatabaseError,

    /// Internal error (500)
    Internal,
}

impl ErrorCode {
    /// HTTP status a REST boundary should answer with.
    pub fn http_status(&self) -> u16 {
        match self {
            ErrorCode::NotFound => 404,
            ErrorCode::ValidationError => 400,
            ErrorCode::Conflict | ErrorCode::InsufficientStock => 409,
            ErrorCode::PaymentError | ErrorCode::BusinessLogic => 422,
            ErrorCode::DatabaseError | ErrorCode::Internal => 500,
        }
    }
}

impl ServiceError {
    /// Creates a new service error.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        ServiceError {
            code,
            message: message.into(),
        }
    }

    /// Creates a not found error.
    pub fn not_found(resource: &str, id: &str) -> Self {
        ServiceError::new(ErrorCode::NotFound, format!("{} not found: {}", resource, id))
    }

    /// Creates a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        ServiceError::new(ErrorCode::ValidationError, message)
    }

    /// Creates a business rule error.
    pub fn rule(message: impl Into<String>) -> Self {
        ServiceError::new(ErrorCode::BusinessLogic, message)
    }

    /// Creates an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        ServiceError::new(ErrorCode::Internal, message)
    }
}

/// Result type for service operations.
pub type ServiceResult<T> = Result<T, ServiceError>;

/// Converts database errors to service errors.
impl From<DbError> for ServiceError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, id } => ServiceError::not_found(&entity, &id),
            DbError::UniqueViolation { field, value } => ServiceError::new(
                ErrorCode::Conflict,
                format!("{} '{}' already exists", field, value),
            ),
            DbError::ForeignKeyViolation { message } => {
                tracing::warn!("Foreign key violation: {}", message);
                ServiceError::validation("Invalid reference")
            }
            DbError::InsufficientStock {
                sku,
                available,
                requested,
            } => ServiceError::new(
                ErrorCode::InsufficientStock,
                format!(
                    "Insufficient stock for {}: {} available, {} requested",
                    sku, available, requested
                ),
            ),
            DbError::Rule(core) => core.into(),
            DbError::ConnectionFailed(_) => {
                ServiceError::new(ErrorCode::DatabaseError, "Database connection failed")
            }
            DbError::MigrationFailed(_) => {
                ServiceError::new(ErrorCode::DatabaseError, "Database migration failed")
            }
            DbError::QueryFailed(e) => {
                // Log the actual error but return a generic message
                tracing::error!("Database query failed: {}", e);
                ServiceError::new(ErrorCode::DatabaseError, "Database operation failed")
            }
            DbError::PoolExhausted => {
                ServiceError::new(ErrorCode::DatabaseError, "Database pool exhausted")
            }
            DbError::Internal(e) => {
                tracing::error!("Internal database error: {}", e);
                ServiceError::new(ErrorCode::DatabaseError, "Database operation failed")
            }
        }
    }
}

/// Converts core errors to service errors.
impl From<CoreError> for ServiceError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::InsufficientStock {
                sku,
                available,
                requested,
            } => ServiceError::new(
                ErrorCode::InsufficientStock,
                format!(
                    "Insufficient stock for {}: {} available, {} requested",
                    sku, available, requested
                ),
            ),
            CoreError::Overpayment { .. }
            | CoreError::AlreadyPaid
            | CoreError::InvalidPaymentAmount { .. } => {
                ServiceError::new(ErrorCode::PaymentError, err.to_string())
            }
            CoreError::InvalidState { .. } => ServiceError::rule(err.to_string()),
            CoreError::Validation(e) => e.into(),
            CoreError::EmptyOrder
            | CoreError::TooManyLines { .. }
            | CoreError::DiscountTooLarge { .. }
            | CoreError::AmountOverflow(_) => ServiceError::validation(err.to_string()),
        }
    }
}

impl From<ValidationError> for ServiceError {
    fn from(err: ValidationError) -> Self {
        ServiceError::validation(err.to_string())
    }
}

impl std::fmt::Display for ServiceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{:?}] {}", self.code, self.message)
    }
}

impl std::error::Error for ServiceError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_db_rule_unwraps_to_core_mapping() {
        let err: ServiceError =
            DbError::Rule(CoreError::invalid_state("Sales order", "shipped", "delete")).into();
        assert_eq!(err.code, ErrorCode::BusinessLogic);
        assert_eq!(err.message, "Sales order is shipped, cannot delete");
    }

    #[test]
    fn test_duplicate_is_conflict() {
        let err: ServiceError = DbError::duplicate("sku", "HW-1").into();
        assert_eq!(err.code, ErrorCode::Conflict);
        assert_eq!(err.code.http_status(), 409);
    }

    #[test]
    fn test_payment_errors() {
        let err: ServiceError = CoreError::AlreadyPaid.into();
        assert_eq!(err.code, ErrorCode::PaymentError);
        assert_eq!(err.code.http_status(), 422);
    }

    #[test]
    fn test_validation_error() {
        let err: ServiceError = ValidationError::Required {
            field: "name".to_string(),
        }
        .into();
        assert_eq!(err.code, ErrorCode::ValidationError);
        assert_eq!(err.message, "name is required");
    }

    #[test]
    fn test_serialized_shape() {
        let err = ServiceError::not_found("Product", "p-1");
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["code"], "NOT_FOUND");
        assert_eq!(json["message"], "Product not found: p-1");
    }
}
