//! # Service Error Types
//!
//! Error types returned by [`PointService`](crate::PointService).
//!
//! ## Error Categories
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Point Error Categories                            │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │  Client fault   │  │   Not found     │  │     Server fault        │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  Validation     │  │  NotFound       │  │  Storage                │ │
//! │  │  Policy         │  │                 │  │  DeadlineExceeded       │ │
//! │  │                 │  │                 │  │  InvalidPolicy          │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! │         │                     │                        │               │
//! │         ▼                     ▼                        ▼               │
//! │  VALIDATION_ERROR         NOT_FOUND                 INTERNAL           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Nothing here is retried automatically. Cache failures never reach this
//! type; they are logged where they happen.

use serde::Serialize;
use thiserror::Error;

use loyalty_core::{CoreError, PolicyViolation, ValidationError};
use loyalty_db::DbError;

/// Result type alias for point operations.
pub type PointsResult<T> = Result<T, PointsError>;

/// Failure of a point operation.
#[derive(Debug, Error)]
pub enum PointsError {
    // =========================================================================
    // Client Errors
    // =========================================================================
    /// Malformed input, rejected before the store is touched.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// The request broke a point policy rule.
    #[error(transparent)]
    Policy(#[from] PolicyViolation),

    /// A balance or ledger entry does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    // =========================================================================
    // Server Errors
    // =========================================================================
    /// Store failure: connection, lock timeout, query or commit.
    #[error("Storage error: {0}")]
    Storage(DbError),

    /// The caller's deadline passed; the unit of work was rolled back.
    #[error("Deadline exceeded")]
    DeadlineExceeded,

    /// The configured policy cannot be evaluated.
    #[error("Invalid point policy: {0}")]
    InvalidPolicy(String),
}

impl PointsError {
    /// Creates a not found error.
    pub fn not_found(entity: impl Into<String>, id: impl ToString) -> Self {
        PointsError::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }

    /// Machine-readable category for the transport layer.
    pub fn code(&self) -> ErrorCode {
        match self {
            PointsError::Validation(_) | PointsError::Policy(_) => ErrorCode::ValidationError,
            PointsError::NotFound { .. } => ErrorCode::NotFound,
            PointsError::Storage(_) | PointsError::DeadlineExceeded | PointsError::InvalidPolicy(_) => {
                ErrorCode::Internal
            }
        }
    }

    /// True for errors the caller caused and should not retry unchanged.
    pub fn is_client_fault(&self) -> bool {
        matches!(self.code(), ErrorCode::ValidationError | ErrorCode::NotFound)
    }

    /// The policy violation behind this error, if any.
    pub fn policy_violation(&self) -> Option<&PolicyViolation> {
        match self {
            PointsError::Policy(v) => Some(v),
            _ => None,
        }
    }
}

/// Store errors keep their category; a missing row becomes `NotFound`.
impl From<DbError> for PointsError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, id } => PointsError::NotFound { entity, id },
            other => PointsError::Storage(other),
        }
    }
}

impl From<CoreError> for PointsError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Policy(v) => PointsError::Policy(v),
            CoreError::Validation(v) => PointsError::Validation(v),
            CoreError::InvalidPolicy(msg) => PointsError::InvalidPolicy(msg),
        }
    }
}

// =============================================================================
// Transport Response
// =============================================================================

/// Error codes for transport responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Input or policy rejected the request (400)
    ValidationError,

    /// Balance or entry missing (404)
    NotFound,

    /// Store, deadline or configuration failure (500)
    Internal,
}

/// What a transport collaborator sends back for a failed operation.
///
/// ```json
/// {
///   "code": "VALIDATION_ERROR",
///   "message": "Exceeds maximum use rate: requested 4500, maximum 2500"
/// }
/// ```
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    /// Machine-readable error code
    pub code: ErrorCode,

    /// Human-readable error message
    pub message: String,
}

impl ErrorResponse {
    /// Creates a new error response.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        ErrorResponse {
            code,
            message: message.into(),
        }
    }
}

/// Client errors pass their message through; server errors are logged and
/// replaced with a generic message.
impl From<PointsError> for ErrorResponse {
    fn from(err: PointsError) -> Self {
        let code = err.code();
        match err {
            PointsError::Storage(DbError::LockTimeout(e)) => {
                tracing::error!("Balance lock wait timed out: {}", e);
                ErrorResponse::new(code, "Balance is busy, try again later")
            }
            PointsError::Storage(e) => {
                tracing::error!("Point store operation failed: {}", e);
                ErrorResponse::new(code, "Point operation failed")
            }
            PointsError::InvalidPolicy(e) => {
                tracing::error!("Invalid point policy: {}", e);
                ErrorResponse::new(code, "Point operation failed")
            }
            other => ErrorResponse::new(code, other.to_string()),
        }
    }
}

impl std::fmt::Display for ErrorResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{:?}] {}", self.code, self.message)
    }
}

impl std::error::Error for ErrorResponse {}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_by_category() {
        let policy: PointsError = PolicyViolation::BelowMinUseAmount {
            requested: 500,
            minimum: 1000,
        }
        .into();
        assert_eq!(policy.code(), ErrorCode::ValidationError);
        assert!(policy.is_client_fault());

        let missing: PointsError = DbError::not_found("PointBalance", 7).into();
        assert_eq!(missing.code(), ErrorCode::NotFound);
        assert_eq!(missing.to_string(), "PointBalance not found: 7");

        let storage: PointsError = DbError::LockTimeout("database is locked".into()).into();
        assert_eq!(storage.code(), ErrorCode::Internal);
        assert!(!storage.is_client_fault());

        assert_eq!(PointsError::DeadlineExceeded.code(), ErrorCode::Internal);
    }

    #[test]
    fn test_core_error_conversion() {
        let err: PointsError = CoreError::InvalidPolicy("expiry_months must be positive".into()).into();
        assert!(matches!(err, PointsError::InvalidPolicy(_)));

        let err: PointsError = CoreError::Validation(ValidationError::must_be_positive("use_amount")).into();
        assert_eq!(err.to_string(), "Validation error: use_amount must be positive");
    }

    #[test]
    fn test_response_hides_internal_details() {
        let err: PointsError = DbError::QueryFailed("no such table: point_ledger".into()).into();
        let response = ErrorResponse::from(err);
        assert_eq!(response.code, ErrorCode::Internal);
        assert_eq!(response.message, "Point operation failed");

        let err = PointsError::Policy(PolicyViolation::InsufficientPoints {
            available: 500,
            requested: 1000,
        });
        let response = ErrorResponse::from(err);
        assert_eq!(response.message, "Insufficient points: available 500, requested 1000");

        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("\"code\":\"VALIDATION_ERROR\""));
    }
}
