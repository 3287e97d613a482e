//! # Error Types
//!
//! Domain-specific error types for loyalty-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  loyalty-core errors (this file)                                       │
//! │  ├── PolicyViolation  - Use request broke a policy rule                │
//! │  ├── ValidationError  - Malformed input (non-positive amount, etc.)    │
//! │  └── CoreError        - Wraps both, plus domain not-found cases        │
//! │                                                                         │
//! │  loyalty-db errors (separate crate)                                    │
//! │  └── DbError          - Database operation failures                    │
//! │                                                                         │
//! │  loyalty-ledger errors                                                 │
//! │  └── PointsError      - What the transport collaborator sees           │
//! │                                                                         │
//! │  Flow: PolicyViolation → CoreError → PointsError → ErrorResponse       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A use request violated the point policy.
    #[error(transparent)]
    Policy(#[from] PolicyViolation),

    /// Input validation error.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// The loaded policy cannot be evaluated.
    #[error("Invalid point policy: {0}")]
    InvalidPolicy(String),
}

// =============================================================================
// Policy Violation
// =============================================================================

/// Reasons a point use request is rejected.
///
/// ## Check Order
/// ```text
/// validate_use(use, order, available)
///      │
///      ├── use < min_use_amount ──────────────► BelowMinUseAmount
///      ├── use % use_unit != 0 ───────────────► InvalidUseUnit
///      ├── available < use ───────────────────► InsufficientPoints
///      ├── use > floor(order × max_use_rate) ─► ExceedMaxUseRate
///      └── order - use < min_payment_amount ──► BelowMinPayment
/// ```
/// Only the first failing check is reported.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PolicyViolation {
    #[error("Below minimum use amount: requested {requested}, minimum {minimum}")]
    BelowMinUseAmount { requested: i64, minimum: i64 },

    #[error("Invalid use unit: {requested} is not a multiple of {unit}")]
    InvalidUseUnit { requested: i64, unit: i64 },

    /// Also raised when the FIFO walk over earned entries cannot cover the
    /// requested amount even though the balance row says it can.
    #[error("Insufficient points: available {available}, requested {requested}")]
    InsufficientPoints { available: i64, requested: i64 },

    #[error("Exceeds maximum use rate: requested {requested}, maximum {maximum}")]
    ExceedMaxUseRate { requested: i64, maximum: i64 },

    #[error("Below minimum payment amount: remaining payment {remaining}, minimum {minimum}")]
    BelowMinPayment { remaining: i64, minimum: i64 },
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These occur before any policy or store access.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },
}

impl ValidationError {
    /// Creates a MustBePositive error for the given field.
    pub fn must_be_positive(field: impl Into<String>) -> Self {
        ValidationError::MustBePositive {
            field: field.into(),
        }
    }
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================
