//! # Validation Module
//!
//! Input validation for point operations, applied before any store access.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Transport (out of this workspace)                            │
//! │  └── Request decoding                                                  │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE                                                  │
//! │  ├── Ids and amounts must be positive                                  │
//! │  └── Pagination clamped to sane bounds                                 │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Point policy (policy.rs)                                     │
//! │  └── Business rules on use amounts                                     │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 4: Database (SQLite)                                            │
//! │  └── CHECK constraints on amounts and enum columns                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates that `value` is strictly positive.
///
/// ## Example
/// ```rust
/// use loyalty_core::validation::validate_positive;
///
/// assert!(validate_positive("use_amount", 1_000).is_ok());
/// assert!(validate_positive("use_amount", 0).is_err());
/// ```
pub fn validate_positive(field: &str, value: i64) -> ValidationResult<()> {
    if value <= 0 {
        return Err(ValidationError::must_be_positive(field));
    }
    Ok(())
}

/// Validates a user id.
pub fn validate_user_id(user_id: i64) -> ValidationResult<()> {
    validate_positive("user_id", user_id)
}

/// Validates an order id.
pub fn validate_order_id(order_id: i64) -> ValidationResult<()> {
    validate_positive("order_id", order_id)
}

/// Validates the inputs of a point use request.
///
/// Only shape is checked here; the policy decides whether the amounts are
/// acceptable.
pub fn validate_use_request(
    user_id: i64,
    use_amount: i64,
    order_amount: i64,
    order_id: i64,
) -> ValidationResult<()> {
    validate_user_id(user_id)?;
    validate_positive("use_amount", use_amount)?;
    validate_positive("order_amount", order_amount)?;
    validate_order_id(order_id)
}

/// Validates a sweep batch size.
pub fn validate_batch_size(limit: i64) -> ValidationResult<()> {
    if limit <= 0 {
        return Err(ValidationError::OutOfRange {
            field: "limit".to_string(),
            min: 1,
            max: i64::MAX,
        });
    }
    Ok(())
}

// =============================================================================
// Pagination
// =============================================================================

/// A clamped page window over a user's transaction history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub limit: i64,
    pub offset: i64,
}

impl Pagination {
    /// Builds a window from raw limit/offset.
    ///
    /// A limit below 1 falls back to the default page size, a limit above
    /// the maximum is capped, and a negative offset becomes 0.
    ///
    /// ```rust
    /// use loyalty_core::validation::Pagination;
    ///
    /// assert_eq!(Pagination::new(0, 0).limit, 20);
    /// assert_eq!(Pagination::new(500, 0).limit, 100);
    /// assert_eq!(Pagination::new(10, -3).offset, 0);
    /// ```
    pub fn new(limit: i64, offset: i64) -> Self {
        let limit = if limit < 1 {
            DEFAULT_PAGE_SIZE
        } else {
            limit.min(MAX_PAGE_SIZE)
        };
        Pagination {
            limit,
            offset: offset.max(0),
        }
    }

    /// Builds a window from a 1-based page number.
    pub fn from_page(page: i64, limit: i64) -> Self {
        let page = page.max(1);
        let window = Self::new(limit, 0);
        Pagination {
            limit: window.limit,
            offset: (page - 1).saturating_mul(window.limit),
        }
    }

    /// 1-based page this window starts on.
    pub fn page(&self) -> i64 {
        self.offset / self.limit + 1
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Pagination::new(DEFAULT_PAGE_SIZE, 0)
    }
}

/// Number of pages needed for `total` items.
pub fn total_pages(total: i64, limit: i64) -> i64 {
    if limit <= 0 || total <= 0 {
        return 0;
    }
    (total + limit - 1) / limit
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_positive() {
        assert!(validate_positive("amount", 1).is_ok());
        assert_eq!(
            validate_positive("amount", -1),
            Err(ValidationError::MustBePositive {
                field: "amount".into()
            })
        );
    }

    #[test]
    fn test_validate_use_request_reports_first_bad_field() {
        assert!(validate_use_request(1, 1_000, 5_000, 9).is_ok());

        let err = validate_use_request(0, 0, 0, 0).unwrap_err();
        assert_eq!(err.to_string(), "user_id must be positive");

        let err = validate_use_request(1, 1_000, 0, 9).unwrap_err();
        assert_eq!(err.to_string(), "order_amount must be positive");

        let err = validate_use_request(1, 1_000, 5_000, -9).unwrap_err();
        assert_eq!(err.to_string(), "order_id must be positive");
    }

    #[test]
    fn test_validate_batch_size() {
        assert!(validate_batch_size(1000).is_ok());
        assert!(validate_batch_size(0).is_err());
    }

    #[test]
    fn test_pagination_clamps() {
        assert_eq!(Pagination::new(0, 0), Pagination { limit: 20, offset: 0 });
        assert_eq!(Pagination::new(-5, 40), Pagination { limit: 20, offset: 40 });
        assert_eq!(Pagination::new(101, 0).limit, 100);
        assert_eq!(Pagination::new(100, 0).limit, 100);
        assert_eq!(Pagination::new(1, -1), Pagination { limit: 1, offset: 0 });
        assert_eq!(Pagination::default().limit, 20);
    }

    #[test]
    fn test_pagination_from_page() {
        let window = Pagination::from_page(3, 10);
        assert_eq!(window.offset, 20);
        assert_eq!(window.page(), 3);

        assert_eq!(Pagination::from_page(0, 10).offset, 0);
    }

    #[test]
    fn test_total_pages() {
        assert_eq!(total_pages(0, 20), 0);
        assert_eq!(total_pages(20, 20), 1);
        assert_eq!(total_pages(21, 20), 2);
        assert_eq!(total_pages(5, 0), 0);
    }
}
