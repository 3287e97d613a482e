//! # Point Policy
//!
//! The numeric rules that govern earning, spending and expiry.
//!
//! ## Rules at a Glance
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          Point Policy                                   │
//! │                                                                         │
//! │  EARN                                                                   │
//! │  ├── purchase: floor(payment × earn_rate), capped at max_earn_per_order │
//! │  ├── review:   review_text_points | review_photo_points                 │
//! │  └── signup:   signup_bonus                                             │
//! │                                                                         │
//! │  USE (first failing check wins)                                         │
//! │  ├── use ≥ min_use_amount                                               │
//! │  ├── use % use_unit == 0                                                │
//! │  ├── use ≤ available                                                    │
//! │  ├── use ≤ floor(order × max_use_rate)                                  │
//! │  └── order − use ≥ min_payment_amount                                   │
//! │                                                                         │
//! │  EXPIRY                                                                 │
//! │  └── earned_at + expiry_months (calendar months)                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A policy is loaded once (see the `[policy]` config section) and handed
//! to the service explicitly. Nothing here reads a clock.

use chrono::{DateTime, Duration, Months, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult, PolicyViolation};
use crate::types::BasisPoints;
use crate::BPS_DENOMINATOR;

/// One hundred years.
const MAX_EXPIRY_MONTHS: u32 = 1200;

// =============================================================================
// Point Policy
// =============================================================================

/// Configurable numeric rules for earn, use and expiry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PointPolicy {
    /// Share of the payment credited as points (500 bps = 5%).
    pub earn_rate_bps: BasisPoints,
    pub review_text_points: i64,
    pub review_photo_points: i64,
    pub signup_bonus: i64,
    /// Carried for completeness; no earn calculation consults it.
    pub min_order_amount: i64,
    pub max_earn_per_order: i64,
    pub expiry_months: u32,
    /// Delay between order confirmation and the earn becoming effective.
    pub earn_delay_days: u32,

    pub min_use_amount: i64,
    pub use_unit: i64,
    /// Largest share of the order that may be paid in points.
    pub max_use_rate_bps: BasisPoints,
    /// Smallest amount that must still be paid by other means.
    pub min_payment_amount: i64,
}

impl Default for PointPolicy {
    fn default() -> Self {
        PointPolicy {
            earn_rate_bps: BasisPoints::from_bps(500),
            review_text_points: 100,
            review_photo_points: 500,
            signup_bonus: 3000,
            min_order_amount: 10_000,
            max_earn_per_order: 50_000,
            expiry_months: 12,
            earn_delay_days: 7,

            min_use_amount: 1000,
            use_unit: 100,
            max_use_rate_bps: BasisPoints::from_bps(5000),
            min_payment_amount: 1000,
        }
    }
}

impl PointPolicy {
    /// Checks that every rule can actually be evaluated.
    pub fn validate(&self) -> CoreResult<()> {
        if self.use_unit <= 0 {
            return Err(CoreError::InvalidPolicy("use_unit must be positive".into()));
        }
        // Expiry dates are stored as text and compared as strings, which
        // only holds for four-digit years.
        if self.expiry_months == 0 || self.expiry_months > MAX_EXPIRY_MONTHS {
            return Err(CoreError::InvalidPolicy(format!(
                "expiry_months must be between 1 and {MAX_EXPIRY_MONTHS}"
            )));
        }
        for (name, rate) in [
            ("earn_rate_bps", self.earn_rate_bps),
            ("max_use_rate_bps", self.max_use_rate_bps),
        ] {
            if rate.bps() as i64 > BPS_DENOMINATOR {
                return Err(CoreError::InvalidPolicy(format!(
                    "{name} must not exceed {BPS_DENOMINATOR}"
                )));
            }
        }
        for (name, value) in [
            ("review_text_points", self.review_text_points),
            ("review_photo_points", self.review_photo_points),
            ("signup_bonus", self.signup_bonus),
            ("min_order_amount", self.min_order_amount),
            ("max_earn_per_order", self.max_earn_per_order),
            ("min_use_amount", self.min_use_amount),
            ("min_payment_amount", self.min_payment_amount),
        ] {
            if value < 0 {
                return Err(CoreError::InvalidPolicy(format!(
                    "{name} must not be negative"
                )));
            }
        }
        Ok(())
    }

    /// Points earned for a purchase payment.
    ///
    /// Floors `payment × earn_rate` and caps the result at
    /// `max_earn_per_order`. Non-positive payments earn nothing.
    pub fn calculate_earn_points(&self, payment_amount: i64) -> i64 {
        if payment_amount <= 0 {
            return 0;
        }
        self.earn_rate_bps
            .apply_floor(payment_amount)
            .min(self.max_earn_per_order)
    }

    /// Points earned for a review.
    pub fn review_points(&self, is_photo: bool) -> i64 {
        if is_photo {
            self.review_photo_points
        } else {
            self.review_text_points
        }
    }

    /// Largest number of points usable on an order of `order_amount`.
    pub fn max_use_for_order(&self, order_amount: i64) -> i64 {
        self.max_use_rate_bps.apply_floor(order_amount)
    }

    /// Validates a point use request against the policy.
    ///
    /// ## Returns
    /// The first violated rule, in the order documented on
    /// [`PolicyViolation`].
    ///
    /// ## Example
    /// ```rust
    /// use loyalty_core::{PointPolicy, PolicyViolation};
    ///
    /// let policy = PointPolicy::default();
    /// assert!(policy.validate_use(1_000, 5_000, 1_000).is_ok());
    /// assert!(matches!(
    ///     policy.validate_use(4_500, 5_000, 10_000),
    ///     Err(PolicyViolation::ExceedMaxUseRate { .. })
    /// ));
    /// ```
    pub fn validate_use(
        &self,
        use_amount: i64,
        order_amount: i64,
        available_balance: i64,
    ) -> Result<(), PolicyViolation> {
        if use_amount < self.min_use_amount {
            return Err(PolicyViolation::BelowMinUseAmount {
                requested: use_amount,
                minimum: self.min_use_amount,
            });
        }

        if self.use_unit <= 0 || use_amount % self.use_unit != 0 {
            return Err(PolicyViolation::InvalidUseUnit {
                requested: use_amount,
                unit: self.use_unit,
            });
        }

        if available_balance < use_amount {
            return Err(PolicyViolation::InsufficientPoints {
                available: available_balance,
                requested: use_amount,
            });
        }

        let maximum = self.max_use_for_order(order_amount);
        if use_amount > maximum {
            return Err(PolicyViolation::ExceedMaxUseRate {
                requested: use_amount,
                maximum,
            });
        }

        // Points may never cover the whole order.
        let remaining = order_amount.saturating_sub(use_amount);
        if remaining < self.min_payment_amount {
            return Err(PolicyViolation::BelowMinPayment {
                remaining,
                minimum: self.min_payment_amount,
            });
        }

        Ok(())
    }

    /// When points earned at `earned_at` expire.
    ///
    /// Adds calendar months; a day past the end of the target month is
    /// clamped to its last day (Jan 31 + 1 month = Feb 29 in a leap year).
    /// Saturates at the largest representable instant.
    pub fn calculate_expiry_date(&self, earned_at: DateTime<Utc>) -> DateTime<Utc> {
        earned_at
            .checked_add_months(Months::new(self.expiry_months))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    /// When an order confirmed at `confirmed_at` becomes eligible to earn.
    pub fn calculate_earn_date(&self, confirmed_at: DateTime<Utc>) -> DateTime<Utc> {
        confirmed_at
            .checked_add_signed(Duration::days(self.earn_delay_days as i64))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
