//! # Point Balance
//!
//! The per-user balance aggregate. All arithmetic on a user's points goes
//! through the methods here; the store only loads and saves the result.
//!
//! ## Transitions
//! ```text
//!                 earn / refund                 use_points
//!   ┌─────────┐ ───────────────► ┌───────────┐ ───────────► total_used += n
//!   │ pending │  confirm_pending │ available │
//!   └─────────┘ ───────────────► └───────────┘ ───────────► (expire: skipped
//!        ▲                                       expire       when short)
//!        └── add_pending
//! ```
//!
//! `available` never goes negative: `use_points` refuses, while `expire`
//! and `confirm_pending` report [`BalanceChange::Skipped`] and leave the
//! balance untouched.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::PolicyViolation;

// =============================================================================
// Balance Change
// =============================================================================

/// Outcome of a transition that may be skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub enum BalanceChange {
    Applied,
    /// The guard failed; nothing was changed.
    Skipped,
}

impl BalanceChange {
    pub fn is_applied(&self) -> bool {
        matches!(self, BalanceChange::Applied)
    }
}

// =============================================================================
// Point Balance
// =============================================================================

/// A user's point balances and lifetime counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct PointBalance {
    pub user_id: i64,

    /// Spendable points.
    pub available_balance: i64,

    /// Points earned but not yet effective.
    pub pending_balance: i64,

    /// Lifetime points credited.
    pub total_earned: i64,

    /// Lifetime points spent. Refunds do not reduce it.
    pub total_used: i64,

    pub updated_at: DateTime<Utc>,
}

impl PointBalance {
    /// A zeroed balance, used the first time a user earns.
    pub fn new(user_id: i64, now: DateTime<Utc>) -> Self {
        PointBalance {
            user_id,
            available_balance: 0,
            pending_balance: 0,
            total_earned: 0,
            total_used: 0,
            updated_at: now,
        }
    }

    /// Checks that `amount` points are available.
    pub fn can_use(&self, amount: i64) -> Result<(), PolicyViolation> {
        if self.available_balance < amount {
            return Err(PolicyViolation::InsufficientPoints {
                available: self.available_balance,
                requested: amount,
            });
        }
        Ok(())
    }

    /// Spends points.
    pub fn use_points(&mut self, amount: i64, now: DateTime<Utc>) -> Result<(), PolicyViolation> {
        self.can_use(amount)?;
        self.available_balance -= amount;
        self.total_used += amount;
        self.updated_at = now;
        Ok(())
    }

    /// Credits points.
    pub fn earn(&mut self, amount: i64, now: DateTime<Utc>) {
        self.available_balance += amount;
        self.total_earned += amount;
        self.updated_at = now;
    }

    /// Records points that will become available later.
    pub fn add_pending(&mut self, amount: i64, now: DateTime<Utc>) {
        self.pending_balance += amount;
        self.updated_at = now;
    }

    /// Moves pending points to available.
    ///
    /// Skipped when fewer than `amount` points are pending.
    pub fn confirm_pending(&mut self, amount: i64, now: DateTime<Utc>) -> BalanceChange {
        if self.pending_balance < amount {
            return BalanceChange::Skipped;
        }
        self.pending_balance -= amount;
        self.available_balance += amount;
        self.total_earned += amount;
        self.updated_at = now;
        BalanceChange::Applied
    }

    /// Hands spent points back. `total_used` is left as is.
    pub fn refund(&mut self, amount: i64, now: DateTime<Utc>) {
        self.available_balance += amount;
        self.updated_at = now;
    }

    /// Removes points on expiry or earn cancellation.
    ///
    /// Skipped when fewer than `amount` points are available; partial
    /// removal never happens.
    pub fn expire(&mut self, amount: i64, now: DateTime<Utc>) -> BalanceChange {
        if self.available_balance < amount {
            return BalanceChange::Skipped;
        }
        self.available_balance -= amount;
        self.updated_at = now;
        BalanceChange::Applied
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
