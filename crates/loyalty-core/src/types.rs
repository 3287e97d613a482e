//! # Domain Types
//!
//! Core domain types used throughout the loyalty ledger.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │  LedgerEntry    │   │   EntryType     │   │   ReasonType    │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id (rowid)     │   │  Earn           │   │  Purchase       │       │
//! │  │  user_id        │   │  Use            │   │  Review         │       │
//! │  │  amount (> 0)   │   │  Expire         │   │  Signup         │       │
//! │  │  balance_after  │   │  Cancel         │   │  Refund         │       │
//! │  │  expires_at     │   └─────────────────┘   │  Admin          │       │
//! │  │  expired/status │                         └─────────────────┘       │
//! │  └─────────────────┘                                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐                              │
//! │  │  BasisPoints    │   │  EntryStatus    │                              │
//! │  │  ─────────────  │   │  ─────────────  │                              │
//! │  │  bps (u32)      │   │  Pending        │                              │
//! │  │  500 = 5%       │   │  Confirmed      │                              │
//! │  └─────────────────┘   │  Cancelled      │                              │
//! │                        └─────────────────┘                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Entry Mutability
//! A ledger entry is written once. The only fields that may change after
//! the insert are `expired` (false → true, by the expiry sweep) and
//! `status` (Confirmed → Cancelled, when the earning order is refunded).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::BPS_DENOMINATOR;

// =============================================================================
// Basis Points
// =============================================================================

/// A rate represented in basis points (bps).
///
/// 1 basis point = 0.01% = 1/10000, so 500 bps = 5% and 5000 bps = 50%.
/// Keeping rates integral means every point calculation is exact integer
/// arithmetic with floor rounding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BasisPoints(u32);

impl BasisPoints {
    /// Creates a rate from basis points.
    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        BasisPoints(bps)
    }

    /// Returns the rate in basis points.
    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }

    /// Returns the rate as a percentage (for display only).
    #[inline]
    pub fn percentage(&self) -> f64 {
        self.0 as f64 / 100.0
    }

    /// Applies the rate to an amount, rounding toward negative infinity.
    ///
    /// ```rust
    /// use loyalty_core::BasisPoints;
    ///
    /// let rate = BasisPoints::from_bps(500);
    /// assert_eq!(rate.apply_floor(20_000), 1_000);
    /// assert_eq!(rate.apply_floor(19), 0);
    /// ```
    pub fn apply_floor(&self, amount: i64) -> i64 {
        let scaled = amount as i128 * self.0 as i128;
        let floored = scaled.div_euclid(BPS_DENOMINATOR as i128);
        floored.clamp(i64::MIN as i128, i64::MAX as i128) as i64
    }
}

// =============================================================================
// Entry Type
// =============================================================================

/// The kind of balance-affecting event a ledger entry records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "UPPERCASE"))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntryType {
    /// Points credited (purchase, review, signup, refund restoration).
    Earn,
    /// Points spent on an order.
    Use,
    /// Points removed by the expiry sweep.
    Expire,
    /// Points withdrawn because the earning order was refunded.
    Cancel,
}

impl EntryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryType::Earn => "EARN",
            EntryType::Use => "USE",
            EntryType::Expire => "EXPIRE",
            EntryType::Cancel => "CANCEL",
        }
    }
}

// =============================================================================
// Reason Type
// =============================================================================

/// Why a ledger entry was written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "UPPERCASE"))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReasonType {
    Purchase,
    Review,
    Signup,
    Refund,
    /// System-initiated adjustments, including expiry.
    Admin,
}

impl ReasonType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReasonType::Purchase => "PURCHASE",
            ReasonType::Review => "REVIEW",
            ReasonType::Signup => "SIGNUP",
            ReasonType::Refund => "REFUND",
            ReasonType::Admin => "ADMIN",
        }
    }
}

// =============================================================================
// Entry Status
// =============================================================================

/// Lifecycle status of a ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "UPPERCASE"))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntryStatus {
    /// Recorded but not yet effective (delayed earn).
    Pending,
    /// Effective.
    Confirmed,
    /// Withdrawn by a refund.
    Cancelled,
}

impl Default for EntryStatus {
    fn default() -> Self {
        EntryStatus::Confirmed
    }
}

impl EntryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryStatus::Pending => "PENDING",
            EntryStatus::Confirmed => "CONFIRMED",
            EntryStatus::Cancelled => "CANCELLED",
        }
    }
}

// =============================================================================
// Ledger Entry
// =============================================================================

/// One persisted, balance-affecting event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct LedgerEntry {
    /// Store-assigned identifier.
    pub id: i64,

    pub user_id: i64,

    pub entry_type: EntryType,

    /// Always positive; the direction comes from `entry_type`.
    pub amount: i64,

    /// The user's available balance right after this entry was applied.
    pub balance_after: i64,

    pub reason_type: ReasonType,

    /// Human-readable description shown in the transaction history.
    pub reason_detail: String,

    pub order_id: Option<i64>,

    /// Set on earned entries only.
    pub earned_at: Option<DateTime<Utc>>,

    /// Set on earned entries only.
    pub expires_at: Option<DateTime<Utc>>,

    /// Flipped to true by the expiry sweep.
    pub expired: bool,

    pub status: EntryStatus,

    pub created_at: DateTime<Utc>,
}

impl LedgerEntry {
    /// True for an earned batch that still counts toward spendable supply.
    pub fn is_spendable_earn(&self) -> bool {
        self.entry_type == EntryType::Earn
            && !self.expired
            && self.status == EntryStatus::Confirmed
    }

    /// True once the entry was swept or its expiry date has passed.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at {
            None => false,
            Some(expires_at) => self.expired || now > expires_at,
        }
    }
}

// =============================================================================
// New Ledger Entry
// =============================================================================

/// A ledger entry that has not been persisted yet.
///
/// The store assigns the id on append and hands back a [`LedgerEntry`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewLedgerEntry {
    pub user_id: i64,
    pub entry_type: EntryType,
    pub amount: i64,
    pub balance_after: i64,
    pub reason_type: ReasonType,
    pub reason_detail: String,
    pub order_id: Option<i64>,
    pub earned_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub expired: bool,
    pub status: EntryStatus,
    pub created_at: DateTime<Utc>,
}

impl NewLedgerEntry {
    /// An earned batch with an expiry date.
    #[allow(clippy::too_many_arguments)]
    pub fn earn(
        user_id: i64,
        amount: i64,
        balance_after: i64,
        reason_type: ReasonType,
        reason_detail: impl Into<String>,
        order_id: Option<i64>,
        now: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        NewLedgerEntry {
            user_id,
            entry_type: EntryType::Earn,
            amount,
            balance_after,
            reason_type,
            reason_detail: reason_detail.into(),
            order_id,
            earned_at: Some(now),
            expires_at: Some(expires_at),
            expired: false,
            status: EntryStatus::Confirmed,
            created_at: now,
        }
    }

    /// Points spent on an order.
    pub fn spend(user_id: i64, amount: i64, balance_after: i64, order_id: i64, now: DateTime<Utc>) -> Self {
        NewLedgerEntry {
            user_id,
            entry_type: EntryType::Use,
            amount,
            balance_after,
            reason_type: ReasonType::Purchase,
            reason_detail: "Order payment".to_string(),
            order_id: Some(order_id),
            earned_at: None,
            expires_at: None,
            expired: false,
            status: EntryStatus::Confirmed,
            created_at: now,
        }
    }

    /// Spent points handed back by an order refund.
    ///
    /// Recorded as an EARN with reason REFUND but without an expiry date,
    /// so the sweep never picks it up.
    pub fn refund_restore(
        user_id: i64,
        amount: i64,
        balance_after: i64,
        order_id: i64,
        now: DateTime<Utc>,
    ) -> Self {
        NewLedgerEntry {
            user_id,
            entry_type: EntryType::Earn,
            amount,
            balance_after,
            reason_type: ReasonType::Refund,
            reason_detail: "Order refund".to_string(),
            order_id: Some(order_id),
            earned_at: None,
            expires_at: None,
            expired: false,
            status: EntryStatus::Confirmed,
            created_at: now,
        }
    }

    /// Withdrawal of points an order had earned, written on refund.
    pub fn refund_cancel(
        user_id: i64,
        amount: i64,
        balance_after: i64,
        order_id: i64,
        now: DateTime<Utc>,
    ) -> Self {
        NewLedgerEntry {
            user_id,
            entry_type: EntryType::Cancel,
            amount,
            balance_after,
            reason_type: ReasonType::Refund,
            reason_detail: "Earned points cancelled by order refund".to_string(),
            order_id: Some(order_id),
            earned_at: None,
            expires_at: None,
            expired: false,
            status: EntryStatus::Cancelled,
            created_at: now,
        }
    }

    /// Aggregate expiry of one user's batches in a sweep.
    pub fn expiry(user_id: i64, amount: i64, balance_after: i64, now: DateTime<Utc>) -> Self {
        NewLedgerEntry {
            user_id,
            entry_type: EntryType::Expire,
            amount,
            balance_after,
            reason_type: ReasonType::Admin,
            reason_detail: "Points expired".to_string(),
            order_id: None,
            earned_at: None,
            expires_at: None,
            expired: false,
            status: EntryStatus::Confirmed,
            created_at: now,
        }
    }

    /// Attaches the store-assigned id.
    pub fn with_id(self, id: i64) -> LedgerEntry {
        LedgerEntry {
            id,
            user_id: self.user_id,
            entry_type: self.entry_type,
            amount: self.amount,
            balance_after: self.balance_after,
            reason_type: self.reason_type,
            reason_detail: self.reason_detail,
            order_id: self.order_id,
            earned_at: self.earned_at,
            expires_at: self.expires_at,
            expired: self.expired,
            status: self.status,
            created_at: self.created_at,
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
