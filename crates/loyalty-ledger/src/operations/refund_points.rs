//! # Refund Points
//!
//! Reverses an order's point activity for one user.
//!
//! ## Adjustments
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  entries of (user, order)                                               │
//! │       │                                                                 │
//! │       ├── confirmed USE    ──► balance.refund(sum)  ──► EARN / REFUND   │
//! │       │                                                                 │
//! │       └── confirmed EARN                                                │
//! │                            ──► balance.expire(sum)  ──► CANCEL / REFUND │
//! │                            ──► each EARN status = CANCELLED             │
//! │                                                                         │
//! │  one upsert of the balance, one commit                                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The restoration of spent points is recorded as an EARN entry with reason
//! REFUND. Reports that group by entry type count it as an earn.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use loyalty_core::validation::{validate_order_id, validate_user_id};
use loyalty_core::{EntryStatus, EntryType, LedgerEntry, NewLedgerEntry};

use crate::deadline::Deadline;
use crate::error::PointsResult;
use crate::service::PointService;

/// What a refund changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefundOutcome {
    /// Spent points handed back.
    pub restored: i64,
    /// Earned points withdrawn.
    pub cancelled: i64,
    /// Available balance after the refund.
    pub balance_after: i64,
    /// The EARN / REFUND entry, if anything was restored.
    pub restore_entry: Option<LedgerEntry>,
    /// The CANCEL entry, if anything was withdrawn.
    pub cancel_entry: Option<LedgerEntry>,
}

impl RefundOutcome {
    /// True when the order had no point activity to reverse.
    pub fn is_noop(&self) -> bool {
        self.restore_entry.is_none() && self.cancel_entry.is_none()
    }
}

impl PointService {
    /// Refunds the points of an order.
    ///
    /// Fails with `NotFound` if the user has no balance.
    pub async fn refund_points(
        &self,
        user_id: i64,
        order_id: i64,
        deadline: Deadline,
    ) -> PointsResult<RefundOutcome> {
        validate_user_id(user_id)?;
        validate_order_id(order_id)?;

        let outcome = deadline.run(self.refund_in_uow(user_id, order_id)).await?;
        self.invalidate_cached(user_id).await;

        info!(
            user_id,
            order_id,
            restored = outcome.restored,
            cancelled = outcome.cancelled,
            balance_after = outcome.balance_after,
            "Order points refunded"
        );
        Ok(outcome)
    }

    async fn refund_in_uow(&self, user_id: i64, order_id: i64) -> PointsResult<RefundOutcome> {
        let now = Self::now();
        let mut uow = self.db.begin().await?;

        let mut balance = self.db.balances().get_locked(&mut uow, user_id).await?;

        let entries: Vec<LedgerEntry> = self
            .db
            .ledger()
            .by_order(&mut uow, order_id)
            .await?
            .into_iter()
            .filter(|e| e.user_id == user_id && e.status == EntryStatus::Confirmed)
            .collect();

        let restored: i64 = entries
            .iter()
            .filter(|e| e.entry_type == EntryType::Use)
            .map(|e| e.amount)
            .sum();

        // Swept batches are cancelled too; a withdrawal the balance cannot
        // cover is skipped by `expire`.
        let earned: Vec<&LedgerEntry> = entries
            .iter()
            .filter(|e| e.entry_type == EntryType::Earn)
            .collect();
        let cancelled: i64 = earned.iter().map(|e| e.amount).sum();

        let mut restore_entry = None;
        if restored > 0 {
            balance.refund(restored, now);
            let entry = self
                .db
                .ledger()
                .append(
                    &mut uow,
                    NewLedgerEntry::refund_restore(user_id, restored, balance.available_balance, order_id, now),
                )
                .await?;
            restore_entry = Some(entry);
        }

        let mut cancel_entry = None;
        if cancelled > 0 {
            if !balance.expire(cancelled, now).is_applied() {
                warn!(
                    user_id,
                    order_id,
                    amount = cancelled,
                    available = balance.available_balance,
                    "Earned points already spent, balance left unchanged"
                );
            }

            let entry = self
                .db
                .ledger()
                .append(
                    &mut uow,
                    NewLedgerEntry::refund_cancel(user_id, cancelled, balance.available_balance, order_id, now),
                )
                .await?;
            cancel_entry = Some(entry);

            for earn in earned {
                let mut earn = earn.clone();
                earn.status = EntryStatus::Cancelled;
                self.db.ledger().update_flags(&mut uow, &earn).await?;
            }
        }

        self.db.balances().upsert(&mut uow, &balance).await?;
        uow.commit().await?;

        Ok(RefundOutcome {
            restored,
            cancelled,
            balance_after: balance.available_balance,
            restore_entry,
            cancel_entry,
        })
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
