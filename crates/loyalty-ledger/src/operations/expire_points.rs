//! # Expire Points
//!
//! Batch sweep over earned batches whose expiry has passed.
//!
//! ## Sweep
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  ledger().expiring_before(cutoff, limit)      (no lock, all users)      │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  group by user, first seen first                                        │
//! │       │                                                                 │
//! │       ▼  per user, own unit of work                                     │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │ lock balance ── fails? ──► warn, skip user, continue             │  │
//! │  │ mark_expired(entry) for each fetched entry                       │  │
//! │  │   └── counts only entries this run flipped                       │  │
//! │  │ sum > 0 ──► balance.expire ──► EXPIRE entry ──► upsert           │  │
//! │  │ commit                                                           │  │
//! │  └──────────────────────────────────────────────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Entries another run already flipped are skipped, so overlapping sweeps
//! and reruns over the same cutoff expire nothing twice.

use std::collections::hash_map::Entry;
use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use loyalty_core::validation::validate_batch_size;
use loyalty_core::{LedgerEntry, NewLedgerEntry};

use crate::deadline::Deadline;
use crate::error::PointsResult;
use crate::service::PointService;

/// Totals of one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepReport {
    /// Users whose unit of work committed.
    pub users_processed: usize,
    /// Users skipped because their balance or unit of work failed.
    pub users_skipped: usize,
    pub entries_expired: usize,
    pub points_expired: i64,
}

impl PointService {
    /// Expires up to `limit` batches with `expires_at <= cutoff`.
    ///
    /// The deadline covers the whole batch. Users committed before it
    /// passes stay committed.
    pub async fn expire_points(
        &self,
        cutoff: DateTime<Utc>,
        limit: i64,
        deadline: Deadline,
    ) -> PointsResult<SweepReport> {
        validate_batch_size(limit)?;
        deadline.run(self.sweep(cutoff, limit)).await
    }

    async fn sweep(&self, cutoff: DateTime<Utc>, limit: i64) -> PointsResult<SweepReport> {
        let due = self.db.ledger().expiring_before(cutoff, limit).await?;
        let mut report = SweepReport::default();

        if due.is_empty() {
            debug!(%cutoff, "No points due to expire");
            return Ok(report);
        }

        for (user_id, entries) in group_by_user(due) {
            match self.expire_user(user_id, &entries).await {
                Ok((count, points)) => {
                    report.users_processed += 1;
                    report.entries_expired += count;
                    report.points_expired += points;
                    if points > 0 {
                        self.invalidate_cached(user_id).await;
                    }
                }
                Err(e) => {
                    warn!(user_id, error = %e, "Skipping user in expiry sweep");
                    report.users_skipped += 1;
                }
            }
        }

        info!(
            %cutoff,
            users = report.users_processed,
            skipped = report.users_skipped,
            entries = report.entries_expired,
            points = report.points_expired,
            "Expiry sweep finished"
        );
        Ok(report)
    }

    /// Expires one user's due entries. Returns (entries flipped, points).
    async fn expire_user(&self, user_id: i64, entries: &[LedgerEntry]) -> PointsResult<(usize, i64)> {
        let now = Self::now();
        let mut uow = self.db.begin().await?;

        let mut balance = self.db.balances().get_locked(&mut uow, user_id).await?;

        let mut flipped = 0;
        let mut amount = 0;
        for entry in entries {
            if self.db.ledger().mark_expired(&mut uow, entry.id).await? {
                flipped += 1;
                amount += entry.amount;
            }
        }

        if amount > 0 {
            if !balance.expire(amount, now).is_applied() {
                warn!(
                    user_id,
                    amount,
                    available = balance.available_balance,
                    "Expired points exceed available balance, balance left unchanged"
                );
            }

            self.db
                .ledger()
                .append(
                    &mut uow,
                    NewLedgerEntry::expiry(user_id, amount, balance.available_balance, now),
                )
                .await?;
            self.db.balances().upsert(&mut uow, &balance).await?;
        }

        uow.commit().await?;

        debug!(user_id, flipped, amount, "User points expired");
        Ok((flipped, amount))
    }
}

/// Splits entries by user, keeping the order users first appear in.
fn group_by_user(entries: Vec<LedgerEntry>) -> Vec<(i64, Vec<LedgerEntry>)> {
    let mut groups: Vec<(i64, Vec<LedgerEntry>)> = Vec::new();
    let mut index: HashMap<i64, usize> = HashMap::new();
    for entry in entries {
        match index.entry(entry.user_id) {
            Entry::Occupied(slot) => groups[*slot.get()].1.push(entry),
            Entry::Vacant(slot) => {
                slot.insert(groups.len());
                groups.push((entry.user_id, vec![entry]));
            }
        }
    }
    groups
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::test_support::service;
    use crate::UsePoints;
    use chrono::{Duration, Months, TimeZone};
    use loyalty_core::{EntryType, ReasonType};

    fn past_expiry() -> DateTime<Utc> {
        Utc::now() + Months::new(13)
    }

    #[tokio::test]
    async fn test_sweep_expires_and_is_idempotent() {
        let service = service().await;
        service
            .earn_from_purchase(1, 20_000, 100, Deadline::none())
            .await
            .unwrap();
        service.earn_signup_bonus(1, Deadline::none()).await.unwrap();
        service.earn_signup_bonus(2, Deadline::none()).await.unwrap();

        let report = service
            .expire_points(past_expiry(), 100, Deadline::none())
            .await
            .unwrap();
        assert_eq!(
            report,
            SweepReport {
                users_processed: 2,
                users_skipped: 0,
                entries_expired: 3,
                points_expired: 7000,
            }
        );

        let latest = service.database().ledger().by_user(1, 1, 0).await.unwrap();
        assert_eq!(latest[0].entry_type, EntryType::Expire);
        assert_eq!(latest[0].reason_type, ReasonType::Admin);
        assert_eq!(latest[0].amount, 4000);
        assert_eq!(latest[0].balance_after, 0);
        assert_eq!(service.database().balances().get(1).await.unwrap().available_balance, 0);

        let again = service
            .expire_points(past_expiry(), 100, Deadline::none())
            .await
            .unwrap();
        assert_eq!(again, SweepReport::default());
    }

    #[tokio::test]
    async fn test_sweep_respects_cutoff_and_limit() {
        let service = service().await;
        service.earn_signup_bonus(1, Deadline::none()).await.unwrap();
        service.earn_signup_bonus(2, Deadline::none()).await.unwrap();

        // Nothing is due yet
        let report = service
            .expire_points(Utc::now() + Duration::days(30), 100, Deadline::none())
            .await
            .unwrap();
        assert_eq!(report.entries_expired, 0);

        let report = service
            .expire_points(past_expiry(), 1, Deadline::none())
            .await
            .unwrap();
        assert_eq!(report.users_processed, 1);
        assert_eq!(report.points_expired, 3000);

        let err = service
            .expire_points(past_expiry(), 0, Deadline::none())
            .await
            .unwrap_err();
        assert!(matches!(err, crate::PointsError::Validation(_)));
    }

    #[tokio::test]
    async fn test_spent_points_expiring_keep_balance_non_negative() {
        let service = service().await;
        // 200,000 earns 10,000
        service
            .earn_from_purchase(1, 200_000, 100, Deadline::none())
            .await
            .unwrap();
        service
            .use_points(
                UsePoints {
                    user_id: 1,
                    use_amount: 5000,
                    order_amount: 10_000,
                    order_id: 200,
                },
                Deadline::none(),
            )
            .await
            .unwrap();

        let report = service
            .expire_points(past_expiry(), 100, Deadline::none())
            .await
            .unwrap();
        assert_eq!(report.points_expired, 10_000);

        // The batch is flagged but only what is left can be taken
        let balance = service.database().balances().get(1).await.unwrap();
        assert_eq!(balance.available_balance, 5000);
        let latest = service.database().ledger().by_user(1, 1, 0).await.unwrap();
        assert_eq!(latest[0].balance_after, balance.available_balance);
    }

    #[test]
    fn test_group_by_user_keeps_first_seen_order() {
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let entry = |id, user_id| {
            NewLedgerEntry::earn(user_id, 100, 100, ReasonType::Signup, "Signup bonus", None, at, at)
                .with_id(id)
        };

        let groups = group_by_user(vec![entry(1, 7), entry(2, 3), entry(3, 7), entry(4, 5)]);
        let users: Vec<i64> = groups.iter().map(|(user_id, _)| *user_id).collect();
        assert_eq!(users, vec![7, 3, 5]);
        assert_eq!(groups[0].1.iter().map(|e| e.id).collect::<Vec<_>>(), vec![1, 3]);
    }
}
