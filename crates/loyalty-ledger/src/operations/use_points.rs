//! # Use Points
//!
//! Spends points on an order.
//!
//! ## Flow
//! ```text
//! lock balance ──► policy.validate_use ──► FIFO walk ──► use_points ──► USE entry
//!   (NotFound)       (first violation)     (coverage)     (aggregate)    + upsert
//! ```
//!
//! The FIFO walk reads unexpired confirmed EARN batches, soonest expiry
//! first, and only confirms they cover the request. Batches are not
//! debited individually.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use loyalty_core::validation::validate_use_request;
use loyalty_core::{FifoCoverage, LedgerEntry, NewLedgerEntry, PolicyViolation};

use crate::deadline::Deadline;
use crate::error::PointsResult;
use crate::service::PointService;

/// A request to pay part of an order with points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsePoints {
    pub user_id: i64,
    pub use_amount: i64,
    /// Full order amount before points.
    pub order_amount: i64,
    pub order_id: i64,
}

impl PointService {
    /// Spends points on an order and returns the USE entry.
    ///
    /// ## Errors
    /// - `Validation` for non-positive ids or amounts
    /// - `NotFound` if the user has never earned
    /// - `Policy` for the first violated use rule, or `InsufficientPoints`
    ///   when earned batches cannot cover the request
    pub async fn use_points(&self, request: UsePoints, deadline: Deadline) -> PointsResult<LedgerEntry> {
        validate_use_request(
            request.user_id,
            request.use_amount,
            request.order_amount,
            request.order_id,
        )?;

        let entry = deadline.run(self.use_points_in_uow(request)).await?;
        self.invalidate_cached(request.user_id).await;

        info!(
            user_id = request.user_id,
            order_id = request.order_id,
            amount = request.use_amount,
            balance_after = entry.balance_after,
            "Points used"
        );
        Ok(entry)
    }

    async fn use_points_in_uow(&self, request: UsePoints) -> PointsResult<LedgerEntry> {
        let now = Self::now();
        let mut uow = self.db.begin().await?;

        let mut balance = self.db.balances().get_locked(&mut uow, request.user_id).await?;

        self.policy.validate_use(
            request.use_amount,
            request.order_amount,
            balance.available_balance,
        )?;

        let batches = self
            .db
            .ledger()
            .earned_oldest_expiry_first(&mut uow, request.user_id, self.settings.fifo_scan_limit)
            .await?;
        let coverage = FifoCoverage::walk(&batches, request.use_amount);
        debug!(
            user_id = request.user_id,
            covered = coverage.covered,
            batches = coverage.batches_used,
            "FIFO coverage"
        );

        if !coverage.is_covered() {
            return Err(PolicyViolation::InsufficientPoints {
                available: coverage.covered,
                requested: request.use_amount,
            }
            .into());
        }

        balance.use_points(request.use_amount, now)?;

        let entry = self
            .db
            .ledger()
            .append(
                &mut uow,
                NewLedgerEntry::spend(
                    request.user_id,
                    request.use_amount,
                    balance.available_balance,
                    request.order_id,
                    now,
                ),
            )
            .await?;

        self.db.balances().upsert(&mut uow, &balance).await?;
        uow.commit().await?;

        Ok(entry)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::UsePoints;
    use crate::service::test_support::service;
    use crate::{Deadline, PointService, PointsError, ServiceSettings};
    use chrono::Utc;
    use loyalty_core::{EntryType, PointBalance, PointPolicy, PolicyViolation, ReasonType};
    use loyalty_db::{Database, DbConfig};
    use std::time::Duration;

    fn request(use_amount: i64, order_amount: i64) -> UsePoints {
        UsePoints {
            user_id: 1,
            use_amount,
            order_amount,
            order_id: 100,
        }
    }

    async fn funded(payment: i64) -> PointService {
        let service = service().await;
        service
            .earn_from_purchase(1, payment, 10, Deadline::none())
            .await
            .unwrap();
        service
    }

    fn violation(err: PointsError) -> PolicyViolation {
        match err {
            PointsError::Policy(v) => v,
            other => panic!("expected policy violation, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_use_whole_balance() {
        // Purchase of 20,000 earns 1,000
        let service = funded(20_000).await;

        let entry = service
            .use_points(request(1000, 5000), Deadline::none())
            .await
            .unwrap();

        assert_eq!(entry.entry_type, EntryType::Use);
        assert_eq!(entry.reason_type, ReasonType::Purchase);
        assert_eq!(entry.order_id, Some(100));
        assert_eq!(entry.amount, 1000);
        assert_eq!(entry.balance_after, 0);

        let balance = service.database().balances().get(1).await.unwrap();
        assert_eq!(balance.available_balance, 0);
        assert_eq!(balance.total_used, 1000);

        let latest = service.database().ledger().by_user(1, 1, 0).await.unwrap();
        assert_eq!(latest[0].balance_after, balance.available_balance);
    }

    #[tokio::test]
    async fn test_rate_cap_rejects_and_writes_nothing() {
        // 200,000 earns 10,000
        let service = funded(200_000).await;

        let err = service
            .use_points(request(4500, 5000), Deadline::none())
            .await
            .unwrap_err();
        assert_eq!(
            violation(err),
            PolicyViolation::ExceedMaxUseRate {
                requested: 4500,
                maximum: 2500,
            }
        );

        let balance = service.database().balances().get(1).await.unwrap();
        assert_eq!(balance.available_balance, 10_000);
        assert_eq!(service.database().ledger().count_by_user(1).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_first_violation_wins() {
        let service = funded(200_000).await;

        // Below the minimum and not a multiple of the unit
        let err = service
            .use_points(request(550, 100_000), Deadline::none())
            .await
            .unwrap_err();
        assert!(matches!(violation(err), PolicyViolation::BelowMinUseAmount { .. }));

        let err = service
            .use_points(request(1050, 100_000), Deadline::none())
            .await
            .unwrap_err();
        assert!(matches!(violation(err), PolicyViolation::InvalidUseUnit { .. }));

        // Exactly at the rate cap, leaving exactly the minimum payment
        let entry = service
            .use_points(request(1000, 2000), Deadline::none())
            .await
            .unwrap();
        assert_eq!(entry.balance_after, 9000);
    }

    #[tokio::test]
    async fn test_unknown_user_is_not_found() {
        let service = service().await;

        let err = service
            .use_points(request(1000, 5000), Deadline::none())
            .await
            .unwrap_err();
        assert!(matches!(err, PointsError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_invalid_request_never_reaches_store() {
        let service = service().await;

        let err = service
            .use_points(request(0, 5000), Deadline::none())
            .await
            .unwrap_err();
        assert!(matches!(err, PointsError::Validation(_)));
    }

    #[tokio::test]
    async fn test_fifo_shortfall_overrides_balance_row() {
        let service = service().await;

        // A balance row with no earned batches behind it
        let db = service.database();
        let mut uow = db.begin().await.unwrap();
        let mut balance = PointBalance::new(1, Utc::now());
        balance.available_balance = 5000;
        db.balances().upsert(&mut uow, &balance).await.unwrap();
        uow.commit().await.unwrap();

        let err = service
            .use_points(request(1000, 10_000), Deadline::none())
            .await
            .unwrap_err();
        assert_eq!(
            violation(err),
            PolicyViolation::InsufficientPoints {
                available: 0,
                requested: 1000,
            }
        );
        assert_eq!(db.balances().get(1).await.unwrap().available_balance, 5000);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_concurrent_uses_race_for_last_points() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::new(
            DbConfig::new(dir.path().join("points.db"))
                .max_connections(4)
                .busy_timeout(Duration::from_secs(10)),
        )
        .await
        .unwrap();
        let policy = PointPolicy {
            min_use_amount: 500,
            ..PointPolicy::default()
        };
        let service = PointService::new(db, policy, None, ServiceSettings::default()).unwrap();

        // 10,000 earns the last 500 points
        service
            .earn_from_purchase(1, 10_000, 10, Deadline::none())
            .await
            .unwrap();

        let spend = |order_id| {
            let service = service.clone();
            tokio::spawn(async move {
                service
                    .use_points(
                        UsePoints {
                            user_id: 1,
                            use_amount: 500,
                            order_amount: 10_000,
                            order_id,
                        },
                        Deadline::after(Duration::from_secs(30)),
                    )
                    .await
            })
        };
        let (a, b) = tokio::join!(spend(201), spend(202));
        let results = [a.unwrap(), b.unwrap()];

        let committed = results.iter().filter(|r| r.is_ok()).count();
        assert_eq!(committed, 1);

        let failure = results.into_iter().find_map(|r| r.err()).unwrap();
        assert!(matches!(
            violation(failure),
            PolicyViolation::InsufficientPoints { available: 0, requested: 500 }
        ));

        let balance = service.database().balances().get(1).await.unwrap();
        assert_eq!(balance.available_balance, 0);
        assert_eq!(balance.total_used, 500);
        assert_eq!(service.database().ledger().count_by_user(1).await.unwrap(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_deadline_rolls_back_blocked_use() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::new(
            DbConfig::new(dir.path().join("points.db"))
                .max_connections(4)
                .busy_timeout(Duration::from_secs(10)),
        )
        .await
        .unwrap();
        let service = PointService::new(db.clone(), PointPolicy::default(), None, ServiceSettings::default()).unwrap();
        service
            .earn_from_purchase(1, 20_000, 10, Deadline::none())
            .await
            .unwrap();

        // Another writer holds the balance lock past the deadline
        let mut holder = db.begin().await.unwrap();
        db.balances().get_locked(&mut holder, 1).await.unwrap();

        let err = service
            .use_points(request(1000, 5000), Deadline::after(Duration::from_millis(200)))
            .await
            .unwrap_err();
        assert!(matches!(err, PointsError::DeadlineExceeded));

        holder.rollback().await.unwrap();

        let balance = db.balances().get(1).await.unwrap();
        assert_eq!(balance.available_balance, 1000);
        assert_eq!(balance.total_used, 0);
        assert_eq!(db.ledger().count_by_user(1).await.unwrap(), 1);

        // The abandoned unit of work released its connection
        let entry = service
            .use_points(request(1000, 5000), Deadline::after(Duration::from_secs(10)))
            .await
            .unwrap();
        assert_eq!(entry.balance_after, 0);
    }
}
