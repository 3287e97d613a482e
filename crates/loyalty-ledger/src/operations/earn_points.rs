//! # Earn Points
//!
//! Credits purchase, review and signup points as one confirmed EARN batch
//! that expires `expiry_months` after it was earned.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use loyalty_core::validation::{validate_order_id, validate_user_id};
use loyalty_core::{LedgerEntry, NewLedgerEntry, ReasonType};

use crate::deadline::Deadline;
use crate::error::PointsResult;
use crate::service::PointService;

/// What an earn call did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EarnOutcome {
    /// A batch was credited.
    Earned(LedgerEntry),
    /// The computed amount was zero or negative; nothing was written.
    NothingToEarn,
}

impl EarnOutcome {
    pub fn entry(&self) -> Option<&LedgerEntry> {
        match self {
            EarnOutcome::Earned(entry) => Some(entry),
            EarnOutcome::NothingToEarn => None,
        }
    }

    /// Points credited, 0 for a no-op.
    pub fn amount(&self) -> i64 {
        self.entry().map_or(0, |e| e.amount)
    }
}

/// One earn to apply.
struct Grant {
    user_id: i64,
    amount: i64,
    reason_type: ReasonType,
    reason_detail: &'static str,
    order_id: Option<i64>,
}

impl PointService {
    /// Credits points for a paid order.
    pub async fn earn_from_purchase(
        &self,
        user_id: i64,
        payment_amount: i64,
        order_id: i64,
        deadline: Deadline,
    ) -> PointsResult<EarnOutcome> {
        validate_user_id(user_id)?;
        validate_order_id(order_id)?;

        let grant = Grant {
            user_id,
            amount: self.policy.calculate_earn_points(payment_amount),
            reason_type: ReasonType::Purchase,
            reason_detail: "Purchase earn",
            order_id: Some(order_id),
        };
        self.earn(grant, deadline).await
    }

    /// Credits points for a text or photo review.
    pub async fn earn_from_review(
        &self,
        user_id: i64,
        is_photo: bool,
        deadline: Deadline,
    ) -> PointsResult<EarnOutcome> {
        validate_user_id(user_id)?;

        let grant = Grant {
            user_id,
            amount: self.policy.review_points(is_photo),
            reason_type: ReasonType::Review,
            reason_detail: if is_photo {
                "Photo review earn"
            } else {
                "Text review earn"
            },
            order_id: None,
        };
        self.earn(grant, deadline).await
    }

    /// Credits the signup bonus.
    pub async fn earn_signup_bonus(&self, user_id: i64, deadline: Deadline) -> PointsResult<EarnOutcome> {
        validate_user_id(user_id)?;

        let grant = Grant {
            user_id,
            amount: self.policy.signup_bonus,
            reason_type: ReasonType::Signup,
            reason_detail: "Signup bonus",
            order_id: None,
        };
        self.earn(grant, deadline).await
    }

    async fn earn(&self, grant: Grant, deadline: Deadline) -> PointsResult<EarnOutcome> {
        if grant.amount <= 0 {
            debug!(user_id = grant.user_id, amount = grant.amount, "Nothing to earn");
            return Ok(EarnOutcome::NothingToEarn);
        }

        let user_id = grant.user_id;
        let entry = deadline.run(self.earn_in_uow(grant)).await?;
        self.invalidate_cached(user_id).await;

        info!(
            user_id,
            amount = entry.amount,
            reason = entry.reason_type.as_str(),
            order_id = ?entry.order_id,
            balance_after = entry.balance_after,
            "Points earned"
        );
        Ok(EarnOutcome::Earned(entry))
    }

    async fn earn_in_uow(&self, grant: Grant) -> PointsResult<LedgerEntry> {
        let now = Self::now();
        let mut uow = self.db.begin().await?;

        let mut balance = self.lock_or_create_balance(&mut uow, grant.user_id, now).await?;
        balance.earn(grant.amount, now);

        let expires_at = self.policy.calculate_expiry_date(now);
        let entry = self
            .db
            .ledger()
            .append(
                &mut uow,
                NewLedgerEntry::earn(
                    grant.user_id,
                    grant.amount,
                    balance.available_balance,
                    grant.reason_type,
                    grant.reason_detail,
                    grant.order_id,
                    now,
                    expires_at,
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
    use crate::service::test_support::{service, service_with_policy};
    use crate::{Deadline, PointsError};
    use chrono::{Months, Utc};
    use loyalty_core::{EntryStatus, EntryType, PointPolicy, ReasonType};

    #[tokio::test]
    async fn test_purchase_earn_creates_balance_and_batch() {
        let service = service().await;
        let before = Utc::now();

        let outcome = service
            .earn_from_purchase(1, 20_000, 100, Deadline::none())
            .await
            .unwrap();
        let entry = outcome.entry().unwrap().clone();

        assert_eq!(outcome.amount(), 1000);
        assert_eq!(entry.entry_type, EntryType::Earn);
        assert_eq!(entry.reason_type, ReasonType::Purchase);
        assert_eq!(entry.reason_detail, "Purchase earn");
        assert_eq!(entry.order_id, Some(100));
        assert_eq!(entry.status, EntryStatus::Confirmed);
        assert_eq!(entry.balance_after, 1000);

        let earned_at = entry.earned_at.unwrap();
        assert!(earned_at >= before);
        assert_eq!(
            entry.expires_at,
            Some(earned_at.checked_add_months(Months::new(12)).unwrap())
        );

        let balance = service.database().balances().get(1).await.unwrap();
        assert_eq!(balance.available_balance, 1000);
        assert_eq!(balance.total_earned, 1000);
    }

    #[tokio::test]
    async fn test_earn_caps_and_accumulates() {
        let service = service().await;

        // 5% of 2,000,000 is 100,000; capped at 50,000
        let capped = service
            .earn_from_purchase(1, 2_000_000, 100, Deadline::none())
            .await
            .unwrap();
        assert_eq!(capped.amount(), 50_000);

        let review = service.earn_from_review(1, true, Deadline::none()).await.unwrap();
        assert_eq!(review.amount(), 500);
        assert_eq!(review.entry().unwrap().reason_detail, "Photo review earn");
        assert_eq!(review.entry().unwrap().balance_after, 50_500);

        let signup = service.earn_signup_bonus(1, Deadline::none()).await.unwrap();
        assert_eq!(signup.amount(), 3000);
        assert_eq!(signup.entry().unwrap().order_id, None);

        let balance = service.database().balances().get(1).await.unwrap();
        assert_eq!(balance.available_balance, 53_500);
        assert_eq!(signup.entry().unwrap().balance_after, balance.available_balance);
    }

    #[tokio::test]
    async fn test_zero_amount_is_noop() {
        let service = service().await;

        // 5% of 19 floors to 0
        let outcome = service
            .earn_from_purchase(1, 19, 100, Deadline::none())
            .await
            .unwrap();
        assert_eq!(outcome, crate::EarnOutcome::NothingToEarn);

        let service = service_with_policy(PointPolicy {
            review_text_points: 0,
            ..PointPolicy::default()
        })
        .await;
        let outcome = service.earn_from_review(1, false, Deadline::none()).await.unwrap();
        assert_eq!(outcome.amount(), 0);

        assert!(service.database().balances().get(1).await.unwrap_err().is_not_found());
        assert_eq!(service.database().ledger().count_by_user(1).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_earn_rejects_bad_ids() {
        let service = service().await;

        let err = service
            .earn_from_purchase(0, 20_000, 100, Deadline::none())
            .await
            .unwrap_err();
        assert!(matches!(err, PointsError::Validation(_)));

        let err = service
            .earn_from_purchase(1, 20_000, -5, Deadline::none())
            .await
            .unwrap_err();
        assert!(matches!(err, PointsError::Validation(_)));
    }
}
