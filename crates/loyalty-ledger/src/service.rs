//! # Point Service
//!
//! Entry point for every point operation.
//!
//! ## Operation Shape
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  validate input                                                         │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  deadline.run(async {                                                   │
//! │      uow = db.begin()                                                   │
//! │      balance = balances().get_locked(uow, user_id)   ◄── write lock     │
//! │      policy / aggregate transitions                                     │
//! │      ledger().append(uow, ..)                                           │
//! │      balances().upsert(uow, balance)                                    │
//! │      uow.commit()                                    ──► lock released  │
//! │  })                                                                     │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  cache.invalidate(user_id)   (best effort)                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Any `?` inside the block drops the unit of work, which rolls it back.
//! The operations themselves live in [`crate::operations`].

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::warn;

use loyalty_core::{PointBalance, PointPolicy};
use loyalty_db::{Database, DbError, UnitOfWork};

use crate::cache::{BalanceCache, CachedBalance};
use crate::config::ServiceSettings;
use crate::error::PointsResult;

/// Runs the point operations against one database and policy.
///
/// Cheap to clone; clones share the pool, policy and cache.
#[derive(Clone)]
pub struct PointService {
    pub(crate) db: Database,
    pub(crate) policy: Arc<PointPolicy>,
    pub(crate) cache: Option<Arc<dyn BalanceCache>>,
    pub(crate) settings: ServiceSettings,
}

impl PointService {
    /// Creates the service. Fails if the policy cannot be evaluated.
    pub fn new(
        db: Database,
        policy: PointPolicy,
        cache: Option<Arc<dyn BalanceCache>>,
        settings: ServiceSettings,
    ) -> PointsResult<Self> {
        policy.validate()?;

        Ok(PointService {
            db,
            policy: Arc::new(policy),
            cache,
            settings,
        })
    }

    pub fn policy(&self) -> &PointPolicy {
        &self.policy
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub(crate) fn now() -> DateTime<Utc> {
        Utc::now()
    }

    /// Locks the user's balance, creating a zeroed one if none exists.
    pub(crate) async fn lock_or_create_balance(
        &self,
        uow: &mut UnitOfWork,
        user_id: i64,
        now: DateTime<Utc>,
    ) -> PointsResult<PointBalance> {
        match self.db.balances().get_locked(uow, user_id).await {
            Ok(balance) => Ok(balance),
            Err(DbError::NotFound { .. }) => Ok(PointBalance::new(user_id, now)),
            Err(e) => Err(e.into()),
        }
    }

    /// Drops the user's cached snapshot after a committed change.
    pub(crate) async fn invalidate_cached(&self, user_id: i64) {
        if let Some(cache) = &self.cache {
            if let Err(e) = cache.invalidate(user_id).await {
                warn!(user_id, error = %e, "Failed to invalidate balance cache");
            }
        }
    }

    pub(crate) async fn read_cached(&self, user_id: i64) -> Option<CachedBalance> {
        let cache = self.cache.as_ref()?;
        match cache.get(user_id).await {
            Ok(hit) => hit,
            Err(e) => {
                warn!(user_id, error = %e, "Balance cache read failed");
                None
            }
        }
    }

    pub(crate) async fn store_cached(&self, balance: &PointBalance) {
        if let Some(cache) = &self.cache {
            if let Err(e) = cache.set(balance.user_id, &CachedBalance::from(balance)).await {
                warn!(user_id = balance.user_id, error = %e, "Failed to populate balance cache");
            }
        }
    }
}

impl std::fmt::Debug for PointService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PointService")
            .field("policy", &self.policy)
            .field("cached", &self.cache.is_some())
            .field("settings", &self.settings)
            .finish()
    }
}

// =============================================================================
// Test Support
// =============================================================================


#[cfg(test)]
mod tests {
    use super::*;
    use loyalty_db::DbConfig;

    #[tokio::test]
    async fn test_rejects_unusable_policy() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let policy = PointPolicy {
            use_unit: 0,
            ..PointPolicy::default()
        };

        let err = PointService::new(db, policy, None, ServiceSettings::default()).unwrap_err();
        assert!(matches!(err, crate::PointsError::InvalidPolicy(_)));
    }
}
