//! # Query Points
//!
//! Lock-free reads. Balances go through the cache; history never does.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use loyalty_core::validation::{total_pages, validate_user_id, Pagination};
use loyalty_core::{LedgerEntry, PointBalance};

use crate::cache::CachedBalance;
use crate::deadline::Deadline;
use crate::error::{PointsError, PointsResult};
use crate::service::PointService;

/// A user's balance as seen by the read path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceSnapshot {
    pub user_id: i64,
    pub available_balance: i64,
    pub pending_balance: i64,
    pub total_earned: i64,
    pub total_used: i64,
    /// `None` when served from the cache.
    pub updated_at: Option<DateTime<Utc>>,
}

impl BalanceSnapshot {
    fn from_cache(user_id: i64, cached: CachedBalance) -> Self {
        BalanceSnapshot {
            user_id,
            available_balance: cached.available_balance,
            pending_balance: cached.pending_balance,
            total_earned: cached.total_earned,
            total_used: cached.total_used,
            updated_at: None,
        }
    }
}

impl From<&PointBalance> for BalanceSnapshot {
    fn from(balance: &PointBalance) -> Self {
        BalanceSnapshot {
            user_id: balance.user_id,
            available_balance: balance.available_balance,
            pending_balance: balance.pending_balance,
            total_earned: balance.total_earned,
            total_used: balance.total_used,
            updated_at: Some(balance.updated_at),
        }
    }
}

/// One page of a user's history, newest first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionPage {
    pub entries: Vec<LedgerEntry>,
    /// All entries the user has.
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
    pub total_pages: i64,
}

impl TransactionPage {
    pub fn has_more(&self) -> bool {
        self.offset + (self.entries.len() as i64) < self.total
    }
}

impl PointService {
    /// Current balance, possibly up to one cache TTL stale.
    pub async fn get_balance(&self, user_id: i64, deadline: Deadline) -> PointsResult<BalanceSnapshot> {
        validate_user_id(user_id)?;

        if let Some(cached) = self.read_cached(user_id).await {
            return Ok(BalanceSnapshot::from_cache(user_id, cached));
        }

        let balance = deadline
            .run(async { self.db.balances().get(user_id).await.map_err(PointsError::from) })
            .await?;
        self.store_cached(&balance).await;

        Ok(BalanceSnapshot::from(&balance))
    }

    /// A page of history. `limit` is clamped to 1..=100 (default 20).
    pub async fn get_transactions(
        &self,
        user_id: i64,
        limit: i64,
        offset: i64,
        deadline: Deadline,
    ) -> PointsResult<TransactionPage> {
        validate_user_id(user_id)?;
        let window = Pagination::new(limit, offset);

        deadline.run(self.transactions_page(user_id, window)).await
    }

    async fn transactions_page(&self, user_id: i64, window: Pagination) -> PointsResult<TransactionPage> {
        let ledger = self.db.ledger();
        let entries = ledger.by_user(user_id, window.limit, window.offset).await?;
        let total = ledger.count_by_user(user_id).await?;

        Ok(TransactionPage {
            entries,
            total,
            limit: window.limit,
            offset: window.offset,
            total_pages: total_pages(total, window.limit),
        })
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
