//! # Balance Cache
//!
//! Short-lived balance snapshots for the read path.
//!
//! ## Read-Through Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  get_balance(user_id)                                                   │
//! │       │                                                                 │
//! │       ├── cache.get ── hit ──► snapshot (no updated_at)                 │
//! │       │                                                                 │
//! │       └── miss / error ──► balances().get(user_id) ──► cache.set        │
//! │                                                                         │
//! │  use / earn / refund / expire ── commit ──► cache.invalidate            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The store stays authoritative. Cache failures are logged by the caller
//! and never fail an operation.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use redis::{aio::ConnectionManager, AsyncCommands, Client};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{debug, info};

use loyalty_core::PointBalance;

/// Default freshness window.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(300);

/// Cache key of a user's balance snapshot.
pub fn cache_key(user_id: i64) -> String {
    format!("point:balance:{}", user_id)
}

// =============================================================================
// Errors
// =============================================================================

/// Cache backend failure.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Cache backend error: {0}")]
    Backend(String),

    #[error("Cache payload error: {0}")]
    Payload(String),
}

impl From<redis::RedisError> for CacheError {
    fn from(err: redis::RedisError) -> Self {
        CacheError::Backend(err.to_string())
    }
}

impl From<serde_json::Error> for CacheError {
    fn from(err: serde_json::Error) -> Self {
        CacheError::Payload(err.to_string())
    }
}

pub type CacheResult<T> = Result<T, CacheError>;

// =============================================================================
// Payload
// =============================================================================

/// The cached projection of a balance.
///
/// `updated_at` is not part of the payload, so a hit cannot report it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedBalance {
    pub available_balance: i64,
    pub pending_balance: i64,
    pub total_earned: i64,
    pub total_used: i64,
}

impl From<&PointBalance> for CachedBalance {
    fn from(balance: &PointBalance) -> Self {
        CachedBalance {
            available_balance: balance.available_balance,
            pending_balance: balance.pending_balance,
            total_earned: balance.total_earned,
            total_used: balance.total_used,
        }
    }
}

// =============================================================================
// Trait
// =============================================================================

/// Storage for balance snapshots keyed by user.
#[async_trait]
pub trait BalanceCache: Send + Sync {
    /// A fresh snapshot, or `None` on miss or after the TTL.
    async fn get(&self, user_id: i64) -> CacheResult<Option<CachedBalance>>;

    /// Stores a snapshot for the configured TTL.
    async fn set(&self, user_id: i64, balance: &CachedBalance) -> CacheResult<()>;

    /// Drops a user's snapshot.
    async fn invalidate(&self, user_id: i64) -> CacheResult<()>;
}

// =============================================================================
// In-Memory Implementation
// =============================================================================

/// Process-local cache, used in tests and single-node deployments.
pub struct MemoryBalanceCache {
    entries: RwLock<HashMap<i64, (CachedBalance, Instant)>>,
    ttl: Duration,
}

impl MemoryBalanceCache {
    pub fn new(ttl: Duration) -> Self {
        MemoryBalanceCache {
            entries: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    /// Number of stored snapshots, fresh or not.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

impl Default for MemoryBalanceCache {
    fn default() -> Self {
        MemoryBalanceCache::new(DEFAULT_CACHE_TTL)
    }
}

#[async_trait]
impl BalanceCache for MemoryBalanceCache {
    async fn get(&self, user_id: i64) -> CacheResult<Option<CachedBalance>> {
        let entries = self.entries.read().await;
        Ok(entries
            .get(&user_id)
            .filter(|(_, stored_at)| stored_at.elapsed() < self.ttl)
            .map(|(balance, _)| *balance))
    }

    async fn set(&self, user_id: i64, balance: &CachedBalance) -> CacheResult<()> {
        let mut entries = self.entries.write().await;
        entries.insert(user_id, (*balance, Instant::now()));
        Ok(())
    }

    async fn invalidate(&self, user_id: i64) -> CacheResult<()> {
        self.entries.write().await.remove(&user_id);
        Ok(())
    }
}

// =============================================================================
// Redis Implementation
// =============================================================================

/// Redis-backed cache shared by every service instance.
///
/// Snapshots are JSON strings under [`cache_key`], expired by Redis itself.
pub struct RedisBalanceCache {
    conn: ConnectionManager,
    ttl: Duration,
}

impl RedisBalanceCache {
    /// Connects to Redis.
    ///
    /// # Arguments
    /// * `url` - Redis connection URL (e.g., redis://localhost:6379)
    /// * `ttl` - Freshness window, rounded down to whole seconds (min 1)
    pub async fn connect(url: &str, ttl: Duration) -> CacheResult<Self> {
        let client = Client::open(url)?;
        let conn = ConnectionManager::new(client).await?;

        info!(url = %url, "Connected to Redis for balance cache");

        Ok(Self { conn, ttl })
    }

    fn ttl_secs(&self) -> u64 {
        self.ttl.as_secs().max(1)
    }
}

#[async_trait]
impl BalanceCache for RedisBalanceCache {
    async fn get(&self, user_id: i64) -> CacheResult<Option<CachedBalance>> {
        let mut conn = self.conn.clone();

        let raw: Option<String> = conn.get(cache_key(user_id)).await?;

        match raw {
            Some(json) => {
                let balance = serde_json::from_str(&json)?;
                debug!(user_id, "Balance cache hit");
                Ok(Some(balance))
            }
            None => Ok(None),
        }
    }

    async fn set(&self, user_id: i64, balance: &CachedBalance) -> CacheResult<()> {
        let mut conn = self.conn.clone();

        let json = serde_json::to_string(balance)?;
        let _: () = conn.set_ex(cache_key(user_id), json, self.ttl_secs()).await?;

        debug!(user_id, "Stored balance snapshot in Redis");
        Ok(())
    }

    async fn invalidate(&self, user_id: i64) -> CacheResult<()> {
        let mut conn = self.conn.clone();

        let _: () = conn.del(cache_key(user_id)).await?;

        debug!(user_id, "Invalidated balance snapshot in Redis");
        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(available: i64) -> CachedBalance {
        CachedBalance {
            available_balance: available,
            pending_balance: 0,
            total_earned: available,
            total_used: 0,
        }
    }

    #[test]
    fn test_cache_key_format() {
        assert_eq!(cache_key(42), "point:balance:42");
    }

    #[test]
    fn test_payload_field_names() {
        let json = serde_json::to_string(&snapshot(1000)).unwrap();
        assert_eq!(
            json,
            r#"{"available_balance":1000,"pending_balance":0,"total_earned":1000,"total_used":0}"#
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_memory_cache_respects_ttl() {
        let cache = MemoryBalanceCache::new(Duration::from_secs(300));
        cache.set(1, &snapshot(1000)).await.unwrap();
        assert_eq!(cache.get(1).await.unwrap(), Some(snapshot(1000)));

        tokio::time::advance(Duration::from_secs(301)).await;
        assert_eq!(cache.get(1).await.unwrap(), None);
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test]
    async fn test_memory_cache_invalidate() {
        let cache = MemoryBalanceCache::default();
        cache.set(1, &snapshot(1000)).await.unwrap();
        cache.set(2, &snapshot(500)).await.unwrap();

        cache.invalidate(1).await.unwrap();
        assert_eq!(cache.get(1).await.unwrap(), None);
        assert_eq!(cache.get(2).await.unwrap(), Some(snapshot(500)));

        // Invalidating a missing key is fine
        cache.invalidate(99).await.unwrap();
    }
}
