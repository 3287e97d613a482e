//! # Balance Repository
//!
//! Loads and saves the per-user [`PointBalance`] row.
//!
//! ## Locking
//! ```text
//! get_locked(uow, user_id)
//!      │
//!      ├── UPDATE point_balances SET user_id = user_id WHERE user_id = ?
//!      │       takes SQLite's write lock for the rest of the unit of work;
//!      │       a second writer waits here (busy timeout)
//!      │
//!      └── SELECT ... WHERE user_id = ?
//!              sees the state the previous writer committed
//! ```
//! The lock has to be the first statement of the unit of work: a
//! transaction that reads before it writes cannot be upgraded once another
//! writer has committed.

use sqlx::SqlitePool;
use tracing::debug;

use crate::error::{DbError, DbResult};
use crate::unit_of_work::UnitOfWork;
use loyalty_core::PointBalance;

/// Repository for point balance rows.
#[derive(Debug, Clone)]
pub struct BalanceRepository {
    pool: SqlitePool,
}

impl BalanceRepository {
    /// Creates a new BalanceRepository.
    pub fn new(pool: SqlitePool) -> Self {
        BalanceRepository { pool }
    }

    /// Loads a balance and holds the write lock until the unit of work ends.
    ///
    /// ## Returns
    /// * `Ok(PointBalance)` - current committed state
    /// * `Err(DbError::NotFound)` - the user has no balance row
    ///   (the lock is still held, so a following insert is serialised too)
    pub async fn get_locked(&self, uow: &mut UnitOfWork, user_id: i64) -> DbResult<PointBalance> {
        debug!(user_id, "Locking point balance");

        sqlx::query("UPDATE point_balances SET user_id = user_id WHERE user_id = ?1")
            .bind(user_id)
            .execute(uow.conn())
            .await?;

        let balance = sqlx::query_as::<_, PointBalance>(
            r#"
            SELECT
                user_id,
                available_balance,
                pending_balance,
                total_earned,
                total_used,
                updated_at
            FROM point_balances
            WHERE user_id = ?1
            "#,
        )
        .bind(user_id)
        .fetch_optional(uow.conn())
        .await?;

        balance.ok_or_else(|| DbError::not_found("PointBalance", user_id))
    }

    /// Inserts or replaces a balance row.
    pub async fn upsert(&self, uow: &mut UnitOfWork, balance: &PointBalance) -> DbResult<()> {
        debug!(
            user_id = balance.user_id,
            available = balance.available_balance,
            "Saving point balance"
        );

        sqlx::query(
            r#"
            INSERT INTO point_balances (
                user_id, available_balance, pending_balance,
                total_earned, total_used, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT(user_id) DO UPDATE SET
                available_balance = excluded.available_balance,
                pending_balance = excluded.pending_balance,
                total_earned = excluded.total_earned,
                total_used = excluded.total_used,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(balance.user_id)
        .bind(balance.available_balance)
        .bind(balance.pending_balance)
        .bind(balance.total_earned)
        .bind(balance.total_used)
        .bind(balance.updated_at)
        .execute(uow.conn())
        .await?;

        Ok(())
    }

    /// Reads a balance without taking any lock.
    pub async fn get(&self, user_id: i64) -> DbResult<PointBalance> {
        let balance = sqlx::query_as::<_, PointBalance>(
            r#"
            SELECT
                user_id,
                available_balance,
                pending_balance,
                total_earned,
                total_used,
                updated_at
            FROM point_balances
            WHERE user_id = ?1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        balance.ok_or_else(|| DbError::not_found("PointBalance", user_id))
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
