//! # Ledger Repository
//!
//! Append-only storage for [`LedgerEntry`] rows.
//!
//! ## Query Map
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  method                       scope        order                        │
//! │  ───────────────────────────  ───────────  ─────────────────────────    │
//! │  append                       uow          -                            │
//! │  update_flags / mark_expired  uow          -                            │
//! │  earned_oldest_expiry_first   uow, user    expires_at, created_at ASC   │
//! │  by_order                     uow, order   created_at ASC               │
//! │  expiring_before              pool, all    expires_at ASC               │
//! │  by_user                      pool, user   created_at DESC              │
//! │  get_by_id / count_by_user    pool         -                            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//! Ties on timestamps are broken by id so ordering is stable.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::{DbError, DbResult};
use crate::unit_of_work::UnitOfWork;
use loyalty_core::{LedgerEntry, NewLedgerEntry};

/// Repository for point ledger entries.
#[derive(Debug, Clone)]
pub struct LedgerRepository {
    pool: SqlitePool,
}

impl LedgerRepository {
    /// Creates a new LedgerRepository.
    pub fn new(pool: SqlitePool) -> Self {
        LedgerRepository { pool }
    }

    /// Appends an entry and returns it with its assigned id.
    pub async fn append(&self, uow: &mut UnitOfWork, entry: NewLedgerEntry) -> DbResult<LedgerEntry> {
        debug!(
            user_id = entry.user_id,
            entry_type = entry.entry_type.as_str(),
            amount = entry.amount,
            "Appending ledger entry"
        );

        let result = sqlx::query(
            r#"
            INSERT INTO point_ledger (
                user_id, entry_type, amount, balance_after,
                reason_type, reason_detail, order_id,
                earned_at, expires_at, expired, status, created_at
            ) VALUES (
                ?1, ?2, ?3, ?4,
                ?5, ?6, ?7,
                ?8, ?9, ?10, ?11, ?12
            )
            "#,
        )
        .bind(entry.user_id)
        .bind(entry.entry_type)
        .bind(entry.amount)
        .bind(entry.balance_after)
        .bind(entry.reason_type)
        .bind(&entry.reason_detail)
        .bind(entry.order_id)
        .bind(entry.earned_at)
        .bind(entry.expires_at)
        .bind(entry.expired)
        .bind(entry.status)
        .bind(entry.created_at)
        .execute(uow.conn())
        .await?;

        Ok(entry.with_id(result.last_insert_rowid()))
    }

    /// Persists the mutable flags (`expired`, `status`) of an entry.
    pub async fn update_flags(&self, uow: &mut UnitOfWork, entry: &LedgerEntry) -> DbResult<()> {
        debug!(
            id = entry.id,
            expired = entry.expired,
            status = entry.status.as_str(),
            "Updating ledger entry flags"
        );

        let result = sqlx::query("UPDATE point_ledger SET expired = ?1, status = ?2 WHERE id = ?3")
            .bind(entry.expired)
            .bind(entry.status)
            .bind(entry.id)
            .execute(uow.conn())
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("LedgerEntry", entry.id));
        }
        Ok(())
    }

    /// Flips `expired` on a confirmed, not yet expired entry.
    ///
    /// ## Returns
    /// `true` if this call flipped it, `false` if it was already expired or
    /// no longer confirmed (for example a concurrent sweep got there first).
    pub async fn mark_expired(&self, uow: &mut UnitOfWork, id: i64) -> DbResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE point_ledger
            SET expired = 1
            WHERE id = ?1 AND expired = 0 AND status = 'CONFIRMED'
            "#,
        )
        .bind(id)
        .execute(uow.conn())
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Spendable earned batches of a user, soonest expiry first.
    pub async fn earned_oldest_expiry_first(
        &self,
        uow: &mut UnitOfWork,
        user_id: i64,
        limit: i64,
    ) -> DbResult<Vec<LedgerEntry>> {
        let entries = sqlx::query_as::<_, LedgerEntry>(
            r#"
            SELECT
                id, user_id, entry_type, amount, balance_after,
                reason_type, reason_detail, order_id,
                earned_at, expires_at, expired, status, created_at
            FROM point_ledger
            WHERE user_id = ?1
              AND entry_type = 'EARN'
              AND expired = 0
              AND status = 'CONFIRMED'
            ORDER BY expires_at IS NULL, expires_at ASC, created_at ASC, id ASC
            LIMIT ?2
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(uow.conn())
        .await?;

        Ok(entries)
    }

    /// All entries recorded for an order, oldest first.
    pub async fn by_order(&self, uow: &mut UnitOfWork, order_id: i64) -> DbResult<Vec<LedgerEntry>> {
        let entries = sqlx::query_as::<_, LedgerEntry>(
            r#"
            SELECT
                id, user_id, entry_type, amount, balance_after,
                reason_type, reason_detail, order_id,
                earned_at, expires_at, expired, status, created_at
            FROM point_ledger
            WHERE order_id = ?1
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(order_id)
        .fetch_all(uow.conn())
        .await?;

        Ok(entries)
    }

    /// Spendable earned batches of any user expiring at or before `cutoff`.
    pub async fn expiring_before(&self, cutoff: DateTime<Utc>, limit: i64) -> DbResult<Vec<LedgerEntry>> {
        let entries = sqlx::query_as::<_, LedgerEntry>(
            r#"
            SELECT
                id, user_id, entry_type, amount, balance_after,
                reason_type, reason_detail, order_id,
                earned_at, expires_at, expired, status, created_at
            FROM point_ledger
            WHERE entry_type = 'EARN'
              AND expired = 0
              AND status = 'CONFIRMED'
              AND expires_at IS NOT NULL
              AND expires_at <= ?1
            ORDER BY expires_at ASC, id ASC
            LIMIT ?2
            "#,
        )
        .bind(cutoff)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        debug!(count = entries.len(), %cutoff, "Fetched expiring entries");
        Ok(entries)
    }

    /// A page of a user's history, newest first.
    pub async fn by_user(&self, user_id: i64, limit: i64, offset: i64) -> DbResult<Vec<LedgerEntry>> {
        let entries = sqlx::query_as::<_, LedgerEntry>(
            r#"
            SELECT
                id, user_id, entry_type, amount, balance_after,
                reason_type, reason_detail, order_id,
                earned_at, expires_at, expired, status, created_at
            FROM point_ledger
            WHERE user_id = ?1
            ORDER BY created_at DESC, id DESC
            LIMIT ?2 OFFSET ?3
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }

    /// Gets an entry by id.
    pub async fn get_by_id(&self, id: i64) -> DbResult<LedgerEntry> {
        let entry = sqlx::query_as::<_, LedgerEntry>(
            r#"
            SELECT
                id, user_id, entry_type, amount, balance_after,
                reason_type, reason_detail, order_id,
                earned_at, expires_at, expired, status, created_at
            FROM point_ledger
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        entry.ok_or_else(|| DbError::not_found("LedgerEntry", id))
    }

    /// Number of entries a user has, for pagination totals.
    pub async fn count_by_user(&self, user_id: i64) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM point_ledger WHERE user_id = ?1")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use crate::{Database, DbConfig};
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use loyalty_core::{EntryStatus, EntryType, NewLedgerEntry, ReasonType};

    async fn test_db() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 10, 9, 0, 0).unwrap()
    }

    fn earn(user_id: i64, amount: i64, created: DateTime<Utc>, expires: DateTime<Utc>) -> NewLedgerEntry {
        NewLedgerEntry::earn(
            user_id,
            amount,
            amount,
            ReasonType::Purchase,
            "Purchase earn",
            Some(100 + user_id),
            created,
            expires,
        )
    }

    #[tokio::test]
    async fn test_append_assigns_id_and_round_trips() {
        let db = test_db().await;
        let mut uow = db.begin().await.unwrap();
        let first = db
            .ledger()
            .append(&mut uow, earn(1, 500, t0(), t0() + Duration::days(30)))
            .await
            .unwrap();
        let second = db
            .ledger()
            .append(&mut uow, NewLedgerEntry::spend(1, 100, 400, 77, t0()))
            .await
            .unwrap();
        uow.commit().await.unwrap();

        assert!(second.id > first.id);

        let loaded = db.ledger().get_by_id(first.id).await.unwrap();
        assert_eq!(loaded, first);
        assert_eq!(loaded.entry_type, EntryType::Earn);
        assert_eq!(loaded.order_id, Some(101));

        assert!(db.ledger().get_by_id(9_999).await.unwrap_err().is_not_found());
        assert_eq!(db.ledger().count_by_user(1).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_mark_expired_is_conditional() {
        let db = test_db().await;
        let mut uow = db.begin().await.unwrap();
        let entry = db
            .ledger()
            .append(&mut uow, earn(1, 500, t0(), t0() + Duration::days(1)))
            .await
            .unwrap();

        assert!(db.ledger().mark_expired(&mut uow, entry.id).await.unwrap());
        assert!(!db.ledger().mark_expired(&mut uow, entry.id).await.unwrap());
        uow.commit().await.unwrap();

        assert!(db.ledger().get_by_id(entry.id).await.unwrap().expired);
    }

    #[tokio::test]
    async fn test_update_flags_cancels() {
        let db = test_db().await;
        let mut uow = db.begin().await.unwrap();
        let mut entry = db
            .ledger()
            .append(&mut uow, earn(1, 500, t0(), t0() + Duration::days(1)))
            .await
            .unwrap();
        entry.status = EntryStatus::Cancelled;
        db.ledger().update_flags(&mut uow, &entry).await.unwrap();

        // Cancelled entries can no longer be expired
        assert!(!db.ledger().mark_expired(&mut uow, entry.id).await.unwrap());
        uow.commit().await.unwrap();

        let loaded = db.ledger().get_by_id(entry.id).await.unwrap();
        assert_eq!(loaded.status, EntryStatus::Cancelled);
        assert!(!loaded.expired);
    }

    #[tokio::test]
    async fn test_earned_ordering_and_filter() {
        let db = test_db().await;
        let mut uow = db.begin().await.unwrap();
        let late = db
            .ledger()
            .append(&mut uow, earn(1, 100, t0(), t0() + Duration::days(90)))
            .await
            .unwrap();
        let soon = db
            .ledger()
            .append(&mut uow, earn(1, 200, t0(), t0() + Duration::days(10)))
            .await
            .unwrap();
        let gone = db
            .ledger()
            .append(&mut uow, earn(1, 300, t0(), t0() + Duration::days(5)))
            .await
            .unwrap();
        db.ledger().mark_expired(&mut uow, gone.id).await.unwrap();
        db.ledger()
            .append(&mut uow, earn(2, 999, t0(), t0() + Duration::days(1)))
            .await
            .unwrap();

        let batches = db
            .ledger()
            .earned_oldest_expiry_first(&mut uow, 1, 100)
            .await
            .unwrap();
        let ids: Vec<i64> = batches.iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![soon.id, late.id]);

        let limited = db
            .ledger()
            .earned_oldest_expiry_first(&mut uow, 1, 1)
            .await
            .unwrap();
        assert_eq!(limited.len(), 1);
        uow.commit().await.unwrap();
    }

    #[tokio::test]
    async fn test_undated_batches_come_last() {
        let db = test_db().await;
        let mut uow = db.begin().await.unwrap();
        let restored = db
            .ledger()
            .append(&mut uow, NewLedgerEntry::refund_restore(1, 400, 400, 77, t0()))
            .await
            .unwrap();
        let dated = db
            .ledger()
            .append(&mut uow, earn(1, 100, t0(), t0() + Duration::days(30)))
            .await
            .unwrap();

        let batches = db
            .ledger()
            .earned_oldest_expiry_first(&mut uow, 1, 100)
            .await
            .unwrap();
        let ids: Vec<i64> = batches.iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![dated.id, restored.id]);

        // A short scan still reaches the soonest expiry
        let limited = db
            .ledger()
            .earned_oldest_expiry_first(&mut uow, 1, 1)
            .await
            .unwrap();
        assert_eq!(limited[0].id, dated.id);
        uow.commit().await.unwrap();
    }

    #[tokio::test]
    async fn test_expiring_before_spans_users() {
        let db = test_db().await;
        let mut uow = db.begin().await.unwrap();
        let a = db
            .ledger()
            .append(&mut uow, earn(1, 100, t0(), t0() + Duration::days(3)))
            .await
            .unwrap();
        let b = db
            .ledger()
            .append(&mut uow, earn(2, 100, t0(), t0() + Duration::days(1)))
            .await
            .unwrap();
        db.ledger()
            .append(&mut uow, earn(3, 100, t0(), t0() + Duration::days(60)))
            .await
            .unwrap();
        db.ledger()
            .append(&mut uow, NewLedgerEntry::spend(1, 100, 0, 5, t0()))
            .await
            .unwrap();
        uow.commit().await.unwrap();

        let cutoff = t0() + Duration::days(3);
        let due = db.ledger().expiring_before(cutoff, 10).await.unwrap();
        let ids: Vec<i64> = due.iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![b.id, a.id]);

        let first_only = db.ledger().expiring_before(cutoff, 1).await.unwrap();
        assert_eq!(first_only.len(), 1);
        assert_eq!(first_only[0].id, b.id);
    }

    #[tokio::test]
    async fn test_by_user_newest_first_with_paging() {
        let db = test_db().await;
        let mut uow = db.begin().await.unwrap();
        let mut ids = Vec::new();
        for i in 0..5 {
            let entry = db
                .ledger()
                .append(
                    &mut uow,
                    NewLedgerEntry::spend(1, 100, 1_000 - i * 100, 10 + i, t0() + Duration::minutes(i)),
                )
                .await
                .unwrap();
            ids.push(entry.id);
        }
        uow.commit().await.unwrap();

        let page = db.ledger().by_user(1, 2, 0).await.unwrap();
        assert_eq!(page.iter().map(|e| e.id).collect::<Vec<_>>(), vec![ids[4], ids[3]]);

        let page = db.ledger().by_user(1, 2, 4).await.unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].id, ids[0]);

        assert!(db.ledger().by_user(2, 20, 0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_by_order_oldest_first() {
        let db = test_db().await;
        let mut uow = db.begin().await.unwrap();
        let spend = db
            .ledger()
            .append(&mut uow, NewLedgerEntry::spend(1, 1_000, 0, 55, t0()))
            .await
            .unwrap();
        let restore = db
            .ledger()
            .append(
                &mut uow,
                NewLedgerEntry::refund_restore(1, 1_000, 1_000, 55, t0() + Duration::hours(1)),
            )
            .await
            .unwrap();
        db.ledger()
            .append(&mut uow, NewLedgerEntry::spend(1, 500, 500, 56, t0()))
            .await
            .unwrap();

        let entries = db.ledger().by_order(&mut uow, 55).await.unwrap();
        assert_eq!(entries.iter().map(|e| e.id).collect::<Vec<_>>(), vec![spend.id, restore.id]);
        uow.commit().await.unwrap();
    }
}
