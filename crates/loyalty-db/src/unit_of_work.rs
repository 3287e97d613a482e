//! # Unit of Work
//!
//! One database transaction, passed explicitly to every mutating
//! repository call.
//!
//! ## Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Unit of Work Lifecycle                            │
//! │                                                                         │
//! │  let mut uow = db.begin().await?;       ── BEGIN                        │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  db.balances().get_locked(&mut uow, id) ── write lock taken here        │
//! │  db.ledger().append(&mut uow, entry)                                    │
//! │  db.balances().upsert(&mut uow, &bal)                                   │
//! │       │                                                                 │
//! │       ├── uow.commit().await?           ── COMMIT                       │
//! │       ├── uow.rollback().await?         ── ROLLBACK                     │
//! │       └── drop(uow) / `?` / timeout     ── ROLLBACK (implicit)          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A unit of work holds one pooled connection until it ends. Reads through
//! the pool while a unit of work is open need a second connection.

use sqlx::{Sqlite, SqliteConnection, SqlitePool, Transaction};
use tracing::debug;

use crate::error::DbResult;

/// An open database transaction.
#[derive(Debug)]
pub struct UnitOfWork {
    tx: Transaction<'static, Sqlite>,
}

impl UnitOfWork {
    pub(crate) async fn begin(pool: &SqlitePool) -> DbResult<Self> {
        let tx = pool.begin().await?;
        debug!("Unit of work started");
        Ok(UnitOfWork { tx })
    }

    /// The connection every statement of this unit of work runs on.
    pub fn conn(&mut self) -> &mut SqliteConnection {
        &mut *self.tx
    }

    /// Commits all writes made through this unit of work.
    pub async fn commit(self) -> DbResult<()> {
        self.tx.commit().await?;
        debug!("Unit of work committed");
        Ok(())
    }

    /// Discards all writes made through this unit of work.
    pub async fn rollback(self) -> DbResult<()> {
        self.tx.rollback().await?;
        debug!("Unit of work rolled back");
        Ok(())
    }
}
