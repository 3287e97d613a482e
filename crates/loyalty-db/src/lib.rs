//! # loyalty-db: Database Layer for the Loyalty Ledger
//!
//! This crate provides database access for the loyalty ledger.
//! It uses SQLite for storage with sqlx for async operations.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Loyalty Ledger Data Flow                           │
//! │                                                                         │
//! │  PointService::use_points                                              │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     loyalty-db (THIS CRATE)                     │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │   Database    │    │  Repositories │    │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │    │               │    │  (embedded)  │  │   │
//! │  │   │               │    │ BalanceRepo   │    │ 001_loyalty_ │  │   │
//! │  │   │ SqlitePool    │◄───│ LedgerRepo    │    │   schema.sql │  │   │
//! │  │   │ UnitOfWork    │    │               │    │              │  │   │
//! │  │   └───────────────┘    └───────────────┘    └──────────────┘  │   │
//! │  │                                                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite Database (WAL)                                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`unit_of_work`] - Explicit transaction handle
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - Balance and ledger repositories
//!
//! ## Usage
//!
//! ```rust,ignore
//! use loyalty_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("points.db")).await?;
//!
//! let mut uow = db.begin().await?;
//! let mut balance = db.balances().get_locked(&mut uow, user_id).await?;
//! balance.use_points(1_000, Utc::now())?;
//! db.balances().upsert(&mut uow, &balance).await?;
//! uow.commit().await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;
pub mod unit_of_work;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};
pub use unit_of_work::UnitOfWork;

// Repository re-exports for convenience
pub use repository::balance::BalanceRepository;
pub use repository::ledger::LedgerRepository;
