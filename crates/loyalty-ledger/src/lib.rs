//! # loyalty-ledger: Point Operations for the Loyalty Ledger
//!
//! This crate runs use, earn, refund, expire and query on top of
//! `loyalty-db`, each balance change inside one unit of work.
//!
//! ## Architecture Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Point Service Architecture                       │
//! │                                                                         │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │                      PointService                                │  │
//! │  │                                                                  │  │
//! │  │  Database + PointPolicy + optional BalanceCache                  │  │
//! │  └────────────────────────────┬─────────────────────────────────────┘  │
//! │                               │                                         │
//! │         ┌─────────────────────┼─────────────────────┐                  │
//! │         ▼                     ▼                     ▼                   │
//! │  ┌────────────────┐  ┌────────────────┐  ┌────────────────────────┐    │
//! │  │ use / earn /   │  │ expire_points  │  │ get_balance /          │    │
//! │  │ refund         │  │                │  │ get_transactions       │    │
//! │  │                │  │ per-user unit  │  │                        │    │
//! │  │ lock balance,  │  │ of work, skips │  │ no lock, cache in      │    │
//! │  │ append, commit │  │ failing users  │  │ front of balances      │    │
//! │  └────────────────┘  └───────▲────────┘  └────────────────────────┘    │
//! │                              │                                          │
//! │                     ┌────────┴───────┐                                  │
//! │                     │ ExpirySweeper  │  interval + shutdown handle      │
//! │                     └────────────────┘                                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//! - [`service`] - `PointService` construction and shared helpers
//! - [`operations`] - The five operations
//! - [`cache`] - Balance snapshot cache (in-memory and Redis)
//! - [`config`] - TOML + environment configuration
//! - [`deadline`] - Per-call deadlines
//! - [`sweeper`] - Periodic expiry job
//! - [`error`] - Service error types
//!
//! ## Usage
//!
//! ```rust,ignore
//! use loyalty_ledger::{Deadline, PointService, PointsConfig, UsePoints};
//!
//! let config = PointsConfig::load(None)?;
//! let db = loyalty_db::Database::new(config.db_config()).await?;
//! let service = PointService::new(db, config.policy.clone(), None, config.service)?;
//!
//! service.earn_from_purchase(7, 20_000, 100, Deadline::after(Duration::from_secs(2))).await?;
//! ```

pub mod cache;
pub mod config;
pub mod deadline;
pub mod error;
pub mod operations;
pub mod service;
pub mod sweeper;

pub use cache::{BalanceCache, CacheError, CachedBalance, MemoryBalanceCache, RedisBalanceCache};
pub use config::{ConfigError, PointsConfig, ServiceSettings, SweepSettings};
pub use deadline::Deadline;
pub use error::{ErrorCode, ErrorResponse, PointsError, PointsResult};
pub use operations::{BalanceSnapshot, EarnOutcome, RefundOutcome, SweepReport, TransactionPage, UsePoints};
pub use service::PointService;
pub use sweeper::{ExpirySweeper, ExpirySweeperHandle, SweeperError};
