//! # Repository Module
//!
//! Database repository implementations for the loyalty ledger.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Repository Pattern                                   │
//! │                                                                         │
//! │  PointService operation                                                │
//! │       │                                                                 │
//! │       │  db.balances().get_locked(&mut uow, user_id)                   │
//! │       ▼                                                                 │
//! │  BalanceRepository / LedgerRepository                                  │
//! │  ├── writes and locked reads take &mut UnitOfWork                      │
//! │  └── plain reads go through the pool                                   │
//! │       │                                                                 │
//! │       │  SQL Query                                                      │
//! │       ▼                                                                 │
//! │  SQLite Database                                                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`BalanceRepository`](balance::BalanceRepository) - Per-user balance rows
//! - [`LedgerRepository`](ledger::LedgerRepository) - Ledger entries

pub mod balance;
pub mod ledger;
