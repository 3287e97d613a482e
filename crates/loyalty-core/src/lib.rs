//! # loyalty-core: Pure Business Logic for the Loyalty Ledger
//!
//! This crate is the **heart** of the loyalty ledger. It contains the point
//! policy, the balance aggregate and the ledger entry model as pure
//! functions with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Loyalty Ledger Architecture                        │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │              Transport (HTTP, out of this workspace)            │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                 loyalty-ledger (PointService)                   │   │
//! │  │      use_points, earn_*, refund_points, expire_points, query    │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ loyalty-core (THIS CRATE) ★                     │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │  policy   │  │  balance  │  │  ledger   │  │ validation│  │   │
//! │  │   │ earn/use  │  │ Point     │  │ entries   │  │  inputs   │  │   │
//! │  │   │ rules     │  │ Balance   │  │ FIFO walk │  │  paging   │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO CLOCK • PURE FUNCTIONS              │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                 loyalty-db (Database Layer)                     │   │
//! │  │        SQLite queries, migrations, unit of work, repositories   │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Ledger enums, entry records, basis-point rates
//! - [`policy`] - Earn/use/expiry rules
//! - [`balance`] - The per-user balance aggregate
//! - [`ledger`] - FIFO coverage over earned entries
//! - [`validation`] - Input validation and pagination
//! - [`error`] - Domain error types
//!
//! ## Design Principles
//!
//! 1. **Pure Functions**: same input = same output, `now` is always passed in
//! 2. **Integer Points**: points are whole `i64` values, rates are basis points
//! 3. **Explicit Errors**: every failure is a typed enum variant
//! 4. **Explicit Skips**: transitions that may be skipped say so in their result
//!
//! ## Example Usage
//!
//! ```rust
//! use loyalty_core::policy::PointPolicy;
//!
//! let policy = PointPolicy::default();
//!
//! // 5% of 20,000 = 1,000 points
//! assert_eq!(policy.calculate_earn_points(20_000), 1_000);
//!
//! // Using 4,500 points on a 5,000 order breaks the 50% cap
//! assert!(policy.validate_use(4_500, 5_000, 10_000).is_err());
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod balance;
pub mod error;
pub mod ledger;
pub mod policy;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use balance::{BalanceChange, PointBalance};
pub use error::{CoreError, CoreResult, PolicyViolation, ValidationError};
pub use ledger::FifoCoverage;
pub use policy::PointPolicy;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Default page size for transaction history.
pub const DEFAULT_PAGE_SIZE: i64 = 20;

/// Largest page of transaction history a caller may request.
pub const MAX_PAGE_SIZE: i64 = 100;

/// One hundred percent, in basis points.
pub const BPS_DENOMINATOR: i64 = 10_000;
