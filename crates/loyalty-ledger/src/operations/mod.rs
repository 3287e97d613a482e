//! # Point Operations
//!
//! One module per operation, each adding methods to
//! [`PointService`](crate::PointService).
//!
//! | module | methods | lock |
//! |--------|---------|------|
//! | [`use_points`] | `use_points` | balance row |
//! | [`earn_points`] | `earn_from_purchase`, `earn_from_review`, `earn_signup_bonus` | balance row |
//! | [`refund_points`] | `refund_points` | balance row |
//! | [`expire_points`] | `expire_points` | one balance row at a time |
//! | [`query_points`] | `get_balance`, `get_transactions` | none |

pub mod earn_points;
pub mod expire_points;
pub mod query_points;
pub mod refund_points;
pub mod use_points;

pub use earn_points::EarnOutcome;
pub use expire_points::SweepReport;
pub use query_points::{BalanceSnapshot, TransactionPage};
pub use refund_points::RefundOutcome;
pub use use_points::UsePoints;
