//! # FIFO Coverage
//!
//! Spending is accounted against earned batches oldest-expiry first. The
//! walk here only checks that unexpired, confirmed batches can cover a
//! request; no per-batch remaining amount is tracked or debited.
//!
//! ```text
//!   request: 1,500
//!
//!   batch A (expires Mar)  700  ──► covers 700, 800 left
//!   batch B (expires Jun)  500  ──► covers 500, 300 left
//!   batch C (expires Sep) 1000  ──► covers 300, done
//! ```

use crate::types::LedgerEntry;

/// Result of walking earned batches against a requested amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FifoCoverage {
    /// Amount the batches covered, at most the request.
    pub covered: i64,
    /// Amount left uncovered after the walk.
    pub shortfall: i64,
    /// How many batches the walk touched.
    pub batches_used: usize,
}

impl FifoCoverage {
    /// Walks `batches` in the given order until `requested` is covered.
    ///
    /// Entries that are not spendable earns (expired, cancelled, or of
    /// another type) are ignored, so callers may pass a raw slice.
    pub fn walk(batches: &[LedgerEntry], requested: i64) -> Self {
        let mut remaining = requested.max(0);
        let mut batches_used = 0;

        for batch in batches.iter().filter(|e| e.is_spendable_earn()) {
            if remaining <= 0 {
                break;
            }
            let take = batch.amount.min(remaining);
            remaining -= take;
            batches_used += 1;
        }

        FifoCoverage {
            covered: requested.max(0) - remaining,
            shortfall: remaining,
            batches_used,
        }
    }

    /// True when the whole request is covered.
    pub fn is_covered(&self) -> bool {
        self.shortfall == 0
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{EntryStatus, NewLedgerEntry, ReasonType};
    use chrono::{Duration, TimeZone, Utc};

    fn batch(id: i64, amount: i64, months: i64) -> LedgerEntry {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        NewLedgerEntry::earn(
            1,
            amount,
            amount,
            ReasonType::Purchase,
            "Purchase earn",
            None,
            now,
            now + Duration::days(30 * months),
        )
        .with_id(id)
    }

    #[test]
    fn test_walk_covers_across_batches() {
        let batches = vec![batch(1, 700, 2), batch(2, 500, 5), batch(3, 1_000, 8)];
        let coverage = FifoCoverage::walk(&batches, 1_500);
        assert!(coverage.is_covered());
        assert_eq!(coverage.covered, 1_500);
        assert_eq!(coverage.batches_used, 3);
    }

    #[test]
    fn test_walk_stops_early() {
        let batches = vec![batch(1, 2_000, 2), batch(2, 500, 5)];
        let coverage = FifoCoverage::walk(&batches, 1_000);
        assert!(coverage.is_covered());
        assert_eq!(coverage.batches_used, 1);
    }

    #[test]
    fn test_walk_reports_shortfall() {
        let batches = vec![batch(1, 300, 2), batch(2, 200, 5)];
        let coverage = FifoCoverage::walk(&batches, 1_000);
        assert!(!coverage.is_covered());
        assert_eq!(coverage.covered, 500);
        assert_eq!(coverage.shortfall, 500);
    }

    #[test]
    fn test_walk_ignores_unspendable() {
        let mut expired = batch(1, 1_000, 1);
        expired.expired = true;
        let mut cancelled = batch(2, 1_000, 2);
        cancelled.status = EntryStatus::Cancelled;
        let live = batch(3, 400, 3);

        let coverage = FifoCoverage::walk(&[expired, cancelled, live], 1_000);
        assert_eq!(coverage.covered, 400);
        assert_eq!(coverage.shortfall, 600);
        assert_eq!(coverage.batches_used, 1);
    }

    #[test]
    fn test_walk_empty() {
        let coverage = FifoCoverage::walk(&[], 100);
        assert_eq!(coverage.shortfall, 100);
        assert_eq!(coverage.batches_used, 0);
    }
}
