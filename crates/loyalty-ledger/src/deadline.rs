//! # Deadlines
//!
//! Every public operation takes a [`Deadline`]. When it passes, the
//! in-flight future is dropped: an open unit of work is dropped with it
//! and rolls back, and the caller sees [`PointsError::DeadlineExceeded`].

use std::future::Future;
use std::time::Duration;

use tokio::time::{timeout_at, Instant};

use crate::error::{PointsError, PointsResult};

/// Point in time by which an operation must finish.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadline {
    at: Option<Instant>,
}

impl Deadline {
    /// A deadline `budget` from now.
    pub fn after(budget: Duration) -> Self {
        Deadline {
            at: Some(Instant::now() + budget),
        }
    }

    /// A deadline at a fixed instant.
    pub fn at(instant: Instant) -> Self {
        Deadline { at: Some(instant) }
    }

    /// No deadline; the operation runs to completion.
    pub fn none() -> Self {
        Deadline { at: None }
    }

    /// Time left, `None` when unbounded. Zero once passed.
    pub fn remaining(&self) -> Option<Duration> {
        self.at
            .map(|at| at.saturating_duration_since(Instant::now()))
    }

    pub fn is_expired(&self) -> bool {
        self.remaining() == Some(Duration::ZERO)
    }

    /// Runs `fut` under this deadline.
    pub async fn run<T, F>(self, fut: F) -> PointsResult<T>
    where
        F: Future<Output = PointsResult<T>>,
    {
        match self.at {
            None => fut.await,
            Some(at) => timeout_at(at, fut)
                .await
                .map_err(|_| PointsError::DeadlineExceeded)?,
        }
    }
}

impl Default for Deadline {
    fn default() -> Self {
        Deadline::none()
    }
}
