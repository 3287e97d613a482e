//! # Expiry Sweeper
//!
//! Drives [`PointService::expire_points`] on a fixed interval.
//!
//! ## Loop
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  ExpirySweeper::run                                                     │
//! │                                                                         │
//! │  loop {                                                                 │
//! │      select! {                                                          │
//! │          interval.tick()    ──► sweep(now, batch_size) under deadline   │
//! │          shutdown_rx.recv() ──► break                                   │
//! │      }                                                                  │
//! │  }                                                                      │
//! │                                                                         │
//! │  first tick fires immediately; a late tick is delayed, never doubled    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Each run gets a UUID run id in its tracing span.

use chrono::Utc;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{error, info, info_span, Instrument};
use uuid::Uuid;

use crate::config::SweepSettings;
use crate::deadline::Deadline;
use crate::error::PointsResult;
use crate::operations::SweepReport;
use crate::service::PointService;

#[derive(Debug, Error)]
pub enum SweeperError {
    #[error("Sweeper channel closed: {0}")]
    ChannelClosed(String),
}

/// Periodic expiry job.
pub struct ExpirySweeper {
    service: PointService,
    settings: SweepSettings,
    shutdown_rx: mpsc::Receiver<()>,
}

/// Handle for stopping a running sweeper.
#[derive(Clone)]
pub struct ExpirySweeperHandle {
    shutdown_tx: mpsc::Sender<()>,
}

impl ExpirySweeperHandle {
    /// Stops the loop after the sweep in progress, if any.
    pub async fn shutdown(&self) -> Result<(), SweeperError> {
        self.shutdown_tx
            .send(())
            .await
            .map_err(|_| SweeperError::ChannelClosed("Shutdown channel closed".into()))
    }
}

impl ExpirySweeper {
    /// Creates a sweeper and its handle.
    pub fn new(service: PointService, settings: SweepSettings) -> (Self, ExpirySweeperHandle) {
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);

        let sweeper = ExpirySweeper {
            service,
            settings,
            shutdown_rx,
        };

        (sweeper, ExpirySweeperHandle { shutdown_tx })
    }

    /// Runs the sweep loop until shut down.
    ///
    /// This should be spawned as a background task.
    pub async fn run(mut self) {
        info!(
            interval_secs = self.settings.interval_secs,
            batch_size = self.settings.batch_size,
            "Expiry sweeper starting"
        );

        let mut interval = tokio::time::interval(self.settings.interval());
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) = self.run_once().await {
                        error!(?e, "Expiry sweep failed");
                    }
                }

                _ = self.shutdown_rx.recv() => {
                    info!("Expiry sweeper shutting down");
                    break;
                }
            }
        }

        info!("Expiry sweeper stopped");
    }

    /// One sweep with cutoff = now.
    pub async fn run_once(&self) -> PointsResult<SweepReport> {
        let run_id = Uuid::new_v4();
        let span = info_span!("expiry_sweep", %run_id);

        let deadline = Deadline::after(self.settings.deadline());
        self.service
            .expire_points(Utc::now(), self.settings.batch_size, deadline)
            .instrument(span)
            .await
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::test_support::service;
    use chrono::Duration as ChronoDuration;
    use loyalty_core::{NewLedgerEntry, PointBalance, ReasonType};
    use std::time::Duration;

    /// A user holding one batch that expired yesterday.
    async fn seed_expired(service: &PointService, user_id: i64, amount: i64) {
        let db = service.database();
        let earned_at = Utc::now() - ChronoDuration::days(400);
        let expires_at = Utc::now() - ChronoDuration::days(1);

        let mut uow = db.begin().await.unwrap();
        let mut balance = PointBalance::new(user_id, earned_at);
        balance.earn(amount, earned_at);
        db.ledger()
            .append(
                &mut uow,
                NewLedgerEntry::earn(
                    user_id,
                    amount,
                    amount,
                    ReasonType::Signup,
                    "Signup bonus",
                    None,
                    earned_at,
                    expires_at,
                ),
            )
            .await
            .unwrap();
        db.balances().upsert(&mut uow, &balance).await.unwrap();
        uow.commit().await.unwrap();
    }

    #[tokio::test]
    async fn test_run_once_sweeps_due_batches() {
        let service = service().await;
        seed_expired(&service, 1, 3000).await;
        service.earn_signup_bonus(2, Deadline::none()).await.unwrap();

        let (sweeper, _handle) = ExpirySweeper::new(service.clone(), SweepSettings::default());
        let report = sweeper.run_once().await.unwrap();

        assert_eq!(report.users_processed, 1);
        assert_eq!(report.points_expired, 3000);
        assert_eq!(service.database().balances().get(1).await.unwrap().available_balance, 0);
        assert_eq!(service.database().balances().get(2).await.unwrap().available_balance, 3000);
    }

    #[tokio::test]
    async fn test_loop_sweeps_immediately_and_stops() {
        let service = service().await;
        seed_expired(&service, 1, 500).await;

        let settings = SweepSettings {
            interval_secs: 3600,
            ..SweepSettings::default()
        };
        let (sweeper, handle) = ExpirySweeper::new(service.clone(), settings);
        let task = tokio::spawn(sweeper.run());

        let mut swept = false;
        for _ in 0..200 {
            let balance = service.database().balances().get(1).await.unwrap();
            if balance.available_balance == 0 {
                swept = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(swept);

        handle.shutdown().await.unwrap();
        tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .unwrap()
            .unwrap();

        // The loop is gone, so the channel is closed
        assert!(handle.shutdown().await.is_err());
    }
}
