//! # Expiry Worker
//!
//! Runs the point expiry sweep on a fixed interval until SIGINT/SIGTERM.
//!
//! ## Startup
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  init_tracing (RUST_LOG, default info)                                  │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  PointsConfig::load ──► Database::new ──► optional Redis cache          │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  PointService ──► ExpirySweeper ──► spawn run()                         │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  shutdown_signal ──► handle.shutdown ──► close pool                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```text
//! expiry-worker [--config <path>] [--once]
//! ```
//! `--once` runs a single sweep and exits.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use loyalty_db::Database;
use loyalty_ledger::{BalanceCache, ExpirySweeper, PointService, PointsConfig, RedisBalanceCache};

#[derive(Debug, Default)]
struct Args {
    config: Option<PathBuf>,
    once: bool,
}

impl Args {
    fn parse(mut args: impl Iterator<Item = String>) -> anyhow::Result<Self> {
        let mut parsed = Args::default();
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--config" | "-c" => {
                    let path = args.next().context("--config needs a path")?;
                    parsed.config = Some(PathBuf::from(path));
                }
                "--once" => parsed.once = true,
                other => bail!("Unknown argument: {}", other),
            }
        }
        Ok(parsed)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let args = Args::parse(std::env::args().skip(1))?;

    let config = PointsConfig::load(args.config).context("Failed to load configuration")?;
    info!(
        path = %config.database.path.display(),
        interval_secs = config.sweep.interval_secs,
        batch_size = config.sweep.batch_size,
        "Configuration loaded"
    );

    let db = Database::new(config.db_config())
        .await
        .context("Failed to open database")?;

    let cache = connect_cache(&config).await;
    let service = PointService::new(db.clone(), config.policy.clone(), cache, config.service)?;
    let (sweeper, handle) = ExpirySweeper::new(service, config.sweep);

    if args.once {
        let report = sweeper.run_once().await?;
        info!(?report, "Single sweep complete");
        db.close().await;
        return Ok(());
    }

    let task = tokio::spawn(sweeper.run());

    shutdown_signal().await;

    if let Err(e) = handle.shutdown().await {
        warn!(?e, "Sweeper already stopped");
    }
    task.await.context("Sweeper task panicked")?;

    db.close().await;
    info!("Expiry worker stopped");
    Ok(())
}

/// Initializes the tracing subscriber.
///
/// `RUST_LOG` overrides the default `info,sqlx=warn`.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn"));

    tracing_subscriber::fmt().with_env_filter(filter).with_target(true).init();
}

/// Connects the shared Redis cache so swept balances are invalidated.
///
/// The worker keeps running without it; readers then see stale snapshots
/// for at most one TTL.
async fn connect_cache(config: &PointsConfig) -> Option<Arc<dyn BalanceCache>> {
    let url = config.cache.redis_url.as_deref()?;
    match RedisBalanceCache::connect(url, config.cache.ttl()).await {
        Ok(cache) => Some(Arc::new(cache)),
        Err(e) => {
            warn!(?e, "Failed to connect to Redis, continuing without it");
            None
        }
    }
}

/// Resolves on Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(?e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(?e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, stopping sweeper...");
}
