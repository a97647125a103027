use anyhow::Result;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::time::{Duration, interval};
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info};

use crate::config::CleanupConfig;
use crate::db::Store;

/// Periodic sweep dropping expired OTP codes, refresh tokens, and stale
/// rate-limit windows. Expiry checks on the hot paths already ignore
/// stale rows; the sweep just keeps the tables from growing forever.
pub struct CleanupService {
    store: Store,
    config: CleanupConfig,
    running: Arc<RwLock<bool>>,
}

impl CleanupService {
    #[must_use]
    pub fn new(store: Store, config: CleanupConfig) -> Self {
        Self {
            store,
            config,
            running: Arc::new(RwLock::new(false)),
        }
    }

    pub async fn start(&self) -> Result<()> {
        if !self.config.enabled {
            info!("Cleanup sweeps are disabled in config");
            return Ok(());
        }

        *self.running.write().await = true;

        if let Some(cron_expr) = self.config.cron_expression.clone() {
            self.run_with_cron(&cron_expr).await
        } else {
            self.run_with_interval().await
        }
    }

    async fn run_with_cron(&self, cron_expr: &str) -> Result<()> {
        let mut sched = JobScheduler::new().await?;

        let store = self.store.clone();
        let running = Arc::clone(&self.running);

        let job = Job::new_async(cron_expr, move |_uuid, _lock| {
            let store = store.clone();
            let running = Arc::clone(&running);
            Box::pin(async move {
                if !*running.read().await {
                    return;
                }
                if let Err(e) = sweep(&store).await {
                    error!(event = "job_failed", job_name = "expiry_sweep", error = %e, "Expiry sweep failed");
                }
            })
        })?;

        sched.add(job).await?;
        sched.start().await?;

        info!("Cleanup sweeps running with cron: {}", cron_expr);

        loop {
            if !*self.running.read().await {
                break;
            }
            tokio::time::sleep(Duration::from_secs(1)).await;
        }

        sched.shutdown().await?;
        Ok(())
    }

    async fn run_with_interval(&self) -> Result<()> {
        let sweep_secs = self.config.sweep_interval_seconds.max(1);
        info!("Cleanup sweeps running every {}s", sweep_secs);

        let mut sweep_interval = interval(Duration::from_secs(sweep_secs));

        loop {
            sweep_interval.tick().await;

            if !*self.running.read().await {
                break;
            }

            if let Err(e) = self.run_once().await {
                error!(event = "job_failed", job_name = "expiry_sweep", error = %e, "Expiry sweep failed");
            }
        }

        Ok(())
    }

    pub async fn run_once(&self) -> Result<()> {
        sweep(&self.store).await
    }

    pub async fn stop(&self) {
        *self.running.write().await = false;
    }
}

async fn sweep(store: &Store) -> Result<()> {
    let otps = store.purge_expired_otps().await?;
    let tokens = store.purge_expired_refresh_tokens().await?;
    let windows = store.purge_expired_rate_windows().await?;

    if otps + tokens + windows > 0 {
        info!(
            event = "job_finished",
            job_name = "expiry_sweep",
            otps,
            tokens,
            windows,
            "Expiry sweep removed stale rows"
        );
    }

    Ok(())
}
