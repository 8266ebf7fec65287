use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Something holding entries that expire and must be purged periodically.
#[async_trait]
pub trait ExpirySweep: Send + Sync + 'static {
    /// Label used in logs.
    fn name(&self) -> &'static str;

    /// Remove expired entries, returning how many were dropped.
    async fn sweep_expired(&self) -> usize;
}

/// Owner of a running sweep task. Dropping it without calling
/// [`SweeperHandle::shutdown`] leaves the task running until the runtime stops.
pub struct SweeperHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl SweeperHandle {
    /// Signal the task to stop and wait for it to finish its current pass.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.task.await {
            tracing::error!(error = %e, "Expiry sweeper terminated abnormally");
        }
    }
}

/// Spawn a task that sweeps every target once per `period`.
pub fn start_sweeper(period: Duration, targets: Vec<Arc<dyn ExpirySweep>>) -> SweeperHandle {
    let period = if period.is_zero() {
        Duration::from_secs(1)
    } else {
        period
    };
    let (shutdown, mut stop) = watch::channel(false);

    let task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // First tick completes immediately
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    for target in &targets {
                        let removed = target.sweep_expired().await;
                        if removed > 0 {
                            tracing::debug!(target = target.name(), removed, "Swept expired entries");
                        }
                    }
                }
                changed = stop.changed() => {
                    if changed.is_err() || *stop.borrow() {
                        break;
                    }
                }
            }
        }

        tracing::info!("Expiry sweeper stopped");
    });

    tracing::info!(period_seconds = period.as_secs(), "Expiry sweeper started");
    SweeperHandle { shutdown, task }
}
