//! Background delivery sweep

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use super::notification_scheduler::NotificationScheduler;

/// Run `sweep()` every `interval` until `cancel` fires
///
/// A failed sweep is logged and the loop keeps going; the next tick picks up
/// whatever was left behind.
pub fn spawn_sweep_loop(
    scheduler: Arc<NotificationScheduler>,
    interval: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(interval_secs = interval.as_secs(), "Notification sweep loop started");

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Notification sweep loop stopping");
                    break;
                }
                _ = ticker.tick() => {
                    match scheduler.sweep().await {
                        Ok(report) => debug!(?report, "Sweep finished"),
                        Err(e) => error!(error = %e, "Notification sweep failed"),
                    }
                }
            }
        }
    })
}
