//! Periodic background sync.

use std::sync::Arc;
use std::time::Duration;

use sendtrack_sync::{RemoteSource, SyncService};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// What a single scheduler tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickResult {
    Synced { records_processed: i64 },
    Failed,
    /// Another run held the lock.
    Skipped,
}

/// Run one sync unless another is in flight.
pub async fn tick<R: RemoteSource>(service: &SyncService<R>, lock: &Mutex<()>) -> TickResult {
    let Ok(_guard) = lock.try_lock() else {
        debug!("Sync already in flight, skipping scheduled tick");
        return TickResult::Skipped;
    };
    match service.run_sync().await {
        Ok(outcome) => {
            info!(
                run_id = %outcome.run_id,
                records_processed = outcome.records_processed,
                "Scheduled sync completed"
            );
            TickResult::Synced {
                records_processed: outcome.records_processed,
            }
        }
        Err(e) => {
            warn!(error = %e, "Scheduled sync failed");
            TickResult::Failed
        }
    }
}

/// Spawn a task that syncs every `period`, starting after the first period.
pub fn spawn<R: RemoteSource + 'static>(
    service: Arc<SyncService<R>>,
    lock: Arc<Mutex<()>>,
    period: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        interval.tick().await; // Skip first immediate tick
        loop {
            interval.tick().await;
            tick(&service, &lock).await;
        }
    })
}
