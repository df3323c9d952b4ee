//! Sync orchestration: fetch, map, upsert, track.
//!
//! Campaigns are synced before subscribers, sequentially, inside a single
//! tracked run. Campaign upserts are committed one row at a time; the
//! subscriber batch is committed as one transaction. A subscriber-phase
//! failure does not roll back campaigns already written.

use std::collections::HashSet;

use sendtrack_core::config::SyncConfig;
use sendtrack_core::db::unix_timestamp;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::mapper::{map_campaign, map_subscriber};
use crate::remote::{RemoteError, RemoteSource};
use crate::store::{DatabaseError, LocalStore};
use crate::tracker::{RunOutcome, RunTracker};

/// Errors surfaced by [`SyncService::run_sync`].
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("Remote connection error: {0}")]
    Connection(String),

    #[error("Remote query error: {0}")]
    Query(String),

    #[error("Local store error: {0}")]
    Persistence(#[from] DatabaseError),
}

impl From<RemoteError> for SyncError {
    fn from(e: RemoteError) -> Self {
        match e {
            RemoteError::Connection(msg) => Self::Connection(msg),
            RemoteError::Query(msg) => Self::Query(msg),
        }
    }
}

/// Result of a successful run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncOutcome {
    pub success: bool,
    pub records_processed: i64,
    pub run_id: String,
}

/// Per-run fetch bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncLimits {
    pub campaigns: u32,
    pub subscribers: u32,
}

impl Default for SyncLimits {
    fn default() -> Self {
        Self::from(&SyncConfig::default())
    }
}

impl From<&SyncConfig> for SyncLimits {
    fn from(config: &SyncConfig) -> Self {
        Self {
            campaigns: config.campaign_limit,
            subscribers: config.subscriber_limit,
        }
    }
}

pub struct SyncService<R> {
    remote: R,
    store: LocalStore,
    tracker: RunTracker,
    limits: SyncLimits,
}

impl<R: RemoteSource> SyncService<R> {
    pub fn new(remote: R, store: LocalStore, limits: SyncLimits) -> Self {
        let tracker = RunTracker::new(store.clone());
        Self {
            remote,
            store,
            tracker,
            limits,
        }
    }

    pub const fn remote(&self) -> &R {
        &self.remote
    }

    pub const fn store(&self) -> &LocalStore {
        &self.store
    }

    pub const fn tracker(&self) -> &RunTracker {
        &self.tracker
    }

    /// Run one full sync and record it.
    ///
    /// On failure the run is closed as failed with the error message before
    /// the error is returned; nothing is retried here. A run whose success
    /// could not be recorded is closed as failed too.
    pub async fn run_sync(&self) -> Result<SyncOutcome, SyncError> {
        let run_id = self.tracker.open().await?;

        let result = match self.sync_entities().await {
            Ok(records_processed) => self
                .tracker
                .close(&run_id, &RunOutcome::Success { records_processed })
                .await
                .map(|()| records_processed)
                .map_err(SyncError::from),
            Err(err) => Err(err),
        };

        match result {
            Ok(records_processed) => Ok(SyncOutcome {
                success: true,
                records_processed,
                run_id,
            }),
            Err(err) => {
                error!(run_id = %run_id, error = %err, "Sync failed");
                let outcome = RunOutcome::Failed {
                    error: err.to_string(),
                };
                if let Err(close_err) = self.tracker.close(&run_id, &outcome).await {
                    warn!(run_id = %run_id, error = %close_err, "Failed to record sync failure");
                }
                Err(err)
            }
        }
    }

    async fn sync_entities(&self) -> Result<i64, SyncError> {
        let campaigns = self.sync_campaigns().await?;
        let subscribers = self.sync_subscribers().await?;
        Ok(campaigns + subscribers)
    }

    /// Fetch, map and upsert campaigns in fetch order. Returns the number of
    /// campaigns written.
    pub async fn sync_campaigns(&self) -> Result<i64, SyncError> {
        let rows = self.remote.fetch_campaigns(self.limits.campaigns).await?;

        let mut synced = 0;
        for row in &rows {
            let Some(record) = map_campaign(row) else {
                warn!(title = ?row.title, "Skipping remote campaign without id");
                continue;
            };
            self.store.upsert_campaign(&record).await?;
            synced += 1;
        }

        info!(fetched = rows.len(), synced, "Campaigns synced");
        Ok(synced)
    }

    /// Fetch and map subscribers, then upsert them as one transaction.
    /// Returns the number of distinct subscribers written.
    ///
    /// The remote returns newest rows first, so when an email appears more
    /// than once the first occurrence wins and later ones are dropped.
    pub async fn sync_subscribers(&self) -> Result<i64, SyncError> {
        let rows = self.remote.fetch_subscribers(self.limits.subscribers).await?;
        let now = unix_timestamp();

        let mut seen = HashSet::with_capacity(rows.len());
        let mut records = Vec::with_capacity(rows.len());
        for row in &rows {
            let Some(record) = map_subscriber(row, now) else {
                warn!(id = ?row.id, "Skipping remote subscriber without email");
                continue;
            };
            if !seen.insert(record.email.clone()) {
                debug!(email = %record.email, "Skipping duplicate remote subscriber");
                continue;
            }
            records.push(record);
        }

        let written = self.store.upsert_subscribers(&records).await?;

        info!(fetched = rows.len(), synced = written, "Subscribers synced");
        Ok(i64::try_from(written).unwrap_or(i64::MAX))
    }
}
