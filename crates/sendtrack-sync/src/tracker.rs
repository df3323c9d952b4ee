//! Sync run tracking.
//!
//! Every sync invocation opens exactly one run and closes it exactly once.
//! Closing a run that is unknown or already terminal is rejected by the
//! store and leaves the row untouched.

use tracing::info;
use uuid::Uuid;

use crate::models::SyncRun;
use crate::store::{DatabaseError, LocalStore};

/// Terminal outcome of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Success { records_processed: i64 },
    Failed { error: String },
}

#[derive(Clone)]
pub struct RunTracker {
    store: LocalStore,
}

impl RunTracker {
    pub const fn new(store: LocalStore) -> Self {
        Self { store }
    }

    /// Create a `running` run and return its id.
    pub async fn open(&self) -> Result<String, DatabaseError> {
        let id = Uuid::new_v4().to_string();
        self.store.create_run(&id).await?;
        info!(run_id = %id, "Sync run started");
        Ok(id)
    }

    /// Move a run to its terminal state.
    ///
    /// Returns `DatabaseError::InvalidState` if the run was already closed
    /// and `DatabaseError::NotFound` if it does not exist.
    pub async fn close(&self, id: &str, outcome: &RunOutcome) -> Result<(), DatabaseError> {
        match outcome {
            RunOutcome::Success { records_processed } => {
                self.store.complete_run(id, *records_processed).await?;
                info!(run_id = %id, records_processed, "Sync run succeeded");
            }
            RunOutcome::Failed { error } => {
                self.store.fail_run(id, error).await?;
                info!(run_id = %id, error = %error, "Sync run marked failed");
            }
        }
        Ok(())
    }

    pub async fn get_run(&self, id: &str) -> Result<SyncRun, DatabaseError> {
        self.store.get_run(id).await
    }

    /// Most recent runs, newest first.
    pub async fn recent_runs(&self, limit: u32) -> Result<Vec<SyncRun>, DatabaseError> {
        self.store.list_runs(limit).await
    }

    /// The most recently started run, if any.
    pub async fn latest_run(&self) -> Result<Option<SyncRun>, DatabaseError> {
        Ok(self.store.list_runs(1).await?.into_iter().next())
    }
}
