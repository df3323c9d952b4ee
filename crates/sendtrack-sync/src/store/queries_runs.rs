//! Database queries for the `sync_runs` table.

use sendtrack_core::db::unix_timestamp;

use super::db::{DatabaseError, LocalStore};
use crate::models::{RunStatus, SyncRun};

impl LocalStore {
    /// Record the start of a run.
    pub async fn create_run(&self, id: &str) -> Result<SyncRun, DatabaseError> {
        sqlx::query("INSERT INTO sync_runs (id, status, started_at) VALUES (?, ?, ?)")
            .bind(id)
            .bind(RunStatus::Running.as_str())
            .bind(unix_timestamp())
            .execute(self.pool())
            .await?;

        self.get_run(id).await
    }

    /// Get a run by ID.
    pub async fn get_run(&self, id: &str) -> Result<SyncRun, DatabaseError> {
        sqlx::query_as::<_, SyncRun>("SELECT * FROM sync_runs WHERE id = ?")
            .bind(id)
            .fetch_optional(self.pool())
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("Sync run {id}")))
    }

    /// Mark a running run as successful.
    pub async fn complete_run(&self, id: &str, records_processed: i64) -> Result<(), DatabaseError> {
        let result = sqlx::query(
            "UPDATE sync_runs SET status = ?, completed_at = ?, records_processed = ? \
             WHERE id = ? AND status = ?",
        )
        .bind(RunStatus::Success.as_str())
        .bind(unix_timestamp())
        .bind(records_processed)
        .bind(id)
        .bind(RunStatus::Running.as_str())
        .execute(self.pool())
        .await?;

        self.check_transition(id, result.rows_affected()).await
    }

    /// Mark a running run as failed.
    pub async fn fail_run(&self, id: &str, error: &str) -> Result<(), DatabaseError> {
        let result = sqlx::query(
            "UPDATE sync_runs SET status = ?, completed_at = ?, error = ? \
             WHERE id = ? AND status = ?",
        )
        .bind(RunStatus::Failed.as_str())
        .bind(unix_timestamp())
        .bind(error)
        .bind(id)
        .bind(RunStatus::Running.as_str())
        .execute(self.pool())
        .await?;

        self.check_transition(id, result.rows_affected()).await
    }

    /// List runs, newest first.
    pub async fn list_runs(&self, limit: u32) -> Result<Vec<SyncRun>, DatabaseError> {
        let runs = sqlx::query_as::<_, SyncRun>(
            "SELECT * FROM sync_runs ORDER BY started_at DESC, rowid DESC LIMIT ?",
        )
        .bind(limit)
        .fetch_all(self.pool())
        .await?;

        Ok(runs)
    }

    /// Terminal updates only match `running` rows; explain a miss.
    async fn check_transition(&self, id: &str, rows_affected: u64) -> Result<(), DatabaseError> {
        if rows_affected > 0 {
            return Ok(());
        }
        let run = self.get_run(id).await?;
        Err(DatabaseError::InvalidState(format!(
            "Sync run {id} is already {}",
            run.status
        )))
    }
}
