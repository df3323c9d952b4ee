//! Campaign and subscriber queries for the local cache.

use sendtrack_core::db::unix_timestamp;

use super::db::{DatabaseError, LocalStore};
use crate::models::{
    Campaign, CampaignRecord, DashboardStats, Subscriber, SubscriberRecord, Trends, percentage,
};

/// Insert a campaign or refresh every remote-derived column of an existing
/// one. `created_at` is only written on insert; engagement counters the
/// remote row does not carry (clicked, bounced, unsubscribed) are left alone.
const UPSERT_CAMPAIGN_SQL: &str = "INSERT INTO campaigns \
    (id, title, subject, from_name, from_email, status, sent_at, recipients, opened, last_synced_at, created_at) \
    VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?) \
    ON CONFLICT(id) DO UPDATE SET \
    title = excluded.title, subject = excluded.subject, \
    from_name = excluded.from_name, from_email = excluded.from_email, \
    status = excluded.status, sent_at = excluded.sent_at, \
    recipients = excluded.recipients, opened = excluded.opened, \
    last_synced_at = excluded.last_synced_at";

/// Insert a subscriber or refresh an existing one. `subscribed_at` is only
/// written on insert because the mapper may have substituted "now" for a
/// missing remote timestamp.
const UPSERT_SUBSCRIBER_SQL: &str = "INSERT INTO subscribers \
    (email, name, list_id, status, subscribed_at, last_synced_at) \
    VALUES (?, ?, ?, ?, ?, ?) \
    ON CONFLICT(email) DO UPDATE SET \
    name = excluded.name, list_id = excluded.list_id, \
    status = excluded.status, last_synced_at = excluded.last_synced_at";

type SqliteQuery<'q> = sqlx::query::Query<'q, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'q>>;

impl CampaignRecord {
    fn bind_upsert(&self, now: i64) -> SqliteQuery<'_> {
        sqlx::query(UPSERT_CAMPAIGN_SQL)
            .bind(&self.id)
            .bind(&self.title)
            .bind(&self.subject)
            .bind(&self.from_name)
            .bind(&self.from_email)
            .bind(self.status.as_str())
            .bind(self.sent_at)
            .bind(self.recipients)
            .bind(self.opened)
            .bind(now)
            .bind(now)
    }
}

impl SubscriberRecord {
    fn bind_upsert(&self, now: i64) -> SqliteQuery<'_> {
        sqlx::query(UPSERT_SUBSCRIBER_SQL)
            .bind(&self.email)
            .bind(self.name.as_deref())
            .bind(&self.list_id)
            .bind(self.status.as_str())
            .bind(self.subscribed_at)
            .bind(now)
    }
}

impl LocalStore {
    // =========================================================================
    // Campaign queries
    // =========================================================================

    /// Insert or update a campaign keyed by its remote id.
    pub async fn upsert_campaign(&self, record: &CampaignRecord) -> Result<(), DatabaseError> {
        record
            .bind_upsert(unix_timestamp())
            .execute(self.pool())
            .await?;
        Ok(())
    }

    /// Get a campaign by ID.
    pub async fn get_campaign(&self, id: &str) -> Result<Campaign, DatabaseError> {
        sqlx::query_as::<_, Campaign>("SELECT * FROM campaigns WHERE id = ?")
            .bind(id)
            .fetch_optional(self.pool())
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("Campaign {id}")))
    }

    /// List campaigns, highest remote id first.
    pub async fn list_campaigns(&self, limit: u32) -> Result<Vec<Campaign>, DatabaseError> {
        let campaigns = sqlx::query_as::<_, Campaign>(
            "SELECT * FROM campaigns ORDER BY CAST(id AS INTEGER) DESC, id DESC LIMIT ?",
        )
        .bind(limit)
        .fetch_all(self.pool())
        .await?;

        Ok(campaigns)
    }

    /// Count all cached campaigns.
    pub async fn count_campaigns(&self) -> Result<i64, DatabaseError> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM campaigns")
            .fetch_one(self.pool())
            .await?;
        Ok(row.0)
    }

    // =========================================================================
    // Subscriber queries
    // =========================================================================

    /// Insert or update a single subscriber keyed by email.
    pub async fn upsert_subscriber(&self, record: &SubscriberRecord) -> Result<(), DatabaseError> {
        record
            .bind_upsert(unix_timestamp())
            .execute(self.pool())
            .await?;
        Ok(())
    }

    /// Upsert a batch of subscribers in one transaction.
    ///
    /// Either every record is written or none is: the transaction is rolled
    /// back when it is dropped without commit on the error path.
    pub async fn upsert_subscribers(
        &self,
        records: &[SubscriberRecord],
    ) -> Result<u64, DatabaseError> {
        let now = unix_timestamp();
        let mut tx = self.pool().begin().await?;

        let mut written = 0;
        for record in records {
            record.bind_upsert(now).execute(&mut *tx).await?;
            written += 1;
        }

        tx.commit().await?;

        Ok(written)
    }

    /// Get a subscriber by email (exact, case-sensitive match).
    pub async fn get_subscriber(&self, email: &str) -> Result<Subscriber, DatabaseError> {
        sqlx::query_as::<_, Subscriber>("SELECT * FROM subscribers WHERE email = ?")
            .bind(email)
            .fetch_optional(self.pool())
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("Subscriber {email}")))
    }

    /// List subscribers, most recently subscribed first.
    pub async fn list_subscribers(&self, limit: u32) -> Result<Vec<Subscriber>, DatabaseError> {
        let subscribers = sqlx::query_as::<_, Subscriber>(
            "SELECT * FROM subscribers ORDER BY subscribed_at DESC, email ASC LIMIT ?",
        )
        .bind(limit)
        .fetch_all(self.pool())
        .await?;

        Ok(subscribers)
    }

    /// Count cached subscribers, optionally filtered by status.
    pub async fn count_subscribers(&self, status: Option<&str>) -> Result<i64, DatabaseError> {
        let row: (i64,) = match status {
            Some(status) => {
                sqlx::query_as("SELECT COUNT(*) FROM subscribers WHERE status = ?")
                    .bind(status)
                    .fetch_one(self.pool())
                    .await?
            }
            None => {
                sqlx::query_as("SELECT COUNT(*) FROM subscribers")
                    .fetch_one(self.pool())
                    .await?
            }
        };
        Ok(row.0)
    }

    // =========================================================================
    // Reporting
    // =========================================================================

    /// Aggregate dashboard figures over the whole cache.
    pub async fn dashboard_stats(&self) -> Result<DashboardStats, DatabaseError> {
        let (total_campaigns, active_campaigns, sent, opened, clicked, bounced): (
            i64,
            i64,
            i64,
            i64,
            i64,
            i64,
        ) = sqlx::query_as(
            "SELECT COUNT(*), \
             COALESCE(SUM(CASE WHEN status IN ('sending', 'scheduled') THEN 1 ELSE 0 END), 0), \
             COALESCE(SUM(recipients), 0), COALESCE(SUM(opened), 0), \
             COALESCE(SUM(clicked), 0), COALESCE(SUM(bounced), 0) \
             FROM campaigns",
        )
        .fetch_one(self.pool())
        .await?;

        let total_subscribers = self.count_subscribers(Some("active")).await?;
        let delivered = sent - bounced;

        Ok(DashboardStats {
            total_campaigns,
            active_campaigns,
            total_emails_sent: sent,
            total_delivered: delivered,
            total_opened: opened,
            total_clicked: clicked,
            total_bounced: bounced,
            total_failed: 0,
            average_delivery_rate: percentage(delivered, sent),
            average_open_rate: percentage(opened, sent),
            average_click_rate: percentage(clicked, opened),
            average_bounce_rate: percentage(bounced, sent),
            total_subscribers,
            trends_vs_previous: Trends::default(),
        })
    }
}
