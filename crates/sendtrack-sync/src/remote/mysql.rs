//! `MySQL` implementation of [`RemoteSource`] over a bounded `sqlx` pool.

use std::time::Duration;

use sendtrack_core::config::RemoteConfig;
use sqlx::mysql::{MySqlConnectOptions, MySqlDatabaseError, MySqlPool, MySqlPoolOptions, MySqlRow};
use sqlx::Row;
use tracing::debug;

use super::{
    RawCampaignRow, RawSubscriberRow, RawValue, RemoteError, RemoteSource, check_limit,
};

const CAMPAIGNS_SQL: &str = "SELECT id, title, subject, from_name, from_email, sent, recipients, opens \
     FROM campaigns ORDER BY id DESC LIMIT ?";

const SUBSCRIBERS_SQL: &str = "SELECT id, email, name, list, unsubscribed, bounced, timestamp \
     FROM subscribers ORDER BY timestamp DESC LIMIT ?";

/// `ER_ACCESS_DENIED_ERROR` and `ER_DBACCESS_DENIED_ERROR`.
const ACCESS_DENIED_CODES: [u16; 2] = [1045, 1044];

/// Reader for the remote Sendy database.
///
/// Each query checks a connection out of the pool and returns it when the
/// query future completes or is dropped.
#[derive(Clone)]
pub struct MySqlSource {
    pool: MySqlPool,
}

impl MySqlSource {
    /// Build a lazily-connecting pool from config. No connection is made
    /// until the first fetch, so an unreachable remote surfaces as a
    /// connection error on the sync run instead of at startup.
    pub fn connect_lazy(config: &RemoteConfig) -> Self {
        let options = MySqlConnectOptions::new()
            .host(&config.host)
            .port(config.port)
            .username(&config.user)
            .password(&config.password)
            .database(&config.database);

        let pool = MySqlPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
            .connect_lazy_with(options);

        Self { pool }
    }
}

impl RemoteSource for MySqlSource {
    async fn fetch_campaigns(&self, limit: u32) -> Result<Vec<RawCampaignRow>, RemoteError> {
        let limit = check_limit(limit)?;
        let rows = sqlx::query(CAMPAIGNS_SQL)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        debug!(rows = rows.len(), "Fetched remote campaigns");

        rows.iter().map(campaign_from_row).collect()
    }

    async fn fetch_subscribers(&self, limit: u32) -> Result<Vec<RawSubscriberRow>, RemoteError> {
        let limit = check_limit(limit)?;
        let rows = sqlx::query(SUBSCRIBERS_SQL)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        debug!(rows = rows.len(), "Fetched remote subscribers");

        rows.iter().map(subscriber_from_row).collect()
    }
}

fn campaign_from_row(row: &MySqlRow) -> Result<RawCampaignRow, RemoteError> {
    Ok(RawCampaignRow {
        id: raw_column(row, "id")?,
        title: raw_column(row, "title")?,
        subject: raw_column(row, "subject")?,
        from_name: raw_column(row, "from_name")?,
        from_email: raw_column(row, "from_email")?,
        sent: raw_column(row, "sent")?,
        recipients: raw_column(row, "recipients")?,
        opens: raw_column(row, "opens")?,
    })
}

fn subscriber_from_row(row: &MySqlRow) -> Result<RawSubscriberRow, RemoteError> {
    Ok(RawSubscriberRow {
        id: raw_column(row, "id")?,
        email: raw_column(row, "email")?,
        name: raw_column(row, "name")?,
        list: raw_column(row, "list")?,
        unsubscribed: raw_column(row, "unsubscribed")?,
        bounced: raw_column(row, "bounced")?,
        timestamp: raw_column(row, "timestamp")?,
    })
}

/// Decode a column whatever its `MySQL` type: signed and unsigned integers,
/// floating point, text, then raw bytes as lossy UTF-8.
fn raw_column(row: &MySqlRow, column: &str) -> Result<RawValue, RemoteError> {
    if let Ok(value) = row.try_get::<Option<i64>, _>(column) {
        return Ok(value.map_or(RawValue::Null, RawValue::Int));
    }
    if let Ok(value) = row.try_get::<Option<u64>, _>(column) {
        return Ok(value.map_or(RawValue::Null, |n| {
            RawValue::Int(i64::try_from(n).unwrap_or(i64::MAX))
        }));
    }
    if let Ok(value) = row.try_get::<Option<f64>, _>(column) {
        return Ok(value.map_or(RawValue::Null, RawValue::Float));
    }
    if let Ok(value) = row.try_get::<Option<String>, _>(column) {
        return Ok(value.map_or(RawValue::Null, RawValue::Text));
    }
    let bytes = row.try_get::<Option<Vec<u8>>, _>(column)?;
    Ok(bytes.map_or(RawValue::Null, |b| {
        RawValue::Text(String::from_utf8_lossy(&b).into_owned())
    }))
}

pub(super) fn is_access_denied(err: &(dyn sqlx::error::DatabaseError + 'static)) -> bool {
    if err.code().as_deref() == Some("28000") {
        return true;
    }
    err.try_downcast_ref::<MySqlDatabaseError>()
        .is_some_and(|e| ACCESS_DENIED_CODES.contains(&e.number()))
}
