//! Read-only access to the remote Sendy database.
//!
//! Rows come back loosely typed: Sendy stores counts and timestamps as
//! integers in some installations and as strings in others. Every column is
//! carried as a [`RawValue`] and only the field mapper turns it into
//! concrete types.

mod mysql;

use std::future::Future;

pub use mysql::MySqlSource;

/// A single loosely-typed remote column value.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum RawValue {
    #[default]
    Null,
    Int(i64),
    Float(f64),
    Text(String),
}

impl From<&str> for RawValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for RawValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i64> for RawValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl<T: Into<Self>> From<Option<T>> for RawValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

/// A row of the remote `campaigns` table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawCampaignRow {
    pub id: RawValue,
    pub title: RawValue,
    pub subject: RawValue,
    pub from_name: RawValue,
    pub from_email: RawValue,
    /// Unix seconds when the campaign was sent; empty when unsent.
    pub sent: RawValue,
    pub recipients: RawValue,
    /// Either an integer count or a comma-separated list of opens,
    /// depending on the Sendy version.
    pub opens: RawValue,
}

/// A row of the remote `subscribers` table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawSubscriberRow {
    pub id: RawValue,
    pub email: RawValue,
    pub name: RawValue,
    pub list: RawValue,
    pub unsubscribed: RawValue,
    pub bounced: RawValue,
    pub timestamp: RawValue,
}

/// Errors raised by a remote source.
#[derive(Debug, Clone, thiserror::Error)]
pub enum RemoteError {
    /// The remote store is unreachable or rejected our credentials.
    #[error("Remote connection error: {0}")]
    Connection(String),

    /// The query could not be executed or its result could not be read.
    #[error("Remote query error: {0}")]
    Query(String),
}

impl From<sqlx::Error> for RemoteError {
    fn from(e: sqlx::Error) -> Self {
        match &e {
            sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::Protocol(_)
            | sqlx::Error::Configuration(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed => Self::Connection(e.to_string()),
            sqlx::Error::Database(db) if mysql::is_access_denied(&**db) => {
                Self::Connection(e.to_string())
            }
            _ => Self::Query(e.to_string()),
        }
    }
}

/// Source of record for campaigns and subscribers.
///
/// Results are ordered so that a bounded fetch returns the most recently
/// relevant rows: campaigns by descending id, subscribers by descending
/// subscription timestamp.
pub trait RemoteSource: Send + Sync {
    fn fetch_campaigns(
        &self,
        limit: u32,
    ) -> impl Future<Output = Result<Vec<RawCampaignRow>, RemoteError>> + Send;

    fn fetch_subscribers(
        &self,
        limit: u32,
    ) -> impl Future<Output = Result<Vec<RawSubscriberRow>, RemoteError>> + Send;
}

/// Reject a zero limit before touching the remote store.
pub(crate) fn check_limit(limit: u32) -> Result<u32, RemoteError> {
    if limit == 0 {
        Err(RemoteError::Query("fetch limit must be positive".to_string()))
    } else {
        Ok(limit)
    }
}
