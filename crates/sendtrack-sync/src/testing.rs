//! In-memory remote source and row builders for tests.

use tokio::sync::RwLock;

use crate::remote::{
    RawCampaignRow, RawSubscriberRow, RawValue, RemoteError, RemoteSource, check_limit,
};

/// A [`RemoteSource`] serving fixed rows, with injectable failures.
///
/// Rows are returned in the order they were given, truncated to the limit.
#[derive(Default)]
pub struct StaticSource {
    campaigns: RwLock<Vec<RawCampaignRow>>,
    subscribers: RwLock<Vec<RawSubscriberRow>>,
    campaign_error: RwLock<Option<RemoteError>>,
    subscriber_error: RwLock<Option<RemoteError>>,
}

impl StaticSource {
    pub fn new(campaigns: Vec<RawCampaignRow>, subscribers: Vec<RawSubscriberRow>) -> Self {
        Self {
            campaigns: RwLock::new(campaigns),
            subscribers: RwLock::new(subscribers),
            ..Self::default()
        }
    }

    pub async fn set_campaigns(&self, rows: Vec<RawCampaignRow>) {
        *self.campaigns.write().await = rows;
    }

    pub async fn set_subscribers(&self, rows: Vec<RawSubscriberRow>) {
        *self.subscribers.write().await = rows;
    }

    /// Make every campaign fetch fail with `error` (or succeed again with `None`).
    pub async fn fail_campaigns(&self, error: Option<RemoteError>) {
        *self.campaign_error.write().await = error;
    }

    /// Make every subscriber fetch fail with `error` (or succeed again with `None`).
    pub async fn fail_subscribers(&self, error: Option<RemoteError>) {
        *self.subscriber_error.write().await = error;
    }
}

impl RemoteSource for StaticSource {
    async fn fetch_campaigns(&self, limit: u32) -> Result<Vec<RawCampaignRow>, RemoteError> {
        let limit = check_limit(limit)?;
        if let Some(err) = self.campaign_error.read().await.clone() {
            return Err(err);
        }
        let rows = self.campaigns.read().await;
        Ok(rows.iter().take(to_usize(limit)).cloned().collect())
    }

    async fn fetch_subscribers(&self, limit: u32) -> Result<Vec<RawSubscriberRow>, RemoteError> {
        let limit = check_limit(limit)?;
        if let Some(err) = self.subscriber_error.read().await.clone() {
            return Err(err);
        }
        let rows = self.subscribers.read().await;
        Ok(rows.iter().take(to_usize(limit)).cloned().collect())
    }
}

fn to_usize(limit: u32) -> usize {
    usize::try_from(limit).unwrap_or(usize::MAX)
}

/// A sent campaign with string-typed counts, as older Sendy versions return.
pub fn campaign_row(id: i64, recipients: &str, opens: &str) -> RawCampaignRow {
    RawCampaignRow {
        id: RawValue::Int(id),
        title: format!("Campaign {id}").into(),
        subject: format!("Subject {id}").into(),
        from_name: "Newsletter".into(),
        from_email: "news@example.com".into(),
        sent: "1717200000".into(),
        recipients: recipients.into(),
        opens: opens.into(),
    }
}

/// A subscriber on list 1 with integer flags.
pub fn subscriber_row(email: &str, bounced: i64, unsubscribed: i64) -> RawSubscriberRow {
    RawSubscriberRow {
        id: RawValue::Null,
        email: email.into(),
        name: RawValue::Null,
        list: RawValue::Int(1),
        unsubscribed: RawValue::Int(unsubscribed),
        bounced: RawValue::Int(bounced),
        timestamp: RawValue::Int(1_700_000_000),
    }
}
