//! Data models for the local cache.
//!
//! `*Record` types are what the field mapper produces and the store writes;
//! the row types mirror the `SQLite` tables and are what the read side
//! returns.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Campaign delivery status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CampaignStatus {
    Draft,
    /// Queued for a future send; only ever set locally.
    Scheduled,
    Sending,
    Sent,
}

impl CampaignStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Scheduled => "scheduled",
            Self::Sending => "sending",
            Self::Sent => "sent",
        }
    }
}

impl fmt::Display for CampaignStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CampaignStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(Self::Draft),
            "scheduled" => Ok(Self::Scheduled),
            "sending" => Ok(Self::Sending),
            "sent" => Ok(Self::Sent),
            other => Err(format!("unknown campaign status: {other}")),
        }
    }
}

/// Subscriber status, derived from the remote bounced/unsubscribed flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriberStatus {
    Active,
    Unsubscribed,
    Bounced,
}

impl SubscriberStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Unsubscribed => "unsubscribed",
            Self::Bounced => "bounced",
        }
    }
}

impl fmt::Display for SubscriberStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SubscriberStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "unsubscribed" => Ok(Self::Unsubscribed),
            "bounced" => Ok(Self::Bounced),
            other => Err(format!("unknown subscriber status: {other}")),
        }
    }
}

/// Sync run lifecycle state. `Success` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Running,
    Success,
    Failed,
}

impl RunStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Success => "success",
            Self::Failed => "failed",
        }
    }

    pub const fn is_terminal(self) -> bool {
        !matches!(self, Self::Running)
    }
}

impl FromStr for RunStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "running" => Ok(Self::Running),
            "success" => Ok(Self::Success),
            "failed" => Ok(Self::Failed),
            other => Err(format!("unknown run status: {other}")),
        }
    }
}

/// A normalized campaign ready to be upserted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CampaignRecord {
    pub id: String,
    pub title: String,
    pub subject: String,
    pub from_name: String,
    pub from_email: String,
    pub status: CampaignStatus,
    pub sent_at: Option<i64>,
    pub recipients: i64,
    pub opened: i64,
}

/// A normalized subscriber ready to be upserted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriberRecord {
    pub email: String,
    pub name: Option<String>,
    pub list_id: String,
    pub status: SubscriberStatus,
    pub subscribed_at: i64,
}

/// Campaign row from the local cache.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Campaign {
    pub id: String,
    pub title: String,
    pub subject: String,
    pub from_name: String,
    pub from_email: String,
    pub status: String,
    pub sent_at: Option<i64>,
    pub recipients: i64,
    pub opened: i64,
    pub clicked: i64,
    pub bounced: i64,
    pub unsubscribed: i64,
    pub last_synced_at: i64,
    pub created_at: i64,
}

impl Campaign {
    /// Opens as a percentage of recipients; 0 when nothing was sent.
    pub fn open_rate(&self) -> f64 {
        percentage(self.opened, self.recipients)
    }

    /// Recipients not bounced, as a percentage of recipients.
    pub fn delivery_rate(&self) -> f64 {
        percentage(self.recipients - self.bounced, self.recipients)
    }

    /// Clicks as a percentage of opens.
    pub fn click_rate(&self) -> f64 {
        percentage(self.clicked, self.opened)
    }
}

/// `part / whole * 100`, or 0 when `whole` is not positive.
#[allow(clippy::cast_precision_loss)]
pub(crate) fn percentage(part: i64, whole: i64) -> f64 {
    if whole > 0 {
        part as f64 / whole as f64 * 100.0
    } else {
        0.0
    }
}

/// Subscriber row from the local cache.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Subscriber {
    pub email: String,
    pub name: Option<String>,
    pub list_id: String,
    pub status: String,
    pub subscribed_at: i64,
    pub last_synced_at: i64,
}

/// Sync run row from the local cache.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct SyncRun {
    pub id: String,
    pub status: String,
    pub started_at: i64,
    pub completed_at: Option<i64>,
    pub records_processed: Option<i64>,
    pub error: Option<String>,
}

/// How a run should be presented, given the time it is looked at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunHealth {
    Running,
    /// Still `running` after the stale threshold; most likely the process
    /// died mid-run.
    Stale,
    Succeeded,
    Failed,
}

impl SyncRun {
    pub fn run_status(&self) -> Option<RunStatus> {
        self.status.parse().ok()
    }

    /// Classify the run. A `running` row older than `stale_after_secs` is
    /// reported as [`RunHealth::Stale`]; the row itself is never touched.
    pub fn health(&self, now: i64, stale_after_secs: u64) -> RunHealth {
        match self.run_status() {
            Some(RunStatus::Success) => RunHealth::Succeeded,
            Some(RunStatus::Failed) => RunHealth::Failed,
            Some(RunStatus::Running) | None => {
                let threshold = i64::try_from(stale_after_secs).unwrap_or(i64::MAX);
                if now.saturating_sub(self.started_at) > threshold {
                    RunHealth::Stale
                } else {
                    RunHealth::Running
                }
            }
        }
    }
}

/// Dashboard aggregates computed from the local cache.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub total_campaigns: i64,
    pub active_campaigns: i64,
    pub total_emails_sent: i64,
    pub total_delivered: i64,
    pub total_opened: i64,
    pub total_clicked: i64,
    pub total_bounced: i64,
    /// Always 0: the local schema has no failed-delivery counter.
    pub total_failed: i64,
    pub average_delivery_rate: f64,
    pub average_open_rate: f64,
    pub average_click_rate: f64,
    pub average_bounce_rate: f64,
    pub total_subscribers: i64,
    pub trends_vs_previous: Trends,
}

/// Period-over-period change per figure. No previous period is kept, so
/// every field is 0.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Trends {
    pub campaigns: f64,
    pub sent: f64,
    pub delivered: f64,
    pub opened: f64,
    pub clicked: f64,
}
