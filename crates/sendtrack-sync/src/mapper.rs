//! Field mapping from loosely-typed remote rows to local records.
//!
//! Everything here is pure. Malformed values degrade to defaults (counts to
//! 0, timestamps to `None` or `now`) so a single corrupt remote row never
//! aborts a batch. Only a row with no usable identity is dropped.

use crate::models::{CampaignRecord, CampaignStatus, SubscriberRecord, SubscriberStatus};
use crate::remote::{RawCampaignRow, RawSubscriberRow, RawValue};

/// Separator used by Sendy versions that store opens as a list.
const OPENS_DELIMITER: char = ',';

/// Parse a count from an integer, float or numeric string.
///
/// Null, unparsable and negative values all map to 0.
pub fn parse_count(value: &RawValue) -> i64 {
    let parsed = match value {
        RawValue::Null => None,
        RawValue::Int(n) => Some(*n),
        RawValue::Float(f) => truncate_float(*f),
        RawValue::Text(s) => {
            let trimmed = s.trim();
            trimmed
                .parse::<i64>()
                .ok()
                .or_else(|| trimmed.parse::<f64>().ok().and_then(truncate_float))
        }
    };
    parsed.unwrap_or(0).max(0)
}

/// Parse the opens column, which is either a direct count or a
/// comma-separated list of open entries (count = list length).
pub fn parse_opened(value: &RawValue) -> i64 {
    match value {
        RawValue::Text(s) if s.contains(OPENS_DELIMITER) => {
            let entries = s
                .split(OPENS_DELIMITER)
                .filter(|entry| !entry.trim().is_empty())
                .count();
            i64::try_from(entries).unwrap_or(i64::MAX)
        }
        other => parse_count(other),
    }
}

/// Parse a positive Unix-seconds timestamp.
pub fn parse_epoch_seconds(value: &RawValue) -> Option<i64> {
    let seconds = match value {
        RawValue::Null => None,
        RawValue::Int(n) => Some(*n),
        RawValue::Float(f) => truncate_float(*f),
        RawValue::Text(s) => s.trim().parse::<i64>().ok(),
    };
    seconds.filter(|s| *s > 0)
}

/// Whether a boolean-ish remote flag is set: any non-zero number, or text
/// holding one.
pub fn flag_is_set(value: &RawValue) -> bool {
    match value {
        RawValue::Null => false,
        RawValue::Int(n) => *n != 0,
        RawValue::Float(f) => f.abs() > f64::EPSILON,
        RawValue::Text(s) => s.trim().parse::<i64>().is_ok_and(|n| n != 0),
    }
}

/// Whether the campaign's sent marker is present. Null, blank text and
/// zero all count as absent.
pub fn sent_marker_present(value: &RawValue) -> bool {
    match value {
        RawValue::Null => false,
        RawValue::Int(n) => *n != 0,
        RawValue::Float(f) => f.abs() > f64::EPSILON,
        RawValue::Text(s) => {
            let trimmed = s.trim();
            !trimmed.is_empty() && trimmed != "0"
        }
    }
}

/// `Sent` if and only if the sent marker is present.
pub fn derive_campaign_status(sent: &RawValue) -> CampaignStatus {
    if sent_marker_present(sent) {
        CampaignStatus::Sent
    } else {
        CampaignStatus::Draft
    }
}

/// Strict priority: bounced, then unsubscribed, then active.
pub const fn derive_subscriber_status(bounced: bool, unsubscribed: bool) -> SubscriberStatus {
    if bounced {
        SubscriberStatus::Bounced
    } else if unsubscribed {
        SubscriberStatus::Unsubscribed
    } else {
        SubscriberStatus::Active
    }
}

/// Map a remote campaign row. Returns `None` when the row has no id.
pub fn map_campaign(row: &RawCampaignRow) -> Option<CampaignRecord> {
    let id = text_of(&row.id).trim().to_string();
    if id.is_empty() {
        return None;
    }

    let status = derive_campaign_status(&row.sent);
    let sent_at = match status {
        CampaignStatus::Sent => parse_epoch_seconds(&row.sent),
        CampaignStatus::Draft | CampaignStatus::Scheduled | CampaignStatus::Sending => None,
    };

    Some(CampaignRecord {
        id,
        title: text_of(&row.title),
        subject: text_of(&row.subject),
        from_name: text_of(&row.from_name),
        from_email: text_of(&row.from_email),
        status,
        sent_at,
        recipients: parse_count(&row.recipients),
        opened: parse_opened(&row.opens),
    })
}

/// Map a remote subscriber row. Returns `None` when the row has no email.
///
/// The email is kept byte-for-byte; no case folding or trimming is applied
/// because it is the identity key.
pub fn map_subscriber(row: &RawSubscriberRow, now: i64) -> Option<SubscriberRecord> {
    let email = text_of(&row.email);
    if email.trim().is_empty() {
        return None;
    }

    let name = Some(text_of(&row.name)).filter(|name| !name.trim().is_empty());

    Some(SubscriberRecord {
        email,
        name,
        list_id: text_of(&row.list),
        status: derive_subscriber_status(flag_is_set(&row.bounced), flag_is_set(&row.unsubscribed)),
        subscribed_at: parse_epoch_seconds(&row.timestamp).unwrap_or(now),
    })
}

fn text_of(value: &RawValue) -> String {
    match value {
        RawValue::Null => String::new(),
        RawValue::Int(n) => n.to_string(),
        RawValue::Float(f) => f.to_string(),
        RawValue::Text(s) => s.clone(),
    }
}

#[allow(clippy::cast_possible_truncation)]
fn truncate_float(f: f64) -> Option<i64> {
    // `as` saturates at the i64 bounds.
    f.is_finite().then(|| f.trunc() as i64)
}
