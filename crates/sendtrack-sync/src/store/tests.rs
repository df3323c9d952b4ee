//! Storage layer tests for the local cache.

use super::db::{DatabaseError, LocalStore};
use crate::models::{
    CampaignRecord, CampaignStatus, SubscriberRecord, SubscriberStatus, Trends,
};

async fn test_db() -> LocalStore {
    LocalStore::open_in_memory().await.unwrap()
}

fn campaign(id: &str, recipients: i64, opened: i64) -> CampaignRecord {
    CampaignRecord {
        id: id.to_string(),
        title: format!("Campaign {id}"),
        subject: "Hello".to_string(),
        from_name: "Team".to_string(),
        from_email: "team@example.com".to_string(),
        status: CampaignStatus::Sent,
        sent_at: Some(1_717_200_000),
        recipients,
        opened,
    }
}

fn subscriber(email: &str, status: SubscriberStatus) -> SubscriberRecord {
    SubscriberRecord {
        email: email.to_string(),
        name: Some("Sam".to_string()),
        list_id: "1".to_string(),
        status,
        subscribed_at: 1_700_000_000,
    }
}

/// Make any write of `email` fail inside `SQLite`.
async fn reject_subscriber(db: &LocalStore, email: &str) {
    sqlx::query(&format!(
        "CREATE TRIGGER reject_subscriber BEFORE INSERT ON subscribers \
         WHEN NEW.email = '{email}' BEGIN SELECT RAISE(ABORT, 'rejected'); END"
    ))
    .execute(db.pool())
    .await
    .unwrap();
}

// === Campaign tests ===

#[tokio::test]
async fn upsert_creates_campaign() {
    let db = test_db().await;
    db.upsert_campaign(&campaign("42", 1000, 350)).await.unwrap();

    let stored = db.get_campaign("42").await.unwrap();
    assert_eq!(stored.recipients, 1000);
    assert_eq!(stored.opened, 350);
    assert_eq!(stored.status, "sent");
    assert_eq!(stored.sent_at, Some(1_717_200_000));
    assert_eq!(stored.clicked, 0);
    assert!(stored.last_synced_at > 0);
    assert!(stored.created_at > 0);
}

#[tokio::test]
async fn upsert_updates_campaign_in_place() {
    let db = test_db().await;
    db.upsert_campaign(&campaign("42", 1000, 350)).await.unwrap();
    let created = db.get_campaign("42").await.unwrap();

    let mut changed = campaign("42", 1200, 400);
    changed.title = "Renamed".to_string();
    db.upsert_campaign(&changed).await.unwrap();

    assert_eq!(db.count_campaigns().await.unwrap(), 1);
    let stored = db.get_campaign("42").await.unwrap();
    assert_eq!(stored.recipients, 1200);
    assert_eq!(stored.opened, 400);
    assert_eq!(stored.title, "Renamed");
    assert_eq!(stored.created_at, created.created_at);
}

#[tokio::test]
async fn upsert_keeps_counters_not_carried_by_remote() {
    let db = test_db().await;
    db.upsert_campaign(&campaign("7", 500, 100)).await.unwrap();
    sqlx::query("UPDATE campaigns SET clicked = 40, bounced = 5 WHERE id = '7'")
        .execute(db.pool())
        .await
        .unwrap();

    db.upsert_campaign(&campaign("7", 500, 120)).await.unwrap();

    let stored = db.get_campaign("7").await.unwrap();
    assert_eq!(stored.clicked, 40);
    assert_eq!(stored.bounced, 5);
    assert_eq!(stored.opened, 120);
}

#[tokio::test]
async fn negative_counts_are_rejected_by_schema() {
    let db = test_db().await;
    let err = db
        .upsert_campaign(&campaign("1", -1, 0))
        .await
        .unwrap_err();
    assert!(matches!(err, DatabaseError::Query(_)));
}

#[tokio::test]
async fn missing_campaign_is_not_found() {
    let db = test_db().await;
    assert!(matches!(
        db.get_campaign("nope").await,
        Err(DatabaseError::NotFound(_))
    ));
}

#[tokio::test]
async fn campaigns_list_by_numeric_id_descending() {
    let db = test_db().await;
    for id in ["9", "10", "2"] {
        db.upsert_campaign(&campaign(id, 1, 0)).await.unwrap();
    }

    let ids: Vec<String> = db
        .list_campaigns(10)
        .await
        .unwrap()
        .into_iter()
        .map(|c| c.id)
        .collect();
    assert_eq!(ids, ["10", "9", "2"]);

    assert_eq!(db.list_campaigns(2).await.unwrap().len(), 2);
}

// === Subscriber tests ===

#[tokio::test]
async fn upsert_subscriber_updates_status_but_not_subscribed_at() {
    let db = test_db().await;
    db.upsert_subscriber(&subscriber("a@example.com", SubscriberStatus::Active))
        .await
        .unwrap();

    let mut later = subscriber("a@example.com", SubscriberStatus::Unsubscribed);
    later.subscribed_at = 1_800_000_000;
    later.name = None;
    db.upsert_subscriber(&later).await.unwrap();

    let stored = db.get_subscriber("a@example.com").await.unwrap();
    assert_eq!(stored.status, "unsubscribed");
    assert_eq!(stored.name, None);
    assert_eq!(stored.subscribed_at, 1_700_000_000);
    assert_eq!(db.count_subscribers(None).await.unwrap(), 1);
}

#[tokio::test]
async fn subscriber_email_is_case_sensitive() {
    let db = test_db().await;
    let batch = [
        subscriber("Sam@Example.com", SubscriberStatus::Active),
        subscriber("sam@example.com", SubscriberStatus::Bounced),
    ];
    db.upsert_subscribers(&batch).await.unwrap();

    assert_eq!(db.count_subscribers(None).await.unwrap(), 2);
    assert_eq!(
        db.get_subscriber("Sam@Example.com").await.unwrap().status,
        "active"
    );
}

#[tokio::test]
async fn subscriber_batch_is_written_together() {
    let db = test_db().await;
    let batch = [
        subscriber("a@example.com", SubscriberStatus::Active),
        subscriber("b@example.com", SubscriberStatus::Bounced),
        subscriber("c@example.com", SubscriberStatus::Unsubscribed),
    ];

    assert_eq!(db.upsert_subscribers(&batch).await.unwrap(), 3);
    assert_eq!(db.count_subscribers(None).await.unwrap(), 3);
    assert_eq!(db.count_subscribers(Some("active")).await.unwrap(), 1);
}

#[tokio::test]
async fn subscriber_batch_failure_rolls_back_everything() {
    let db = test_db().await;
    reject_subscriber(&db, "b@example.com").await;

    let batch = [
        subscriber("a@example.com", SubscriberStatus::Active),
        subscriber("b@example.com", SubscriberStatus::Active),
        subscriber("c@example.com", SubscriberStatus::Active),
    ];
    let err = db.upsert_subscribers(&batch).await.unwrap_err();
    assert!(matches!(err, DatabaseError::Query(_)));

    assert_eq!(db.count_subscribers(None).await.unwrap(), 0);
    assert!(db.get_subscriber("a@example.com").await.is_err());
}

#[tokio::test]
async fn empty_subscriber_batch_is_a_no_op() {
    let db = test_db().await;
    assert_eq!(db.upsert_subscribers(&[]).await.unwrap(), 0);
}

#[tokio::test]
async fn subscribers_list_newest_first() {
    let db = test_db().await;
    let mut old = subscriber("old@example.com", SubscriberStatus::Active);
    old.subscribed_at = 100;
    let mut new = subscriber("new@example.com", SubscriberStatus::Active);
    new.subscribed_at = 200;
    db.upsert_subscribers(&[old, new]).await.unwrap();

    let emails: Vec<String> = db
        .list_subscribers(10)
        .await
        .unwrap()
        .into_iter()
        .map(|s| s.email)
        .collect();
    assert_eq!(emails, ["new@example.com", "old@example.com"]);
}

// === Reporting tests ===

#[tokio::test]
async fn stats_on_empty_cache_are_zero() {
    let db = test_db().await;
    let stats = db.dashboard_stats().await.unwrap();

    assert_eq!(stats.total_campaigns, 0);
    assert_eq!(stats.total_emails_sent, 0);
    assert!(stats.average_open_rate.abs() < f64::EPSILON);
    assert!(stats.average_click_rate.abs() < f64::EPSILON);
}

#[tokio::test]
async fn stats_aggregate_campaigns_and_active_subscribers() {
    let db = test_db().await;
    db.upsert_campaign(&campaign("1", 1000, 400)).await.unwrap();
    db.upsert_campaign(&campaign("2", 1000, 100)).await.unwrap();
    sqlx::query("UPDATE campaigns SET clicked = 50, bounced = 20 WHERE id = '1'")
        .execute(db.pool())
        .await
        .unwrap();
    sqlx::query("UPDATE campaigns SET status = 'sending' WHERE id = '2'")
        .execute(db.pool())
        .await
        .unwrap();
    db.upsert_subscribers(&[
        subscriber("a@example.com", SubscriberStatus::Active),
        subscriber("b@example.com", SubscriberStatus::Bounced),
    ])
    .await
    .unwrap();

    let stats = db.dashboard_stats().await.unwrap();
    assert_eq!(stats.total_campaigns, 2);
    assert_eq!(stats.active_campaigns, 1);
    assert_eq!(stats.total_emails_sent, 2000);
    assert_eq!(stats.total_delivered, 1980);
    assert_eq!(stats.total_opened, 500);
    assert_eq!(stats.total_clicked, 50);
    assert_eq!(stats.total_bounced, 20);
    assert!((stats.average_open_rate - 25.0).abs() < 1e-9);
    assert!((stats.average_click_rate - 10.0).abs() < 1e-9);
    assert!((stats.average_delivery_rate - 99.0).abs() < 1e-9);
    assert!((stats.average_bounce_rate - 1.0).abs() < 1e-9);
    assert_eq!(stats.total_failed, 0);
    assert_eq!(stats.trends_vs_previous, Trends::default());
    assert_eq!(stats.total_subscribers, 1);
}

#[tokio::test]
async fn scheduled_campaigns_count_as_active() {
    let db = test_db().await;
    db.upsert_campaign(&campaign("1", 100, 0)).await.unwrap();
    db.upsert_campaign(&campaign("2", 100, 0)).await.unwrap();
    sqlx::query("UPDATE campaigns SET status = 'scheduled' WHERE id = '1'")
        .execute(db.pool())
        .await
        .unwrap();

    let stats = db.dashboard_stats().await.unwrap();
    assert_eq!(stats.active_campaigns, 1);
    assert_eq!(db.get_campaign("1").await.unwrap().status, "scheduled");
}

// === Sync run tests ===

#[tokio::test]
async fn run_lifecycle_is_guarded() {
    let db = test_db().await;
    let run = db.create_run("r1").await.unwrap();
    assert_eq!(run.status, "running");

    db.fail_run("r1", "boom").await.unwrap();
    let err = db.complete_run("r1", 5).await.unwrap_err();
    assert!(matches!(err, DatabaseError::InvalidState(_)));

    let run = db.get_run("r1").await.unwrap();
    assert_eq!(run.status, "failed");
    assert_eq!(run.error.as_deref(), Some("boom"));
    assert_eq!(run.records_processed, None);
}
