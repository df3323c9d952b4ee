use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::Value;
use tokio::sync::Notify;
use tower::ServiceExt;

use sendtrack_server::{AppState, build_router};
use sendtrack_sync::remote::{RawCampaignRow, RawSubscriberRow};
use sendtrack_sync::testing::{StaticSource, campaign_row, subscriber_row};
use sendtrack_sync::{
    LocalStore, RemoteError, RemoteSource, RunStatus, SyncLimits, SyncService,
};

/// Serves `inner`, but holds every subscriber fetch until `gate` is notified.
struct GatedSource {
    inner: StaticSource,
    gate: Notify,
}

impl RemoteSource for GatedSource {
    async fn fetch_campaigns(&self, limit: u32) -> Result<Vec<RawCampaignRow>, RemoteError> {
        self.inner.fetch_campaigns(limit).await
    }

    async fn fetch_subscribers(&self, limit: u32) -> Result<Vec<RawSubscriberRow>, RemoteError> {
        self.gate.notified().await;
        self.inner.fetch_subscribers(limit).await
    }
}

async fn state(source: StaticSource) -> AppState<StaticSource> {
    let store = LocalStore::open_in_memory().await.unwrap();
    AppState::new(SyncService::new(source, store, SyncLimits::default()), 3600)
}

fn seeded_source() -> StaticSource {
    StaticSource::new(
        vec![
            campaign_row(11, "1000", "250"),
            campaign_row(10, "0", ""),
            campaign_row(9, "400", "a@x.com,b@x.com"),
        ],
        vec![
            subscriber_row("a@example.com", 0, 0),
            subscriber_row("b@example.com", 1, 0),
        ],
    )
}

/// Send a request to the app and return (status, parsed JSON body).
async fn send<R: RemoteSource + 'static>(
    state: &AppState<R>,
    method: &str,
    uri: &str,
) -> (StatusCode, Value) {
    let resp = build_router(state.clone())
        .oneshot(
            Request::builder()
                .method(method)
                .uri(uri)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let status = resp.status();
    let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&body).unwrap())
}

#[tokio::test]
async fn health_returns_ok() {
    let state = state(StaticSource::default()).await;
    let (status, body) = send(&state, "GET", "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn sync_returns_outcome() {
    let state = state(seeded_source()).await;
    let (status, body) = send(&state, "POST", "/api/sync").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["recordsProcessed"], 5);
    assert!(body["runId"].as_str().is_some_and(|id| !id.is_empty()));
}

#[tokio::test]
async fn sync_failure_returns_500_with_message() {
    let source = seeded_source();
    source
        .fail_subscribers(Some(RemoteError::Connection("connect ECONNREFUSED".into())))
        .await;
    let state = state(source).await;

    let (status, body) = send(&state, "POST", "/api/sync").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        body["error"],
        "Remote connection error: connect ECONNREFUSED"
    );

    // Campaigns from the first phase are still served.
    let (_, campaigns) = send(&state, "GET", "/api/campaigns").await;
    assert_eq!(campaigns.as_array().unwrap().len(), 3);

    let (_, runs) = send(&state, "GET", "/api/sync/runs").await;
    assert_eq!(runs[0]["status"], "failed");
    assert_eq!(runs[0]["health"], "failed");
}

#[tokio::test]
async fn sync_while_running_is_rejected() {
    let state = state(seeded_source()).await;
    let _held = state.sync_lock.lock().await;

    let (status, body) = send(&state, "POST", "/api/sync").await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"].as_str().unwrap().contains("already running"));

    let (_, runs) = send(&state, "GET", "/api/sync/runs").await;
    assert!(runs.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn campaigns_list_newest_first_with_open_rate() {
    let state = state(seeded_source()).await;
    send(&state, "POST", "/api/sync").await;

    let (status, body) = send(&state, "GET", "/api/campaigns").await;
    assert_eq!(status, StatusCode::OK);
    let campaigns = body.as_array().unwrap();
    let ids: Vec<_> = campaigns.iter().map(|c| c["id"].as_str().unwrap()).collect();
    assert_eq!(ids, ["11", "10", "9"]);
    assert_eq!(campaigns[0]["openRate"], 25.0);
    assert_eq!(campaigns[0]["totalRecipients"], 1000);
    assert_eq!(campaigns[0]["totalSent"], 1000);
    assert_eq!(campaigns[0]["totalOpened"], 250);
    assert_eq!(campaigns[0]["deliveryRate"], 100.0);
    assert_eq!(campaigns[0]["clickRate"], 0.0);
    assert!(campaigns[0]["createdAt"].as_i64().is_some_and(|t| t > 0));
    assert_eq!(campaigns[1]["openRate"], 0.0);
    assert_eq!(campaigns[2]["opened"], 2);
    assert_eq!(campaigns[0]["status"], "sent");

    let (_, limited) = send(&state, "GET", "/api/campaigns?limit=1").await;
    assert_eq!(limited.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn subscribers_are_listed() {
    let state = state(seeded_source()).await;
    send(&state, "POST", "/api/sync").await;

    let (status, body) = send(&state, "GET", "/api/subscribers").await;
    assert_eq!(status, StatusCode::OK);
    let subscribers = body.as_array().unwrap();
    assert_eq!(subscribers.len(), 2);
    let bounced = subscribers
        .iter()
        .find(|s| s["email"] == "b@example.com")
        .unwrap();
    assert_eq!(bounced["status"], "bounced");
    assert_eq!(bounced["listId"], "1");
}

#[tokio::test]
async fn stats_aggregate_the_cache() {
    let state = state(seeded_source()).await;

    let (status, empty) = send(&state, "GET", "/api/stats").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(empty["totalCampaigns"], 0);
    assert_eq!(empty["averageOpenRate"], 0.0);

    send(&state, "POST", "/api/sync").await;
    let (_, stats) = send(&state, "GET", "/api/stats").await;
    assert_eq!(stats["totalCampaigns"], 3);
    assert_eq!(stats["activeCampaigns"], 0);
    assert_eq!(stats["totalEmailsSent"], 1400);
    assert_eq!(stats["totalOpened"], 252);
    assert_eq!(stats["totalSubscribers"], 1);
    assert_eq!(stats["totalFailed"], 0);
    assert_eq!(stats["averageBounceRate"], 0.0);
    assert_eq!(stats["trendsVsPrevious"]["campaigns"], 0.0);
    assert_eq!(stats["trendsVsPrevious"]["clicked"], 0.0);
}

#[tokio::test]
async fn runs_report_health_newest_first() {
    let state = state(seeded_source()).await;
    send(&state, "POST", "/api/sync").await;
    state
        .service
        .remote()
        .fail_campaigns(Some(RemoteError::Query("syntax".into())))
        .await;
    send(&state, "POST", "/api/sync").await;

    let (status, runs) = send(&state, "GET", "/api/sync/runs").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(runs.as_array().unwrap().len(), 2);
    assert_eq!(runs[0]["health"], "failed");
    assert_eq!(runs[0]["error"], "Remote query error: syntax");
    assert_eq!(runs[1]["health"], "succeeded");
    assert_eq!(runs[1]["recordsProcessed"], 5);

    let (_, one) = send(&state, "GET", "/api/sync/runs?limit=1").await;
    assert_eq!(one.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn run_is_fetched_by_id() {
    let state = state(seeded_source()).await;
    let (_, outcome) = send(&state, "POST", "/api/sync").await;
    let run_id = outcome["runId"].as_str().unwrap();

    let (status, run) = send(&state, "GET", &format!("/api/sync/runs/{run_id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(run["id"], run_id);
    assert_eq!(run["health"], "succeeded");

    let (status, body) = send(&state, "GET", "/api/sync/runs/does-not-exist").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().unwrap().contains("does-not-exist"));
}

#[tokio::test]
async fn abandoned_request_still_finishes_the_run() {
    let store = LocalStore::open_in_memory().await.unwrap();
    let source = GatedSource {
        inner: seeded_source(),
        gate: Notify::new(),
    };
    let state = AppState::new(SyncService::new(source, store, SyncLimits::default()), 3600);

    let request = build_router(state.clone()).oneshot(
        Request::builder()
            .method("POST")
            .uri("/api/sync")
            .body(Body::empty())
            .unwrap(),
    );
    // The client gives up while the subscriber fetch is held.
    assert!(
        tokio::time::timeout(Duration::from_millis(200), request)
            .await
            .is_err()
    );
    assert!(state.sync_lock.try_lock().is_err(), "run should still hold the lock");

    state.service.remote().gate.notify_one();
    let _released = tokio::time::timeout(Duration::from_secs(5), state.sync_lock.lock())
        .await
        .unwrap();

    let run = state.service.tracker().latest_run().await.unwrap().unwrap();
    assert_eq!(run.run_status(), Some(RunStatus::Success));
    assert_eq!(run.records_processed, Some(5));
    assert_eq!(state.service.store().count_subscribers(None).await.unwrap(), 2);
}
