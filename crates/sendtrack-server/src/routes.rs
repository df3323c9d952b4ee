use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use sendtrack_core::db::unix_timestamp;
use sendtrack_sync::{
    Campaign, DashboardStats, RemoteSource, RunHealth, Subscriber, SyncOutcome, SyncRun,
    SyncService,
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio::sync::Mutex;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::error::AppError;

const DEFAULT_CAMPAIGN_PAGE: u32 = 20;
const DEFAULT_SUBSCRIBER_PAGE: u32 = 100;
const DEFAULT_RUN_PAGE: u32 = 20;
const MAX_PAGE: u32 = 1000;

/// Shared application state.
pub struct AppState<R> {
    pub service: Arc<SyncService<R>>,
    /// Held for the duration of a sync; at most one run is in flight.
    pub sync_lock: Arc<Mutex<()>>,
    pub stale_after_secs: u64,
}

impl<R> Clone for AppState<R> {
    fn clone(&self) -> Self {
        Self {
            service: Arc::clone(&self.service),
            sync_lock: Arc::clone(&self.sync_lock),
            stale_after_secs: self.stale_after_secs,
        }
    }
}

impl<R: RemoteSource> AppState<R> {
    pub fn new(service: SyncService<R>, stale_after_secs: u64) -> Self {
        Self {
            service: Arc::new(service),
            sync_lock: Arc::new(Mutex::new(())),
            stale_after_secs,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct PageParams {
    pub limit: Option<u32>,
}

impl PageParams {
    fn limit_or(&self, default: u32) -> u32 {
        self.limit.unwrap_or(default).clamp(1, MAX_PAGE)
    }
}

/// A campaign with the dashboard's derived figures.
///
/// `totalRecipients` and `totalSent` are both the recipient count; the cache
/// does not tell queued from sent.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CampaignView {
    #[serde(flatten)]
    pub campaign: Campaign,
    pub total_recipients: i64,
    pub total_sent: i64,
    pub total_opened: i64,
    pub delivery_rate: f64,
    pub open_rate: f64,
    pub click_rate: f64,
}

impl From<Campaign> for CampaignView {
    fn from(campaign: Campaign) -> Self {
        Self {
            total_recipients: campaign.recipients,
            total_sent: campaign.recipients,
            total_opened: campaign.opened,
            delivery_rate: campaign.delivery_rate(),
            open_rate: campaign.open_rate(),
            click_rate: campaign.click_rate(),
            campaign,
        }
    }
}

/// A run with its health as of the request.
#[derive(Debug, Serialize)]
pub struct RunView {
    #[serde(flatten)]
    pub run: SyncRun,
    pub health: RunHealth,
}

/// `POST /api/sync`: run one sync now.
///
/// The run executes on its own task holding the lock, so a client that
/// disconnects does not cancel it halfway.
pub async fn trigger_sync<R: RemoteSource + 'static>(
    State(state): State<AppState<R>>,
) -> Result<Json<SyncOutcome>, AppError> {
    let Ok(guard) = Arc::clone(&state.sync_lock).try_lock_owned() else {
        return Err(AppError::Conflict("A sync is already running".to_string()));
    };
    info!("Sync triggered over HTTP");

    let service = Arc::clone(&state.service);
    let outcome = tokio::spawn(async move {
        let _guard = guard;
        service.run_sync().await
    })
    .await
    .map_err(|e| AppError::Internal(format!("Sync task failed: {e}")))??;
    Ok(Json(outcome))
}

/// `GET /api/sync/runs`
pub async fn list_runs<R: RemoteSource + 'static>(
    State(state): State<AppState<R>>,
    Query(params): Query<PageParams>,
) -> Result<Json<Vec<RunView>>, AppError> {
    let now = unix_timestamp();
    let runs = state
        .service
        .tracker()
        .recent_runs(params.limit_or(DEFAULT_RUN_PAGE))
        .await?
        .into_iter()
        .map(|run| RunView {
            health: run.health(now, state.stale_after_secs),
            run,
        })
        .collect();
    Ok(Json(runs))
}

/// `GET /api/sync/runs/{id}`
pub async fn get_run<R: RemoteSource + 'static>(
    State(state): State<AppState<R>>,
    Path(id): Path<String>,
) -> Result<Json<RunView>, AppError> {
    let run = state.service.tracker().get_run(&id).await?;
    Ok(Json(RunView {
        health: run.health(unix_timestamp(), state.stale_after_secs),
        run,
    }))
}

/// `GET /api/stats`
pub async fn stats<R: RemoteSource + 'static>(
    State(state): State<AppState<R>>,
) -> Result<Json<DashboardStats>, AppError> {
    Ok(Json(state.service.store().dashboard_stats().await?))
}

/// `GET /api/campaigns`
pub async fn list_campaigns<R: RemoteSource + 'static>(
    State(state): State<AppState<R>>,
    Query(params): Query<PageParams>,
) -> Result<Json<Vec<CampaignView>>, AppError> {
    let campaigns = state
        .service
        .store()
        .list_campaigns(params.limit_or(DEFAULT_CAMPAIGN_PAGE))
        .await?
        .into_iter()
        .map(CampaignView::from)
        .collect();
    Ok(Json(campaigns))
}

/// `GET /api/subscribers`
pub async fn list_subscribers<R: RemoteSource + 'static>(
    State(state): State<AppState<R>>,
    Query(params): Query<PageParams>,
) -> Result<Json<Vec<Subscriber>>, AppError> {
    let subscribers = state
        .service
        .store()
        .list_subscribers(params.limit_or(DEFAULT_SUBSCRIBER_PAGE))
        .await?;
    Ok(Json(subscribers))
}

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// Build the application router.
pub fn build_router<R: RemoteSource + 'static>(state: AppState<R>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/sync", post(trigger_sync::<R>))
        .route("/api/sync/runs", get(list_runs::<R>))
        .route("/api/sync/runs/{id}", get(get_run::<R>))
        .route("/api/stats", get(stats::<R>))
        .route("/api/campaigns", get(list_campaigns::<R>))
        .route("/api/subscribers", get(list_subscribers::<R>))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
