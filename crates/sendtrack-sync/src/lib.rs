//! `SendTrack` Sync Engine
//!
//! Mirrors a remote Sendy database into the local `SQLite` cache:
//! - Remote reader over a bounded `MySQL` pool
//! - Pure field mapping from loosely-typed remote rows
//! - Local store with keyed upserts and transactional batches
//! - Run tracking and the sync orchestrator

pub mod mapper;
pub mod models;
pub mod remote;
pub mod service;
pub mod store;
#[cfg(any(test, feature = "test-utils"))]
pub mod testing;
pub mod tracker;

pub use models::{
    Campaign, CampaignRecord, CampaignStatus, DashboardStats, RunHealth, RunStatus, Subscriber,
    SubscriberRecord, SubscriberStatus, SyncRun, Trends,
};
pub use remote::{MySqlSource, RawValue, RemoteError, RemoteSource};
pub use service::{SyncError, SyncLimits, SyncOutcome, SyncService};
pub use store::{DatabaseError, LocalStore};
pub use tracker::{RunOutcome, RunTracker};
