//! `SendTrack` Server
//!
//! HTTP surface over the sync engine: a manual sync trigger, an optional
//! polling scheduler and read-only dashboard endpoints backed by the local
//! cache.

pub mod error;
pub mod routes;
pub mod scheduler;

pub use error::AppError;
pub use routes::{AppState, build_router};
