//! Logging setup for `SendTrack` binaries.

use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Filter from `RUST_LOG`, or `default_filter` when it is unset or invalid.
pub fn env_filter(default_filter: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter))
}

/// Install the global subscriber: plain text, or one JSON object per line
/// when `log_json` is set.
///
/// Calling this twice is harmless; the second call keeps the first
/// subscriber and logs nothing about it.
pub fn init_tracing(default_filter: &str, log_json: bool) {
    let registry = tracing_subscriber::registry().with(env_filter(default_filter));
    let installed = if log_json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_current_span(false))
            .try_init()
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_target(true))
            .try_init()
    };
    if installed.is_err() {
        tracing::debug!("Tracing subscriber already installed");
    }
}
