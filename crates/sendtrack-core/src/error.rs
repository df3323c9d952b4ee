//! Configuration and file errors for `SendTrack`.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    /// An environment override that does not parse as the field's type.
    #[error("Invalid value for {key}: {value:?}")]
    InvalidEnv { key: String, value: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
