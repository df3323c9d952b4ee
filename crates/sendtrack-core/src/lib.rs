//! `SendTrack` Core Library
//!
//! Shared functionality for `SendTrack` components:
//! - Configuration resolution and hierarchy
//! - Local `SQLite` pool helpers and database errors
//! - Tracing initialisation
//! - Common error types

pub mod config;
pub mod db;
pub mod error;
pub mod tracing_init;

pub use config::Config;
pub use error::{Error, Result};
