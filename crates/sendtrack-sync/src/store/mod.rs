//! `SQLite` local cache for `SendTrack`.
//!
//! Holds the mirrored campaigns and subscribers plus the sync run history,
//! and answers the read-side reporting queries.

mod db;
mod queries;
mod queries_runs;

#[cfg(test)]
mod tests;

pub use db::{DatabaseError, LocalStore};
