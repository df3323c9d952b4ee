//! Database connection and initialization.

pub use sendtrack_core::db::DatabaseError;

sendtrack_core::define_database!(LocalStore, "Local cache migrations complete");
