//! Persistence module for alert storage
//!
//! The pipeline treats the store as a black box: one synchronous commit
//! before notification is attempted. Implementations can use different
//! storage backends; SQLite is the default.

pub mod sqlite_store;

pub use sqlite_store::SqliteAlertStore;

use thiserror::Error;

use crate::models::{NewAlert, StoredAlert};

/// Errors that can occur during persistence operations
#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid data in database: {0}")]
    InvalidData(String),
}

/// Trait for alert persistence backends
pub trait AlertStore: Send + Sync {
    /// Store a new alert, committing before returning.
    fn create_alert(&self, alert: &NewAlert) -> Result<StoredAlert, PersistenceError>;

    /// Best-effort secondary record when pipeline processing fails, so
    /// the original signal is not silently lost.
    fn create_processing_error(
        &self,
        source_ip: &str,
        error: &str,
        original_payload: &serde_json::Value,
    ) -> Result<(), PersistenceError>;

    /// Most recent alerts, newest first.
    fn recent_alerts(&self, limit: usize) -> Result<Vec<StoredAlert>, PersistenceError>;

    /// Clear all data (useful for testing)
    fn clear_all(&self) -> Result<(), PersistenceError>;
}
