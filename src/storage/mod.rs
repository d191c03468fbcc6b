//! Implementations of the notification store.
//!
//! The [`crate::core::NotificationStore`] trait is the seam between the
//! delivery subsystem and the relational rows it reads and writes. `PgStore`
//! is the production implementation; `MemoryStore` backs the test suites
//! without a database.

pub mod postgres;

#[cfg(any(test, feature = "test-utils"))]
pub mod memory;

use thiserror::Error;

pub use postgres::PgStore;

#[cfg(any(test, feature = "test-utils"))]
pub use memory::MemoryStore;

/// Errors surfaced by the notification store.
///
/// A store failure is isolated to the current job tick or the current
/// recipient; callers aggregate rather than abort.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("store query failed: {0}")]
    Query(String),

    #[error("row not found")]
    NotFound,
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => StoreError::NotFound,
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                StoreError::Unavailable(err.to_string())
            }
            other => StoreError::Query(other.to_string()),
        }
    }
}
