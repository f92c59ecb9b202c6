//! Error types produced by the store crate.
//!
//! Every repository operation fails with a single [`StoreError`]; there are no
//! partial results. Callers at the HTTP boundary must not forward the inner
//! driver text to clients, only log it.

use thiserror::Error;

/// Errors surfaced by repository backends and the query layer.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StoreError {
    /// The backing database could not be reached or refused the connection.
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    /// A query was issued but failed (syntax, type mismatch, decode failure).
    #[error("storage query failed: {0}")]
    Query(String),

    /// A caller supplied an identifier that cannot address a stored record.
    #[error("invalid identifier: {0}")]
    InvalidId(String),
}

impl StoreError {
    /// Returns true if the failure originates from the caller's input rather
    /// than from the storage backend.
    pub fn is_client_error(&self) -> bool {
        matches!(self, StoreError::InvalidId(_))
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed => StoreError::Unavailable(err.to_string()),
            other => StoreError::Query(other.to_string()),
        }
    }
}
