//! API route handlers
//!
//! - `health`: liveness, readiness and Prometheus metrics
//! - `analyses`: listing, lookup and upload of analyses
//! - `objects`: bulk object measurement lookup

pub mod analyses;
pub mod health;
pub mod objects;

use crate::envelope::ChainFailure;
use axum::http::{Method, StatusCode, Uri};

/// 404 Not Found handler
///
/// Signals a chain failure; the envelope middleware renders it.
pub async fn not_found(method: Method, uri: Uri) -> ChainFailure {
    ChainFailure::status(
        StatusCode::NOT_FOUND,
        format!("Cannot {} {}", method, uri.path()),
    )
}
