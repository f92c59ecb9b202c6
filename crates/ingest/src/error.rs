//! Error types produced by the ingest crate.
//!
//! Every failure is scoped to one upload. The variants separate where a
//! failure happened so the HTTP layer can map each one to a distinct status:
//!
//! | Error | Category | HTTP |
//! |-------|----------|------|
//! | [`Validation`](IngestError::Validation) | caller input, no network call made | 400 |
//! | [`Rejected`](IngestError::Rejected) | engine declined the file | 400 |
//! | [`Transport`](IngestError::Transport) | engine unreachable or timed out | 502 |
//! | [`UpstreamProtocol`](IngestError::UpstreamProtocol) | engine replied with an unexpected shape | 502 |
//! | [`NotYetVisible`](IngestError::NotYetVisible) | accepted, record never appeared in storage | 503 |
//! | [`Fetch`](IngestError::Fetch) | accepted, storage failed while reading it back | 500 |
use store::StoreError;
use thiserror::Error;

/// Errors that can occur while forwarding an upload and reading back its result.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum IngestError {
    /// The upload failed local validation before any network call.
    #[error("invalid upload: {0}")]
    Validation(String),

    /// The analysis engine could not be reached, or the exchange did not
    /// complete within the client deadline.
    #[error("analysis engine unreachable: {0}")]
    Transport(String),

    /// The engine answered, but not with a shape this client understands.
    ///
    /// `status` is kept for logs only; it must not be echoed to clients as
    /// their own response status.
    #[error("analysis engine replied with status {status}: {message}")]
    UpstreamProtocol { status: u16, message: String },

    /// The engine explicitly declined the input.
    #[error("analysis engine rejected the upload: {0}")]
    Rejected(String),

    /// The engine accepted the upload but the record never became visible
    /// within the settle window.
    #[error("analysis {analysis_id} accepted but not yet visible in storage")]
    NotYetVisible { analysis_id: String },

    /// The engine accepted the upload but storage failed during read-back.
    #[error("analysis {analysis_id} accepted but could not be read back: {source}")]
    Fetch {
        analysis_id: String,
        #[source]
        source: StoreError,
    },
}

impl IngestError {
    /// True for failures attributed to the analysis engine rather than to the
    /// caller or to local storage.
    pub fn is_gateway(&self) -> bool {
        matches!(
            self,
            IngestError::Transport(_) | IngestError::UpstreamProtocol { .. }
        )
    }

    /// Short outcome name for metrics labels and log fields.
    pub fn label(&self) -> &'static str {
        match self {
            IngestError::Validation(_) => "invalid",
            IngestError::Rejected(_) => "rejected",
            IngestError::Transport(_) => "transport_error",
            IngestError::UpstreamProtocol { .. } => "upstream_error",
            IngestError::NotYetVisible { .. } => "not_visible",
            IngestError::Fetch { .. } => "fetch_error",
        }
    }

    /// Identifier the engine assigned, when the upload was accepted.
    pub fn accepted_id(&self) -> Option<&str> {
        match self {
            IngestError::NotYetVisible { analysis_id } | IngestError::Fetch { analysis_id, .. } => {
                Some(analysis_id)
            }
            _ => None,
        }
    }
}
