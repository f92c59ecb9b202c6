use analysis::{IngestError, StoreError};
use axum::extract::multipart::{MultipartError, MultipartRejection};
use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{json, Value};

pub type ServerResult<T> = Result<T, ServerError>;

/// Server error types
///
/// Rendered as `{"error": <message>, "details"?: <value>}` with the mapped
/// status; the envelope middleware turns that into the error envelope.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    PayloadTooLarge(String),

    #[error("{0}")]
    ServiceUnavailable(String),

    #[error("Ingest error: {0}")]
    Ingest(#[from] IngestError),

    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl ServerError {
    /// Get HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            ServerError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ServerError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ServerError::NotFound(_) => StatusCode::NOT_FOUND,
            ServerError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ServerError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ServerError::Ingest(err) => match err {
                IngestError::Validation(_) | IngestError::Rejected(_) => StatusCode::BAD_REQUEST,
                IngestError::Transport(_) | IngestError::UpstreamProtocol { .. } => {
                    StatusCode::BAD_GATEWAY
                }
                IngestError::NotYetVisible { .. } => StatusCode::SERVICE_UNAVAILABLE,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ServerError::Store(err) if err.is_client_error() => StatusCode::BAD_REQUEST,
            ServerError::Store(_) | ServerError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Client-facing message and optional details.
    ///
    /// Storage and internal failures never expose their inner text; engine
    /// messages are passed through since they are meant for the caller.
    fn public_body(&self) -> (String, Option<Value>) {
        match self {
            ServerError::BadRequest(msg)
            | ServerError::Unauthorized(msg)
            | ServerError::NotFound(msg)
            | ServerError::PayloadTooLarge(msg)
            | ServerError::ServiceUnavailable(msg) => (msg.clone(), None),
            ServerError::Ingest(err) => match err {
                IngestError::Validation(msg) | IngestError::Rejected(msg) => (msg.clone(), None),
                IngestError::Transport(_) => ("Analysis engine unavailable".into(), None),
                IngestError::UpstreamProtocol { message, .. } => (
                    "Analysis engine returned an invalid response".into(),
                    Some(message.trim())
                        .filter(|m| !m.is_empty())
                        .map(|m| Value::String(m.to_string())),
                ),
                IngestError::NotYetVisible { analysis_id } => (
                    "Analysis accepted but not yet visible".into(),
                    Some(json!({ "analysis_id": analysis_id })),
                ),
                IngestError::Fetch { analysis_id, .. } => (
                    "Analysis accepted but could not be read back".into(),
                    Some(json!({ "analysis_id": analysis_id })),
                ),
                _ => ("internal server error".into(), None),
            },
            ServerError::Store(err) if err.is_client_error() => (err.to_string(), None),
            ServerError::Store(_) | ServerError::Config(_) => {
                ("internal server error".into(), None)
            }
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(status = %status, error = %self, "request failed");
        } else {
            tracing::debug!(status = %status, error = %self, "request rejected");
        }

        let (message, details) = self.public_body();
        let body = match details {
            Some(details) => json!({ "error": message, "details": details }),
            None => json!({ "error": message }),
        };

        (status, Json(body)).into_response()
    }
}

impl From<JsonRejection> for ServerError {
    fn from(rejection: JsonRejection) -> Self {
        ServerError::BadRequest(format!("invalid request body: {}", rejection.body_text()))
    }
}

impl From<QueryRejection> for ServerError {
    fn from(rejection: QueryRejection) -> Self {
        ServerError::BadRequest(format!("invalid query params: {}", rejection.body_text()))
    }
}

impl From<PathRejection> for ServerError {
    fn from(rejection: PathRejection) -> Self {
        ServerError::BadRequest(format!("invalid path parameter: {}", rejection.body_text()))
    }
}

impl From<MultipartRejection> for ServerError {
    fn from(rejection: MultipartRejection) -> Self {
        ServerError::BadRequest(format!("invalid multipart form: {}", rejection.body_text()))
    }
}

impl From<MultipartError> for ServerError {
    fn from(err: MultipartError) -> Self {
        if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ServerError::PayloadTooLarge(err.body_text())
        } else {
            ServerError::BadRequest(format!("invalid multipart form: {}", err.body_text()))
        }
    }
}
