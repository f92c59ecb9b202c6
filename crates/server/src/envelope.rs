//! Response envelope middleware
//!
//! Every JSON response leaving the server has one of two shapes:
//!
//! ```json
//! {"success": true,  "result": <any>}
//! {"success": false, "error": {"code": 404, "message": "...", "details": <any>, "path": "/api/v1/..."}}
//! ```
//!
//! [`normalize`] wraps the whole handler chain and rewrites whatever it
//! produced into one of them. Responses with a declared non-JSON content type
//! (metrics text, downloads) pass through untouched, as do redirects and
//! `204 No Content`.
//!
//! Failures that never produced a body of their own (unknown routes, panics)
//! travel as a [`ChainFailure`] response extension.

use std::any::Any;

use axum::body::{to_bytes, Body, HttpBody};
use axum::extract::Request;
use axum::http::header::{CONTENT_LENGTH, CONTENT_TYPE};
use axum::http::response::Parts;
use axum::http::{HeaderValue, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use serde_json::{json, Value};

/// A failure signalled by the chain instead of a handler-written body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainFailure {
    /// A known status with a message meant for the client.
    Status { status: StatusCode, message: String },
    /// Anything else. The text is only ever used as `details`.
    Unhandled(String),
}

impl ChainFailure {
    pub fn status(status: StatusCode, message: impl Into<String>) -> Self {
        ChainFailure::Status {
            status,
            message: message.into(),
        }
    }
}

impl IntoResponse for ChainFailure {
    fn into_response(self) -> Response {
        let status = match &self {
            ChainFailure::Status { status, .. } => *status,
            ChainFailure::Unhandled(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let mut response = status.into_response();
        response.extensions_mut().insert(self);
        response
    }
}

/// The two response shapes.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseEnvelope {
    Success {
        result: Value,
    },
    Error {
        code: StatusCode,
        message: String,
        details: Option<Value>,
        path: String,
    },
}

impl ResponseEnvelope {
    fn error(code: StatusCode, message: impl Into<String>, details: Option<Value>, path: &str) -> Self {
        ResponseEnvelope::Error {
            code,
            message: message.into(),
            details,
            path: path.to_string(),
        }
    }

    fn status(&self, original: StatusCode) -> StatusCode {
        match self {
            ResponseEnvelope::Success { .. } => original,
            ResponseEnvelope::Error { code, .. } => *code,
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            ResponseEnvelope::Success { result } => json!({ "success": true, "result": result }),
            ResponseEnvelope::Error {
                code,
                message,
                details,
                path,
            } => {
                let mut error = json!({
                    "code": code.as_u16(),
                    "message": message,
                    "path": path,
                });
                if let Some(details) = details {
                    error["details"] = details.clone();
                }
                json!({ "success": false, "error": error })
            }
        }
    }
}

/// Shape a handler writes for errors, recovered best-effort from the body.
/// Either field may be missing.
#[derive(Debug, Default, Deserialize)]
struct HandlerError {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    details: Option<Value>,
}

/// Envelope middleware. Install with `axum::middleware::from_fn(normalize)`.
pub async fn normalize(request: Request, next: Next) -> Response {
    let path = request.uri().path().to_owned();
    let response = next.run(request).await;

    if let Some(failure) = response.extensions().get::<ChainFailure>().cloned() {
        return from_chain_failure(response, failure, &path);
    }

    let status = response.status();
    if !status.is_success() && !status.is_client_error() && !status.is_server_error() {
        return response;
    }
    if !is_json_candidate(&response) {
        return response;
    }
    if status == StatusCode::NO_CONTENT {
        let (mut parts, _) = response.into_parts();
        parts.headers.remove(CONTENT_TYPE);
        parts.headers.remove(CONTENT_LENGTH);
        return Response::from_parts(parts, Body::empty());
    }

    let (parts, body) = response.into_parts();
    let bytes = match to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(err) => {
            tracing::error!(path = %path, error = %err, "failed to read handler response");
            let envelope = ResponseEnvelope::error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to process server response",
                Some(Value::String("Failed to read handler response".into())),
                &path,
            );
            return render(parts, envelope);
        }
    };

    let envelope = if status.is_success() {
        success_envelope(&bytes, &path)
    } else {
        error_envelope(status, &bytes, &path)
    };
    render(parts, envelope)
}

/// Declared JSON, or nothing declared and nothing written.
fn is_json_candidate(response: &Response) -> bool {
    match response.headers().get(CONTENT_TYPE) {
        Some(value) => value
            .to_str()
            .map(|ct| {
                let mime = ct.split(';').next().unwrap_or_default().trim();
                mime.eq_ignore_ascii_case("application/json") || mime.ends_with("+json")
            })
            .unwrap_or(false),
        None => response.body().size_hint().exact() == Some(0),
    }
}

fn success_envelope(bytes: &[u8], path: &str) -> ResponseEnvelope {
    if bytes.is_empty() {
        return ResponseEnvelope::Success {
            result: Value::Null,
        };
    }
    match serde_json::from_slice::<Value>(bytes) {
        Ok(result) => ResponseEnvelope::Success { result },
        Err(err) => {
            tracing::error!(path = %path, error = %err, "handler returned invalid JSON");
            ResponseEnvelope::error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to process server response",
                Some(Value::String("Handler returned invalid JSON".into())),
                path,
            )
        }
    }
}

fn error_envelope(status: StatusCode, bytes: &[u8], path: &str) -> ResponseEnvelope {
    let HandlerError { error, details } =
        serde_json::from_slice::<HandlerError>(bytes).unwrap_or_default();

    match error.filter(|e| !e.trim().is_empty()) {
        Some(message) => ResponseEnvelope::error(status, message, details, path),
        None => {
            let message = status.canonical_reason().unwrap_or("Unknown Error");
            let details = details.or_else(|| {
                (!bytes.is_empty())
                    .then(|| Value::String(String::from_utf8_lossy(bytes).into_owned()))
            });
            ResponseEnvelope::error(status, message, details, path)
        }
    }
}

fn from_chain_failure(response: Response, failure: ChainFailure, path: &str) -> Response {
    let (parts, _) = response.into_parts();
    let envelope = match failure {
        ChainFailure::Status { status, message } => {
            if status == StatusCode::NOT_FOUND {
                tracing::debug!(status = status.as_u16(), path = %path, "route not found");
            } else {
                tracing::warn!(status = status.as_u16(), path = %path, message = %message, "request failed in chain");
            }
            ResponseEnvelope::error(status, message, None, path)
        }
        ChainFailure::Unhandled(cause) => {
            tracing::error!(path = %path, error = %cause, "unhandled failure in handler chain");
            ResponseEnvelope::error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal Server Error",
                Some(Value::String(cause)),
                path,
            )
        }
    };
    render(parts, envelope)
}

fn render(mut parts: Parts, envelope: ResponseEnvelope) -> Response {
    parts.status = envelope.status(parts.status);
    parts.headers.remove(CONTENT_LENGTH);
    parts
        .headers
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    parts.extensions.remove::<ChainFailure>();
    Response::from_parts(parts, Body::from(envelope.to_json().to_string()))
}

/// `CatchPanicLayer` handler: turn a panic payload into an unhandled chain failure.
pub fn panic_response(payload: Box<dyn Any + Send + 'static>) -> Response {
    let cause = if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else {
        "handler panicked".to_string()
    };
    ChainFailure::Unhandled(cause).into_response()
}
