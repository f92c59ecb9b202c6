use crate::error::{ServerError, ServerResult};
use crate::state::ServerState;
use analysis::{AnalysisQuery, UploadRequest};
use axum::extract::multipart::MultipartRejection;
use axum::extract::rejection::{PathRejection, QueryRejection};
use axum::extract::{Multipart, Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use bytes::Bytes;
use std::sync::Arc;
use std::time::Instant;

/// Header carrying the caller's numeric identity.
pub const USER_ID_HEADER: &str = "telegram-user-id";

/// Caller identity from the `Telegram-User-ID` header.
pub fn caller_id(headers: &HeaderMap) -> ServerResult<i64> {
    let raw = headers
        .get(USER_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ServerError::Unauthorized("Telegram-User-ID header is required".into()))?;

    raw.parse::<i64>().map_err(|_| {
        tracing::debug!(user_id = %raw, "invalid Telegram-User-ID header");
        ServerError::BadRequest("Invalid Telegram-User-ID format".into())
    })
}

/// List the caller's analyses
///
/// `GET /api/v1/analyses?limit=&offset=&product=&id=&sort_by=&sort_order=`
pub async fn list_analyses(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
    query: Result<Query<AnalysisQuery>, QueryRejection>,
) -> ServerResult<impl IntoResponse> {
    let user_id = caller_id(&headers)?;
    let Query(query) = query?;

    let page = state
        .service
        .catalog()
        .list_analyses(user_id, &query)
        .await?;
    Ok(Json(page))
}

/// Fetch one analysis by the engine-assigned identifier, with its objects
pub async fn get_analysis(
    State(state): State<Arc<ServerState>>,
    id: Result<Path<String>, PathRejection>,
) -> ServerResult<impl IntoResponse> {
    let Path(id) = id?;

    let analysis = state
        .service
        .catalog()
        .analysis(&id)
        .await?
        .ok_or_else(|| ServerError::NotFound(format!("analysis {id} not found")))?;
    Ok(Json(analysis))
}

/// Objects of one analysis, addressed by its internal numeric id
pub async fn get_analysis_objects(
    State(state): State<Arc<ServerState>>,
    id: Result<Path<String>, PathRejection>,
) -> ServerResult<impl IntoResponse> {
    let Path(id) = id?;

    tracing::debug!(internal_id = %id, "fetching objects for analysis");
    let objects = state.service.catalog().analysis_objects(&id).await?;
    Ok(Json(objects))
}

/// Upload an image for analysis
///
/// Multipart fields: `product`, `userID` (falls back to the
/// `Telegram-User-ID` header) and `file` or `files`. Replies `201` with the
/// analysis as read back from storage.
pub async fn upload_analysis(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
    multipart: Result<Multipart, MultipartRejection>,
) -> ServerResult<impl IntoResponse> {
    let start = Instant::now();
    let request = read_upload(multipart?, &headers).await?;

    let result = state.service.coordinator().ingest(request).await;

    let outcome = match &result {
        Ok(_) => "created",
        Err(err) => err.label(),
    };
    metrics::counter!("analysis_uploads_total", "outcome" => outcome).increment(1);
    metrics::histogram!("analysis_upload_duration_seconds").record(start.elapsed().as_secs_f64());

    let ingested = result?;
    Ok((StatusCode::CREATED, Json(ingested.analysis)))
}

async fn read_upload(mut multipart: Multipart, headers: &HeaderMap) -> ServerResult<UploadRequest> {
    let mut product = String::new();
    let mut user_id = None;
    let mut file_name = String::new();
    let mut content = Bytes::new();

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "product" => product = field.text().await?,
            "userID" => user_id = Some(field.text().await?),
            "file" | "files" => {
                file_name = field.file_name().unwrap_or("upload").to_string();
                content = field.bytes().await?;
            }
            other => tracing::debug!(field = %other, "ignoring unknown multipart field"),
        }
    }

    let user_id = match user_id.filter(|u| !u.trim().is_empty()) {
        Some(user_id) => user_id,
        None => headers
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string(),
    };

    Ok(UploadRequest {
        product,
        user_id,
        file_name,
        content,
    })
}
