use crate::error::ServerResult;
use crate::state::ServerState;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Bulk object lookup request
#[derive(Debug, Deserialize, Serialize)]
pub struct ObjectsRequest {
    pub objects: Vec<i32>,
}

/// Measurements for a list of object ids
///
/// `POST /api/v1/objects` with `{"objects": [1, 2, 3]}`. Unknown ids are
/// skipped; an empty list returns an empty array.
pub async fn get_objects(
    State(state): State<Arc<ServerState>>,
    payload: Result<Json<ObjectsRequest>, JsonRejection>,
) -> ServerResult<impl IntoResponse> {
    let Json(request) = payload?;
    let objects = state.service.catalog().objects(&request.objects).await?;
    Ok(Json(objects))
}
