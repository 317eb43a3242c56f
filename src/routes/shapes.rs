//! Shape storage routes: room history, drag commits, erases.
//!
//! These only touch storage. Telling the room about an update or delete is
//! the client's job once the call succeeds, over its websocket.

#[cfg(test)]
#[path = "shapes_test.rs"]
mod shapes_test;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use serde::Deserialize;
use tracing::{error, info};
use wire::{HistoryResponse, UpdateShapeBody};

use crate::config::clamp_history_limit;
use crate::error::ApiError;
use crate::routes::auth::AuthUser;
use crate::services::shapes::{ShapeError, check_id};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<i64>,
}

/// `GET /chats/{room_id}?limit=N`: stored shapes, newest first.
pub async fn history(
    State(state): State<AppState>,
    AuthUser(_participant): AuthUser,
    Path(room_id): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<HistoryResponse>, ApiError> {
    let limit = clamp_history_limit(query.limit.unwrap_or(state.config.history_limit));
    let messages = state.shapes.list(&room_id, limit).await.map_err(shape_error_to_api)?;
    Ok(Json(HistoryResponse { messages }))
}

/// `PUT /shapes/{room_id}/{shape_id}`: replace a shape's geometry.
pub async fn update_shape(
    State(state): State<AppState>,
    AuthUser(participant): AuthUser,
    Path((room_id, shape_id)): Path<(String, i64)>,
    Json(body): Json<UpdateShapeBody>,
) -> Result<StatusCode, ApiError> {
    let shape_id = check_id(shape_id).map_err(shape_error_to_api)?;
    state
        .shapes
        .update(&room_id, shape_id, &body.shape)
        .await
        .map_err(shape_error_to_api)?;
    info!(%room_id, shape_id, user_id = %participant.id, "shape updated");
    Ok(StatusCode::NO_CONTENT)
}

/// `DELETE /shapes/{room_id}/{shape_id}`
pub async fn delete_shape(
    State(state): State<AppState>,
    AuthUser(participant): AuthUser,
    Path((room_id, shape_id)): Path<(String, i64)>,
) -> Result<StatusCode, ApiError> {
    let shape_id = check_id(shape_id).map_err(shape_error_to_api)?;
    state.shapes.delete(&room_id, shape_id).await.map_err(shape_error_to_api)?;
    info!(%room_id, shape_id, user_id = %participant.id, "shape deleted");
    Ok(StatusCode::NO_CONTENT)
}

pub(crate) fn shape_error_to_api(err: ShapeError) -> ApiError {
    let status = match &err {
        ShapeError::NotFound { .. } => StatusCode::NOT_FOUND,
        ShapeError::InvalidId(_) | ShapeError::Codec(_) => StatusCode::BAD_REQUEST,
        ShapeError::Database(e) => {
            error!(error = %e, "shape storage failed");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    ApiError::from_error(status, &err)
}
