//! Payment dialog endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;

use super::error::ApiResult;
use crate::dialog::DialogView;
use crate::payment::TransactionKind;
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitRequest {
    #[serde(default)]
    pub payment_method_id: Option<String>,
}

/// POST /api/dialogs
pub async fn open_dialog(
    State(state): State<AppState>,
    Json(kind): Json<TransactionKind>,
) -> ApiResult<(StatusCode, Json<DialogView>)> {
    let view = state.dialogs.open(kind).await?;
    Ok((StatusCode::CREATED, Json(view)))
}

/// GET /api/dialogs/:id
pub async fn get_dialog(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<DialogView>> {
    Ok(Json(state.dialogs.get(id).await?))
}

/// POST /api/dialogs/:id/submit
///
/// Field errors are part of the returned view, not an error status.
pub async fn submit_dialog(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<SubmitRequest>,
) -> ApiResult<Json<DialogView>> {
    let view = state.dialogs.submit(id, request.payment_method_id).await?;
    Ok(Json(view))
}

/// DELETE /api/dialogs/:id
pub async fn close_dialog(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<DialogView>> {
    Ok(Json(state.dialogs.close(id).await?))
}

pub fn dialog_routes() -> Router<AppState> {
    Router::new()
        .route("/api/dialogs", post(open_dialog))
        .route("/api/dialogs/:id", get(get_dialog).delete(close_dialog))
        .route("/api/dialogs/:id/submit", post(submit_dialog))
}
