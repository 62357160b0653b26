//! Return reconciliation endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::ApiResult;
use crate::returns::{ExpectedCopy, ReturnView, ScanOutcome};
use crate::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartReturnRequest {
    pub borrow_record_id: Uuid,
    pub copies: Vec<ExpectedCopy>,
}

#[derive(Debug, Deserialize)]
pub struct BarcodeRequest {
    pub barcode: String,
}

#[derive(Debug, Serialize)]
pub struct ScanResponse {
    pub scan: ScanOutcome,
    #[serde(rename = "return")]
    pub view: ReturnView,
}

/// POST /api/returns
pub async fn start_return(
    State(state): State<AppState>,
    Json(request): Json<StartReturnRequest>,
) -> ApiResult<(StatusCode, Json<ReturnView>)> {
    let view = state
        .returns
        .create(request.borrow_record_id, request.copies)
        .await?;
    Ok((StatusCode::CREATED, Json(view)))
}

/// GET /api/returns/:id
pub async fn get_return(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<ReturnView>> {
    Ok(Json(state.returns.get(id).await?))
}

/// POST /api/returns/:id/scan
pub async fn scan_barcode(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<BarcodeRequest>,
) -> ApiResult<Json<ScanResponse>> {
    let (scan, view) = state.returns.scan(id, &request.barcode).await?;
    Ok(Json(ScanResponse { scan, view }))
}

/// POST /api/returns/:id/lost
pub async fn mark_lost(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<BarcodeRequest>,
) -> ApiResult<Json<ReturnView>> {
    Ok(Json(state.returns.mark_lost(id, &request.barcode).await?))
}

/// DELETE /api/returns/:id
pub async fn close_return(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<ReturnView>> {
    Ok(Json(state.returns.close(id).await?))
}

pub fn return_routes() -> Router<AppState> {
    Router::new()
        .route("/api/returns", post(start_return))
        .route("/api/returns/:id", get(get_return).delete(close_return))
        .route("/api/returns/:id/scan", post(scan_barcode))
        .route("/api/returns/:id/lost", post(mark_lost))
}
