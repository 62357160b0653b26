//! Session endpoints (login / token refresh / logout)

use axum::{extract::State, routing::put, Json, Router};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::error::{ApiError, ApiResult};
use crate::AppState;
use lms_common::LmsEvent;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRequest {
    pub access_token: String,
    #[serde(default)]
    pub user_id: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub authenticated: bool,
    pub user_id: Option<String>,
    /// Dialogs closed by a logout
    #[serde(skip_serializing_if = "Option::is_none")]
    pub closed_dialogs: Option<usize>,
}

/// PUT /api/session
pub async fn set_session(
    State(state): State<AppState>,
    Json(request): Json<SessionRequest>,
) -> ApiResult<Json<SessionResponse>> {
    let token = request.access_token.trim();
    if token.is_empty() {
        return Err(ApiError::BadRequest("accessToken must not be empty".to_string()));
    }

    state
        .session
        .login(token.to_string(), request.user_id.clone())
        .await;
    state.event_bus.emit_lossy(LmsEvent::SessionChanged {
        authenticated: true,
        timestamp: chrono::Utc::now(),
    });

    Ok(Json(SessionResponse {
        authenticated: true,
        user_id: request.user_id,
        closed_dialogs: None,
    }))
}

/// DELETE /api/session
///
/// Clears the token and closes every open dialog.
pub async fn clear_session(State(state): State<AppState>) -> Json<SessionResponse> {
    let closed = state.dialogs.close_all("logout").await;
    state.session.logout().await;
    info!(closed_dialogs = closed, "Logged out");

    state.event_bus.emit_lossy(LmsEvent::SessionChanged {
        authenticated: false,
        timestamp: chrono::Utc::now(),
    });

    Json(SessionResponse {
        authenticated: false,
        user_id: None,
        closed_dialogs: Some(closed),
    })
}

pub fn session_routes() -> Router<AppState> {
    Router::new().route("/api/session", put(set_session).delete(clear_session))
}
