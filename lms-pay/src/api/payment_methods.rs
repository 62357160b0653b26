//! Payment method listing

use axum::{extract::State, routing::get, Json, Router};

use super::error::ApiResult;
use crate::payment::{PaymentMethod, PaymentMethodSelector};
use crate::AppState;

/// GET /api/payment-methods
///
/// Active methods only.
pub async fn list_payment_methods(
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<PaymentMethod>>> {
    let selector = PaymentMethodSelector::load(&state.backend, &state.session).await?;
    Ok(Json(selector.methods().to_vec()))
}

pub fn payment_method_routes() -> Router<AppState> {
    Router::new().route("/api/payment-methods", get(list_payment_methods))
}
