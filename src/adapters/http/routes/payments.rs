use axum::{Json, Router, extract::State, http::StatusCode, response::IntoResponse, routing::post};
use tracing::{info, warn};

use crate::{
    adapters::http::app_state::AppState,
    app_error::{AppError, AppResult},
    application::use_cases::payment_callback::PaymentCallback,
};

pub fn router() -> Router<AppState> {
    Router::new().route("/callback", post(handle_callback))
}

/// POST /api/payments/callback
///
/// Always answers 200 once the callback is applied, ignored as a replay or
/// queued for retry, so the gateway stops redelivering. Rejected callbacks
/// get a 4xx; failures that could not even be queued get a 5xx and are
/// redelivered by the gateway.
async fn handle_callback(
    State(app_state): State<AppState>,
    body: String,
) -> AppResult<impl IntoResponse> {
    let callback: PaymentCallback = serde_json::from_str(&body).map_err(|e| {
        warn!(error = %e, "Unreadable payment callback");
        AppError::Validation(format!("invalid callback payload: {}", e))
    })?;

    let result = app_state
        .callback_use_cases
        .ingest_callback(&callback)
        .await?;

    info!(
        payment_id = %result.payment_id,
        processed = result.processed,
        queued = result.queued,
        "Payment callback handled"
    );

    Ok((StatusCode::OK, Json(result)))
}
