use axum::{
    extract::State,
    http::StatusCode,
    routing::post,
    Json, Router,
};
use railbook_booking::SettlementNotice;

use crate::error::AppError;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route("/v1/webhooks/payments", post(handle_payment_webhook))
}

/// Settlement notifications from the payment provider. Signature is
/// checked before anything else; unknown transaction statuses are
/// acknowledged without action so the provider stops retrying them.
async fn handle_payment_webhook(
    State(state): State<AppState>,
    Json(notice): Json<SettlementNotice>,
) -> Result<StatusCode, AppError> {
    if !notice.verify(&state.server_key) {
        tracing::warn!(order_ref = %notice.order_id, "webhook signature mismatch");
        return Ok(StatusCode::UNAUTHORIZED);
    }

    tracing::info!(
        order_ref = %notice.order_id,
        status = %notice.transaction_status,
        "payment notification received"
    );

    let Some(outcome) = notice.outcome() else {
        return Ok(StatusCode::OK);
    };

    state
        .service
        .apply_settlement(&notice.order_id, outcome)
        .await?;
    Ok(StatusCode::OK)
}
