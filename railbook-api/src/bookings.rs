use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use railbook_booking::PassengerSpec;
use railbook_core::Booking;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/bookings", post(create_booking))
        .route("/v1/bookings/{id}", get(get_booking).delete(cancel_booking))
        .route("/v1/bookings/{id}/pay", post(initiate_payment))
        .route("/v1/bookings/{id}/pay-success", put(confirm_payment))
}

#[derive(Debug, Deserialize)]
struct CreateBookingRequest {
    schedule_id: Uuid,
    passengers: Vec<PassengerSpec>,
    seat_ids: Vec<Uuid>,
}

async fn create_booking(
    State(state): State<AppState>,
    Json(req): Json<CreateBookingRequest>,
) -> Result<(StatusCode, Json<Booking>), AppError> {
    let booking = state
        .service
        .create_booking(req.schedule_id, req.passengers, req.seat_ids)
        .await?;
    Ok((StatusCode::CREATED, Json(booking)))
}

/// Clients poll this while the buyer sits on the payment page. Plain
/// re-read, no side effects.
async fn get_booking(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Booking>, AppError> {
    Ok(Json(state.service.get_booking(id).await?))
}

async fn cancel_booking(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Booking>, AppError> {
    Ok(Json(state.service.cancel_booking(id).await?))
}

#[derive(Debug, Serialize)]
struct PaymentResponse {
    order_ref: String,
    redirect_url: String,
    amount: i64,
}

async fn initiate_payment(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<PaymentResponse>, AppError> {
    let session = state.service.initiate_payment(id).await?;
    Ok(Json(PaymentResponse {
        order_ref: session.order_ref,
        redirect_url: session.redirect_url,
        amount: session.amount,
    }))
}

/// Post-redirect confirmation from the client. Same idempotent path as
/// the provider webhook; whichever arrives first wins, the other is a
/// success no-op.
async fn confirm_payment(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Booking>, AppError> {
    Ok(Json(state.service.mark_paid(id).await?))
}
