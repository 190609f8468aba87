use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use railbook_core::{BookingError, HoldError};
use serde_json::json;

/// Maps domain failures onto HTTP statuses with a JSON `{"error": ...}`
/// body. Backend failures are logged and masked.
#[derive(Debug)]
pub struct AppError(pub BookingError);

impl<E> From<E> for AppError
where
    E: Into<BookingError>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = match &self.0 {
            // Contested seats carry the offending seat id so the client
            // can highlight it.
            BookingError::Hold(HoldError::SeatUnavailable(seat_id)) => (
                StatusCode::CONFLICT,
                json!({ "error": self.0.to_string(), "seat_id": seat_id }),
            ),
            BookingError::NotFound
            | BookingError::ScheduleNotFound
            | BookingError::Hold(HoldError::UnknownSeat(_)) => {
                (StatusCode::NOT_FOUND, json!({ "error": self.0.to_string() }))
            }
            BookingError::Validation(_) => {
                (StatusCode::BAD_REQUEST, json!({ "error": self.0.to_string() }))
            }
            BookingError::BookingExpired | BookingError::Hold(HoldError::HoldExpired) => {
                (StatusCode::GONE, json!({ "error": self.0.to_string() }))
            }
            BookingError::TerminalState(_) => {
                (StatusCode::CONFLICT, json!({ "error": self.0.to_string() }))
            }
            BookingError::Gateway(msg) => {
                tracing::error!("payment gateway failure: {}", msg);
                (
                    StatusCode::BAD_GATEWAY,
                    json!({ "error": "payment gateway unavailable" }),
                )
            }
            BookingError::Hold(HoldError::Backend(msg)) | BookingError::Backend(msg) => {
                tracing::error!("storage failure: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "error": "internal server error" }),
                )
            }
        };

        (status, Json(body)).into_response()
    }
}
