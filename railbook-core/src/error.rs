use uuid::Uuid;

use crate::model::BookingStatus;

/// Failures of the seat-level check-and-set operations.
#[derive(Debug, thiserror::Error)]
pub enum HoldError {
    #[error("seat {0} is not available")]
    SeatUnavailable(Uuid),

    #[error("seat {0} does not exist on this schedule")]
    UnknownSeat(Uuid),

    #[error("hold has expired")]
    HoldExpired,

    #[error("storage backend failure: {0}")]
    Backend(String),
}

/// Failures of the booking lifecycle. Hold failures pass through
/// untouched so callers see the failing seat.
#[derive(Debug, thiserror::Error)]
pub enum BookingError {
    #[error("booking not found")]
    NotFound,

    #[error("schedule not found")]
    ScheduleNotFound,

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("booking hold expired before payment")]
    BookingExpired,

    #[error("booking is {0} and cannot transition")]
    TerminalState(BookingStatus),

    #[error(transparent)]
    Hold(#[from] HoldError),

    #[error("payment gateway failure: {0}")]
    Gateway(String),

    #[error("storage backend failure: {0}")]
    Backend(String),
}

/// Failures raised by the external payment provider adapter. These are
/// retryable from the client's point of view; no booking state changes
/// until a settlement notification arrives.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("payment provider unavailable: {0}")]
    Unavailable(String),

    #[error("payment provider rejected the request: {0}")]
    Rejected(String),
}
