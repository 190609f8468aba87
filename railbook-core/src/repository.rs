use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::error::{BookingError, HoldError};
use crate::model::{Booking, Schedule, Seat};
use crate::payment::{PaymentOutcome, PaymentSession};

/// Storage seam for the reservation subsystem.
///
/// Every mutating operation is atomic: either all of its row transitions
/// commit or none do. Seat transitions are serialized per row (a single
/// lock in memory, `SELECT ... FOR UPDATE` in Postgres) so two concurrent
/// holders can never both succeed for the same seat.
///
/// Operations take `now` explicitly; the stored `reserved_until` compared
/// against it inside the same atomic step is the authoritative expiry
/// truth, not sweep timing.
#[async_trait]
pub trait ReservationStore: Send + Sync {
    // -- schedules & seat inventory (read path never mutates) --

    async fn create_schedule(
        &self,
        schedule: Schedule,
        seats: Vec<Seat>,
    ) -> Result<(), BookingError>;

    async fn get_schedule(&self, id: Uuid) -> Result<Option<Schedule>, BookingError>;

    async fn list_schedules(&self) -> Result<Vec<Schedule>, BookingError>;

    async fn list_seats(&self, schedule_id: Uuid) -> Result<Vec<Seat>, BookingError>;

    async fn get_seat(&self, seat_id: Uuid) -> Result<Option<Seat>, BookingError>;

    // -- reservation manager --

    /// All-or-nothing hold: every seat must be free or expired-held at
    /// evaluation time, and on success all transition together to held
    /// with the same `reserved_until = now + ttl`, which is returned.
    async fn hold_seats(
        &self,
        booking_id: Uuid,
        schedule_id: Uuid,
        seat_ids: &[Uuid],
        now: DateTime<Utc>,
        ttl: Duration,
    ) -> Result<DateTime<Utc>, HoldError>;

    /// Idempotent: frees seats still held by this booking, returning how
    /// many were released. Sold seats and seats held by others are left
    /// alone.
    async fn release_seats(&self, booking_id: Uuid) -> Result<u64, HoldError>;

    /// Held -> sold for every seat of this booking, only while the hold
    /// is owned and unexpired; otherwise `HoldExpired` with no mutation.
    async fn confirm_seats(&self, booking_id: Uuid, now: DateTime<Utc>) -> Result<u64, HoldError>;

    // -- booking aggregate --

    async fn insert_booking(&self, booking: &Booking) -> Result<(), BookingError>;

    async fn get_booking(&self, id: Uuid) -> Result<Option<Booking>, BookingError>;

    /// Pending -> paid, confirming the booking's seats in the same atomic
    /// decision. Idempotent from paid; `BookingExpired` once
    /// `reserved_until <= now` even if no sweep has run yet.
    async fn mark_paid(&self, id: Uuid, now: DateTime<Utc>) -> Result<Booking, BookingError>;

    /// Pending or paid -> cancelled, returning its seats to the pool.
    async fn cancel_booking(&self, id: Uuid, now: DateTime<Utc>) -> Result<Booking, BookingError>;

    /// One sweeper pass: expire every still-pending booking whose
    /// deadline has passed and release its seats. Returns the number of
    /// bookings expired. Safe to run concurrently with `mark_paid`.
    async fn sweep_expired(&self, now: DateTime<Utc>) -> Result<u64, BookingError>;

    // -- payment sessions --

    async fn insert_session(&self, session: &PaymentSession) -> Result<(), BookingError>;

    async fn find_session(&self, order_ref: &str) -> Result<Option<PaymentSession>, BookingError>;

    async fn set_session_outcome(
        &self,
        order_ref: &str,
        outcome: PaymentOutcome,
    ) -> Result<(), BookingError>;
}
