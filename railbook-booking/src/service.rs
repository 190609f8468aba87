use std::collections::HashSet;
use std::sync::Arc;

use chrono::{Duration, Utc};
use railbook_core::{
    Booking, BookingError, BookingStatus, Passenger, PaymentGateway, PaymentOutcome,
    PaymentSession, ReservationStore, Schedule, Seat,
};
use serde::Deserialize;
use tracing::{info, warn};
use uuid::Uuid;

/// Passenger data as submitted by the buyer, before seat assignment.
#[derive(Debug, Clone, Deserialize)]
pub struct PassengerSpec {
    pub name: String,
    pub identity_number: String,
}

/// Orchestrates the booking lifecycle over a [`ReservationStore`] and a
/// [`PaymentGateway`]. All timestamps are taken once per call so the
/// status check and the deadline comparison see the same instant.
pub struct BookingService {
    store: Arc<dyn ReservationStore>,
    gateway: Arc<dyn PaymentGateway>,
    hold_ttl: Duration,
}

impl BookingService {
    pub fn new(
        store: Arc<dyn ReservationStore>,
        gateway: Arc<dyn PaymentGateway>,
        hold_seconds: i64,
    ) -> Self {
        Self {
            store,
            gateway,
            hold_ttl: Duration::seconds(hold_seconds),
        }
    }

    pub async fn create_schedule(
        &self,
        schedule: Schedule,
        seats: Vec<Seat>,
    ) -> Result<Schedule, BookingError> {
        let out = schedule.clone();
        self.store.create_schedule(schedule, seats).await?;
        info!(schedule_id = %out.id, "schedule opened for sale");
        Ok(out)
    }

    pub async fn get_schedule(&self, id: Uuid) -> Result<Option<Schedule>, BookingError> {
        self.store.get_schedule(id).await
    }

    pub async fn list_schedules(&self) -> Result<Vec<Schedule>, BookingError> {
        self.store.list_schedules().await
    }

    /// Seat snapshot for browsing. Read-only: lapsed holds are presented
    /// as free by the caller via `Seat::effective_status`, never corrected
    /// here, so read traffic cannot contend with holds.
    pub async fn list_seats(&self, schedule_id: Uuid) -> Result<Vec<Seat>, BookingError> {
        if self.store.get_schedule(schedule_id).await?.is_none() {
            return Err(BookingError::ScheduleNotFound);
        }
        self.store.list_seats(schedule_id).await
    }

    pub async fn get_seat(&self, seat_id: Uuid) -> Result<Option<Seat>, BookingError> {
        self.store.get_seat(seat_id).await
    }

    /// Validate, price, hold, persist. On any hold failure the error is
    /// returned untouched and no booking exists; if persisting the booking
    /// fails the hold is compensated immediately instead of lingering for
    /// the full TTL.
    pub async fn create_booking(
        &self,
        schedule_id: Uuid,
        passengers: Vec<PassengerSpec>,
        seat_ids: Vec<Uuid>,
    ) -> Result<Booking, BookingError> {
        if passengers.is_empty() {
            return Err(BookingError::Validation(
                "at least one passenger is required".to_string(),
            ));
        }
        if passengers.len() != seat_ids.len() {
            return Err(BookingError::Validation(format!(
                "passenger count {} does not match seat count {}",
                passengers.len(),
                seat_ids.len()
            )));
        }
        let mut seen = HashSet::new();
        if !seat_ids.iter().all(|id| seen.insert(*id)) {
            return Err(BookingError::Validation(
                "seat ids must be distinct".to_string(),
            ));
        }

        let schedule = self
            .store
            .get_schedule(schedule_id)
            .await?
            .ok_or(BookingError::ScheduleNotFound)?;
        let total_price = schedule.base_fare * passengers.len() as i64;

        let booking_id = Uuid::new_v4();
        let now = Utc::now();
        let reserved_until = self
            .store
            .hold_seats(booking_id, schedule_id, &seat_ids, now, self.hold_ttl)
            .await?;

        let passengers = passengers
            .into_iter()
            .zip(seat_ids.iter())
            .map(|(spec, seat_id)| Passenger {
                name: spec.name,
                identity_number: spec.identity_number,
                seat_id: *seat_id,
            })
            .collect();
        let booking = Booking::new(
            booking_id,
            schedule_id,
            passengers,
            total_price,
            reserved_until,
            now,
        );

        if let Err(e) = self.store.insert_booking(&booking).await {
            if let Err(release_err) = self.store.release_seats(booking_id).await {
                warn!(booking_id = %booking_id, error = %release_err,
                    "failed to release hold after booking persist failure; sweeper will reclaim");
            }
            return Err(e);
        }

        info!(booking_id = %booking.id, seats = booking.seat_ids.len(),
            reserved_until = %booking.reserved_until, "booking created");
        Ok(booking)
    }

    pub async fn get_booking(&self, id: Uuid) -> Result<Booking, BookingError> {
        self.store
            .get_booking(id)
            .await?
            .ok_or(BookingError::NotFound)
    }

    pub async fn cancel_booking(&self, id: Uuid) -> Result<Booking, BookingError> {
        let booking = self.store.cancel_booking(id, Utc::now()).await?;
        info!(booking_id = %id, "booking cancelled");
        Ok(booking)
    }

    /// Idempotent payment confirmation; both the post-redirect client call
    /// and the provider webhook converge here.
    pub async fn mark_paid(&self, id: Uuid) -> Result<Booking, BookingError> {
        let booking = self.store.mark_paid(id, Utc::now()).await?;
        info!(booking_id = %id, "booking paid");
        Ok(booking)
    }

    /// Open a checkout session for a pending, unexpired booking.
    pub async fn initiate_payment(&self, booking_id: Uuid) -> Result<PaymentSession, BookingError> {
        let booking = self.get_booking(booking_id).await?;
        let now = Utc::now();
        match booking.status {
            BookingStatus::Pending if booking.reserved_until > now => {}
            BookingStatus::Pending => return Err(BookingError::BookingExpired),
            other => return Err(BookingError::TerminalState(other)),
        }

        let order_ref = format!("booking-{}-{}", booking.id.simple(), now.timestamp());
        let session = self
            .gateway
            .create_session(booking.id, &order_ref, booking.total_price)
            .await
            .map_err(|e| BookingError::Gateway(e.to_string()))?;
        self.store.insert_session(&session).await?;

        info!(booking_id = %booking_id, order_ref = %session.order_ref, "payment session opened");
        Ok(session)
    }

    /// Apply a verified settlement notification. Duplicates and
    /// out-of-order deliveries converge: a settled session is a success
    /// no-op, and a denied or expired payment records the outcome without
    /// touching the booking, which keeps its own TTL.
    pub async fn apply_settlement(
        &self,
        order_ref: &str,
        outcome: PaymentOutcome,
    ) -> Result<(), BookingError> {
        let session = self
            .store
            .find_session(order_ref)
            .await?
            .ok_or(BookingError::NotFound)?;

        match outcome {
            PaymentOutcome::Settled => {
                if session.outcome == PaymentOutcome::Settled {
                    info!(order_ref = %order_ref, "duplicate settlement ignored");
                    return Ok(());
                }
                self.store.mark_paid(session.booking_id, Utc::now()).await?;
                self.store
                    .set_session_outcome(order_ref, PaymentOutcome::Settled)
                    .await?;
                info!(order_ref = %order_ref, booking_id = %session.booking_id, "settlement applied");
            }
            PaymentOutcome::Denied | PaymentOutcome::Expired => {
                self.store.set_session_outcome(order_ref, outcome).await?;
                info!(order_ref = %order_ref, ?outcome, "payment did not settle; booking keeps its hold");
            }
            PaymentOutcome::Pending => {}
        }
        Ok(())
    }

    /// One sweeper pass; see [`crate::Sweeper`] for the periodic driver.
    pub async fn sweep_once(&self) -> Result<u64, BookingError> {
        self.store.sweep_expired(Utc::now()).await
    }
}
