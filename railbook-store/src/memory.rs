use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use railbook_core::{
    Booking, BookingError, BookingStatus, HoldError, PaymentOutcome, PaymentSession,
    ReservationStore, Schedule, Seat,
};
use railbook_inventory::SeatInventory;
use uuid::Uuid;

struct Inner {
    schedules: HashMap<Uuid, Schedule>,
    seats: SeatInventory,
    bookings: HashMap<Uuid, Booking>,
    sessions: HashMap<String, PaymentSession>,
}

/// Single-process store: one lock over all rows, so every trait operation
/// is one atomic step. Backs tests and no-database deployments; the
/// Postgres store provides the same contract across server instances.
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                schedules: HashMap::new(),
                seats: SeatInventory::new(),
                bookings: HashMap::new(),
                sessions: HashMap::new(),
            }),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        // A poisoned lock only means another thread panicked mid-test;
        // the data is still consistent because every mutation completes
        // before the guard drops.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ReservationStore for MemoryStore {
    async fn create_schedule(
        &self,
        schedule: Schedule,
        seats: Vec<Seat>,
    ) -> Result<(), BookingError> {
        let mut inner = self.lock();
        inner.seats.add_seats(seats);
        inner.schedules.insert(schedule.id, schedule);
        Ok(())
    }

    async fn get_schedule(&self, id: Uuid) -> Result<Option<Schedule>, BookingError> {
        Ok(self.lock().schedules.get(&id).cloned())
    }

    async fn list_schedules(&self) -> Result<Vec<Schedule>, BookingError> {
        let mut schedules: Vec<Schedule> = self.lock().schedules.values().cloned().collect();
        schedules.sort_by_key(|s| s.departs_at);
        Ok(schedules)
    }

    async fn list_seats(&self, schedule_id: Uuid) -> Result<Vec<Seat>, BookingError> {
        Ok(self.lock().seats.by_schedule(schedule_id))
    }

    async fn get_seat(&self, seat_id: Uuid) -> Result<Option<Seat>, BookingError> {
        Ok(self.lock().seats.seat(&seat_id).cloned())
    }

    async fn hold_seats(
        &self,
        booking_id: Uuid,
        schedule_id: Uuid,
        seat_ids: &[Uuid],
        now: DateTime<Utc>,
        ttl: Duration,
    ) -> Result<DateTime<Utc>, HoldError> {
        self.lock()
            .seats
            .hold(booking_id, schedule_id, seat_ids, now, now + ttl)
    }

    async fn release_seats(&self, booking_id: Uuid) -> Result<u64, HoldError> {
        Ok(self.lock().seats.release(booking_id))
    }

    async fn confirm_seats(&self, booking_id: Uuid, now: DateTime<Utc>) -> Result<u64, HoldError> {
        self.lock().seats.confirm(booking_id, now)
    }

    async fn insert_booking(&self, booking: &Booking) -> Result<(), BookingError> {
        self.lock().bookings.insert(booking.id, booking.clone());
        Ok(())
    }

    async fn get_booking(&self, id: Uuid) -> Result<Option<Booking>, BookingError> {
        Ok(self.lock().bookings.get(&id).cloned())
    }

    async fn mark_paid(&self, id: Uuid, now: DateTime<Utc>) -> Result<Booking, BookingError> {
        let mut inner = self.lock();
        let booking = inner.bookings.get(&id).ok_or(BookingError::NotFound)?;

        match booking.status {
            // Re-delivered settlement: success, no seat re-mutation.
            BookingStatus::Paid => return Ok(booking.clone()),
            BookingStatus::Cancelled | BookingStatus::Expired => {
                return Err(BookingError::TerminalState(booking.status))
            }
            BookingStatus::Pending => {}
        }

        // The stored deadline is authoritative even if no sweep ran yet.
        if booking.reserved_until <= now {
            return Err(BookingError::BookingExpired);
        }

        inner.seats.confirm(id, now).map_err(|e| match e {
            HoldError::HoldExpired => BookingError::BookingExpired,
            other => BookingError::Hold(other),
        })?;

        let booking = inner
            .bookings
            .get_mut(&id)
            .expect("checked above while the lock is held");
        booking.status = BookingStatus::Paid;
        Ok(booking.clone())
    }

    async fn cancel_booking(&self, id: Uuid, _now: DateTime<Utc>) -> Result<Booking, BookingError> {
        let mut inner = self.lock();
        let status = inner
            .bookings
            .get(&id)
            .ok_or(BookingError::NotFound)?
            .status;

        match status {
            BookingStatus::Pending | BookingStatus::Paid => {
                inner.seats.free_owned(id);
                let booking = inner
                    .bookings
                    .get_mut(&id)
                    .expect("checked above while the lock is held");
                booking.status = BookingStatus::Cancelled;
                Ok(booking.clone())
            }
            BookingStatus::Cancelled | BookingStatus::Expired => {
                Err(BookingError::TerminalState(status))
            }
        }
    }

    async fn sweep_expired(&self, now: DateTime<Utc>) -> Result<u64, BookingError> {
        let mut inner = self.lock();

        let lapsed: Vec<Uuid> = inner
            .bookings
            .values()
            .filter(|b| b.hold_lapsed(now))
            .map(|b| b.id)
            .collect();

        for id in &lapsed {
            inner.seats.release(*id);
            if let Some(booking) = inner.bookings.get_mut(id) {
                booking.status = BookingStatus::Expired;
            }
        }

        // Stray lapsed holds without a pending booking (e.g. a crashed
        // create flow) are reclaimed at the seat level too.
        inner.seats.sweep(now);

        Ok(lapsed.len() as u64)
    }

    async fn insert_session(&self, session: &PaymentSession) -> Result<(), BookingError> {
        self.lock()
            .sessions
            .insert(session.order_ref.clone(), session.clone());
        Ok(())
    }

    async fn find_session(&self, order_ref: &str) -> Result<Option<PaymentSession>, BookingError> {
        Ok(self.lock().sessions.get(order_ref).cloned())
    }

    async fn set_session_outcome(
        &self,
        order_ref: &str,
        outcome: PaymentOutcome,
    ) -> Result<(), BookingError> {
        let mut inner = self.lock();
        let session = inner
            .sessions
            .get_mut(order_ref)
            .ok_or(BookingError::NotFound)?;
        session.outcome = outcome;
        Ok(())
    }
}
