use std::collections::HashMap;

use chrono::{DateTime, Utc};
use railbook_core::{HoldError, Seat, SeatStatus};
use uuid::Uuid;

/// Seat rows keyed by seat id, with all hold/confirm/release transitions.
///
/// The struct itself is single-threaded; callers (the in-memory store)
/// wrap it in a lock so every check-and-set below runs serialized, which
/// is what makes the all-or-nothing hold contract airtight.
pub struct SeatInventory {
    seats: HashMap<Uuid, Seat>,
}

impl SeatInventory {
    pub fn new() -> Self {
        Self {
            seats: HashMap::new(),
        }
    }

    /// Register the seats of a newly created schedule.
    pub fn add_seats(&mut self, seats: Vec<Seat>) {
        for seat in seats {
            self.seats.insert(seat.id, seat);
        }
    }

    pub fn seat(&self, id: &Uuid) -> Option<&Seat> {
        self.seats.get(id)
    }

    /// Snapshot of one schedule's seats, ordered by carriage then code.
    pub fn by_schedule(&self, schedule_id: Uuid) -> Vec<Seat> {
        let mut rows: Vec<Seat> = self
            .seats
            .values()
            .filter(|s| s.schedule_id == schedule_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| (&a.carriage, &a.code).cmp(&(&b.carriage, &b.code)));
        rows
    }

    /// All-or-nothing hold. Validates every requested seat before any
    /// mutation: each must exist, belong to the schedule, and be free or
    /// carry a lapsed hold. On the first failing seat nothing is touched.
    pub fn hold(
        &mut self,
        booking_id: Uuid,
        schedule_id: Uuid,
        seat_ids: &[Uuid],
        now: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<DateTime<Utc>, HoldError> {
        for seat_id in seat_ids {
            let seat = self
                .seats
                .get(seat_id)
                .filter(|s| s.schedule_id == schedule_id)
                .ok_or(HoldError::UnknownSeat(*seat_id))?;
            if !seat.claimable(now) {
                return Err(HoldError::SeatUnavailable(*seat_id));
            }
        }

        for seat_id in seat_ids {
            // Presence was checked above.
            if let Some(seat) = self.seats.get_mut(seat_id) {
                seat.status = SeatStatus::Held;
                seat.held_by = Some(booking_id);
                seat.reserved_until = Some(until);
            }
        }

        Ok(until)
    }

    /// Free every seat still held by this booking. Idempotent; sold seats
    /// and seats meanwhile re-held by another booking are untouched.
    pub fn release(&mut self, booking_id: Uuid) -> u64 {
        let mut released = 0;
        for seat in self.seats.values_mut() {
            if seat.status == SeatStatus::Held && seat.held_by == Some(booking_id) {
                seat.status = SeatStatus::Free;
                seat.held_by = None;
                seat.reserved_until = None;
                released += 1;
            }
        }
        released
    }

    /// Held -> sold for the booking's seats, only while the hold is owned
    /// and unexpired. A lapsed or already-swept hold fails with
    /// `HoldExpired` and mutates nothing; the seats may have been resold.
    pub fn confirm(&mut self, booking_id: Uuid, now: DateTime<Utc>) -> Result<u64, HoldError> {
        let owned: Vec<Uuid> = self
            .seats
            .values()
            .filter(|s| s.status == SeatStatus::Held && s.held_by == Some(booking_id))
            .map(|s| s.id)
            .collect();

        if owned.is_empty() {
            return Err(HoldError::HoldExpired);
        }
        for id in &owned {
            if self.seats[id].hold_lapsed(now) {
                return Err(HoldError::HoldExpired);
            }
        }

        for id in &owned {
            if let Some(seat) = self.seats.get_mut(id) {
                seat.status = SeatStatus::Sold;
                seat.reserved_until = None;
            }
        }

        Ok(owned.len() as u64)
    }

    /// Return every seat owned by this booking to the pool, held or sold.
    /// Used by the cancellation path.
    pub fn free_owned(&mut self, booking_id: Uuid) -> u64 {
        let mut freed = 0;
        for seat in self.seats.values_mut() {
            if seat.held_by == Some(booking_id) && seat.status != SeatStatus::Free {
                seat.status = SeatStatus::Free;
                seat.held_by = None;
                seat.reserved_until = None;
                freed += 1;
            }
        }
        freed
    }

    /// Write-time correction for lapsed holds: the sweeper's seat-level
    /// pass. Returns how many seats were reclaimed.
    pub fn sweep(&mut self, now: DateTime<Utc>) -> u64 {
        let mut reclaimed = 0;
        for seat in self.seats.values_mut() {
            if seat.hold_lapsed(now) {
                seat.status = SeatStatus::Free;
                seat.held_by = None;
                seat.reserved_until = None;
                reclaimed += 1;
            }
        }
        reclaimed
    }
}

impl Default for SeatInventory {
    fn default() -> Self {
        Self::new()
    }
}
