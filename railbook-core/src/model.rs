use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Seat availability as stored. Readers should go through
/// [`Seat::effective_status`] so a lapsed hold is presented as free
/// without touching the row.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SeatStatus {
    Free,
    Held,
    Sold,
}

/// One physical seat on one schedule instance.
///
/// Invariants: `Held` implies both `held_by` and `reserved_until` are set;
/// `Sold` clears `reserved_until` but keeps `held_by` as the owning booking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Seat {
    pub id: Uuid,
    pub schedule_id: Uuid,
    pub carriage: String,
    pub code: String,
    pub status: SeatStatus,
    pub held_by: Option<Uuid>,
    pub reserved_until: Option<DateTime<Utc>>,
}

impl Seat {
    pub fn new(schedule_id: Uuid, carriage: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            schedule_id,
            carriage: carriage.into(),
            code: code.into(),
            status: SeatStatus::Free,
            held_by: None,
            reserved_until: None,
        }
    }

    /// True while the seat is held and the hold deadline has passed.
    pub fn hold_lapsed(&self, now: DateTime<Utc>) -> bool {
        self.status == SeatStatus::Held
            && self.reserved_until.map_or(true, |until| until <= now)
    }

    /// Status as presented to readers: a lapsed hold counts as free even
    /// before the sweeper has reclaimed the row.
    pub fn effective_status(&self, now: DateTime<Utc>) -> SeatStatus {
        if self.hold_lapsed(now) {
            SeatStatus::Free
        } else {
            self.status
        }
    }

    /// True when a new hold may take this seat.
    pub fn claimable(&self, now: DateTime<Utc>) -> bool {
        self.status == SeatStatus::Free || self.hold_lapsed(now)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Pending,
    Paid,
    Cancelled,
    Expired,
}

impl BookingStatus {
    /// Terminal statuses never transition again.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Paid | Self::Cancelled | Self::Expired)
    }
}

impl std::fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Paid => "paid",
            Self::Cancelled => "cancelled",
            Self::Expired => "expired",
        };
        f.write_str(s)
    }
}

/// A passenger record, owned by exactly one booking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Passenger {
    pub name: String,
    pub identity_number: String,
    pub seat_id: Uuid,
}

/// The purchasable unit: passengers, their seats, the price, and the
/// status lifecycle. `reserved_until` mirrors the seats' shared hold
/// deadline and is the single source of truth for expiry decisions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    pub id: Uuid,
    pub schedule_id: Uuid,
    pub passengers: Vec<Passenger>,
    pub seat_ids: Vec<Uuid>,
    pub total_price: i64,
    pub status: BookingStatus,
    pub reserved_until: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl Booking {
    pub fn new(
        id: Uuid,
        schedule_id: Uuid,
        passengers: Vec<Passenger>,
        total_price: i64,
        reserved_until: DateTime<Utc>,
        created_at: DateTime<Utc>,
    ) -> Self {
        let seat_ids = passengers.iter().map(|p| p.seat_id).collect();
        Self {
            id,
            schedule_id,
            passengers,
            seat_ids,
            total_price,
            status: BookingStatus::Pending,
            reserved_until,
            created_at,
        }
    }

    /// The hold backing a pending booking has lapsed.
    pub fn hold_lapsed(&self, now: DateTime<Utc>) -> bool {
        self.status == BookingStatus::Pending && self.reserved_until <= now
    }
}

/// A schedule instance: one train run on one date, with a flat per-seat
/// fare for its travel class.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Schedule {
    pub id: Uuid,
    pub train_name: String,
    pub origin: String,
    pub destination: String,
    pub departs_at: DateTime<Utc>,
    pub arrives_at: DateTime<Utc>,
    pub travel_class: String,
    /// Fare per passenger in minor currency units.
    pub base_fare: i64,
    pub created_at: DateTime<Utc>,
}
