use std::time::Duration as StdDuration;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use railbook_core::{
    Booking, BookingError, BookingStatus, HoldError, Passenger, PaymentOutcome, PaymentSession,
    ReservationStore, Schedule, Seat, SeatStatus,
};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Postgres, Transaction};
use tracing::info;
use uuid::Uuid;

/// Postgres-backed store. Every check-and-set runs inside a transaction
/// with `SELECT ... FOR UPDATE` row locks, so the hold/confirm/expire
/// guarantees hold across multiple server instances.
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(connection_string: &str) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(StdDuration::from_secs(3))
            .connect(connection_string)
            .await?;
        Ok(Self { pool })
    }

    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        info!("Running database migrations...");
        sqlx::migrate!("../migrations").run(&self.pool).await?;
        info!("Migrations completed successfully.");
        Ok(())
    }

    async fn load_booking(&self, id: Uuid) -> Result<Option<Booking>, BookingError> {
        let row: Option<BookingRow> = sqlx::query_as(
            "SELECT id, schedule_id, status, total_price, reserved_until, created_at \
             FROM bookings WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;

        let Some(row) = row else { return Ok(None) };

        let passengers: Vec<PassengerRow> = sqlx::query_as(
            "SELECT name, identity_number, seat_id \
             FROM passengers WHERE booking_id = $1 ORDER BY position",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;

        Ok(Some(row.into_booking(passengers)?))
    }

    /// Held -> sold inside an open transaction; shared by `mark_paid` and
    /// `confirm_seats`.
    async fn confirm_in_tx(
        tx: &mut Transaction<'_, Postgres>,
        booking_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<u64, HoldError> {
        let held: Vec<SeatLockRow> = sqlx::query_as(
            "SELECT id, reserved_until FROM seats \
             WHERE held_by = $1 AND status = 'held' FOR UPDATE",
        )
        .bind(booking_id)
        .fetch_all(&mut **tx)
        .await
        .map_err(hold_backend)?;

        if held.is_empty() {
            return Err(HoldError::HoldExpired);
        }
        if held
            .iter()
            .any(|s| s.reserved_until.map_or(true, |until| until <= now))
        {
            return Err(HoldError::HoldExpired);
        }

        let result = sqlx::query(
            "UPDATE seats SET status = 'sold', reserved_until = NULL, updated_at = $2 \
             WHERE held_by = $1 AND status = 'held'",
        )
        .bind(booking_id)
        .bind(now)
        .execute(&mut **tx)
        .await
        .map_err(hold_backend)?;

        Ok(result.rows_affected())
    }
}

#[async_trait]
impl ReservationStore for PgStore {
    async fn create_schedule(
        &self,
        schedule: Schedule,
        seats: Vec<Seat>,
    ) -> Result<(), BookingError> {
        let mut tx = self.pool.begin().await.map_err(backend)?;

        sqlx::query(
            "INSERT INTO schedules \
             (id, train_name, origin, destination, departs_at, arrives_at, travel_class, base_fare, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(schedule.id)
        .bind(&schedule.train_name)
        .bind(&schedule.origin)
        .bind(&schedule.destination)
        .bind(schedule.departs_at)
        .bind(schedule.arrives_at)
        .bind(&schedule.travel_class)
        .bind(schedule.base_fare)
        .bind(schedule.created_at)
        .execute(&mut *tx)
        .await
        .map_err(backend)?;

        for seat in &seats {
            sqlx::query(
                "INSERT INTO seats (id, schedule_id, carriage, code, status) \
                 VALUES ($1, $2, $3, $4, 'free')",
            )
            .bind(seat.id)
            .bind(seat.schedule_id)
            .bind(&seat.carriage)
            .bind(&seat.code)
            .execute(&mut *tx)
            .await
            .map_err(backend)?;
        }

        tx.commit().await.map_err(backend)?;
        Ok(())
    }

    async fn get_schedule(&self, id: Uuid) -> Result<Option<Schedule>, BookingError> {
        let row: Option<ScheduleRow> = sqlx::query_as(
            "SELECT id, train_name, origin, destination, departs_at, arrives_at, travel_class, base_fare, created_at \
             FROM schedules WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;
        Ok(row.map(Schedule::from))
    }

    async fn list_schedules(&self) -> Result<Vec<Schedule>, BookingError> {
        let rows: Vec<ScheduleRow> = sqlx::query_as(
            "SELECT id, train_name, origin, destination, departs_at, arrives_at, travel_class, base_fare, created_at \
             FROM schedules ORDER BY departs_at",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;
        Ok(rows.into_iter().map(Schedule::from).collect())
    }

    async fn list_seats(&self, schedule_id: Uuid) -> Result<Vec<Seat>, BookingError> {
        let rows: Vec<SeatRow> = sqlx::query_as(
            "SELECT id, schedule_id, carriage, code, status, held_by, reserved_until \
             FROM seats WHERE schedule_id = $1 ORDER BY carriage, code",
        )
        .bind(schedule_id)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;
        rows.into_iter().map(SeatRow::into_seat).collect()
    }

    async fn get_seat(&self, seat_id: Uuid) -> Result<Option<Seat>, BookingError> {
        let row: Option<SeatRow> = sqlx::query_as(
            "SELECT id, schedule_id, carriage, code, status, held_by, reserved_until \
             FROM seats WHERE id = $1",
        )
        .bind(seat_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;
        row.map(SeatRow::into_seat).transpose()
    }

    async fn hold_seats(
        &self,
        booking_id: Uuid,
        schedule_id: Uuid,
        seat_ids: &[Uuid],
        now: DateTime<Utc>,
        ttl: Duration,
    ) -> Result<DateTime<Utc>, HoldError> {
        let until = now + ttl;
        let ids = seat_ids.to_vec();
        let mut tx = self.pool.begin().await.map_err(hold_backend)?;

        // Lock the candidate rows; concurrent holders serialize here.
        let rows: Vec<SeatRow> = sqlx::query_as(
            "SELECT id, schedule_id, carriage, code, status, held_by, reserved_until \
             FROM seats WHERE schedule_id = $1 AND id = ANY($2) FOR UPDATE",
        )
        .bind(schedule_id)
        .bind(&ids)
        .fetch_all(&mut *tx)
        .await
        .map_err(hold_backend)?;

        if rows.len() != seat_ids.len() {
            let missing = seat_ids
                .iter()
                .find(|id| !rows.iter().any(|r| r.id == **id))
                .copied()
                .unwrap_or(schedule_id);
            return Err(HoldError::UnknownSeat(missing));
        }

        for row in &rows {
            let seat = row.clone().into_seat().map_err(hold_backend)?;
            if !seat.claimable(now) {
                return Err(HoldError::SeatUnavailable(seat.id));
            }
        }

        sqlx::query(
            "UPDATE seats SET status = 'held', held_by = $1, reserved_until = $2, updated_at = $3 \
             WHERE id = ANY($4)",
        )
        .bind(booking_id)
        .bind(until)
        .bind(now)
        .bind(&ids)
        .execute(&mut *tx)
        .await
        .map_err(hold_backend)?;

        tx.commit().await.map_err(hold_backend)?;
        Ok(until)
    }

    async fn release_seats(&self, booking_id: Uuid) -> Result<u64, HoldError> {
        let result = sqlx::query(
            "UPDATE seats SET status = 'free', held_by = NULL, reserved_until = NULL, updated_at = NOW() \
             WHERE held_by = $1 AND status = 'held'",
        )
        .bind(booking_id)
        .execute(&self.pool)
        .await
        .map_err(hold_backend)?;
        Ok(result.rows_affected())
    }

    async fn confirm_seats(&self, booking_id: Uuid, now: DateTime<Utc>) -> Result<u64, HoldError> {
        let mut tx = self.pool.begin().await.map_err(hold_backend)?;
        let confirmed = Self::confirm_in_tx(&mut tx, booking_id, now).await?;
        tx.commit().await.map_err(hold_backend)?;
        Ok(confirmed)
    }

    async fn insert_booking(&self, booking: &Booking) -> Result<(), BookingError> {
        let mut tx = self.pool.begin().await.map_err(backend)?;

        sqlx::query(
            "INSERT INTO bookings (id, schedule_id, status, total_price, reserved_until, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(booking.id)
        .bind(booking.schedule_id)
        .bind(booking.status.to_string())
        .bind(booking.total_price)
        .bind(booking.reserved_until)
        .bind(booking.created_at)
        .execute(&mut *tx)
        .await
        .map_err(backend)?;

        for (position, passenger) in booking.passengers.iter().enumerate() {
            sqlx::query(
                "INSERT INTO passengers (id, booking_id, seat_id, name, identity_number, position) \
                 VALUES ($1, $2, $3, $4, $5, $6)",
            )
            .bind(Uuid::new_v4())
            .bind(booking.id)
            .bind(passenger.seat_id)
            .bind(&passenger.name)
            .bind(&passenger.identity_number)
            .bind(position as i32)
            .execute(&mut *tx)
            .await
            .map_err(backend)?;
        }

        tx.commit().await.map_err(backend)?;
        Ok(())
    }

    async fn get_booking(&self, id: Uuid) -> Result<Option<Booking>, BookingError> {
        self.load_booking(id).await
    }

    async fn mark_paid(&self, id: Uuid, now: DateTime<Utc>) -> Result<Booking, BookingError> {
        let mut tx = self.pool.begin().await.map_err(backend)?;

        let row: Option<BookingRow> = sqlx::query_as(
            "SELECT id, schedule_id, status, total_price, reserved_until, created_at \
             FROM bookings WHERE id = $1 FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(backend)?;
        let row = row.ok_or(BookingError::NotFound)?;

        let status = parse_booking_status(&row.status)?;
        match status {
            BookingStatus::Paid => {
                // Duplicate settlement; nothing to do.
                tx.commit().await.map_err(backend)?;
                return self.load_booking(id).await?.ok_or(BookingError::NotFound);
            }
            BookingStatus::Cancelled | BookingStatus::Expired => {
                return Err(BookingError::TerminalState(status));
            }
            BookingStatus::Pending => {}
        }

        if row.reserved_until <= now {
            return Err(BookingError::BookingExpired);
        }

        Self::confirm_in_tx(&mut tx, id, now)
            .await
            .map_err(|e| match e {
                HoldError::HoldExpired => BookingError::BookingExpired,
                other => BookingError::Hold(other),
            })?;

        sqlx::query("UPDATE bookings SET status = 'paid', updated_at = $2 WHERE id = $1")
            .bind(id)
            .bind(now)
            .execute(&mut *tx)
            .await
            .map_err(backend)?;

        tx.commit().await.map_err(backend)?;
        self.load_booking(id).await?.ok_or(BookingError::NotFound)
    }

    async fn cancel_booking(&self, id: Uuid, now: DateTime<Utc>) -> Result<Booking, BookingError> {
        let mut tx = self.pool.begin().await.map_err(backend)?;

        let row: Option<BookingRow> = sqlx::query_as(
            "SELECT id, schedule_id, status, total_price, reserved_until, created_at \
             FROM bookings WHERE id = $1 FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(backend)?;
        let row = row.ok_or(BookingError::NotFound)?;

        let status = parse_booking_status(&row.status)?;
        if !matches!(status, BookingStatus::Pending | BookingStatus::Paid) {
            return Err(BookingError::TerminalState(status));
        }

        sqlx::query(
            "UPDATE seats SET status = 'free', held_by = NULL, reserved_until = NULL, updated_at = $2 \
             WHERE held_by = $1 AND status IN ('held', 'sold')",
        )
        .bind(id)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(backend)?;

        sqlx::query("UPDATE bookings SET status = 'cancelled', updated_at = $2 WHERE id = $1")
            .bind(id)
            .bind(now)
            .execute(&mut *tx)
            .await
            .map_err(backend)?;

        tx.commit().await.map_err(backend)?;
        self.load_booking(id).await?.ok_or(BookingError::NotFound)
    }

    async fn sweep_expired(&self, now: DateTime<Utc>) -> Result<u64, BookingError> {
        let mut tx = self.pool.begin().await.map_err(backend)?;

        // Only bookings still pending at this instant flip to expired; a
        // mark_paid that landed first has already moved them out of reach.
        let expired: Vec<(Uuid,)> = sqlx::query_as(
            "UPDATE bookings SET status = 'expired', updated_at = $2 \
             WHERE status = 'pending' AND reserved_until <= $1 RETURNING id",
        )
        .bind(now)
        .bind(now)
        .fetch_all(&mut *tx)
        .await
        .map_err(backend)?;

        if !expired.is_empty() {
            let ids: Vec<Uuid> = expired.iter().map(|r| r.0).collect();
            sqlx::query(
                "UPDATE seats SET status = 'free', held_by = NULL, reserved_until = NULL, updated_at = $2 \
                 WHERE held_by = ANY($1) AND status = 'held'",
            )
            .bind(&ids)
            .bind(now)
            .execute(&mut *tx)
            .await
            .map_err(backend)?;
        }

        // Write-time correction for any stray lapsed hold.
        sqlx::query(
            "UPDATE seats SET status = 'free', held_by = NULL, reserved_until = NULL, updated_at = $2 \
             WHERE status = 'held' AND reserved_until <= $1",
        )
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(backend)?;

        tx.commit().await.map_err(backend)?;
        Ok(expired.len() as u64)
    }

    async fn insert_session(&self, session: &PaymentSession) -> Result<(), BookingError> {
        sqlx::query(
            "INSERT INTO payment_sessions (id, booking_id, order_ref, amount, redirect_url, outcome, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(session.id)
        .bind(session.booking_id)
        .bind(&session.order_ref)
        .bind(session.amount)
        .bind(&session.redirect_url)
        .bind(outcome_str(session.outcome))
        .bind(session.created_at)
        .execute(&self.pool)
        .await
        .map_err(backend)?;
        Ok(())
    }

    async fn find_session(&self, order_ref: &str) -> Result<Option<PaymentSession>, BookingError> {
        let row: Option<SessionRow> = sqlx::query_as(
            "SELECT id, booking_id, order_ref, amount, redirect_url, outcome, created_at \
             FROM payment_sessions WHERE order_ref = $1",
        )
        .bind(order_ref)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;
        row.map(SessionRow::into_session).transpose()
    }

    async fn set_session_outcome(
        &self,
        order_ref: &str,
        outcome: PaymentOutcome,
    ) -> Result<(), BookingError> {
        let result = sqlx::query(
            "UPDATE payment_sessions SET outcome = $2, updated_at = NOW() WHERE order_ref = $1",
        )
        .bind(order_ref)
        .bind(outcome_str(outcome))
        .execute(&self.pool)
        .await
        .map_err(backend)?;
        if result.rows_affected() == 0 {
            return Err(BookingError::NotFound);
        }
        Ok(())
    }
}

// -- row mapping --

#[derive(sqlx::FromRow)]
struct ScheduleRow {
    id: Uuid,
    train_name: String,
    origin: String,
    destination: String,
    departs_at: DateTime<Utc>,
    arrives_at: DateTime<Utc>,
    travel_class: String,
    base_fare: i64,
    created_at: DateTime<Utc>,
}

impl From<ScheduleRow> for Schedule {
    fn from(row: ScheduleRow) -> Self {
        Schedule {
            id: row.id,
            train_name: row.train_name,
            origin: row.origin,
            destination: row.destination,
            departs_at: row.departs_at,
            arrives_at: row.arrives_at,
            travel_class: row.travel_class,
            base_fare: row.base_fare,
            created_at: row.created_at,
        }
    }
}

#[derive(Clone, sqlx::FromRow)]
struct SeatRow {
    id: Uuid,
    schedule_id: Uuid,
    carriage: String,
    code: String,
    status: String,
    held_by: Option<Uuid>,
    reserved_until: Option<DateTime<Utc>>,
}

impl SeatRow {
    fn into_seat(self) -> Result<Seat, BookingError> {
        let status = match self.status.as_str() {
            "free" => SeatStatus::Free,
            "held" => SeatStatus::Held,
            "sold" => SeatStatus::Sold,
            other => {
                return Err(BookingError::Backend(format!(
                    "unknown seat status in store: {}",
                    other
                )))
            }
        };
        Ok(Seat {
            id: self.id,
            schedule_id: self.schedule_id,
            carriage: self.carriage,
            code: self.code,
            status,
            held_by: self.held_by,
            reserved_until: self.reserved_until,
        })
    }
}

#[derive(sqlx::FromRow)]
struct SeatLockRow {
    #[allow(dead_code)]
    id: Uuid,
    reserved_until: Option<DateTime<Utc>>,
}

#[derive(sqlx::FromRow)]
struct BookingRow {
    id: Uuid,
    schedule_id: Uuid,
    status: String,
    total_price: i64,
    reserved_until: DateTime<Utc>,
    created_at: DateTime<Utc>,
}

impl BookingRow {
    fn into_booking(self, passengers: Vec<PassengerRow>) -> Result<Booking, BookingError> {
        let status = parse_booking_status(&self.status)?;
        let passengers: Vec<Passenger> = passengers
            .into_iter()
            .map(|p| Passenger {
                name: p.name,
                identity_number: p.identity_number,
                seat_id: p.seat_id,
            })
            .collect();
        let seat_ids = passengers.iter().map(|p| p.seat_id).collect();
        Ok(Booking {
            id: self.id,
            schedule_id: self.schedule_id,
            passengers,
            seat_ids,
            total_price: self.total_price,
            status,
            reserved_until: self.reserved_until,
            created_at: self.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct PassengerRow {
    name: String,
    identity_number: String,
    seat_id: Uuid,
}

#[derive(sqlx::FromRow)]
struct SessionRow {
    id: Uuid,
    booking_id: Uuid,
    order_ref: String,
    amount: i64,
    redirect_url: String,
    outcome: String,
    created_at: DateTime<Utc>,
}

impl SessionRow {
    fn into_session(self) -> Result<PaymentSession, BookingError> {
        let outcome = match self.outcome.as_str() {
            "pending" => PaymentOutcome::Pending,
            "settled" => PaymentOutcome::Settled,
            "denied" => PaymentOutcome::Denied,
            "expired" => PaymentOutcome::Expired,
            other => {
                return Err(BookingError::Backend(format!(
                    "unknown session outcome in store: {}",
                    other
                )))
            }
        };
        Ok(PaymentSession {
            id: self.id,
            booking_id: self.booking_id,
            order_ref: self.order_ref,
            amount: self.amount,
            redirect_url: self.redirect_url,
            outcome,
            created_at: self.created_at,
        })
    }
}

fn parse_booking_status(s: &str) -> Result<BookingStatus, BookingError> {
    match s {
        "pending" => Ok(BookingStatus::Pending),
        "paid" => Ok(BookingStatus::Paid),
        "cancelled" => Ok(BookingStatus::Cancelled),
        "expired" => Ok(BookingStatus::Expired),
        other => Err(BookingError::Backend(format!(
            "unknown booking status in store: {}",
            other
        ))),
    }
}

fn outcome_str(outcome: PaymentOutcome) -> &'static str {
    match outcome {
        PaymentOutcome::Pending => "pending",
        PaymentOutcome::Settled => "settled",
        PaymentOutcome::Denied => "denied",
        PaymentOutcome::Expired => "expired",
    }
}

fn backend(e: sqlx::Error) -> BookingError {
    BookingError::Backend(e.to_string())
}

fn hold_backend<E: std::fmt::Display>(e: E) -> HoldError {
    HoldError::Backend(e.to_string())
}
