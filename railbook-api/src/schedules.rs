use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use railbook_core::{BookingError, Schedule, SeatStatus};
use railbook_inventory::{generate_seats, CarriageLayout};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/schedules", get(list_schedules).post(create_schedule))
        .route("/v1/schedules/{id}", get(get_schedule))
        .route("/v1/schedules/{id}/seats", get(list_seats))
}

#[derive(Debug, Deserialize)]
struct CreateScheduleRequest {
    train_name: String,
    origin: String,
    destination: String,
    departs_at: DateTime<Utc>,
    arrives_at: DateTime<Utc>,
    travel_class: String,
    base_fare: i64,
    carriages: Vec<CarriageLayout>,
}

#[derive(Debug, Serialize)]
struct CreateScheduleResponse {
    #[serde(flatten)]
    schedule: Schedule,
    seat_count: usize,
}

async fn create_schedule(
    State(state): State<AppState>,
    Json(req): Json<CreateScheduleRequest>,
) -> Result<(StatusCode, Json<CreateScheduleResponse>), AppError> {
    if req.base_fare <= 0 {
        return Err(BookingError::Validation("base fare must be positive".to_string()).into());
    }
    if req.carriages.is_empty() {
        return Err(
            BookingError::Validation("at least one carriage is required".to_string()).into(),
        );
    }
    if req.arrives_at <= req.departs_at {
        return Err(
            BookingError::Validation("arrival must be after departure".to_string()).into(),
        );
    }

    let schedule = Schedule {
        id: Uuid::new_v4(),
        train_name: req.train_name,
        origin: req.origin,
        destination: req.destination,
        departs_at: req.departs_at,
        arrives_at: req.arrives_at,
        travel_class: req.travel_class,
        base_fare: req.base_fare,
        created_at: Utc::now(),
    };
    let seats = generate_seats(schedule.id, &req.carriages);
    let seat_count = seats.len();

    let schedule = state.service.create_schedule(schedule, seats).await?;
    Ok((
        StatusCode::CREATED,
        Json(CreateScheduleResponse {
            schedule,
            seat_count,
        }),
    ))
}

async fn list_schedules(
    State(state): State<AppState>,
) -> Result<Json<Vec<Schedule>>, AppError> {
    Ok(Json(state.service.list_schedules().await?))
}

async fn get_schedule(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Schedule>, AppError> {
    let schedule = state
        .service
        .get_schedule(id)
        .await?
        .ok_or(BookingError::ScheduleNotFound)?;
    Ok(Json(schedule))
}

/// One canonical seat shape for browsing clients.
#[derive(Debug, Serialize)]
struct SeatView {
    seat_id: Uuid,
    carriage: String,
    code: String,
    status: SeatStatus,
    reserved_until: Option<DateTime<Utc>>,
}

/// Pure read: lapsed holds are presented as free without writing
/// anything back; the sweeper settles the record later.
async fn list_seats(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<SeatView>>, AppError> {
    let now = Utc::now();
    let seats = state.service.list_seats(id).await?;
    let views = seats
        .into_iter()
        .map(|seat| {
            let status = seat.effective_status(now);
            SeatView {
                seat_id: seat.id,
                carriage: seat.carriage,
                code: seat.code,
                reserved_until: match status {
                    SeatStatus::Held => seat.reserved_until,
                    _ => None,
                },
                status,
            }
        })
        .collect();
    Ok(Json(views))
}
