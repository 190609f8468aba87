use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use railbook_api::{app, AppState};
use railbook_booking::{notification_signature, BookingService, RedirectGateway};
use railbook_store::MemoryStore;
use serde_json::{json, Value};
use tower::ServiceExt;

const SERVER_KEY: &str = "test-server-key";

fn test_app() -> Router {
    let store = Arc::new(MemoryStore::new());
    let gateway = Arc::new(RedirectGateway::new("https://pay.test.example.com"));
    let service = Arc::new(BookingService::new(store, gateway, 7200));
    app(AppState {
        service,
        server_key: SERVER_KEY.to_string(),
    })
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let request = match body {
        Some(value) => Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(value.to_string()))
            .unwrap(),
        None => Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

/// POST a small two-carriage schedule and return (schedule_id, seat_ids).
async fn seed_schedule(app: &Router) -> (String, Vec<String>) {
    let (status, schedule) = send(
        app,
        "POST",
        "/v1/schedules",
        Some(json!({
            "train_name": "Argo Bromo Anggrek",
            "origin": "SBI",
            "destination": "GMR",
            "departs_at": "2026-09-01T08:00:00Z",
            "arrives_at": "2026-09-01T16:30:00Z",
            "travel_class": "executive",
            "base_fare": 550000,
            "carriages": [
                { "name": "EKS-1", "capacity": 4 },
                { "name": "EKS-2", "capacity": 4 }
            ]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(schedule["seat_count"], 8);
    let schedule_id = schedule["id"].as_str().unwrap().to_string();

    let (status, seats) = send(
        app,
        "GET",
        &format!("/v1/schedules/{}/seats", schedule_id),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let seat_ids = seats
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["seat_id"].as_str().unwrap().to_string())
        .collect();
    (schedule_id, seat_ids)
}

async fn create_booking(
    app: &Router,
    schedule_id: &str,
    seat_ids: &[String],
) -> (StatusCode, Value) {
    let passengers: Vec<Value> = (1..=seat_ids.len())
        .map(|n| json!({ "name": format!("Passenger {}", n), "identity_number": format!("317{}", n) }))
        .collect();
    send(
        app,
        "POST",
        "/v1/bookings",
        Some(json!({
            "schedule_id": schedule_id,
            "passengers": passengers,
            "seat_ids": seat_ids,
        })),
    )
    .await
}

#[tokio::test]
async fn health_is_ok() {
    let app = test_app();
    let (status, body) = send(&app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn schedule_setup_generates_seats_row_by_row() {
    let app = test_app();
    let (schedule_id, _) = seed_schedule(&app).await;

    let (status, seats) = send(
        &app,
        "GET",
        &format!("/v1/schedules/{}/seats", schedule_id),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let seats = seats.as_array().unwrap();
    assert_eq!(seats.len(), 8);
    assert_eq!(seats[0]["carriage"], "EKS-1");
    assert_eq!(seats[0]["code"], "1A");
    assert!(seats.iter().all(|s| s["status"] == "free"));
    assert!(seats.iter().all(|s| s["reserved_until"].is_null()));
}

#[tokio::test]
async fn booking_then_settlement_sells_the_seats() {
    let app = test_app();
    let (schedule_id, seat_ids) = seed_schedule(&app).await;

    let (status, booking) = create_booking(&app, &schedule_id, &seat_ids[..2]).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(booking["status"], "pending");
    assert_eq!(booking["total_price"], 1_100_000);
    assert!(booking["reserved_until"].is_string());
    let booking_id = booking["id"].as_str().unwrap().to_string();

    // The held seats show up in the snapshot with their deadline.
    let (_, seats) = send(
        &app,
        "GET",
        &format!("/v1/schedules/{}/seats", schedule_id),
        None,
    )
    .await;
    let held: Vec<&Value> = seats
        .as_array()
        .unwrap()
        .iter()
        .filter(|s| s["status"] == "held")
        .collect();
    assert_eq!(held.len(), 2);
    assert!(held.iter().all(|s| s["reserved_until"].is_string()));

    let (status, payment) = send(
        &app,
        "POST",
        &format!("/v1/bookings/{}/pay", booking_id),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let order_ref = payment["order_ref"].as_str().unwrap().to_string();
    assert!(payment["redirect_url"].as_str().unwrap().contains(&order_ref));
    assert_eq!(payment["amount"], 1_100_000);

    let signature = notification_signature(&order_ref, "200", "1100000", SERVER_KEY);
    let (status, _) = send(
        &app,
        "POST",
        "/v1/webhooks/payments",
        Some(json!({
            "order_id": order_ref,
            "status_code": "200",
            "gross_amount": "1100000",
            "signature_key": signature,
            "transaction_status": "settlement",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, booking) = send(&app, "GET", &format!("/v1/bookings/{}", booking_id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(booking["status"], "paid");

    // Sold seats carry no deadline.
    let (_, seats) = send(
        &app,
        "GET",
        &format!("/v1/schedules/{}/seats", schedule_id),
        None,
    )
    .await;
    let sold: Vec<&Value> = seats
        .as_array()
        .unwrap()
        .iter()
        .filter(|s| s["status"] == "sold")
        .collect();
    assert_eq!(sold.len(), 2);
    assert!(sold.iter().all(|s| s["reserved_until"].is_null()));
}

#[tokio::test]
async fn contested_seat_returns_conflict_with_the_seat_id() {
    let app = test_app();
    let (schedule_id, seat_ids) = seed_schedule(&app).await;

    let (status, _) = create_booking(&app, &schedule_id, &seat_ids[..1]).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = create_booking(&app, &schedule_id, &seat_ids[..2]).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["seat_id"], seat_ids[0].as_str());

    // The uncontested seat is still free for someone else.
    let (status, _) = create_booking(&app, &schedule_id, &seat_ids[1..2]).await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn passenger_seat_count_mismatch_is_a_bad_request() {
    let app = test_app();
    let (schedule_id, seat_ids) = seed_schedule(&app).await;

    let (status, body) = send(
        &app,
        "POST",
        "/v1/bookings",
        Some(json!({
            "schedule_id": schedule_id,
            "passengers": [{ "name": "Solo", "identity_number": "3171" }],
            "seat_ids": [seat_ids[0], seat_ids[1]],
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("does not match"));
}

#[tokio::test]
async fn webhook_with_bad_signature_is_rejected_without_effect() {
    let app = test_app();
    let (schedule_id, seat_ids) = seed_schedule(&app).await;
    let (_, booking) = create_booking(&app, &schedule_id, &seat_ids[..1]).await;
    let booking_id = booking["id"].as_str().unwrap().to_string();

    let (_, payment) = send(
        &app,
        "POST",
        &format!("/v1/bookings/{}/pay", booking_id),
        None,
    )
    .await;
    let order_ref = payment["order_ref"].as_str().unwrap();

    let (status, _) = send(
        &app,
        "POST",
        "/v1/webhooks/payments",
        Some(json!({
            "order_id": order_ref,
            "status_code": "200",
            "gross_amount": "550000",
            "signature_key": "forged",
            "transaction_status": "settlement",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (_, booking) = send(&app, "GET", &format!("/v1/bookings/{}", booking_id), None).await;
    assert_eq!(booking["status"], "pending");
}

#[tokio::test]
async fn denied_payment_keeps_the_booking_pending() {
    let app = test_app();
    let (schedule_id, seat_ids) = seed_schedule(&app).await;
    let (_, booking) = create_booking(&app, &schedule_id, &seat_ids[..1]).await;
    let booking_id = booking["id"].as_str().unwrap().to_string();

    let (_, payment) = send(
        &app,
        "POST",
        &format!("/v1/bookings/{}/pay", booking_id),
        None,
    )
    .await;
    let order_ref = payment["order_ref"].as_str().unwrap().to_string();

    let signature = notification_signature(&order_ref, "202", "550000", SERVER_KEY);
    let (status, _) = send(
        &app,
        "POST",
        "/v1/webhooks/payments",
        Some(json!({
            "order_id": order_ref,
            "status_code": "202",
            "gross_amount": "550000",
            "signature_key": signature,
            "transaction_status": "deny",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    // The buyer keeps the hold and may retry until the TTL lapses.
    let (_, booking) = send(&app, "GET", &format!("/v1/bookings/{}", booking_id), None).await;
    assert_eq!(booking["status"], "pending");
    let (status, _) = send(
        &app,
        "POST",
        &format!("/v1/bookings/{}/pay", booking_id),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn duplicate_settlement_notifications_converge() {
    let app = test_app();
    let (schedule_id, seat_ids) = seed_schedule(&app).await;
    let (_, booking) = create_booking(&app, &schedule_id, &seat_ids[..1]).await;
    let booking_id = booking["id"].as_str().unwrap().to_string();

    let (_, payment) = send(
        &app,
        "POST",
        &format!("/v1/bookings/{}/pay", booking_id),
        None,
    )
    .await;
    let order_ref = payment["order_ref"].as_str().unwrap().to_string();
    let signature = notification_signature(&order_ref, "200", "550000", SERVER_KEY);
    let notice = json!({
        "order_id": order_ref,
        "status_code": "200",
        "gross_amount": "550000",
        "signature_key": signature,
        "transaction_status": "settlement",
    });

    for _ in 0..2 {
        let (status, _) = send(&app, "POST", "/v1/webhooks/payments", Some(notice.clone())).await;
        assert_eq!(status, StatusCode::OK);
    }

    // Post-redirect confirmation after the webhook is also a no-op.
    let (status, booking) = send(
        &app,
        "PUT",
        &format!("/v1/bookings/{}/pay-success", booking_id),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(booking["status"], "paid");
}

#[tokio::test]
async fn cancelling_frees_the_seats_and_is_terminal() {
    let app = test_app();
    let (schedule_id, seat_ids) = seed_schedule(&app).await;
    let (_, booking) = create_booking(&app, &schedule_id, &seat_ids[..2]).await;
    let booking_id = booking["id"].as_str().unwrap().to_string();

    let (status, cancelled) = send(
        &app,
        "DELETE",
        &format!("/v1/bookings/{}", booking_id),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cancelled["status"], "cancelled");

    // Seats are free again and the booking cannot be paid.
    let (status, _) = create_booking(&app, &schedule_id, &seat_ids[..2]).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = send(
        &app,
        "PUT",
        &format!("/v1/bookings/{}/pay-success", booking_id),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"].as_str().unwrap().contains("cancelled"));
}

#[tokio::test]
async fn unknown_resources_return_not_found() {
    let app = test_app();
    let missing = "00000000-0000-0000-0000-000000000000";

    let (status, _) = send(&app, "GET", &format!("/v1/bookings/{}", missing), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, "GET", &format!("/v1/schedules/{}", missing), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(
        &app,
        "GET",
        &format!("/v1/schedules/{}/seats", missing),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
