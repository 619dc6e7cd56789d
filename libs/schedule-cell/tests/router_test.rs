// libs/schedule-cell/tests/router_test.rs
use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{header::AUTHORIZATION, header::CONTENT_TYPE, Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

use schedule_cell::handlers::ScheduleState;
use schedule_cell::router::schedule_routes;
use schedule_cell::{InMemoryScheduleStore, ScheduleService};
use shared_database::{InMemoryDirectory, SchedulingLockManager};
use shared_utils::test_utils::{JwtTestUtils, TestConfig, TestUser};

fn app(config: &TestConfig) -> Router {
    let service = ScheduleService::new(
        Arc::new(InMemoryScheduleStore::new()),
        Arc::new(InMemoryDirectory::permissive()),
        Arc::new(SchedulingLockManager::from_seconds(5)),
    );
    schedule_routes(ScheduleState { config: config.to_arc(), service: Arc::new(service) })
}

fn schedule_body(doctor_id: Uuid, room_id: Uuid, start: &str, end: &str) -> Value {
    json!({
        "doctor_id": doctor_id,
        "room_id": room_id,
        "day_of_week": "WEDNESDAY",
        "time_range": { "start_time": start, "end_time": end },
        "slot_duration_minutes": 20
    })
}

async fn send(app: Router, method: Method, uri: &str, bearer: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(AUTHORIZATION, bearer)
        .header(CONTENT_TYPE, "application/json");
    let request = match body {
        Some(body) => builder.body(Body::from(body.to_string())).unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

#[tokio::test]
async fn test_doctor_creates_and_lists_own_schedule() {
    let config = TestConfig::default();
    let app = app(&config);
    let doctor_id = Uuid::new_v4();
    let doctor = TestUser::with_id(doctor_id, "doctor");
    let bearer = JwtTestUtils::bearer(&doctor, &config.jwt_secret);

    let (status, body) = send(
        app.clone(),
        Method::POST,
        "/",
        &bearer,
        Some(schedule_body(doctor_id, Uuid::new_v4(), "08:00", "12:00")),
    ).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["schedule"]["time_range"]["start_time"], "08:00");

    let (status, body) = send(app, Method::GET, &format!("/?doctor_id={}", doctor_id), &bearer, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 1);
}

#[tokio::test]
async fn test_room_overlap_returns_conflict_with_reason() {
    let config = TestConfig::default();
    let app = app(&config);
    let staff = TestUser::staff("desk@clinic.test");
    let bearer = JwtTestUtils::bearer(&staff, &config.jwt_secret);
    let room = Uuid::new_v4();

    let (status, _) = send(
        app.clone(), Method::POST, "/", &bearer,
        Some(schedule_body(Uuid::new_v4(), room, "08:00", "12:00")),
    ).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(
        app, Method::POST, "/", &bearer,
        Some(schedule_body(Uuid::new_v4(), room, "11:30", "13:00")),
    ).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"].as_str().unwrap().starts_with("Room is already booked by doctor"));
}

#[tokio::test]
async fn test_patient_reads_schedules_but_cannot_write() {
    let config = TestConfig::default();
    let app = app(&config);
    let doctor_id = Uuid::new_v4();
    let staff = JwtTestUtils::bearer(&TestUser::staff("desk@clinic.test"), &config.jwt_secret);
    let patient = JwtTestUtils::bearer(&TestUser::patient("pat@clinic.test"), &config.jwt_secret);

    let (status, body) = send(
        app.clone(), Method::POST, "/", &staff,
        Some(schedule_body(doctor_id, Uuid::new_v4(), "08:00", "12:00")),
    ).await;
    assert_eq!(status, StatusCode::OK);
    let schedule_id = body["schedule"]["id"].as_str().unwrap().to_string();

    let (status, body) = send(
        app.clone(), Method::GET, &format!("/?doctor_id={}", doctor_id), &patient, None,
    ).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 1);
    assert_eq!(body["schedules"][0]["day_of_week"], "WEDNESDAY");

    let (status, _) = send(app.clone(), Method::GET, &format!("/{}", schedule_id), &patient, None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(
        app.clone(), Method::POST, "/", &patient,
        Some(schedule_body(doctor_id, Uuid::new_v4(), "13:00", "14:00")),
    ).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(app, Method::DELETE, &format!("/{}", schedule_id), &patient, None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_inverted_time_range_is_rejected() {
    let config = TestConfig::default();
    let staff = TestUser::staff("desk@clinic.test");
    let bearer = JwtTestUtils::bearer(&staff, &config.jwt_secret);

    let (status, _) = send(
        app(&config), Method::POST, "/", &bearer,
        Some(schedule_body(Uuid::new_v4(), Uuid::new_v4(), "12:00", "08:00")),
    ).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}
