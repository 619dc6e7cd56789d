// libs/appointment-cell/tests/router_test.rs
mod common;

use axum::{
    body::{to_bytes, Body},
    http::{header::AUTHORIZATION, header::CONTENT_TYPE, Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

use appointment_cell::handlers::AppointmentState;
use appointment_cell::router::{appointment_routes, case_record_routes, slot_routes};
use shared_utils::test_utils::{JwtTestUtils, TestConfig, TestUser};

use common::{monday, Clinic};

struct Api {
    appointments: Router,
    slots: Router,
    case_records: Router,
    config: TestConfig,
}

impl Api {
    fn new(clinic: &Clinic) -> Self {
        let config = TestConfig::default();
        let state = AppointmentState {
            config: config.to_arc(),
            booking: clinic.booking.clone(),
            availability: clinic.availability.clone(),
            case_records: clinic.case_records.clone(),
        };
        Self {
            appointments: appointment_routes(state.clone()),
            slots: slot_routes(state.clone()),
            case_records: case_record_routes(state),
            config,
        }
    }

    fn bearer(&self, id: Uuid, role: &str) -> String {
        JwtTestUtils::bearer(&TestUser::with_id(id, role), &self.config.jwt_secret)
    }
}

async fn send(app: &Router, method: Method, uri: &str, bearer: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(CONTENT_TYPE, "application/json");
    if let Some(bearer) = bearer {
        builder = builder.header(AUTHORIZATION, bearer);
    }
    let request = match body {
        Some(body) => builder.body(Body::from(body.to_string())).unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

fn booking_body(clinic: &Clinic, patient_id: Uuid, start: &str, end: &str) -> Value {
    json!({
        "patient_id": patient_id,
        "doctor_id": clinic.doctor,
        "room_id": clinic.room,
        "appointment_date": monday(),
        "time_range": { "start_time": start, "end_time": end },
        "reason_for_visit": "Checkup"
    })
}

#[tokio::test]
async fn test_requests_without_token_are_rejected() {
    let clinic = Clinic::new().await;
    let api = Api::new(&clinic);

    let (status, _) = send(&api.appointments, Method::GET, "/", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_patient_books_and_conflict_reason_is_surfaced() {
    let clinic = Clinic::new().await;
    let api = Api::new(&clinic);
    let patient = api.bearer(clinic.patient, "patient");

    let (status, body) = send(
        &api.appointments, Method::POST, "/", Some(&patient),
        Some(booking_body(&clinic, clinic.patient, "09:00", "09:30")),
    ).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["appointment"]["status"], "BOOKED");
    assert_eq!(body["appointment"]["time_range"]["end_time"], "09:30");

    let other = api.bearer(clinic.other_patient, "patient");
    let (status, body) = send(
        &api.appointments, Method::POST, "/", Some(&other),
        Some(booking_body(&clinic, clinic.other_patient, "09:15", "09:45")),
    ).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "Doctor is already booked at this time");
    assert_eq!(body["code"], "conflict");
}

#[tokio::test]
async fn test_patient_cannot_book_for_someone_else() {
    let clinic = Clinic::new().await;
    let api = Api::new(&clinic);
    let patient = api.bearer(clinic.patient, "patient");

    let (status, _) = send(
        &api.appointments, Method::POST, "/", Some(&patient),
        Some(booking_body(&clinic, clinic.other_patient, "09:00", "09:30")),
    ).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_status_routes_and_precondition() {
    let clinic = Clinic::new().await;
    let api = Api::new(&clinic);
    let appointment = clinic.booking.book_appointment(clinic.request("09:00", "09:30")).await.unwrap();
    let doctor = api.bearer(clinic.doctor, "doctor");
    let patient = api.bearer(clinic.patient, "patient");

    let (status, _) = send(
        &api.appointments, Method::POST, &format!("/{}/check-in", appointment.id), Some(&patient), None,
    ).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send(
        &api.appointments, Method::POST, &format!("/{}/complete", appointment.id), Some(&doctor), None,
    ).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["code"], "precondition_failed");

    let (status, body) = send(
        &api.appointments, Method::POST, &format!("/{}/check-in", appointment.id), Some(&doctor), None,
    ).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["appointment"]["status"], "CHECKED_IN");

    let (status, _) = send(
        &api.appointments, Method::POST, &format!("/{}/check-in", appointment.id), Some(&doctor), None,
    ).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = send(
        &api.case_records, Method::POST, "/", Some(&doctor),
        Some(json!({
            "appointment_id": appointment.id,
            "chief_complaint": "Sore throat",
            "diagnosis": "Pharyngitis"
        })),
    ).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["case_record"]["doctor_id"], json!(clinic.doctor));

    let (status, body) = send(
        &api.appointments, Method::POST, &format!("/{}/complete", appointment.id), Some(&doctor), None,
    ).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["appointment"]["status"], "COMPLETED");
}

#[tokio::test]
async fn test_patient_cancels_own_but_cannot_reschedule() {
    let clinic = Clinic::new().await;
    let api = Api::new(&clinic);
    let appointment = clinic.booking.book_appointment(clinic.request("09:00", "09:30")).await.unwrap();
    let patient = api.bearer(clinic.patient, "patient");

    let (status, _) = send(
        &api.appointments, Method::PATCH, &format!("/{}/reschedule", appointment.id), Some(&patient),
        Some(json!({ "time_range": { "start_time": "10:00", "end_time": "10:30" } })),
    ).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let stranger = api.bearer(clinic.other_patient, "patient");
    let (status, _) = send(
        &api.appointments, Method::POST, &format!("/{}/cancel", appointment.id), Some(&stranger), None,
    ).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send(
        &api.appointments, Method::POST, &format!("/{}/cancel", appointment.id), Some(&patient), None,
    ).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["appointment"]["status"], "CANCELLED");

    let (status, _) = send(
        &api.appointments, Method::DELETE, &format!("/{}", appointment.id), Some(&patient), None,
    ).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_patient_cannot_delete_active_appointment() {
    let clinic = Clinic::new().await;
    let api = Api::new(&clinic);
    let appointment = clinic.booking.book_appointment(clinic.request("09:00", "09:30")).await.unwrap();
    let patient = api.bearer(clinic.patient, "patient");

    let (status, _) = send(
        &api.appointments, Method::DELETE, &format!("/{}", appointment.id), Some(&patient), None,
    ).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let staff = api.bearer(Uuid::new_v4(), "admin");
    let (status, _) = send(
        &api.appointments, Method::DELETE, &format!("/{}", appointment.id), Some(&staff), None,
    ).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_listing_is_scoped_to_caller() {
    let clinic = Clinic::new().await;
    let api = Api::new(&clinic);
    clinic.booking.book_appointment(clinic.request("09:00", "09:30")).await.unwrap();

    let stranger = api.bearer(clinic.other_patient, "patient");
    let (status, body) = send(
        &api.appointments, Method::GET, &format!("/?patient_id={}", clinic.patient), Some(&stranger), None,
    ).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 0);

    let staff = api.bearer(Uuid::new_v4(), "staff");
    let (_, body) = send(&api.appointments, Method::GET, "/?status=BOOKED", Some(&staff), None).await;
    assert_eq!(body["count"], 1);
}

#[tokio::test]
async fn test_conflict_check_route() {
    let clinic = Clinic::new().await;
    let api = Api::new(&clinic);
    let booked = clinic.booking.book_appointment(clinic.request("09:00", "09:30")).await.unwrap();
    let staff = api.bearer(Uuid::new_v4(), "staff");

    let (status, body) = send(
        &api.appointments, Method::POST, "/conflicts/check", Some(&staff),
        Some(json!({
            "doctor_id": clinic.other_doctor,
            "patient_id": clinic.other_patient,
            "room_id": clinic.room,
            "appointment_date": monday(),
            "time_range": { "start_time": "09:20", "end_time": "09:50" }
        })),
    ).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["conflict_check"]["has_conflict"], true);
    assert_eq!(body["conflict_check"]["reason"], "room");
    assert_eq!(body["conflict_check"]["conflicting_appointment_id"], json!(booked.id));
}

#[tokio::test]
async fn test_patient_conflict_check_hides_other_appointments() {
    let clinic = Clinic::new().await;
    let api = Api::new(&clinic);
    clinic.booking.book_appointment(clinic.request("09:00", "09:30")).await.unwrap();
    let other = api.bearer(clinic.other_patient, "patient");

    // Same body a booking form would send.
    let (status, body) = send(
        &api.appointments, Method::POST, "/conflicts/check", Some(&other),
        Some(booking_body(&clinic, clinic.other_patient, "09:00", "09:30")),
    ).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["conflict_check"]["has_conflict"], true);
    assert_eq!(body["conflict_check"]["reason"], "exact_slot");
    assert_eq!(body["conflict_check"]["conflicting_appointment_id"], Value::Null);

    let (status, _) = send(
        &api.appointments, Method::POST, "/conflicts/check", Some(&other),
        Some(booking_body(&clinic, clinic.patient, "10:00", "10:30")),
    ).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_slot_routes() {
    let clinic = Clinic::new().await;
    let api = Api::new(&clinic);
    clinic.add_schedule("09:00", "10:00", 30).await;
    clinic.booking.book_appointment(clinic.request("09:30", "10:00")).await.unwrap();
    let patient = api.bearer(clinic.patient, "patient");

    let (status, body) = send(
        &api.slots, Method::GET, &format!("/?doctor_id={}&date={}", clinic.doctor, monday()), Some(&patient), None,
    ).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["slots"][0]["is_available"], true);
    assert_eq!(body["slots"][1]["is_available"], false);

    let (status, body) = send(
        &api.slots, Method::GET,
        &format!("/next?doctor_id={}&day_of_week=MONDAY&from=2026-02-27", clinic.doctor),
        Some(&patient), None,
    ).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["date"], "2026-03-02");
    assert_eq!(body["slots"].as_array().unwrap().len(), 2);
}
