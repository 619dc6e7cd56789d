use axum::{routing::get, Router};

use appointment_cell::handlers::AppointmentState;
use appointment_cell::router::{appointment_routes, case_record_routes, slot_routes};
use schedule_cell::handlers::ScheduleState;
use schedule_cell::router::schedule_routes;

pub fn create_router(schedules: ScheduleState, appointments: AppointmentState) -> Router {
    Router::new()
        .route("/", get(|| async { "Clinic scheduling API is running!" }))
        .nest("/schedules", schedule_routes(schedules))
        .nest("/appointments", appointment_routes(appointments.clone()))
        .nest("/slots", slot_routes(appointments.clone()))
        .nest("/case-records", case_record_routes(appointments))
}
