// libs/appointment-cell/src/router.rs
use axum::{
    Router,
    routing::{get, patch, post},
    middleware,
};

use shared_utils::extractor::auth_middleware;

use crate::handlers::{self, AppointmentState};

pub fn appointment_routes(state: AppointmentState) -> Router {
    Router::new()
        .route("/", post(handlers::book_appointment).get(handlers::list_appointments))
        .route("/conflicts/check", post(handlers::check_conflicts))
        .route(
            "/{appointment_id}",
            get(handlers::get_appointment).delete(handlers::delete_appointment),
        )
        .route("/{appointment_id}/reschedule", patch(handlers::reschedule_appointment))
        .route("/{appointment_id}/check-in", post(handlers::check_in_appointment))
        .route("/{appointment_id}/complete", post(handlers::complete_appointment))
        .route("/{appointment_id}/cancel", post(handlers::cancel_appointment))
        .layer(middleware::from_fn_with_state(state.config.clone(), auth_middleware))
        .with_state(state)
}

pub fn slot_routes(state: AppointmentState) -> Router {
    Router::new()
        .route("/", get(handlers::get_available_slots))
        .route("/next", get(handlers::get_next_slots))
        .layer(middleware::from_fn_with_state(state.config.clone(), auth_middleware))
        .with_state(state)
}

pub fn case_record_routes(state: AppointmentState) -> Router {
    Router::new()
        .route("/", post(handlers::create_case_record).get(handlers::list_case_records))
        .route(
            "/{record_id}",
            get(handlers::get_case_record)
                .put(handlers::update_case_record)
                .delete(handlers::delete_case_record),
        )
        .layer(middleware::from_fn_with_state(state.config.clone(), auth_middleware))
        .with_state(state)
}
