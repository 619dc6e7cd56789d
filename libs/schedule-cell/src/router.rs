// libs/schedule-cell/src/router.rs
use axum::{
    Router,
    routing::get,
    middleware,
};

use shared_utils::extractor::auth_middleware;

use crate::handlers::{self, ScheduleState};

pub fn schedule_routes(state: ScheduleState) -> Router {
    Router::new()
        .route("/", get(handlers::list_schedules).post(handlers::create_schedule))
        .route(
            "/{schedule_id}",
            get(handlers::get_schedule)
                .put(handlers::update_schedule)
                .delete(handlers::delete_schedule),
        )
        .layer(middleware::from_fn_with_state(state.config.clone(), auth_middleware))
        .with_state(state)
}
