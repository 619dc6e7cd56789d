// libs/schedule-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    Json,
};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::{Role, User};
use shared_models::error::AppError;
use shared_utils::extractor::require_role;

use crate::models::{CreateScheduleRequest, ScheduleError, ScheduleQuery, UpdateScheduleRequest};
use crate::services::ScheduleService;

#[derive(Clone)]
pub struct ScheduleState {
    pub config: Arc<AppConfig>,
    pub service: Arc<ScheduleService>,
}

impl From<ScheduleError> for AppError {
    fn from(error: ScheduleError) -> Self {
        match error {
            ScheduleError::NotFound
            | ScheduleError::DoctorNotFound
            | ScheduleError::RoomNotFound => AppError::NotFound(error.to_string()),
            ScheduleError::Forbidden(msg) => AppError::Forbidden(msg),
            ScheduleError::Conflict(msg) => AppError::Conflict(msg),
            ScheduleError::ValidationError(msg) => AppError::ValidationError(msg),
            ScheduleError::LockTimeout => AppError::ServiceUnavailable(error.to_string()),
            ScheduleError::DatabaseError(msg) => AppError::Database(msg),
        }
    }
}

/// Roles allowed to create, change or delete schedules.
const SCHEDULE_ROLES: &[Role] = &[Role::Staff, Role::Doctor];

pub async fn create_schedule(
    State(state): State<ScheduleState>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateScheduleRequest>,
) -> Result<Json<Value>, AppError> {
    let caller = user.caller()?;
    require_role(&caller, SCHEDULE_ROLES)?;

    let schedule = state.service.create_schedule(&caller, request).await?;

    Ok(Json(json!({
        "success": true,
        "schedule": schedule,
        "message": "Schedule created successfully"
    })))
}

/// Any authenticated caller may read schedules; patients use them to find
/// a doctor's working days.
pub async fn list_schedules(
    State(state): State<ScheduleState>,
    Extension(user): Extension<User>,
    Query(query): Query<ScheduleQuery>,
) -> Result<Json<Value>, AppError> {
    user.caller()?;

    let schedules = state.service.list_schedules(&query).await?;

    Ok(Json(json!({
        "success": true,
        "schedules": schedules,
        "count": schedules.len()
    })))
}

pub async fn get_schedule(
    State(state): State<ScheduleState>,
    Extension(user): Extension<User>,
    Path(schedule_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    user.caller()?;

    let schedule = state.service.get_schedule(schedule_id).await?;

    Ok(Json(json!({
        "success": true,
        "schedule": schedule
    })))
}

pub async fn update_schedule(
    State(state): State<ScheduleState>,
    Extension(user): Extension<User>,
    Path(schedule_id): Path<Uuid>,
    Json(request): Json<UpdateScheduleRequest>,
) -> Result<Json<Value>, AppError> {
    let caller = user.caller()?;
    require_role(&caller, SCHEDULE_ROLES)?;

    let schedule = state.service.update_schedule(&caller, schedule_id, request).await?;

    Ok(Json(json!({
        "success": true,
        "schedule": schedule,
        "message": "Schedule updated successfully"
    })))
}

pub async fn delete_schedule(
    State(state): State<ScheduleState>,
    Extension(user): Extension<User>,
    Path(schedule_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let caller = user.caller()?;
    require_role(&caller, SCHEDULE_ROLES)?;

    state.service.delete_schedule(&caller, schedule_id).await?;

    Ok(Json(json!({
        "success": true,
        "message": "Schedule deleted successfully"
    })))
}
