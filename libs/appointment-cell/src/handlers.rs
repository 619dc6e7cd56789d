// libs/appointment-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    Json,
};
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::{Caller, Role, User};
use shared_models::error::AppError;
use shared_models::time::DayOfWeek;
use shared_utils::extractor::require_role;

use crate::models::{
    Appointment, AppointmentError, AppointmentQuery, BookAppointmentRequest, CaseRecordQuery,
    ConflictCheckRequest, CreateCaseRecordRequest, RescheduleRequest, UpdateCaseRecordRequest,
};
use crate::services::{AppointmentBookingService, AvailabilityService, CaseRecordService};

#[derive(Clone)]
pub struct AppointmentState {
    pub config: Arc<AppConfig>,
    pub booking: Arc<AppointmentBookingService>,
    pub availability: Arc<AvailabilityService>,
    pub case_records: Arc<CaseRecordService>,
}

impl From<AppointmentError> for AppError {
    fn from(error: AppointmentError) -> Self {
        match error {
            AppointmentError::Conflict(reason) => AppError::Conflict(reason.message().to_string()),
            AppointmentError::InvalidState { .. } => AppError::InvalidState(error.to_string()),
            AppointmentError::Precondition(msg) => AppError::PreconditionFailed(msg),
            AppointmentError::Forbidden(msg) => AppError::Forbidden(msg),
            AppointmentError::NotFound(_) => AppError::NotFound(error.to_string()),
            AppointmentError::CaseRecordExists => AppError::Conflict(error.to_string()),
            AppointmentError::Validation(msg) => AppError::ValidationError(msg),
            AppointmentError::LockTimeout => AppError::ServiceUnavailable(error.to_string()),
            AppointmentError::Database(msg) => AppError::Database(msg),
        }
    }
}

// ==============================================================================
// QUERY PARAMETER STRUCTS
// ==============================================================================

#[derive(Debug, Deserialize)]
pub struct SlotQueryParams {
    pub doctor_id: Uuid,
    pub date: NaiveDate,
}

#[derive(Debug, Deserialize)]
pub struct NextSlotQueryParams {
    pub doctor_id: Uuid,
    pub day_of_week: DayOfWeek,
    pub from: Option<NaiveDate>,
}

// ==============================================================================
// ACCESS POLICY
// ==============================================================================

/// Staff see every appointment; doctors and patients only their own.
fn ensure_participant(caller: &Caller, appointment: &Appointment) -> Result<(), AppError> {
    let allowed = match caller.role {
        Role::Staff => true,
        Role::Doctor => appointment.doctor_id == caller.id,
        Role::Patient => appointment.patient_id == caller.id,
    };
    if allowed {
        Ok(())
    } else {
        Err(AppError::Forbidden("Not authorized to access this appointment".to_string()))
    }
}

async fn load_for_caller(
    state: &AppointmentState,
    caller: &Caller,
    appointment_id: Uuid,
) -> Result<Appointment, AppError> {
    let appointment = state.booking.get_appointment(appointment_id).await?;
    ensure_participant(caller, &appointment)?;
    Ok(appointment)
}

// ==============================================================================
// APPOINTMENT HANDLERS
// ==============================================================================

pub async fn book_appointment(
    State(state): State<AppointmentState>,
    Extension(user): Extension<User>,
    Json(request): Json<BookAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    let caller = user.caller()?;

    match caller.role {
        Role::Patient if request.patient_id != caller.id => {
            return Err(AppError::Forbidden("Patients can only book appointments for themselves".to_string()));
        }
        Role::Doctor if request.doctor_id != caller.id => {
            return Err(AppError::Forbidden("Doctors can only book their own appointments".to_string()));
        }
        _ => {}
    }

    let appointment = state.booking.book_appointment(request).await?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment,
        "message": "Appointment booked successfully"
    })))
}

pub async fn list_appointments(
    State(state): State<AppointmentState>,
    Extension(user): Extension<User>,
    Query(mut query): Query<AppointmentQuery>,
) -> Result<Json<Value>, AppError> {
    let caller = user.caller()?;

    match caller.role {
        Role::Patient => query.patient_id = Some(caller.id),
        Role::Doctor => query.doctor_id = Some(caller.id),
        Role::Staff => {}
    }

    let appointments = state.booking.search_appointments(&query).await?;

    Ok(Json(json!({
        "success": true,
        "appointments": appointments,
        "count": appointments.len(),
        "limit": query.limit(),
        "offset": query.offset()
    })))
}

pub async fn get_appointment(
    State(state): State<AppointmentState>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let caller = user.caller()?;
    let appointment = load_for_caller(&state, &caller, appointment_id).await?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment
    })))
}

pub async fn delete_appointment(
    State(state): State<AppointmentState>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let caller = user.caller()?;
    let appointment = load_for_caller(&state, &caller, appointment_id).await?;

    if !caller.is_staff() && appointment.is_active() {
        return Err(AppError::Forbidden(
            "Only completed or cancelled appointments can be deleted".to_string(),
        ));
    }

    state.booking.delete_appointment(appointment_id).await?;

    Ok(Json(json!({
        "success": true,
        "message": "Appointment deleted successfully"
    })))
}

pub async fn reschedule_appointment(
    State(state): State<AppointmentState>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
    Json(request): Json<RescheduleRequest>,
) -> Result<Json<Value>, AppError> {
    let caller = user.caller()?;
    load_for_caller(&state, &caller, appointment_id).await?;

    let appointment = state
        .booking
        .reschedule(appointment_id, caller.role, request)
        .await?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment,
        "message": "Appointment updated successfully"
    })))
}

pub async fn check_in_appointment(
    State(state): State<AppointmentState>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let caller = user.caller()?;
    require_role(&caller, &[Role::Staff, Role::Doctor])?;
    load_for_caller(&state, &caller, appointment_id).await?;

    let appointment = state.booking.check_in(appointment_id).await?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment,
        "message": "Patient checked in"
    })))
}

pub async fn complete_appointment(
    State(state): State<AppointmentState>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let caller = user.caller()?;
    require_role(&caller, &[Role::Staff, Role::Doctor])?;
    load_for_caller(&state, &caller, appointment_id).await?;

    let appointment = state.booking.complete(appointment_id).await?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment,
        "message": "Appointment completed"
    })))
}

pub async fn cancel_appointment(
    State(state): State<AppointmentState>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let caller = user.caller()?;
    load_for_caller(&state, &caller, appointment_id).await?;

    let appointment = state.booking.cancel(appointment_id).await?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment,
        "message": "Appointment cancelled"
    })))
}

pub async fn check_conflicts(
    State(state): State<AppointmentState>,
    Extension(user): Extension<User>,
    Json(request): Json<ConflictCheckRequest>,
) -> Result<Json<Value>, AppError> {
    let caller = user.caller()?;

    if caller.is_patient() && request.candidate.patient_id != caller.id {
        return Err(AppError::Forbidden("Patients can only check their own bookings".to_string()));
    }

    let mut result = state
        .booking
        .check_booking_conflict(&request.candidate, request.exclude_appointment_id)
        .await?;
    // The colliding appointment may belong to someone else.
    if !caller.is_staff() {
        result = result.without_appointment_id();
    }

    Ok(Json(json!({
        "success": true,
        "conflict_check": result
    })))
}

// ==============================================================================
// SLOT HANDLERS
// ==============================================================================

pub async fn get_available_slots(
    State(state): State<AppointmentState>,
    Extension(user): Extension<User>,
    Query(params): Query<SlotQueryParams>,
) -> Result<Json<Value>, AppError> {
    user.caller()?;

    let slots = state
        .availability
        .get_available_slots(params.doctor_id, params.date)
        .await?;

    Ok(Json(json!({
        "success": true,
        "doctor_id": params.doctor_id,
        "date": params.date,
        "slots": slots
    })))
}

pub async fn get_next_slots(
    State(state): State<AppointmentState>,
    Extension(user): Extension<User>,
    Query(params): Query<NextSlotQueryParams>,
) -> Result<Json<Value>, AppError> {
    user.caller()?;

    let from = params.from.unwrap_or_else(|| Utc::now().date_naive());
    let dated = state
        .availability
        .get_slots_for_next(params.doctor_id, params.day_of_week, from)
        .await?;

    Ok(Json(json!({
        "success": true,
        "doctor_id": params.doctor_id,
        "date": dated.date,
        "slots": dated.slots
    })))
}

// ==============================================================================
// CASE RECORD HANDLERS
// ==============================================================================

pub async fn create_case_record(
    State(state): State<AppointmentState>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateCaseRecordRequest>,
) -> Result<Json<Value>, AppError> {
    let caller = user.caller()?;
    let record = state.case_records.create_case_record(&caller, request).await?;

    Ok(Json(json!({
        "success": true,
        "case_record": record,
        "message": "Case record created successfully"
    })))
}

pub async fn list_case_records(
    State(state): State<AppointmentState>,
    Extension(user): Extension<User>,
    Query(query): Query<CaseRecordQuery>,
) -> Result<Json<Value>, AppError> {
    let caller = user.caller()?;
    let records = state.case_records.list_case_records(&caller, query).await?;

    Ok(Json(json!({
        "success": true,
        "case_records": records,
        "count": records.len()
    })))
}

pub async fn get_case_record(
    State(state): State<AppointmentState>,
    Extension(user): Extension<User>,
    Path(record_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let caller = user.caller()?;
    let record = state.case_records.get_case_record(&caller, record_id).await?;

    Ok(Json(json!({
        "success": true,
        "case_record": record
    })))
}

pub async fn update_case_record(
    State(state): State<AppointmentState>,
    Extension(user): Extension<User>,
    Path(record_id): Path<Uuid>,
    Json(request): Json<UpdateCaseRecordRequest>,
) -> Result<Json<Value>, AppError> {
    let caller = user.caller()?;
    let record = state.case_records.update_case_record(&caller, record_id, request).await?;

    Ok(Json(json!({
        "success": true,
        "case_record": record,
        "message": "Case record updated successfully"
    })))
}

pub async fn delete_case_record(
    State(state): State<AppointmentState>,
    Extension(user): Extension<User>,
    Path(record_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let caller = user.caller()?;
    state.case_records.delete_case_record(&caller, record_id).await?;

    Ok(Json(json!({
        "success": true,
        "message": "Case record deleted successfully"
    })))
}
