// libs/appointment-cell/src/models.rs
use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use shared_database::{DatabaseError, LockTimeout};
use shared_models::time::TimeRange;

// ==============================================================================
// CORE APPOINTMENT MODELS
// ==============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub room_id: Uuid,
    pub appointment_date: NaiveDate,
    pub time_range: TimeRange,
    pub reason_for_visit: Option<String>,
    pub status: AppointmentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Appointment {
    /// New appointment in `BOOKED` for an already conflict-checked candidate.
    pub fn booked(candidate: &BookingCandidate, reason_for_visit: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            patient_id: candidate.patient_id,
            doctor_id: candidate.doctor_id,
            room_id: candidate.room_id,
            appointment_date: candidate.date,
            time_range: candidate.time_range,
            reason_for_visit,
            status: AppointmentStatus::Booked,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }

    pub fn candidate(&self) -> BookingCandidate {
        BookingCandidate {
            doctor_id: self.doctor_id,
            patient_id: self.patient_id,
            room_id: self.room_id,
            date: self.appointment_date,
            time_range: self.time_range,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AppointmentStatus {
    Booked,
    CheckedIn,
    Completed,
    Cancelled,
}

impl AppointmentStatus {
    /// BOOKED and CHECKED_IN hold their doctor, patient and room.
    pub fn is_active(&self) -> bool {
        matches!(self, AppointmentStatus::Booked | AppointmentStatus::CheckedIn)
    }

    pub fn is_terminal(&self) -> bool {
        !self.is_active()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentStatus::Booked => "BOOKED",
            AppointmentStatus::CheckedIn => "CHECKED_IN",
            AppointmentStatus::Completed => "COMPLETED",
            AppointmentStatus::Cancelled => "CANCELLED",
        }
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The resources and time a booking would occupy.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BookingCandidate {
    pub doctor_id: Uuid,
    pub patient_id: Uuid,
    pub room_id: Uuid,
    #[serde(rename = "appointment_date")]
    pub date: NaiveDate,
    pub time_range: TimeRange,
}

// ==============================================================================
// REQUEST MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookAppointmentRequest {
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub room_id: Uuid,
    pub appointment_date: NaiveDate,
    pub time_range: TimeRange,
    pub reason_for_visit: Option<String>,
}

impl BookAppointmentRequest {
    pub fn candidate(&self) -> BookingCandidate {
        BookingCandidate {
            doctor_id: self.doctor_id,
            patient_id: self.patient_id,
            room_id: self.room_id,
            date: self.appointment_date,
            time_range: self.time_range,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RescheduleRequest {
    pub appointment_date: Option<NaiveDate>,
    pub time_range: Option<TimeRange>,
    pub reason_for_visit: Option<String>,
}

impl RescheduleRequest {
    pub fn moves_slot(&self) -> bool {
        self.appointment_date.is_some() || self.time_range.is_some()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConflictCheckRequest {
    #[serde(flatten)]
    pub candidate: BookingCandidate,
    pub exclude_appointment_id: Option<Uuid>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppointmentQuery {
    pub patient_id: Option<Uuid>,
    pub doctor_id: Option<Uuid>,
    pub room_id: Option<Uuid>,
    pub status: Option<AppointmentStatus>,
    pub date: Option<NaiveDate>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

impl AppointmentQuery {
    pub const DEFAULT_LIMIT: usize = 50;

    pub fn matches(&self, appointment: &Appointment) -> bool {
        self.patient_id.map_or(true, |id| appointment.patient_id == id)
            && self.doctor_id.map_or(true, |id| appointment.doctor_id == id)
            && self.room_id.map_or(true, |id| appointment.room_id == id)
            && self.status.map_or(true, |status| appointment.status == status)
            && self.date.map_or(true, |date| appointment.appointment_date == date)
    }

    pub fn limit(&self) -> usize {
        self.limit.unwrap_or(Self::DEFAULT_LIMIT)
    }

    pub fn offset(&self) -> usize {
        self.offset.unwrap_or(0)
    }
}

// ==============================================================================
// CONFLICT MODELS
// ==============================================================================

/// Why a candidate booking was rejected. Variants are listed in the order
/// the checks run; only the first failing check is reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictReason {
    ExactSlot,
    Patient,
    Doctor,
    Room,
}

impl ConflictReason {
    pub fn message(&self) -> &'static str {
        match self {
            ConflictReason::ExactSlot => "This schedule slot is already booked",
            ConflictReason::Patient => "Patient has a conflicting appointment during this time",
            ConflictReason::Doctor => "Doctor is already booked at this time",
            ConflictReason::Room => "Room is already occupied at this time",
        }
    }
}

impl fmt::Display for ConflictReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConflictCheckResponse {
    pub has_conflict: bool,
    pub reason: Option<ConflictReason>,
    pub message: Option<String>,
    pub conflicting_appointment_id: Option<Uuid>,
}

impl ConflictCheckResponse {
    pub fn clear() -> Self {
        Self {
            has_conflict: false,
            reason: None,
            message: None,
            conflicting_appointment_id: None,
        }
    }

    /// Same verdict without the id of the appointment it collided with.
    pub fn without_appointment_id(self) -> Self {
        Self { conflicting_appointment_id: None, ..self }
    }

    pub fn conflict(reason: ConflictReason, appointment_id: Uuid) -> Self {
        Self {
            has_conflict: true,
            reason: Some(reason),
            message: Some(reason.message().to_string()),
            conflicting_appointment_id: Some(appointment_id),
        }
    }
}

// ==============================================================================
// SLOT MODELS
// ==============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Slot {
    pub time_range: TimeRange,
    pub is_available: bool,
    pub room_id: Uuid,
    pub schedule_id: Uuid,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatedSlots {
    pub date: NaiveDate,
    pub slots: Vec<Slot>,
}

// ==============================================================================
// CASE RECORD MODELS
// ==============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Vitals {
    pub blood_pressure: Option<String>,
    pub temperature: Option<String>,
    pub heart_rate: Option<String>,
    pub weight: Option<String>,
    pub height: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseRecord {
    pub id: Uuid,
    pub appointment_id: Uuid,
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub chief_complaint: String,
    pub diagnosis: String,
    pub prescription: Option<String>,
    pub notes: Option<String>,
    pub vitals: Option<Vitals>,
    pub visit_date: NaiveDate,
    pub follow_up_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CaseRecord {
    /// Patient, doctor and visit date are taken from the appointment.
    pub fn for_appointment(appointment: &Appointment, request: CreateCaseRecordRequest) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            appointment_id: appointment.id,
            patient_id: appointment.patient_id,
            doctor_id: appointment.doctor_id,
            chief_complaint: request.chief_complaint.trim().to_string(),
            diagnosis: request.diagnosis.trim().to_string(),
            prescription: request.prescription,
            notes: request.notes,
            vitals: request.vitals,
            visit_date: appointment.appointment_date,
            follow_up_date: request.follow_up_date,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateCaseRecordRequest {
    pub appointment_id: Uuid,
    pub chief_complaint: String,
    pub diagnosis: String,
    pub prescription: Option<String>,
    pub notes: Option<String>,
    pub vitals: Option<Vitals>,
    pub follow_up_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateCaseRecordRequest {
    pub chief_complaint: Option<String>,
    pub diagnosis: Option<String>,
    pub prescription: Option<String>,
    pub notes: Option<String>,
    pub vitals: Option<Vitals>,
    pub follow_up_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CaseRecordQuery {
    pub patient_id: Option<Uuid>,
    pub doctor_id: Option<Uuid>,
    pub appointment_id: Option<Uuid>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

impl CaseRecordQuery {
    pub fn matches(&self, record: &CaseRecord) -> bool {
        self.patient_id.map_or(true, |id| record.patient_id == id)
            && self.doctor_id.map_or(true, |id| record.doctor_id == id)
            && self.appointment_id.map_or(true, |id| record.appointment_id == id)
    }

    pub fn limit(&self) -> usize {
        self.limit.unwrap_or(AppointmentQuery::DEFAULT_LIMIT)
    }

    pub fn offset(&self) -> usize {
        self.offset.unwrap_or(0)
    }
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Debug, Clone, thiserror::Error)]
pub enum AppointmentError {
    #[error("{0}")]
    Conflict(ConflictReason),

    #[error("Cannot {action} an appointment that is {current}")]
    InvalidState {
        current: AppointmentStatus,
        action: &'static str,
    },

    #[error("{0}")]
    Precondition(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("A case record already exists for this appointment")]
    CaseRecordExists,

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Scheduling resource is busy, please retry")]
    LockTimeout,

    #[error("Database error: {0}")]
    Database(String),
}

impl AppointmentError {
    pub fn case_record_required() -> Self {
        AppointmentError::Precondition(
            "Cannot complete appointment without a medical case record. Please add a case record first."
                .to_string(),
        )
    }
}

impl From<DatabaseError> for AppointmentError {
    fn from(error: DatabaseError) -> Self {
        match error {
            DatabaseError::NotFound(_) => AppointmentError::NotFound("Record"),
            other => AppointmentError::Database(other.to_string()),
        }
    }
}

impl From<LockTimeout> for AppointmentError {
    fn from(_: LockTimeout) -> Self {
        AppointmentError::LockTimeout
    }
}
