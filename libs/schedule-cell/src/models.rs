// libs/schedule-cell/src/models.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use shared_database::{DatabaseError, LockTimeout};
use shared_models::time::{DayOfWeek, TimeRange};

// ==============================================================================
// CORE SCHEDULE MODELS
// ==============================================================================

/// Weekly-repeating availability template for one doctor in one room.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DoctorSchedule {
    pub id: Uuid,
    pub doctor_id: Uuid,
    pub room_id: Uuid,
    pub day_of_week: DayOfWeek,
    pub time_range: TimeRange,
    pub slot_duration_minutes: u32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DoctorSchedule {
    pub fn from_draft(draft: ScheduleDraft) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            doctor_id: draft.doctor_id,
            room_id: draft.room_id,
            day_of_week: draft.day_of_week,
            time_range: draft.time_range,
            slot_duration_minutes: draft.slot_duration_minutes,
            is_active: draft.is_active,
            created_at: now,
            updated_at: now,
        }
    }

    /// Replace every editable field with the draft's, keeping identity and
    /// creation time.
    pub fn apply_draft(&mut self, draft: ScheduleDraft) {
        self.doctor_id = draft.doctor_id;
        self.room_id = draft.room_id;
        self.day_of_week = draft.day_of_week;
        self.time_range = draft.time_range;
        self.slot_duration_minutes = draft.slot_duration_minutes;
        self.is_active = draft.is_active;
        self.updated_at = Utc::now();
    }

    pub fn to_draft(&self) -> ScheduleDraft {
        ScheduleDraft {
            doctor_id: self.doctor_id,
            room_id: self.room_id,
            day_of_week: self.day_of_week,
            time_range: self.time_range,
            slot_duration_minutes: self.slot_duration_minutes,
            is_active: self.is_active,
        }
    }
}

/// Full set of editable schedule fields, as written by create and update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleDraft {
    pub doctor_id: Uuid,
    pub room_id: Uuid,
    pub day_of_week: DayOfWeek,
    pub time_range: TimeRange,
    pub slot_duration_minutes: u32,
    pub is_active: bool,
}

// ==============================================================================
// REQUEST/QUERY MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateScheduleRequest {
    pub doctor_id: Uuid,
    pub room_id: Uuid,
    pub day_of_week: DayOfWeek,
    pub time_range: TimeRange,
    pub slot_duration_minutes: u32,
    pub is_active: Option<bool>,
}

impl CreateScheduleRequest {
    pub fn into_draft(self) -> ScheduleDraft {
        ScheduleDraft {
            doctor_id: self.doctor_id,
            room_id: self.room_id,
            day_of_week: self.day_of_week,
            time_range: self.time_range,
            slot_duration_minutes: self.slot_duration_minutes,
            is_active: self.is_active.unwrap_or(true),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateScheduleRequest {
    pub doctor_id: Option<Uuid>,
    pub room_id: Option<Uuid>,
    pub day_of_week: Option<DayOfWeek>,
    pub time_range: Option<TimeRange>,
    pub slot_duration_minutes: Option<u32>,
    pub is_active: Option<bool>,
}

impl UpdateScheduleRequest {
    pub fn merge_into(self, mut draft: ScheduleDraft) -> ScheduleDraft {
        if let Some(doctor_id) = self.doctor_id {
            draft.doctor_id = doctor_id;
        }
        if let Some(room_id) = self.room_id {
            draft.room_id = room_id;
        }
        if let Some(day) = self.day_of_week {
            draft.day_of_week = day;
        }
        if let Some(range) = self.time_range {
            draft.time_range = range;
        }
        if let Some(duration) = self.slot_duration_minutes {
            draft.slot_duration_minutes = duration;
        }
        if let Some(active) = self.is_active {
            draft.is_active = active;
        }
        draft
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScheduleQuery {
    pub doctor_id: Option<Uuid>,
    pub room_id: Option<Uuid>,
    pub day_of_week: Option<DayOfWeek>,
    pub is_active: Option<bool>,
}

impl ScheduleQuery {
    pub fn matches(&self, schedule: &DoctorSchedule) -> bool {
        self.doctor_id.map_or(true, |id| schedule.doctor_id == id)
            && self.room_id.map_or(true, |id| schedule.room_id == id)
            && self.day_of_week.map_or(true, |day| schedule.day_of_week == day)
            && self.is_active.map_or(true, |active| schedule.is_active == active)
    }

    /// Active schedules of one doctor on one weekday.
    pub fn active_for_doctor(doctor_id: Uuid, day_of_week: DayOfWeek) -> Self {
        Self {
            doctor_id: Some(doctor_id),
            day_of_week: Some(day_of_week),
            is_active: Some(true),
            ..Self::default()
        }
    }
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Debug, Clone, thiserror::Error)]
pub enum ScheduleError {
    #[error("Schedule not found")]
    NotFound,

    #[error("Doctor not found")]
    DoctorNotFound,

    #[error("Room not found")]
    RoomNotFound,

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Scheduling resource is busy, please retry")]
    LockTimeout,

    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl From<DatabaseError> for ScheduleError {
    fn from(error: DatabaseError) -> Self {
        match error {
            DatabaseError::NotFound(_) => ScheduleError::NotFound,
            other => ScheduleError::DatabaseError(other.to_string()),
        }
    }
}

impl From<LockTimeout> for ScheduleError {
    fn from(_: LockTimeout) -> Self {
        ScheduleError::LockTimeout
    }
}
