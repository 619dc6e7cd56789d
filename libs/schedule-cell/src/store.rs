// libs/schedule-cell/src/store.rs
use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use shared_database::{DatabaseError, SupabaseClient};
use shared_models::time::{format_clock_time, DayOfWeek, TimeRange};

use crate::models::{DoctorSchedule, ScheduleQuery};

#[async_trait]
pub trait ScheduleStore: Send + Sync {
    async fn get(&self, id: Uuid) -> Result<Option<DoctorSchedule>, DatabaseError>;

    /// Matching schedules ordered by weekday (Sunday first) then start time.
    async fn list(&self, query: &ScheduleQuery) -> Result<Vec<DoctorSchedule>, DatabaseError>;

    async fn insert(&self, schedule: &DoctorSchedule) -> Result<DoctorSchedule, DatabaseError>;
    async fn update(&self, schedule: &DoctorSchedule) -> Result<DoctorSchedule, DatabaseError>;

    /// Returns false when nothing was deleted.
    async fn delete(&self, id: Uuid) -> Result<bool, DatabaseError>;
}

fn sort_schedules(schedules: &mut [DoctorSchedule]) {
    schedules.sort_by_key(|s| (s.day_of_week.index(), s.time_range.start_time(), s.created_at));
}

// ==============================================================================
// IN-MEMORY STORE
// ==============================================================================

#[derive(Default)]
pub struct InMemoryScheduleStore {
    schedules: RwLock<HashMap<Uuid, DoctorSchedule>>,
}

impl InMemoryScheduleStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ScheduleStore for InMemoryScheduleStore {
    async fn get(&self, id: Uuid) -> Result<Option<DoctorSchedule>, DatabaseError> {
        Ok(self.schedules.read().await.get(&id).cloned())
    }

    async fn list(&self, query: &ScheduleQuery) -> Result<Vec<DoctorSchedule>, DatabaseError> {
        let mut matching: Vec<DoctorSchedule> = self
            .schedules
            .read()
            .await
            .values()
            .filter(|schedule| query.matches(schedule))
            .cloned()
            .collect();
        sort_schedules(&mut matching);
        Ok(matching)
    }

    async fn insert(&self, schedule: &DoctorSchedule) -> Result<DoctorSchedule, DatabaseError> {
        let mut schedules = self.schedules.write().await;
        if schedules.contains_key(&schedule.id) {
            return Err(DatabaseError::Conflict(format!("schedule {} already exists", schedule.id)));
        }
        schedules.insert(schedule.id, schedule.clone());
        Ok(schedule.clone())
    }

    async fn update(&self, schedule: &DoctorSchedule) -> Result<DoctorSchedule, DatabaseError> {
        let mut schedules = self.schedules.write().await;
        match schedules.get_mut(&schedule.id) {
            Some(existing) => {
                *existing = schedule.clone();
                Ok(schedule.clone())
            }
            None => Err(DatabaseError::NotFound(format!("schedule {}", schedule.id))),
        }
    }

    async fn delete(&self, id: Uuid) -> Result<bool, DatabaseError> {
        Ok(self.schedules.write().await.remove(&id).is_some())
    }
}

// ==============================================================================
// SUPABASE STORE
// ==============================================================================

/// Row layout of the `doctor_schedules` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DoctorScheduleRow {
    pub id: Uuid,
    pub doctor_id: Uuid,
    pub room_id: Uuid,
    pub day_of_week: DayOfWeek,
    pub start_time: String,
    pub end_time: String,
    pub slot_duration: u32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&DoctorSchedule> for DoctorScheduleRow {
    fn from(schedule: &DoctorSchedule) -> Self {
        Self {
            id: schedule.id,
            doctor_id: schedule.doctor_id,
            room_id: schedule.room_id,
            day_of_week: schedule.day_of_week,
            start_time: format_clock_time(&schedule.time_range.start_time()),
            end_time: format_clock_time(&schedule.time_range.end_time()),
            slot_duration: schedule.slot_duration_minutes,
            is_active: schedule.is_active,
            created_at: schedule.created_at,
            updated_at: schedule.updated_at,
        }
    }
}

impl TryFrom<DoctorScheduleRow> for DoctorSchedule {
    type Error = DatabaseError;

    fn try_from(row: DoctorScheduleRow) -> Result<Self, Self::Error> {
        let time_range = TimeRange::parse(&row.start_time, &row.end_time)
            .map_err(|e| DatabaseError::InvalidRecord(format!("schedule {}: {}", row.id, e)))?;

        Ok(Self {
            id: row.id,
            doctor_id: row.doctor_id,
            room_id: row.room_id,
            day_of_week: row.day_of_week,
            time_range,
            slot_duration_minutes: row.slot_duration,
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

pub struct SupabaseScheduleStore {
    supabase: Arc<SupabaseClient>,
}

impl SupabaseScheduleStore {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }

    fn parse_rows(rows: Vec<Value>) -> Result<Vec<DoctorSchedule>, DatabaseError> {
        rows.into_iter()
            .map(|row| {
                let row: DoctorScheduleRow = serde_json::from_value(row)?;
                DoctorSchedule::try_from(row)
            })
            .collect()
    }

    async fn write(&self, method: Method, path: &str, schedule: &DoctorSchedule) -> Result<DoctorSchedule, DatabaseError> {
        let body = serde_json::to_value(DoctorScheduleRow::from(schedule))?;
        let rows: Vec<Value> = self.supabase.request_with_headers(
            method,
            path,
            None,
            Some(body),
            Some(SupabaseClient::representation_headers()),
        ).await?;

        Self::parse_rows(rows)?
            .into_iter()
            .next()
            .ok_or_else(|| DatabaseError::NotFound(format!("schedule {}", schedule.id)))
    }
}

#[async_trait]
impl ScheduleStore for SupabaseScheduleStore {
    async fn get(&self, id: Uuid) -> Result<Option<DoctorSchedule>, DatabaseError> {
        let path = format!("/rest/v1/doctor_schedules?id=eq.{}", id);
        let rows: Vec<Value> = self.supabase.request(Method::GET, &path, None, None).await?;
        Ok(Self::parse_rows(rows)?.into_iter().next())
    }

    async fn list(&self, query: &ScheduleQuery) -> Result<Vec<DoctorSchedule>, DatabaseError> {
        let mut query_parts = Vec::new();
        if let Some(doctor_id) = query.doctor_id {
            query_parts.push(format!("doctor_id=eq.{}", doctor_id));
        }
        if let Some(room_id) = query.room_id {
            query_parts.push(format!("room_id=eq.{}", room_id));
        }
        if let Some(day) = query.day_of_week {
            query_parts.push(format!("day_of_week=eq.{}", day));
        }
        if let Some(active) = query.is_active {
            query_parts.push(format!("is_active=eq.{}", active));
        }
        query_parts.push("order=start_time.asc".to_string());

        let path = format!("/rest/v1/doctor_schedules?{}", query_parts.join("&"));
        debug!("Listing schedules: {}", path);

        let rows: Vec<Value> = self.supabase.request(Method::GET, &path, None, None).await?;
        let mut schedules = Self::parse_rows(rows)?;
        sort_schedules(&mut schedules);
        Ok(schedules)
    }

    async fn insert(&self, schedule: &DoctorSchedule) -> Result<DoctorSchedule, DatabaseError> {
        self.write(Method::POST, "/rest/v1/doctor_schedules", schedule).await
    }

    async fn update(&self, schedule: &DoctorSchedule) -> Result<DoctorSchedule, DatabaseError> {
        let path = format!("/rest/v1/doctor_schedules?id=eq.{}", schedule.id);
        self.write(Method::PATCH, &path, schedule).await
    }

    async fn delete(&self, id: Uuid) -> Result<bool, DatabaseError> {
        let path = format!("/rest/v1/doctor_schedules?id=eq.{}", id);
        let rows: Vec<Value> = self.supabase.request_with_headers(
            Method::DELETE,
            &path,
            None,
            None,
            Some(SupabaseClient::representation_headers()),
        ).await?;
        Ok(!rows.is_empty())
    }
}
