// libs/appointment-cell/src/store.rs
//
// Persistence seams for appointments and case records. Services only see the
// traits; the API binary picks the in-memory or Supabase adapters.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use shared_database::{DatabaseError, SupabaseClient};
use shared_models::time::{format_clock_time, TimeRange};

use crate::models::{
    Appointment, AppointmentQuery, AppointmentStatus, CaseRecord, CaseRecordQuery, Vitals,
};

/// A schedulable resource an appointment holds for its duration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceRef {
    Doctor(Uuid),
    Patient(Uuid),
    Room(Uuid),
}

impl ResourceRef {
    fn held_by(&self, appointment: &Appointment) -> bool {
        match *self {
            ResourceRef::Doctor(id) => appointment.doctor_id == id,
            ResourceRef::Patient(id) => appointment.patient_id == id,
            ResourceRef::Room(id) => appointment.room_id == id,
        }
    }

    fn column_filter(&self) -> String {
        match self {
            ResourceRef::Doctor(id) => format!("doctor_id=eq.{}", id),
            ResourceRef::Patient(id) => format!("patient_id=eq.{}", id),
            ResourceRef::Room(id) => format!("room_id=eq.{}", id),
        }
    }
}

#[async_trait]
pub trait AppointmentStore: Send + Sync {
    async fn get(&self, id: Uuid) -> Result<Option<Appointment>, DatabaseError>;

    /// BOOKED and CHECKED_IN appointments holding `resource` on `date`.
    async fn find_active_on(
        &self,
        resource: ResourceRef,
        date: NaiveDate,
    ) -> Result<Vec<Appointment>, DatabaseError>;

    /// Ordered by date then start time, paged by the query's limit/offset.
    async fn list(&self, query: &AppointmentQuery) -> Result<Vec<Appointment>, DatabaseError>;

    async fn insert(&self, appointment: &Appointment) -> Result<Appointment, DatabaseError>;
    async fn update(&self, appointment: &Appointment) -> Result<Appointment, DatabaseError>;
    async fn delete(&self, id: Uuid) -> Result<bool, DatabaseError>;
}

#[async_trait]
pub trait CaseRecordStore: Send + Sync {
    async fn get(&self, id: Uuid) -> Result<Option<CaseRecord>, DatabaseError>;
    async fn find_by_appointment(&self, appointment_id: Uuid) -> Result<Option<CaseRecord>, DatabaseError>;

    async fn exists_for_appointment(&self, appointment_id: Uuid) -> Result<bool, DatabaseError> {
        Ok(self.find_by_appointment(appointment_id).await?.is_some())
    }

    /// Newest first.
    async fn list(&self, query: &CaseRecordQuery) -> Result<Vec<CaseRecord>, DatabaseError>;

    /// Fails with `DatabaseError::Conflict` when the appointment already has a record.
    async fn insert(&self, record: &CaseRecord) -> Result<CaseRecord, DatabaseError>;
    async fn update(&self, record: &CaseRecord) -> Result<CaseRecord, DatabaseError>;
    async fn delete(&self, id: Uuid) -> Result<bool, DatabaseError>;
}

fn page<T>(items: Vec<T>, offset: usize, limit: usize) -> Vec<T> {
    items.into_iter().skip(offset).take(limit).collect()
}

// ==============================================================================
// IN-MEMORY STORES
// ==============================================================================

#[derive(Default)]
pub struct InMemoryAppointmentStore {
    appointments: RwLock<HashMap<Uuid, Appointment>>,
}

impl InMemoryAppointmentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AppointmentStore for InMemoryAppointmentStore {
    async fn get(&self, id: Uuid) -> Result<Option<Appointment>, DatabaseError> {
        Ok(self.appointments.read().await.get(&id).cloned())
    }

    async fn find_active_on(
        &self,
        resource: ResourceRef,
        date: NaiveDate,
    ) -> Result<Vec<Appointment>, DatabaseError> {
        let mut found: Vec<Appointment> = self
            .appointments
            .read()
            .await
            .values()
            .filter(|a| a.appointment_date == date && a.is_active() && resource.held_by(a))
            .cloned()
            .collect();
        found.sort_by_key(|a| (a.time_range.start_time(), a.created_at));
        Ok(found)
    }

    async fn list(&self, query: &AppointmentQuery) -> Result<Vec<Appointment>, DatabaseError> {
        let mut matching: Vec<Appointment> = self
            .appointments
            .read()
            .await
            .values()
            .filter(|a| query.matches(a))
            .cloned()
            .collect();
        matching.sort_by_key(|a| (a.appointment_date, a.time_range.start_time(), a.created_at));
        Ok(page(matching, query.offset(), query.limit()))
    }

    async fn insert(&self, appointment: &Appointment) -> Result<Appointment, DatabaseError> {
        let mut appointments = self.appointments.write().await;
        if appointments.contains_key(&appointment.id) {
            return Err(DatabaseError::Conflict(format!("appointment {} already exists", appointment.id)));
        }
        appointments.insert(appointment.id, appointment.clone());
        Ok(appointment.clone())
    }

    async fn update(&self, appointment: &Appointment) -> Result<Appointment, DatabaseError> {
        let mut appointments = self.appointments.write().await;
        match appointments.get_mut(&appointment.id) {
            Some(existing) => {
                *existing = appointment.clone();
                Ok(appointment.clone())
            }
            None => Err(DatabaseError::NotFound(format!("appointment {}", appointment.id))),
        }
    }

    async fn delete(&self, id: Uuid) -> Result<bool, DatabaseError> {
        Ok(self.appointments.write().await.remove(&id).is_some())
    }
}

#[derive(Default)]
pub struct InMemoryCaseRecordStore {
    records: RwLock<HashMap<Uuid, CaseRecord>>,
}

impl InMemoryCaseRecordStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CaseRecordStore for InMemoryCaseRecordStore {
    async fn get(&self, id: Uuid) -> Result<Option<CaseRecord>, DatabaseError> {
        Ok(self.records.read().await.get(&id).cloned())
    }

    async fn find_by_appointment(&self, appointment_id: Uuid) -> Result<Option<CaseRecord>, DatabaseError> {
        Ok(self
            .records
            .read()
            .await
            .values()
            .find(|r| r.appointment_id == appointment_id)
            .cloned())
    }

    async fn list(&self, query: &CaseRecordQuery) -> Result<Vec<CaseRecord>, DatabaseError> {
        let mut matching: Vec<CaseRecord> = self
            .records
            .read()
            .await
            .values()
            .filter(|r| query.matches(r))
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(page(matching, query.offset(), query.limit()))
    }

    async fn insert(&self, record: &CaseRecord) -> Result<CaseRecord, DatabaseError> {
        let mut records = self.records.write().await;
        if records.values().any(|r| r.appointment_id == record.appointment_id) {
            return Err(DatabaseError::Conflict(format!(
                "case record for appointment {} already exists",
                record.appointment_id
            )));
        }
        records.insert(record.id, record.clone());
        Ok(record.clone())
    }

    async fn update(&self, record: &CaseRecord) -> Result<CaseRecord, DatabaseError> {
        let mut records = self.records.write().await;
        match records.get_mut(&record.id) {
            Some(existing) => {
                *existing = record.clone();
                Ok(record.clone())
            }
            None => Err(DatabaseError::NotFound(format!("case record {}", record.id))),
        }
    }

    async fn delete(&self, id: Uuid) -> Result<bool, DatabaseError> {
        Ok(self.records.write().await.remove(&id).is_some())
    }
}

// ==============================================================================
// SUPABASE STORES
// ==============================================================================

/// Row layout of the `appointments` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppointmentRow {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub room_id: Uuid,
    pub appointment_date: NaiveDate,
    pub start_time: String,
    pub end_time: String,
    pub reason_for_visit: Option<String>,
    pub status: AppointmentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Appointment> for AppointmentRow {
    fn from(appointment: &Appointment) -> Self {
        Self {
            id: appointment.id,
            patient_id: appointment.patient_id,
            doctor_id: appointment.doctor_id,
            room_id: appointment.room_id,
            appointment_date: appointment.appointment_date,
            start_time: format_clock_time(&appointment.time_range.start_time()),
            end_time: format_clock_time(&appointment.time_range.end_time()),
            reason_for_visit: appointment.reason_for_visit.clone(),
            status: appointment.status,
            created_at: appointment.created_at,
            updated_at: appointment.updated_at,
        }
    }
}

impl TryFrom<AppointmentRow> for Appointment {
    type Error = DatabaseError;

    fn try_from(row: AppointmentRow) -> Result<Self, Self::Error> {
        let time_range = TimeRange::parse(&row.start_time, &row.end_time)
            .map_err(|e| DatabaseError::InvalidRecord(format!("appointment {}: {}", row.id, e)))?;

        Ok(Self {
            id: row.id,
            patient_id: row.patient_id,
            doctor_id: row.doctor_id,
            room_id: row.room_id,
            appointment_date: row.appointment_date,
            time_range,
            reason_for_visit: row.reason_for_visit,
            status: row.status,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Row layout of the `case_records` table; vitals are a JSON column.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseRecordRow {
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

impl From<&CaseRecord> for CaseRecordRow {
    fn from(record: &CaseRecord) -> Self {
        Self {
            id: record.id,
            appointment_id: record.appointment_id,
            patient_id: record.patient_id,
            doctor_id: record.doctor_id,
            chief_complaint: record.chief_complaint.clone(),
            diagnosis: record.diagnosis.clone(),
            prescription: record.prescription.clone(),
            notes: record.notes.clone(),
            vitals: record.vitals.clone(),
            visit_date: record.visit_date,
            follow_up_date: record.follow_up_date,
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }
}

impl From<CaseRecordRow> for CaseRecord {
    fn from(row: CaseRecordRow) -> Self {
        Self {
            id: row.id,
            appointment_id: row.appointment_id,
            patient_id: row.patient_id,
            doctor_id: row.doctor_id,
            chief_complaint: row.chief_complaint,
            diagnosis: row.diagnosis,
            prescription: row.prescription,
            notes: row.notes,
            vitals: row.vitals,
            visit_date: row.visit_date,
            follow_up_date: row.follow_up_date,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

async fn fetch_rows(supabase: &SupabaseClient, path: &str) -> Result<Vec<Value>, DatabaseError> {
    debug!("Fetching {}", path);
    supabase.request(Method::GET, path, None, None).await
}

async fn write_rows(
    supabase: &SupabaseClient,
    method: Method,
    path: &str,
    body: Option<Value>,
) -> Result<Vec<Value>, DatabaseError> {
    supabase
        .request_with_headers(method, path, None, body, Some(SupabaseClient::representation_headers()))
        .await
}

fn paging(limit: usize, offset: usize) -> [String; 2] {
    [format!("limit={}", limit), format!("offset={}", offset)]
}

pub struct SupabaseAppointmentStore {
    supabase: Arc<SupabaseClient>,
}

impl SupabaseAppointmentStore {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }

    fn parse_rows(rows: Vec<Value>) -> Result<Vec<Appointment>, DatabaseError> {
        rows.into_iter()
            .map(|row| {
                let row: AppointmentRow = serde_json::from_value(row)?;
                Appointment::try_from(row)
            })
            .collect()
    }

    async fn write_one(&self, method: Method, path: &str, appointment: &Appointment) -> Result<Appointment, DatabaseError> {
        let body = serde_json::to_value(AppointmentRow::from(appointment))?;
        let rows = write_rows(&self.supabase, method, path, Some(body)).await?;
        Self::parse_rows(rows)?
            .into_iter()
            .next()
            .ok_or_else(|| DatabaseError::NotFound(format!("appointment {}", appointment.id)))
    }
}

#[async_trait]
impl AppointmentStore for SupabaseAppointmentStore {
    async fn get(&self, id: Uuid) -> Result<Option<Appointment>, DatabaseError> {
        let path = format!("/rest/v1/appointments?id=eq.{}", id);
        let rows = fetch_rows(&self.supabase, &path).await?;
        Ok(Self::parse_rows(rows)?.into_iter().next())
    }

    async fn find_active_on(
        &self,
        resource: ResourceRef,
        date: NaiveDate,
    ) -> Result<Vec<Appointment>, DatabaseError> {
        let path = format!(
            "/rest/v1/appointments?{}&appointment_date=eq.{}&status=in.(BOOKED,CHECKED_IN)&order=start_time.asc",
            resource.column_filter(),
            date
        );
        let rows = fetch_rows(&self.supabase, &path).await?;
        Self::parse_rows(rows)
    }

    async fn list(&self, query: &AppointmentQuery) -> Result<Vec<Appointment>, DatabaseError> {
        let mut query_parts = Vec::new();
        if let Some(patient_id) = query.patient_id {
            query_parts.push(format!("patient_id=eq.{}", patient_id));
        }
        if let Some(doctor_id) = query.doctor_id {
            query_parts.push(format!("doctor_id=eq.{}", doctor_id));
        }
        if let Some(room_id) = query.room_id {
            query_parts.push(format!("room_id=eq.{}", room_id));
        }
        if let Some(status) = query.status {
            query_parts.push(format!("status=eq.{}", status));
        }
        if let Some(date) = query.date {
            query_parts.push(format!("appointment_date=eq.{}", date));
        }
        query_parts.push("order=appointment_date.asc,start_time.asc".to_string());
        query_parts.extend(paging(query.limit(), query.offset()));

        let path = format!("/rest/v1/appointments?{}", query_parts.join("&"));
        let rows = fetch_rows(&self.supabase, &path).await?;
        Self::parse_rows(rows)
    }

    async fn insert(&self, appointment: &Appointment) -> Result<Appointment, DatabaseError> {
        self.write_one(Method::POST, "/rest/v1/appointments", appointment).await
    }

    async fn update(&self, appointment: &Appointment) -> Result<Appointment, DatabaseError> {
        let path = format!("/rest/v1/appointments?id=eq.{}", appointment.id);
        self.write_one(Method::PATCH, &path, appointment).await
    }

    async fn delete(&self, id: Uuid) -> Result<bool, DatabaseError> {
        let path = format!("/rest/v1/appointments?id=eq.{}", id);
        let rows = write_rows(&self.supabase, Method::DELETE, &path, None).await?;
        Ok(!rows.is_empty())
    }
}

pub struct SupabaseCaseRecordStore {
    supabase: Arc<SupabaseClient>,
}

impl SupabaseCaseRecordStore {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }

    fn parse_rows(rows: Vec<Value>) -> Result<Vec<CaseRecord>, DatabaseError> {
        rows.into_iter()
            .map(|row| Ok(CaseRecord::from(serde_json::from_value::<CaseRecordRow>(row)?)))
            .collect()
    }

    async fn write_one(&self, method: Method, path: &str, record: &CaseRecord) -> Result<CaseRecord, DatabaseError> {
        let body = serde_json::to_value(CaseRecordRow::from(record))?;
        let rows = write_rows(&self.supabase, method, path, Some(body)).await?;
        Self::parse_rows(rows)?
            .into_iter()
            .next()
            .ok_or_else(|| DatabaseError::NotFound(format!("case record {}", record.id)))
    }
}

#[async_trait]
impl CaseRecordStore for SupabaseCaseRecordStore {
    async fn get(&self, id: Uuid) -> Result<Option<CaseRecord>, DatabaseError> {
        let path = format!("/rest/v1/case_records?id=eq.{}", id);
        let rows = fetch_rows(&self.supabase, &path).await?;
        Ok(Self::parse_rows(rows)?.into_iter().next())
    }

    async fn find_by_appointment(&self, appointment_id: Uuid) -> Result<Option<CaseRecord>, DatabaseError> {
        let path = format!("/rest/v1/case_records?appointment_id=eq.{}&limit=1", appointment_id);
        let rows = fetch_rows(&self.supabase, &path).await?;
        Ok(Self::parse_rows(rows)?.into_iter().next())
    }

    async fn exists_for_appointment(&self, appointment_id: Uuid) -> Result<bool, DatabaseError> {
        let path = format!("/rest/v1/case_records?appointment_id=eq.{}&select=id&limit=1", appointment_id);
        let rows = fetch_rows(&self.supabase, &path).await?;
        Ok(!rows.is_empty())
    }

    async fn list(&self, query: &CaseRecordQuery) -> Result<Vec<CaseRecord>, DatabaseError> {
        let mut query_parts = Vec::new();
        if let Some(patient_id) = query.patient_id {
            query_parts.push(format!("patient_id=eq.{}", patient_id));
        }
        if let Some(doctor_id) = query.doctor_id {
            query_parts.push(format!("doctor_id=eq.{}", doctor_id));
        }
        if let Some(appointment_id) = query.appointment_id {
            query_parts.push(format!("appointment_id=eq.{}", appointment_id));
        }
        query_parts.push("order=created_at.desc".to_string());
        query_parts.extend(paging(query.limit(), query.offset()));

        let path = format!("/rest/v1/case_records?{}", query_parts.join("&"));
        let rows = fetch_rows(&self.supabase, &path).await?;
        Self::parse_rows(rows)
    }

    async fn insert(&self, record: &CaseRecord) -> Result<CaseRecord, DatabaseError> {
        self.write_one(Method::POST, "/rest/v1/case_records", record).await
    }

    async fn update(&self, record: &CaseRecord) -> Result<CaseRecord, DatabaseError> {
        let path = format!("/rest/v1/case_records?id=eq.{}", record.id);
        self.write_one(Method::PATCH, &path, record).await
    }

    async fn delete(&self, id: Uuid) -> Result<bool, DatabaseError> {
        let path = format!("/rest/v1/case_records?id=eq.{}", id);
        let rows = write_rows(&self.supabase, Method::DELETE, &path, None).await?;
        Ok(!rows.is_empty())
    }
}
