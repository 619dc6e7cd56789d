// libs/appointment-cell/src/services/case_record.rs
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use shared_database::{DatabaseError, SchedulingLockKey, SchedulingLockManager};
use shared_models::auth::{Caller, Role};

use crate::models::{
    AppointmentError, AppointmentStatus, CaseRecord, CaseRecordQuery, CreateCaseRecordRequest,
    UpdateCaseRecordRequest,
};
use crate::store::{AppointmentStore, CaseRecordStore};

pub struct CaseRecordService {
    case_records: Arc<dyn CaseRecordStore>,
    appointments: Arc<dyn AppointmentStore>,
    locks: Arc<SchedulingLockManager>,
}

impl CaseRecordService {
    pub fn new(
        case_records: Arc<dyn CaseRecordStore>,
        appointments: Arc<dyn AppointmentStore>,
        locks: Arc<SchedulingLockManager>,
    ) -> Self {
        Self { case_records, appointments, locks }
    }

    /// Record the visit notes for a checked-in or completed appointment.
    /// One record per appointment.
    #[instrument(skip(self, request), fields(caller = %caller.id, appointment = %request.appointment_id))]
    pub async fn create_case_record(
        &self,
        caller: &Caller,
        request: CreateCaseRecordRequest,
    ) -> Result<CaseRecord, AppointmentError> {
        if caller.is_patient() {
            return Err(AppointmentError::Forbidden("Patients cannot create case records".to_string()));
        }
        if request.chief_complaint.trim().is_empty() || request.diagnosis.trim().is_empty() {
            return Err(AppointmentError::Validation(
                "Chief complaint and diagnosis are required".to_string(),
            ));
        }

        let _guard = self
            .locks
            .acquire([SchedulingLockKey::Appointment(request.appointment_id)])
            .await?;

        let appointment = self
            .appointments
            .get(request.appointment_id)
            .await?
            .ok_or(AppointmentError::NotFound("Appointment"))?;

        if !matches!(appointment.status, AppointmentStatus::CheckedIn | AppointmentStatus::Completed) {
            warn!("Case record requested for {} appointment {}", appointment.status, appointment.id);
            return Err(AppointmentError::InvalidState {
                current: appointment.status,
                action: "record a case for",
            });
        }
        if caller.role == Role::Doctor && appointment.doctor_id != caller.id {
            return Err(AppointmentError::Forbidden(
                "Doctors can only create case records for their own appointments".to_string(),
            ));
        }
        if self.case_records.exists_for_appointment(appointment.id).await? {
            return Err(AppointmentError::CaseRecordExists);
        }

        let record = CaseRecord::for_appointment(&appointment, request);
        let saved = self.case_records.insert(&record).await.map_err(|e| match e {
            DatabaseError::Conflict(_) => AppointmentError::CaseRecordExists,
            other => other.into(),
        })?;

        info!("Case record {} created for appointment {}", saved.id, saved.appointment_id);
        Ok(saved)
    }

    pub async fn update_case_record(
        &self,
        caller: &Caller,
        record_id: Uuid,
        request: UpdateCaseRecordRequest,
    ) -> Result<CaseRecord, AppointmentError> {
        let mut record = self.load(record_id).await?;

        match caller.role {
            Role::Staff => {}
            Role::Doctor if record.doctor_id == caller.id => {}
            _ => {
                return Err(AppointmentError::Forbidden(
                    "Only the authoring doctor or staff can update this case record".to_string(),
                ))
            }
        }

        if let Some(chief_complaint) = request.chief_complaint {
            record.chief_complaint = required_text(chief_complaint, "Chief complaint")?;
        }
        if let Some(diagnosis) = request.diagnosis {
            record.diagnosis = required_text(diagnosis, "Diagnosis")?;
        }
        if request.prescription.is_some() {
            record.prescription = request.prescription;
        }
        if request.notes.is_some() {
            record.notes = request.notes;
        }
        if request.vitals.is_some() {
            record.vitals = request.vitals;
        }
        if request.follow_up_date.is_some() {
            record.follow_up_date = request.follow_up_date;
        }
        record.updated_at = Utc::now();

        let saved = self.case_records.update(&record).await?;
        info!("Case record {} updated by {}", saved.id, caller.id);
        Ok(saved)
    }

    pub async fn delete_case_record(&self, caller: &Caller, record_id: Uuid) -> Result<(), AppointmentError> {
        if !caller.is_staff() {
            return Err(AppointmentError::Forbidden("Only staff can delete case records".to_string()));
        }
        if !self.case_records.delete(record_id).await? {
            return Err(AppointmentError::NotFound("Case record"));
        }
        info!("Case record {} deleted", record_id);
        Ok(())
    }

    pub async fn get_case_record(&self, caller: &Caller, record_id: Uuid) -> Result<CaseRecord, AppointmentError> {
        let record = self.load(record_id).await?;
        let visible = match caller.role {
            Role::Staff => true,
            Role::Doctor => record.doctor_id == caller.id,
            Role::Patient => record.patient_id == caller.id,
        };
        if !visible {
            return Err(AppointmentError::Forbidden("Unauthorized access to case record".to_string()));
        }
        Ok(record)
    }

    /// Patients and doctors only ever see their own records, whatever the
    /// query asks for.
    pub async fn list_case_records(
        &self,
        caller: &Caller,
        mut query: CaseRecordQuery,
    ) -> Result<Vec<CaseRecord>, AppointmentError> {
        match caller.role {
            Role::Staff => {}
            Role::Doctor => {
                query.doctor_id = Some(caller.id);
                query.patient_id = None;
            }
            Role::Patient => {
                query.patient_id = Some(caller.id);
                query.doctor_id = None;
            }
        }
        debug!("Listing case records with {:?}", query);
        Ok(self.case_records.list(&query).await?)
    }

    async fn load(&self, record_id: Uuid) -> Result<CaseRecord, AppointmentError> {
        self.case_records
            .get(record_id)
            .await?
            .ok_or(AppointmentError::NotFound("Case record"))
    }
}

fn required_text(value: String, field: &str) -> Result<String, AppointmentError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AppointmentError::Validation(format!("{} cannot be empty", field)));
    }
    Ok(trimmed.to_string())
}
