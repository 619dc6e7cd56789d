// libs/appointment-cell/src/services/booking.rs
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use shared_database::{DatabaseError, ResourceDirectory, SchedulingLockKey, SchedulingLockManager};
use shared_models::auth::Role;

use crate::models::{
    Appointment, AppointmentError, AppointmentQuery, BookAppointmentRequest, BookingCandidate,
    ConflictCheckResponse, ConflictReason, RescheduleRequest,
};
use crate::services::conflict::ConflictDetectionService;
use crate::services::lifecycle::{AppointmentLifecycleService, Transition};
use crate::store::{AppointmentStore, CaseRecordStore};

/// Keys covering every resource `candidate` would hold on its date.
fn resource_keys(candidate: &BookingCandidate) -> [SchedulingLockKey; 3] {
    [
        SchedulingLockKey::Doctor(candidate.doctor_id, candidate.date),
        SchedulingLockKey::Patient(candidate.patient_id, candidate.date),
        SchedulingLockKey::Room(candidate.room_id, candidate.date),
    ]
}

pub struct AppointmentBookingService {
    appointments: Arc<dyn AppointmentStore>,
    case_records: Arc<dyn CaseRecordStore>,
    directory: Arc<dyn ResourceDirectory>,
    conflict_service: ConflictDetectionService,
    lifecycle_service: AppointmentLifecycleService,
    locks: Arc<SchedulingLockManager>,
}

impl AppointmentBookingService {
    pub fn new(
        appointments: Arc<dyn AppointmentStore>,
        case_records: Arc<dyn CaseRecordStore>,
        directory: Arc<dyn ResourceDirectory>,
        locks: Arc<SchedulingLockManager>,
    ) -> Self {
        Self {
            conflict_service: ConflictDetectionService::new(appointments.clone()),
            lifecycle_service: AppointmentLifecycleService::new(),
            appointments,
            case_records,
            directory,
            locks,
        }
    }

    /// Book a new appointment in `BOOKED`. The conflict check and the insert
    /// run while holding the doctor, patient and room locks for the date.
    #[instrument(skip(self, request), fields(patient = %request.patient_id, doctor = %request.doctor_id, date = %request.appointment_date))]
    pub async fn book_appointment(&self, request: BookAppointmentRequest) -> Result<Appointment, AppointmentError> {
        let candidate = request.candidate();
        self.ensure_resources_exist(&candidate).await?;

        let _guard = self.locks.acquire(resource_keys(&candidate)).await?;

        self.conflict_service.ensure_no_conflict(&candidate, None).await?;

        let appointment = Appointment::booked(&candidate, request.reason_for_visit);
        let saved = self.appointments.insert(&appointment).await.map_err(|e| match e {
            DatabaseError::Conflict(detail) => {
                warn!("Storage rejected booking as duplicate slot: {}", detail);
                AppointmentError::Conflict(ConflictReason::ExactSlot)
            }
            other => other.into(),
        })?;

        info!("Appointment {} booked for {} {}", saved.id, saved.appointment_date, saved.time_range);
        Ok(saved)
    }

    /// Read-only conflict check, e.g. for a form before it submits.
    pub async fn check_booking_conflict(
        &self,
        candidate: &BookingCandidate,
        exclude_appointment_id: Option<Uuid>,
    ) -> Result<ConflictCheckResponse, AppointmentError> {
        self.conflict_service.check_conflicts(candidate, exclude_appointment_id).await
    }

    pub async fn check_in(&self, appointment_id: Uuid) -> Result<Appointment, AppointmentError> {
        self.apply_transition(appointment_id, Transition::CheckIn).await
    }

    /// Requires a case record. The status check runs before the record check.
    pub async fn complete(&self, appointment_id: Uuid) -> Result<Appointment, AppointmentError> {
        self.apply_transition(appointment_id, Transition::Complete).await
    }

    pub async fn cancel(&self, appointment_id: Uuid) -> Result<Appointment, AppointmentError> {
        self.apply_transition(appointment_id, Transition::Cancel).await
    }

    #[instrument(skip(self))]
    async fn apply_transition(
        &self,
        appointment_id: Uuid,
        transition: Transition,
    ) -> Result<Appointment, AppointmentError> {
        let _guard = self.locks.acquire([SchedulingLockKey::Appointment(appointment_id)]).await?;

        let mut appointment = self.get_appointment(appointment_id).await?;
        let next = self
            .lifecycle_service
            .validate_status_transition(appointment.status, transition)?;

        if transition == Transition::Complete
            && !self.case_records.exists_for_appointment(appointment_id).await?
        {
            warn!("Appointment {} has no case record; refusing to complete", appointment_id);
            return Err(AppointmentError::case_record_required());
        }

        let previous = appointment.status;
        appointment.status = next;
        appointment.updated_at = Utc::now();
        let saved = self.appointments.update(&appointment).await?;

        info!("Appointment {} moved {} -> {}", appointment_id, previous, saved.status);
        Ok(saved)
    }

    /// Move an appointment to a new date and/or time range. Patients may
    /// only touch the reason for visit. The new slot is checked against
    /// every other active appointment, excluding this one.
    #[instrument(skip(self, request), fields(moves_slot = request.moves_slot()))]
    pub async fn reschedule(
        &self,
        appointment_id: Uuid,
        initiator: Role,
        request: RescheduleRequest,
    ) -> Result<Appointment, AppointmentError> {
        if initiator == Role::Patient && request.moves_slot() {
            warn!("Patient attempted to reschedule appointment {}", appointment_id);
            return Err(AppointmentError::Forbidden(
                "Patients cannot reschedule appointments. Please cancel and create a new appointment."
                    .to_string(),
            ));
        }

        let _appointment_guard = self
            .locks
            .acquire([SchedulingLockKey::Appointment(appointment_id)])
            .await?;

        let mut appointment = self.get_appointment(appointment_id).await?;
        self.lifecycle_service.ensure_reschedulable(appointment.status)?;

        let moves_slot = request.moves_slot();
        if let Some(reason) = request.reason_for_visit {
            appointment.reason_for_visit = Some(reason);
        }

        if !moves_slot {
            return self.save_reschedule(appointment).await;
        }

        let mut target = appointment.candidate();
        if let Some(date) = request.appointment_date {
            target.date = date;
        }
        if let Some(range) = request.time_range {
            target.time_range = range;
        }

        let _resource_guard = self.locks.acquire(resource_keys(&target)).await?;
        self.conflict_service.ensure_no_conflict(&target, Some(appointment_id)).await?;

        appointment.appointment_date = target.date;
        appointment.time_range = target.time_range;
        self.save_reschedule(appointment).await
    }

    async fn save_reschedule(&self, mut appointment: Appointment) -> Result<Appointment, AppointmentError> {
        appointment.updated_at = Utc::now();
        let saved = self.appointments.update(&appointment).await?;
        info!("Appointment {} now {} {}", saved.id, saved.appointment_date, saved.time_range);
        Ok(saved)
    }

    /// Unconditional removal; who may delete what is decided by the caller.
    pub async fn delete_appointment(&self, appointment_id: Uuid) -> Result<(), AppointmentError> {
        let _guard = self.locks.acquire([SchedulingLockKey::Appointment(appointment_id)]).await?;

        if !self.appointments.delete(appointment_id).await? {
            return Err(AppointmentError::NotFound("Appointment"));
        }

        info!("Appointment {} deleted", appointment_id);
        Ok(())
    }

    pub async fn get_appointment(&self, appointment_id: Uuid) -> Result<Appointment, AppointmentError> {
        self.appointments
            .get(appointment_id)
            .await?
            .ok_or(AppointmentError::NotFound("Appointment"))
    }

    pub async fn search_appointments(&self, query: &AppointmentQuery) -> Result<Vec<Appointment>, AppointmentError> {
        debug!("Searching appointments with {:?}", query);
        Ok(self.appointments.list(query).await?)
    }

    async fn ensure_resources_exist(&self, candidate: &BookingCandidate) -> Result<(), AppointmentError> {
        let (doctor, patient, room) = futures::try_join!(
            self.directory.doctor_exists(candidate.doctor_id),
            self.directory.patient_exists(candidate.patient_id),
            self.directory.room_exists(candidate.room_id),
        )?;

        if !doctor {
            return Err(AppointmentError::NotFound("Doctor"));
        }
        if !patient {
            return Err(AppointmentError::NotFound("Patient"));
        }
        if !room {
            return Err(AppointmentError::NotFound("Room"));
        }
        Ok(())
    }
}
