// libs/appointment-cell/src/services/conflict.rs
use std::sync::Arc;

use tracing::{debug, instrument, warn};
use uuid::Uuid;

use shared_models::time::overlaps;

use crate::models::{
    Appointment, AppointmentError, BookingCandidate, ConflictCheckResponse, ConflictReason,
};
use crate::store::{AppointmentStore, ResourceRef};

pub struct ConflictDetectionService {
    appointments: Arc<dyn AppointmentStore>,
}

impl ConflictDetectionService {
    pub fn new(appointments: Arc<dyn AppointmentStore>) -> Self {
        Self { appointments }
    }

    /// Run the ordered booking checks for `candidate` against active
    /// appointments on the same date:
    ///
    /// 1. exact slot: same doctor, identical time range
    /// 2. patient overlap
    /// 3. doctor overlap
    /// 4. room overlap
    ///
    /// The first failing check decides the reason.
    #[instrument(skip(self, candidate), fields(doctor = %candidate.doctor_id, date = %candidate.date, range = %candidate.time_range))]
    pub async fn check_conflicts(
        &self,
        candidate: &BookingCandidate,
        exclude_appointment_id: Option<Uuid>,
    ) -> Result<ConflictCheckResponse, AppointmentError> {
        let (doctor_day, patient_day, room_day) = futures::try_join!(
            self.appointments.find_active_on(ResourceRef::Doctor(candidate.doctor_id), candidate.date),
            self.appointments.find_active_on(ResourceRef::Patient(candidate.patient_id), candidate.date),
            self.appointments.find_active_on(ResourceRef::Room(candidate.room_id), candidate.date),
        )?;

        let others = |day: &[Appointment]| -> Vec<Appointment> {
            day.iter()
                .filter(|a| a.is_active() && Some(a.id) != exclude_appointment_id)
                .cloned()
                .collect()
        };
        let doctor_day = others(&doctor_day);
        let patient_day = others(&patient_day);
        let room_day = others(&room_day);

        debug!("Checking against {} doctor, {} patient, {} room appointments",
               doctor_day.len(), patient_day.len(), room_day.len());

        let exact = doctor_day.iter().find(|a| a.time_range == candidate.time_range);
        let found = exact
            .map(|a| (ConflictReason::ExactSlot, a.id))
            .or_else(|| first_overlap(&patient_day, candidate).map(|id| (ConflictReason::Patient, id)))
            .or_else(|| first_overlap(&doctor_day, candidate).map(|id| (ConflictReason::Doctor, id)))
            .or_else(|| first_overlap(&room_day, candidate).map(|id| (ConflictReason::Room, id)));

        match found {
            Some((reason, appointment_id)) => {
                warn!("Booking conflict ({:?}) with appointment {}", reason, appointment_id);
                Ok(ConflictCheckResponse::conflict(reason, appointment_id))
            }
            None => Ok(ConflictCheckResponse::clear()),
        }
    }

    /// `check_conflicts` as a gate: any conflict becomes an error.
    pub async fn ensure_no_conflict(
        &self,
        candidate: &BookingCandidate,
        exclude_appointment_id: Option<Uuid>,
    ) -> Result<(), AppointmentError> {
        match self.check_conflicts(candidate, exclude_appointment_id).await?.reason {
            Some(reason) => Err(AppointmentError::Conflict(reason)),
            None => Ok(()),
        }
    }
}

fn first_overlap(day: &[Appointment], candidate: &BookingCandidate) -> Option<Uuid> {
    day.iter()
        .find(|a| overlaps(&a.time_range, &candidate.time_range))
        .map(|a| a.id)
}
