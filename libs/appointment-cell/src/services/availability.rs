// libs/appointment-cell/src/services/availability.rs
use std::sync::Arc;

use chrono::{Days, NaiveDate};
use tracing::{debug, instrument};
use uuid::Uuid;

use schedule_cell::{ScheduleQuery, ScheduleStore};
use shared_models::time::{overlaps, DayOfWeek};

use crate::models::{AppointmentError, DatedSlots, Slot};
use crate::store::{AppointmentStore, ResourceRef};

/// First date on or after `from` that falls on `day`, or `None` when that
/// date is past the end of the calendar.
pub fn next_occurrence_on_or_after(day: DayOfWeek, from: NaiveDate) -> Option<NaiveDate> {
    let from_index = DayOfWeek::from_date(from).index();
    let ahead = (7 + day.index() - from_index) % 7;
    from.checked_add_days(Days::new(ahead.into()))
}

pub struct AvailabilityService {
    schedules: Arc<dyn ScheduleStore>,
    appointments: Arc<dyn AppointmentStore>,
}

impl AvailabilityService {
    pub fn new(schedules: Arc<dyn ScheduleStore>, appointments: Arc<dyn AppointmentStore>) -> Self {
        Self { schedules, appointments }
    }

    /// Slots of every active schedule the doctor has on `date`'s weekday,
    /// each marked unavailable if an active appointment of the doctor on
    /// that date overlaps it. Schedules are emitted in start order, slots
    /// in order within each schedule.
    #[instrument(skip(self))]
    pub async fn get_available_slots(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
    ) -> Result<Vec<Slot>, AppointmentError> {
        let day = DayOfWeek::from_date(date);
        let schedules = self
            .schedules
            .list(&ScheduleQuery::active_for_doctor(doctor_id, day))
            .await?;

        if schedules.is_empty() {
            debug!("Doctor {} has no active schedule on {}", doctor_id, day);
            return Ok(Vec::new());
        }

        let booked = self
            .appointments
            .find_active_on(ResourceRef::Doctor(doctor_id), date)
            .await?;

        let slots: Vec<Slot> = schedules
            .iter()
            .flat_map(|schedule| {
                let booked = &booked;
                schedule
                    .time_range
                    .partition(schedule.slot_duration_minutes)
                    .into_iter()
                    .map(move |range| Slot {
                        time_range: range,
                        is_available: !booked
                            .iter()
                            .any(|a| a.is_active() && overlaps(&range, &a.time_range)),
                        room_id: schedule.room_id,
                        schedule_id: schedule.id,
                    })
            })
            .collect();

        debug!("{} slots ({} free) for doctor {} on {}",
               slots.len(), slots.iter().filter(|s| s.is_available).count(), doctor_id, date);
        Ok(slots)
    }

    /// Slots for the next `day` on or after `from`, with the date resolved.
    pub async fn get_slots_for_next(
        &self,
        doctor_id: Uuid,
        day: DayOfWeek,
        from: NaiveDate,
    ) -> Result<DatedSlots, AppointmentError> {
        let date = next_occurrence_on_or_after(day, from).ok_or_else(|| {
            AppointmentError::Validation(format!("No {} on or after {}", day, from))
        })?;
        let slots = self.get_available_slots(doctor_id, date).await?;
        Ok(DatedSlots { date, slots })
    }
}
