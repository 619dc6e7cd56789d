// libs/schedule-cell/src/services/schedule.rs
use std::sync::Arc;

use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use shared_database::{ResourceDirectory, SchedulingLockKey, SchedulingLockManager};
use shared_models::auth::{Caller, Role};
use shared_models::time::{format_clock_time, overlaps, DayOfWeek, TimeRange};

use crate::models::{
    CreateScheduleRequest, DoctorSchedule, ScheduleDraft, ScheduleError, ScheduleQuery,
    UpdateScheduleRequest,
};
use crate::store::ScheduleStore;

pub struct ScheduleService {
    store: Arc<dyn ScheduleStore>,
    directory: Arc<dyn ResourceDirectory>,
    locks: Arc<SchedulingLockManager>,
}

impl ScheduleService {
    pub fn new(
        store: Arc<dyn ScheduleStore>,
        directory: Arc<dyn ResourceDirectory>,
        locks: Arc<SchedulingLockManager>,
    ) -> Self {
        Self { store, directory, locks }
    }

    pub async fn create_schedule(
        &self,
        caller: &Caller,
        request: CreateScheduleRequest,
    ) -> Result<DoctorSchedule, ScheduleError> {
        self.upsert_schedule(caller, None, request.into_draft()).await
    }

    /// Partial update: unspecified fields keep their stored values. The
    /// stored row is read and merged while the schedule's lock is held.
    #[instrument(skip(self, request), fields(caller = %caller.id, schedule = %schedule_id))]
    pub async fn update_schedule(
        &self,
        caller: &Caller,
        schedule_id: Uuid,
        request: UpdateScheduleRequest,
    ) -> Result<DoctorSchedule, ScheduleError> {
        let _schedule_guard = self.locks.acquire([SchedulingLockKey::Schedule(schedule_id)]).await?;

        let existing = self.get_schedule(schedule_id).await?;
        let draft = request.merge_into(existing.to_draft());
        self.save_schedule(caller, Some(existing), draft).await
    }

    /// Create (`schedule_id = None`) or fully replace a schedule. An active
    /// schedule may not overlap another active schedule in the same room on
    /// the same weekday, whichever doctor owns it.
    #[instrument(skip(self, draft), fields(caller = %caller.id, room = %draft.room_id, day = %draft.day_of_week))]
    pub async fn upsert_schedule(
        &self,
        caller: &Caller,
        schedule_id: Option<Uuid>,
        draft: ScheduleDraft,
    ) -> Result<DoctorSchedule, ScheduleError> {
        match schedule_id {
            Some(id) => {
                let _schedule_guard = self.locks.acquire([SchedulingLockKey::Schedule(id)]).await?;
                let existing = self.get_schedule(id).await?;
                self.save_schedule(caller, Some(existing), draft).await
            }
            None => self.save_schedule(caller, None, draft).await,
        }
    }

    /// Write `draft` over `existing` (or as a new schedule). Callers replacing
    /// a schedule hold its `Schedule` lock; the room/weekday lock is taken
    /// here, after it, matching the lock manager's key order.
    async fn save_schedule(
        &self,
        caller: &Caller,
        existing: Option<DoctorSchedule>,
        draft: ScheduleDraft,
    ) -> Result<DoctorSchedule, ScheduleError> {
        Self::authorize(caller, draft.doctor_id)?;

        if draft.slot_duration_minutes == 0 {
            return Err(ScheduleError::ValidationError(
                "Slot duration must be a positive number of minutes".to_string(),
            ));
        }

        if let Some(existing) = &existing {
            Self::authorize(caller, existing.doctor_id)?;
            if caller.role == Role::Doctor && existing.doctor_id != draft.doctor_id {
                return Err(ScheduleError::Forbidden(
                    "Cannot change schedule to another doctor".to_string(),
                ));
            }
        }
        let schedule_id = existing.as_ref().map(|schedule| schedule.id);

        let _room_guard = self
            .locks
            .acquire([SchedulingLockKey::RoomWeekday(draft.room_id, draft.day_of_week)])
            .await?;

        if !self.directory.doctor_exists(draft.doctor_id).await? {
            return Err(ScheduleError::DoctorNotFound);
        }
        if !self.directory.room_exists(draft.room_id).await? {
            return Err(ScheduleError::RoomNotFound);
        }

        if draft.is_active {
            if let Some(occupied) = self
                .find_room_conflict(draft.room_id, draft.day_of_week, &draft.time_range, schedule_id)
                .await?
            {
                warn!("Schedule conflict in room {} on {}: {} overlaps schedule {}",
                      draft.room_id, draft.day_of_week, draft.time_range, occupied.id);
                return Err(ScheduleError::Conflict(format!(
                    "Room is already booked by doctor {} from {} to {} on {}",
                    occupied.doctor_id,
                    format_clock_time(&occupied.time_range.start_time()),
                    format_clock_time(&occupied.time_range.end_time()),
                    occupied.day_of_week,
                )));
            }
        }

        let saved = match existing {
            Some(mut schedule) => {
                schedule.apply_draft(draft);
                self.store.update(&schedule).await?
            }
            None => self.store.insert(&DoctorSchedule::from_draft(draft)).await?,
        };

        info!("Schedule {} saved for doctor {} ({} {})",
              saved.id, saved.doctor_id, saved.day_of_week, saved.time_range);
        Ok(saved)
    }

    pub async fn delete_schedule(&self, caller: &Caller, schedule_id: Uuid) -> Result<(), ScheduleError> {
        let _guard = self.locks.acquire([SchedulingLockKey::Schedule(schedule_id)]).await?;

        let schedule = self.get_schedule(schedule_id).await?;
        Self::authorize(caller, schedule.doctor_id)?;

        if !self.store.delete(schedule_id).await? {
            return Err(ScheduleError::NotFound);
        }

        info!("Schedule {} deleted by {}", schedule_id, caller.id);
        Ok(())
    }

    pub async fn get_schedule(&self, schedule_id: Uuid) -> Result<DoctorSchedule, ScheduleError> {
        self.store.get(schedule_id).await?.ok_or(ScheduleError::NotFound)
    }

    pub async fn list_schedules(&self, query: &ScheduleQuery) -> Result<Vec<DoctorSchedule>, ScheduleError> {
        debug!("Listing schedules with {:?}", query);
        Ok(self.store.list(query).await?)
    }

    /// First active schedule in `room_id` on `day` whose range intersects
    /// `time_range`. Touching ranges are not conflicts.
    pub async fn find_room_conflict(
        &self,
        room_id: Uuid,
        day: DayOfWeek,
        time_range: &TimeRange,
        exclude_schedule_id: Option<Uuid>,
    ) -> Result<Option<DoctorSchedule>, ScheduleError> {
        let query = ScheduleQuery {
            room_id: Some(room_id),
            day_of_week: Some(day),
            is_active: Some(true),
            ..ScheduleQuery::default()
        };

        Ok(self
            .store
            .list(&query)
            .await?
            .into_iter()
            .filter(|schedule| Some(schedule.id) != exclude_schedule_id)
            .find(|schedule| overlaps(&schedule.time_range, time_range)))
    }

    fn authorize(caller: &Caller, doctor_id: Uuid) -> Result<(), ScheduleError> {
        match caller.role {
            Role::Staff => Ok(()),
            Role::Doctor if caller.id == doctor_id => Ok(()),
            Role::Doctor => Err(ScheduleError::Forbidden(
                "Doctors can only manage their own schedules".to_string(),
            )),
            Role::Patient => Err(ScheduleError::Forbidden(
                "Patients cannot manage doctor schedules".to_string(),
            )),
        }
    }
}
