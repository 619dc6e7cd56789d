// libs/appointment-cell/tests/common/mod.rs
#![allow(dead_code)]

use std::sync::Arc;

use chrono::NaiveDate;
use uuid::Uuid;

use appointment_cell::{
    AppointmentBookingService, AvailabilityService, BookAppointmentRequest, CaseRecordService,
    InMemoryAppointmentStore, InMemoryCaseRecordStore,
};
use schedule_cell::{CreateScheduleRequest, InMemoryScheduleStore, ScheduleService};
use shared_database::{InMemoryDirectory, SchedulingLockManager};
use shared_models::auth::{Caller, Role};
use shared_models::time::{DayOfWeek, TimeRange};

pub struct Clinic {
    pub booking: Arc<AppointmentBookingService>,
    pub availability: Arc<AvailabilityService>,
    pub case_records: Arc<CaseRecordService>,
    pub schedules: Arc<ScheduleService>,
    pub case_store: Arc<InMemoryCaseRecordStore>,
    pub doctor: Uuid,
    pub other_doctor: Uuid,
    pub patient: Uuid,
    pub other_patient: Uuid,
    pub room: Uuid,
    pub other_room: Uuid,
}

impl Clinic {
    pub async fn new() -> Self {
        let directory = Arc::new(InMemoryDirectory::new());
        let ids: Vec<Uuid> = (0..6).map(|_| Uuid::new_v4()).collect();
        let (doctor, other_doctor, patient, other_patient, room, other_room) =
            (ids[0], ids[1], ids[2], ids[3], ids[4], ids[5]);

        for id in [doctor, other_doctor] {
            directory.register_doctor(id).await;
        }
        for id in [patient, other_patient] {
            directory.register_patient(id).await;
        }
        for id in [room, other_room] {
            directory.register_room(id).await;
        }

        let appointments = Arc::new(InMemoryAppointmentStore::new());
        let case_store = Arc::new(InMemoryCaseRecordStore::new());
        let schedule_store = Arc::new(InMemoryScheduleStore::new());
        let locks = Arc::new(SchedulingLockManager::from_seconds(5));

        Self {
            booking: Arc::new(AppointmentBookingService::new(
                appointments.clone(),
                case_store.clone(),
                directory.clone(),
                locks.clone(),
            )),
            availability: Arc::new(AvailabilityService::new(schedule_store.clone(), appointments.clone())),
            case_records: Arc::new(CaseRecordService::new(case_store.clone(), appointments, locks.clone())),
            schedules: Arc::new(ScheduleService::new(schedule_store, directory, locks)),
            case_store,
            doctor,
            other_doctor,
            patient,
            other_patient,
            room,
            other_room,
        }
    }

    pub fn staff(&self) -> Caller {
        Caller::new(Uuid::new_v4(), Role::Staff)
    }

    pub fn doctor_caller(&self) -> Caller {
        Caller::new(self.doctor, Role::Doctor)
    }

    /// Booking request for the default doctor, patient and room.
    pub fn request(&self, start: &str, end: &str) -> BookAppointmentRequest {
        BookAppointmentRequest {
            patient_id: self.patient,
            doctor_id: self.doctor,
            room_id: self.room,
            appointment_date: monday(),
            time_range: range(start, end),
            reason_for_visit: Some("Checkup".to_string()),
        }
    }

    pub async fn add_schedule(&self, start: &str, end: &str, slot_minutes: u32) {
        self.schedules
            .create_schedule(&self.staff(), CreateScheduleRequest {
                doctor_id: self.doctor,
                room_id: self.room,
                day_of_week: DayOfWeek::Monday,
                time_range: range(start, end),
                slot_duration_minutes: slot_minutes,
                is_active: None,
            })
            .await
            .unwrap();
    }
}

pub fn range(start: &str, end: &str) -> TimeRange {
    TimeRange::parse(start, end).unwrap()
}

/// 2026-03-02, a Monday.
pub fn monday() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 3, 2).unwrap()
}
