pub mod handlers;
pub mod router;
pub mod models;
pub mod services;
pub mod store;

pub use models::*;
pub use services::{
    next_occurrence_on_or_after, AppointmentBookingService, AvailabilityService, CaseRecordService,
};
pub use store::{
    AppointmentStore, CaseRecordStore, InMemoryAppointmentStore, InMemoryCaseRecordStore,
    ResourceRef, SupabaseAppointmentStore, SupabaseCaseRecordStore,
};
