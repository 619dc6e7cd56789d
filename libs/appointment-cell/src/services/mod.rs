pub mod availability;
pub mod booking;
pub mod case_record;
pub mod conflict;
pub mod lifecycle;

pub use availability::{next_occurrence_on_or_after, AvailabilityService};
pub use booking::AppointmentBookingService;
pub use case_record::CaseRecordService;
pub use conflict::ConflictDetectionService;
pub use lifecycle::{AppointmentLifecycleService, Transition};
