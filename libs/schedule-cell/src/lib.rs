pub mod handlers;
pub mod router;
pub mod models;
pub mod services;
pub mod store;

pub use models::*;
pub use services::ScheduleService;
pub use store::{InMemoryScheduleStore, ScheduleStore, SupabaseScheduleStore};
