pub mod directory;
pub mod error;
pub mod locks;
pub mod supabase;

pub use directory::{InMemoryDirectory, ResourceDirectory, SupabaseDirectory};
pub use error::DatabaseError;
pub use locks::{LockTimeout, SchedulingGuard, SchedulingLockKey, SchedulingLockManager};
pub use supabase::SupabaseClient;
