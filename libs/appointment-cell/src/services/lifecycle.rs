// libs/appointment-cell/src/services/lifecycle.rs
use std::fmt;

use tracing::{debug, warn};

use crate::models::{AppointmentError, AppointmentStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    CheckIn,
    Complete,
    Cancel,
}

impl Transition {
    pub const ALL: [Transition; 3] = [Transition::CheckIn, Transition::Complete, Transition::Cancel];

    pub fn action(&self) -> &'static str {
        match self {
            Transition::CheckIn => "check in",
            Transition::Complete => "complete",
            Transition::Cancel => "cancel",
        }
    }
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.action())
    }
}

pub struct AppointmentLifecycleService;

impl AppointmentLifecycleService {
    pub fn new() -> Self {
        Self
    }

    /// Status reached by applying `transition` to `current`.
    ///
    /// BOOKED may be checked in, completed or cancelled; CHECKED_IN may be
    /// completed or cancelled. COMPLETED and CANCELLED are final.
    pub fn validate_status_transition(
        &self,
        current: AppointmentStatus,
        transition: Transition,
    ) -> Result<AppointmentStatus, AppointmentError> {
        use crate::models::AppointmentStatus::*;

        let next = match (current, transition) {
            (Booked, Transition::CheckIn) => Some(CheckedIn),
            (Booked | CheckedIn, Transition::Complete) => Some(Completed),
            (Booked | CheckedIn, Transition::Cancel) => Some(Cancelled),
            (CheckedIn, Transition::CheckIn) => None,
            (Completed | Cancelled, _) => None,
        };

        match next {
            Some(status) => {
                debug!("Status transition {} -> {} ({})", current, status, transition);
                Ok(status)
            }
            None => {
                warn!("Invalid status transition attempted: {} from {}", transition, current);
                Err(AppointmentError::InvalidState { current, action: transition.action() })
            }
        }
    }

    pub fn get_valid_transitions(&self, current: AppointmentStatus) -> Vec<Transition> {
        Transition::ALL
            .into_iter()
            .filter(|t| self.validate_status_transition(current, *t).is_ok())
            .collect()
    }

    /// Date/time edits are only possible while the appointment is active.
    pub fn ensure_reschedulable(&self, current: AppointmentStatus) -> Result<(), AppointmentError> {
        if current.is_terminal() {
            warn!("Reschedule attempted on {} appointment", current);
            return Err(AppointmentError::InvalidState { current, action: "reschedule" });
        }
        Ok(())
    }
}

impl Default for AppointmentLifecycleService {
    fn default() -> Self {
        Self::new()
    }
}
