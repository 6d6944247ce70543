// libs/appointment-cell/src/services/lifecycle.rs
use tracing::{debug, warn};

use crate::models::{AppointmentError, AppointmentStatus};

/// Legal appointment status edges. Stateless and free of I/O.
#[derive(Debug, Default, Clone, Copy)]
pub struct StatusTransitionGuard;

impl StatusTransitionGuard {
    pub fn new() -> Self {
        Self
    }

    /// Returns the state the appointment moves to, or `InvalidTransition`
    /// when `requested` is not a legal next state of `current`.
    pub fn execute(
        &self,
        current: AppointmentStatus,
        requested: AppointmentStatus,
    ) -> Result<AppointmentStatus, AppointmentError> {
        debug!("Validating status transition from {} to {}", current, requested);

        if !self.valid_transitions(current).contains(&requested) {
            warn!("Invalid status transition attempted: {} -> {}", current, requested);
            return Err(AppointmentError::InvalidTransition {
                from: current,
                to: requested,
            });
        }

        Ok(requested)
    }

    /// All valid next statuses for a given current status
    pub fn valid_transitions(&self, current: AppointmentStatus) -> &'static [AppointmentStatus] {
        match current {
            AppointmentStatus::Pending => &[AppointmentStatus::Confirmed, AppointmentStatus::Cancelled],
            AppointmentStatus::Confirmed => &[AppointmentStatus::Completed, AppointmentStatus::Cancelled],
            AppointmentStatus::Paid => &[AppointmentStatus::Confirmed, AppointmentStatus::Cancelled],
            // Terminal states - no transitions allowed
            AppointmentStatus::Completed | AppointmentStatus::Cancelled => &[],
        }
    }

    pub fn is_terminal(&self, status: AppointmentStatus) -> bool {
        self.valid_transitions(status).is_empty()
    }
}
