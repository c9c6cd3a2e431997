use tracing::{debug, warn};

use crate::models::{AppointmentError, AppointmentStatus};

/// Status transitions an appointment may take. `previous` and `cancelled`
/// are terminal.
pub fn valid_transitions(current: AppointmentStatus) -> &'static [AppointmentStatus] {
    match current {
        AppointmentStatus::Upcoming => &[AppointmentStatus::Previous, AppointmentStatus::Cancelled],
        AppointmentStatus::Previous => &[],
        AppointmentStatus::Cancelled => &[],
    }
}

pub fn validate_status_transition(
    current: AppointmentStatus,
    next: AppointmentStatus,
) -> Result<(), AppointmentError> {
    if valid_transitions(current).contains(&next) {
        debug!("Status transition allowed: {} -> {}", current, next);
        Ok(())
    } else {
        warn!("Invalid status transition attempted: {} -> {}", current, next);
        Err(AppointmentError::InvalidStatusTransition(current))
    }
}

/// Statuses on which feedback and absence may still be recorded.
pub const ATTENDANCE_STATUSES: &[AppointmentStatus] = &[AppointmentStatus::Upcoming, AppointmentStatus::Previous];

/// The attended-modal flag is UI state and applies to any status.
pub const ANY_STATUS: &[AppointmentStatus] = &[
    AppointmentStatus::Upcoming,
    AppointmentStatus::Previous,
    AppointmentStatus::Cancelled,
];
