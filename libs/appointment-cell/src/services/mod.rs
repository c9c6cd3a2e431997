pub mod booking;
pub mod lifecycle;
pub mod sweep;

pub use booking::AppointmentService;
pub use lifecycle::{validate_status_transition, ANY_STATUS, ATTENDANCE_STATUSES};
pub use sweep::{PromotionSweeper, SweepHandle};
