pub mod handlers;
pub mod models;
pub mod router;
pub mod services;
pub mod store;

pub use models::*;
pub use router::{appointment_routes, AppointmentState};
pub use services::{AppointmentService, PromotionSweeper, SweepHandle};
pub use store::{AppointmentStore, SupabaseAppointmentStore};
