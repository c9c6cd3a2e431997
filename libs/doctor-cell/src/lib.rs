pub mod encoding;
pub mod handlers;
pub mod models;
pub mod router;
pub mod services;
pub mod store;

pub use models::*;
pub use router::{doctor_routes, therapy_routes, DoctorState};
pub use services::{AvailabilityService, DirectoryService, LeaveService};
pub use store::{DoctorStore, SupabaseDoctorStore};
