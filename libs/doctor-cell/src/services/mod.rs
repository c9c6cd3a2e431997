pub mod availability;
pub mod directory;
pub mod leave;

pub use availability::{resolve_slots, AvailabilityService};
pub use directory::DirectoryService;
pub use leave::LeaveService;
