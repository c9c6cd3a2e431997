pub mod error;
pub mod identity;
pub mod supabase;

pub use error::DatabaseError;
pub use identity::{IdentityDirectory, SupabaseIdentityDirectory};
pub use supabase::SupabaseClient;
