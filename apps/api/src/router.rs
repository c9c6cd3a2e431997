use std::sync::Arc;

use axum::{routing::get, Router};

use appointment_cell::{appointment_routes, AppointmentState, SweepHandle};
use doctor_cell::{doctor_routes, therapy_routes, DoctorState};
use shared_config::AppConfig;
use shared_database::SupabaseClient;

pub fn create_router(config: Arc<AppConfig>, supabase: Arc<SupabaseClient>, sweep: SweepHandle) -> Router {
    let doctor_state = DoctorState::new(config.clone(), supabase.clone());
    let appointment_state = AppointmentState::new(config, supabase, sweep);

    Router::new()
        .route("/", get(|| async { "Amae booking API is running!" }))
        .nest("/therapies", therapy_routes(doctor_state.clone()))
        .nest("/doctors", doctor_routes(doctor_state))
        .nest("/appointments", appointment_routes(appointment_state))
}
