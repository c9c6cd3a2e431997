use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use shared_config::AppConfig;
use shared_database::{IdentityDirectory, SupabaseClient, SupabaseIdentityDirectory};
use shared_utils::extractor::auth_middleware;
use shared_utils::time_slot::ClinicClock;

use crate::handlers;
use crate::services::{AppointmentService, SweepHandle};
use crate::store::{AppointmentStore, SupabaseAppointmentStore};

#[derive(Clone)]
pub struct AppointmentState {
    pub config: Arc<AppConfig>,
    pub appointments: Arc<AppointmentService>,
}

impl AppointmentState {
    pub fn new(config: Arc<AppConfig>, supabase: Arc<SupabaseClient>, sweep: SweepHandle) -> Self {
        let store: Arc<dyn AppointmentStore> = Arc::new(SupabaseAppointmentStore::new(supabase.clone()));
        let identity: Arc<dyn IdentityDirectory> = Arc::new(SupabaseIdentityDirectory::new(supabase));
        let service = Self::service(&config, store, identity).with_sweep(sweep);
        Self::with_service(config, Arc::new(service))
    }

    pub fn with_service(config: Arc<AppConfig>, appointments: Arc<AppointmentService>) -> Self {
        Self { config, appointments }
    }

    /// Service wired with the clinic clock and default timezone label.
    pub fn service(
        config: &AppConfig,
        store: Arc<dyn AppointmentStore>,
        identity: Arc<dyn IdentityDirectory>,
    ) -> AppointmentService {
        AppointmentService::new(
            store,
            identity,
            ClinicClock::from_config(config),
            config.clinic_timezone_label.clone(),
        )
    }
}

pub fn appointment_routes(state: AppointmentState) -> Router {
    Router::new()
        .route("/", post(handlers::create_appointment))
        .route("/patients/{patient_id}", get(handlers::list_patient_appointments))
        .route("/doctors/{doctor_id}", get(handlers::list_doctor_appointments))
        .route("/{appointment_id}/cancel", post(handlers::cancel_appointment))
        .route("/{appointment_id}/attended-modal", post(handlers::dismiss_attended_modal))
        .route("/{appointment_id}/feedback", post(handlers::record_feedback))
        .route("/{appointment_id}/absence", post(handlers::record_absence))
        .layer(middleware::from_fn_with_state(state.config.clone(), auth_middleware))
        .with_state(state)
}
