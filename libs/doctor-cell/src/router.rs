use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};

use shared_config::AppConfig;
use shared_database::SupabaseClient;
use shared_utils::extractor::auth_middleware;
use shared_utils::time_slot::ClinicClock;

use crate::handlers;
use crate::services::{AvailabilityService, DirectoryService, LeaveService};
use crate::store::{DoctorStore, SupabaseDoctorStore};

#[derive(Clone)]
pub struct DoctorState {
    pub config: Arc<AppConfig>,
    pub directory: Arc<DirectoryService>,
    pub leaves: Arc<LeaveService>,
    pub availability: Arc<AvailabilityService>,
}

impl DoctorState {
    pub fn new(config: Arc<AppConfig>, supabase: Arc<SupabaseClient>) -> Self {
        Self::with_store(config, Arc::new(SupabaseDoctorStore::new(supabase)))
    }

    pub fn with_store(config: Arc<AppConfig>, store: Arc<dyn DoctorStore>) -> Self {
        let clock = ClinicClock::from_config(&config);
        Self {
            directory: Arc::new(DirectoryService::new(store.clone())),
            leaves: Arc::new(LeaveService::new(store.clone())),
            availability: Arc::new(AvailabilityService::new(store, clock)),
            config,
        }
    }
}

pub fn therapy_routes(state: DoctorState) -> Router {
    Router::new()
        .route("/", get(handlers::list_therapies))
        .with_state(state)
}

pub fn doctor_routes(state: DoctorState) -> Router {
    // Public routes (no authentication required)
    let public_routes = Router::new()
        .route("/", get(handlers::list_doctors))
        .route("/therapy/{therapy_id}", get(handlers::list_doctors_by_therapy))
        .route("/{doctor_id}", get(handlers::get_doctor))
        .route("/{doctor_id}/available-slots", get(handlers::get_available_slots));

    // Doctor-only routes
    let protected_routes = Router::new()
        .route("/{doctor_id}/profile", put(handlers::update_doctor_profile))
        .route("/{doctor_id}/leaves", get(handlers::list_leaves).post(handlers::add_leave))
        .route("/{doctor_id}/leaves/{leave_id}/cancel", post(handlers::cancel_leave))
        .route(
            "/{doctor_id}/default-availability",
            get(handlers::get_default_availability).put(handlers::set_default_availability),
        )
        .layer(middleware::from_fn_with_state(state.config.clone(), auth_middleware));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}
