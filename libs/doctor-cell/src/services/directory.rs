use std::sync::Arc;

use tracing::{debug, info};
use uuid::Uuid;

use crate::models::{Doctor, DoctorError, Therapy, UpdateDoctorProfileRequest};
use crate::store::DoctorStore;

/// Therapy and doctor catalog reads, plus profile completion.
pub struct DirectoryService {
    store: Arc<dyn DoctorStore>,
}

impl DirectoryService {
    pub fn new(store: Arc<dyn DoctorStore>) -> Self {
        Self { store }
    }

    pub async fn list_therapies(&self, auth_token: Option<&str>) -> Result<Vec<Therapy>, DoctorError> {
        self.store.list_therapies(auth_token).await
    }

    /// Public listing: only doctors whose profile is complete.
    pub async fn list_doctors(&self, auth_token: Option<&str>) -> Result<Vec<Doctor>, DoctorError> {
        self.store.list_profiled_doctors(None, auth_token).await
    }

    pub async fn list_doctors_by_therapy(
        &self,
        therapy_id: &str,
        auth_token: Option<&str>,
    ) -> Result<Vec<Doctor>, DoctorError> {
        debug!("Listing doctors for therapy {}", therapy_id);
        self.store.list_profiled_doctors(Some(therapy_id), auth_token).await
    }

    pub async fn get_doctor_by_id(&self, doctor_id: Uuid, auth_token: Option<&str>) -> Result<Doctor, DoctorError> {
        self.store
            .find_doctor(doctor_id, auth_token)
            .await?
            .ok_or_else(|| DoctorError::doctor_not_found(doctor_id))
    }

    pub async fn update_doctor_profile(
        &self,
        doctor_id: Uuid,
        profile: UpdateDoctorProfileRequest,
        auth_token: Option<&str>,
    ) -> Result<Doctor, DoctorError> {
        profile.validate()?;
        self.get_doctor_by_id(doctor_id, auth_token).await?;

        let therapies = self.store.list_therapies(auth_token).await?;
        if !therapies.iter().any(|t| t.id == profile.therapy_id) {
            return Err(DoctorError::ValidationError(format!("Unknown therapy: {}", profile.therapy_id)));
        }

        let updated = self
            .store
            .update_profile(doctor_id, &profile, auth_token)
            .await?
            .ok_or_else(|| DoctorError::doctor_not_found(doctor_id))?;

        info!("Profile completed for doctor {}", doctor_id);
        Ok(updated)
    }
}
