use std::sync::Arc;

use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::models::{
    AddLeaveRequest, DoctorError, LeaveCancellation, LeaveEntry, LeaveStatus, NewLeaveEntry,
};
use crate::store::DoctorStore;

pub struct LeaveService {
    store: Arc<dyn DoctorStore>,
}

impl LeaveService {
    pub fn new(store: Arc<dyn DoctorStore>) -> Self {
        Self { store }
    }

    async fn ensure_doctor(&self, doctor_id: Uuid, auth_token: Option<&str>) -> Result<(), DoctorError> {
        match self.store.find_doctor(doctor_id, auth_token).await? {
            Some(_) => Ok(()),
            None => Err(DoctorError::doctor_not_found(doctor_id)),
        }
    }

    #[instrument(skip(self, request, auth_token))]
    pub async fn add_leave(
        &self,
        doctor_id: Uuid,
        request: AddLeaveRequest,
        auth_token: Option<&str>,
    ) -> Result<LeaveEntry, DoctorError> {
        if request.title.trim().is_empty() {
            return Err(DoctorError::ValidationError("Leave title is required".to_string()));
        }
        let leave_dates = request.dates.expand()?;

        self.ensure_doctor(doctor_id, auth_token).await?;

        let entry = self
            .store
            .insert_leave(
                &NewLeaveEntry {
                    doctor_id,
                    title: request.title.trim().to_string(),
                    description: request.description,
                    leave_dates,
                    status: LeaveStatus::Upcoming,
                },
                auth_token,
            )
            .await?;

        info!("Leave {} added for doctor {} ({} days)", entry.id, doctor_id, entry.leave_dates.len());
        Ok(entry)
    }

    /// Every entry, cancelled ones included.
    pub async fn list_leaves(&self, doctor_id: Uuid, auth_token: Option<&str>) -> Result<Vec<LeaveEntry>, DoctorError> {
        self.ensure_doctor(doctor_id, auth_token).await?;
        self.store.list_leaves(doctor_id, auth_token).await
    }

    /// Soft-cancel a leave entry owned by `doctor_id`. An entry that exists
    /// under another doctor is reported as not found and left untouched.
    #[instrument(skip(self, auth_token))]
    pub async fn cancel_leave(
        &self,
        doctor_id: Uuid,
        leave_id: Uuid,
        auth_token: Option<&str>,
    ) -> Result<LeaveCancellation, DoctorError> {
        let status = self
            .store
            .leave_status(doctor_id, leave_id, auth_token)
            .await?
            .ok_or_else(|| DoctorError::NotFound(format!("Leave {} not found for doctor {}", leave_id, doctor_id)))?;

        if status == LeaveStatus::Cancelled {
            debug!("Leave {} already cancelled", leave_id);
            return Ok(LeaveCancellation::AlreadyCancelled);
        }

        match self.store.cancel_leave(doctor_id, leave_id, auth_token).await? {
            true => {
                info!("Leave {} cancelled for doctor {}", leave_id, doctor_id);
                Ok(LeaveCancellation::Cancelled)
            }
            false => {
                warn!("Leave {} was cancelled concurrently", leave_id);
                Ok(LeaveCancellation::AlreadyCancelled)
            }
        }
    }
}
