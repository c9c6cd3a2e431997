use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;
use uuid::Uuid;

use shared_database::SupabaseClient;
use shared_utils::time_slot::SlotTime;

use crate::encoding::{DefaultAvailabilityRow, LeaveRow};
use crate::models::{
    Doctor, DoctorError, LeaveEntry, LeaveStatus, NewLeaveEntry, Therapy, UpdateDoctorProfileRequest,
};

/// Persistence seam for the doctor cell. Every call takes the caller's
/// bearer token; `None` runs with the client's own key.
#[async_trait]
pub trait DoctorStore: Send + Sync {
    async fn list_therapies(&self, auth_token: Option<&str>) -> Result<Vec<Therapy>, DoctorError>;

    /// Profile-complete doctors, optionally restricted to one therapy.
    async fn list_profiled_doctors(
        &self,
        therapy_id: Option<&str>,
        auth_token: Option<&str>,
    ) -> Result<Vec<Doctor>, DoctorError>;

    async fn find_doctor(&self, doctor_id: Uuid, auth_token: Option<&str>) -> Result<Option<Doctor>, DoctorError>;

    /// Writes the profile fields and marks the profile complete.
    async fn update_profile(
        &self,
        doctor_id: Uuid,
        profile: &UpdateDoctorProfileRequest,
        auth_token: Option<&str>,
    ) -> Result<Option<Doctor>, DoctorError>;

    async fn insert_leave(&self, leave: &NewLeaveEntry, auth_token: Option<&str>) -> Result<LeaveEntry, DoctorError>;

    async fn list_leaves(&self, doctor_id: Uuid, auth_token: Option<&str>) -> Result<Vec<LeaveEntry>, DoctorError>;

    /// Leave entries still in force. Cancelled entries are not decoded.
    async fn upcoming_leaves(&self, doctor_id: Uuid, auth_token: Option<&str>) -> Result<Vec<LeaveEntry>, DoctorError>;

    /// Status of a leave entry owned by `doctor_id`. Reads only the status
    /// column so entries with unreadable dates can still be managed.
    async fn leave_status(
        &self,
        doctor_id: Uuid,
        leave_id: Uuid,
        auth_token: Option<&str>,
    ) -> Result<Option<LeaveStatus>, DoctorError>;

    /// `upcoming -> cancelled`, only if the entry belongs to `doctor_id` and
    /// is still upcoming. Returns whether a row changed.
    async fn cancel_leave(
        &self,
        doctor_id: Uuid,
        leave_id: Uuid,
        auth_token: Option<&str>,
    ) -> Result<bool, DoctorError>;

    /// `None` when the doctor has no stored row.
    async fn default_slots(&self, doctor_id: Uuid, auth_token: Option<&str>) -> Result<Option<Vec<SlotTime>>, DoctorError>;

    async fn upsert_default_slots(
        &self,
        doctor_id: Uuid,
        slots: &[SlotTime],
        auth_token: Option<&str>,
    ) -> Result<(), DoctorError>;

    /// Start instants of the doctor's non-cancelled appointments in `[from, to)`.
    async fn booked_start_times(
        &self,
        doctor_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        auth_token: Option<&str>,
    ) -> Result<Vec<DateTime<Utc>>, DoctorError>;
}

pub struct SupabaseDoctorStore {
    supabase: Arc<SupabaseClient>,
}

impl SupabaseDoctorStore {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }

    async fn get_rows(&self, path: &str, auth_token: Option<&str>) -> Result<Vec<Value>, DoctorError> {
        let rows: Vec<Value> = self.supabase.request(Method::GET, path, auth_token, None).await?;
        Ok(rows)
    }
}

#[derive(Deserialize)]
struct StartTimeRow {
    start_time: DateTime<Utc>,
}

#[derive(Deserialize)]
struct LeaveStatusRow {
    status: LeaveStatus,
}

fn decode_rows<T: DeserializeOwned>(rows: Vec<Value>, what: &str) -> Result<Vec<T>, DoctorError> {
    rows.into_iter()
        .map(|row| {
            serde_json::from_value(row).map_err(|e| DoctorError::DataIntegrity(format!("{} row: {}", what, e)))
        })
        .collect()
}

fn decode_leaves(rows: Vec<Value>) -> Result<Vec<LeaveEntry>, DoctorError> {
    decode_rows::<LeaveRow>(rows, "leave")?
        .into_iter()
        .map(LeaveEntry::try_from)
        .collect()
}

fn timestamp(instant: DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::Secs, true)
}

#[async_trait]
impl DoctorStore for SupabaseDoctorStore {
    async fn list_therapies(&self, auth_token: Option<&str>) -> Result<Vec<Therapy>, DoctorError> {
        let rows = self.get_rows("/rest/v1/therapies?select=*&order=therapy_name.asc", auth_token).await?;
        decode_rows(rows, "therapy")
    }

    async fn list_profiled_doctors(
        &self,
        therapy_id: Option<&str>,
        auth_token: Option<&str>,
    ) -> Result<Vec<Doctor>, DoctorError> {
        let mut path = "/rest/v1/doctors?is_profile=eq.true".to_string();
        if let Some(therapy_id) = therapy_id {
            path.push_str(&format!("&therapy_id=eq.{}", urlencoding::encode(therapy_id)));
        }
        path.push_str("&order=created_at.asc");

        let rows = self.get_rows(&path, auth_token).await?;
        decode_rows(rows, "doctor")
    }

    async fn find_doctor(&self, doctor_id: Uuid, auth_token: Option<&str>) -> Result<Option<Doctor>, DoctorError> {
        let path = format!("/rest/v1/doctors?id=eq.{}&limit=1", doctor_id);
        let rows = self.get_rows(&path, auth_token).await?;
        Ok(decode_rows(rows, "doctor")?.into_iter().next())
    }

    async fn update_profile(
        &self,
        doctor_id: Uuid,
        profile: &UpdateDoctorProfileRequest,
        auth_token: Option<&str>,
    ) -> Result<Option<Doctor>, DoctorError> {
        let update = json!({
            "name": profile.name,
            "avatar_url": profile.avatar_url,
            "therapy_id": profile.therapy_id,
            "experience": profile.experience,
            "specialist_in": profile.specialist_in,
            "about": profile.about,
            "gender": profile.gender,
            "age": profile.age,
            "qualification": profile.qualification,
            "is_profile": true
        });

        let path = format!("/rest/v1/doctors?id=eq.{}", doctor_id);
        let rows = self.supabase.mutate_returning(Method::PATCH, &path, auth_token, update).await?;
        Ok(decode_rows(rows, "doctor")?.into_iter().next())
    }

    async fn insert_leave(&self, leave: &NewLeaveEntry, auth_token: Option<&str>) -> Result<LeaveEntry, DoctorError> {
        let body = serde_json::to_value(leave).map_err(|e| DoctorError::ValidationError(e.to_string()))?;
        let rows = self
            .supabase
            .mutate_returning(Method::POST, "/rest/v1/doctor_leaves", auth_token, body)
            .await?;

        decode_leaves(rows)?
            .into_iter()
            .next()
            .ok_or_else(|| DoctorError::Storage("Leave insert returned no row".to_string()))
    }

    async fn list_leaves(&self, doctor_id: Uuid, auth_token: Option<&str>) -> Result<Vec<LeaveEntry>, DoctorError> {
        let path = format!("/rest/v1/doctor_leaves?doctor_id=eq.{}&order=created_at.asc", doctor_id);
        let rows = self.get_rows(&path, auth_token).await?;
        decode_leaves(rows)
    }

    async fn upcoming_leaves(&self, doctor_id: Uuid, auth_token: Option<&str>) -> Result<Vec<LeaveEntry>, DoctorError> {
        let path = format!(
            "/rest/v1/doctor_leaves?doctor_id=eq.{}&status=eq.{}",
            doctor_id,
            LeaveStatus::Upcoming.as_str()
        );
        let rows = self.get_rows(&path, auth_token).await?;
        decode_leaves(rows)
    }

    async fn leave_status(
        &self,
        doctor_id: Uuid,
        leave_id: Uuid,
        auth_token: Option<&str>,
    ) -> Result<Option<LeaveStatus>, DoctorError> {
        let path = format!(
            "/rest/v1/doctor_leaves?id=eq.{}&doctor_id=eq.{}&select=status&limit=1",
            leave_id, doctor_id
        );
        let rows = self.get_rows(&path, auth_token).await?;
        Ok(decode_rows::<LeaveStatusRow>(rows, "leave")?.into_iter().next().map(|row| row.status))
    }

    async fn cancel_leave(
        &self,
        doctor_id: Uuid,
        leave_id: Uuid,
        auth_token: Option<&str>,
    ) -> Result<bool, DoctorError> {
        let path = format!(
            "/rest/v1/doctor_leaves?id=eq.{}&doctor_id=eq.{}&status=eq.{}&select=id",
            leave_id,
            doctor_id,
            LeaveStatus::Upcoming.as_str()
        );
        let rows = self
            .supabase
            .mutate_returning(Method::PATCH, &path, auth_token, json!({ "status": LeaveStatus::Cancelled }))
            .await?;
        Ok(!rows.is_empty())
    }

    async fn default_slots(&self, doctor_id: Uuid, auth_token: Option<&str>) -> Result<Option<Vec<SlotTime>>, DoctorError> {
        let path = format!("/rest/v1/doctor_default_availability?doctor_id=eq.{}&limit=1", doctor_id);
        let rows = self.get_rows(&path, auth_token).await?;

        match decode_rows::<DefaultAvailabilityRow>(rows, "default availability")?.into_iter().next() {
            Some(row) => Ok(Some(row.slots()?)),
            None => Ok(None),
        }
    }

    async fn upsert_default_slots(
        &self,
        doctor_id: Uuid,
        slots: &[SlotTime],
        auth_token: Option<&str>,
    ) -> Result<(), DoctorError> {
        let labels: Vec<String> = slots.iter().map(SlotTime::label).collect();
        let body = json!({
            "doctor_id": doctor_id,
            "available_time": labels
        });

        let mut headers = HeaderMap::new();
        headers.insert("Prefer", HeaderValue::from_static("resolution=merge-duplicates,return=minimal"));

        let _: Value = self
            .supabase
            .request_with_headers(
                Method::POST,
                "/rest/v1/doctor_default_availability?on_conflict=doctor_id",
                auth_token,
                Some(body),
                Some(headers),
            )
            .await?;

        debug!("Stored {} default slots for doctor {}", slots.len(), doctor_id);
        Ok(())
    }

    async fn booked_start_times(
        &self,
        doctor_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        auth_token: Option<&str>,
    ) -> Result<Vec<DateTime<Utc>>, DoctorError> {
        let path = format!(
            "/rest/v1/appointments?doctor_id=eq.{}&status=neq.cancelled&start_time=gte.{}&start_time=lt.{}&select=start_time",
            doctor_id,
            timestamp(from),
            timestamp(to)
        );
        let rows = self.get_rows(&path, auth_token).await?;
        Ok(decode_rows::<StartTimeRow>(rows, "appointment")?
            .into_iter()
            .map(|row| row.start_time)
            .collect())
    }
}
