use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::Method;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::debug;
use uuid::Uuid;

use shared_database::SupabaseClient;

use crate::models::{
    Appointment, AppointmentDetail, AppointmentError, AppointmentStatus, AttendanceUpdate,
    CancellationRecord, NewAppointment,
};

const DETAIL_SELECT: &str = "*,doctors(name),appointment_cancellations(appointment_id,reason,cancelled_at)";

/// Persistence seam for the appointment aggregate. Every call takes the
/// caller's bearer token; `None` runs with the client's own key.
#[async_trait]
pub trait AppointmentStore: Send + Sync {
    /// Insert the appointment and its attendees in one transaction.
    async fn create_with_attendees(
        &self,
        appointment: &NewAppointment,
        attendee_emails: &[String],
        auth_token: Option<&str>,
    ) -> Result<Uuid, AppointmentError>;

    async fn find(&self, appointment_id: Uuid, auth_token: Option<&str>) -> Result<Option<Appointment>, AppointmentError>;

    /// Ordered by creation time.
    async fn list_for_patient(
        &self,
        patient_id: Uuid,
        auth_token: Option<&str>,
    ) -> Result<Vec<AppointmentDetail>, AppointmentError>;

    /// Ordered by start time.
    async fn list_for_doctor(
        &self,
        doctor_id: Uuid,
        status: Option<AppointmentStatus>,
        auth_token: Option<&str>,
    ) -> Result<Vec<AppointmentDetail>, AppointmentError>;

    /// Fails with `Conflict` when the appointment already has a record.
    async fn insert_cancellation(
        &self,
        record: &CancellationRecord,
        auth_token: Option<&str>,
    ) -> Result<CancellationRecord, AppointmentError>;

    async fn find_cancellation(
        &self,
        appointment_id: Uuid,
        auth_token: Option<&str>,
    ) -> Result<Option<CancellationRecord>, AppointmentError>;

    /// Drop the cancellation record of an appointment that was never
    /// cancelled.
    async fn delete_cancellation(&self, appointment_id: Uuid, auth_token: Option<&str>) -> Result<(), AppointmentError>;

    /// Move `from -> to` only while the row is still in `from`. Returns
    /// whether a row changed.
    async fn transition_status(
        &self,
        appointment_id: Uuid,
        from: AppointmentStatus,
        to: AppointmentStatus,
        auth_token: Option<&str>,
    ) -> Result<bool, AppointmentError>;

    /// Apply `update` while the row's status is one of `allowed`. `None` when
    /// nothing matched.
    async fn update_attendance(
        &self,
        appointment_id: Uuid,
        update: &AttendanceUpdate,
        allowed: &[AppointmentStatus],
        auth_token: Option<&str>,
    ) -> Result<Option<Appointment>, AppointmentError>;

    /// Move every upcoming appointment that ended at or before `now` to
    /// previous, skipping rows that carry a cancellation record. Returns the
    /// ids that moved.
    async fn promote_elapsed(&self, now: DateTime<Utc>, auth_token: Option<&str>) -> Result<Vec<Uuid>, AppointmentError>;

    /// Upcoming appointments that already carry a cancellation record.
    async fn cancelled_but_upcoming(&self, auth_token: Option<&str>) -> Result<Vec<Uuid>, AppointmentError>;
}

pub struct SupabaseAppointmentStore {
    supabase: Arc<SupabaseClient>,
}

impl SupabaseAppointmentStore {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }

    async fn get_rows(&self, path: &str, auth_token: Option<&str>) -> Result<Vec<Value>, AppointmentError> {
        let rows: Vec<Value> = self.supabase.request(Method::GET, path, auth_token, None).await?;
        Ok(rows)
    }
}

#[derive(Deserialize)]
struct DoctorName {
    name: Option<String>,
}

#[derive(Deserialize)]
struct DetailRow {
    #[serde(flatten)]
    appointment: Appointment,
    #[serde(default)]
    doctors: Option<DoctorName>,
    #[serde(default)]
    appointment_cancellations: Value,
}

#[derive(Deserialize)]
struct IdRow {
    id: Uuid,
}

fn decode<T: serde::de::DeserializeOwned>(row: Value, what: &str) -> Result<T, AppointmentError> {
    serde_json::from_value(row).map_err(|e| AppointmentError::DataIntegrity(format!("{} row: {}", what, e)))
}

fn decode_detail(row: Value) -> Result<AppointmentDetail, AppointmentError> {
    let row: DetailRow = decode(row, "appointment")?;

    // One-to-one embeds come back as an object or, on older servers, as a
    // single-element array.
    let cancellation = match row.appointment_cancellations {
        Value::Null => None,
        Value::Array(mut items) if !items.is_empty() => Some(decode(items.swap_remove(0), "cancellation")?),
        Value::Array(_) => None,
        object => Some(decode(object, "cancellation")?),
    };

    Ok(AppointmentDetail {
        appointment: row.appointment,
        doctor_name: row.doctors.and_then(|d| d.name),
        cancellation,
    })
}

fn status_list(statuses: &[AppointmentStatus]) -> String {
    statuses.iter().map(AppointmentStatus::as_str).collect::<Vec<_>>().join(",")
}

fn attendance_body(update: &AttendanceUpdate) -> Value {
    let mut body = Map::new();
    match update {
        AttendanceUpdate::ModalDismissed => {
            body.insert("attended_modal_dismissed".to_string(), json!(true));
        }
        AttendanceUpdate::Feedback { rating, doctor_feedback, meet_feedback } => {
            body.insert("doctor_rating".to_string(), json!(rating));
            body.insert("doctor_feedback".to_string(), json!(doctor_feedback));
            body.insert("meet_feedback".to_string(), json!(meet_feedback));
            body.insert("attended".to_string(), json!(true));
        }
        AttendanceUpdate::Absence { reason } => {
            body.insert("absent_reason".to_string(), json!(reason));
        }
    }
    Value::Object(body)
}

#[async_trait]
impl AppointmentStore for SupabaseAppointmentStore {
    async fn create_with_attendees(
        &self,
        appointment: &NewAppointment,
        attendee_emails: &[String],
        auth_token: Option<&str>,
    ) -> Result<Uuid, AppointmentError> {
        let args = json!({
            "appointment": appointment,
            "attendee_emails": attendee_emails
        });

        let id: Uuid = self
            .supabase
            .rpc("create_appointment_with_attendees", auth_token, args)
            .await?;

        debug!("Appointment {} created with {} attendees", id, attendee_emails.len());
        Ok(id)
    }

    async fn find(&self, appointment_id: Uuid, auth_token: Option<&str>) -> Result<Option<Appointment>, AppointmentError> {
        let path = format!("/rest/v1/appointments?id=eq.{}&limit=1", appointment_id);
        self.get_rows(&path, auth_token)
            .await?
            .into_iter()
            .next()
            .map(|row| decode(row, "appointment"))
            .transpose()
    }

    async fn list_for_patient(
        &self,
        patient_id: Uuid,
        auth_token: Option<&str>,
    ) -> Result<Vec<AppointmentDetail>, AppointmentError> {
        let path = format!(
            "/rest/v1/appointments?patient_id=eq.{}&select={}&order=created_at.asc",
            patient_id, DETAIL_SELECT
        );
        self.get_rows(&path, auth_token).await?.into_iter().map(decode_detail).collect()
    }

    async fn list_for_doctor(
        &self,
        doctor_id: Uuid,
        status: Option<AppointmentStatus>,
        auth_token: Option<&str>,
    ) -> Result<Vec<AppointmentDetail>, AppointmentError> {
        let mut path = format!("/rest/v1/appointments?doctor_id=eq.{}&select={}", doctor_id, DETAIL_SELECT);
        if let Some(status) = status {
            path.push_str(&format!("&status=eq.{}", status));
        }
        path.push_str("&order=start_time.asc");

        self.get_rows(&path, auth_token).await?.into_iter().map(decode_detail).collect()
    }

    async fn insert_cancellation(
        &self,
        record: &CancellationRecord,
        auth_token: Option<&str>,
    ) -> Result<CancellationRecord, AppointmentError> {
        let body = json!({
            "appointment_id": record.appointment_id,
            "reason": record.reason,
            "cancelled_at": record.cancelled_at
        });
        let rows = self
            .supabase
            .mutate_returning(Method::POST, "/rest/v1/appointment_cancellations", auth_token, body)
            .await?;

        match rows.into_iter().next() {
            Some(row) => decode(row, "cancellation"),
            None => Ok(record.clone()),
        }
    }

    async fn find_cancellation(
        &self,
        appointment_id: Uuid,
        auth_token: Option<&str>,
    ) -> Result<Option<CancellationRecord>, AppointmentError> {
        let path = format!("/rest/v1/appointment_cancellations?appointment_id=eq.{}&limit=1", appointment_id);
        self.get_rows(&path, auth_token)
            .await?
            .into_iter()
            .next()
            .map(|row| decode(row, "cancellation"))
            .transpose()
    }

    async fn delete_cancellation(&self, appointment_id: Uuid, auth_token: Option<&str>) -> Result<(), AppointmentError> {
        let path = format!("/rest/v1/appointment_cancellations?appointment_id=eq.{}", appointment_id);
        let _: Value = self.supabase.request(Method::DELETE, &path, auth_token, None).await?;
        Ok(())
    }

    async fn transition_status(
        &self,
        appointment_id: Uuid,
        from: AppointmentStatus,
        to: AppointmentStatus,
        auth_token: Option<&str>,
    ) -> Result<bool, AppointmentError> {
        let path = format!("/rest/v1/appointments?id=eq.{}&status=eq.{}&select=id", appointment_id, from);
        let rows = self
            .supabase
            .mutate_returning(Method::PATCH, &path, auth_token, json!({ "status": to }))
            .await?;
        Ok(!rows.is_empty())
    }

    async fn update_attendance(
        &self,
        appointment_id: Uuid,
        update: &AttendanceUpdate,
        allowed: &[AppointmentStatus],
        auth_token: Option<&str>,
    ) -> Result<Option<Appointment>, AppointmentError> {
        let path = format!(
            "/rest/v1/appointments?id=eq.{}&status=in.({})",
            appointment_id,
            status_list(allowed)
        );
        self.supabase
            .mutate_returning(Method::PATCH, &path, auth_token, attendance_body(update))
            .await?
            .into_iter()
            .next()
            .map(|row| decode(row, "appointment"))
            .transpose()
    }

    async fn promote_elapsed(&self, now: DateTime<Utc>, auth_token: Option<&str>) -> Result<Vec<Uuid>, AppointmentError> {
        let path = format!(
            "/rest/v1/appointments?status=eq.{}&end_time=lte.{}\
             &select=id,appointment_cancellations(appointment_id)&appointment_cancellations=is.null",
            AppointmentStatus::Upcoming,
            now.to_rfc3339_opts(SecondsFormat::Millis, true)
        );
        let rows = self
            .supabase
            .mutate_returning(Method::PATCH, &path, auth_token, json!({ "status": AppointmentStatus::Previous }))
            .await?;

        rows.into_iter()
            .map(|row| decode::<IdRow>(row, "appointment").map(|r| r.id))
            .collect()
    }

    async fn cancelled_but_upcoming(&self, auth_token: Option<&str>) -> Result<Vec<Uuid>, AppointmentError> {
        let path = format!(
            "/rest/v1/appointments?status=eq.{}&select=id,appointment_cancellations!inner(appointment_id)",
            AppointmentStatus::Upcoming
        );
        self.get_rows(&path, auth_token)
            .await?
            .into_iter()
            .map(|row| decode::<IdRow>(row, "appointment").map(|r| r.id))
            .collect()
    }
}
