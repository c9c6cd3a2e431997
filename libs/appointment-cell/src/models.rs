use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use shared_database::DatabaseError;
use shared_models::error::AppError;
use shared_utils::time_slot::ClinicClock;

pub const MIN_DOCTOR_RATING: i32 = 1;
pub const MAX_DOCTOR_RATING: i32 = 5;

// ==============================================================================
// CORE APPOINTMENT MODELS
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppointmentStatus {
    Upcoming,
    Previous,
    Cancelled,
}

impl AppointmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentStatus::Upcoming => "upcoming",
            AppointmentStatus::Previous => "previous",
            AppointmentStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub summary: String,
    pub description: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub time_zone: String,
    pub hangout_link: Option<String>,
    pub event_id: Option<String>,
    pub therapy_type: Option<String>,
    pub status: AppointmentStatus,
    #[serde(default)]
    pub attended: bool,
    #[serde(default)]
    pub attended_modal_dismissed: bool,
    pub absent_reason: Option<String>,
    pub doctor_rating: Option<i32>,
    pub doctor_feedback: Option<String>,
    pub meet_feedback: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CancellationRecord {
    pub appointment_id: Uuid,
    pub reason: Option<String>,
    pub cancelled_at: DateTime<Utc>,
}

/// An appointment joined with the doctor's display name and any
/// cancellation record.
#[derive(Debug, Clone, PartialEq)]
pub struct AppointmentDetail {
    pub appointment: Appointment,
    pub doctor_name: Option<String>,
    pub cancellation: Option<CancellationRecord>,
}

/// Row shape handed to the creation function.
#[derive(Debug, Clone, Serialize)]
pub struct NewAppointment {
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub summary: String,
    pub description: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub time_zone: String,
    pub hangout_link: Option<String>,
    pub event_id: Option<String>,
    pub therapy_type: Option<String>,
    pub status: AppointmentStatus,
}

/// Attendance metadata writes. None of them touch `status`.
#[derive(Debug, Clone, PartialEq)]
pub enum AttendanceUpdate {
    ModalDismissed,
    Feedback {
        rating: i32,
        doctor_feedback: Option<String>,
        meet_feedback: Option<String>,
    },
    Absence {
        reason: String,
    },
}

impl AttendanceUpdate {
    pub fn apply(&self, appointment: &mut Appointment) {
        match self {
            AttendanceUpdate::ModalDismissed => appointment.attended_modal_dismissed = true,
            AttendanceUpdate::Feedback { rating, doctor_feedback, meet_feedback } => {
                appointment.doctor_rating = Some(*rating);
                appointment.doctor_feedback = doctor_feedback.clone();
                appointment.meet_feedback = meet_feedback.clone();
                appointment.attended = true;
            }
            AttendanceUpdate::Absence { reason } => appointment.absent_reason = Some(reason.clone()),
        }
    }
}

// ==============================================================================
// REQUEST MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventTime {
    pub date_time: DateTime<Utc>,
    pub time_zone: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attendee {
    pub email: String,
}

/// Calendar event as produced upstream. The event id and meeting link are
/// already resolved when it reaches this service.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventPayload {
    pub summary: String,
    pub description: Option<String>,
    pub start: EventTime,
    pub end: EventTime,
    #[serde(default)]
    pub attendees: Vec<Attendee>,
    pub hangout_link: Option<String>,
    pub event_id: Option<String>,
    pub therapy_type: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAppointmentRequest {
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub event: EventPayload,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CancelAppointmentRequest {
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackRequest {
    pub rating: i32,
    pub doctor_feedback: Option<String>,
    pub meet_feedback: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AbsenceRequest {
    pub reason: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DoctorQueueQuery {
    pub status: Option<AppointmentStatus>,
}

// ==============================================================================
// RESPONSE MODELS
// ==============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CancellationView {
    pub reason: Option<String>,
    pub cancelled_at: DateTime<Utc>,
    pub cancelled_at_label: String,
}

/// An appointment as callers see it, with civil date and slot labels.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AppointmentView {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub doctor_name: Option<String>,
    pub summary: String,
    pub description: Option<String>,
    pub date: NaiveDate,
    pub start_label: String,
    pub end_label: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub time_zone: String,
    pub hangout_link: Option<String>,
    pub event_id: Option<String>,
    pub therapy_type: Option<String>,
    pub status: AppointmentStatus,
    pub attended: bool,
    pub attended_modal_dismissed: bool,
    pub absent_reason: Option<String>,
    pub doctor_rating: Option<i32>,
    pub doctor_feedback: Option<String>,
    pub meet_feedback: Option<String>,
    pub cancellation: Option<CancellationView>,
    pub created_at: Option<DateTime<Utc>>,
}

impl AppointmentView {
    pub fn render(detail: AppointmentDetail, clock: &ClinicClock) -> Self {
        let AppointmentDetail { appointment: a, doctor_name, cancellation } = detail;

        Self {
            date: clock.civil_date(a.start_time),
            start_label: clock.label(a.start_time),
            end_label: clock.label(a.end_time),
            cancellation: cancellation.map(|c| CancellationView {
                cancelled_at_label: clock.label(c.cancelled_at),
                reason: c.reason,
                cancelled_at: c.cancelled_at,
            }),
            id: a.id,
            patient_id: a.patient_id,
            doctor_id: a.doctor_id,
            doctor_name,
            summary: a.summary,
            description: a.description,
            start_time: a.start_time,
            end_time: a.end_time,
            time_zone: a.time_zone,
            hangout_link: a.hangout_link,
            event_id: a.event_id,
            therapy_type: a.therapy_type,
            status: a.status,
            attended: a.attended,
            attended_modal_dismissed: a.attended_modal_dismissed,
            absent_reason: a.absent_reason,
            doctor_rating: a.doctor_rating,
            doctor_feedback: a.doctor_feedback,
            meet_feedback: a.meet_feedback,
            created_at: a.created_at,
        }
    }
}

/// Outcome of one promotion sweep pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub promoted: usize,
    pub reconciled: usize,
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AppointmentError {
    #[error("{0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Stored data is malformed: {0}")]
    DataIntegrity(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Appointment cannot be modified in current status: {0}")]
    InvalidStatusTransition(AppointmentStatus),

    #[error("Appointment state is inconsistent: {0}")]
    Inconsistency(String),
}

impl AppointmentError {
    pub fn appointment_not_found(appointment_id: Uuid) -> Self {
        AppointmentError::NotFound(format!("Appointment {} not found", appointment_id))
    }

    pub fn is_storage(&self) -> bool {
        matches!(self, AppointmentError::Storage(_))
    }
}

impl From<DatabaseError> for AppointmentError {
    fn from(e: DatabaseError) -> Self {
        match e {
            DatabaseError::Conflict(msg) => AppointmentError::Conflict(msg),
            other => AppointmentError::Storage(other.to_string()),
        }
    }
}

impl From<AppointmentError> for AppError {
    fn from(e: AppointmentError) -> Self {
        match e {
            AppointmentError::NotFound(msg) => AppError::NotFound(msg),
            AppointmentError::ValidationError(msg) => AppError::ValidationError(msg),
            AppointmentError::DataIntegrity(msg) => AppError::BadRequest(format!("Stored data is malformed: {}", msg)),
            AppointmentError::Conflict(msg) => AppError::Conflict(msg),
            AppointmentError::InvalidStatusTransition(status) => {
                AppError::Conflict(format!("Appointment is {} and cannot be modified", status))
            }
            AppointmentError::Storage(msg) => AppError::Database(msg),
            AppointmentError::Inconsistency(msg) => AppError::Internal(msg),
        }
    }
}
