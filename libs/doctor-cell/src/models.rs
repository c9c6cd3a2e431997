use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use shared_database::DatabaseError;
use shared_models::error::AppError;

/// Longest leave a single `{from, to}` range may expand to.
pub const MAX_LEAVE_RANGE_DAYS: i64 = 366;

// ==============================================================================
// DIRECTORY MODELS
// ==============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Therapy {
    /// Slug such as `behavioural` or `cognitiveBehavioural`.
    pub id: String,
    pub therapy_name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Gender {
    Male,
    Female,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Doctor {
    pub id: Uuid,
    pub therapy_id: Option<String>,
    pub name: String,
    pub email: Option<String>,
    pub avatar_url: Option<String>,
    pub experience: Option<i32>,
    pub specialist_in: Option<String>,
    pub about: Option<String>,
    pub qualification: Option<String>,
    pub gender: Option<Gender>,
    pub age: Option<i32>,
    /// Set once profile setup is complete. Public listings skip doctors
    /// without it.
    #[serde(default)]
    pub is_profile: bool,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateDoctorProfileRequest {
    pub name: String,
    pub avatar_url: Option<String>,
    pub therapy_id: String,
    pub experience: i32,
    pub specialist_in: String,
    pub about: String,
    pub gender: Gender,
    pub age: i32,
    pub qualification: String,
}

impl UpdateDoctorProfileRequest {
    pub fn validate(&self) -> Result<(), DoctorError> {
        if self.name.trim().is_empty() {
            return Err(DoctorError::ValidationError("Name is required".to_string()));
        }
        if self.therapy_id.trim().is_empty() {
            return Err(DoctorError::ValidationError("Therapy is required".to_string()));
        }
        if !(0..=80).contains(&self.experience) {
            return Err(DoctorError::ValidationError(format!(
                "Experience must be between 0 and 80 years, got {}",
                self.experience
            )));
        }
        if !(18..=120).contains(&self.age) {
            return Err(DoctorError::ValidationError(format!(
                "Age must be between 18 and 120, got {}",
                self.age
            )));
        }
        Ok(())
    }
}

// ==============================================================================
// LEAVE CALENDAR MODELS
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LeaveStatus {
    Upcoming,
    Cancelled,
}

impl LeaveStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LeaveStatus::Upcoming => "upcoming",
            LeaveStatus::Cancelled => "cancelled",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaveEntry {
    pub id: Uuid,
    pub doctor_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    /// Ascending, without duplicates.
    pub leave_dates: Vec<NaiveDate>,
    pub status: LeaveStatus,
    pub created_at: Option<DateTime<Utc>>,
}

impl LeaveEntry {
    /// True when this entry takes the doctor off the calendar on `date`.
    /// Cancelled entries never do.
    pub fn covers(&self, date: NaiveDate) -> bool {
        self.status == LeaveStatus::Upcoming && self.leave_dates.binary_search(&date).is_ok()
    }
}

/// Dates for a new leave entry: an explicit list or an inclusive range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LeaveDates {
    List(Vec<NaiveDate>),
    Range { from: NaiveDate, to: NaiveDate },
}

impl LeaveDates {
    /// Expand to the ordered set of calendar dates the entry will hold.
    pub fn expand(&self) -> Result<Vec<NaiveDate>, DoctorError> {
        let mut dates = match self {
            LeaveDates::List(dates) => dates.clone(),
            LeaveDates::Range { from, to } => {
                if from > to {
                    return Err(DoctorError::ValidationError(format!(
                        "Leave range starts after it ends ({} > {})",
                        from, to
                    )));
                }
                let days = (*to - *from).num_days() + 1;
                if days > MAX_LEAVE_RANGE_DAYS {
                    return Err(DoctorError::ValidationError(format!(
                        "Leave range spans {} days; at most {} allowed",
                        days, MAX_LEAVE_RANGE_DAYS
                    )));
                }
                (0..days).map(|offset| *from + Duration::days(offset)).collect()
            }
        };

        dates.sort_unstable();
        dates.dedup();

        if dates.is_empty() {
            return Err(DoctorError::ValidationError("At least one leave date is required".to_string()));
        }

        Ok(dates)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddLeaveRequest {
    pub title: String,
    pub description: Option<String>,
    pub dates: LeaveDates,
}

/// Row shape for inserting a leave entry.
#[derive(Debug, Clone, Serialize)]
pub struct NewLeaveEntry {
    pub doctor_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub leave_dates: Vec<NaiveDate>,
    pub status: LeaveStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeaveCancellation {
    Cancelled,
    AlreadyCancelled,
}

// ==============================================================================
// AVAILABILITY MODELS
// ==============================================================================

/// Offered when a doctor has no default-availability row.
pub const FALLBACK_SLOT_LABELS: [&str; 4] = ["10:00AM", "11:30AM", "2:30PM", "4:00PM"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefaultAvailability {
    pub doctor_id: Uuid,
    pub available_time: Vec<String>,
    /// True when no row is stored and the fallback labels apply.
    pub is_fallback: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetDefaultAvailabilityRequest {
    pub available_time: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvailableSlotsResponse {
    pub doctor_id: Uuid,
    pub date: NaiveDate,
    pub slots: Vec<String>,
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DoctorError {
    #[error("{0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Stored data is malformed: {0}")]
    DataIntegrity(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl DoctorError {
    pub fn doctor_not_found(doctor_id: Uuid) -> Self {
        DoctorError::NotFound(format!("Doctor {} not found", doctor_id))
    }
}

impl From<DatabaseError> for DoctorError {
    fn from(e: DatabaseError) -> Self {
        match e {
            DatabaseError::Conflict(msg) => DoctorError::Conflict(msg),
            other => DoctorError::Storage(other.to_string()),
        }
    }
}

impl From<DoctorError> for AppError {
    fn from(e: DoctorError) -> Self {
        match e {
            DoctorError::NotFound(msg) => AppError::NotFound(msg),
            DoctorError::ValidationError(msg) => AppError::ValidationError(msg),
            DoctorError::DataIntegrity(msg) => AppError::BadRequest(format!("Stored data is malformed: {}", msg)),
            DoctorError::Conflict(msg) => AppError::Conflict(msg),
            DoctorError::Storage(msg) => AppError::Database(msg),
        }
    }
}
