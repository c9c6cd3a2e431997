//! Decoding of list-valued columns.
//!
//! `leave_dates` and `available_time` are array columns, but rows written by
//! the first version of the service hold a delimited string instead, e.g.
//! `"[2024-05-01, 2024-05-02]"` or `"10:00AM, 11:30AM"`. Both shapes are
//! accepted here; anything else is reported as `DataIntegrity`.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;

use shared_utils::time_slot::{parse_civil_label, SlotTime};

use crate::models::{DoctorError, LeaveEntry, LeaveStatus};

/// A `doctor_leaves` row before its date list is decoded.
#[derive(Debug, Clone, Deserialize)]
pub struct LeaveRow {
    pub id: Uuid,
    pub doctor_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    #[serde(default)]
    pub leave_dates: Value,
    pub status: LeaveStatus,
    pub created_at: Option<DateTime<Utc>>,
}

impl TryFrom<LeaveRow> for LeaveEntry {
    type Error = DoctorError;

    fn try_from(row: LeaveRow) -> Result<Self, Self::Error> {
        let leave_dates = decode_leave_dates(&row.leave_dates)
            .map_err(|e| DoctorError::DataIntegrity(format!("leave {}: {}", row.id, e)))?;

        Ok(LeaveEntry {
            id: row.id,
            doctor_id: row.doctor_id,
            title: row.title,
            description: row.description,
            leave_dates,
            status: row.status,
            created_at: row.created_at,
        })
    }
}

/// A `doctor_default_availability` row before its label list is decoded.
#[derive(Debug, Clone, Deserialize)]
pub struct DefaultAvailabilityRow {
    pub doctor_id: Uuid,
    #[serde(default)]
    pub available_time: Value,
}

impl DefaultAvailabilityRow {
    pub fn slots(&self) -> Result<Vec<SlotTime>, DoctorError> {
        decode_slot_labels(&self.available_time).map_err(|e| {
            DoctorError::DataIntegrity(format!("default availability of doctor {}: {}", self.doctor_id, e))
        })
    }
}

/// Decode a stored date list into ascending, de-duplicated dates.
pub fn decode_leave_dates(raw: &Value) -> Result<Vec<NaiveDate>, String> {
    let mut dates = list_items(raw)?
        .iter()
        .map(|item| parse_stored_date(item))
        .collect::<Result<Vec<_>, _>>()?;

    dates.sort_unstable();
    dates.dedup();
    Ok(dates)
}

/// Decode a stored label list, preserving its order.
pub fn decode_slot_labels(raw: &Value) -> Result<Vec<SlotTime>, String> {
    list_items(raw)?
        .iter()
        .map(|item| parse_civil_label(item).map_err(|e| e.to_string()))
        .collect()
}

fn list_items(raw: &Value) -> Result<Vec<String>, String> {
    match raw {
        Value::Null => Ok(Vec::new()),
        Value::Array(items) => items
            .iter()
            .map(|item| match item {
                Value::String(s) => Ok(s.trim().to_string()),
                other => Err(format!("expected a string list element, found {}", other)),
            })
            .collect(),
        Value::String(s) => Ok(split_legacy_list(s)),
        other => Err(format!("expected a list, found {}", other)),
    }
}

fn split_legacy_list(raw: &str) -> Vec<String> {
    raw.trim()
        .trim_start_matches(['[', '{'])
        .trim_end_matches([']', '}'])
        .split(',')
        .map(|item| item.trim().trim_matches('"').trim().to_string())
        .filter(|item| !item.is_empty())
        .collect()
}

fn parse_stored_date(raw: &str) -> Result<NaiveDate, String> {
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Ok(date);
    }

    // Some legacy rows carry full timestamps; only the calendar date counts.
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.date_naive())
        .map_err(|_| format!("unparsable date {:?}", raw))
}
