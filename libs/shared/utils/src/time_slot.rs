//! Civil-clock slot labels.
//!
//! Every bookable start time is shown to callers as a 12-hour label such as
//! `"2:30PM"`, anchored to the clinic's single fixed UTC offset. Labels carry
//! no date and no zone; [`ClinicClock`] supplies both when they are needed.

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveTime, Offset, TimeZone, Timelike, Utc};
use regex::Regex;
use thiserror::Error;
use tracing::warn;

use shared_config::AppConfig;

static LABEL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(1[0-2]|[1-9]):([0-5][0-9])([AaPp][Mm])$").expect("slot label pattern is valid")
});

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SlotLabelError {
    #[error("Malformed slot label: {0:?}")]
    MalformedSlotLabel(String),

    #[error("UTC offset of {0} minutes is out of range")]
    InvalidOffset(i32),
}

/// Hour and minute a label denotes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SlotTime {
    pub hour24: u32,
    pub minute: u32,
}

impl SlotTime {
    pub fn new(hour24: u32, minute: u32) -> Option<Self> {
        (hour24 < 24 && minute < 60).then_some(Self { hour24, minute })
    }

    pub fn from_time(time: NaiveTime) -> Self {
        Self { hour24: time.hour(), minute: time.minute() }
    }

    pub fn as_naive_time(&self) -> NaiveTime {
        // Fields are range-checked at construction.
        NaiveTime::from_hms_opt(self.hour24, self.minute, 0).unwrap_or(NaiveTime::MIN)
    }

    pub fn label(&self) -> String {
        let suffix = if self.hour24 < 12 { "AM" } else { "PM" };
        let hour12 = match self.hour24 % 12 {
            0 => 12,
            h => h,
        };
        format!("{}:{:02}{}", hour12, self.minute, suffix)
    }
}

impl fmt::Display for SlotTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

impl FromStr for SlotTime {
    type Err = SlotLabelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_civil_label(s)
    }
}

/// Render `instant` as a label in the civil time `offset` denotes.
pub fn to_civil_label(instant: DateTime<Utc>, offset: FixedOffset) -> String {
    SlotTime::from_time(instant.with_timezone(&offset).time()).label()
}

/// Inverse of [`to_civil_label`]. Surrounding whitespace is ignored and the
/// AM/PM suffix is case-insensitive; anything else must match exactly.
pub fn parse_civil_label(label: &str) -> Result<SlotTime, SlotLabelError> {
    let malformed = || SlotLabelError::MalformedSlotLabel(label.to_string());
    let caps = LABEL_PATTERN.captures(label.trim()).ok_or_else(malformed)?;

    let hour12: u32 = caps[1].parse().map_err(|_| malformed())?;
    let minute: u32 = caps[2].parse().map_err(|_| malformed())?;
    let is_pm = caps[3].eq_ignore_ascii_case("PM");

    let hour24 = match (hour12, is_pm) {
        (12, false) => 0,
        (12, true) => 12,
        (h, false) => h,
        (h, true) => h + 12,
    };

    SlotTime::new(hour24, minute).ok_or_else(malformed)
}

/// The clinic's wall clock: one fixed offset for all slot math.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClinicClock {
    offset: FixedOffset,
}

impl ClinicClock {
    pub fn from_offset_minutes(minutes: i32) -> Result<Self, SlotLabelError> {
        minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .map(|offset| Self { offset })
            .ok_or(SlotLabelError::InvalidOffset(minutes))
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::from_offset_minutes(config.clinic_utc_offset_minutes).unwrap_or_else(|e| {
            warn!("{}; falling back to UTC", e);
            Self::utc()
        })
    }

    pub fn utc() -> Self {
        Self { offset: Utc.fix() }
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    pub fn offset_minutes(&self) -> i32 {
        self.offset.local_minus_utc() / 60
    }

    pub fn label(&self, instant: DateTime<Utc>) -> String {
        to_civil_label(instant, self.offset)
    }

    pub fn civil(&self, instant: DateTime<Utc>) -> DateTime<FixedOffset> {
        instant.with_timezone(&self.offset)
    }

    pub fn civil_date(&self, instant: DateTime<Utc>) -> NaiveDate {
        self.civil(instant).date_naive()
    }

    /// Half-open UTC window `[start, end)` covering civil `date`.
    pub fn day_bounds(&self, date: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
        let shift = Duration::seconds(i64::from(self.offset.local_minus_utc()));
        let start = Utc.from_utc_datetime(&(date.and_time(NaiveTime::MIN) - shift));
        (start, start + Duration::days(1))
    }

    /// UTC instant of `slot` on civil `date`.
    pub fn instant_of(&self, date: NaiveDate, slot: SlotTime) -> DateTime<Utc> {
        let shift = Duration::seconds(i64::from(self.offset.local_minus_utc()));
        Utc.from_utc_datetime(&(date.and_time(slot.as_naive_time()) - shift))
    }
}

impl TryFrom<i32> for ClinicClock {
    type Error = SlotLabelError;

    fn try_from(minutes: i32) -> Result<Self, Self::Error> {
        Self::from_offset_minutes(minutes)
    }
}

impl From<ClinicClock> for i32 {
    fn from(clock: ClinicClock) -> Self {
        clock.offset_minutes()
    }
}
