use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use futures::try_join;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use shared_utils::time_slot::{parse_civil_label, ClinicClock, SlotTime};

use crate::models::{DefaultAvailability, DoctorError, FALLBACK_SLOT_LABELS};
use crate::store::DoctorStore;

/// Computes bookable slot labels and manages each doctor's recurring offer.
pub struct AvailabilityService {
    store: Arc<dyn DoctorStore>,
    clock: ClinicClock,
}

impl AvailabilityService {
    pub fn new(store: Arc<dyn DoctorStore>, clock: ClinicClock) -> Self {
        Self { store, clock }
    }

    pub fn clock(&self) -> ClinicClock {
        self.clock
    }

    async fn ensure_doctor(&self, doctor_id: Uuid, auth_token: Option<&str>) -> Result<(), DoctorError> {
        match self.store.find_doctor(doctor_id, auth_token).await? {
            Some(_) => Ok(()),
            None => Err(DoctorError::doctor_not_found(doctor_id)),
        }
    }

    pub async fn get_available_slots(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
        auth_token: Option<&str>,
    ) -> Result<Vec<String>, DoctorError> {
        self.get_available_slots_at(doctor_id, date, Utc::now(), auth_token).await
    }

    /// Bookable labels for `date` as seen at `now`, in the doctor's stored
    /// order.
    #[instrument(skip(self, auth_token))]
    pub async fn get_available_slots_at(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
        now: DateTime<Utc>,
        auth_token: Option<&str>,
    ) -> Result<Vec<String>, DoctorError> {
        self.ensure_doctor(doctor_id, auth_token).await?;

        let leaves = self.store.upcoming_leaves(doctor_id, auth_token).await?;
        if leaves.iter().any(|leave| leave.covers(date)) {
            debug!("Doctor {} is on leave on {}", doctor_id, date);
            return Ok(Vec::new());
        }

        let (day_start, day_end) = self.clock.day_bounds(date);
        let (stored, booked) = try_join!(
            self.store.default_slots(doctor_id, auth_token),
            self.store.booked_start_times(doctor_id, day_start, day_end, auth_token),
        )?;

        let offer = match stored {
            Some(slots) => slots,
            None => fallback_slots()?,
        };

        let booked: HashSet<SlotTime> = booked
            .into_iter()
            .map(|start| SlotTime::from_time(self.clock.civil(start).time()))
            .collect();

        let cutoff = (self.clock.civil_date(now) == date)
            .then(|| SlotTime::from_time(self.clock.civil(now).time()));

        let slots = resolve_slots(&offer, &booked, cutoff);
        debug!("Doctor {} has {} open slots on {}", doctor_id, slots.len(), date);
        Ok(slots)
    }

    pub async fn get_default_availability(
        &self,
        doctor_id: Uuid,
        auth_token: Option<&str>,
    ) -> Result<DefaultAvailability, DoctorError> {
        self.ensure_doctor(doctor_id, auth_token).await?;

        let (slots, is_fallback) = match self.store.default_slots(doctor_id, auth_token).await? {
            Some(slots) => (slots, false),
            None => (fallback_slots()?, true),
        };

        Ok(DefaultAvailability {
            doctor_id,
            available_time: slots.iter().map(SlotTime::label).collect(),
            is_fallback,
        })
    }

    /// Replace the doctor's recurring offer. Labels are normalized and
    /// de-duplicated, keeping the first occurrence.
    pub async fn set_default_availability(
        &self,
        doctor_id: Uuid,
        labels: Vec<String>,
        auth_token: Option<&str>,
    ) -> Result<DefaultAvailability, DoctorError> {
        let mut seen = HashSet::new();
        let mut slots = Vec::with_capacity(labels.len());
        for label in &labels {
            let slot = parse_civil_label(label).map_err(|e| DoctorError::ValidationError(e.to_string()))?;
            if seen.insert(slot) {
                slots.push(slot);
            }
        }

        if slots.is_empty() {
            return Err(DoctorError::ValidationError("At least one slot label is required".to_string()));
        }

        self.ensure_doctor(doctor_id, auth_token).await?;
        self.store.upsert_default_slots(doctor_id, &slots, auth_token).await?;

        info!("Default availability updated for doctor {}: {} slots", doctor_id, slots.len());
        Ok(DefaultAvailability {
            doctor_id,
            available_time: slots.iter().map(SlotTime::label).collect(),
            is_fallback: false,
        })
    }
}

fn fallback_slots() -> Result<Vec<SlotTime>, DoctorError> {
    FALLBACK_SLOT_LABELS
        .iter()
        .map(|label| parse_civil_label(label).map_err(|e| DoctorError::DataIntegrity(e.to_string())))
        .collect()
}

/// Drop booked slots and, when `cutoff` is set, every slot at or before it.
/// Order follows `offer`; repeated labels collapse to their first position.
pub fn resolve_slots(offer: &[SlotTime], booked: &HashSet<SlotTime>, cutoff: Option<SlotTime>) -> Vec<String> {
    let mut emitted = HashSet::new();
    offer
        .iter()
        .filter(|slot| !booked.contains(*slot))
        .filter(|slot| cutoff.map_or(true, |cutoff| **slot > cutoff))
        .filter(|slot| emitted.insert(**slot))
        .map(SlotTime::label)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slots(labels: &[&str]) -> Vec<SlotTime> {
        labels.iter().map(|l| parse_civil_label(l).unwrap()).collect()
    }

    #[test]
    fn same_day_cutoff_keeps_only_later_slots() {
        let offer = slots(&FALLBACK_SLOT_LABELS);
        let cutoff = parse_civil_label("3:00PM").ok();
        assert_eq!(resolve_slots(&offer, &HashSet::new(), cutoff), vec!["4:00PM"]);
    }

    #[test]
    fn slot_starting_now_is_not_bookable() {
        let offer = slots(&["2:30PM", "4:00PM"]);
        let cutoff = parse_civil_label("2:30PM").ok();
        assert_eq!(resolve_slots(&offer, &HashSet::new(), cutoff), vec!["4:00PM"]);
    }

    #[test]
    fn booked_slots_are_removed_and_order_is_kept() {
        let offer = slots(&["4:00PM", "10:00AM", "11:30AM", "10:00AM"]);
        let booked: HashSet<SlotTime> = slots(&["11:30AM"]).into_iter().collect();
        assert_eq!(resolve_slots(&offer, &booked, None), vec!["4:00PM", "10:00AM"]);
    }

    #[test]
    fn fallback_labels_parse() {
        let labels: Vec<String> = fallback_slots().unwrap().iter().map(SlotTime::label).collect();
        assert_eq!(labels, FALLBACK_SLOT_LABELS);
    }
}
