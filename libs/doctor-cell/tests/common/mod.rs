#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use doctor_cell::models::{
    Doctor, DoctorError, LeaveEntry, LeaveStatus, NewLeaveEntry, Therapy, UpdateDoctorProfileRequest,
};
use doctor_cell::store::DoctorStore;
use shared_utils::time_slot::SlotTime;

#[derive(Default)]
struct Inner {
    therapies: Vec<Therapy>,
    doctors: Vec<Doctor>,
    leaves: Vec<LeaveEntry>,
    defaults: HashMap<Uuid, Vec<SlotTime>>,
    bookings: Vec<Booking>,
}

#[derive(Clone)]
struct Booking {
    id: Uuid,
    doctor_id: Uuid,
    start: DateTime<Utc>,
    cancelled: bool,
}

/// Doctor store backed by vectors, for exercising service logic.
#[derive(Default)]
pub struct InMemoryDoctorStore {
    inner: Mutex<Inner>,
}

impl InMemoryDoctorStore {
    pub fn new() -> Arc<Self> {
        let store = Self::default();
        {
            let mut inner = store.inner.lock().unwrap();
            for (id, name) in [
                ("physodynamic", "Psychodynamic Therapy"),
                ("behavioural", "Behavioural Therapy"),
                ("cognitiveBehavioural", "Cognitive Behavioural Therapy"),
                ("humanistic", "Humanistic Therapy"),
            ] {
                inner.therapies.push(Therapy { id: id.to_string(), therapy_name: name.to_string() });
            }
        }
        Arc::new(store)
    }

    pub fn add_doctor(&self, name: &str, therapy_id: &str, is_profile: bool) -> Uuid {
        self.add_doctor_with_id(Uuid::new_v4(), name, therapy_id, is_profile)
    }

    pub fn add_doctor_with_id(&self, id: Uuid, name: &str, therapy_id: &str, is_profile: bool) -> Uuid {
        self.inner.lock().unwrap().doctors.push(Doctor {
            id,
            therapy_id: Some(therapy_id.to_string()),
            name: name.to_string(),
            email: None,
            avatar_url: None,
            experience: None,
            specialist_in: None,
            about: None,
            qualification: None,
            gender: None,
            age: None,
            is_profile,
            created_at: Some(Utc::now()),
        });
        id
    }

    pub fn book(&self, doctor_id: Uuid, start: DateTime<Utc>) -> Uuid {
        let id = Uuid::new_v4();
        self.inner.lock().unwrap().bookings.push(Booking { id, doctor_id, start, cancelled: false });
        id
    }

    pub fn cancel_booking(&self, booking_id: Uuid) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(booking) = inner.bookings.iter_mut().find(|b| b.id == booking_id) {
            booking.cancelled = true;
        }
    }

    pub fn leave(&self, leave_id: Uuid) -> Option<LeaveEntry> {
        self.inner.lock().unwrap().leaves.iter().find(|l| l.id == leave_id).cloned()
    }

    pub fn stored_defaults(&self, doctor_id: Uuid) -> Option<Vec<SlotTime>> {
        self.inner.lock().unwrap().defaults.get(&doctor_id).cloned()
    }
}

#[async_trait]
impl DoctorStore for InMemoryDoctorStore {
    async fn list_therapies(&self, _auth_token: Option<&str>) -> Result<Vec<Therapy>, DoctorError> {
        Ok(self.inner.lock().unwrap().therapies.clone())
    }

    async fn list_profiled_doctors(
        &self,
        therapy_id: Option<&str>,
        _auth_token: Option<&str>,
    ) -> Result<Vec<Doctor>, DoctorError> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .doctors
            .iter()
            .filter(|d| d.is_profile)
            .filter(|d| therapy_id.is_none() || d.therapy_id.as_deref() == therapy_id)
            .cloned()
            .collect())
    }

    async fn find_doctor(&self, doctor_id: Uuid, _auth_token: Option<&str>) -> Result<Option<Doctor>, DoctorError> {
        Ok(self.inner.lock().unwrap().doctors.iter().find(|d| d.id == doctor_id).cloned())
    }

    async fn update_profile(
        &self,
        doctor_id: Uuid,
        profile: &UpdateDoctorProfileRequest,
        _auth_token: Option<&str>,
    ) -> Result<Option<Doctor>, DoctorError> {
        let mut inner = self.inner.lock().unwrap();
        Ok(inner.doctors.iter_mut().find(|d| d.id == doctor_id).map(|doctor| {
            doctor.name = profile.name.clone();
            doctor.avatar_url = profile.avatar_url.clone();
            doctor.therapy_id = Some(profile.therapy_id.clone());
            doctor.experience = Some(profile.experience);
            doctor.specialist_in = Some(profile.specialist_in.clone());
            doctor.about = Some(profile.about.clone());
            doctor.gender = Some(profile.gender);
            doctor.age = Some(profile.age);
            doctor.qualification = Some(profile.qualification.clone());
            doctor.is_profile = true;
            doctor.clone()
        }))
    }

    async fn insert_leave(&self, leave: &NewLeaveEntry, _auth_token: Option<&str>) -> Result<LeaveEntry, DoctorError> {
        let entry = LeaveEntry {
            id: Uuid::new_v4(),
            doctor_id: leave.doctor_id,
            title: leave.title.clone(),
            description: leave.description.clone(),
            leave_dates: leave.leave_dates.clone(),
            status: leave.status,
            created_at: Some(Utc::now()),
        };
        self.inner.lock().unwrap().leaves.push(entry.clone());
        Ok(entry)
    }

    async fn list_leaves(&self, doctor_id: Uuid, _auth_token: Option<&str>) -> Result<Vec<LeaveEntry>, DoctorError> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .leaves
            .iter()
            .filter(|l| l.doctor_id == doctor_id)
            .cloned()
            .collect())
    }

    async fn upcoming_leaves(&self, doctor_id: Uuid, _auth_token: Option<&str>) -> Result<Vec<LeaveEntry>, DoctorError> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .leaves
            .iter()
            .filter(|l| l.doctor_id == doctor_id && l.status == LeaveStatus::Upcoming)
            .cloned()
            .collect())
    }

    async fn leave_status(
        &self,
        doctor_id: Uuid,
        leave_id: Uuid,
        _auth_token: Option<&str>,
    ) -> Result<Option<LeaveStatus>, DoctorError> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .leaves
            .iter()
            .find(|l| l.id == leave_id && l.doctor_id == doctor_id)
            .map(|l| l.status))
    }

    async fn cancel_leave(
        &self,
        doctor_id: Uuid,
        leave_id: Uuid,
        _auth_token: Option<&str>,
    ) -> Result<bool, DoctorError> {
        let mut inner = self.inner.lock().unwrap();
        match inner
            .leaves
            .iter_mut()
            .find(|l| l.id == leave_id && l.doctor_id == doctor_id && l.status == LeaveStatus::Upcoming)
        {
            Some(leave) => {
                leave.status = LeaveStatus::Cancelled;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn default_slots(&self, doctor_id: Uuid, _auth_token: Option<&str>) -> Result<Option<Vec<SlotTime>>, DoctorError> {
        Ok(self.stored_defaults(doctor_id))
    }

    async fn upsert_default_slots(
        &self,
        doctor_id: Uuid,
        slots: &[SlotTime],
        _auth_token: Option<&str>,
    ) -> Result<(), DoctorError> {
        self.inner.lock().unwrap().defaults.insert(doctor_id, slots.to_vec());
        Ok(())
    }

    async fn booked_start_times(
        &self,
        doctor_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        _auth_token: Option<&str>,
    ) -> Result<Vec<DateTime<Utc>>, DoctorError> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .bookings
            .iter()
            .filter(|b| b.doctor_id == doctor_id && !b.cancelled && b.start >= from && b.start < to)
            .map(|b| b.start)
            .collect())
    }
}
