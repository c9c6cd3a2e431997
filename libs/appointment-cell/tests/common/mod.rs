#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use appointment_cell::models::{
    Appointment, AppointmentDetail, AppointmentError, AppointmentStatus, AttendanceUpdate, Attendee,
    CancellationRecord, CreateAppointmentRequest, EventPayload, EventTime, NewAppointment,
};
use appointment_cell::store::AppointmentStore;
use shared_database::{DatabaseError, IdentityDirectory};

#[derive(Default)]
struct Inner {
    appointments: Vec<Appointment>,
    attendees: Vec<(Uuid, String)>,
    cancellations: Vec<CancellationRecord>,
    doctor_names: HashMap<Uuid, String>,
    rejected_attendee: Option<String>,
    failing_transitions: u32,
    transition_calls: u32,
    promote_before_cancellation: bool,
}

/// Appointment store backed by vectors. Creation is all-or-nothing and
/// conditional writes check the current status like the database does.
#[derive(Default)]
pub struct InMemoryAppointmentStore {
    inner: Mutex<Inner>,
}

impl InMemoryAppointmentStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn name_doctor(&self, doctor_id: Uuid, name: &str) {
        self.inner.lock().unwrap().doctor_names.insert(doctor_id, name.to_string());
    }

    /// Attendee inserts for this address fail, as a constraint violation would.
    pub fn reject_attendee(&self, email: &str) {
        self.inner.lock().unwrap().rejected_attendee = Some(email.to_string());
    }

    /// The next `count` status transitions fail with a storage error.
    pub fn fail_transitions(&self, count: u32) {
        self.inner.lock().unwrap().failing_transitions = count;
    }

    /// The next cancellation insert sees the appointment promoted first, as
    /// if a sweep ran between the status check and the insert.
    pub fn promote_before_cancellation(&self) {
        self.inner.lock().unwrap().promote_before_cancellation = true;
    }

    pub fn transition_calls(&self) -> u32 {
        self.inner.lock().unwrap().transition_calls
    }

    pub fn appointment(&self, id: Uuid) -> Option<Appointment> {
        self.inner.lock().unwrap().appointments.iter().find(|a| a.id == id).cloned()
    }

    pub fn appointment_count(&self) -> usize {
        self.inner.lock().unwrap().appointments.len()
    }

    pub fn attendee_count(&self) -> usize {
        self.inner.lock().unwrap().attendees.len()
    }

    pub fn attendees_of(&self, id: Uuid) -> Vec<String> {
        self.inner
            .lock()
            .unwrap()
            .attendees
            .iter()
            .filter(|(appointment_id, _)| *appointment_id == id)
            .map(|(_, email)| email.clone())
            .collect()
    }

    pub fn cancellation(&self, id: Uuid) -> Option<CancellationRecord> {
        self.inner.lock().unwrap().cancellations.iter().find(|c| c.appointment_id == id).cloned()
    }

    /// Force a status without going through the conditional write.
    pub fn set_status(&self, id: Uuid, status: AppointmentStatus) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(appointment) = inner.appointments.iter_mut().find(|a| a.id == id) {
            appointment.status = status;
        }
    }

    fn detail(inner: &Inner, appointment: &Appointment) -> AppointmentDetail {
        AppointmentDetail {
            appointment: appointment.clone(),
            doctor_name: inner.doctor_names.get(&appointment.doctor_id).cloned(),
            cancellation: inner.cancellations.iter().find(|c| c.appointment_id == appointment.id).cloned(),
        }
    }
}

#[async_trait]
impl AppointmentStore for InMemoryAppointmentStore {
    async fn create_with_attendees(
        &self,
        appointment: &NewAppointment,
        attendee_emails: &[String],
        _auth_token: Option<&str>,
    ) -> Result<Uuid, AppointmentError> {
        let mut inner = self.inner.lock().unwrap();

        let double_booked = inner.appointments.iter().any(|a| {
            a.doctor_id == appointment.doctor_id
                && a.start_time == appointment.start_time
                && a.status != AppointmentStatus::Cancelled
        });
        if double_booked {
            return Err(AppointmentError::Conflict("duplicate key value violates unique constraint".to_string()));
        }

        if let Some(rejected) = &inner.rejected_attendee {
            if attendee_emails.iter().any(|e| e == rejected) {
                return Err(AppointmentError::Storage("attendee insert failed".to_string()));
            }
        }

        let id = Uuid::new_v4();
        inner.appointments.push(Appointment {
            id,
            patient_id: appointment.patient_id,
            doctor_id: appointment.doctor_id,
            summary: appointment.summary.clone(),
            description: appointment.description.clone(),
            start_time: appointment.start_time,
            end_time: appointment.end_time,
            time_zone: appointment.time_zone.clone(),
            hangout_link: appointment.hangout_link.clone(),
            event_id: appointment.event_id.clone(),
            therapy_type: appointment.therapy_type.clone(),
            status: appointment.status,
            attended: false,
            attended_modal_dismissed: false,
            absent_reason: None,
            doctor_rating: None,
            doctor_feedback: None,
            meet_feedback: None,
            created_at: Some(Utc::now()),
        });
        for email in attendee_emails {
            inner.attendees.push((id, email.clone()));
        }
        Ok(id)
    }

    async fn find(&self, appointment_id: Uuid, _auth_token: Option<&str>) -> Result<Option<Appointment>, AppointmentError> {
        Ok(self.appointment(appointment_id))
    }

    async fn list_for_patient(
        &self,
        patient_id: Uuid,
        _auth_token: Option<&str>,
    ) -> Result<Vec<AppointmentDetail>, AppointmentError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .appointments
            .iter()
            .filter(|a| a.patient_id == patient_id)
            .map(|a| Self::detail(&inner, a))
            .collect())
    }

    async fn list_for_doctor(
        &self,
        doctor_id: Uuid,
        status: Option<AppointmentStatus>,
        _auth_token: Option<&str>,
    ) -> Result<Vec<AppointmentDetail>, AppointmentError> {
        let inner = self.inner.lock().unwrap();
        let mut details: Vec<AppointmentDetail> = inner
            .appointments
            .iter()
            .filter(|a| a.doctor_id == doctor_id && status.map_or(true, |s| a.status == s))
            .map(|a| Self::detail(&inner, a))
            .collect();
        details.sort_by_key(|d| d.appointment.start_time);
        Ok(details)
    }

    async fn insert_cancellation(
        &self,
        record: &CancellationRecord,
        _auth_token: Option<&str>,
    ) -> Result<CancellationRecord, AppointmentError> {
        let mut inner = self.inner.lock().unwrap();
        if std::mem::take(&mut inner.promote_before_cancellation) {
            if let Some(appointment) = inner.appointments.iter_mut().find(|a| a.id == record.appointment_id) {
                appointment.status = AppointmentStatus::Previous;
            }
        }
        if inner.cancellations.iter().any(|c| c.appointment_id == record.appointment_id) {
            return Err(AppointmentError::Conflict("cancellation already recorded".to_string()));
        }
        inner.cancellations.push(record.clone());
        Ok(record.clone())
    }

    async fn find_cancellation(
        &self,
        appointment_id: Uuid,
        _auth_token: Option<&str>,
    ) -> Result<Option<CancellationRecord>, AppointmentError> {
        Ok(self.cancellation(appointment_id))
    }

    async fn delete_cancellation(&self, appointment_id: Uuid, _auth_token: Option<&str>) -> Result<(), AppointmentError> {
        self.inner.lock().unwrap().cancellations.retain(|c| c.appointment_id != appointment_id);
        Ok(())
    }

    async fn transition_status(
        &self,
        appointment_id: Uuid,
        from: AppointmentStatus,
        to: AppointmentStatus,
        _auth_token: Option<&str>,
    ) -> Result<bool, AppointmentError> {
        let mut inner = self.inner.lock().unwrap();
        inner.transition_calls += 1;
        if inner.failing_transitions > 0 {
            inner.failing_transitions -= 1;
            return Err(AppointmentError::Storage("connection reset".to_string()));
        }

        match inner.appointments.iter_mut().find(|a| a.id == appointment_id && a.status == from) {
            Some(appointment) => {
                appointment.status = to;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn update_attendance(
        &self,
        appointment_id: Uuid,
        update: &AttendanceUpdate,
        allowed: &[AppointmentStatus],
        _auth_token: Option<&str>,
    ) -> Result<Option<Appointment>, AppointmentError> {
        let mut inner = self.inner.lock().unwrap();
        Ok(inner
            .appointments
            .iter_mut()
            .find(|a| a.id == appointment_id && allowed.contains(&a.status))
            .map(|appointment| {
                update.apply(appointment);
                appointment.clone()
            }))
    }

    async fn promote_elapsed(&self, now: DateTime<Utc>, _auth_token: Option<&str>) -> Result<Vec<Uuid>, AppointmentError> {
        let mut inner = self.inner.lock().unwrap();
        let cancelled: HashSet<Uuid> = inner.cancellations.iter().map(|c| c.appointment_id).collect();
        Ok(inner
            .appointments
            .iter_mut()
            .filter(|a| a.status == AppointmentStatus::Upcoming && a.end_time <= now && !cancelled.contains(&a.id))
            .map(|a| {
                a.status = AppointmentStatus::Previous;
                a.id
            })
            .collect())
    }

    async fn cancelled_but_upcoming(&self, _auth_token: Option<&str>) -> Result<Vec<Uuid>, AppointmentError> {
        let inner = self.inner.lock().unwrap();
        let cancelled: HashSet<Uuid> = inner.cancellations.iter().map(|c| c.appointment_id).collect();
        Ok(inner
            .appointments
            .iter()
            .filter(|a| a.status == AppointmentStatus::Upcoming && cancelled.contains(&a.id))
            .map(|a| a.id)
            .collect())
    }
}

/// Identity directory over fixed id sets.
#[derive(Default)]
pub struct StaticIdentity {
    patients: Mutex<HashSet<Uuid>>,
    doctors: Mutex<HashSet<Uuid>>,
}

impl StaticIdentity {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn add_patient(&self, id: Uuid) -> Uuid {
        self.patients.lock().unwrap().insert(id);
        id
    }

    pub fn add_doctor(&self, id: Uuid) -> Uuid {
        self.doctors.lock().unwrap().insert(id);
        id
    }
}

#[async_trait]
impl IdentityDirectory for StaticIdentity {
    async fn doctor_exists(&self, doctor_id: Uuid, _auth_token: Option<&str>) -> Result<bool, DatabaseError> {
        Ok(self.doctors.lock().unwrap().contains(&doctor_id))
    }

    async fn patient_exists(&self, patient_id: Uuid, _auth_token: Option<&str>) -> Result<bool, DatabaseError> {
        Ok(self.patients.lock().unwrap().contains(&patient_id))
    }
}

/// A 45 minute session starting at `start` with one attendee.
pub fn booking_request(patient_id: Uuid, doctor_id: Uuid, start: DateTime<Utc>) -> CreateAppointmentRequest {
    CreateAppointmentRequest {
        patient_id,
        doctor_id,
        event: EventPayload {
            summary: "Therapy session".to_string(),
            description: Some("Initial consultation".to_string()),
            start: EventTime { date_time: start, time_zone: Some("Asia/Kolkata".to_string()) },
            end: EventTime { date_time: start + Duration::minutes(45), time_zone: Some("Asia/Kolkata".to_string()) },
            attendees: vec![Attendee { email: "asha@example.com".to_string() }],
            hangout_link: Some("https://meet.example/abc-defg-hij".to_string()),
            event_id: Some("evt_123".to_string()),
            therapy_type: Some("behavioural".to_string()),
        },
    }
}
