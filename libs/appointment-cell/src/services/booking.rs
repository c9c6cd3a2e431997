use std::collections::HashSet;
use std::sync::{Arc, LazyLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::try_join;
use regex::Regex;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use shared_database::IdentityDirectory;
use shared_utils::time_slot::ClinicClock;

use crate::models::{
    AbsenceRequest, Appointment, AppointmentError, AppointmentStatus, AppointmentView,
    AttendanceUpdate, CancellationRecord, CreateAppointmentRequest, FeedbackRequest,
    NewAppointment, MAX_DOCTOR_RATING, MIN_DOCTOR_RATING,
};
use crate::services::lifecycle::{validate_status_transition, ANY_STATUS, ATTENDANCE_STATUSES};
use crate::services::sweep::SweepHandle;
use crate::store::AppointmentStore;

static EMAIL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").expect("email pattern is valid")
});
const MAX_EMAIL_LENGTH: usize = 254;
const DEFAULT_CANCEL_ATTEMPTS: u32 = 3;

fn is_valid_email(email: &str) -> bool {
    email.len() <= MAX_EMAIL_LENGTH && EMAIL_PATTERN.is_match(email)
}

/// Appointment lifecycle: creation, cancellation, attendance metadata and the
/// time-driven promotion to `previous`.
pub struct AppointmentService {
    store: Arc<dyn AppointmentStore>,
    identity: Arc<dyn IdentityDirectory>,
    clock: ClinicClock,
    default_time_zone: String,
    sweep: Option<SweepHandle>,
    max_cancel_attempts: u32,
}

impl AppointmentService {
    pub fn new(
        store: Arc<dyn AppointmentStore>,
        identity: Arc<dyn IdentityDirectory>,
        clock: ClinicClock,
        default_time_zone: impl Into<String>,
    ) -> Self {
        Self {
            store,
            identity,
            clock,
            default_time_zone: default_time_zone.into(),
            sweep: None,
            max_cancel_attempts: DEFAULT_CANCEL_ATTEMPTS,
        }
    }

    /// Wake the promotion sweep when a new appointment has already ended.
    pub fn with_sweep(mut self, sweep: SweepHandle) -> Self {
        self.sweep = Some(sweep);
        self
    }

    pub fn with_max_cancel_attempts(mut self, attempts: u32) -> Self {
        self.max_cancel_attempts = attempts.max(1);
        self
    }

    pub fn clock(&self) -> ClinicClock {
        self.clock
    }

    /// Trimmed, de-duplicated (case-insensitively) attendee emails in payload order.
    fn attendee_emails(&self, request: &CreateAppointmentRequest) -> Result<Vec<String>, AppointmentError> {
        let mut seen = HashSet::new();
        let mut emails = Vec::new();

        for attendee in &request.event.attendees {
            let email = attendee.email.trim();
            if !is_valid_email(email) {
                return Err(AppointmentError::ValidationError(format!("Invalid attendee email {:?}", attendee.email)));
            }
            if seen.insert(email.to_lowercase()) {
                emails.push(email.to_string());
            }
        }

        if emails.is_empty() {
            return Err(AppointmentError::ValidationError("At least one attendee is required".to_string()));
        }
        Ok(emails)
    }

    async fn ensure_patient(&self, patient_id: Uuid, auth_token: Option<&str>) -> Result<(), AppointmentError> {
        if self.identity.patient_exists(patient_id, auth_token).await? {
            Ok(())
        } else {
            Err(AppointmentError::NotFound(format!("Patient {} not found", patient_id)))
        }
    }

    async fn ensure_doctor(&self, doctor_id: Uuid, auth_token: Option<&str>) -> Result<(), AppointmentError> {
        if self.identity.doctor_exists(doctor_id, auth_token).await? {
            Ok(())
        } else {
            Err(AppointmentError::NotFound(format!("Doctor {} not found", doctor_id)))
        }
    }

    // ==========================================================================
    // CREATION
    // ==========================================================================

    /// Insert an upcoming appointment together with its attendees. Nothing is
    /// written when either participant is unknown or the payload is invalid.
    #[instrument(skip(self, request, auth_token), fields(patient_id = %request.patient_id, doctor_id = %request.doctor_id))]
    pub async fn create_appointment(
        &self,
        request: CreateAppointmentRequest,
        auth_token: Option<&str>,
    ) -> Result<Uuid, AppointmentError> {
        let event = &request.event;
        if event.summary.trim().is_empty() {
            return Err(AppointmentError::ValidationError("Appointment summary is required".to_string()));
        }
        if event.end.date_time <= event.start.date_time {
            return Err(AppointmentError::ValidationError("Appointment must end after it starts".to_string()));
        }
        let attendees = self.attendee_emails(&request)?;

        let (patient_known, doctor_known) = try_join!(
            self.identity.patient_exists(request.patient_id, auth_token),
            self.identity.doctor_exists(request.doctor_id, auth_token)
        )?;
        if !patient_known {
            return Err(AppointmentError::NotFound(format!("Patient {} not found", request.patient_id)));
        }
        if !doctor_known {
            return Err(AppointmentError::NotFound(format!("Doctor {} not found", request.doctor_id)));
        }

        let time_zone = event
            .start
            .time_zone
            .clone()
            .filter(|tz| !tz.trim().is_empty())
            .unwrap_or_else(|| self.default_time_zone.clone());

        let new_appointment = NewAppointment {
            patient_id: request.patient_id,
            doctor_id: request.doctor_id,
            summary: event.summary.trim().to_string(),
            description: event.description.clone(),
            start_time: event.start.date_time,
            end_time: event.end.date_time,
            time_zone,
            hangout_link: event.hangout_link.clone(),
            event_id: event.event_id.clone(),
            therapy_type: event.therapy_type.clone(),
            status: AppointmentStatus::Upcoming,
        };

        let appointment_id = match self.store.create_with_attendees(&new_appointment, &attendees, auth_token).await {
            Ok(id) => id,
            Err(AppointmentError::Conflict(_)) => {
                warn!(
                    "Doctor {} already booked at {}",
                    new_appointment.doctor_id,
                    self.clock.label(new_appointment.start_time)
                );
                return Err(AppointmentError::Conflict(format!(
                    "Doctor {} already has an appointment at {} on {}",
                    new_appointment.doctor_id,
                    self.clock.label(new_appointment.start_time),
                    self.clock.civil_date(new_appointment.start_time)
                )));
            }
            Err(e) => return Err(e),
        };

        if let Some(sweep) = &self.sweep {
            sweep.request_if_elapsed(new_appointment.end_time);
        }

        info!(
            "Appointment {} created for patient {} with doctor {} ({} attendees)",
            appointment_id,
            new_appointment.patient_id,
            new_appointment.doctor_id,
            attendees.len()
        );
        Ok(appointment_id)
    }

    pub async fn get_appointment(
        &self,
        appointment_id: Uuid,
        auth_token: Option<&str>,
    ) -> Result<Appointment, AppointmentError> {
        self.store
            .find(appointment_id, auth_token)
            .await?
            .ok_or_else(|| AppointmentError::appointment_not_found(appointment_id))
    }

    // ==========================================================================
    // CANCELLATION
    // ==========================================================================

    /// Record the cancellation, then move the appointment to `cancelled`.
    /// A record left behind by an earlier partial attempt is reused. When the
    /// status write keeps failing the record stays and the periodic
    /// reconciliation finishes the transition.
    #[instrument(skip(self, reason, auth_token))]
    pub async fn cancel_appointment(
        &self,
        appointment_id: Uuid,
        reason: Option<String>,
        auth_token: Option<&str>,
    ) -> Result<CancellationRecord, AppointmentError> {
        let appointment = self.get_appointment(appointment_id, auth_token).await?;
        validate_status_transition(appointment.status, AppointmentStatus::Cancelled)?;

        let reason = reason.map(|r| r.trim().to_string()).filter(|r| !r.is_empty());
        let candidate = CancellationRecord { appointment_id, reason, cancelled_at: Utc::now() };

        let record = match self.store.insert_cancellation(&candidate, auth_token).await {
            Ok(record) => record,
            Err(AppointmentError::Conflict(msg)) => {
                debug!("Reusing cancellation record for appointment {}", appointment_id);
                self.store
                    .find_cancellation(appointment_id, auth_token)
                    .await?
                    .ok_or(AppointmentError::Conflict(msg))?
            }
            Err(e) => return Err(e),
        };

        let mut last_error = None;
        for attempt in 1..=self.max_cancel_attempts {
            match self
                .store
                .transition_status(appointment_id, AppointmentStatus::Upcoming, AppointmentStatus::Cancelled, auth_token)
                .await
            {
                Ok(true) => {
                    info!("Appointment {} cancelled", appointment_id);
                    return Ok(record);
                }
                Ok(false) => return self.settle_cancellation(appointment_id, record, auth_token).await,
                Err(e) if e.is_storage() => {
                    warn!(
                        "Cancelling appointment {} failed on attempt {}/{}: {}",
                        appointment_id, attempt, self.max_cancel_attempts, e
                    );
                    last_error = Some(e);
                    if attempt < self.max_cancel_attempts {
                        tokio::time::sleep(Duration::from_millis(100 * attempt as u64)).await;
                    }
                }
                Err(e) => return Err(e),
            }
        }

        let cause = last_error.map(|e| e.to_string()).unwrap_or_default();
        error!(
            "Appointment {} has a cancellation record but is still upcoming: {}",
            appointment_id, cause
        );
        Err(AppointmentError::Inconsistency(format!(
            "Cancellation of appointment {} was recorded but its status could not be updated; it will be reconciled: {}",
            appointment_id, cause
        )))
    }

    /// The conditional write matched nothing; decide from the current row.
    async fn settle_cancellation(
        &self,
        appointment_id: Uuid,
        record: CancellationRecord,
        auth_token: Option<&str>,
    ) -> Result<CancellationRecord, AppointmentError> {
        let current = self.get_appointment(appointment_id, auth_token).await?;
        if current.status == AppointmentStatus::Cancelled {
            debug!("Appointment {} was already cancelled concurrently", appointment_id);
            return Ok(record);
        }

        if current.status == AppointmentStatus::Previous {
            // Promoted between the status check and the record insert.
            warn!("Appointment {} ended before it could be cancelled", appointment_id);
            self.store.delete_cancellation(appointment_id, auth_token).await?;
            return Err(AppointmentError::InvalidStatusTransition(current.status));
        }

        error!(
            "Appointment {} has a cancellation record but is {}",
            appointment_id, current.status
        );
        Err(AppointmentError::Inconsistency(format!(
            "Appointment {} has a cancellation record but is {}",
            appointment_id, current.status
        )))
    }

    // ==========================================================================
    // ATTENDANCE
    // ==========================================================================

    async fn apply_attendance(
        &self,
        appointment_id: Uuid,
        update: AttendanceUpdate,
        allowed: &[AppointmentStatus],
        auth_token: Option<&str>,
    ) -> Result<Appointment, AppointmentError> {
        if let Some(updated) = self.store.update_attendance(appointment_id, &update, allowed, auth_token).await? {
            return Ok(updated);
        }

        let current = self.get_appointment(appointment_id, auth_token).await?;
        warn!("Attendance update rejected for appointment {} in status {}", appointment_id, current.status);
        Err(AppointmentError::InvalidStatusTransition(current.status))
    }

    pub async fn mark_attended_modal_dismissed(
        &self,
        appointment_id: Uuid,
        auth_token: Option<&str>,
    ) -> Result<Appointment, AppointmentError> {
        self.apply_attendance(appointment_id, AttendanceUpdate::ModalDismissed, ANY_STATUS, auth_token)
            .await
    }

    /// Store the rating and comments and mark the patient as attended.
    #[instrument(skip(self, request, auth_token))]
    pub async fn record_feedback(
        &self,
        appointment_id: Uuid,
        request: FeedbackRequest,
        auth_token: Option<&str>,
    ) -> Result<Appointment, AppointmentError> {
        if !(MIN_DOCTOR_RATING..=MAX_DOCTOR_RATING).contains(&request.rating) {
            return Err(AppointmentError::ValidationError(format!(
                "Rating must be between {} and {}, got {}",
                MIN_DOCTOR_RATING, MAX_DOCTOR_RATING, request.rating
            )));
        }

        let update = AttendanceUpdate::Feedback {
            rating: request.rating,
            doctor_feedback: request.doctor_feedback,
            meet_feedback: request.meet_feedback,
        };
        let updated = self
            .apply_attendance(appointment_id, update, ATTENDANCE_STATUSES, auth_token)
            .await?;

        info!("Feedback recorded for appointment {}", appointment_id);
        Ok(updated)
    }

    pub async fn record_absence(
        &self,
        appointment_id: Uuid,
        request: AbsenceRequest,
        auth_token: Option<&str>,
    ) -> Result<Appointment, AppointmentError> {
        let reason = request.reason.trim();
        if reason.is_empty() {
            return Err(AppointmentError::ValidationError("Absence reason is required".to_string()));
        }

        let update = AttendanceUpdate::Absence { reason: reason.to_string() };
        self.apply_attendance(appointment_id, update, ATTENDANCE_STATUSES, auth_token)
            .await
    }

    // ==========================================================================
    // LISTINGS
    // ==========================================================================

    /// A patient's appointments in creation order.
    pub async fn list_patient_appointments(
        &self,
        patient_id: Uuid,
        auth_token: Option<&str>,
    ) -> Result<Vec<AppointmentView>, AppointmentError> {
        self.ensure_patient(patient_id, auth_token).await?;

        let details = self.store.list_for_patient(patient_id, auth_token).await?;
        debug!("Patient {} has {} appointments", patient_id, details.len());
        Ok(details.into_iter().map(|d| AppointmentView::render(d, &self.clock)).collect())
    }

    /// A doctor's appointments in start order, optionally one status only.
    pub async fn list_doctor_appointments(
        &self,
        doctor_id: Uuid,
        status: Option<AppointmentStatus>,
        auth_token: Option<&str>,
    ) -> Result<Vec<AppointmentView>, AppointmentError> {
        self.ensure_doctor(doctor_id, auth_token).await?;

        let details = self.store.list_for_doctor(doctor_id, status, auth_token).await?;
        Ok(details.into_iter().map(|d| AppointmentView::render(d, &self.clock)).collect())
    }

    // ==========================================================================
    // PERIODIC MAINTENANCE
    // ==========================================================================

    /// Move every upcoming appointment that ended at or before `now` to
    /// `previous`. Running it again changes nothing.
    pub async fn promote_elapsed(
        &self,
        now: DateTime<Utc>,
        auth_token: Option<&str>,
    ) -> Result<Vec<Uuid>, AppointmentError> {
        let promoted = self.store.promote_elapsed(now, auth_token).await?;
        if !promoted.is_empty() {
            info!("Promoted {} elapsed appointments to previous", promoted.len());
        }
        Ok(promoted)
    }

    /// Finish cancellations whose status write never landed.
    pub async fn reconcile_cancellations(&self, auth_token: Option<&str>) -> Result<usize, AppointmentError> {
        let stranded = self.store.cancelled_but_upcoming(auth_token).await?;
        let mut reconciled = 0;

        for appointment_id in stranded {
            if self
                .store
                .transition_status(appointment_id, AppointmentStatus::Upcoming, AppointmentStatus::Cancelled, auth_token)
                .await?
            {
                info!("Reconciled cancellation of appointment {}", appointment_id);
                reconciled += 1;
            }
        }
        Ok(reconciled)
    }
}
