use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    Json,
};
use axum_extra::TypedHeader;
use headers::{authorization::Bearer, Authorization};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_models::auth::{User, UserRole};
use shared_models::error::AppError;
use shared_utils::extractor::require_self;

use crate::models::{
    AbsenceRequest, Appointment, CancelAppointmentRequest, CreateAppointmentRequest,
    DoctorQueueQuery, FeedbackRequest,
};
use crate::router::AppointmentState;

/// Load the appointment and check the caller is its patient, or, when
/// `doctor_allowed`, its doctor.
async fn authorize_participant(
    state: &AppointmentState,
    user: &User,
    appointment_id: Uuid,
    doctor_allowed: bool,
    token: &str,
) -> Result<Appointment, AppError> {
    let appointment = state.appointments.get_appointment(appointment_id, Some(token)).await?;

    let as_patient = require_self(user, UserRole::Patient, &appointment.patient_id);
    if as_patient.is_ok() {
        return Ok(appointment);
    }
    if doctor_allowed && require_self(user, UserRole::Doctor, &appointment.doctor_id).is_ok() {
        return Ok(appointment);
    }

    as_patient.map(|_| appointment)
}

// ==============================================================================
// PATIENT HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn create_appointment(
    State(state): State<AppointmentState>,
    Extension(user): Extension<User>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Json(request): Json<CreateAppointmentRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    require_self(&user, UserRole::Patient, &request.patient_id)?;

    let appointment_id = state
        .appointments
        .create_appointment(request, Some(auth.token()))
        .await?;

    Ok((StatusCode::CREATED, Json(json!({ "appointment_id": appointment_id }))))
}

#[axum::debug_handler]
pub async fn list_patient_appointments(
    State(state): State<AppointmentState>,
    Path(patient_id): Path<Uuid>,
    Extension(user): Extension<User>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
) -> Result<Json<Value>, AppError> {
    require_self(&user, UserRole::Patient, &patient_id)?;

    let appointments = state
        .appointments
        .list_patient_appointments(patient_id, Some(auth.token()))
        .await?;

    Ok(Json(json!({
        "appointments": appointments,
        "total": appointments.len()
    })))
}

#[axum::debug_handler]
pub async fn cancel_appointment(
    State(state): State<AppointmentState>,
    Path(appointment_id): Path<Uuid>,
    Extension(user): Extension<User>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Json(request): Json<CancelAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    authorize_participant(&state, &user, appointment_id, true, auth.token()).await?;

    let record = state
        .appointments
        .cancel_appointment(appointment_id, request.reason, Some(auth.token()))
        .await?;

    Ok(Json(json!({
        "appointment_id": appointment_id,
        "status": "cancelled",
        "reason": record.reason,
        "cancelled_at": record.cancelled_at,
        "cancelled_at_label": state.appointments.clock().label(record.cancelled_at)
    })))
}

#[axum::debug_handler]
pub async fn dismiss_attended_modal(
    State(state): State<AppointmentState>,
    Path(appointment_id): Path<Uuid>,
    Extension(user): Extension<User>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
) -> Result<Json<Value>, AppError> {
    authorize_participant(&state, &user, appointment_id, false, auth.token()).await?;

    let appointment = state
        .appointments
        .mark_attended_modal_dismissed(appointment_id, Some(auth.token()))
        .await?;

    Ok(Json(json!(appointment)))
}

#[axum::debug_handler]
pub async fn record_feedback(
    State(state): State<AppointmentState>,
    Path(appointment_id): Path<Uuid>,
    Extension(user): Extension<User>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Json(request): Json<FeedbackRequest>,
) -> Result<Json<Value>, AppError> {
    authorize_participant(&state, &user, appointment_id, false, auth.token()).await?;

    let appointment = state
        .appointments
        .record_feedback(appointment_id, request, Some(auth.token()))
        .await?;

    Ok(Json(json!(appointment)))
}

#[axum::debug_handler]
pub async fn record_absence(
    State(state): State<AppointmentState>,
    Path(appointment_id): Path<Uuid>,
    Extension(user): Extension<User>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Json(request): Json<AbsenceRequest>,
) -> Result<Json<Value>, AppError> {
    authorize_participant(&state, &user, appointment_id, false, auth.token()).await?;

    let appointment = state
        .appointments
        .record_absence(appointment_id, request, Some(auth.token()))
        .await?;

    Ok(Json(json!(appointment)))
}

// ==============================================================================
// DOCTOR HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn list_doctor_appointments(
    State(state): State<AppointmentState>,
    Path(doctor_id): Path<Uuid>,
    Query(query): Query<DoctorQueueQuery>,
    Extension(user): Extension<User>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
) -> Result<Json<Value>, AppError> {
    require_self(&user, UserRole::Doctor, &doctor_id)?;

    let appointments = state
        .appointments
        .list_doctor_appointments(doctor_id, query.status, Some(auth.token()))
        .await?;

    Ok(Json(json!({
        "doctor_id": doctor_id,
        "appointments": appointments,
        "total": appointments.len()
    })))
}
