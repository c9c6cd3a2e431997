use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    Json,
};
use axum_extra::TypedHeader;
use chrono::NaiveDate;
use headers::{authorization::Bearer, Authorization};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use shared_models::auth::{User, UserRole};
use shared_models::error::AppError;
use shared_utils::extractor::require_self;

use crate::models::{
    AddLeaveRequest, AvailableSlotsResponse, DoctorError, SetDefaultAvailabilityRequest,
    UpdateDoctorProfileRequest,
};
use crate::router::DoctorState;

#[derive(Debug, Deserialize)]
pub struct AvailableSlotsQuery {
    pub date: String,
}

fn parse_date(raw: &str) -> Result<NaiveDate, DoctorError> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|_| DoctorError::ValidationError(format!("Invalid date {:?}, expected YYYY-MM-DD", raw)))
}

// ==============================================================================
// PUBLIC HANDLERS (NO AUTHENTICATION REQUIRED)
// ==============================================================================

#[axum::debug_handler]
pub async fn list_therapies(State(state): State<DoctorState>) -> Result<Json<Value>, AppError> {
    let therapies = state.directory.list_therapies(None).await?;

    Ok(Json(json!({
        "therapies": therapies,
        "total": therapies.len()
    })))
}

#[axum::debug_handler]
pub async fn list_doctors(State(state): State<DoctorState>) -> Result<Json<Value>, AppError> {
    let doctors = state.directory.list_doctors(None).await?;

    Ok(Json(json!({
        "doctors": doctors,
        "total": doctors.len()
    })))
}

#[axum::debug_handler]
pub async fn list_doctors_by_therapy(
    State(state): State<DoctorState>,
    Path(therapy_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let doctors = state.directory.list_doctors_by_therapy(&therapy_id, None).await?;

    Ok(Json(json!({
        "therapy_id": therapy_id,
        "doctors": doctors,
        "total": doctors.len()
    })))
}

#[axum::debug_handler]
pub async fn get_doctor(
    State(state): State<DoctorState>,
    Path(doctor_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let doctor = state.directory.get_doctor_by_id(doctor_id, None).await?;
    Ok(Json(json!(doctor)))
}

#[axum::debug_handler]
pub async fn get_available_slots(
    State(state): State<DoctorState>,
    Path(doctor_id): Path<Uuid>,
    Query(query): Query<AvailableSlotsQuery>,
) -> Result<Json<AvailableSlotsResponse>, AppError> {
    let date = parse_date(&query.date)?;
    let slots = state.availability.get_available_slots(doctor_id, date, None).await?;

    Ok(Json(AvailableSlotsResponse { doctor_id, date, slots }))
}

// ==============================================================================
// DOCTOR HANDLERS (AUTHENTICATION REQUIRED)
// ==============================================================================

#[axum::debug_handler]
pub async fn update_doctor_profile(
    State(state): State<DoctorState>,
    Path(doctor_id): Path<Uuid>,
    Extension(user): Extension<User>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Json(request): Json<UpdateDoctorProfileRequest>,
) -> Result<Json<Value>, AppError> {
    require_self(&user, UserRole::Doctor, &doctor_id)?;

    let doctor = state
        .directory
        .update_doctor_profile(doctor_id, request, Some(auth.token()))
        .await?;

    Ok(Json(json!(doctor)))
}

#[axum::debug_handler]
pub async fn list_leaves(
    State(state): State<DoctorState>,
    Path(doctor_id): Path<Uuid>,
    Extension(user): Extension<User>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
) -> Result<Json<Value>, AppError> {
    require_self(&user, UserRole::Doctor, &doctor_id)?;

    let leaves = state.leaves.list_leaves(doctor_id, Some(auth.token())).await?;

    Ok(Json(json!({
        "leaves": leaves,
        "total": leaves.len()
    })))
}

#[axum::debug_handler]
pub async fn add_leave(
    State(state): State<DoctorState>,
    Path(doctor_id): Path<Uuid>,
    Extension(user): Extension<User>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Json(request): Json<AddLeaveRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    require_self(&user, UserRole::Doctor, &doctor_id)?;

    let leave = state.leaves.add_leave(doctor_id, request, Some(auth.token())).await?;

    Ok((StatusCode::CREATED, Json(json!(leave))))
}

#[axum::debug_handler]
pub async fn cancel_leave(
    State(state): State<DoctorState>,
    Path((doctor_id, leave_id)): Path<(Uuid, Uuid)>,
    Extension(user): Extension<User>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
) -> Result<Json<Value>, AppError> {
    require_self(&user, UserRole::Doctor, &doctor_id)?;

    let outcome = state.leaves.cancel_leave(doctor_id, leave_id, Some(auth.token())).await?;

    Ok(Json(json!({
        "leave_id": leave_id,
        "result": outcome
    })))
}

#[axum::debug_handler]
pub async fn get_default_availability(
    State(state): State<DoctorState>,
    Path(doctor_id): Path<Uuid>,
    Extension(user): Extension<User>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
) -> Result<Json<Value>, AppError> {
    require_self(&user, UserRole::Doctor, &doctor_id)?;

    let availability = state
        .availability
        .get_default_availability(doctor_id, Some(auth.token()))
        .await?;

    Ok(Json(json!(availability)))
}

#[axum::debug_handler]
pub async fn set_default_availability(
    State(state): State<DoctorState>,
    Path(doctor_id): Path<Uuid>,
    Extension(user): Extension<User>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Json(request): Json<SetDefaultAvailabilityRequest>,
) -> Result<Json<Value>, AppError> {
    require_self(&user, UserRole::Doctor, &doctor_id)?;

    let availability = state
        .availability
        .set_default_availability(doctor_id, request.available_time, Some(auth.token()))
        .await?;

    Ok(Json(json!(availability)))
}
