use std::sync::Arc;

use axum::{
    extract::State,
    http::{header::AUTHORIZATION, Request},
    middleware::Next,
    response::Response,
    body::Body,
};
use uuid::Uuid;

use shared_models::auth::{User, UserRole};
use shared_models::error::AppError;
use shared_config::AppConfig;

use crate::jwt::validate_token;

/// Validates the bearer token and stores the caller in request extensions.
pub async fn auth_middleware(
    State(config): State<Arc<AppConfig>>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let auth_value = request
        .headers()
        .get(AUTHORIZATION)
        .ok_or_else(|| AppError::Auth("Missing authorization header".to_string()))?
        .to_str()
        .map_err(|_| AppError::Auth("Invalid authorization header format".to_string()))?;

    let token = auth_value
        .strip_prefix("Bearer ")
        .ok_or_else(|| AppError::Auth("Invalid authorization header format".to_string()))?;

    let user = validate_token(token, &config.supabase_jwt_secret)
        .map_err(|e| AppError::Auth(e.to_string()))?;

    request.extensions_mut().insert(user);

    Ok(next.run(request).await)
}

pub fn extract_user<B>(request: &Request<B>) -> Result<User, AppError> {
    request
        .extensions()
        .get::<User>()
        .cloned()
        .ok_or_else(|| AppError::Auth("User not found in request extensions".to_string()))
}

/// The caller must hold `role` and be acting on their own record.
pub fn require_self(user: &User, role: UserRole, subject_id: &Uuid) -> Result<(), AppError> {
    if user.is_admin() {
        return Ok(());
    }

    if user.user_role() != Some(role) {
        return Err(AppError::Forbidden(format!("{:?} access required", role)));
    }

    if !user.is_self_or_admin(subject_id) {
        return Err(AppError::Forbidden("Cannot act on another user's records".to_string()));
    }

    Ok(())
}

pub fn require_role(user: &User, role: UserRole) -> Result<(), AppError> {
    if user.is_admin() || user.user_role() == Some(role) {
        Ok(())
    } else {
        Err(AppError::Forbidden(format!("{:?} access required", role)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::TestUser;
    use assert_matches::assert_matches;

    #[test]
    fn doctor_may_only_manage_own_calendar() {
        let doctor = TestUser::doctor("doc@example.com");
        let own_id = Uuid::parse_str(&doctor.id).unwrap();
        let user = doctor.to_user();

        assert!(require_self(&user, UserRole::Doctor, &own_id).is_ok());
        assert_matches!(require_self(&user, UserRole::Doctor, &Uuid::new_v4()), Err(AppError::Forbidden(_)));
        assert_matches!(require_self(&user, UserRole::Patient, &own_id), Err(AppError::Forbidden(_)));
    }

    #[test]
    fn admin_passes_every_guard() {
        let admin = TestUser::admin("ops@example.com").to_user();
        assert!(require_self(&admin, UserRole::Patient, &Uuid::new_v4()).is_ok());
        assert!(require_role(&admin, UserRole::Doctor).is_ok());
    }
}
