use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize)]
pub struct JwtClaims {
    pub sub: String,
    pub exp: Option<u64>,
    pub email: Option<String>,
    pub role: Option<String>,
    pub app_metadata: Option<serde_json::Value>,
    pub user_metadata: Option<serde_json::Value>,
    pub aud: Option<String>,
    pub iat: Option<u64>,
}

/// Who is calling. Patients and doctors authenticate separately; the role
/// claim is what tells them apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    Patient,
    Doctor,
    Admin,
}

impl UserRole {
    pub fn from_claim(role: Option<&str>) -> Option<Self> {
        match role? {
            "patient" | "authenticated" => Some(UserRole::Patient),
            "doctor" => Some(UserRole::Doctor),
            "admin" | "service_role" => Some(UserRole::Admin),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: Option<String>,
    pub role: Option<String>,
    pub metadata: Option<serde_json::Value>,
    pub created_at: Option<DateTime<Utc>>,
}

impl User {
    pub fn user_role(&self) -> Option<UserRole> {
        UserRole::from_claim(self.role.as_deref())
    }

    pub fn is_admin(&self) -> bool {
        self.user_role() == Some(UserRole::Admin)
    }

    /// True when the token subject is `id` or the caller is an admin.
    pub fn is_self_or_admin(&self, id: &Uuid) -> bool {
        self.is_admin() || self.id.eq_ignore_ascii_case(&id.to_string())
    }
}
