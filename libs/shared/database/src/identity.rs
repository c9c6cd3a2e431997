use async_trait::async_trait;
use reqwest::Method;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use crate::error::DatabaseError;
use crate::supabase::SupabaseClient;

/// Existence checks against the user and doctor directories. Signup, login
/// and password handling live elsewhere.
#[async_trait]
pub trait IdentityDirectory: Send + Sync {
    async fn doctor_exists(&self, doctor_id: Uuid, auth_token: Option<&str>) -> Result<bool, DatabaseError>;
    async fn patient_exists(&self, patient_id: Uuid, auth_token: Option<&str>) -> Result<bool, DatabaseError>;
}

pub struct SupabaseIdentityDirectory {
    supabase: Arc<SupabaseClient>,
}

impl SupabaseIdentityDirectory {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }

    async fn exists(&self, table: &str, id: Uuid, auth_token: Option<&str>) -> Result<bool, DatabaseError> {
        let path = format!("/rest/v1/{}?id=eq.{}&select=id&limit=1", table, id);
        let rows: Vec<Value> = self.supabase.request(
            Method::GET,
            &path,
            auth_token,
            None,
        ).await?;

        debug!("{} {} exists: {}", table, id, !rows.is_empty());
        Ok(!rows.is_empty())
    }
}

#[async_trait]
impl IdentityDirectory for SupabaseIdentityDirectory {
    async fn doctor_exists(&self, doctor_id: Uuid, auth_token: Option<&str>) -> Result<bool, DatabaseError> {
        self.exists("doctors", doctor_id, auth_token).await
    }

    async fn patient_exists(&self, patient_id: Uuid, auth_token: Option<&str>) -> Result<bool, DatabaseError> {
        self.exists("patients", patient_id, auth_token).await
    }
}
