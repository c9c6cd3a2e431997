use serde::Deserialize;
use thiserror::Error;

/// Failure talking to the persistence layer.
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// Unique or exclusion constraint rejected the write.
    #[error("Constraint violation: {0}")]
    Conflict(String),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Storage backend error: {0}")]
    Backend(String),

    #[error("Invalid request header: {0}")]
    InvalidHeader(String),

    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),
}

impl DatabaseError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, DatabaseError::Conflict(_))
    }

    /// Classify a non-success PostgREST response.
    pub fn from_response(status: u16, body: &str) -> Self {
        let detail: Option<PostgrestErrorBody> = serde_json::from_str(body).ok();
        let code = detail.as_ref().and_then(|d| d.code.as_deref());
        let message = detail
            .as_ref()
            .and_then(|d| d.message.clone())
            .unwrap_or_else(|| body.to_string());

        match (status, code) {
            (409, _) | (_, Some("23505")) | (_, Some("23P01")) => DatabaseError::Conflict(message),
            (401, _) | (403, _) => DatabaseError::Auth(message),
            _ => DatabaseError::Api { status, message },
        }
    }
}

#[derive(Debug, Deserialize)]
struct PostgrestErrorBody {
    code: Option<String>,
    message: Option<String>,
}
