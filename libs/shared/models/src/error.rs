use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;

/// Messages the backend uses when a slot was taken between reservation and booking.
const CONFLICT_MARKERS: [&str; 3] = [
    "just been booked",
    "already has an appointment",
    "reserved by another user",
];

/// Error code the backend attaches to unique-constraint violations on bookings.
pub const DATA_INTEGRITY_VIOLATION: &str = "DATA_INTEGRITY_VIOLATION";

/// Error payload returned by the backend's exception handler.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub error_code: Option<String>,
    pub message: Option<String>,
    pub description: Option<String>,
    pub status_code: Option<u16>,
}

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Not Found: {0}")]
    NotFound(String),

    /// HTTP 409. The backend also uses this status for illegal-state errors
    /// that have nothing to do with slot availability.
    #[error("Conflict: {message}")]
    Conflict { code: Option<String>, message: String },

    #[error("API error ({status}): {message}")]
    Status { status: StatusCode, message: String },

    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ApiError {
    /// Builds the error for a non-success response from its status and raw body.
    pub fn from_response(status: StatusCode, body: &str) -> Self {
        let parsed = serde_json::from_str::<ErrorBody>(body).unwrap_or_default();
        let message = parsed.message
            .filter(|message| !message.is_empty())
            .unwrap_or_else(|| body.trim().to_string());

        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ApiError::Auth(message),
            StatusCode::NOT_FOUND => ApiError::NotFound(message),
            StatusCode::CONFLICT => ApiError::Conflict { code: parsed.error_code, message },
            _ => ApiError::Status { status, message },
        }
    }

    /// The message the backend sent, if the failure came from the backend at all.
    pub fn backend_message(&self) -> Option<&str> {
        let message = match self {
            ApiError::Auth(msg) | ApiError::NotFound(msg) => msg,
            ApiError::Conflict { message, .. } | ApiError::Status { message, .. } => message,
            ApiError::Transport(_) | ApiError::Serialization(_) => return None,
        };

        if message.is_empty() {
            None
        } else {
            Some(message.as_str())
        }
    }

    /// The backend's `errorCode`, kept for 409 responses.
    pub fn error_code(&self) -> Option<&str> {
        match self {
            ApiError::Conflict { code, .. } => code.as_deref(),
            _ => None,
        }
    }

    /// True when the target slot became unavailable under us: a constraint
    /// violation, or a message naming the slot as taken. Other 409s are not.
    pub fn is_conflict(&self) -> bool {
        if self.error_code() == Some(DATA_INTEGRITY_VIOLATION) {
            return true;
        }

        self.backend_message()
            .map(|message| CONFLICT_MARKERS.iter().any(|marker| message.contains(marker)))
            .unwrap_or(false)
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ApiError::NotFound(_))
    }
}
