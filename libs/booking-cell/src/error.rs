use thiserror::Error;

use shared_models::ApiError;

pub const LOCK_REJECTED_FALLBACK: &str = "Could not reserve this time slot.";
pub const GENERIC_FAILURE_FALLBACK: &str = "An unexpected error occurred. Please try again.";

#[derive(Error, Debug)]
pub enum BookingError {
    /// Missing or inconsistent selection, caught before any request goes out.
    #[error("{0}")]
    Validation(String),

    #[error("Could not load time slots: {0}")]
    AvailabilityUnavailable(#[source] ApiError),

    #[error("{message}")]
    LockRejected { message: String },

    #[error("Your reservation has expired. Please select a time slot again.")]
    LockExpired,

    #[error("This time slot is no longer available. Please select another one.")]
    SlotTaken,

    #[error("{0}")]
    Backend(String),

    #[error("Booking flow is closed")]
    Closed,

    #[error(transparent)]
    Api(#[from] ApiError),
}

impl BookingError {
    pub fn lock_rejected(error: &ApiError) -> Self {
        BookingError::LockRejected {
            message: error
                .backend_message()
                .unwrap_or(LOCK_REJECTED_FALLBACK)
                .to_string(),
        }
    }

    /// Classifies a failed appointment submission.
    pub fn from_submission(error: ApiError) -> Self {
        if error.is_conflict() {
            return BookingError::SlotTaken;
        }

        BookingError::Backend(
            error
                .backend_message()
                .unwrap_or(GENERIC_FAILURE_FALLBACK)
                .to_string(),
        )
    }

    /// Errors the user can clear by picking another slot.
    pub fn requires_reselection(&self) -> bool {
        matches!(
            self,
            BookingError::LockRejected { .. } | BookingError::LockExpired | BookingError::SlotTaken
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    #[test]
    fn lock_rejection_prefers_backend_message() {
        let api = ApiError::from_response(
            StatusCode::CONFLICT,
            r#"{"message":"This time slot is temporarily reserved by another user."}"#,
        );
        let error = BookingError::lock_rejected(&api);
        assert_eq!(error.to_string(), "This time slot is temporarily reserved by another user.");
    }

    #[test]
    fn lock_rejection_without_message_uses_fallback() {
        let api = ApiError::from_response(StatusCode::INTERNAL_SERVER_ERROR, "");
        assert_eq!(BookingError::lock_rejected(&api).to_string(), LOCK_REJECTED_FALLBACK);
    }

    #[test]
    fn submission_conflict_becomes_slot_taken() {
        let api = ApiError::from_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            r#"{"message":"This slot has just been booked"}"#,
        );
        assert!(matches!(BookingError::from_submission(api), BookingError::SlotTaken));
    }

    #[test]
    fn other_submission_failures_keep_backend_message() {
        let api = ApiError::from_response(
            StatusCode::CONFLICT,
            r#"{"errorCode":"INVALID_STATE","message":"The selected vet is currently inactive.","statusCode":409}"#,
        );
        let error = BookingError::from_submission(api);
        assert_eq!(error.to_string(), "The selected vet is currently inactive.");
        assert!(!error.requires_reselection());
    }
}
