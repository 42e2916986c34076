use std::sync::Arc;

use chrono::{DateTime, FixedOffset};
use serde_json::json;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::Session;

pub const TEST_COOKIE: &str = "jwtToken=test-session-token";

pub struct TestConfig {
    pub api_base_url: String,
    pub clinic_utc_offset: FixedOffset,
    pub lock_ttl_seconds: i64,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:8080".to_string(),
            clinic_utc_offset: FixedOffset::east_opt(0).unwrap(),
            lock_ttl_seconds: 300,
        }
    }
}

impl TestConfig {
    /// Config aimed at a mock server, e.g. `MockServer::uri()`.
    pub fn for_mock(uri: impl Into<String>) -> Self {
        Self {
            api_base_url: uri.into(),
            ..Self::default()
        }
    }

    pub fn with_offset_hours(mut self, hours: i32) -> Self {
        self.clinic_utc_offset = FixedOffset::east_opt(hours * 3600).unwrap();
        self
    }

    pub fn to_app_config(&self) -> AppConfig {
        let mut config = AppConfig::for_base_url(self.api_base_url.clone());
        config.session_cookie = TEST_COOKIE.to_string();
        config.clinic_utc_offset = self.clinic_utc_offset;
        config.lock_ttl_seconds = self.lock_ttl_seconds;
        config
    }

    pub fn to_arc(&self) -> Arc<AppConfig> {
        Arc::new(self.to_app_config())
    }
}

pub struct TestSession {
    pub user_id: Uuid,
    pub email: String,
}

impl Default for TestSession {
    fn default() -> Self {
        Self {
            user_id: Uuid::new_v4(),
            email: "owner@example.com".to_string(),
        }
    }
}

impl TestSession {
    pub fn to_session(&self) -> Session {
        Session::new(self.user_id, TEST_COOKIE).with_email(self.email.clone())
    }
}

/// JSON bodies shaped like the clinic backend's responses.
pub struct MockBackendResponses;

impl MockBackendResponses {
    pub fn pet_response(pet_id: Uuid, name: &str) -> serde_json::Value {
        json!({
            "id": pet_id,
            "name": name,
            "species": "DOG",
            "breed": "Beagle",
            "birthdate": "2021-03-14",
            "weight": 12.5,
            "ownerId": Uuid::new_v4()
        })
    }

    pub fn vet_response(vet_id: Uuid, clinic_id: Uuid, full_name: &str) -> serde_json::Value {
        json!({
            "id": vet_id,
            "fullName": full_name,
            "email": "vet@example.com",
            "phone": "+40 700 000 000",
            "specialities": "General practice",
            "isActive": true,
            "clinicId": clinic_id
        })
    }

    pub fn clinic_response(clinic_id: Uuid, name: &str) -> serde_json::Value {
        json!({
            "id": clinic_id,
            "name": name,
            "address": "1 Main Street",
            "city": "Cluj-Napoca",
            "phone": "+40 264 000 000",
            "email": "clinic@example.com"
        })
    }

    pub fn appointment_response(
        vet_id: Uuid,
        start: DateTime<FixedOffset>,
        appointment_type: &str,
    ) -> serde_json::Value {
        json!({
            "id": Uuid::new_v4(),
            "petId": Uuid::new_v4(),
            "petName": "Rex",
            "vetId": vet_id,
            "vetName": "Dr. Test",
            "appointmentDate": start.to_rfc3339(),
            "status": "PENDING",
            "notes": "",
            "type": appointment_type
        })
    }

    /// A lock row as listed alongside appointments, with its duration only in the notes.
    pub fn legacy_lock_row(vet_id: Uuid, start: DateTime<FixedOffset>, duration_minutes: u32) -> serde_json::Value {
        json!({
            "id": Uuid::new_v4(),
            "vetId": vet_id,
            "appointmentDate": start.to_rfc3339(),
            "status": "LOCKED",
            "notes": format!("DURATION:{}", duration_minutes),
            "type": null
        })
    }

    pub fn lock_row(vet_id: Uuid, start: DateTime<FixedOffset>, duration_minutes: u32) -> serde_json::Value {
        json!({
            "id": Uuid::new_v4(),
            "vetId": vet_id,
            "appointmentDate": start.to_rfc3339(),
            "status": "LOCKED",
            "durationMinutes": duration_minutes
        })
    }

    pub fn lock_response(
        lock_id: Uuid,
        vet_id: Uuid,
        start: DateTime<FixedOffset>,
        duration_minutes: u32,
        expires_at: DateTime<FixedOffset>,
    ) -> serde_json::Value {
        json!({
            "id": lock_id,
            "vetId": vet_id,
            "userId": Uuid::new_v4(),
            "appointmentTime": start.to_rfc3339(),
            "expiresAt": expires_at.to_rfc3339(),
            "durationMinutes": duration_minutes
        })
    }

    /// A lock response without `expiresAt`.
    pub fn bare_lock_response(lock_id: Uuid, vet_id: Uuid, start: DateTime<FixedOffset>) -> serde_json::Value {
        json!({
            "id": lock_id,
            "vetId": vet_id,
            "appointmentTime": start.to_rfc3339()
        })
    }

    pub fn error_response(status: u16, error_code: &str, message: &str) -> serde_json::Value {
        json!({
            "errorCode": error_code,
            "message": message,
            "description": message,
            "statusCode": status
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_creation() {
        let config = TestConfig::for_mock("http://127.0.0.1:9999").with_offset_hours(2);
        let app_config = config.to_app_config();

        assert_eq!(app_config.api_base_url, "http://127.0.0.1:9999");
        assert_eq!(app_config.clinic_utc_offset.local_minus_utc(), 7200);
        assert_eq!(app_config.lock_ttl_seconds, 300);
        assert!(app_config.is_configured());
    }

    #[test]
    fn test_session_carries_cookie() {
        let session = TestSession::default().to_session();
        assert_eq!(session.cookie_header(), TEST_COOKIE);
        assert!(!session.is_anonymous());
    }

    #[test]
    fn legacy_lock_row_encodes_duration_in_notes() {
        let start = DateTime::parse_from_rfc3339("2025-06-20T10:00:00Z").unwrap();
        let row = MockBackendResponses::legacy_lock_row(Uuid::new_v4(), start, 45);

        assert_eq!(row["status"], "LOCKED");
        assert_eq!(row["notes"], "DURATION:45");
        assert!(row.get("durationMinutes").is_none());
    }
}
