use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, SecondsFormat};
use reqwest::Method;
use serde_json::to_value;
use tracing::debug;
use uuid::Uuid;

use shared_backend::BackendClient;
use shared_models::{ApiError, Session};

use crate::models::{AppointmentRecord, BookingRequest, Lock, LockRequest};

/// The backend operations the booking flow consumes.
#[async_trait]
pub trait BookingBackend: Send + Sync {
    /// Appointments and active locks for a vet between `from` and `to`, inclusive.
    async fn vet_bookings(
        &self,
        session: &Session,
        vet_id: Uuid,
        from: DateTime<FixedOffset>,
        to: DateTime<FixedOffset>,
    ) -> Result<Vec<AppointmentRecord>, ApiError>;

    async fn create_lock(&self, session: &Session, request: &LockRequest) -> Result<Lock, ApiError>;

    async fn release_lock(&self, session: &Session, lock_id: Uuid) -> Result<(), ApiError>;

    /// The session's live lock, if the backend still has one.
    async fn current_lock(&self, session: &Session) -> Result<Option<Lock>, ApiError>;

    async fn create_appointment(
        &self,
        session: &Session,
        request: &BookingRequest,
    ) -> Result<AppointmentRecord, ApiError>;
}

pub struct RestBookingBackend {
    client: BackendClient,
}

impl RestBookingBackend {
    pub fn new(client: BackendClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl BookingBackend for RestBookingBackend {
    async fn vet_bookings(
        &self,
        session: &Session,
        vet_id: Uuid,
        from: DateTime<FixedOffset>,
        to: DateTime<FixedOffset>,
    ) -> Result<Vec<AppointmentRecord>, ApiError> {
        let path = format!("/appointments/vet/{}", vet_id);
        let query = [
            ("from", from.to_rfc3339_opts(SecondsFormat::Millis, true)),
            ("to", to.to_rfc3339_opts(SecondsFormat::Millis, true)),
        ];

        let records: Vec<AppointmentRecord> = self.client
            .request_with_query(Method::GET, &path, session, &query, None)
            .await?;

        debug!("Fetched {} bookings for vet {}", records.len(), vet_id);
        Ok(records)
    }

    async fn create_lock(&self, session: &Session, request: &LockRequest) -> Result<Lock, ApiError> {
        self.client
            .request(Method::POST, "/appointment-locks", session, Some(to_value(request)?))
            .await
    }

    async fn release_lock(&self, session: &Session, lock_id: Uuid) -> Result<(), ApiError> {
        let path = format!("/appointment-locks/{}", lock_id);
        self.client
            .request_empty(Method::DELETE, &path, session, None)
            .await
    }

    async fn current_lock(&self, session: &Session) -> Result<Option<Lock>, ApiError> {
        match self.client
            .request::<Lock>(Method::GET, "/appointment-locks", session, None)
            .await
        {
            Ok(lock) => Ok(Some(lock)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn create_appointment(
        &self,
        session: &Session,
        request: &BookingRequest,
    ) -> Result<AppointmentRecord, ApiError> {
        self.client
            .request(Method::POST, "/appointments", session, Some(to_value(request)?))
            .await
    }
}
