use std::sync::Arc;

use tracing::{info, warn};
use uuid::Uuid;

use shared_models::Session;

use crate::error::BookingError;
use crate::models::{BookingConfirmation, BookingForm, BookingRequest};
use crate::services::backend::BookingBackend;
use crate::services::lock::{HeldLock, LockNegotiator};

pub const BOOKED_MESSAGE: &str =
    "Appointment booked! Your appointment is pending confirmation from the vet.";
pub const MISSING_FIELDS_MESSAGE: &str =
    "Please fill in all required fields: Pet, Vet, Appointment Type, Date, and Time.";
pub const NO_RESERVATION_MESSAGE: &str =
    "Please reserve a time slot before confirming the booking.";

pub struct BookingSubmitter {
    backend: Arc<dyn BookingBackend>,
}

impl BookingSubmitter {
    pub fn new(backend: Arc<dyn BookingBackend>) -> Self {
        Self { backend }
    }

    /// Checks every local precondition and builds the request. Never touches
    /// the network.
    pub fn prepare(
        &self,
        clinic_id: Uuid,
        form: &BookingForm,
        held: Option<&HeldLock>,
    ) -> Result<BookingRequest, BookingError> {
        let (Some(pet_id), Some(vet_id), Some(appointment_type), Some(_date), Some(_time)) =
            (form.pet_id, form.vet_id, form.appointment_type, form.date, form.time)
        else {
            return Err(BookingError::Validation(MISSING_FIELDS_MESSAGE.to_string()));
        };

        let held = held.ok_or_else(|| BookingError::Validation(NO_RESERVATION_MESSAGE.to_string()))?;

        if held.lock.vet_id != vet_id {
            return Err(BookingError::Validation(
                "The reserved slot belongs to a different vet. Please select a time again.".to_string(),
            ));
        }

        Ok(BookingRequest {
            pet_id,
            vet_id,
            clinic_id,
            appointment_date: held.lock.appointment_time,
            notes: form.notes.clone(),
            appointment_type,
        })
    }

    /// Submits the booking for the currently held lock.
    ///
    /// On success the slot-bound form state is cleared and the lock is marked
    /// consumed. On a conflict the selected time is cleared and the lock is
    /// released; the caller is expected to refresh availability. Any other
    /// failure leaves the form and lock untouched.
    pub async fn submit(
        &self,
        session: &Session,
        clinic_id: Uuid,
        form: &mut BookingForm,
        negotiator: &mut LockNegotiator,
    ) -> Result<BookingConfirmation, BookingError> {
        let request = self.prepare(clinic_id, form, negotiator.held())?;

        match self.backend.create_appointment(session, &request).await {
            Ok(appointment) => {
                info!(
                    "Appointment booked for pet {} with vet {} at {}",
                    request.pet_id, request.vet_id, request.appointment_date
                );
                negotiator.consume();
                form.clear_slot();
                form.notes.clear();

                Ok(BookingConfirmation {
                    appointment,
                    message: BOOKED_MESSAGE.to_string(),
                })
            }
            Err(e) => {
                let error = BookingError::from_submission(e);
                if matches!(error, BookingError::SlotTaken) {
                    warn!(
                        "Slot {} with vet {} was taken before booking completed",
                        request.appointment_date, request.vet_id
                    );
                    form.clear_slot();
                    negotiator.release(session).await;
                } else {
                    warn!("Booking failed: {}", error);
                }
                Err(error)
            }
        }
    }
}
