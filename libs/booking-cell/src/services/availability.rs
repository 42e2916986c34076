use std::sync::Arc;

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveTime, TimeZone};
use regex::Regex;
use tracing::{debug, error, warn};
use uuid::Uuid;

use shared_models::Session;

use crate::error::BookingError;
use crate::models::{
    AppointmentRecord, AppointmentType, BookingKind, ExistingBooking, Slot,
};
use crate::services::backend::BookingBackend;
use crate::services::slots::candidate_slots;

/// Legacy encoding of a lock's duration inside its notes, e.g. `DURATION:45`.
const DURATION_MARKER: &str = r"DURATION:(\d+)";

pub struct AvailabilityService {
    backend: Arc<dyn BookingBackend>,
    offset: FixedOffset,
    duration_marker: Option<Regex>,
}

impl AvailabilityService {
    pub fn new(backend: Arc<dyn BookingBackend>, offset: FixedOffset) -> Self {
        Self {
            backend,
            offset,
            duration_marker: Regex::new(DURATION_MARKER).ok(),
        }
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    /// Free start times for `appointment_type` with `vet_id` on `date`.
    ///
    /// Fails closed: if the vet's bookings can't be fetched no slot is offered.
    pub async fn available_slots(
        &self,
        session: &Session,
        vet_id: Uuid,
        date: NaiveDate,
        appointment_type: AppointmentType,
    ) -> Result<Vec<Slot>, BookingError> {
        debug!("Calculating available slots for vet {} on {} ({})", vet_id, date, appointment_type);

        let (from, to) = day_bounds(date, self.offset);

        let records = self.backend
            .vet_bookings(session, vet_id, from, to)
            .await
            .map_err(|e| {
                error!("Failed to load bookings for vet {} on {}: {}", vet_id, date, e);
                BookingError::AvailabilityUnavailable(e)
            })?;

        let bookings: Vec<ExistingBooking> = records.iter()
            .map(|record| self.existing_booking(record, appointment_type))
            .collect();

        let available = filter_available(
            &candidate_slots(appointment_type),
            appointment_type.duration_minutes(),
            &bookings,
            from,
        );

        debug!("Found {} available slots", available.len());
        Ok(available)
    }

    /// Normalizes a fetched row into the interval it occupies.
    ///
    /// Lock rows without a `durationMinutes` field fall back to the legacy notes
    /// marker and then to the requested type's duration.
    pub fn existing_booking(
        &self,
        record: &AppointmentRecord,
        requested: AppointmentType,
    ) -> ExistingBooking {
        let kind = if record.is_lock() { BookingKind::Lock } else { BookingKind::Appointment };

        let duration_minutes = match (kind, record.duration_minutes) {
            (_, Some(minutes)) => minutes,
            (BookingKind::Lock, None) => match self.legacy_duration(record.notes.as_deref()) {
                Some(minutes) => {
                    warn!(
                        "Lock at {} carries its duration only in notes; backend should send durationMinutes",
                        record.appointment_date
                    );
                    minutes
                }
                None => {
                    warn!(
                        "Lock at {} has no duration, assuming requested {} minutes",
                        record.appointment_date,
                        requested.duration_minutes()
                    );
                    requested.duration_minutes()
                }
            },
            (BookingKind::Appointment, None) => {
                AppointmentType::duration_for_label(record.appointment_type.as_deref())
            }
        };

        ExistingBooking {
            kind,
            start: record.appointment_date,
            duration_minutes,
        }
    }

    fn legacy_duration(&self, notes: Option<&str>) -> Option<u32> {
        let marker = self.duration_marker.as_ref()?;
        let captures = marker.captures(notes?)?;
        captures.get(1)?.as_str().parse().ok()
    }
}

/// First and last instant of `date` in the clinic's offset.
pub fn day_bounds(date: NaiveDate, offset: FixedOffset) -> (DateTime<FixedOffset>, DateTime<FixedOffset>) {
    let start = offset
        .from_local_datetime(&date.and_time(NaiveTime::MIN))
        .single()
        .unwrap_or_else(|| date.and_time(NaiveTime::MIN).and_utc().fixed_offset());
    let end = start + Duration::days(1) - Duration::milliseconds(1);
    (start, end)
}

/// Half-open overlap of `[slot, slot + d)` and `[start, start + b)`.
pub fn overlaps(slot_start: i64, d: i64, booking_start: i64, b: i64) -> bool {
    slot_start < booking_start + b && slot_start + d > booking_start
}

/// Drops every candidate whose interval overlaps an existing booking.
/// Booking starts are measured in minutes from `day_start`.
pub fn filter_available(
    candidates: &[Slot],
    duration_minutes: u32,
    bookings: &[ExistingBooking],
    day_start: DateTime<FixedOffset>,
) -> Vec<Slot> {
    let taken: Vec<(i64, i64)> = bookings.iter()
        .map(|booking| {
            let start = (booking.start - day_start).num_minutes();
            (start, booking.duration_minutes as i64)
        })
        .collect();

    candidates.iter()
        .copied()
        .filter(|slot| {
            let t = slot.minute_of_day() as i64;
            !taken.iter().any(|&(start, b)| overlaps(t, duration_minutes as i64, start, b))
        })
        .collect()
}
