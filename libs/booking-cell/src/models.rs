// libs/booking-cell/src/models.rs
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime, TimeZone, Timelike, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::BookingError;

/// Occupied minutes for a fetched appointment whose type label we don't recognise.
pub const UNKNOWN_TYPE_DURATION_MINUTES: u32 = 30;

/// Status the backend reports for rows that are temporary reservations.
pub const LOCKED_STATUS: &str = "LOCKED";

// ==============================================================================
// APPOINTMENT TYPES
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AppointmentType {
    Vaccination,
    Deworming,
    Sterilization,
    #[serde(rename = "Check-up")]
    CheckUp,
    #[serde(rename = "Blood/urine tests")]
    BloodUrineTests,
}

impl AppointmentType {
    pub const ALL: [AppointmentType; 5] = [
        AppointmentType::Vaccination,
        AppointmentType::Deworming,
        AppointmentType::Sterilization,
        AppointmentType::CheckUp,
        AppointmentType::BloodUrineTests,
    ];

    pub fn duration_minutes(self) -> u32 {
        match self {
            AppointmentType::Vaccination => 15,
            AppointmentType::Deworming => 10,
            AppointmentType::Sterilization => 60,
            AppointmentType::CheckUp => 30,
            AppointmentType::BloodUrineTests => 45,
        }
    }

    /// Label used on the wire.
    pub fn as_str(self) -> &'static str {
        match self {
            AppointmentType::Vaccination => "Vaccination",
            AppointmentType::Deworming => "Deworming",
            AppointmentType::Sterilization => "Sterilization",
            AppointmentType::CheckUp => "Check-up",
            AppointmentType::BloodUrineTests => "Blood/urine tests",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            AppointmentType::Vaccination => "Vaccination",
            AppointmentType::Deworming => "Deworming (internal/external)",
            AppointmentType::Sterilization => "Sterilization / Neutering",
            AppointmentType::CheckUp => "Routine Check-up",
            AppointmentType::BloodUrineTests => "Blood & Urine Tests",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == label)
    }

    /// Every type has a distinct duration, so a lock's duration identifies its type.
    pub fn from_duration(minutes: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.duration_minutes() == minutes)
    }

    /// Duration for an arbitrary label coming back from the backend.
    pub fn duration_for_label(label: Option<&str>) -> u32 {
        label
            .and_then(Self::from_label)
            .map(Self::duration_minutes)
            .unwrap_or(UNKNOWN_TYPE_DURATION_MINUTES)
    }
}

impl fmt::Display for AppointmentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AppointmentType {
    type Err = BookingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        Self::ALL
            .into_iter()
            .find(|t| {
                t.as_str().eq_ignore_ascii_case(trimmed)
                    || format!("{:?}", t).eq_ignore_ascii_case(trimmed)
                    || t.display_name().eq_ignore_ascii_case(trimmed)
            })
            .ok_or_else(|| BookingError::Validation(format!("Unknown appointment type: {}", s)))
    }
}

// ==============================================================================
// SLOTS
// ==============================================================================

/// A candidate start time-of-day, minute resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Slot {
    minute_of_day: u16,
}

impl Slot {
    pub const MINUTES_PER_DAY: u32 = 24 * 60;

    pub fn from_minutes(minute_of_day: u32) -> Option<Self> {
        if minute_of_day < Self::MINUTES_PER_DAY {
            Some(Self { minute_of_day: minute_of_day as u16 })
        } else {
            None
        }
    }

    pub fn from_hm(hour: u32, minute: u32) -> Option<Self> {
        if minute >= 60 {
            return None;
        }
        Self::from_minutes(hour * 60 + minute)
    }

    pub fn minute_of_day(self) -> u32 {
        self.minute_of_day as u32
    }

    pub fn hour(self) -> u32 {
        self.minute_of_day() / 60
    }

    pub fn minute(self) -> u32 {
        self.minute_of_day() % 60
    }

    pub fn to_naive_time(self) -> NaiveTime {
        NaiveTime::from_hms_opt(self.hour(), self.minute(), 0).unwrap_or(NaiveTime::MIN)
    }

    /// The instant this slot starts on `date` in the clinic's offset.
    pub fn on(self, date: NaiveDate, offset: FixedOffset) -> Option<DateTime<FixedOffset>> {
        offset
            .from_local_datetime(&date.and_time(self.to_naive_time()))
            .single()
    }

    /// The slot an instant falls on, in the clinic's offset, truncated to the minute.
    pub fn of_instant(instant: &DateTime<FixedOffset>, offset: FixedOffset) -> (NaiveDate, Slot) {
        let local = instant.with_timezone(&offset);
        let slot = Slot { minute_of_day: (local.hour() * 60 + local.minute()) as u16 };
        (local.date_naive(), slot)
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour(), self.minute())
    }
}

impl FromStr for Slot {
    type Err = BookingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || BookingError::Validation(format!("Invalid time slot: {}", s));

        let (hour, minute) = s.trim().split_once(':').ok_or_else(invalid)?;
        if minute.len() != 2 {
            return Err(invalid());
        }
        let hour: u32 = hour.parse().map_err(|_| invalid())?;
        let minute: u32 = minute.parse().map_err(|_| invalid())?;

        Slot::from_hm(hour, minute).ok_or_else(invalid)
    }
}

// ==============================================================================
// BACKEND RECORDS
// ==============================================================================

/// An appointment row as returned by the vet calendar endpoint. Active locks
/// come back through the same endpoint with `status == "LOCKED"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppointmentRecord {
    pub id: Option<Uuid>,
    pub pet_id: Option<Uuid>,
    pub pet_name: Option<String>,
    pub vet_id: Option<Uuid>,
    pub vet_name: Option<String>,
    pub clinic_id: Option<Uuid>,
    pub appointment_date: DateTime<FixedOffset>,
    pub status: Option<String>,
    pub notes: Option<String>,
    #[serde(rename = "type")]
    pub appointment_type: Option<String>,
    #[serde(default)]
    pub duration_minutes: Option<u32>,
}

impl AppointmentRecord {
    pub fn is_lock(&self) -> bool {
        self.status
            .as_deref()
            .map(|status| status.eq_ignore_ascii_case(LOCKED_STATUS))
            .unwrap_or(false)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookingKind {
    Appointment,
    Lock,
}

/// A booked or locked interval on the vet's day, normalized for filtering.
#[derive(Debug, Clone, PartialEq)]
pub struct ExistingBooking {
    pub kind: BookingKind,
    pub start: DateTime<FixedOffset>,
    pub duration_minutes: u32,
}

/// Request body for `POST /appointment-locks`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LockRequest {
    pub vet_id: Uuid,
    pub appointment_time: DateTime<FixedOffset>,
    pub duration_minutes: u32,
}

/// A server-granted temporary reservation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lock {
    pub id: Uuid,
    pub vet_id: Uuid,
    #[serde(default)]
    pub user_id: Option<Uuid>,
    pub appointment_time: DateTime<FixedOffset>,
    #[serde(default)]
    pub expires_at: Option<DateTime<FixedOffset>>,
    #[serde(default)]
    pub duration_minutes: Option<u32>,
}

/// Request body for `POST /appointments`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingRequest {
    pub pet_id: Uuid,
    pub vet_id: Uuid,
    pub clinic_id: Uuid,
    pub appointment_date: DateTime<FixedOffset>,
    pub notes: String,
    #[serde(rename = "type")]
    pub appointment_type: AppointmentType,
}

// ==============================================================================
// FORM STATE
// ==============================================================================

/// What the user has picked so far on the booking form.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BookingForm {
    pub pet_id: Option<Uuid>,
    pub vet_id: Option<Uuid>,
    pub appointment_type: Option<AppointmentType>,
    pub date: Option<NaiveDate>,
    pub time: Option<Slot>,
    pub notes: String,
}

impl BookingForm {
    /// Vet, date and type are what availability depends on.
    pub fn availability_inputs(&self) -> Option<(Uuid, NaiveDate, AppointmentType)> {
        match (self.vet_id, self.date, self.appointment_type) {
            (Some(vet_id), Some(date), Some(appointment_type)) => Some((vet_id, date, appointment_type)),
            _ => None,
        }
    }

    /// Drops everything tied to a particular slot, keeping pet/vet/type/date.
    pub fn clear_slot(&mut self) {
        self.time = None;
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BookingConfirmation {
    pub appointment: AppointmentRecord,
    pub message: String,
}

/// Remaining-time view of a held lock at a given instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Countdown {
    pub lock_id: Uuid,
    pub remaining_seconds: i64,
}

pub fn utc_of(instant: &DateTime<FixedOffset>) -> DateTime<Utc> {
    instant.with_timezone(&Utc)
}
