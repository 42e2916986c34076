use crate::models::{AppointmentType, Slot};

pub const OPENING_MINUTE: u32 = 9 * 60;
pub const CLOSING_MINUTE: u32 = 17 * 60;
pub const STEP_MINUTES: u32 = 5;

/// Services at least this long start on half-hour boundaries only.
pub const ALIGNED_DURATION_MINUTES: u32 = 30;
pub const ALIGNMENT_MINUTES: u32 = 30;

/// Every start time in [09:00, 17:00) that leaves room for `duration_minutes`
/// before closing, in ascending order.
pub fn generate_slots(duration_minutes: u32) -> Vec<Slot> {
    let aligned = duration_minutes >= ALIGNED_DURATION_MINUTES;

    (OPENING_MINUTE..CLOSING_MINUTE)
        .step_by(STEP_MINUTES as usize)
        .take_while(|start| start + duration_minutes <= CLOSING_MINUTE)
        .filter(|start| !aligned || start % ALIGNMENT_MINUTES == 0)
        .filter_map(Slot::from_minutes)
        .collect()
}

pub fn candidate_slots(appointment_type: AppointmentType) -> Vec<Slot> {
    generate_slots(appointment_type.duration_minutes())
}
