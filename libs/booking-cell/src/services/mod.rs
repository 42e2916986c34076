pub mod backend;
pub mod slots;
pub mod availability;
pub mod lock;
pub mod submit;
pub mod flow;

pub use backend::{BookingBackend, RestBookingBackend};
pub use availability::AvailabilityService;
pub use lock::{HeldLock, LockNegotiator, LockState, LockTick};
pub use submit::BookingSubmitter;
pub use flow::{BookingFlow, FlowNotice, FlowSnapshot, LockStatus};
