pub mod clock;
pub mod error;
pub mod models;
pub mod services;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::BookingError;
pub use models::*;
pub use services::*;
