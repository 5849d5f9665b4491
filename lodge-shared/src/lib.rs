pub mod clock;
pub mod models;

pub use clock::{Clock, ManualClock, SystemClock};
