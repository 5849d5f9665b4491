pub mod events;

pub use events::{AnalyticsEvent, BookingErrorEvent, HoldLifecycleEvent};
