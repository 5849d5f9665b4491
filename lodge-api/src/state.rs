use std::sync::Arc;
use lodge_availability::AvailabilityManager;
use lodge_booking::{BookingErrorHandler, BookingSessionManager};
use lodge_catalog::RateCalculator;

#[derive(Clone)]
pub struct HoldSettings {
    /// Used when a hold request does not name its own TTL.
    pub default_ttl_minutes: i64,
}

#[derive(Clone)]
pub struct AppState {
    pub rates: Arc<RateCalculator>,
    pub availability: Arc<AvailabilityManager>,
    pub sessions: Arc<BookingSessionManager>,
    pub errors: Arc<BookingErrorHandler>,
    pub holds: HoldSettings,
}
