use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{error, info};
use lodge_availability::AvailabilityManager;

/// Periodically marks lapsed holds as expired so their rooms show up as
/// free in the store itself, not just through lazy expiry on read.
pub fn start_hold_sweeper(availability: Arc<AvailabilityManager>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!(interval_seconds = every.as_secs(), "Hold sweeper started");
        let mut ticker = interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            match availability.cleanup_expired_holds().await {
                Ok(0) => {}
                Ok(expired) => info!(expired, "Hold sweep finished"),
                Err(e) => error!("Hold sweep failed: {}", e),
            }
        }
    })
}
