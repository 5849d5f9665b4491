use lodge_shared::models::AnalyticsEvent;
use tracing::info;

/// Destination for analytics events. Fire-and-forget: implementations must
/// swallow their own failures.
pub trait AnalyticsSink: Send + Sync {
    fn track(&self, event: AnalyticsEvent);
}

/// Writes events to the log under the `analytics` target.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAnalyticsSink;

impl AnalyticsSink for TracingAnalyticsSink {
    fn track(&self, event: AnalyticsEvent) {
        info!(
            target: "analytics",
            event = %event.name,
            timestamp = event.timestamp,
            properties = %event.properties,
            "analytics event"
        );
    }
}
