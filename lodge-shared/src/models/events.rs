use uuid::Uuid;

/// A fire-and-forget record handed to an analytics sink.
#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub struct AnalyticsEvent {
    pub name: String,
    pub properties: serde_json::Value,
    pub timestamp: i64,
}

impl AnalyticsEvent {
    pub fn new(name: impl Into<String>, properties: serde_json::Value, timestamp: i64) -> Self {
        Self {
            name: name.into(),
            properties,
            timestamp,
        }
    }
}

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub struct BookingErrorEvent {
    pub code: String,
    pub error_type: String,
    pub severity: String,
    pub retryable: bool,
    pub timestamp: i64,
}

impl BookingErrorEvent {
    pub const NAME: &'static str = "booking_error";

    pub fn into_analytics(self) -> AnalyticsEvent {
        let timestamp = self.timestamp;
        let properties = serde_json::to_value(&self).unwrap_or(serde_json::Value::Null);
        AnalyticsEvent::new(Self::NAME, properties, timestamp)
    }
}

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub struct HoldLifecycleEvent {
    pub hold_id: Uuid,
    pub room_type_id: String,
    pub room_count: i32,
    /// `created`, `released` or `converted`
    pub transition: String,
    pub timestamp: i64,
}

impl HoldLifecycleEvent {
    pub const NAME: &'static str = "booking_hold";

    pub fn into_analytics(self) -> AnalyticsEvent {
        let timestamp = self.timestamp;
        let properties = serde_json::to_value(&self).unwrap_or(serde_json::Value::Null);
        AnalyticsEvent::new(Self::NAME, properties, timestamp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_booking_error_event_uses_fixed_name() {
        let event = BookingErrorEvent {
            code: "PAYMENT_DECLINED".to_string(),
            error_type: "PAYMENT_ERROR".to_string(),
            severity: "high".to_string(),
            retryable: true,
            timestamp: 1_700_000_000,
        };

        let analytics = event.into_analytics();
        assert_eq!(analytics.name, "booking_error");
        assert_eq!(analytics.properties["code"], "PAYMENT_DECLINED");
        assert_eq!(analytics.timestamp, 1_700_000_000);
    }
}
