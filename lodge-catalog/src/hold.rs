use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use crate::inventory::stays_overlap;

pub const DEFAULT_HOLD_MINUTES: i64 = 15;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum HoldStatus {
    Active,
    Expired,
    Converted,
}

impl HoldStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            HoldStatus::Active => "active",
            HoldStatus::Expired => "expired",
            HoldStatus::Converted => "converted",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "active" => Some(HoldStatus::Active),
            "expired" => Some(HoldStatus::Expired),
            "converted" => Some(HoldStatus::Converted),
            _ => None,
        }
    }
}

/// Ask for rooms to be held while the guest finishes checkout.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HoldRequest {
    pub room_type_id: String,
    pub check_in_date: NaiveDate,
    pub check_out_date: NaiveDate,
    pub room_count: i32,
    #[serde(default = "default_hold_minutes")]
    pub expires_in_minutes: i64,
}

fn default_hold_minutes() -> i64 {
    DEFAULT_HOLD_MINUTES
}

impl HoldRequest {
    pub fn new(room_type_id: impl Into<String>, check_in_date: NaiveDate, check_out_date: NaiveDate, room_count: i32) -> Self {
        Self {
            room_type_id: room_type_id.into(),
            check_in_date,
            check_out_date,
            room_count,
            expires_in_minutes: DEFAULT_HOLD_MINUTES,
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.room_count < 1 {
            return Err("room_count must be at least 1".to_string());
        }
        if self.check_out_date <= self.check_in_date {
            return Err("check_out_date must be after check_in_date".to_string());
        }
        if self.expires_in_minutes <= 0 {
            return Err("expires_in_minutes must be positive".to_string());
        }
        Ok(())
    }
}

/// A time-boxed lease on room inventory.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BookingHold {
    pub hold_id: Uuid,
    pub room_type_id: String,
    pub check_in_date: NaiveDate,
    pub check_out_date: NaiveDate,
    pub room_count: i32,
    pub expires_at: DateTime<Utc>,
    pub status: HoldStatus,
    pub booking_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl BookingHold {
    pub fn new(request: &HoldRequest, now: DateTime<Utc>) -> Self {
        Self {
            hold_id: Uuid::new_v4(),
            room_type_id: request.room_type_id.clone(),
            check_in_date: request.check_in_date,
            check_out_date: request.check_out_date,
            room_count: request.room_count,
            expires_at: now + Duration::minutes(request.expires_in_minutes),
            status: HoldStatus::Active,
            booking_id: None,
            created_at: now,
        }
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    /// Active and inside its lease; only such holds count as held rooms.
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.status == HoldStatus::Active && !self.is_expired_at(now)
    }

    pub fn overlaps(&self, check_in: NaiveDate, check_out: NaiveDate) -> bool {
        stays_overlap(self.check_in_date, self.check_out_date, check_in, check_out)
    }

    /// Status as a reader should see it: a lapsed active hold reads as expired.
    pub fn effective_status(&self, now: DateTime<Utc>) -> HoldStatus {
        match self.status {
            HoldStatus::Active if self.is_expired_at(now) => HoldStatus::Expired,
            status => status,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn request() -> HoldRequest {
        HoldRequest::new(
            "deluxe",
            NaiveDate::from_ymd_opt(2025, 7, 1).unwrap(),
            NaiveDate::from_ymd_opt(2025, 7, 4).unwrap(),
            1,
        )
    }

    #[test]
    fn test_hold_lease_window() {
        let now = Utc.with_ymd_and_hms(2025, 6, 1, 10, 0, 0).unwrap();
        let hold = BookingHold::new(&request(), now);

        assert_eq!(hold.expires_at, now + Duration::minutes(15));
        assert!(hold.is_active_at(now + Duration::minutes(14)));
        assert!(hold.is_active_at(hold.expires_at));
        assert!(!hold.is_active_at(hold.expires_at + Duration::seconds(1)));
        assert_eq!(hold.effective_status(now + Duration::minutes(16)), HoldStatus::Expired);
    }

    #[test]
    fn test_request_defaults_and_validation() {
        let parsed: HoldRequest = serde_json::from_str(
            r#"{"room_type_id":"deluxe","check_in_date":"2025-07-01","check_out_date":"2025-07-04","room_count":2}"#,
        )
        .unwrap();
        assert_eq!(parsed.expires_in_minutes, 15);
        assert!(parsed.validate().is_ok());

        let mut bad = request();
        bad.room_count = 0;
        assert!(bad.validate().is_err());

        let mut backwards = request();
        backwards.check_out_date = backwards.check_in_date;
        assert!(backwards.validate().is_err());
    }

    #[test]
    fn test_converted_hold_is_not_active() {
        let now = Utc.with_ymd_and_hms(2025, 6, 1, 10, 0, 0).unwrap();
        let mut hold = BookingHold::new(&request(), now);
        hold.status = HoldStatus::Converted;
        assert!(!hold.is_active_at(now));
        assert_eq!(hold.effective_status(now + Duration::hours(1)), HoldStatus::Converted);
    }
}
