use serde::{Deserialize, Serialize};
use chrono::NaiveDate;
use crate::{CoreError, CoreResult};

fn default_rooms() -> i32 {
    1
}

/// Inventory question: can `rooms_requested` rooms be sold for this stay?
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AvailabilityQuery {
    pub hotel_id: String,
    /// Check one room type only; all of the hotel's room types when absent.
    #[serde(default)]
    pub room_type_id: Option<String>,
    pub check_in_date: NaiveDate,
    pub check_out_date: NaiveDate,
    #[serde(default = "default_rooms")]
    pub rooms_requested: i32,
}

impl AvailabilityQuery {
    pub fn nights(&self) -> i64 {
        (self.check_out_date - self.check_in_date).num_days()
    }

    pub fn validate(&self) -> CoreResult<()> {
        if self.hotel_id.trim().is_empty() {
            return Err(CoreError::ValidationError("hotel_id is required".to_string()));
        }
        if self.check_out_date <= self.check_in_date {
            return Err(CoreError::ValidationError(
                "check_out_date must be after check_in_date".to_string(),
            ));
        }
        if self.rooms_requested < 1 {
            return Err(CoreError::ValidationError(
                "rooms_requested must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// What the guest searched for, kept on the booking session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SearchCriteria {
    pub check_in_date: NaiveDate,
    pub check_out_date: NaiveDate,
    pub adults: u32,
    #[serde(default)]
    pub children: u32,
    #[serde(default = "default_rooms")]
    pub rooms: i32,
    #[serde(default)]
    pub currency: Option<String>,
}
