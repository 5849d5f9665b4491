use serde::{Deserialize, Serialize};

/// Pricing and cancellation policy attached to a room offer.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum RatePlanType {
    #[default]
    Flexible,
    NonRefundable,
    AdvancePurchase,
}

impl RatePlanType {
    /// Share of the stay total collected at booking time.
    pub fn deposit_percentage(&self) -> f64 {
        match self {
            RatePlanType::Flexible => 0.30,
            RatePlanType::NonRefundable => 0.20,
            RatePlanType::AdvancePurchase => 0.50,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RatePlanType::Flexible => "flexible",
            RatePlanType::NonRefundable => "non_refundable",
            RatePlanType::AdvancePurchase => "advance_purchase",
        }
    }
}

/// City a hotel sits in; drives the VAT rate.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum HotelLocation {
    Jerusalem,
    Bethlehem,
    Other,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Guests {
    pub adults: u32,
    #[serde(default)]
    pub children: u32,
}

impl Guests {
    /// Saturates instead of wrapping; counts come straight from requests.
    pub fn total(&self) -> u32 {
        self.adults.saturating_add(self.children)
    }
}

/// A sellable room category of a hotel, as held by the inventory store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RoomType {
    pub id: String,
    pub hotel_id: String,
    pub name: String,
    pub total_inventory: i32,
    /// Rooms that may be sold beyond strictly free inventory.
    #[serde(default)]
    pub oversell_limit: i32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_plan_wire_names() {
        let plan: RatePlanType = serde_json::from_str("\"non_refundable\"").unwrap();
        assert_eq!(plan, RatePlanType::NonRefundable);
        assert_eq!(serde_json::to_string(&RatePlanType::AdvancePurchase).unwrap(), "\"advance_purchase\"");
    }

    #[test]
    fn test_deposit_table() {
        assert_eq!(RatePlanType::Flexible.deposit_percentage(), 0.30);
        assert_eq!(RatePlanType::NonRefundable.deposit_percentage(), 0.20);
        assert_eq!(RatePlanType::AdvancePurchase.deposit_percentage(), 0.50);
    }

    #[test]
    fn test_guests_default_children() {
        let guests: Guests = serde_json::from_str(r#"{"adults": 2}"#).unwrap();
        assert_eq!(guests.children, 0);
        assert_eq!(guests.total(), 2);
    }
}
