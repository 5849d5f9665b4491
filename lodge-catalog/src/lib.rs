pub mod room;
pub mod pricing;
pub mod inventory;
pub mod hold;

pub use room::{Guests, HotelLocation, RatePlanType, RoomType};
pub use pricing::{RateBreakdown, RateCalculationInput, RateCalculator, RateConfig, RateError, ValidationReport};
pub use inventory::{BlockReason, InventoryBlock, InventoryCounts, InventoryRestriction, InventoryStatus, RestrictionKind, RestrictionRecord};
pub use hold::{BookingHold, HoldRequest, HoldStatus};
