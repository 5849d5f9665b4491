pub mod alerts;
pub mod manager;
pub mod holds;

pub use alerts::{AlertSeverity, AlertThresholds, AlertType, InventoryAlert};
pub use manager::{AvailabilityConfig, AvailabilityError, AvailabilityManager, AvailabilityResult};
