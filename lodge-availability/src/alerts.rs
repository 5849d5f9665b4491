use serde::{Deserialize, Serialize};
use lodge_catalog::InventoryStatus;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AlertType {
    LowInventory,
    OverbookingRisk,
    MaintenanceConflict,
    Restriction,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum AlertSeverity {
    Info,
    Warning,
    Critical,
}

/// Informational signal attached to an availability answer. Never blocks a sale.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InventoryAlert {
    #[serde(rename = "type")]
    pub alert_type: AlertType,
    pub severity: AlertSeverity,
    pub room_type_id: String,
    pub message: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AlertThresholds {
    /// Warn when this many rooms or fewer remain (and at least one does).
    pub low_inventory: i32,
    /// Occupancy share at which overbooking becomes a risk.
    pub overbooking_occupancy: f64,
}

impl Default for AlertThresholds {
    fn default() -> Self {
        Self {
            low_inventory: 3,
            overbooking_occupancy: 0.95,
        }
    }
}

pub fn alerts_for(status: &InventoryStatus, thresholds: &AlertThresholds) -> Vec<InventoryAlert> {
    let mut alerts = Vec::new();
    let alert = |alert_type, severity, message: String| InventoryAlert {
        alert_type,
        severity,
        room_type_id: status.room_type_id.clone(),
        message,
    };

    if status.net_available > 0 && status.net_available <= thresholds.low_inventory {
        alerts.push(alert(
            AlertType::LowInventory,
            AlertSeverity::Warning,
            format!("Only {} rooms left for the selected dates", status.net_available),
        ));
    }

    let occupancy = status.occupancy();
    if status.total_inventory > 0 && occupancy >= thresholds.overbooking_occupancy {
        alerts.push(alert(
            AlertType::OverbookingRisk,
            AlertSeverity::Critical,
            format!("Occupancy at {:.0}%, overbooking risk", occupancy * 100.0),
        ));
    }

    if status.maintenance_rooms > 0 {
        alerts.push(alert(
            AlertType::MaintenanceConflict,
            AlertSeverity::Info,
            format!("{} rooms out of service for maintenance", status.maintenance_rooms),
        ));
    }

    for restriction in status.restrictions.iter().filter(|r| r.active) {
        alerts.push(alert(
            AlertType::Restriction,
            AlertSeverity::Warning,
            restriction.message.clone(),
        ));
    }

    alerts
}
