use std::sync::Arc;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use lodge_catalog::inventory::InventoryCounts;
use lodge_catalog::{InventoryRestriction, InventoryStatus, RestrictionRecord, RoomType};
use lodge_core::{AnalyticsSink, AvailabilityQuery, CoreError, InventoryStore, StoreError, TracingAnalyticsSink};
use lodge_shared::{Clock, SystemClock};
use crate::alerts::{alerts_for, AlertThresholds, InventoryAlert};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AvailabilityConfig {
    pub alerts: AlertThresholds,
    /// How often a hold is re-checked after losing a race with another hold.
    pub max_guard_retries: u32,
}

impl Default for AvailabilityConfig {
    fn default() -> Self {
        Self {
            alerts: AlertThresholds::default(),
            max_guard_retries: 3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvailabilityResult {
    pub available: bool,
    pub inventory: Vec<InventoryStatus>,
    pub alerts: Vec<InventoryAlert>,
    pub restrictions: Vec<InventoryRestriction>,
}

/// Derives room inventory from the store and manages holds against it.
pub struct AvailabilityManager {
    pub(crate) store: Arc<dyn InventoryStore>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) analytics: Arc<dyn AnalyticsSink>,
    pub(crate) config: AvailabilityConfig,
}

impl AvailabilityManager {
    pub fn new(store: Arc<dyn InventoryStore>, clock: Arc<dyn Clock>, config: AvailabilityConfig) -> Self {
        Self {
            store,
            clock,
            analytics: Arc::new(TracingAnalyticsSink),
            config,
        }
    }

    pub fn with_system_clock(store: Arc<dyn InventoryStore>) -> Self {
        Self::new(store, Arc::new(SystemClock), AvailabilityConfig::default())
    }

    pub fn with_analytics(mut self, analytics: Arc<dyn AnalyticsSink>) -> Self {
        self.analytics = analytics;
        self
    }

    pub fn config(&self) -> &AvailabilityConfig {
        &self.config
    }

    /// Can the requested rooms be sold for this stay?
    ///
    /// Store failures propagate. Alerts are informational; restrictions that
    /// rule out the stay remove their room type from the bookable total.
    pub async fn check_availability(&self, query: &AvailabilityQuery) -> Result<AvailabilityResult, AvailabilityError> {
        query.validate()?;
        let now = self.clock.now();
        let room_types = self.room_types_for(query).await?;

        let mut bookable = 0;
        let mut inventory = Vec::with_capacity(room_types.len());
        let mut alerts = Vec::new();
        let mut restrictions = Vec::new();

        for room_type in &room_types {
            let (status, records) = self
                .inventory_status(room_type, query.check_in_date, query.check_out_date, now)
                .await?;

            let forbidden = records
                .iter()
                .any(|r| r.forbids_stay(query.check_in_date, query.check_out_date));
            if !forbidden {
                bookable += status.can_book_rooms;
            }

            alerts.extend(alerts_for(&status, &self.config.alerts));
            restrictions.extend(status.restrictions.iter().cloned());
            inventory.push(status);
        }

        let available = bookable >= query.rooms_requested;
        debug!(
            hotel_id = %query.hotel_id,
            room_types = room_types.len(),
            bookable,
            requested = query.rooms_requested,
            "availability checked"
        );

        Ok(AvailabilityResult {
            available,
            inventory,
            alerts,
            restrictions,
        })
    }

    async fn room_types_for(&self, query: &AvailabilityQuery) -> Result<Vec<RoomType>, AvailabilityError> {
        match &query.room_type_id {
            Some(room_type_id) => {
                let room_type = self
                    .store
                    .get_room_type(room_type_id)
                    .await?
                    .filter(|rt| rt.hotel_id == query.hotel_id)
                    .ok_or_else(|| AvailabilityError::RoomTypeNotFound(room_type_id.clone()))?;
                Ok(vec![room_type])
            }
            None => Ok(self.store.list_room_types(&query.hotel_id).await?),
        }
    }

    /// Inventory status of one room type, plus the raw restriction records
    /// (needed to tell whether the stay is ruled out).
    pub(crate) async fn inventory_status(
        &self,
        room_type: &RoomType,
        check_in: NaiveDate,
        check_out: NaiveDate,
        now: DateTime<Utc>,
    ) -> Result<(InventoryStatus, Vec<RestrictionRecord>), StoreError> {
        let available_rooms = self.store.available_rooms(&room_type.id, check_in, check_out).await?;
        let blocks = self.store.list_blocks(&room_type.id, check_in, check_out).await?;
        let holds = self
            .store
            .list_active_holds(&room_type.id, check_in, check_out, now)
            .await?;
        let records: Vec<RestrictionRecord> = self
            .store
            .list_restrictions(&room_type.id, check_in, check_out)
            .await?
            .into_iter()
            .filter(|r| r.active)
            .collect();

        let (blocked_rooms, maintenance_rooms) = InventoryCounts::block_totals(&blocks);
        let held_rooms = holds
            .iter()
            .filter(|h| h.is_active_at(now) && h.overlaps(check_in, check_out))
            .map(|h| h.room_count)
            .sum();

        let counts = InventoryCounts {
            total_inventory: room_type.total_inventory,
            available_rooms,
            blocked_rooms,
            maintenance_rooms,
            held_rooms,
            oversell_limit: room_type.oversell_limit,
        };
        let restrictions = records.iter().map(RestrictionRecord::to_restriction).collect();

        Ok((InventoryStatus::from_counts(room_type.id.clone(), counts, restrictions), records))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AvailabilityError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Room type not found: {0}")]
    RoomTypeNotFound(String),

    #[error("Insufficient inventory: requested {requested}, available {available}")]
    InsufficientInventory {
        requested: i32,
        available: i32,
    },

    #[error("Stay not permitted: {0}")]
    Restricted(String),

    #[error("Hold could not be placed for {0}: inventory kept changing")]
    HoldContention(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<CoreError> for AvailabilityError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Store(e) => AvailabilityError::Store(e),
            CoreError::ValidationError(msg) | CoreError::InternalError(msg) => {
                AvailabilityError::InvalidRequest(msg)
            }
        }
    }
}

impl AvailabilityError {
    /// Whether the failure is the guest's to resolve (pick other dates or rooms).
    pub fn is_inventory_conflict(&self) -> bool {
        matches!(
            self,
            AvailabilityError::InsufficientInventory { .. }
                | AvailabilityError::Restricted(_)
                | AvailabilityError::HoldContention(_)
        )
    }
}

pub(crate) fn log_hold_outcome(room_type_id: &str, room_count: i32, err: &AvailabilityError) {
    if err.is_inventory_conflict() {
        info!(room_type_id, room_count, "hold refused: {}", err);
    } else {
        tracing::error!(room_type_id, room_count, "hold creation failed: {}", err);
    }
}
