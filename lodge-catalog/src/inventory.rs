use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Why rooms were taken out of sale.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BlockReason {
    Maintenance,
    GroupBooking,
    OwnerUse,
    #[serde(other)]
    Other,
}

impl BlockReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            BlockReason::Maintenance => "maintenance",
            BlockReason::GroupBooking => "group_booking",
            BlockReason::OwnerUse => "owner_use",
            BlockReason::Other => "other",
        }
    }

    pub fn parse(value: &str) -> Self {
        match value {
            "maintenance" => BlockReason::Maintenance,
            "group_booking" => BlockReason::GroupBooking,
            "owner_use" => BlockReason::OwnerUse,
            _ => BlockReason::Other,
        }
    }
}

/// Rooms of one type withdrawn from sale over an inclusive date range.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct InventoryBlock {
    pub id: Uuid,
    pub room_type_id: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub rooms_blocked: i32,
    pub reason: BlockReason,
    pub active: bool,
}

impl InventoryBlock {
    pub fn overlaps(&self, check_in: NaiveDate, check_out: NaiveDate) -> bool {
        range_overlaps_stay(self.start_date, self.end_date, check_in, check_out)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum RestrictionKind {
    MinimumStay,
    MaximumStay,
    ClosedToArrival,
    ClosedToDeparture,
    StopSell,
}

impl RestrictionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RestrictionKind::MinimumStay => "minimum_stay",
            RestrictionKind::MaximumStay => "maximum_stay",
            RestrictionKind::ClosedToArrival => "closed_to_arrival",
            RestrictionKind::ClosedToDeparture => "closed_to_departure",
            RestrictionKind::StopSell => "stop_sell",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "minimum_stay" => Some(RestrictionKind::MinimumStay),
            "maximum_stay" => Some(RestrictionKind::MaximumStay),
            "closed_to_arrival" => Some(RestrictionKind::ClosedToArrival),
            "closed_to_departure" => Some(RestrictionKind::ClosedToDeparture),
            "stop_sell" => Some(RestrictionKind::StopSell),
            _ => None,
        }
    }

    /// Guest-facing text used when no custom description is stored.
    pub fn default_message(&self, value: Option<i32>) -> String {
        match (self, value) {
            (RestrictionKind::MinimumStay, Some(n)) => format!("Minimum stay of {} nights required", n),
            (RestrictionKind::MinimumStay, None) => "Minimum stay required".to_string(),
            (RestrictionKind::MaximumStay, Some(n)) => format!("Maximum stay of {} nights allowed", n),
            (RestrictionKind::MaximumStay, None) => "Maximum stay limit applies".to_string(),
            (RestrictionKind::ClosedToArrival, _) => "Arrivals are not permitted on the selected check-in date".to_string(),
            (RestrictionKind::ClosedToDeparture, _) => "Departures are not permitted on the selected check-out date".to_string(),
            (RestrictionKind::StopSell, _) => "This room type is currently closed for sale".to_string(),
        }
    }
}

/// Stored form of a restriction, as owned by the inventory store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RestrictionRecord {
    pub id: Uuid,
    pub room_type_id: String,
    pub kind: RestrictionKind,
    pub value: Option<i32>,
    pub description: Option<String>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub active: bool,
}

impl RestrictionRecord {
    pub fn overlaps(&self, check_in: NaiveDate, check_out: NaiveDate) -> bool {
        range_overlaps_stay(self.start_date, self.end_date, check_in, check_out)
    }

    fn covers(&self, date: NaiveDate) -> bool {
        self.start_date <= date && date <= self.end_date
    }

    /// Whether this restriction rules out the stay entirely.
    pub fn forbids_stay(&self, check_in: NaiveDate, check_out: NaiveDate) -> bool {
        if !self.active {
            return false;
        }
        let nights = (check_out - check_in).num_days();
        match self.kind {
            RestrictionKind::MinimumStay => self.value.is_some_and(|min| nights < i64::from(min)),
            RestrictionKind::MaximumStay => self.value.is_some_and(|max| nights > i64::from(max)),
            RestrictionKind::ClosedToArrival => self.covers(check_in),
            RestrictionKind::ClosedToDeparture => self.covers(check_out),
            RestrictionKind::StopSell => self.overlaps(check_in, check_out),
        }
    }

    pub fn to_restriction(&self) -> InventoryRestriction {
        let message = match &self.description {
            Some(text) if !text.trim().is_empty() => text.clone(),
            _ => self.kind.default_message(self.value),
        };
        InventoryRestriction {
            kind: self.kind,
            value: self.value,
            message,
            active: self.active,
        }
    }
}

/// Restriction as reported to callers of an availability check.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct InventoryRestriction {
    #[serde(rename = "type")]
    pub kind: RestrictionKind,
    pub value: Option<i32>,
    pub message: String,
    pub active: bool,
}

/// Raw room counts for one room type over one date range.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InventoryCounts {
    pub total_inventory: i32,
    pub available_rooms: i32,
    pub blocked_rooms: i32,
    pub maintenance_rooms: i32,
    pub held_rooms: i32,
    pub oversell_limit: i32,
}

impl InventoryCounts {
    /// Split active blocks into (blocked, maintenance) room totals.
    pub fn block_totals(blocks: &[InventoryBlock]) -> (i32, i32) {
        blocks
            .iter()
            .filter(|b| b.active)
            .fold((0, 0), |(blocked, maintenance), b| match b.reason {
                BlockReason::Maintenance => (blocked, maintenance + b.rooms_blocked),
                _ => (blocked + b.rooms_blocked, maintenance),
            })
    }
}

/// Derived bookability of a room type. Recomputed per query, never stored.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct InventoryStatus {
    pub room_type_id: String,
    pub total_inventory: i32,
    pub available_rooms: i32,
    pub blocked_rooms: i32,
    pub maintenance_rooms: i32,
    pub held_rooms: i32,
    pub net_available: i32,
    pub oversell_limit: i32,
    pub can_book_rooms: i32,
    pub restrictions: Vec<InventoryRestriction>,
}

impl InventoryStatus {
    pub fn from_counts(
        room_type_id: impl Into<String>,
        counts: InventoryCounts,
        restrictions: Vec<InventoryRestriction>,
    ) -> Self {
        let total_inventory = counts.total_inventory.max(0);
        let net_available = (counts.available_rooms
            - counts.blocked_rooms
            - counts.maintenance_rooms
            - counts.held_rooms)
            .max(0);
        let can_book_rooms = (net_available + counts.oversell_limit.max(0))
            .min(total_inventory)
            .max(0);

        Self {
            room_type_id: room_type_id.into(),
            total_inventory,
            available_rooms: counts.available_rooms,
            blocked_rooms: counts.blocked_rooms,
            maintenance_rooms: counts.maintenance_rooms,
            held_rooms: counts.held_rooms,
            net_available,
            oversell_limit: counts.oversell_limit,
            can_book_rooms,
            restrictions,
        }
    }

    /// Rooms taken by live holds and confirmed bookings.
    pub fn committed_rooms(&self) -> i32 {
        self.held_rooms + self.total_inventory - self.available_rooms
    }

    /// Share of the room type that is not free to sell, in `[0, 1]`.
    pub fn occupancy(&self) -> f64 {
        if self.total_inventory == 0 {
            return 0.0;
        }
        let occupied = (self.total_inventory - self.net_available).max(0);
        f64::from(occupied) / f64::from(self.total_inventory)
    }
}

/// Inclusive `[start, end]` range against a `[check_in, check_out)` stay.
pub fn range_overlaps_stay(start: NaiveDate, end: NaiveDate, check_in: NaiveDate, check_out: NaiveDate) -> bool {
    start < check_out && end >= check_in
}

/// Two `[check_in, check_out)` stays share at least one night.
pub fn stays_overlap(a_in: NaiveDate, a_out: NaiveDate, b_in: NaiveDate, b_out: NaiveDate) -> bool {
    a_in < b_out && a_out > b_in
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, d).unwrap()
    }

    fn restriction(kind: RestrictionKind, value: Option<i32>, start: u32, end: u32) -> RestrictionRecord {
        RestrictionRecord {
            id: Uuid::new_v4(),
            room_type_id: "deluxe".to_string(),
            kind,
            value,
            description: None,
            start_date: date(start),
            end_date: date(end),
            active: true,
        }
    }

    #[test]
    fn test_oversubscribed_room_type_stays_non_negative() {
        let status = InventoryStatus::from_counts(
            "deluxe",
            InventoryCounts {
                total_inventory: 10,
                available_rooms: 10,
                blocked_rooms: 2,
                maintenance_rooms: 1,
                held_rooms: 8,
                oversell_limit: 1,
            },
            vec![],
        );

        assert_eq!(status.net_available, 0);
        assert_eq!(status.can_book_rooms, 1);
        assert_eq!(status.occupancy(), 1.0);
    }

    #[test]
    fn test_oversell_never_exceeds_total_inventory() {
        let status = InventoryStatus::from_counts(
            "suite",
            InventoryCounts {
                total_inventory: 4,
                available_rooms: 4,
                oversell_limit: 3,
                ..Default::default()
            },
            vec![],
        );
        assert_eq!(status.net_available, 4);
        assert_eq!(status.can_book_rooms, 4);
        assert_eq!(status.occupancy(), 0.0);
    }

    #[test]
    fn test_committed_rooms_count_holds_and_bookings() {
        let status = InventoryStatus::from_counts(
            "deluxe",
            InventoryCounts {
                total_inventory: 6,
                available_rooms: 4,
                blocked_rooms: 1,
                held_rooms: 1,
                ..Default::default()
            },
            vec![],
        );
        // two booked, one held; blocks are not commitments
        assert_eq!(status.committed_rooms(), 3);
    }

    #[test]
    fn test_block_totals_split_maintenance() {
        let block = |reason, rooms, active| InventoryBlock {
            id: Uuid::new_v4(),
            room_type_id: "deluxe".to_string(),
            start_date: date(1),
            end_date: date(3),
            rooms_blocked: rooms,
            reason,
            active,
        };
        let blocks = vec![
            block(BlockReason::Maintenance, 2, true),
            block(BlockReason::GroupBooking, 5, true),
            block(BlockReason::OwnerUse, 1, true),
            block(BlockReason::Maintenance, 7, false),
        ];
        assert_eq!(InventoryCounts::block_totals(&blocks), (6, 2));
    }

    #[test]
    fn test_block_overlap_uses_half_open_stay() {
        let block = InventoryBlock {
            id: Uuid::new_v4(),
            room_type_id: "deluxe".to_string(),
            start_date: date(10),
            end_date: date(12),
            rooms_blocked: 1,
            reason: BlockReason::Maintenance,
            active: true,
        };
        // checking out on the first blocked day does not touch the block
        assert!(!block.overlaps(date(8), date(10)));
        assert!(block.overlaps(date(8), date(11)));
        assert!(block.overlaps(date(12), date(14)));
        assert!(!block.overlaps(date(13), date(14)));
    }

    #[test]
    fn test_stays_overlap() {
        assert!(stays_overlap(date(1), date(4), date(3), date(5)));
        assert!(!stays_overlap(date(1), date(3), date(3), date(5)));
    }

    #[test]
    fn test_restriction_rules() {
        let min = restriction(RestrictionKind::MinimumStay, Some(3), 1, 30);
        assert!(min.forbids_stay(date(5), date(7)));
        assert!(!min.forbids_stay(date(5), date(8)));

        let max = restriction(RestrictionKind::MaximumStay, Some(5), 1, 30);
        assert!(max.forbids_stay(date(1), date(8)));
        assert!(!max.forbids_stay(date(1), date(6)));

        let cta = restriction(RestrictionKind::ClosedToArrival, None, 10, 10);
        assert!(cta.forbids_stay(date(10), date(12)));
        assert!(!cta.forbids_stay(date(9), date(12)));

        let ctd = restriction(RestrictionKind::ClosedToDeparture, None, 12, 12);
        assert!(ctd.forbids_stay(date(10), date(12)));
        assert!(!ctd.forbids_stay(date(10), date(13)));

        let mut stop = restriction(RestrictionKind::StopSell, None, 20, 22);
        assert!(stop.forbids_stay(date(19), date(21)));
        stop.active = false;
        assert!(!stop.forbids_stay(date(19), date(21)));
    }

    #[test]
    fn test_restriction_message_templates() {
        let min = restriction(RestrictionKind::MinimumStay, Some(2), 1, 3).to_restriction();
        assert_eq!(min.message, "Minimum stay of 2 nights required");

        let mut stop = restriction(RestrictionKind::StopSell, None, 1, 3);
        stop.description = Some("Closed for the Easter weekend".to_string());
        assert_eq!(stop.to_restriction().message, "Closed for the Easter weekend");

        let json = serde_json::to_value(min).unwrap();
        assert_eq!(json["type"], "minimum_stay");
    }
}
