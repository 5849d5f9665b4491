use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;
use lodge_catalog::{BookingHold, HoldStatus, InventoryBlock, RestrictionRecord, RoomType};
use lodge_core::{GuardedInsert, HoldRelease, InventoryStore, SessionStorage, StoreError, StoreResult};

/// A confirmed stay occupying rooms of one type.
#[derive(Debug, Clone)]
struct ConfirmedStay {
    room_type_id: String,
    check_in: NaiveDate,
    check_out: NaiveDate,
    room_count: i32,
}

#[derive(Default)]
struct Inventory {
    room_types: HashMap<String, RoomType>,
    blocks: Vec<InventoryBlock>,
    restrictions: Vec<RestrictionRecord>,
    holds: HashMap<Uuid, BookingHold>,
    bookings: Vec<ConfirmedStay>,
    pending_competitor: Option<BookingHold>,
    pending_conversion: Option<(Uuid, String)>,
}

impl Inventory {
    fn held_rooms(&self, room_type_id: &str, check_in: NaiveDate, check_out: NaiveDate, now: DateTime<Utc>) -> i32 {
        self.holds
            .values()
            .filter(|h| h.room_type_id == room_type_id && h.is_active_at(now) && h.overlaps(check_in, check_out))
            .map(|h| h.room_count)
            .sum()
    }

    fn available_rooms(&self, room_type_id: &str, check_in: NaiveDate, check_out: NaiveDate) -> i32 {
        match self.room_types.get(room_type_id) {
            Some(rt) => (rt.total_inventory - self.peak_booked(room_type_id, check_in, check_out)).max(0),
            None => 0,
        }
    }

    /// Live held rooms plus rooms taken by confirmed bookings, counted the
    /// same way the availability manager counts them.
    fn committed_rooms(&self, room_type_id: &str, check_in: NaiveDate, check_out: NaiveDate, now: DateTime<Utc>) -> i32 {
        let total = self
            .room_types
            .get(room_type_id)
            .map(|rt| rt.total_inventory.max(0))
            .unwrap_or(0);
        self.held_rooms(room_type_id, check_in, check_out, now) + total
            - self.available_rooms(room_type_id, check_in, check_out)
    }

    fn convert(&mut self, hold_id: Uuid, booking_id: &str, now: DateTime<Utc>) -> bool {
        let stay = match self.holds.get_mut(&hold_id) {
            Some(hold) if hold.is_active_at(now) => {
                hold.status = HoldStatus::Converted;
                hold.booking_id = Some(booking_id.to_string());
                ConfirmedStay {
                    room_type_id: hold.room_type_id.clone(),
                    check_in: hold.check_in_date,
                    check_out: hold.check_out_date,
                    room_count: hold.room_count,
                }
            }
            _ => return false,
        };
        self.bookings.push(stay);
        true
    }

    /// Highest number of rooms booked on any night of the stay.
    fn peak_booked(&self, room_type_id: &str, check_in: NaiveDate, check_out: NaiveDate) -> i32 {
        check_in
            .iter_days()
            .take_while(|night| *night < check_out)
            .map(|night| {
                self.bookings
                    .iter()
                    .filter(|b| b.room_type_id == room_type_id && b.check_in <= night && night < b.check_out)
                    .map(|b| b.room_count)
                    .sum::<i32>()
            })
            .max()
            .unwrap_or(0)
    }
}

/// Inventory store kept in process memory. Used by tests and local runs
/// without a database.
#[derive(Default)]
pub struct MemoryInventoryStore {
    inner: RwLock<Inventory>,
    failing: AtomicBool,
}

impl MemoryInventoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_room_type(&self, room_type: RoomType) {
        self.inner.write().await.room_types.insert(room_type.id.clone(), room_type);
    }

    pub async fn add_block(&self, block: InventoryBlock) {
        self.inner.write().await.blocks.push(block);
    }

    pub async fn add_restriction(&self, restriction: RestrictionRecord) {
        self.inner.write().await.restrictions.push(restriction);
    }

    /// Insert a hold as-is, bypassing the capacity guard.
    pub async fn seed_hold(&self, hold: BookingHold) {
        self.inner.write().await.holds.insert(hold.hold_id, hold);
    }

    /// Record a confirmed booking made outside the hold flow.
    pub async fn record_booking(&self, room_type_id: &str, check_in: NaiveDate, check_out: NaiveDate, room_count: i32) {
        self.inner.write().await.bookings.push(ConfirmedStay {
            room_type_id: room_type_id.to_string(),
            check_in,
            check_out,
            room_count,
        });
    }

    /// Simulate a competing request: `hold` lands right before the next
    /// guarded insert evaluates its guard.
    pub async fn inject_hold_before_next_insert(&self, hold: BookingHold) {
        self.inner.write().await.pending_competitor = Some(hold);
    }

    /// Simulate a guest checking out elsewhere: `hold_id` is converted right
    /// before the next guarded insert evaluates its guard.
    pub async fn convert_hold_before_next_insert(&self, hold_id: Uuid, booking_id: &str) {
        self.inner.write().await.pending_conversion = Some((hold_id, booking_id.to_string()));
    }

    /// Make every store call fail until switched off again.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn check(&self) -> StoreResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StoreError::connection("memory store is unavailable"));
        }
        Ok(())
    }
}

#[async_trait]
impl InventoryStore for MemoryInventoryStore {
    async fn list_room_types(&self, hotel_id: &str) -> StoreResult<Vec<RoomType>> {
        self.check()?;
        let inner = self.inner.read().await;
        let mut room_types: Vec<RoomType> = inner
            .room_types
            .values()
            .filter(|rt| rt.hotel_id == hotel_id)
            .cloned()
            .collect();
        room_types.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(room_types)
    }

    async fn get_room_type(&self, room_type_id: &str) -> StoreResult<Option<RoomType>> {
        self.check()?;
        Ok(self.inner.read().await.room_types.get(room_type_id).cloned())
    }

    async fn available_rooms(&self, room_type_id: &str, check_in: NaiveDate, check_out: NaiveDate) -> StoreResult<i32> {
        self.check()?;
        Ok(self.inner.read().await.available_rooms(room_type_id, check_in, check_out))
    }

    async fn list_blocks(&self, room_type_id: &str, check_in: NaiveDate, check_out: NaiveDate) -> StoreResult<Vec<InventoryBlock>> {
        self.check()?;
        Ok(self
            .inner
            .read()
            .await
            .blocks
            .iter()
            .filter(|b| b.room_type_id == room_type_id && b.active && b.overlaps(check_in, check_out))
            .cloned()
            .collect())
    }

    async fn list_restrictions(
        &self,
        room_type_id: &str,
        check_in: NaiveDate,
        check_out: NaiveDate,
    ) -> StoreResult<Vec<RestrictionRecord>> {
        self.check()?;
        Ok(self
            .inner
            .read()
            .await
            .restrictions
            .iter()
            .filter(|r| r.room_type_id == room_type_id && r.active && r.overlaps(check_in, check_out))
            .cloned()
            .collect())
    }

    async fn list_active_holds(
        &self,
        room_type_id: &str,
        check_in: NaiveDate,
        check_out: NaiveDate,
        now: DateTime<Utc>,
    ) -> StoreResult<Vec<BookingHold>> {
        self.check()?;
        Ok(self
            .inner
            .read()
            .await
            .holds
            .values()
            .filter(|h| h.room_type_id == room_type_id && h.is_active_at(now) && h.overlaps(check_in, check_out))
            .cloned()
            .collect())
    }

    async fn insert_hold_guarded(
        &self,
        hold: &BookingHold,
        expected_committed_rooms: i32,
        now: DateTime<Utc>,
    ) -> StoreResult<GuardedInsert> {
        self.check()?;
        let mut inner = self.inner.write().await;
        if let Some((hold_id, booking_id)) = inner.pending_conversion.take() {
            inner.convert(hold_id, &booking_id, now);
        }
        if let Some(competitor) = inner.pending_competitor.take() {
            inner.holds.insert(competitor.hold_id, competitor);
        }

        let current = inner.committed_rooms(&hold.room_type_id, hold.check_in_date, hold.check_out_date, now);
        if current != expected_committed_rooms {
            return Ok(GuardedInsert::Conflict { current_committed_rooms: current });
        }

        inner.holds.insert(hold.hold_id, hold.clone());
        Ok(GuardedInsert::Inserted)
    }

    async fn get_hold(&self, hold_id: Uuid) -> StoreResult<Option<BookingHold>> {
        self.check()?;
        Ok(self.inner.read().await.holds.get(&hold_id).cloned())
    }

    async fn release_hold(&self, hold_id: Uuid) -> StoreResult<HoldRelease> {
        self.check()?;
        let mut inner = self.inner.write().await;
        match inner.holds.get_mut(&hold_id) {
            Some(hold) if hold.status == HoldStatus::Active => {
                hold.status = HoldStatus::Expired;
                Ok(HoldRelease::Released)
            }
            Some(_) => Ok(HoldRelease::Unchanged),
            None => Ok(HoldRelease::Missing),
        }
    }

    async fn convert_hold(&self, hold_id: Uuid, booking_id: &str, now: DateTime<Utc>) -> StoreResult<bool> {
        self.check()?;
        Ok(self.inner.write().await.convert(hold_id, booking_id, now))
    }

    async fn expire_holds(&self, now: DateTime<Utc>) -> StoreResult<u64> {
        self.check()?;
        let mut inner = self.inner.write().await;
        let mut expired = 0;
        for hold in inner.holds.values_mut() {
            if hold.status == HoldStatus::Active && hold.expires_at < now {
                hold.status = HoldStatus::Expired;
                expired += 1;
            }
        }
        Ok(expired)
    }
}

/// Session storage kept in process memory. TTL hints are ignored; expiry is
/// enforced by the reader.
#[derive(Default)]
pub struct MemorySessionStorage {
    entries: RwLock<HashMap<String, String>>,
}

impl MemorySessionStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStorage for MemorySessionStorage {
    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str, _ttl_seconds: Option<u64>) -> StoreResult<()> {
        self.entries.write().await.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> StoreResult<()> {
        self.entries.write().await.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use lodge_catalog::HoldRequest;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 12, d).unwrap()
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 11, 20, 8, 0, 0).unwrap()
    }

    async fn store_with_room(total: i32) -> MemoryInventoryStore {
        let store = MemoryInventoryStore::new();
        store
            .add_room_type(RoomType {
                id: "family".to_string(),
                hotel_id: "jerusalem-gate".to_string(),
                name: "Family Room".to_string(),
                total_inventory: total,
                oversell_limit: 0,
            })
            .await;
        store
    }

    #[tokio::test]
    async fn test_available_rooms_uses_busiest_night() {
        let store = store_with_room(6).await;
        store.record_booking("family", date(1), date(3), 2).await;
        store.record_booking("family", date(2), date(5), 3).await;
        store.record_booking("family", date(5), date(6), 4).await;

        // nights 1..4 peak at 5 booked on the 2nd
        assert_eq!(store.available_rooms("family", date(1), date(5)).await.unwrap(), 1);
        // the 5th is only touched by the third booking
        assert_eq!(store.available_rooms("family", date(5), date(6)).await.unwrap(), 2);
        assert_eq!(store.available_rooms("family", date(10), date(12)).await.unwrap(), 6);
        assert_eq!(store.available_rooms("unknown", date(1), date(2)).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_guarded_insert_detects_stale_total() {
        let store = store_with_room(4).await;
        let request = HoldRequest::new("family", date(1), date(3), 1);

        let first = BookingHold::new(&request, now());
        assert_eq!(store.insert_hold_guarded(&first, 0, now()).await.unwrap(), GuardedInsert::Inserted);

        let second = BookingHold::new(&request, now());
        assert_eq!(
            store.insert_hold_guarded(&second, 0, now()).await.unwrap(),
            GuardedInsert::Conflict { current_committed_rooms: 1 }
        );
        assert_eq!(store.insert_hold_guarded(&second, 1, now()).await.unwrap(), GuardedInsert::Inserted);
    }

    #[tokio::test]
    async fn test_guarded_insert_counts_confirmed_bookings() {
        let store = store_with_room(4).await;
        let request = HoldRequest::new("family", date(1), date(3), 1);
        store.record_booking("family", date(2), date(4), 2).await;

        let hold = BookingHold::new(&request, now());
        assert_eq!(
            store.insert_hold_guarded(&hold, 0, now()).await.unwrap(),
            GuardedInsert::Conflict { current_committed_rooms: 2 }
        );
        assert_eq!(store.insert_hold_guarded(&hold, 2, now()).await.unwrap(), GuardedInsert::Inserted);
    }

    #[tokio::test]
    async fn test_release_reports_what_changed() {
        let store = store_with_room(4).await;
        let hold = BookingHold::new(&HoldRequest::new("family", date(1), date(3), 1), now());
        store.seed_hold(hold.clone()).await;

        assert_eq!(store.release_hold(hold.hold_id).await.unwrap(), HoldRelease::Released);
        assert_eq!(store.release_hold(hold.hold_id).await.unwrap(), HoldRelease::Unchanged);
        assert_eq!(store.release_hold(Uuid::new_v4()).await.unwrap(), HoldRelease::Missing);
    }

    #[tokio::test]
    async fn test_expire_only_touches_lapsed_active_holds() {
        let store = store_with_room(4).await;
        let request = HoldRequest::new("family", date(1), date(3), 1);
        let lapsed = BookingHold::new(&request, now() - Duration::minutes(30));
        let live = BookingHold::new(&request, now());
        store.seed_hold(lapsed.clone()).await;
        store.seed_hold(live.clone()).await;

        assert_eq!(store.expire_holds(now()).await.unwrap(), 1);
        assert_eq!(store.expire_holds(now()).await.unwrap(), 0);
        assert_eq!(store.get_hold(lapsed.hold_id).await.unwrap().unwrap().status, HoldStatus::Expired);
        assert_eq!(store.get_hold(live.hold_id).await.unwrap().unwrap().status, HoldStatus::Active);
    }

    #[tokio::test]
    async fn test_converted_hold_becomes_a_booking() {
        let store = store_with_room(3).await;
        let hold = BookingHold::new(&HoldRequest::new("family", date(1), date(3), 2), now());
        store.seed_hold(hold.clone()).await;

        assert!(store.convert_hold(hold.hold_id, "BK-77", now()).await.unwrap());
        assert!(!store.convert_hold(hold.hold_id, "BK-77", now()).await.unwrap());
        assert_eq!(store.available_rooms("family", date(2), date(4)).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_failing_store() {
        let store = store_with_room(3).await;
        store.set_failing(true);
        assert!(store.get_room_type("family").await.is_err());
        store.set_failing(false);
        assert!(store.get_room_type("family").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_session_storage_round_trip() {
        let storage = MemorySessionStorage::new();
        storage.set("k", "v", Some(60)).await.unwrap();
        assert_eq!(storage.get("k").await.unwrap().as_deref(), Some("v"));
        storage.remove("k").await.unwrap();
        assert_eq!(storage.get("k").await.unwrap(), None);
    }
}
