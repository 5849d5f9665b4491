use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;
use lodge_catalog::{BookingHold, InventoryBlock, RestrictionRecord, RoomType};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Store connection failed: {0}")]
    Connection(String),
    #[error("Store operation failed: {0}")]
    Database(String),
    #[error("Stored data is malformed: {0}")]
    Corrupt(String),
}

impl StoreError {
    pub fn connection(err: impl std::fmt::Display) -> Self {
        Self::Connection(err.to_string())
    }

    pub fn database(err: impl std::fmt::Display) -> Self {
        Self::Database(err.to_string())
    }

    pub fn corrupt(err: impl std::fmt::Display) -> Self {
        Self::Corrupt(err.to_string())
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Outcome of an insert that is conditional on the committed-room total.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardedInsert {
    Inserted,
    /// Someone else held or booked rooms since the total was read.
    Conflict { current_committed_rooms: i32 },
}

/// What a release did to the stored hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HoldRelease {
    /// The hold was active and is now expired.
    Released,
    /// The hold exists but was already expired or converted.
    Unchanged,
    Missing,
}

impl HoldRelease {
    pub fn exists(&self) -> bool {
        !matches!(self, HoldRelease::Missing)
    }
}

/// Access to room types, blocks, restrictions and holds.
///
/// Date filters treat stays as `[check_in, check_out)` and stored ranges
/// (blocks, restrictions) as inclusive `[start_date, end_date]`.
#[async_trait]
pub trait InventoryStore: Send + Sync {
    async fn list_room_types(&self, hotel_id: &str) -> StoreResult<Vec<RoomType>>;

    async fn get_room_type(&self, room_type_id: &str) -> StoreResult<Option<RoomType>>;

    /// Rooms not taken by confirmed bookings across the whole stay.
    async fn available_rooms(
        &self,
        room_type_id: &str,
        check_in: NaiveDate,
        check_out: NaiveDate,
    ) -> StoreResult<i32>;

    /// Active blocks overlapping the stay.
    async fn list_blocks(
        &self,
        room_type_id: &str,
        check_in: NaiveDate,
        check_out: NaiveDate,
    ) -> StoreResult<Vec<InventoryBlock>>;

    /// Active restrictions overlapping the stay.
    async fn list_restrictions(
        &self,
        room_type_id: &str,
        check_in: NaiveDate,
        check_out: NaiveDate,
    ) -> StoreResult<Vec<RestrictionRecord>>;

    /// Holds that are `active` and not past `expires_at` at `now`, overlapping the stay.
    async fn list_active_holds(
        &self,
        room_type_id: &str,
        check_in: NaiveDate,
        check_out: NaiveDate,
        now: DateTime<Utc>,
    ) -> StoreResult<Vec<BookingHold>>;

    /// Insert `hold` only if the rooms committed against its room type and
    /// dates still add up to `expected_committed_rooms`.
    ///
    /// Committed rooms are live held rooms plus the rooms taken by confirmed
    /// bookings, i.e. `held + total_inventory - available_rooms`. The check
    /// and the insert run under the same per-room-type lock that
    /// `convert_hold` takes.
    async fn insert_hold_guarded(
        &self,
        hold: &BookingHold,
        expected_committed_rooms: i32,
        now: DateTime<Utc>,
    ) -> StoreResult<GuardedInsert>;

    async fn get_hold(&self, hold_id: Uuid) -> StoreResult<Option<BookingHold>>;

    /// Mark an active hold expired.
    async fn release_hold(&self, hold_id: Uuid) -> StoreResult<HoldRelease>;

    /// Mark a hold converted if it is active and unexpired at `now`, and
    /// record the confirmed booking. Returns whether a row was updated.
    async fn convert_hold(
        &self,
        hold_id: Uuid,
        booking_id: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<bool>;

    /// Mark every active hold with `expires_at < now` expired; returns how many.
    async fn expire_holds(&self, now: DateTime<Utc>) -> StoreResult<u64>;
}

/// Small key-value store holding a client's booking session.
#[async_trait]
pub trait SessionStorage: Send + Sync {
    async fn get(&self, key: &str) -> StoreResult<Option<String>>;

    /// `ttl_seconds` is a hint; lazily-expiring callers still check expiry on read.
    async fn set(&self, key: &str, value: &str, ttl_seconds: Option<u64>) -> StoreResult<()>;

    async fn remove(&self, key: &str) -> StoreResult<()>;
}
