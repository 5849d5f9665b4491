use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;
use lodge_catalog::{BlockReason, BookingHold, HoldStatus, InventoryBlock, RestrictionKind, RestrictionRecord, RoomType};
use lodge_core::{GuardedInsert, HoldRelease, InventoryStore, StoreError, StoreResult};

/// Postgres-backed inventory store.
pub struct PgInventoryStore {
    pool: PgPool,
}

impl PgInventoryStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

// Internal structs for type-safe querying
#[derive(sqlx::FromRow)]
struct RoomTypeRow {
    id: String,
    hotel_id: String,
    name: String,
    total_inventory: i32,
    oversell_limit: i32,
}

impl From<RoomTypeRow> for RoomType {
    fn from(row: RoomTypeRow) -> Self {
        RoomType {
            id: row.id,
            hotel_id: row.hotel_id,
            name: row.name,
            total_inventory: row.total_inventory,
            oversell_limit: row.oversell_limit,
        }
    }
}

#[derive(sqlx::FromRow)]
struct BlockRow {
    id: Uuid,
    room_type_id: String,
    start_date: NaiveDate,
    end_date: NaiveDate,
    rooms_blocked: i32,
    reason: String,
    active: bool,
}

#[derive(sqlx::FromRow)]
struct RestrictionRow {
    id: Uuid,
    room_type_id: String,
    restriction_type: String,
    restriction_value: Option<i32>,
    description: Option<String>,
    start_date: NaiveDate,
    end_date: NaiveDate,
    active: bool,
}

impl TryFrom<RestrictionRow> for RestrictionRecord {
    type Error = StoreError;

    fn try_from(row: RestrictionRow) -> Result<Self, Self::Error> {
        let kind = RestrictionKind::parse(&row.restriction_type)
            .ok_or_else(|| StoreError::corrupt(format!("unknown restriction type '{}'", row.restriction_type)))?;
        Ok(RestrictionRecord {
            id: row.id,
            room_type_id: row.room_type_id,
            kind,
            value: row.restriction_value,
            description: row.description,
            start_date: row.start_date,
            end_date: row.end_date,
            active: row.active,
        })
    }
}

#[derive(sqlx::FromRow)]
struct HoldRow {
    id: Uuid,
    room_type_id: String,
    check_in_date: NaiveDate,
    check_out_date: NaiveDate,
    room_count: i32,
    expires_at: DateTime<Utc>,
    status: String,
    booking_id: Option<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<HoldRow> for BookingHold {
    type Error = StoreError;

    fn try_from(row: HoldRow) -> Result<Self, Self::Error> {
        let status = HoldStatus::parse(&row.status)
            .ok_or_else(|| StoreError::corrupt(format!("unknown hold status '{}'", row.status)))?;
        Ok(BookingHold {
            hold_id: row.id,
            room_type_id: row.room_type_id,
            check_in_date: row.check_in_date,
            check_out_date: row.check_out_date,
            room_count: row.room_count,
            expires_at: row.expires_at,
            status,
            booking_id: row.booking_id,
            created_at: row.created_at,
        })
    }
}

const HOLD_COLUMNS: &str =
    "id, room_type_id, check_in_date, check_out_date, room_count, expires_at, status, booking_id, created_at";

// Rooms held by live holds overlapping [$2, $3) at $4.
const HELD_ROOMS_SQL: &str = r#"
    SELECT COALESCE(SUM(room_count), 0)::INT4
    FROM booking_holds
    WHERE room_type_id = $1
      AND status = 'active'
      AND expires_at >= $4
      AND check_in_date < $3
      AND check_out_date > $2
"#;

// Rooms of $1 left on the busiest night of [$2, $3).
const AVAILABLE_ROOMS_SQL: &str = r#"
    SELECT GREATEST(rt.total_inventory - COALESCE(MAX(nightly.booked), 0), 0)::INT4
    FROM room_types rt
    LEFT JOIN (
        SELECT night::date AS night, COALESCE(SUM(b.room_count), 0) AS booked
        FROM generate_series($2::date, $3::date - 1, INTERVAL '1 day') AS night
        LEFT JOIN bookings b
          ON b.room_type_id = $1
         AND b.status = 'confirmed'
         AND b.check_in_date <= night::date
         AND b.check_out_date > night::date
        GROUP BY night
    ) nightly ON TRUE
    WHERE rt.id = $1
    GROUP BY rt.total_inventory
"#;

/// Take the per-room-type lock that serializes hold placement and
/// conversion. Returns the room type's total inventory.
async fn lock_room_type(tx: &mut Transaction<'_, Postgres>, room_type_id: &str) -> StoreResult<Option<i32>> {
    sqlx::query_scalar("SELECT total_inventory FROM room_types WHERE id = $1 FOR UPDATE")
        .bind(room_type_id)
        .fetch_optional(&mut **tx)
        .await
        .map_err(StoreError::database)
}

#[async_trait]
impl InventoryStore for PgInventoryStore {
    async fn list_room_types(&self, hotel_id: &str) -> StoreResult<Vec<RoomType>> {
        let rows = sqlx::query_as::<_, RoomTypeRow>(
            "SELECT id, hotel_id, name, total_inventory, oversell_limit FROM room_types WHERE hotel_id = $1 ORDER BY id",
        )
        .bind(hotel_id)
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::database)?;

        Ok(rows.into_iter().map(RoomType::from).collect())
    }

    async fn get_room_type(&self, room_type_id: &str) -> StoreResult<Option<RoomType>> {
        let row = sqlx::query_as::<_, RoomTypeRow>(
            "SELECT id, hotel_id, name, total_inventory, oversell_limit FROM room_types WHERE id = $1",
        )
        .bind(room_type_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::database)?;

        Ok(row.map(RoomType::from))
    }

    async fn available_rooms(&self, room_type_id: &str, check_in: NaiveDate, check_out: NaiveDate) -> StoreResult<i32> {
        let available: Option<i32> = sqlx::query_scalar(AVAILABLE_ROOMS_SQL)
            .bind(room_type_id)
            .bind(check_in)
            .bind(check_out)
            .fetch_optional(&self.pool)
            .await
            .map_err(StoreError::database)?;

        Ok(available.unwrap_or(0))
    }

    async fn list_blocks(&self, room_type_id: &str, check_in: NaiveDate, check_out: NaiveDate) -> StoreResult<Vec<InventoryBlock>> {
        let rows = sqlx::query_as::<_, BlockRow>(
            r#"
            SELECT id, room_type_id, start_date, end_date, rooms_blocked, reason, active
            FROM inventory_blocks
            WHERE room_type_id = $1 AND active AND start_date < $3 AND end_date >= $2
            "#,
        )
        .bind(room_type_id)
        .bind(check_in)
        .bind(check_out)
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::database)?;

        Ok(rows
            .into_iter()
            .map(|row| InventoryBlock {
                id: row.id,
                room_type_id: row.room_type_id,
                start_date: row.start_date,
                end_date: row.end_date,
                rooms_blocked: row.rooms_blocked,
                reason: BlockReason::parse(&row.reason),
                active: row.active,
            })
            .collect())
    }

    async fn list_restrictions(
        &self,
        room_type_id: &str,
        check_in: NaiveDate,
        check_out: NaiveDate,
    ) -> StoreResult<Vec<RestrictionRecord>> {
        let rows = sqlx::query_as::<_, RestrictionRow>(
            r#"
            SELECT id, room_type_id, restriction_type, restriction_value, description, start_date, end_date, active
            FROM inventory_restrictions
            WHERE room_type_id = $1 AND active AND start_date < $3 AND end_date >= $2
            "#,
        )
        .bind(room_type_id)
        .bind(check_in)
        .bind(check_out)
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::database)?;

        rows.into_iter().map(RestrictionRecord::try_from).collect()
    }

    async fn list_active_holds(
        &self,
        room_type_id: &str,
        check_in: NaiveDate,
        check_out: NaiveDate,
        now: DateTime<Utc>,
    ) -> StoreResult<Vec<BookingHold>> {
        let sql = format!(
            "SELECT {} FROM booking_holds \
             WHERE room_type_id = $1 AND status = 'active' AND expires_at >= $4 \
               AND check_in_date < $3 AND check_out_date > $2",
            HOLD_COLUMNS
        );
        let rows = sqlx::query_as::<_, HoldRow>(&sql)
            .bind(room_type_id)
            .bind(check_in)
            .bind(check_out)
            .bind(now)
            .fetch_all(&self.pool)
            .await
            .map_err(StoreError::database)?;

        rows.into_iter().map(BookingHold::try_from).collect()
    }

    async fn insert_hold_guarded(
        &self,
        hold: &BookingHold,
        expected_committed_rooms: i32,
        now: DateTime<Utc>,
    ) -> StoreResult<GuardedInsert> {
        let mut tx = self.pool.begin().await.map_err(StoreError::connection)?;

        let total = lock_room_type(&mut tx, &hold.room_type_id).await?.unwrap_or(0).max(0);

        let held: i32 = sqlx::query_scalar(HELD_ROOMS_SQL)
            .bind(&hold.room_type_id)
            .bind(hold.check_in_date)
            .bind(hold.check_out_date)
            .bind(now)
            .fetch_one(&mut *tx)
            .await
            .map_err(StoreError::database)?;

        let available: Option<i32> = sqlx::query_scalar(AVAILABLE_ROOMS_SQL)
            .bind(&hold.room_type_id)
            .bind(hold.check_in_date)
            .bind(hold.check_out_date)
            .fetch_optional(&mut *tx)
            .await
            .map_err(StoreError::database)?;

        let current = held + total - available.unwrap_or(0);
        if current != expected_committed_rooms {
            tx.rollback().await.map_err(StoreError::database)?;
            return Ok(GuardedInsert::Conflict { current_committed_rooms: current });
        }

        sqlx::query(
            r#"
            INSERT INTO booking_holds (id, room_type_id, check_in_date, check_out_date, room_count, expires_at, status, booking_id, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(hold.hold_id)
        .bind(&hold.room_type_id)
        .bind(hold.check_in_date)
        .bind(hold.check_out_date)
        .bind(hold.room_count)
        .bind(hold.expires_at)
        .bind(hold.status.as_str())
        .bind(&hold.booking_id)
        .bind(hold.created_at)
        .execute(&mut *tx)
        .await
        .map_err(StoreError::database)?;

        tx.commit().await.map_err(StoreError::database)?;
        Ok(GuardedInsert::Inserted)
    }

    async fn get_hold(&self, hold_id: Uuid) -> StoreResult<Option<BookingHold>> {
        let sql = format!("SELECT {} FROM booking_holds WHERE id = $1", HOLD_COLUMNS);
        let row = sqlx::query_as::<_, HoldRow>(&sql)
            .bind(hold_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(StoreError::database)?;

        row.map(BookingHold::try_from).transpose()
    }

    async fn release_hold(&self, hold_id: Uuid) -> StoreResult<HoldRelease> {
        let result = sqlx::query("UPDATE booking_holds SET status = 'expired' WHERE id = $1 AND status = 'active'")
            .bind(hold_id)
            .execute(&self.pool)
            .await
            .map_err(StoreError::database)?;
        if result.rows_affected() > 0 {
            return Ok(HoldRelease::Released);
        }

        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM booking_holds WHERE id = $1)")
            .bind(hold_id)
            .fetch_one(&self.pool)
            .await
            .map_err(StoreError::database)?;

        Ok(if exists { HoldRelease::Unchanged } else { HoldRelease::Missing })
    }

    async fn convert_hold(&self, hold_id: Uuid, booking_id: &str, now: DateTime<Utc>) -> StoreResult<bool> {
        let mut tx = self.pool.begin().await.map_err(StoreError::connection)?;

        let room_type_id: Option<String> = sqlx::query_scalar("SELECT room_type_id FROM booking_holds WHERE id = $1")
            .bind(hold_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(StoreError::database)?;
        let Some(room_type_id) = room_type_id else {
            tx.rollback().await.map_err(StoreError::database)?;
            return Ok(false);
        };
        // Same lock as hold placement, so a guard never sees half a conversion.
        lock_room_type(&mut tx, &room_type_id).await?;

        let converted: Option<(String, NaiveDate, NaiveDate, i32)> = sqlx::query_as(
            r#"
            UPDATE booking_holds
            SET status = 'converted', booking_id = $2
            WHERE id = $1 AND status = 'active' AND expires_at >= $3
            RETURNING room_type_id, check_in_date, check_out_date, room_count
            "#,
        )
        .bind(hold_id)
        .bind(booking_id)
        .bind(now)
        .fetch_optional(&mut *tx)
        .await
        .map_err(StoreError::database)?;

        let Some((room_type_id, check_in, check_out, room_count)) = converted else {
            tx.rollback().await.map_err(StoreError::database)?;
            return Ok(false);
        };

        sqlx::query(
            r#"
            INSERT INTO bookings (id, booking_ref, room_type_id, hold_id, check_in_date, check_out_date, room_count, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7, 'confirmed')
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(booking_id)
        .bind(room_type_id)
        .bind(hold_id)
        .bind(check_in)
        .bind(check_out)
        .bind(room_count)
        .execute(&mut *tx)
        .await
        .map_err(StoreError::database)?;

        tx.commit().await.map_err(StoreError::database)?;
        Ok(true)
    }

    async fn expire_holds(&self, now: DateTime<Utc>) -> StoreResult<u64> {
        let result = sqlx::query("UPDATE booking_holds SET status = 'expired' WHERE status = 'active' AND expires_at < $1")
            .bind(now)
            .execute(&self.pool)
            .await
            .map_err(StoreError::database)?;

        Ok(result.rows_affected())
    }
}
