use async_trait::async_trait;
use tracing::{debug, error, info, warn};
use uuid::Uuid;
use lodge_catalog::{BookingHold, HoldRequest, HoldStatus};
use lodge_core::{GuardedInsert, HoldGateway, HoldRelease};
use lodge_shared::models::HoldLifecycleEvent;
use crate::manager::{log_hold_outcome, AvailabilityError, AvailabilityManager};

impl AvailabilityManager {
    /// Place a hold, re-checking capacity first.
    ///
    /// The insert is conditional on the committed-room total (held plus
    /// booked) the check saw; if another hold or a conversion slipped in
    /// between, the check runs again.
    pub async fn try_create_booking_hold(&self, request: HoldRequest) -> Result<BookingHold, AvailabilityError> {
        request.validate().map_err(AvailabilityError::InvalidRequest)?;

        let room_type = self
            .store
            .get_room_type(&request.room_type_id)
            .await?
            .ok_or_else(|| AvailabilityError::RoomTypeNotFound(request.room_type_id.clone()))?;

        for attempt in 0..=self.config.max_guard_retries {
            let now = self.clock.now();
            let (status, records) = self
                .inventory_status(&room_type, request.check_in_date, request.check_out_date, now)
                .await?;

            if let Some(record) = records
                .iter()
                .find(|r| r.forbids_stay(request.check_in_date, request.check_out_date))
            {
                return Err(AvailabilityError::Restricted(record.to_restriction().message));
            }

            if status.can_book_rooms < request.room_count {
                return Err(AvailabilityError::InsufficientInventory {
                    requested: request.room_count,
                    available: status.can_book_rooms,
                });
            }

            let hold = BookingHold::new(&request, now);
            let expected = status.committed_rooms();
            match self.store.insert_hold_guarded(&hold, expected, now).await? {
                GuardedInsert::Inserted => {
                    info!(
                        hold_id = %hold.hold_id,
                        room_type_id = %hold.room_type_id,
                        room_count = hold.room_count,
                        expires_at = %hold.expires_at,
                        "booking hold created"
                    );
                    self.track_hold(&hold, "created");
                    return Ok(hold);
                }
                GuardedInsert::Conflict { current_committed_rooms } => {
                    warn!(
                        room_type_id = %request.room_type_id,
                        attempt,
                        expected,
                        current = current_committed_rooms,
                        "committed rooms changed during hold creation, re-checking"
                    );
                }
            }
        }

        Err(AvailabilityError::HoldContention(request.room_type_id))
    }

    /// Place a hold; `None` on any failure (details are logged).
    pub async fn create_booking_hold(&self, request: HoldRequest) -> Option<BookingHold> {
        let room_type_id = request.room_type_id.clone();
        let room_count = request.room_count;
        match self.try_create_booking_hold(request).await {
            Ok(hold) => Some(hold),
            Err(err) => {
                log_hold_outcome(&room_type_id, room_count, &err);
                None
            }
        }
    }

    /// Give the rooms back. Idempotent: true whenever the hold exists.
    pub async fn release_booking_hold(&self, hold_id: Uuid) -> bool {
        match self.store.release_hold(hold_id).await {
            Ok(HoldRelease::Released) => {
                info!(%hold_id, "booking hold released");
                if let Ok(Some(hold)) = self.store.get_hold(hold_id).await {
                    self.track_hold(&hold, "released");
                }
                true
            }
            Ok(HoldRelease::Unchanged) => {
                debug!(%hold_id, "hold already settled, nothing to release");
                true
            }
            Ok(HoldRelease::Missing) => {
                warn!(%hold_id, "release requested for unknown hold");
                false
            }
            Err(err) => {
                error!(%hold_id, "failed to release booking hold: {}", err);
                false
            }
        }
    }

    /// Turn a live hold into a confirmed booking.
    ///
    /// Repeating the call with the same booking id succeeds; a lapsed,
    /// released or differently-converted hold does not.
    pub async fn convert_hold_to_booking(&self, hold_id: Uuid, booking_id: &str) -> bool {
        let now = self.clock.now();
        match self.store.convert_hold(hold_id, booking_id, now).await {
            Ok(true) => {
                info!(%hold_id, booking_id, "booking hold converted");
                if let Ok(Some(hold)) = self.store.get_hold(hold_id).await {
                    self.track_hold(&hold, "converted");
                }
                true
            }
            Ok(false) => match self.store.get_hold(hold_id).await {
                Ok(Some(hold))
                    if hold.status == HoldStatus::Converted
                        && hold.booking_id.as_deref() == Some(booking_id) =>
                {
                    true
                }
                Ok(Some(hold)) => {
                    warn!(
                        %hold_id,
                        booking_id,
                        status = hold.effective_status(now).as_str(),
                        "hold cannot be converted"
                    );
                    false
                }
                Ok(None) => {
                    warn!(%hold_id, "conversion requested for unknown hold");
                    false
                }
                Err(err) => {
                    error!(%hold_id, "failed to read hold after conversion miss: {}", err);
                    false
                }
            },
            Err(err) => {
                error!(%hold_id, booking_id, "failed to convert booking hold: {}", err);
                false
            }
        }
    }

    /// Expire every active hold whose lease has run out. Safe to run
    /// concurrently with itself and with live traffic.
    pub async fn cleanup_expired_holds(&self) -> Result<u64, AvailabilityError> {
        let now = self.clock.now();
        let expired = self.store.expire_holds(now).await?;
        if expired > 0 {
            info!(expired, "expired booking holds swept");
        }
        Ok(expired)
    }

    /// Read a hold as a caller should see it: a lapsed active hold reads as expired.
    pub async fn get_hold(&self, hold_id: Uuid) -> Result<Option<BookingHold>, AvailabilityError> {
        let now = self.clock.now();
        Ok(self.store.get_hold(hold_id).await?.map(|mut hold| {
            hold.status = hold.effective_status(now);
            hold
        }))
    }

    fn track_hold(&self, hold: &BookingHold, transition: &str) {
        let event = HoldLifecycleEvent {
            hold_id: hold.hold_id,
            room_type_id: hold.room_type_id.clone(),
            room_count: hold.room_count,
            transition: transition.to_string(),
            timestamp: self.clock.now().timestamp(),
        };
        self.analytics.track(event.into_analytics());
    }
}

#[async_trait]
impl HoldGateway for AvailabilityManager {
    async fn create_hold(&self, request: HoldRequest) -> Option<BookingHold> {
        self.create_booking_hold(request).await
    }

    async fn release_hold(&self, hold_id: Uuid) -> bool {
        self.release_booking_hold(hold_id).await
    }
}
