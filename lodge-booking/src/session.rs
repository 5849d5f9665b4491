use std::sync::Arc;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;
use lodge_catalog::{BookingHold, HoldRequest, RatePlanType};
use lodge_core::{HoldGateway, SearchCriteria, SessionStorage, StoreError};
use lodge_shared::Clock;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub timeout_minutes: i64,
    /// Countdown warnings start once this many minutes remain.
    pub warning_minutes: i64,
    /// Storage key prefix; one session lives under each namespace.
    pub namespace: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            timeout_minutes: 30,
            warning_minutes: 5,
            namespace: "lodge".to_string(),
        }
    }
}

/// Where the guest is in the booking funnel.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BookingStep {
    #[default]
    Search,
    Availability,
    GuestInfo,
    Payment,
    Confirmation,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BookingSession {
    pub session_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub hotel_id: Option<String>,
    pub search_criteria: Option<SearchCriteria>,
    pub selected_room_type_id: Option<String>,
    pub selected_rate_plan: Option<RatePlanType>,
    pub step: BookingStep,
    pub booking_hold: Option<BookingHold>,
}

impl BookingSession {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at < now
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewSession {
    pub hotel_id: Option<String>,
    pub search_criteria: Option<SearchCriteria>,
}

/// Fields to overwrite; `None` leaves the current value alone.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionUpdate {
    pub hotel_id: Option<String>,
    pub search_criteria: Option<SearchCriteria>,
    pub selected_room_type_id: Option<String>,
    pub selected_rate_plan: Option<RatePlanType>,
    pub step: Option<BookingStep>,
    pub booking_hold: Option<BookingHold>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct TimeoutWarning {
    pub show_warning: bool,
    pub minutes_remaining: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionValidation {
    pub valid: bool,
    pub issues: Vec<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("No active booking session")]
    NoActiveSession,
    #[error("Session storage failed: {0}")]
    Storage(#[from] StoreError),
    #[error("Session data could not be encoded: {0}")]
    Encoding(#[from] serde_json::Error),
}

/// Keeps the guest's search and selection alive across requests and
/// tracks the holds placed on their behalf.
#[derive(Clone)]
pub struct BookingSessionManager {
    storage: Arc<dyn SessionStorage>,
    holds: Arc<dyn HoldGateway>,
    clock: Arc<dyn Clock>,
    config: SessionConfig,
}

impl BookingSessionManager {
    pub fn new(
        storage: Arc<dyn SessionStorage>,
        holds: Arc<dyn HoldGateway>,
        clock: Arc<dyn Clock>,
        config: SessionConfig,
    ) -> Self {
        Self {
            storage,
            holds,
            clock,
            config,
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// A manager whose storage keys are private to one session id, for
    /// servers that keep many guests' sessions in a shared store.
    pub fn for_session(&self, session_id: &str) -> Self {
        let mut scoped = self.clone();
        scoped.config.namespace = format!("{}:{}", self.config.namespace, session_id);
        scoped
    }

    fn session_key(&self) -> String {
        format!("{}:booking_session", self.config.namespace)
    }

    fn holds_key(&self) -> String {
        format!("{}:booking_holds", self.config.namespace)
    }

    pub async fn create_session(
        &self,
        session_id: Option<String>,
        new: NewSession,
    ) -> Result<BookingSession, SessionError> {
        let now = self.clock.now();
        let session = BookingSession {
            session_id: session_id.unwrap_or_else(|| Uuid::new_v4().to_string()),
            created_at: now,
            updated_at: now,
            expires_at: now + Duration::minutes(self.config.timeout_minutes),
            hotel_id: new.hotel_id,
            search_criteria: new.search_criteria,
            selected_room_type_id: None,
            selected_rate_plan: None,
            step: BookingStep::Search,
            booking_hold: None,
        };
        self.save_session(&session).await?;
        info!(session_id = %session.session_id, expires_at = %session.expires_at, "booking session created");
        Ok(session)
    }

    /// The stored session, or `None` once it has expired (storage is cleared then).
    pub async fn get_current_session(&self) -> Result<Option<BookingSession>, SessionError> {
        let raw = match self.storage.get(&self.session_key()).await? {
            Some(raw) => raw,
            None => return Ok(None),
        };

        let session: BookingSession = match serde_json::from_str(&raw) {
            Ok(session) => session,
            Err(err) => {
                warn!("discarding unreadable booking session: {}", err);
                self.clear_session().await?;
                return Ok(None);
            }
        };

        if session.is_expired_at(self.clock.now()) {
            info!(session_id = %session.session_id, "booking session expired");
            self.clear_session().await?;
            return Ok(None);
        }
        Ok(Some(session))
    }

    /// Merge `update` into the current session. Any update restarts the
    /// full timeout.
    pub async fn update_session(&self, update: SessionUpdate) -> Result<BookingSession, SessionError> {
        let mut session = self
            .get_current_session()
            .await?
            .ok_or(SessionError::NoActiveSession)?;

        if let Some(hotel_id) = update.hotel_id {
            session.hotel_id = Some(hotel_id);
        }
        if let Some(criteria) = update.search_criteria {
            session.search_criteria = Some(criteria);
        }
        if let Some(room_type_id) = update.selected_room_type_id {
            session.selected_room_type_id = Some(room_type_id);
        }
        if let Some(rate_plan) = update.selected_rate_plan {
            session.selected_rate_plan = Some(rate_plan);
        }
        if let Some(step) = update.step {
            session.step = step;
        }
        if let Some(hold) = update.booking_hold {
            session.booking_hold = Some(hold);
        }

        let now = self.clock.now();
        session.updated_at = now;
        session.expires_at = now + Duration::minutes(self.config.timeout_minutes);
        self.save_session(&session).await?;
        Ok(session)
    }

    pub fn get_timeout_warning(&self, session: &BookingSession) -> TimeoutWarning {
        let seconds = (session.expires_at - self.clock.now()).num_seconds().max(0);
        // round up so "0 minutes" only shows once time is really out
        let minutes_remaining = (seconds + 59) / 60;
        TimeoutWarning {
            show_warning: minutes_remaining > 0 && minutes_remaining <= self.config.warning_minutes,
            minutes_remaining,
        }
    }

    /// Push expiry to `minutes` from now (the configured timeout when `None`).
    /// False when there is no live session to extend.
    pub async fn extend_session(&self, minutes: Option<i64>) -> Result<bool, SessionError> {
        let mut session = match self.get_current_session().await? {
            Some(session) => session,
            None => return Ok(false),
        };
        let now = self.clock.now();
        let minutes = minutes.unwrap_or(self.config.timeout_minutes);
        session.updated_at = now;
        session.expires_at = now + Duration::minutes(minutes);
        self.save_session(&session).await?;
        debug!(session_id = %session.session_id, minutes, "booking session extended");
        Ok(true)
    }

    /// Checks run before the guest may move on to payment.
    pub fn validate_session(&self, session: &BookingSession) -> SessionValidation {
        let mut issues = Vec::new();
        if session.session_id.trim().is_empty() {
            issues.push("Session ID is missing".to_string());
        }
        if session.is_expired_at(self.clock.now()) {
            issues.push("Session has expired".to_string());
        }
        if session.search_criteria.is_none() {
            issues.push("Search criteria are missing".to_string());
        }
        SessionValidation {
            valid: issues.is_empty(),
            issues,
        }
    }

    pub async fn clear_session(&self) -> Result<(), SessionError> {
        self.storage.remove(&self.session_key()).await?;
        self.storage.remove(&self.holds_key()).await?;
        Ok(())
    }

    /// Ask for a hold, remember it and attach it to the live session.
    /// `None` when the rooms could not be held.
    pub async fn create_hold(&self, request: HoldRequest) -> Result<Option<BookingHold>, SessionError> {
        if self.get_current_session().await?.is_none() {
            return Err(SessionError::NoActiveSession);
        }

        let hold = match self.holds.create_hold(request).await {
            Some(hold) => hold,
            None => return Ok(None),
        };

        let mut cached = self.load_holds().await?;
        cached.push(hold.clone());
        self.save_holds(&cached).await?;

        self.update_session(SessionUpdate {
            booking_hold: Some(hold.clone()),
            ..Default::default()
        })
        .await?;
        Ok(Some(hold))
    }

    /// Release one of this session's holds and forget it locally, even if
    /// the release call failed; the lease runs out on its own.
    ///
    /// Returns false, without touching inventory, when the hold is not one
    /// this session placed.
    pub async fn release_hold(&self, hold_id: Uuid) -> Result<bool, SessionError> {
        let mut cached = self.load_holds().await?;
        if !cached.iter().any(|h| h.hold_id == hold_id) {
            warn!(%hold_id, "release requested for a hold this session does not own");
            return Ok(false);
        }

        if !self.holds.release_hold(hold_id).await {
            warn!(%hold_id, "hold release was not confirmed");
        }

        cached.retain(|h| h.hold_id != hold_id);
        self.save_holds(&cached).await?;

        if let Some(mut session) = self.get_current_session().await? {
            if session.booking_hold.as_ref().is_some_and(|h| h.hold_id == hold_id) {
                session.booking_hold = None;
                self.save_session(&session).await?;
            }
        }
        Ok(true)
    }

    /// Cached holds that are still live; lapsed ones are dropped from the cache.
    pub async fn get_active_holds(&self) -> Result<Vec<BookingHold>, SessionError> {
        let cached = self.load_holds().await?;
        let now = self.clock.now();
        let total = cached.len();
        let active: Vec<BookingHold> = cached.into_iter().filter(|h| h.is_active_at(now)).collect();
        if active.len() != total {
            self.save_holds(&active).await?;
        }
        Ok(active)
    }

    async fn save_session(&self, session: &BookingSession) -> Result<(), SessionError> {
        let raw = serde_json::to_string(session)?;
        let ttl = (session.expires_at - self.clock.now()).num_seconds().max(1) as u64;
        self.storage.set(&self.session_key(), &raw, Some(ttl)).await?;
        Ok(())
    }

    async fn load_holds(&self) -> Result<Vec<BookingHold>, SessionError> {
        match self.storage.get(&self.holds_key()).await? {
            Some(raw) => Ok(serde_json::from_str(&raw).unwrap_or_else(|err| {
                warn!("discarding unreadable hold cache: {}", err);
                Vec::new()
            })),
            None => Ok(Vec::new()),
        }
    }

    async fn save_holds(&self, holds: &[BookingHold]) -> Result<(), SessionError> {
        if holds.is_empty() {
            self.storage.remove(&self.holds_key()).await?;
            return Ok(());
        }
        let now = self.clock.now();
        let ttl = holds
            .iter()
            .map(|h| (h.expires_at - now).num_seconds())
            .max()
            .unwrap_or(0)
            .max(1) as u64;
        self.storage
            .set(&self.holds_key(), &serde_json::to_string(holds)?, Some(ttl))
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{NaiveDate, TimeZone};
    use std::sync::Mutex;
    use lodge_shared::ManualClock;
    use lodge_store::MemorySessionStorage;

    /// Hands out holds without checking inventory.
    #[derive(Default)]
    struct FakeGateway {
        released: Mutex<Vec<Uuid>>,
        refuse: bool,
        clock: Option<Arc<ManualClock>>,
    }

    #[async_trait]
    impl HoldGateway for FakeGateway {
        async fn create_hold(&self, request: HoldRequest) -> Option<BookingHold> {
            if self.refuse {
                return None;
            }
            let now = self.clock.as_ref().map(|c| c.now()).unwrap_or_else(Utc::now);
            Some(BookingHold::new(&request, now))
        }

        async fn release_hold(&self, hold_id: Uuid) -> bool {
            self.released.lock().unwrap().push(hold_id);
            true
        }
    }

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 10, 14, 0, 0).unwrap()
    }

    fn criteria() -> SearchCriteria {
        SearchCriteria {
            check_in_date: NaiveDate::from_ymd_opt(2025, 7, 1).unwrap(),
            check_out_date: NaiveDate::from_ymd_opt(2025, 7, 4).unwrap(),
            adults: 2,
            children: 1,
            rooms: 1,
            currency: Some("EUR".to_string()),
        }
    }

    fn hold_request() -> HoldRequest {
        HoldRequest::new("deluxe", criteria().check_in_date, criteria().check_out_date, 1)
    }

    fn manager_with(gateway: FakeGateway, clock: Arc<ManualClock>) -> (BookingSessionManager, Arc<MemorySessionStorage>) {
        let storage = Arc::new(MemorySessionStorage::new());
        let manager = BookingSessionManager::new(storage.clone(), Arc::new(gateway), clock, SessionConfig::default());
        (manager, storage)
    }

    fn manager() -> (BookingSessionManager, Arc<MemorySessionStorage>, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(start()));
        let gateway = FakeGateway {
            clock: Some(clock.clone()),
            ..Default::default()
        };
        let (manager, storage) = manager_with(gateway, clock.clone());
        (manager, storage, clock)
    }

    #[tokio::test]
    async fn test_session_created_with_timeout() {
        let (manager, _storage, _clock) = manager();
        let session = manager
            .create_session(
                Some("sess-1".to_string()),
                NewSession {
                    hotel_id: Some("king-david".to_string()),
                    search_criteria: Some(criteria()),
                },
            )
            .await
            .unwrap();

        assert_eq!(session.session_id, "sess-1");
        assert_eq!(session.expires_at, start() + Duration::minutes(30));
        assert_eq!(session.step, BookingStep::Search);
        assert_eq!(manager.get_current_session().await.unwrap(), Some(session));
    }

    #[tokio::test]
    async fn test_generated_session_id() {
        let (manager, _storage, _clock) = manager();
        let session = manager.create_session(None, NewSession::default()).await.unwrap();
        assert!(Uuid::parse_str(&session.session_id).is_ok());
    }

    #[tokio::test]
    async fn test_expired_session_is_cleared_on_read() {
        let (manager, storage, clock) = manager();
        manager.create_session(None, NewSession::default()).await.unwrap();

        clock.advance(Duration::minutes(30));
        assert!(manager.get_current_session().await.unwrap().is_some());

        clock.advance(Duration::seconds(1));
        assert!(manager.get_current_session().await.unwrap().is_none());
        assert_eq!(storage.get("lodge:booking_session").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_update_slides_expiry() {
        let (manager, _storage, clock) = manager();
        manager.create_session(None, NewSession::default()).await.unwrap();

        clock.advance(Duration::minutes(20));
        let updated = manager
            .update_session(SessionUpdate {
                selected_room_type_id: Some("deluxe".to_string()),
                selected_rate_plan: Some(RatePlanType::NonRefundable),
                step: Some(BookingStep::GuestInfo),
                ..Default::default()
            })
            .await
            .unwrap();

        assert_eq!(updated.expires_at, clock.now() + Duration::minutes(30));
        assert_eq!(updated.selected_room_type_id.as_deref(), Some("deluxe"));
        assert_eq!(updated.step, BookingStep::GuestInfo);

        // 45 minutes after creation, still alive thanks to the update
        clock.advance(Duration::minutes(25));
        assert!(manager.get_current_session().await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_update_without_session() {
        let (manager, _storage, _clock) = manager();
        let err = manager.update_session(SessionUpdate::default()).await.unwrap_err();
        assert!(matches!(err, SessionError::NoActiveSession));
    }

    #[tokio::test]
    async fn test_timeout_warning_window() {
        let (manager, _storage, clock) = manager();
        let session = manager.create_session(None, NewSession::default()).await.unwrap();

        let early = manager.get_timeout_warning(&session);
        assert_eq!(early, TimeoutWarning { show_warning: false, minutes_remaining: 30 });

        clock.advance(Duration::minutes(25));
        let warning = manager.get_timeout_warning(&session);
        assert_eq!(warning, TimeoutWarning { show_warning: true, minutes_remaining: 5 });

        clock.advance(Duration::seconds(4 * 60 + 30));
        assert_eq!(manager.get_timeout_warning(&session).minutes_remaining, 1);

        clock.advance(Duration::minutes(2));
        assert_eq!(manager.get_timeout_warning(&session), TimeoutWarning { show_warning: false, minutes_remaining: 0 });
    }

    #[tokio::test]
    async fn test_extend_session() {
        let (manager, _storage, clock) = manager();
        assert!(!manager.extend_session(None).await.unwrap());

        manager.create_session(None, NewSession::default()).await.unwrap();
        clock.advance(Duration::minutes(28));
        assert!(manager.extend_session(Some(10)).await.unwrap());

        let session = manager.get_current_session().await.unwrap().unwrap();
        assert_eq!(session.expires_at, clock.now() + Duration::minutes(10));
    }

    #[tokio::test]
    async fn test_validate_session() {
        let (manager, _storage, clock) = manager();
        let session = manager
            .create_session(None, NewSession { hotel_id: None, search_criteria: Some(criteria()) })
            .await
            .unwrap();
        assert!(manager.validate_session(&session).valid);

        let mut bare = session.clone();
        bare.session_id = String::new();
        bare.search_criteria = None;
        clock.advance(Duration::minutes(31));

        let report = manager.validate_session(&bare);
        assert!(!report.valid);
        assert_eq!(report.issues.len(), 3);
    }

    #[tokio::test]
    async fn test_hold_is_cached_and_attached() {
        let (manager, _storage, _clock) = manager();
        manager.create_session(None, NewSession::default()).await.unwrap();

        let hold = manager.create_hold(hold_request()).await.unwrap().unwrap();
        assert_eq!(manager.get_active_holds().await.unwrap(), vec![hold.clone()]);

        let session = manager.get_current_session().await.unwrap().unwrap();
        assert_eq!(session.booking_hold.as_ref().map(|h| h.hold_id), Some(hold.hold_id));

        assert!(manager.release_hold(hold.hold_id).await.unwrap());
        assert!(manager.get_active_holds().await.unwrap().is_empty());
        assert!(manager.get_current_session().await.unwrap().unwrap().booking_hold.is_none());
    }

    #[tokio::test]
    async fn test_lapsed_holds_are_filtered_on_read() {
        let (manager, _storage, clock) = manager();
        manager.create_session(None, NewSession::default()).await.unwrap();
        let first = manager.create_hold(hold_request()).await.unwrap().unwrap();
        clock.advance(Duration::minutes(10));
        let second = manager.create_hold(hold_request()).await.unwrap().unwrap();

        clock.advance(Duration::minutes(6));
        let active = manager.get_active_holds().await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].hold_id, second.hold_id);
        assert!(active.iter().all(|h| h.hold_id != first.hold_id));
    }

    #[tokio::test]
    async fn test_refused_hold() {
        let clock = Arc::new(ManualClock::new(start()));
        let gateway = FakeGateway {
            refuse: true,
            ..Default::default()
        };
        let (manager, _storage) = manager_with(gateway, clock);
        manager.create_session(None, NewSession::default()).await.unwrap();
        assert!(manager.create_hold(hold_request()).await.unwrap().is_none());
        assert!(manager.get_active_holds().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_hold_needs_a_live_session() {
        let (manager, _storage, clock) = manager();
        let err = manager.create_hold(hold_request()).await.unwrap_err();
        assert!(matches!(err, SessionError::NoActiveSession));

        manager.create_session(None, NewSession::default()).await.unwrap();
        clock.advance(Duration::minutes(31));
        let err = manager.create_hold(hold_request()).await.unwrap_err();
        assert!(matches!(err, SessionError::NoActiveSession));
        assert!(manager.get_active_holds().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_session_cannot_release_another_sessions_hold() {
        let clock = Arc::new(ManualClock::new(start()));
        let gateway = Arc::new(FakeGateway {
            clock: Some(clock.clone()),
            ..Default::default()
        });
        let manager = BookingSessionManager::new(
            Arc::new(MemorySessionStorage::new()),
            gateway.clone(),
            clock,
            SessionConfig::default(),
        );
        let alice = manager.for_session("a1");
        let bob = manager.for_session("b2");
        alice.create_session(Some("a1".to_string()), NewSession::default()).await.unwrap();
        bob.create_session(Some("b2".to_string()), NewSession::default()).await.unwrap();

        let bobs_hold = bob.create_hold(hold_request()).await.unwrap().unwrap();
        assert!(!alice.release_hold(bobs_hold.hold_id).await.unwrap());
        assert!(gateway.released.lock().unwrap().is_empty());
        assert_eq!(bob.get_active_holds().await.unwrap(), vec![bobs_hold.clone()]);

        assert!(bob.release_hold(bobs_hold.hold_id).await.unwrap());
        assert_eq!(*gateway.released.lock().unwrap(), vec![bobs_hold.hold_id]);
    }

    #[tokio::test]
    async fn test_clear_session() {
        let (manager, storage, _clock) = manager();
        manager.create_session(None, NewSession::default()).await.unwrap();
        manager.create_hold(hold_request()).await.unwrap();

        manager.clear_session().await.unwrap();
        assert!(manager.get_current_session().await.unwrap().is_none());
        assert_eq!(storage.get("lodge:booking_holds").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_scoped_managers_do_not_share_sessions() {
        let (manager, storage, _clock) = manager();
        let alice = manager.for_session("a1");
        let bob = manager.for_session("b2");

        alice.create_session(Some("a1".to_string()), NewSession::default()).await.unwrap();
        assert!(bob.get_current_session().await.unwrap().is_none());
        assert!(storage.get("lodge:a1:booking_session").await.unwrap().is_some());

        bob.create_session(Some("b2".to_string()), NewSession::default()).await.unwrap();
        alice.clear_session().await.unwrap();
        assert!(bob.get_current_session().await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_unreadable_session_is_discarded() {
        let (manager, storage, _clock) = manager();
        storage.set("lodge:booking_session", "{not json", None).await.unwrap();
        assert!(manager.get_current_session().await.unwrap().is_none());
        assert_eq!(storage.get("lodge:booking_session").await.unwrap(), None);
    }
}
