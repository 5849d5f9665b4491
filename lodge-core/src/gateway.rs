use async_trait::async_trait;
use uuid::Uuid;
use lodge_catalog::{BookingHold, HoldRequest};

/// The hold endpoints as seen by a booking session: create and release.
/// Failures are reported as `None` / `false`, never as errors.
#[async_trait]
pub trait HoldGateway: Send + Sync {
    async fn create_hold(&self, request: HoldRequest) -> Option<BookingHold>;

    async fn release_hold(&self, hold_id: Uuid) -> bool;
}
