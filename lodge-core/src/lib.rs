pub mod search;
pub mod repository;
pub mod analytics;
pub mod gateway;

pub use repository::{GuardedInsert, HoldRelease, InventoryStore, SessionStorage, StoreError, StoreResult};
pub use analytics::{AnalyticsSink, TracingAnalyticsSink};
pub use gateway::HoldGateway;
pub use search::{AvailabilityQuery, SearchCriteria};

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Validation failed: {0}")]
    ValidationError(String),
    #[error("Internal service error: {0}")]
    InternalError(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type CoreResult<T> = Result<T, CoreError>;
