pub mod errors;
pub mod retry;
pub mod session;

pub use errors::{
    BookingError, BookingErrorCode, BookingErrorHandler, BookingErrorType, ErrorContext, NetworkFailure,
    RecoveryAction, RecoveryKind, Severity,
};
pub use retry::{retry_operation, RetryPolicy};
pub use session::{
    BookingSession, BookingSessionManager, BookingStep, NewSession, SessionConfig, SessionError, SessionUpdate,
    SessionValidation, TimeoutWarning,
};
