use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};
use lodge_core::{AnalyticsSink, TracingAnalyticsSink};
use lodge_shared::models::BookingErrorEvent;
use lodge_shared::{Clock, SystemClock};
use crate::retry::{retry_operation, RetryPolicy};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingErrorType {
    NetworkError,
    ValidationError,
    AvailabilityError,
    PaymentError,
    SessionExpired,
    RateChanged,
    InventoryInsufficient,
    SystemError,
}

impl BookingErrorType {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingErrorType::NetworkError => "NETWORK_ERROR",
            BookingErrorType::ValidationError => "VALIDATION_ERROR",
            BookingErrorType::AvailabilityError => "AVAILABILITY_ERROR",
            BookingErrorType::PaymentError => "PAYMENT_ERROR",
            BookingErrorType::SessionExpired => "SESSION_EXPIRED",
            BookingErrorType::RateChanged => "RATE_CHANGED",
            BookingErrorType::InventoryInsufficient => "INVENTORY_INSUFFICIENT",
            BookingErrorType::SystemError => "SYSTEM_ERROR",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }

    /// Heading shown above the error message.
    pub fn title(&self) -> &'static str {
        match self {
            Severity::Low => "Please Check",
            Severity::Medium => "Something Went Wrong",
            Severity::High => "Booking Issue",
            Severity::Critical => "System Error",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryKind {
    Retry,
    Fallback,
    Redirect,
    Refresh,
    ContactSupport,
}

/// A button offered to the guest. Lower priority values come first.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RecoveryAction {
    #[serde(rename = "type")]
    pub kind: RecoveryKind,
    pub label: String,
    pub priority: u8,
    /// Where a redirect goes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
}

impl RecoveryAction {
    fn new(kind: RecoveryKind, label: &str, priority: u8) -> Self {
        Self {
            kind,
            label: label.to_string(),
            priority,
            target: None,
        }
    }

    fn redirect(label: &str, target: &str, priority: u8) -> Self {
        Self {
            target: Some(target.to_string()),
            ..Self::new(RecoveryKind::Redirect, label, priority)
        }
    }
}

/// Every failure the booking flow knows how to explain.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum BookingErrorCode {
    NetworkTimeout,
    AvailabilityChanged,
    PaymentDeclined,
    SessionExpired,
    RateChanged,
    InventoryInsufficient,
    /// Bad guest input; the message says what to fix.
    Validation,
    /// A network failure that is not a timeout or dropped connection.
    Network,
    /// An HTTP status without a dedicated entry.
    Api(u16),
    System,
    /// A code string this catalog has no entry for.
    Unknown(String),
}

impl BookingErrorCode {
    pub fn parse(code: &str) -> Self {
        match code {
            "NETWORK_TIMEOUT" => BookingErrorCode::NetworkTimeout,
            "AVAILABILITY_CHANGED" => BookingErrorCode::AvailabilityChanged,
            "PAYMENT_DECLINED" => BookingErrorCode::PaymentDeclined,
            "SESSION_EXPIRED" => BookingErrorCode::SessionExpired,
            "RATE_CHANGED" => BookingErrorCode::RateChanged,
            "INVENTORY_INSUFFICIENT" => BookingErrorCode::InventoryInsufficient,
            "VALIDATION_ERROR" => BookingErrorCode::Validation,
            "NETWORK_ERROR" => BookingErrorCode::Network,
            "SYSTEM_ERROR" => BookingErrorCode::System,
            other => match other.strip_prefix("API_ERROR_").and_then(|s| s.parse().ok()) {
                Some(status) => BookingErrorCode::Api(status),
                None => BookingErrorCode::Unknown(other.to_string()),
            },
        }
    }

    /// Stable identifier reported to clients and analytics.
    pub fn code(&self) -> String {
        match self {
            BookingErrorCode::NetworkTimeout => "NETWORK_TIMEOUT".to_string(),
            BookingErrorCode::AvailabilityChanged => "AVAILABILITY_CHANGED".to_string(),
            BookingErrorCode::PaymentDeclined => "PAYMENT_DECLINED".to_string(),
            BookingErrorCode::SessionExpired => "SESSION_EXPIRED".to_string(),
            BookingErrorCode::RateChanged => "RATE_CHANGED".to_string(),
            BookingErrorCode::InventoryInsufficient => "INVENTORY_INSUFFICIENT".to_string(),
            BookingErrorCode::Validation => "VALIDATION_ERROR".to_string(),
            BookingErrorCode::Network => "NETWORK_ERROR".to_string(),
            BookingErrorCode::Api(status) => format!("API_ERROR_{}", status),
            BookingErrorCode::System => "SYSTEM_ERROR".to_string(),
            BookingErrorCode::Unknown(code) => code.clone(),
        }
    }

    fn template(&self) -> Template {
        use RecoveryKind::*;
        match self {
            BookingErrorCode::NetworkTimeout => Template {
                error_type: BookingErrorType::NetworkError,
                message: "Request timed out",
                user_message: "The connection timed out. Please check your internet connection and try again.",
                retryable: true,
                severity: Severity::Medium,
                actions: vec![
                    RecoveryAction::new(Retry, "Try again", 1),
                    RecoveryAction::new(Refresh, "Reload page", 2),
                ],
            },
            BookingErrorCode::AvailabilityChanged => Template {
                error_type: BookingErrorType::AvailabilityError,
                message: "Room availability changed",
                user_message: "The room you selected is no longer available for these dates. Please choose another room or change your dates.",
                retryable: false,
                severity: Severity::High,
                actions: vec![
                    RecoveryAction::redirect("Choose another room", "/search", 1),
                    RecoveryAction::new(ContactSupport, "Contact us", 3),
                ],
            },
            BookingErrorCode::PaymentDeclined => Template {
                error_type: BookingErrorType::PaymentError,
                message: "Payment was declined",
                user_message: "Your payment could not be processed. Please check your card details or use a different payment method.",
                retryable: true,
                severity: Severity::High,
                actions: vec![
                    RecoveryAction::new(Retry, "Try again", 1),
                    RecoveryAction::new(Fallback, "Use a different payment method", 2),
                    RecoveryAction::new(ContactSupport, "Contact us", 3),
                ],
            },
            BookingErrorCode::SessionExpired => Template {
                error_type: BookingErrorType::SessionExpired,
                message: "Booking session expired",
                user_message: "Your booking session has expired. Please start your search again.",
                retryable: false,
                severity: Severity::Medium,
                actions: vec![
                    RecoveryAction::redirect("Start a new search", "/search", 1),
                    RecoveryAction::new(Refresh, "Reload page", 2),
                ],
            },
            BookingErrorCode::RateChanged => Template {
                error_type: BookingErrorType::RateChanged,
                message: "Rate changed since selection",
                user_message: "The price for your stay has changed. Please review the updated rate before continuing.",
                retryable: false,
                severity: Severity::Medium,
                actions: vec![
                    RecoveryAction::new(Refresh, "Review new price", 1),
                    RecoveryAction::redirect("Back to search", "/search", 2),
                ],
            },
            BookingErrorCode::InventoryInsufficient => Template {
                error_type: BookingErrorType::InventoryInsufficient,
                message: "Insufficient inventory",
                user_message: "There are not enough rooms available for your request. Try fewer rooms or different dates.",
                retryable: false,
                severity: Severity::High,
                actions: vec![
                    RecoveryAction::redirect("Change your search", "/search", 1),
                    RecoveryAction::new(ContactSupport, "Contact us", 2),
                ],
            },
            BookingErrorCode::Validation => Template {
                error_type: BookingErrorType::ValidationError,
                message: "Invalid input",
                user_message: "Please check the highlighted details and try again.",
                retryable: false,
                severity: Severity::Low,
                actions: Vec::new(),
            },
            BookingErrorCode::Network => Template {
                error_type: BookingErrorType::NetworkError,
                message: "Network request failed",
                user_message: "We could not reach our servers. Please check your connection and try again.",
                retryable: true,
                severity: Severity::Medium,
                actions: vec![RecoveryAction::new(Retry, "Try again", 1)],
            },
            BookingErrorCode::Api(_) | BookingErrorCode::System | BookingErrorCode::Unknown(_) => Template {
                error_type: BookingErrorType::SystemError,
                message: "Unexpected system error",
                user_message: "Something went wrong on our side. Please try again, or contact support if the problem persists.",
                retryable: true,
                severity: Severity::High,
                actions: vec![
                    RecoveryAction::new(Retry, "Try again", 1),
                    RecoveryAction::new(ContactSupport, "Contact us", 2),
                ],
            },
        }
    }
}

impl fmt::Display for BookingErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.code())
    }
}

struct Template {
    error_type: BookingErrorType,
    message: &'static str,
    user_message: &'static str,
    retryable: bool,
    severity: Severity,
    actions: Vec<RecoveryAction>,
}

/// Free-form details attached to an error (hold id, status code, ...).
pub type ErrorContext = BTreeMap<String, serde_json::Value>;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, thiserror::Error)]
#[error("{code}: {message}")]
pub struct BookingError {
    pub code: String,
    #[serde(rename = "type")]
    pub error_type: BookingErrorType,
    pub message: String,
    pub user_message: String,
    pub retryable: bool,
    pub severity: Severity,
    /// Ordered by priority.
    pub recovery_actions: Vec<RecoveryAction>,
    #[serde(default)]
    pub context: ErrorContext,
    pub timestamp: DateTime<Utc>,
}

impl BookingError {
    pub fn title(&self) -> &'static str {
        self.severity.title()
    }
}

/// Why a request never got an HTTP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NetworkFailure {
    Timeout,
    /// Connection refused, reset, or DNS failure.
    Transport(String),
    Other(String),
}

/// Turns failures into guest-facing errors and reports them.
pub struct BookingErrorHandler {
    clock: Arc<dyn Clock>,
    analytics: Arc<dyn AnalyticsSink>,
    retry_policy: RetryPolicy,
}

impl Default for BookingErrorHandler {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock), Arc::new(TracingAnalyticsSink))
    }
}

impl BookingErrorHandler {
    pub fn new(clock: Arc<dyn Clock>, analytics: Arc<dyn AnalyticsSink>) -> Self {
        Self {
            clock,
            analytics,
            retry_policy: RetryPolicy::default(),
        }
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    /// Build an error from the catalog. `custom_message` replaces the
    /// technical message only; the guest-facing text stays the catalog's.
    pub fn create_error(
        &self,
        code: BookingErrorCode,
        context: Option<ErrorContext>,
        custom_message: Option<&str>,
    ) -> BookingError {
        let template = code.template();
        let mut recovery_actions = template.actions;
        recovery_actions.sort_by_key(|a| a.priority);

        BookingError {
            code: code.code(),
            error_type: template.error_type,
            message: custom_message.unwrap_or(template.message).to_string(),
            user_message: template.user_message.to_string(),
            retryable: template.retryable,
            severity: template.severity,
            recovery_actions,
            context: context.unwrap_or_default(),
            timestamp: self.clock.now(),
        }
    }

    pub fn handle_api_error(&self, status: u16, context: Option<ErrorContext>) -> BookingError {
        let code = match status {
            408 | 504 => BookingErrorCode::NetworkTimeout,
            409 => BookingErrorCode::AvailabilityChanged,
            402 => BookingErrorCode::PaymentDeclined,
            401 | 403 => BookingErrorCode::SessionExpired,
            other => BookingErrorCode::Api(other),
        };
        let mut context = context.unwrap_or_default();
        context.insert("status".to_string(), serde_json::Value::from(status));
        self.create_error(code, Some(context), None)
    }

    pub fn handle_network_error(&self, failure: &NetworkFailure, context: Option<ErrorContext>) -> BookingError {
        match failure {
            NetworkFailure::Timeout => self.create_error(BookingErrorCode::NetworkTimeout, context, None),
            NetworkFailure::Transport(detail) => {
                self.create_error(BookingErrorCode::NetworkTimeout, context, Some(detail))
            }
            NetworkFailure::Other(detail) => self.create_error(BookingErrorCode::Network, context, Some(detail)),
        }
    }

    /// Retry silently only for transient, non-critical infrastructure errors.
    pub fn should_auto_retry(&self, error: &BookingError) -> bool {
        error.retryable
            && error.severity != Severity::Critical
            && matches!(
                error.error_type,
                BookingErrorType::NetworkError | BookingErrorType::SystemError
            )
    }

    pub async fn retry_operation<F, Fut, T, E>(&self, op: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: fmt::Display,
    {
        retry_operation(&self.retry_policy, op).await
    }

    /// Log the error and emit a `booking_error` analytics event. Never fails.
    pub fn log_error(&self, error: &BookingError) {
        let context = serde_json::to_string(&error.context).unwrap_or_default();
        match error.severity {
            Severity::Critical | Severity::High => error!(
                code = %error.code,
                error_type = error.error_type.as_str(),
                severity = error.severity.as_str(),
                retryable = error.retryable,
                context = %context,
                "booking error: {}", error.message
            ),
            Severity::Medium => warn!(
                code = %error.code,
                error_type = error.error_type.as_str(),
                severity = error.severity.as_str(),
                retryable = error.retryable,
                context = %context,
                "booking error: {}", error.message
            ),
            Severity::Low => info!(
                code = %error.code,
                error_type = error.error_type.as_str(),
                severity = error.severity.as_str(),
                context = %context,
                "booking error: {}", error.message
            ),
        }

        let event = BookingErrorEvent {
            code: error.code.clone(),
            error_type: error.error_type.as_str().to_string(),
            severity: error.severity.as_str().to_string(),
            retryable: error.retryable,
            timestamp: error.timestamp.timestamp(),
        };
        self.analytics.track(event.into_analytics());
    }
}
