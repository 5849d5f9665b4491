use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use lodge_availability::AvailabilityError;
use lodge_booking::{BookingError, BookingErrorCode, BookingErrorHandler, ErrorContext, SessionError};
use lodge_catalog::RateError;

#[derive(Debug)]
pub enum AppError {
    NotFoundError(String),
    /// A failure the guest can act on; rendered from the error catalog.
    BookingError(StatusCode, BookingError),
    InternalServerError(String),
    Anyhow(anyhow::Error),
}

impl AppError {
    /// Build a catalog error, report it, and wrap it for the response.
    pub fn booking(
        errors: &BookingErrorHandler,
        status: StatusCode,
        code: BookingErrorCode,
        context: Option<ErrorContext>,
        message: Option<&str>,
    ) -> Self {
        let err = errors.create_error(code, context, message);
        errors.log_error(&err);
        AppError::BookingError(status, err)
    }

    pub fn from_availability(errors: &BookingErrorHandler, err: AvailabilityError) -> Self {
        match err {
            AvailabilityError::InvalidRequest(msg) => Self::booking(
                errors,
                StatusCode::BAD_REQUEST,
                BookingErrorCode::Validation,
                None,
                Some(msg.as_str()),
            ),
            AvailabilityError::RoomTypeNotFound(id) => AppError::NotFoundError(format!("Room type not found: {}", id)),
            AvailabilityError::InsufficientInventory { requested, available } => {
                let mut context = ErrorContext::new();
                context.insert("requested".to_string(), json!(requested));
                context.insert("available".to_string(), json!(available));
                Self::booking(
                    errors,
                    StatusCode::CONFLICT,
                    BookingErrorCode::InventoryInsufficient,
                    Some(context),
                    None,
                )
            }
            AvailabilityError::Restricted(msg) => Self::booking(
                errors,
                StatusCode::CONFLICT,
                BookingErrorCode::AvailabilityChanged,
                None,
                Some(msg.as_str()),
            ),
            err @ AvailabilityError::HoldContention(_) => Self::booking(
                errors,
                StatusCode::CONFLICT,
                BookingErrorCode::AvailabilityChanged,
                None,
                Some(err.to_string().as_str()),
            ),
            AvailabilityError::Store(e) => AppError::InternalServerError(e.to_string()),
        }
    }

    pub fn from_rate(errors: &BookingErrorHandler, err: RateError) -> Self {
        match err {
            RateError::InvalidInput(problems) => {
                let message = problems.join("; ");
                let mut context = ErrorContext::new();
                context.insert("errors".to_string(), json!(problems));
                Self::booking(
                    errors,
                    StatusCode::BAD_REQUEST,
                    BookingErrorCode::Validation,
                    Some(context),
                    Some(message.as_str()),
                )
            }
        }
    }

    pub fn from_session(errors: &BookingErrorHandler, err: SessionError) -> Self {
        match err {
            SessionError::NoActiveSession => {
                Self::booking(errors, StatusCode::GONE, BookingErrorCode::SessionExpired, None, None)
            }
            other => AppError::InternalServerError(other.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            AppError::NotFoundError(msg) => (StatusCode::NOT_FOUND, json!({ "error": msg })),
            AppError::BookingError(status, err) => {
                let body = json!({
                    "error": &err.user_message,
                    "title": err.title(),
                    "details": &err,
                });
                (status, body)
            }
            AppError::InternalServerError(msg) => {
                tracing::error!("Internal Server Error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, json!({ "error": "Internal Server Error" }))
            }
            AppError::Anyhow(err) => {
                tracing::error!("Internal Server Error: {}", err);
                (StatusCode::INTERNAL_SERVER_ERROR, json!({ "error": "Internal Server Error" }))
            }
        };

        (status, Json(body)).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self::Anyhow(err.into())
    }
}
