use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use lodge_booking::BookingErrorCode;
use lodge_catalog::{BookingHold, HoldRequest, HoldStatus};
use crate::error::AppError;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/holds", post(create_hold))
        .route("/v1/holds/{id}", get(get_hold).delete(release_hold))
        .route("/v1/holds/{id}/convert", post(convert_hold))
}

#[derive(Debug, Deserialize)]
pub struct CreateHoldBody {
    pub room_type_id: String,
    pub check_in_date: NaiveDate,
    pub check_out_date: NaiveDate,
    pub room_count: i32,
    pub expires_in_minutes: Option<i64>,
}

impl CreateHoldBody {
    pub fn into_request(self, default_ttl_minutes: i64) -> HoldRequest {
        HoldRequest {
            room_type_id: self.room_type_id,
            check_in_date: self.check_in_date,
            check_out_date: self.check_out_date,
            room_count: self.room_count,
            expires_in_minutes: self.expires_in_minutes.unwrap_or(default_ttl_minutes),
        }
    }
}

#[derive(Debug, Serialize)]
struct ReleaseResponse {
    hold_id: Uuid,
    released: bool,
}

#[derive(Debug, Deserialize)]
struct ConvertBody {
    booking_id: String,
}

async fn create_hold(
    State(state): State<AppState>,
    Json(body): Json<CreateHoldBody>,
) -> Result<(StatusCode, Json<BookingHold>), AppError> {
    let request = body.into_request(state.holds.default_ttl_minutes);
    let hold = state
        .availability
        .try_create_booking_hold(request)
        .await
        .map_err(|e| AppError::from_availability(&state.errors, e))?;
    Ok((StatusCode::CREATED, Json(hold)))
}

async fn get_hold(
    State(state): State<AppState>,
    Path(hold_id): Path<Uuid>,
) -> Result<Json<BookingHold>, AppError> {
    let hold = state
        .availability
        .get_hold(hold_id)
        .await
        .map_err(|e| AppError::from_availability(&state.errors, e))?
        .ok_or_else(|| AppError::NotFoundError(format!("Hold not found: {}", hold_id)))?;
    Ok(Json(hold))
}

async fn release_hold(
    State(state): State<AppState>,
    Path(hold_id): Path<Uuid>,
) -> Result<Json<ReleaseResponse>, AppError> {
    if !state.availability.release_booking_hold(hold_id).await {
        return Err(AppError::NotFoundError(format!("Hold not found: {}", hold_id)));
    }
    Ok(Json(ReleaseResponse { hold_id, released: true }))
}

async fn convert_hold(
    State(state): State<AppState>,
    Path(hold_id): Path<Uuid>,
    Json(body): Json<ConvertBody>,
) -> Result<Json<BookingHold>, AppError> {
    if body.booking_id.trim().is_empty() {
        return Err(AppError::booking(
            &state.errors,
            StatusCode::BAD_REQUEST,
            BookingErrorCode::Validation,
            None,
            Some("booking_id is required"),
        ));
    }

    let converted = state
        .availability
        .convert_hold_to_booking(hold_id, &body.booking_id)
        .await;

    let hold = state
        .availability
        .get_hold(hold_id)
        .await
        .map_err(|e| AppError::from_availability(&state.errors, e))?
        .ok_or_else(|| AppError::NotFoundError(format!("Hold not found: {}", hold_id)))?;

    if !converted {
        // a lapsed lease means the guest has to pick the room again
        let code = match hold.status {
            HoldStatus::Expired => BookingErrorCode::SessionExpired,
            _ => BookingErrorCode::AvailabilityChanged,
        };
        return Err(AppError::booking(
            &state.errors,
            StatusCode::CONFLICT,
            code,
            None,
            Some(format!("hold {} is {}", hold_id, hold.status.as_str()).as_str()),
        ));
    }
    Ok(Json(hold))
}
