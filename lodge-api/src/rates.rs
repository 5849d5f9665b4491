use axum::{extract::State, routing::post, Json, Router};
use lodge_catalog::{RateBreakdown, RateCalculationInput};
use crate::error::AppError;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route("/v1/rates/quote", post(quote_rate))
}

async fn quote_rate(
    State(state): State<AppState>,
    Json(input): Json<RateCalculationInput>,
) -> Result<Json<RateBreakdown>, AppError> {
    let breakdown = state
        .rates
        .calculate_rate(&input)
        .map_err(|e| AppError::from_rate(&state.errors, e))?;

    tracing::debug!(
        hotel_id = %input.hotel_id,
        room_type_id = %input.room_type_id,
        total = breakdown.total_amount,
        "rate quoted"
    );
    Ok(Json(breakdown))
}
