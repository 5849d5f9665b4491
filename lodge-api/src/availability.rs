use axum::{extract::State, routing::post, Json, Router};
use lodge_availability::AvailabilityResult;
use lodge_core::AvailabilityQuery;
use crate::error::AppError;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route("/v1/availability", post(check_availability))
}

async fn check_availability(
    State(state): State<AppState>,
    Json(query): Json<AvailabilityQuery>,
) -> Result<Json<AvailabilityResult>, AppError> {
    let result = state
        .availability
        .check_availability(&query)
        .await
        .map_err(|e| AppError::from_availability(&state.errors, e))?;
    Ok(Json(result))
}
