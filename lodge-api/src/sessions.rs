use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use lodge_booking::{
    BookingErrorCode, BookingSession, NewSession, SessionError, SessionUpdate, SessionValidation, TimeoutWarning,
};
use lodge_catalog::BookingHold;
use crate::error::AppError;
use crate::holds::CreateHoldBody;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/sessions", post(create_session))
        .route(
            "/v1/sessions/{session_id}",
            get(get_session).patch(update_session).delete(clear_session),
        )
        .route("/v1/sessions/{session_id}/extend", post(extend_session))
        .route("/v1/sessions/{session_id}/holds", get(list_holds).post(create_hold))
        .route("/v1/sessions/{session_id}/holds/{hold_id}", delete(release_hold))
}

#[derive(Debug, Serialize)]
struct SessionResponse {
    session: BookingSession,
    timeout_warning: TimeoutWarning,
    validation: SessionValidation,
}

#[derive(Debug, Deserialize)]
struct ExtendBody {
    minutes: Option<i64>,
}

fn describe(state: &AppState, session: BookingSession) -> SessionResponse {
    SessionResponse {
        timeout_warning: state.sessions.get_timeout_warning(&session),
        validation: state.sessions.validate_session(&session),
        session,
    }
}

async fn create_session(
    State(state): State<AppState>,
    Json(body): Json<NewSession>,
) -> Result<(StatusCode, Json<SessionResponse>), AppError> {
    let session_id = Uuid::new_v4().to_string();
    let session = state
        .sessions
        .for_session(&session_id)
        .create_session(Some(session_id), body)
        .await
        .map_err(|e| AppError::from_session(&state.errors, e))?;
    Ok((StatusCode::CREATED, Json(describe(&state, session))))
}

async fn get_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<SessionResponse>, AppError> {
    let session = state
        .sessions
        .for_session(&session_id)
        .get_current_session()
        .await
        .map_err(|e| AppError::from_session(&state.errors, e))?
        .ok_or_else(|| AppError::NotFoundError(format!("Session not found: {}", session_id)))?;
    Ok(Json(describe(&state, session)))
}

async fn update_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(update): Json<SessionUpdate>,
) -> Result<Json<SessionResponse>, AppError> {
    let session = state
        .sessions
        .for_session(&session_id)
        .update_session(update)
        .await
        .map_err(|e| AppError::from_session(&state.errors, e))?;
    Ok(Json(describe(&state, session)))
}

async fn extend_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(body): Json<ExtendBody>,
) -> Result<Json<SessionResponse>, AppError> {
    let minutes = body.minutes;
    let sessions = state.sessions.for_session(&session_id);
    let extended = sessions
        .extend_session(minutes)
        .await
        .map_err(|e| AppError::from_session(&state.errors, e))?;
    if !extended {
        return Err(AppError::from_session(&state.errors, SessionError::NoActiveSession));
    }

    let session = sessions
        .get_current_session()
        .await
        .map_err(|e| AppError::from_session(&state.errors, e))?
        .ok_or_else(|| AppError::NotFoundError(format!("Session not found: {}", session_id)))?;
    Ok(Json(describe(&state, session)))
}

async fn clear_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<StatusCode, AppError> {
    state
        .sessions
        .for_session(&session_id)
        .clear_session()
        .await
        .map_err(|e| AppError::from_session(&state.errors, e))?;
    Ok(StatusCode::NO_CONTENT)
}

async fn list_holds(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<Vec<BookingHold>>, AppError> {
    let holds = state
        .sessions
        .for_session(&session_id)
        .get_active_holds()
        .await
        .map_err(|e| AppError::from_session(&state.errors, e))?;
    Ok(Json(holds))
}

async fn create_hold(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(body): Json<CreateHoldBody>,
) -> Result<(StatusCode, Json<BookingHold>), AppError> {
    let request = body.into_request(state.holds.default_ttl_minutes);
    let hold = state
        .sessions
        .for_session(&session_id)
        .create_hold(request)
        .await
        .map_err(|e| AppError::from_session(&state.errors, e))?
        .ok_or_else(|| {
            AppError::booking(
                &state.errors,
                StatusCode::CONFLICT,
                BookingErrorCode::InventoryInsufficient,
                None,
                None,
            )
        })?;
    Ok((StatusCode::CREATED, Json(hold)))
}

async fn release_hold(
    State(state): State<AppState>,
    Path((session_id, hold_id)): Path<(String, Uuid)>,
) -> Result<StatusCode, AppError> {
    let released = state
        .sessions
        .for_session(&session_id)
        .release_hold(hold_id)
        .await
        .map_err(|e| AppError::from_session(&state.errors, e))?;
    if !released {
        return Err(AppError::NotFoundError(format!("Hold not found: {}", hold_id)));
    }
    Ok(StatusCode::NO_CONTENT)
}
