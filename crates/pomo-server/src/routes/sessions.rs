use axum::extract::rejection::JsonRejection;
use axum::extract::{Extension, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use pomo_core::session::{IdempotencyKey, NewSession, Session, SessionSummary};
use pomo_core::{Listing, OwnerId};

use crate::error::AppError;
use crate::state::{AppState, ChangeKind};

pub const IDEMPOTENCY_HEADER: &str = "idempotency-key";

fn idempotency_key(headers: &HeaderMap) -> Result<Option<IdempotencyKey>, AppError> {
    let Some(value) = headers.get(IDEMPOTENCY_HEADER) else {
        return Ok(None);
    };
    let raw = value
        .to_str()
        .map_err(|_| AppError::bad_request("Idempotency-Key must be printable ASCII"))?;
    Ok(Some(IdempotencyKey::new(raw)?))
}

/// POST /api/v1/sessions: record a completed interval.
///
/// 201 for a new session; 200 with the original session when the
/// `Idempotency-Key` was already used by this owner.
pub async fn record_session(
    State(app): State<AppState>,
    Extension(owner): Extension<OwnerId>,
    headers: HeaderMap,
    body: Result<Json<NewSession>, JsonRejection>,
) -> Result<(StatusCode, Json<Session>), AppError> {
    let Json(body) = body?;
    let key = idempotency_key(&headers)?;
    let store = app.store.clone();
    let who = owner.clone();
    let recorded =
        tokio::task::spawn_blocking(move || store.record_session(&who, &body, key.as_ref()))
            .await
            .map_err(AppError::join)??;

    if recorded.replayed {
        return Ok((StatusCode::OK, Json(recorded.session)));
    }
    app.notify(&owner, ChangeKind::Sessions);
    Ok((StatusCode::CREATED, Json(recorded.session)))
}

/// GET /api/v1/sessions: newest first.
pub async fn session_history(
    State(app): State<AppState>,
    Extension(owner): Extension<OwnerId>,
) -> Result<Json<Listing<Session>>, AppError> {
    let store = app.store.clone();
    let sessions = tokio::task::spawn_blocking(move || store.session_history(&owner))
        .await
        .map_err(AppError::join)??;
    Ok(Json(Listing::from(sessions)))
}

/// GET /api/v1/sessions/summary
pub async fn session_summary(
    State(app): State<AppState>,
    Extension(owner): Extension<OwnerId>,
) -> Result<Json<SessionSummary>, AppError> {
    let store = app.store.clone();
    let summary = tokio::task::spawn_blocking(move || store.session_summary(&owner))
        .await
        .map_err(AppError::join)??;
    Ok(Json(summary))
}
