//! Session room request handlers.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use optio_core::models::session::{SessionItemInput, SessionItemRecord};
use uuid::Uuid;

use crate::AppState;
use crate::error::AppResult;
use crate::middleware::auth::AuthenticatedUser;
use crate::models::{CreateSessionRequest, JoinSessionRequest, SessionResponse};

/// `POST /api/sessions`: open a session owned by the caller.
pub async fn create_session_handler(
    State(state): State<AppState>,
    axum::Extension(user): axum::Extension<AuthenticatedUser>,
    Json(body): Json<CreateSessionRequest>,
) -> AppResult<(StatusCode, Json<SessionResponse>)> {
    let (session, link) = state
        .sessions
        .create_session(&body.session_name, user.user_id)
        .await?;
    Ok((StatusCode::CREATED, Json(SessionResponse::new(session, link))))
}

/// `GET /api/sessions/code/{code}`: look up an active session by its code.
pub async fn get_session_handler(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> AppResult<Json<SessionResponse>> {
    let session = state.sessions.find_active_session(&code).await?;
    let link = state.sessions.invite_link(&session.session_code)?;
    Ok(Json(SessionResponse::new(session, link)))
}

/// `POST /api/sessions/join`: resolve an invite link to its active session.
pub async fn join_session_handler(
    State(state): State<AppState>,
    Json(body): Json<JoinSessionRequest>,
) -> AppResult<Json<SessionResponse>> {
    let session = state
        .sessions
        .find_session_by_invite_link(&body.invite_link)
        .await?;
    let link = state.sessions.invite_link(&session.session_code)?;
    Ok(Json(SessionResponse::new(session, link)))
}

/// `POST /api/sessions/{id}/end`: end a session. Creator only.
pub async fn end_session_handler(
    State(state): State<AppState>,
    axum::Extension(user): axum::Extension<AuthenticatedUser>,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    state.sessions.end_session(id, user.user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `POST /api/sessions/{id}/items`: add a custom item to an active session.
pub async fn add_item_handler(
    State(state): State<AppState>,
    axum::Extension(user): axum::Extension<AuthenticatedUser>,
    Path(id): Path<Uuid>,
    Json(body): Json<SessionItemInput>,
) -> AppResult<(StatusCode, Json<SessionItemRecord>)> {
    let item = state.sessions.add_item(id, user.user_id, body).await?;
    Ok((StatusCode::CREATED, Json(item)))
}
