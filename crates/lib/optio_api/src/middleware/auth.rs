//! Authentication middleware: Bearer token extraction and JWT verification.

use axum::http::header::AUTHORIZATION;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use tracing::{Instrument, info_span};
use uuid::Uuid;

use crate::AppState;
use crate::error::AppError;

/// The verified caller, stored in request extensions for handlers.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user_id: Uuid,
    pub username: String,
    /// `jti` of the access token used.
    pub token_id: String,
}

/// Strip a case-insensitive `Bearer ` scheme.
fn bearer_token(header: &str) -> Option<&str> {
    let (scheme, token) = header.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

/// Axum middleware: extracts `Authorization: Bearer <token>`, verifies the JWT,
/// and injects `AuthenticatedUser` into request extensions. The rest of the
/// request runs inside a span naming the caller and the token it used.
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::Unauthorized("Missing authorization header".into()))?;

    let token = bearer_token(header)
        .ok_or_else(|| AppError::Unauthorized("Invalid authorization scheme".into()))?;

    let claims = state.auth.verify_access_token(token)?;

    let user = AuthenticatedUser {
        user_id: claims.user_id,
        username: claims.username,
        token_id: claims.jti,
    };
    let span = info_span!(
        "authenticated",
        user_id = %user.user_id,
        username = %user.username,
        token_id = %user.token_id,
    );
    request.extensions_mut().insert(user);

    Ok(next.run(request).instrument(span).await)
}
