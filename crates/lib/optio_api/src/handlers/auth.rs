//! Authentication request handlers.

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum_extra::extract::CookieJar;

use crate::AppState;
use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthenticatedUser;
use crate::middleware::client::ClientInfo;
use crate::models::{
    ChangePasswordRequest, LoginRequest, LogoutResponse, RegisterRequest, TokenResponse,
    UserResponse,
};
use crate::services::auth::IssuedTokens;
use crate::services::cookies::{REFRESH_COOKIE, clear_refresh_cookie, refresh_cookie};

/// Move the refresh token into its cookie and the rest into the body.
fn token_reply(state: &AppState, jar: CookieJar, tokens: IssuedTokens) -> (CookieJar, Json<TokenResponse>) {
    let jar = jar.add(refresh_cookie(
        &tokens.refresh_token,
        tokens.refresh_ttl,
        state.config.cookie_secure,
    ));
    let body = TokenResponse {
        access_token: tokens.access_token,
        token_type: "Bearer".to_string(),
        expires_in: tokens.access_ttl.num_seconds(),
        user: tokens.user.into(),
    };
    (jar, Json(body))
}

/// `POST /api/auth/register`: create an account and sign it in.
pub async fn register_handler(
    State(state): State<AppState>,
    ClientInfo(client): ClientInfo,
    jar: CookieJar,
    Json(body): Json<RegisterRequest>,
) -> AppResult<(StatusCode, CookieJar, Json<TokenResponse>)> {
    let tokens = state
        .auth
        .register(&body.username, &body.email, &body.password, &client)
        .await?;
    let (jar, body) = token_reply(&state, jar, tokens);
    Ok((StatusCode::CREATED, jar, body))
}

/// `POST /api/auth/login`: authenticate with username-or-email + password.
pub async fn login_handler(
    State(state): State<AppState>,
    ClientInfo(client): ClientInfo,
    jar: CookieJar,
    Json(body): Json<LoginRequest>,
) -> AppResult<(CookieJar, Json<TokenResponse>)> {
    let tokens = state
        .auth
        .login(&body.identifier, &body.password, &client)
        .await?;
    Ok(token_reply(&state, jar, tokens))
}

/// `POST /api/auth/refresh`: rotate the refresh cookie and mint a new access token.
pub async fn refresh_handler(
    State(state): State<AppState>,
    ClientInfo(client): ClientInfo,
    jar: CookieJar,
) -> AppResult<(CookieJar, Json<TokenResponse>)> {
    let presented = jar
        .get(REFRESH_COOKIE)
        .map(|c| c.value().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AppError::Unauthorized("Missing refresh token".into()))?;
    let tokens = state.auth.refresh(&presented, &client).await?;
    Ok(token_reply(&state, jar, tokens))
}

/// `POST /api/auth/logout`: revoke the refresh cookie, if any, and clear it.
pub async fn logout_handler(
    State(state): State<AppState>,
    jar: CookieJar,
) -> AppResult<(CookieJar, Json<LogoutResponse>)> {
    let presented = jar.get(REFRESH_COOKIE).map(|c| c.value().to_string());
    state.auth.logout(presented.as_deref().filter(|v| !v.is_empty())).await?;
    let jar = jar.add(clear_refresh_cookie(state.config.cookie_secure));
    Ok((jar, Json(LogoutResponse { success: true })))
}

/// `GET /api/auth/profile`: the authenticated user.
pub async fn profile_handler(
    State(state): State<AppState>,
    axum::Extension(user): axum::Extension<AuthenticatedUser>,
) -> AppResult<Json<UserResponse>> {
    let credential = state.auth.profile(user.user_id).await?;
    Ok(Json(credential.into()))
}

/// `POST /api/auth/password`: change password; signs out every device.
pub async fn change_password_handler(
    State(state): State<AppState>,
    axum::Extension(user): axum::Extension<AuthenticatedUser>,
    jar: CookieJar,
    Json(body): Json<ChangePasswordRequest>,
) -> AppResult<(StatusCode, CookieJar)> {
    state
        .auth
        .change_password(user.user_id, &body.current_password, &body.new_password)
        .await?;
    let jar = jar.add(clear_refresh_cookie(state.config.cookie_secure));
    Ok((StatusCode::NO_CONTENT, jar))
}
