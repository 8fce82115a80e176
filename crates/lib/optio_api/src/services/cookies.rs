//! Cookie service: set/clear the httpOnly refresh cookie.

use axum_extra::extract::cookie::{Cookie, SameSite};
use time::Duration;

use crate::routes::AUTH_SCOPE;

/// Cookie name for the refresh token.
pub const REFRESH_COOKIE: &str = "optio_refresh";

/// Build a httpOnly cookie carrying the refresh token.
pub fn refresh_cookie(token: &str, ttl: chrono::Duration, secure: bool) -> Cookie<'static> {
    Cookie::build((REFRESH_COOKIE.to_string(), token.to_string()))
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .path(AUTH_SCOPE)
        .max_age(Duration::seconds(ttl.num_seconds()))
        .build()
}

/// Build an expired cookie to clear the refresh token.
pub fn clear_refresh_cookie(secure: bool) -> Cookie<'static> {
    Cookie::build((REFRESH_COOKIE.to_string(), String::new()))
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .path(AUTH_SCOPE)
        .max_age(Duration::ZERO)
        .build()
}
