//! Route paths.

pub const GET_HEALTH: &str = "/health";

pub const POST_AUTH_REGISTER: &str = "/api/auth/register";
pub const POST_AUTH_LOGIN: &str = "/api/auth/login";
pub const POST_AUTH_REFRESH: &str = "/api/auth/refresh";
pub const POST_AUTH_LOGOUT: &str = "/api/auth/logout";
pub const GET_AUTH_PROFILE: &str = "/api/auth/profile";
pub const POST_AUTH_PASSWORD: &str = "/api/auth/password";

pub const POST_SESSIONS: &str = "/api/sessions";
pub const POST_SESSIONS_JOIN: &str = "/api/sessions/join";
pub const GET_SESSIONS_CODE: &str = "/api/sessions/code/{code}";
pub const POST_SESSIONS_ID_END: &str = "/api/sessions/{id}/end";
pub const POST_SESSIONS_ID_ITEMS: &str = "/api/sessions/{id}/items";

/// Path scope of the refresh cookie; the browser sends it only to auth routes.
pub const AUTH_SCOPE: &str = "/api/auth";
