//! Request and response bodies.

use chrono::{DateTime, Utc};
use optio_core::models::auth::Credential;
use optio_core::models::session::SessionRecord;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    /// Username or email.
    #[serde(alias = "username", alias = "email")]
    pub identifier: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

/// Public view of an account.
#[derive(Debug, Serialize, Deserialize)]
pub struct UserResponse {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

impl From<Credential> for UserResponse {
    fn from(c: Credential) -> Self {
        Self {
            id: c.id,
            username: c.username,
            email: c.email,
            created_at: c.created_at,
        }
    }
}

/// Access token plus the user it was issued to. The refresh token travels
/// only in its cookie.
#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    /// Access token lifetime in seconds.
    pub expires_in: i64,
    pub user: UserResponse,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LogoutResponse {
    pub success: bool,
}

#[derive(Debug, Deserialize)]
pub struct CreateSessionRequest {
    pub session_name: String,
}

#[derive(Debug, Deserialize)]
pub struct JoinSessionRequest {
    pub invite_link: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SessionResponse {
    pub id: Uuid,
    pub session_code: String,
    pub session_name: String,
    pub creator_user_id: Uuid,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub invite_link: String,
}

impl SessionResponse {
    pub fn new(session: SessionRecord, invite_link: String) -> Self {
        Self {
            id: session.id,
            session_code: session.session_code,
            session_name: session.session_name,
            creator_user_id: session.creator_user_id,
            is_active: session.is_active,
            created_at: session.created_at,
            invite_link,
        }
    }
}
