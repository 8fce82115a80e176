//! API server configuration.

use optio_core::auth::{AuthConfig, SigningSecret};
use optio_core::auth::password::BCRYPT_COST;

/// Configuration for the API server.
#[derive(Clone, Debug)]
pub struct ApiConfig {
    /// Address to bind the HTTP listener (e.g. "127.0.0.1:3100").
    pub bind_addr: String,
    /// JWT signing secret.
    pub jwt_secret: SigningSecret,
    /// Token lifetimes, issuer/audience and storage timeout.
    pub auth: AuthConfig,
    /// Base URL for session invite links; `?code=` is appended.
    pub invite_url: Option<String>,
    /// Mark the refresh cookie `Secure` (HTTPS only).
    pub cookie_secure: bool,
    pub bcrypt_cost: u32,
}

impl ApiConfig {
    /// Defaults around a signing secret.
    pub fn new(jwt_secret: SigningSecret) -> Self {
        Self {
            bind_addr: "127.0.0.1:3100".into(),
            jwt_secret,
            auth: AuthConfig::default(),
            invite_url: None,
            cookie_secure: false,
            bcrypt_cost: BCRYPT_COST,
        }
    }
}
