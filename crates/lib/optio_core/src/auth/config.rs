//! Token lifetimes and identity strings.

use std::time::Duration as StdDuration;

use chrono::Duration;

use super::AuthError;

/// Access token lifetime: 15 minutes.
pub const DEFAULT_ACCESS_TOKEN_TTL_SECS: i64 = 15 * 60;

/// Refresh token lifetime: 30 days.
pub const DEFAULT_REFRESH_TOKEN_TTL_DAYS: i64 = 30;

/// Clock-skew tolerance applied to `exp` and `nbf`.
pub const DEFAULT_LEEWAY_SECS: i64 = 60;

/// Longest accepted access token lifetime.
pub const MAX_ACCESS_TOKEN_TTL_SECS: i64 = 24 * 60 * 60;

/// Longest accepted refresh token lifetime.
pub const MAX_REFRESH_TOKEN_TTL_DAYS: i64 = 365;

/// Largest accepted clock-skew tolerance.
pub const MAX_LEEWAY_SECS: i64 = 60 * 60;

/// Upper bound for any single storage call.
pub const DEFAULT_STORAGE_TIMEOUT: StdDuration = StdDuration::from_secs(5);

pub const DEFAULT_ISSUER: &str = "optio";
pub const DEFAULT_AUDIENCE: &str = "optio-api";

/// Settings for token issuance and storage access.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub issuer: String,
    pub audience: String,
    pub access_token_ttl: Duration,
    pub refresh_token_ttl: Duration,
    pub leeway: Duration,
    pub storage_timeout: StdDuration,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            issuer: DEFAULT_ISSUER.to_string(),
            audience: DEFAULT_AUDIENCE.to_string(),
            access_token_ttl: Duration::seconds(DEFAULT_ACCESS_TOKEN_TTL_SECS),
            refresh_token_ttl: Duration::days(DEFAULT_REFRESH_TOKEN_TTL_DAYS),
            leeway: Duration::seconds(DEFAULT_LEEWAY_SECS),
            storage_timeout: DEFAULT_STORAGE_TIMEOUT,
        }
    }
}

impl AuthConfig {
    /// Reject settings that would mint already-dead or effectively
    /// immortal tokens.
    pub fn validate(&self) -> Result<(), AuthError> {
        if self.access_token_ttl <= Duration::zero() {
            return Err(AuthError::Validation(
                "access token TTL must be positive".into(),
            ));
        }
        if self.access_token_ttl > Duration::seconds(MAX_ACCESS_TOKEN_TTL_SECS) {
            return Err(AuthError::Validation(format!(
                "access token TTL must not exceed {MAX_ACCESS_TOKEN_TTL_SECS} seconds"
            )));
        }
        if self.refresh_token_ttl <= Duration::zero() {
            return Err(AuthError::Validation(
                "refresh token TTL must be positive".into(),
            ));
        }
        if self.refresh_token_ttl > Duration::days(MAX_REFRESH_TOKEN_TTL_DAYS) {
            return Err(AuthError::Validation(format!(
                "refresh token TTL must not exceed {MAX_REFRESH_TOKEN_TTL_DAYS} days"
            )));
        }
        if self.leeway < Duration::zero() {
            return Err(AuthError::Validation("leeway must not be negative".into()));
        }
        if self.leeway > Duration::seconds(MAX_LEEWAY_SECS) {
            return Err(AuthError::Validation(format!(
                "leeway must not exceed {MAX_LEEWAY_SECS} seconds"
            )));
        }
        if self.issuer.is_empty() || self.audience.is_empty() {
            return Err(AuthError::Validation(
                "issuer and audience are required".into(),
            ));
        }
        if self.storage_timeout.is_zero() {
            return Err(AuthError::Validation(
                "storage timeout must be positive".into(),
            ));
        }
        Ok(())
    }
}
