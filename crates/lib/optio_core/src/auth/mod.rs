//! Authentication logic.
//!
//! Provides password hashing, access-token signing, refresh-token rotation
//! and credential checks shared by the HTTP layer.

pub mod config;
pub mod credentials;
pub mod jwt;
pub mod password;
pub mod queries;
pub mod refresh;

use thiserror::Error;

use crate::store::StoreError;

pub use config::AuthConfig;
pub use credentials::CredentialService;
pub use jwt::{SigningSecret, TokenSigner};
pub use password::PasswordHasher;
pub use refresh::RefreshTokenStore;

/// Why an access token was rejected.
///
/// Useful in logs and tests; clients only ever see "unauthorized".
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenError {
    #[error("invalid signature")]
    InvalidSignature,

    #[error("issuer or audience mismatch")]
    InvalidClaims,

    #[error("token expired")]
    Expired,

    #[error("token not valid yet")]
    NotYetValid,

    #[error("malformed token")]
    Malformed,
}

/// Authentication errors.
///
/// Messages never carry passwords, tokens, hashes or the signing secret.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Unauthorized token: {0}")]
    UnauthorizedToken(#[from] TokenError),

    #[error("Invalid refresh token")]
    InvalidRefreshToken,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),

    #[error("Internal error: {0}")]
    Internal(String),
}
