//! Storage collaborator contract.
//!
//! The services in this crate talk to storage only through these traits.
//! Every check-then-insert they perform is backed by a uniqueness constraint
//! in the implementation; a constraint violation comes back as
//! [`StoreError::Conflict`] and the caller decides what it means.

pub mod memory;
pub mod postgres;

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::models::auth::{Credential, NewCredential, NewRefreshToken, RefreshTokenRecord};
use crate::models::session::{NewSession, NewSessionItem, SessionItemRecord, SessionRecord};

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Storage errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A uniqueness constraint rejected the write.
    #[error("Uniqueness conflict on {0}")]
    Conflict(String),

    #[error("Storage call timed out after {0:?}")]
    Timeout(Duration),

    #[error("Database error: {0}")]
    Database(sqlx::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        if let Some(db) = e.as_database_error()
            && db.is_unique_violation()
        {
            let constraint = db.constraint().unwrap_or("unique").to_string();
            return StoreError::Conflict(constraint);
        }
        StoreError::Database(e)
    }
}

/// Result type for storage operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Run a storage call under a deadline.
///
/// A call that does not finish in time is dropped; implementations keep
/// multi-statement writes inside one transaction so a dropped call leaves
/// nothing half-applied.
pub async fn bounded<T, F>(limit: Duration, fut: F) -> StoreResult<T>
where
    F: Future<Output = StoreResult<T>>,
{
    tokio::time::timeout(limit, fut)
        .await
        .map_err(|_| StoreError::Timeout(limit))?
}

/// User credential storage.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Look up by username or email in a single query.
    async fn find_credential_by_identifier(
        &self,
        identifier: &str,
    ) -> StoreResult<Option<Credential>>;

    async fn find_credential_by_id(&self, user_id: Uuid) -> StoreResult<Option<Credential>>;

    /// Whether either value is already taken as a username or an email.
    async fn credential_exists(&self, username: &str, email: &str) -> StoreResult<bool>;

    /// Insert a credential. `Conflict` if the username or email is taken.
    async fn insert_credential(&self, new: &NewCredential) -> StoreResult<Credential>;

    /// Replace the password hash and set `password_changed_at`.
    /// Returns false when the user does not exist.
    async fn update_password_hash(
        &self,
        user_id: Uuid,
        password_hash: &str,
        changed_at: DateTime<Utc>,
    ) -> StoreResult<bool>;
}

/// Refresh token storage.
#[async_trait]
pub trait RefreshTokenRepository: Send + Sync {
    /// Find the non-revoked, non-expired row with this hash.
    async fn find_active_refresh_token_by_hash(
        &self,
        token_hash: &str,
    ) -> StoreResult<Option<RefreshTokenRecord>>;

    async fn insert_refresh_token(&self, token: &NewRefreshToken) -> StoreResult<Uuid>;

    /// Mark revoked. Revoking an already revoked or unknown row is a no-op.
    async fn revoke_refresh_token_by_id(&self, id: Uuid) -> StoreResult<()>;

    /// Atomically revoke `old_id` and insert `token`.
    ///
    /// Returns `None`, inserting nothing, if `old_id` was no longer active.
    async fn replace_refresh_token(
        &self,
        old_id: Uuid,
        token: &NewRefreshToken,
    ) -> StoreResult<Option<Uuid>>;

    /// Revoke every active token of a user. Returns how many were revoked.
    async fn revoke_all_refresh_tokens(&self, user_id: Uuid) -> StoreResult<u64>;
}

/// Session room storage.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn session_code_is_active(&self, code: &str) -> StoreResult<bool>;

    /// Insert a session. `Conflict` if the code is held by an active session.
    async fn insert_session(&self, new: &NewSession) -> StoreResult<SessionRecord>;

    async fn find_active_session_by_code(&self, code: &str) -> StoreResult<Option<SessionRecord>>;

    /// End an active session owned by `creator_id`. False if nothing matched.
    async fn end_session(&self, session_id: Uuid, creator_id: Uuid) -> StoreResult<bool>;

    async fn find_active_session_by_id(
        &self,
        session_id: Uuid,
    ) -> StoreResult<Option<SessionRecord>>;

    async fn insert_session_item(&self, item: &NewSessionItem) -> StoreResult<SessionItemRecord>;
}

/// Everything the application needs from storage.
pub trait Store: CredentialStore + RefreshTokenRepository + SessionStore {}

impl<T> Store for T where T: CredentialStore + RefreshTokenRepository + SessionStore {}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn bounded_passes_through_results() {
        let ok = bounded(Duration::from_secs(1), async { Ok::<_, StoreError>(7) }).await;
        assert_eq!(ok.unwrap(), 7);
    }

    #[tokio::test]
    async fn bounded_times_out_slow_calls() {
        let res = bounded(Duration::from_millis(10), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok::<_, StoreError>(())
        })
        .await;
        assert!(matches!(res, Err(StoreError::Timeout(_))));
    }

    #[test]
    fn row_not_found_is_a_database_error() {
        let err = StoreError::from(sqlx::Error::RowNotFound);
        assert!(matches!(err, StoreError::Database(_)));
    }
}
