//! PostgreSQL storage backed by the query modules.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::{CredentialStore, RefreshTokenRepository, SessionStore, StoreResult};
use crate::auth::queries as auth_q;
use crate::models::auth::{Credential, NewCredential, NewRefreshToken, RefreshTokenRecord};
use crate::models::session::{NewSession, NewSessionItem, SessionItemRecord, SessionRecord};
use crate::sessions::queries as session_q;

/// Storage over a PostgreSQL pool. Cheap to clone.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl CredentialStore for PgStore {
    async fn find_credential_by_identifier(
        &self,
        identifier: &str,
    ) -> StoreResult<Option<Credential>> {
        auth_q::find_credential_by_identifier(&self.pool, identifier).await
    }

    async fn find_credential_by_id(&self, user_id: Uuid) -> StoreResult<Option<Credential>> {
        auth_q::find_credential_by_id(&self.pool, user_id).await
    }

    async fn credential_exists(&self, username: &str, email: &str) -> StoreResult<bool> {
        auth_q::credential_exists(&self.pool, username, email).await
    }

    async fn insert_credential(&self, new: &NewCredential) -> StoreResult<Credential> {
        auth_q::insert_credential(&self.pool, new).await
    }

    async fn update_password_hash(
        &self,
        user_id: Uuid,
        password_hash: &str,
        changed_at: DateTime<Utc>,
    ) -> StoreResult<bool> {
        auth_q::update_password_hash(&self.pool, user_id, password_hash, changed_at).await
    }
}

#[async_trait]
impl RefreshTokenRepository for PgStore {
    async fn find_active_refresh_token_by_hash(
        &self,
        token_hash: &str,
    ) -> StoreResult<Option<RefreshTokenRecord>> {
        auth_q::find_active_refresh_token_by_hash(&self.pool, token_hash).await
    }

    async fn insert_refresh_token(&self, token: &NewRefreshToken) -> StoreResult<Uuid> {
        auth_q::insert_refresh_token(&self.pool, token).await
    }

    async fn revoke_refresh_token_by_id(&self, id: Uuid) -> StoreResult<()> {
        auth_q::revoke_refresh_token_by_id(&self.pool, id).await
    }

    async fn replace_refresh_token(
        &self,
        old_id: Uuid,
        token: &NewRefreshToken,
    ) -> StoreResult<Option<Uuid>> {
        auth_q::replace_refresh_token(&self.pool, old_id, token).await
    }

    async fn revoke_all_refresh_tokens(&self, user_id: Uuid) -> StoreResult<u64> {
        auth_q::revoke_all_refresh_tokens(&self.pool, user_id).await
    }
}

#[async_trait]
impl SessionStore for PgStore {
    async fn session_code_is_active(&self, code: &str) -> StoreResult<bool> {
        session_q::session_code_is_active(&self.pool, code).await
    }

    async fn insert_session(&self, new: &NewSession) -> StoreResult<SessionRecord> {
        session_q::insert_session(&self.pool, new).await
    }

    async fn find_active_session_by_code(&self, code: &str) -> StoreResult<Option<SessionRecord>> {
        session_q::find_active_session_by_code(&self.pool, code).await
    }

    async fn end_session(&self, session_id: Uuid, creator_id: Uuid) -> StoreResult<bool> {
        session_q::end_session(&self.pool, session_id, creator_id).await
    }

    async fn find_active_session_by_id(
        &self,
        session_id: Uuid,
    ) -> StoreResult<Option<SessionRecord>> {
        session_q::find_active_session_by_id(&self.pool, session_id).await
    }

    async fn insert_session_item(&self, item: &NewSessionItem) -> StoreResult<SessionItemRecord> {
        session_q::insert_session_item(&self.pool, item).await
    }
}
