//! In-process storage.
//!
//! Enforces the same uniqueness rules as the PostgreSQL schema so services
//! behave identically against it. Used by tests and the server's
//! `--in-memory` mode.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{CredentialStore, RefreshTokenRepository, SessionStore, StoreError, StoreResult};
use crate::models::auth::{Credential, NewCredential, NewRefreshToken, RefreshTokenRecord};
use crate::models::session::{NewSession, NewSessionItem, SessionItemRecord, SessionRecord};

#[derive(Debug, Default)]
struct State {
    users: HashMap<Uuid, Credential>,
    refresh_tokens: HashMap<Uuid, RefreshTokenRecord>,
    sessions: HashMap<Uuid, SessionRecord>,
    session_items: Vec<SessionItemRecord>,
}

impl State {
    fn has_live_hash(&self, token_hash: &str) -> bool {
        self.refresh_tokens
            .values()
            .any(|t| t.token_hash == token_hash && !t.is_revoked())
    }

    fn insert_refresh_token(&mut self, token: &NewRefreshToken) -> StoreResult<Uuid> {
        if self.has_live_hash(&token.token_hash) {
            return Err(StoreError::Conflict("refresh_tokens_active_hash_idx".into()));
        }
        self.refresh_tokens.insert(
            token.id,
            RefreshTokenRecord {
                id: token.id,
                user_id: token.user_id,
                token_hash: token.token_hash.clone(),
                issued_at: token.issued_at,
                expires_at: token.expires_at,
                user_agent: token.user_agent.clone(),
                ip: token.ip.clone(),
                revoked_at: None,
            },
        );
        Ok(token.id)
    }
}

/// Mutex-guarded maps standing in for the relational tables.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// All refresh token rows of a user, revoked ones included.
    pub async fn refresh_tokens_for(&self, user_id: Uuid) -> Vec<RefreshTokenRecord> {
        let state = self.state.lock().await;
        state
            .refresh_tokens
            .values()
            .filter(|t| t.user_id == user_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl CredentialStore for MemoryStore {
    async fn find_credential_by_identifier(
        &self,
        identifier: &str,
    ) -> StoreResult<Option<Credential>> {
        let state = self.state.lock().await;
        Ok(state
            .users
            .values()
            .find(|u| u.username == identifier || u.email == identifier)
            .cloned())
    }

    async fn find_credential_by_id(&self, user_id: Uuid) -> StoreResult<Option<Credential>> {
        Ok(self.state.lock().await.users.get(&user_id).cloned())
    }

    async fn credential_exists(&self, username: &str, email: &str) -> StoreResult<bool> {
        let state = self.state.lock().await;
        Ok(state
            .users
            .values()
            .any(|u| {
                [username, email].contains(&u.username.as_str())
                    || [username, email].contains(&u.email.as_str())
            }))
    }

    async fn insert_credential(&self, new: &NewCredential) -> StoreResult<Credential> {
        let mut state = self.state.lock().await;
        if state
            .users
            .values()
            .any(|u| u.username == new.username || u.email == new.username)
        {
            return Err(StoreError::Conflict("users_username_key".into()));
        }
        if state
            .users
            .values()
            .any(|u| u.email == new.email || u.username == new.email)
        {
            return Err(StoreError::Conflict("users_email_key".into()));
        }
        let now = Utc::now();
        let credential = Credential {
            id: Uuid::new_v4(),
            username: new.username.clone(),
            email: new.email.clone(),
            password_hash: new.password_hash.clone(),
            created_at: now,
            password_changed_at: None,
        };
        state.users.insert(credential.id, credential.clone());
        Ok(credential)
    }

    async fn update_password_hash(
        &self,
        user_id: Uuid,
        password_hash: &str,
        changed_at: DateTime<Utc>,
    ) -> StoreResult<bool> {
        let mut state = self.state.lock().await;
        match state.users.get_mut(&user_id) {
            Some(user) => {
                user.password_hash = password_hash.to_string();
                user.password_changed_at = Some(changed_at);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[async_trait]
impl RefreshTokenRepository for MemoryStore {
    async fn find_active_refresh_token_by_hash(
        &self,
        token_hash: &str,
    ) -> StoreResult<Option<RefreshTokenRecord>> {
        let now = Utc::now();
        let state = self.state.lock().await;
        Ok(state
            .refresh_tokens
            .values()
            .find(|t| t.token_hash == token_hash && t.is_active_at(now))
            .cloned())
    }

    async fn insert_refresh_token(&self, token: &NewRefreshToken) -> StoreResult<Uuid> {
        self.state.lock().await.insert_refresh_token(token)
    }

    async fn revoke_refresh_token_by_id(&self, id: Uuid) -> StoreResult<()> {
        let mut state = self.state.lock().await;
        if let Some(token) = state.refresh_tokens.get_mut(&id)
            && token.revoked_at.is_none()
        {
            token.revoked_at = Some(Utc::now());
        }
        Ok(())
    }

    async fn replace_refresh_token(
        &self,
        old_id: Uuid,
        token: &NewRefreshToken,
    ) -> StoreResult<Option<Uuid>> {
        let now = Utc::now();
        let mut state = self.state.lock().await;

        let active = state
            .refresh_tokens
            .get(&old_id)
            .is_some_and(|t| t.is_active_at(now));
        if !active {
            return Ok(None);
        }
        // Insert first so a conflict leaves the old row untouched.
        let id = state.insert_refresh_token(token)?;
        if let Some(old) = state.refresh_tokens.get_mut(&old_id) {
            old.revoked_at = Some(now);
        }
        Ok(Some(id))
    }

    async fn revoke_all_refresh_tokens(&self, user_id: Uuid) -> StoreResult<u64> {
        let now = Utc::now();
        let mut state = self.state.lock().await;
        let mut revoked = 0;
        for token in state.refresh_tokens.values_mut() {
            if token.user_id == user_id && token.revoked_at.is_none() {
                token.revoked_at = Some(now);
                revoked += 1;
            }
        }
        Ok(revoked)
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn session_code_is_active(&self, code: &str) -> StoreResult<bool> {
        let state = self.state.lock().await;
        Ok(state
            .sessions
            .values()
            .any(|s| s.is_active && s.session_code == code))
    }

    async fn insert_session(&self, new: &NewSession) -> StoreResult<SessionRecord> {
        let mut state = self.state.lock().await;
        if state
            .sessions
            .values()
            .any(|s| s.is_active && s.session_code == new.session_code)
        {
            return Err(StoreError::Conflict("sessions_active_code_idx".into()));
        }
        let record = SessionRecord {
            id: new.id,
            session_code: new.session_code.clone(),
            session_name: new.session_name.clone(),
            creator_user_id: new.creator_user_id,
            is_active: true,
            created_at: Utc::now(),
            ended_at: None,
        };
        state.sessions.insert(record.id, record.clone());
        Ok(record)
    }

    async fn find_active_session_by_code(&self, code: &str) -> StoreResult<Option<SessionRecord>> {
        let state = self.state.lock().await;
        Ok(state
            .sessions
            .values()
            .find(|s| s.is_active && s.session_code == code)
            .cloned())
    }

    async fn end_session(&self, session_id: Uuid, creator_id: Uuid) -> StoreResult<bool> {
        let mut state = self.state.lock().await;
        match state.sessions.get_mut(&session_id) {
            Some(s) if s.is_active && s.creator_user_id == creator_id => {
                s.is_active = false;
                s.ended_at = Some(Utc::now());
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn find_active_session_by_id(
        &self,
        session_id: Uuid,
    ) -> StoreResult<Option<SessionRecord>> {
        let state = self.state.lock().await;
        Ok(state
            .sessions
            .get(&session_id)
            .filter(|s| s.is_active)
            .cloned())
    }

    async fn insert_session_item(&self, item: &NewSessionItem) -> StoreResult<SessionItemRecord> {
        let mut state = self.state.lock().await;
        let record = SessionItemRecord {
            id: item.id,
            session_id: item.session_id,
            item_title: item.item_title.clone(),
            item_description: item.item_description.clone(),
            image_url: item.image_url.clone(),
            source_type: item.source_type.as_str().to_string(),
            source_id: None,
            metadata: item.metadata.clone(),
            added_by_user_id: item.added_by_user_id,
            created_at: Utc::now(),
        };
        state.session_items.push(record.clone());
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::uuid::uuidv7;

    fn new_credential(username: &str, email: &str) -> NewCredential {
        NewCredential {
            username: username.into(),
            email: email.into(),
            password_hash: "hash".into(),
        }
    }

    fn new_token(user_id: Uuid, hash: &str) -> NewRefreshToken {
        let now = Utc::now();
        NewRefreshToken {
            id: uuidv7(),
            user_id,
            token_hash: hash.into(),
            issued_at: now,
            expires_at: now + chrono::Duration::hours(1),
            user_agent: None,
            ip: None,
        }
    }

    #[tokio::test]
    async fn duplicate_email_is_a_conflict() {
        let store = MemoryStore::new();
        store
            .insert_credential(&new_credential("alice", "a@x.com"))
            .await
            .unwrap();
        let err = store
            .insert_credential(&new_credential("bob", "a@x.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(c) if c == "users_email_key"));
    }

    #[tokio::test]
    async fn identifiers_are_unique_across_columns() {
        let store = MemoryStore::new();
        store
            .insert_credential(&new_credential("alice", "a@x.com"))
            .await
            .unwrap();

        assert!(store.credential_exists("a@x.com", "b@x.com").await.unwrap());
        assert!(store.credential_exists("bob", "alice").await.unwrap());
        assert!(!store.credential_exists("bob", "b@x.com").await.unwrap());

        let err = store
            .insert_credential(&new_credential("a@x.com", "b@x.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(c) if c == "users_username_key"));
    }

    #[tokio::test]
    async fn identifier_matches_username_or_email() {
        let store = MemoryStore::new();
        let cred = store
            .insert_credential(&new_credential("alice", "a@x.com"))
            .await
            .unwrap();
        let by_name = store.find_credential_by_identifier("alice").await.unwrap();
        let by_mail = store.find_credential_by_identifier("a@x.com").await.unwrap();
        assert_eq!(by_name.unwrap().id, cred.id);
        assert_eq!(by_mail.unwrap().id, cred.id);
        assert!(
            store
                .find_credential_by_identifier("Alice")
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn replace_is_single_use() {
        let store = MemoryStore::new();
        let user = Uuid::new_v4();
        let first = store.insert_refresh_token(&new_token(user, "h1")).await.unwrap();

        let second = store
            .replace_refresh_token(first, &new_token(user, "h2"))
            .await
            .unwrap();
        assert!(second.is_some());

        let again = store
            .replace_refresh_token(first, &new_token(user, "h3"))
            .await
            .unwrap();
        assert!(again.is_none());
        assert!(
            store
                .find_active_refresh_token_by_hash("h3")
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn active_code_conflicts_until_session_ends() {
        let store = MemoryStore::new();
        let creator = Uuid::new_v4();
        let session = NewSession {
            id: uuidv7(),
            session_code: "ABCDEFGH".into(),
            session_name: "s".into(),
            creator_user_id: creator,
        };
        store.insert_session(&session).await.unwrap();

        let dup = NewSession {
            id: uuidv7(),
            ..session.clone()
        };
        assert!(matches!(
            store.insert_session(&dup).await,
            Err(StoreError::Conflict(_))
        ));

        assert!(store.end_session(session.id, creator).await.unwrap());
        assert!(!store.session_code_is_active("ABCDEFGH").await.unwrap());
        store.insert_session(&dup).await.unwrap();
    }
}
