//! Registration, login and password changes.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{AuthConfig, AuthError, PasswordHasher};
use crate::models::auth::{Credential, NewCredential};
use crate::store::{CredentialStore, StoreError, bounded};

/// Checks and manages user credentials over a [`CredentialStore`].
pub struct CredentialService<S: ?Sized> {
    store: Arc<S>,
    hasher: PasswordHasher,
    timeout: Duration,
    /// Verified against on unknown identifiers to equalize login latency.
    dummy_hash: String,
}

impl<S: CredentialStore + ?Sized> CredentialService<S> {
    pub fn new(
        store: Arc<S>,
        hasher: PasswordHasher,
        config: &AuthConfig,
    ) -> Result<Self, AuthError> {
        let dummy_hash = hasher.hash("optio-timing-equalizer")?;
        Ok(Self {
            store,
            hasher,
            timeout: config.storage_timeout,
            dummy_hash,
        })
    }

    /// Create an account.
    ///
    /// Input is not trimmed or case-folded. Usernames and emails share one
    /// login namespace, so a username may not contain `@` and an email must.
    pub async fn register(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<Credential, AuthError> {
        if username.is_empty() || email.is_empty() || password.is_empty() {
            return Err(AuthError::Validation(
                "username, email and password are required".into(),
            ));
        }
        if username.contains('@') {
            return Err(AuthError::Validation("username must not contain '@'".into()));
        }
        if !email.contains('@') {
            return Err(AuthError::Validation("email must contain '@'".into()));
        }

        if bounded(self.timeout, self.store.credential_exists(username, email)).await? {
            return Err(AuthError::Conflict("username or email already taken".into()));
        }

        let new = NewCredential {
            username: username.to_string(),
            email: email.to_string(),
            password_hash: self.hasher.hash(password)?,
        };

        match bounded(self.timeout, self.store.insert_credential(&new)).await {
            Ok(credential) => {
                info!(user_id = %credential.id, "user registered");
                Ok(credential)
            }
            // Lost a race against a concurrent registration.
            Err(StoreError::Conflict(constraint)) => {
                debug!(%constraint, "registration hit unique constraint");
                Err(AuthError::Conflict("username or email already taken".into()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Check a username-or-email and password pair.
    ///
    /// Unknown identifiers and wrong passwords are indistinguishable to the
    /// caller, in both error and latency.
    pub async fn authenticate(
        &self,
        identifier: &str,
        password: &str,
    ) -> Result<Credential, AuthError> {
        let found = bounded(
            self.timeout,
            self.store.find_credential_by_identifier(identifier),
        )
        .await?;

        let Some(credential) = found else {
            self.hasher.verify(password, &self.dummy_hash);
            debug!("login for unknown identifier");
            return Err(AuthError::InvalidCredentials);
        };

        if !self.hasher.verify(password, &credential.password_hash) {
            debug!(user_id = %credential.id, "login with wrong password");
            return Err(AuthError::InvalidCredentials);
        }

        Ok(credential)
    }

    pub async fn profile(&self, user_id: Uuid) -> Result<Credential, AuthError> {
        bounded(self.timeout, self.store.find_credential_by_id(user_id))
            .await?
            .ok_or_else(|| AuthError::NotFound("user".into()))
    }

    /// Replace a user's password after checking the current one.
    ///
    /// Stamps `password_changed_at`, which makes older refresh tokens fail
    /// their next rotation.
    pub async fn change_password(
        &self,
        user_id: Uuid,
        current: &str,
        new: &str,
    ) -> Result<(), AuthError> {
        let credential = self.profile(user_id).await?;
        if !self.hasher.verify(current, &credential.password_hash) {
            return Err(AuthError::InvalidCredentials);
        }
        if new.is_empty() {
            return Err(AuthError::Validation("new password is required".into()));
        }

        let hash = self.hasher.hash(new)?;
        let updated = bounded(
            self.timeout,
            self.store.update_password_hash(user_id, &hash, Utc::now()),
        )
        .await?;
        if !updated {
            warn!(%user_id, "user vanished during password change");
            return Err(AuthError::NotFound("user".into()));
        }

        info!(%user_id, "password changed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::store::{MemoryStore, StoreResult};

    fn service() -> CredentialService<MemoryStore> {
        CredentialService::new(
            Arc::new(MemoryStore::new()),
            PasswordHasher::with_cost(4),
            &AuthConfig::default(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn register_then_authenticate_by_either_identifier() {
        let svc = service();
        let alice = svc.register("alice", "a@x.com", "pw1").await.unwrap();
        assert_ne!(alice.password_hash, "pw1");

        assert_eq!(svc.authenticate("alice", "pw1").await.unwrap().id, alice.id);
        assert_eq!(svc.authenticate("a@x.com", "pw1").await.unwrap().id, alice.id);
    }

    #[tokio::test]
    async fn empty_fields_are_rejected() {
        let svc = service();
        for (u, e, p) in [("", "a@x.com", "pw"), ("a", "", "pw"), ("a", "a@x.com", "")] {
            assert!(matches!(
                svc.register(u, e, p).await,
                Err(AuthError::Validation(_))
            ));
        }
    }

    #[tokio::test]
    async fn taken_username_or_email_conflicts() {
        let svc = service();
        svc.register("alice", "a@x.com", "pw1").await.unwrap();
        assert!(matches!(
            svc.register("bob", "a@x.com", "pw2").await,
            Err(AuthError::Conflict(_))
        ));
        assert!(matches!(
            svc.register("alice", "b@x.com", "pw2").await,
            Err(AuthError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn identifiers_cannot_cross_columns() {
        let svc = service();
        let alice = svc.register("alice", "a@x.com", "pw1").await.unwrap();

        // A username shaped like someone's email would shadow their login.
        assert!(matches!(
            svc.register("a@x.com", "b@x.com", "pw2").await,
            Err(AuthError::Validation(_))
        ));
        assert!(matches!(
            svc.register("bob", "alice", "pw2").await,
            Err(AuthError::Validation(_))
        ));

        for _ in 0..20 {
            assert_eq!(svc.authenticate("a@x.com", "pw1").await.unwrap().id, alice.id);
        }
    }

    /// Passes the existence check, then loses the insert to a concurrent
    /// registration.
    struct LateConflictStore(MemoryStore);

    #[async_trait]
    impl CredentialStore for LateConflictStore {
        async fn find_credential_by_identifier(
            &self,
            identifier: &str,
        ) -> StoreResult<Option<Credential>> {
            self.0.find_credential_by_identifier(identifier).await
        }

        async fn find_credential_by_id(&self, user_id: Uuid) -> StoreResult<Option<Credential>> {
            self.0.find_credential_by_id(user_id).await
        }

        async fn credential_exists(&self, _username: &str, _email: &str) -> StoreResult<bool> {
            Ok(false)
        }

        async fn insert_credential(&self, new: &NewCredential) -> StoreResult<Credential> {
            self.0.insert_credential(new).await
        }

        async fn update_password_hash(
            &self,
            user_id: Uuid,
            password_hash: &str,
            changed_at: chrono::DateTime<Utc>,
        ) -> StoreResult<bool> {
            self.0.update_password_hash(user_id, password_hash, changed_at).await
        }
    }

    #[tokio::test]
    async fn insert_race_is_a_conflict() {
        let svc = CredentialService::new(
            Arc::new(LateConflictStore(MemoryStore::new())),
            PasswordHasher::with_cost(4),
            &AuthConfig::default(),
        )
        .unwrap();
        svc.register("alice", "a@x.com", "pw1").await.unwrap();
        assert!(matches!(
            svc.register("bob", "a@x.com", "pw2").await,
            Err(AuthError::Conflict(_))
        ));
        assert!(matches!(
            svc.register("alice", "b@x.com", "pw2").await,
            Err(AuthError::Conflict(_))
        ));
    }

    #[test]
    fn dummy_hash_is_ready_before_first_login() {
        let svc = service();
        assert!(svc.dummy_hash.starts_with("$2"), "{}", svc.dummy_hash);
        assert!(svc.hasher.verify("optio-timing-equalizer", &svc.dummy_hash));
    }

    #[tokio::test]
    async fn unknown_user_and_wrong_password_look_the_same() {
        let svc = service();
        svc.register("alice", "a@x.com", "pw1").await.unwrap();

        let wrong = svc.authenticate("alice", "nope").await.unwrap_err();
        let unknown = svc.authenticate("mallory", "pw1").await.unwrap_err();
        assert!(matches!(wrong, AuthError::InvalidCredentials));
        assert!(matches!(unknown, AuthError::InvalidCredentials));
        assert_eq!(wrong.to_string(), unknown.to_string());
    }

    #[tokio::test]
    async fn profile_of_missing_user_is_not_found() {
        let svc = service();
        assert!(matches!(
            svc.profile(Uuid::new_v4()).await,
            Err(AuthError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn change_password_requires_current() {
        let svc = service();
        let alice = svc.register("alice", "a@x.com", "pw1").await.unwrap();
        assert!(alice.password_changed_at.is_none());

        assert!(matches!(
            svc.change_password(alice.id, "wrong", "pw2").await,
            Err(AuthError::InvalidCredentials)
        ));
        assert!(matches!(
            svc.change_password(alice.id, "pw1", "").await,
            Err(AuthError::Validation(_))
        ));

        svc.change_password(alice.id, "pw1", "pw2").await.unwrap();
        assert!(svc.authenticate("alice", "pw1").await.is_err());
        let after = svc.authenticate("alice", "pw2").await.unwrap();
        assert!(after.password_changed_at.is_some());
    }
}
