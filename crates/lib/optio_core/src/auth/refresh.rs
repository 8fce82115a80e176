//! Refresh token issuance, rotation and revocation.
//!
//! The plaintext token leaves this module exactly once, at issuance or
//! rotation. Storage only ever sees its SHA-256 digest. Every successful
//! rotation revokes the presented token, so a token that shows up again
//! after being rotated is rejected.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Duration, Utc};
use rand::{RngCore, rng};
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{AuthConfig, AuthError};
use crate::models::auth::{ClientContext, NewRefreshToken, RefreshTokenRecord};
use crate::store::{RefreshTokenRepository, bounded};
use crate::uuid::uuidv7;

/// Random bytes per refresh token (256 bits).
const REFRESH_TOKEN_BYTES: usize = 32;

/// Generate a random refresh token (base64url, no padding).
fn generate_refresh_token() -> String {
    let mut bytes = [0u8; REFRESH_TOKEN_BYTES];
    rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// SHA-256 hash a refresh token for storage.
pub fn hash_refresh_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Refresh token lifecycle over a [`RefreshTokenRepository`].
pub struct RefreshTokenStore<S: ?Sized> {
    store: Arc<S>,
    ttl: Duration,
    timeout: StdDuration,
}

impl<S: RefreshTokenRepository + ?Sized> RefreshTokenStore<S> {
    pub fn new(store: Arc<S>, config: &AuthConfig) -> Self {
        Self {
            store,
            ttl: config.refresh_token_ttl,
            timeout: config.storage_timeout,
        }
    }

    /// Refresh token lifetime.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn new_row(
        &self,
        user_id: Uuid,
        token_hash: String,
        client: &ClientContext,
    ) -> Result<NewRefreshToken, AuthError> {
        let now = Utc::now();
        let expires_at = now
            .checked_add_signed(self.ttl)
            .ok_or_else(|| AuthError::Internal("refresh token expiry out of range".into()))?;
        Ok(NewRefreshToken {
            id: uuidv7(),
            user_id,
            token_hash,
            issued_at: now,
            expires_at,
            user_agent: client.user_agent.clone(),
            ip: client.ip.clone(),
        })
    }

    /// Issue a refresh token for a user. Returns the plaintext.
    pub async fn issue(&self, user_id: Uuid, client: &ClientContext) -> Result<String, AuthError> {
        let plaintext = generate_refresh_token();
        let row = self.new_row(user_id, hash_refresh_token(&plaintext), client)?;
        let token_id = bounded(self.timeout, self.store.insert_refresh_token(&row)).await?;
        debug!(%user_id, %token_id, "refresh token issued");
        Ok(plaintext)
    }

    /// Find the active row for a presented token.
    pub async fn lookup(&self, plaintext: &str) -> Result<RefreshTokenRecord, AuthError> {
        let token_hash = hash_refresh_token(plaintext);
        bounded(
            self.timeout,
            self.store.find_active_refresh_token_by_hash(&token_hash),
        )
        .await?
        .ok_or(AuthError::InvalidRefreshToken)
    }

    /// Exchange a token for a new one, revoking the old.
    ///
    /// When `password_changed_at` is later than the token's issue time the
    /// token is revoked and rejected instead. Returns the new plaintext and
    /// the owning user.
    pub async fn rotate(
        &self,
        plaintext: &str,
        password_changed_at: Option<DateTime<Utc>>,
        client: &ClientContext,
    ) -> Result<(String, Uuid), AuthError> {
        let current = self.lookup(plaintext).await.inspect_err(|e| {
            if matches!(e, AuthError::InvalidRefreshToken) {
                warn!("refresh token not active; expired, unknown or already rotated");
            }
        })?;

        if let Some(changed_at) = password_changed_at
            && changed_at > current.issued_at
        {
            bounded(
                self.timeout,
                self.store.revoke_refresh_token_by_id(current.id),
            )
            .await?;
            info!(user_id = %current.user_id, token_id = %current.id, "refresh token predates password change; revoked");
            return Err(AuthError::InvalidRefreshToken);
        }

        let next = generate_refresh_token();
        let row = self.new_row(current.user_id, hash_refresh_token(&next), client)?;
        let replaced = bounded(
            self.timeout,
            self.store.replace_refresh_token(current.id, &row),
        )
        .await?;

        match replaced {
            Some(token_id) => {
                debug!(user_id = %current.user_id, old = %current.id, new = %token_id, "refresh token rotated");
                Ok((next, current.user_id))
            }
            None => {
                warn!(user_id = %current.user_id, token_id = %current.id, "refresh token rotated concurrently");
                Err(AuthError::InvalidRefreshToken)
            }
        }
    }

    /// Revoke a token by record ID. Idempotent.
    pub async fn revoke(&self, token_id: Uuid) -> Result<(), AuthError> {
        bounded(self.timeout, self.store.revoke_refresh_token_by_id(token_id)).await?;
        Ok(())
    }

    /// Revoke the token matching a presented plaintext, if it is active.
    ///
    /// Returns whether anything was revoked; unknown tokens are not an error.
    pub async fn revoke_plaintext(&self, plaintext: &str) -> Result<bool, AuthError> {
        match self.lookup(plaintext).await {
            Ok(record) => {
                self.revoke(record.id).await?;
                debug!(user_id = %record.user_id, token_id = %record.id, "refresh token revoked");
                Ok(true)
            }
            Err(AuthError::InvalidRefreshToken) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Revoke every active token of a user.
    pub async fn revoke_all(&self, user_id: Uuid) -> Result<u64, AuthError> {
        let revoked = bounded(self.timeout, self.store.revoke_all_refresh_tokens(user_id)).await?;
        info!(%user_id, revoked, "revoked all refresh tokens");
        Ok(revoked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn store() -> (Arc<MemoryStore>, RefreshTokenStore<MemoryStore>) {
        let mem = Arc::new(MemoryStore::new());
        let tokens = RefreshTokenStore::new(mem.clone(), &AuthConfig::default());
        (mem, tokens)
    }

    fn client() -> ClientContext {
        ClientContext::new(Some("test-agent".into()), Some("127.0.0.1".into()))
    }

    #[test]
    fn tokens_are_long_and_distinct() {
        let a = generate_refresh_token();
        let b = generate_refresh_token();
        assert_ne!(a, b);
        // 32 bytes -> 43 base64url chars without padding.
        assert_eq!(a.len(), 43);
    }

    #[test]
    fn hash_is_deterministic_hex_sha256() {
        let h = hash_refresh_token("abc");
        assert_eq!(h, hash_refresh_token("abc"));
        assert_eq!(
            h,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[tokio::test]
    async fn issue_stores_only_the_hash() {
        let (mem, tokens) = store();
        let user = Uuid::new_v4();
        let plain = tokens.issue(user, &client()).await.unwrap();

        let rows = mem.refresh_tokens_for(user).await;
        assert_eq!(rows.len(), 1);
        assert_ne!(rows[0].token_hash, plain);
        assert_eq!(rows[0].token_hash, hash_refresh_token(&plain));
        assert_eq!(rows[0].user_agent.as_deref(), Some("test-agent"));
        assert_eq!(rows[0].ip.as_deref(), Some("127.0.0.1"));
        assert_eq!(rows[0].expires_at - rows[0].issued_at, Duration::days(30));
    }

    #[tokio::test]
    async fn rotate_succeeds_exactly_once() {
        let (_mem, tokens) = store();
        let user = Uuid::new_v4();
        let plain = tokens.issue(user, &client()).await.unwrap();

        let (next, owner) = tokens.rotate(&plain, None, &client()).await.unwrap();
        assert_eq!(owner, user);
        assert_ne!(next, plain);

        let again = tokens.rotate(&plain, None, &client()).await;
        assert!(matches!(again, Err(AuthError::InvalidRefreshToken)));
    }

    #[tokio::test]
    async fn rotation_chain_rejects_the_original() {
        let (_mem, tokens) = store();
        let user = Uuid::new_v4();
        let t1 = tokens.issue(user, &client()).await.unwrap();
        let (t2, _) = tokens.rotate(&t1, None, &client()).await.unwrap();
        let (t3, _) = tokens.rotate(&t2, None, &client()).await.unwrap();

        assert!(matches!(
            tokens.rotate(&t1, None, &client()).await,
            Err(AuthError::InvalidRefreshToken)
        ));
        assert!(tokens.lookup(&t3).await.is_ok());
    }

    #[tokio::test]
    async fn unknown_token_is_invalid() {
        let (_mem, tokens) = store();
        assert!(matches!(
            tokens.rotate("never-issued", None, &client()).await,
            Err(AuthError::InvalidRefreshToken)
        ));
    }

    #[tokio::test]
    async fn password_change_after_issue_revokes() {
        let (mem, tokens) = store();
        let user = Uuid::new_v4();
        let plain = tokens.issue(user, &client()).await.unwrap();

        let changed = Utc::now() + Duration::seconds(1);
        let res = tokens.rotate(&plain, Some(changed), &client()).await;
        assert!(matches!(res, Err(AuthError::InvalidRefreshToken)));

        let rows = mem.refresh_tokens_for(user).await;
        assert_eq!(rows.len(), 1);
        assert!(rows[0].is_revoked());
    }

    #[tokio::test]
    async fn password_change_before_issue_is_fine() {
        let (_mem, tokens) = store();
        let user = Uuid::new_v4();
        let changed = Utc::now() - Duration::hours(1);
        let plain = tokens.issue(user, &client()).await.unwrap();
        assert!(tokens.rotate(&plain, Some(changed), &client()).await.is_ok());
    }

    #[tokio::test]
    async fn expired_token_cannot_rotate() {
        let mem = Arc::new(MemoryStore::new());
        let config = AuthConfig {
            refresh_token_ttl: Duration::zero(),
            ..AuthConfig::default()
        };
        let tokens = RefreshTokenStore::new(mem, &config);
        let plain = tokens.issue(Uuid::new_v4(), &client()).await.unwrap();
        assert!(matches!(
            tokens.rotate(&plain, None, &client()).await,
            Err(AuthError::InvalidRefreshToken)
        ));
    }

    #[tokio::test]
    async fn unrepresentable_expiry_is_an_error() {
        let mem = Arc::new(MemoryStore::new());
        let config = AuthConfig {
            refresh_token_ttl: Duration::days(100_000_000),
            ..AuthConfig::default()
        };
        let tokens = RefreshTokenStore::new(mem.clone(), &config);
        let user = Uuid::new_v4();
        assert!(matches!(
            tokens.issue(user, &client()).await,
            Err(AuthError::Internal(_))
        ));
        assert!(mem.refresh_tokens_for(user).await.is_empty());
    }

    #[tokio::test]
    async fn revoke_is_idempotent() {
        let (mem, tokens) = store();
        let user = Uuid::new_v4();
        let plain = tokens.issue(user, &client()).await.unwrap();
        let id = tokens.lookup(&plain).await.unwrap().id;

        tokens.revoke(id).await.unwrap();
        let first = mem.refresh_tokens_for(user).await[0].revoked_at;
        tokens.revoke(id).await.unwrap();
        let second = mem.refresh_tokens_for(user).await[0].revoked_at;
        assert!(first.is_some());
        assert_eq!(first, second);
        assert!(matches!(
            tokens.lookup(&plain).await,
            Err(AuthError::InvalidRefreshToken)
        ));
    }

    #[tokio::test]
    async fn revoke_plaintext_ignores_unknown_tokens() {
        let (_mem, tokens) = store();
        let plain = tokens.issue(Uuid::new_v4(), &client()).await.unwrap();
        assert!(tokens.revoke_plaintext(&plain).await.unwrap());
        assert!(!tokens.revoke_plaintext(&plain).await.unwrap());
        assert!(!tokens.revoke_plaintext("garbage").await.unwrap());
    }

    #[tokio::test]
    async fn revoke_all_covers_every_device() {
        let (_mem, tokens) = store();
        let user = Uuid::new_v4();
        let a = tokens.issue(user, &client()).await.unwrap();
        let b = tokens.issue(user, &ClientContext::default()).await.unwrap();
        let other = tokens.issue(Uuid::new_v4(), &client()).await.unwrap();

        assert_eq!(tokens.revoke_all(user).await.unwrap(), 2);
        assert!(tokens.lookup(&a).await.is_err());
        assert!(tokens.lookup(&b).await.is_err());
        assert!(tokens.lookup(&other).await.is_ok());
    }
}
