//! Authentication service: login/register/refresh flows over `optio_core::auth`.

use std::sync::Arc;

use chrono::Duration;
use optio_core::auth::{
    AuthConfig, AuthError, CredentialService, PasswordHasher, RefreshTokenStore, SigningSecret,
    TokenSigner,
};
use optio_core::models::auth::{AccessClaims, ClientContext, Credential};
use optio_core::store::Store;
use tracing::info;
use uuid::Uuid;

/// A freshly issued access/refresh pair for a user. Not `Debug`: it holds
/// plaintext tokens.
pub struct IssuedTokens {
    pub access_token: String,
    pub refresh_token: String,
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
    pub user: Credential,
}

/// Account and token flows used by the handlers.
pub struct AuthService {
    credentials: CredentialService<dyn Store>,
    refresh: RefreshTokenStore<dyn Store>,
    signer: TokenSigner,
}

impl AuthService {
    pub fn new(
        store: Arc<dyn Store>,
        secret: &SigningSecret,
        config: &AuthConfig,
        hasher: PasswordHasher,
    ) -> Result<Self, AuthError> {
        Ok(Self {
            signer: TokenSigner::new(secret, config)?,
            credentials: CredentialService::new(store.clone(), hasher, config)?,
            refresh: RefreshTokenStore::new(store, config),
        })
    }

    async fn issue(&self, user: Credential, client: &ClientContext) -> Result<IssuedTokens, AuthError> {
        let access_token = self.signer.issue(user.id, &user.username)?;
        let refresh_token = self.refresh.issue(user.id, client).await?;
        Ok(IssuedTokens {
            access_token,
            refresh_token,
            access_ttl: self.signer.ttl(),
            refresh_ttl: self.refresh.ttl(),
            user,
        })
    }

    /// Create an account and sign it in.
    pub async fn register(
        &self,
        username: &str,
        email: &str,
        password: &str,
        client: &ClientContext,
    ) -> Result<IssuedTokens, AuthError> {
        let user = self.credentials.register(username, email, password).await?;
        self.issue(user, client).await
    }

    /// Authenticate with username-or-email and password.
    pub async fn login(
        &self,
        identifier: &str,
        password: &str,
        client: &ClientContext,
    ) -> Result<IssuedTokens, AuthError> {
        let user = self.credentials.authenticate(identifier, password).await?;
        info!(user_id = %user.id, "user logged in");
        self.issue(user, client).await
    }

    /// Exchange a refresh token for a new pair (single-use rotation).
    pub async fn refresh(
        &self,
        refresh_token: &str,
        client: &ClientContext,
    ) -> Result<IssuedTokens, AuthError> {
        let current = self.refresh.lookup(refresh_token).await?;
        let user = match self.credentials.profile(current.user_id).await {
            Ok(user) => user,
            Err(AuthError::NotFound(_)) => return Err(AuthError::InvalidRefreshToken),
            Err(e) => return Err(e),
        };

        let (refresh_token, _) = self
            .refresh
            .rotate(refresh_token, user.password_changed_at, client)
            .await?;
        let access_token = self.signer.issue(user.id, &user.username)?;
        Ok(IssuedTokens {
            access_token,
            refresh_token,
            access_ttl: self.signer.ttl(),
            refresh_ttl: self.refresh.ttl(),
            user,
        })
    }

    /// Revoke the presented refresh token, if any.
    pub async fn logout(&self, refresh_token: Option<&str>) -> Result<(), AuthError> {
        if let Some(token) = refresh_token {
            self.refresh.revoke_plaintext(token).await?;
        }
        Ok(())
    }

    pub async fn profile(&self, user_id: Uuid) -> Result<Credential, AuthError> {
        self.credentials.profile(user_id).await
    }

    /// Change the password and sign the user out everywhere.
    pub async fn change_password(
        &self,
        user_id: Uuid,
        current: &str,
        new: &str,
    ) -> Result<(), AuthError> {
        self.credentials.change_password(user_id, current, new).await?;
        self.refresh.revoke_all(user_id).await?;
        Ok(())
    }

    pub fn verify_access_token(&self, token: &str) -> Result<AccessClaims, AuthError> {
        Ok(self.signer.validate(token)?)
    }
}
