//! End-to-end credential and token scenarios against the in-memory store.

use std::sync::Arc;

use optio_core::auth::{
    AuthConfig, AuthError, CredentialService, PasswordHasher, RefreshTokenStore, SigningSecret,
    TokenError, TokenSigner,
};
use optio_core::models::auth::ClientContext;
use optio_core::store::{MemoryStore, Store};

struct Harness {
    credentials: CredentialService<dyn Store>,
    refresh: RefreshTokenStore<dyn Store>,
    signer: TokenSigner,
}

fn harness() -> Harness {
    let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
    let config = AuthConfig::default();
    let secret = SigningSecret::new("integration-secret").unwrap();
    Harness {
        credentials: CredentialService::new(store.clone(), PasswordHasher::with_cost(4), &config)
            .unwrap(),
        refresh: RefreshTokenStore::new(store, &config),
        signer: TokenSigner::new(&secret, &config).unwrap(),
    }
}

#[tokio::test]
async fn register_login_and_conflicts() {
    let h = harness();

    let alice = h
        .credentials
        .register("alice", "a@x.com", "pw1")
        .await
        .unwrap();

    let conflict = h.credentials.register("bob", "a@x.com", "pw2").await;
    assert!(matches!(conflict, Err(AuthError::Conflict(_))));

    let logged_in = h.credentials.authenticate("alice", "pw1").await.unwrap();
    assert_eq!(logged_in.id, alice.id);

    let token = h.signer.issue(logged_in.id, &logged_in.username).unwrap();
    let claims = h.signer.validate(&token).unwrap();
    assert_eq!(claims.username, "alice");
    assert_eq!(claims.user_id, alice.id);

    assert!(matches!(
        h.credentials.authenticate("alice", "wrong").await,
        Err(AuthError::InvalidCredentials)
    ));
}

#[tokio::test]
async fn rotation_chain_and_reuse() {
    let h = harness();
    let alice = h
        .credentials
        .register("alice", "a@x.com", "pw1")
        .await
        .unwrap();
    let client = ClientContext::new(Some("ua".into()), None);

    let t1 = h.refresh.issue(alice.id, &client).await.unwrap();
    let (t2, _) = h.refresh.rotate(&t1, None, &client).await.unwrap();
    let (t3, owner) = h.refresh.rotate(&t2, None, &client).await.unwrap();
    assert_eq!(owner, alice.id);
    assert!(h.refresh.lookup(&t3).await.is_ok());

    assert!(matches!(
        h.refresh.rotate(&t1, None, &client).await,
        Err(AuthError::InvalidRefreshToken)
    ));
}

#[tokio::test]
async fn password_change_invalidates_older_refresh_tokens() {
    let h = harness();
    let alice = h
        .credentials
        .register("alice", "a@x.com", "pw1")
        .await
        .unwrap();
    let client = ClientContext::default();
    let old = h.refresh.issue(alice.id, &client).await.unwrap();

    // Make sure the change lands strictly after the issue instant.
    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    h.credentials
        .change_password(alice.id, "pw1", "pw2")
        .await
        .unwrap();
    let changed_at = h.credentials.profile(alice.id).await.unwrap().password_changed_at;

    assert!(matches!(
        h.refresh.rotate(&old, changed_at, &client).await,
        Err(AuthError::InvalidRefreshToken)
    ));

    let fresh = h.refresh.issue(alice.id, &client).await.unwrap();
    assert!(h.refresh.rotate(&fresh, changed_at, &client).await.is_ok());
}

#[tokio::test]
async fn logout_revokes_the_presented_token() {
    let h = harness();
    let alice = h
        .credentials
        .register("alice", "a@x.com", "pw1")
        .await
        .unwrap();
    let client = ClientContext::default();
    let token = h.refresh.issue(alice.id, &client).await.unwrap();

    assert!(h.refresh.revoke_plaintext(&token).await.unwrap());
    assert!(matches!(
        h.refresh.rotate(&token, None, &client).await,
        Err(AuthError::InvalidRefreshToken)
    ));
}

#[test]
fn tampered_access_token_is_rejected() {
    let h = harness();
    let user = uuid::Uuid::new_v4();
    let token = h.signer.issue(user, "alice").unwrap();
    let other = h.signer.issue(user, "mallory").unwrap();

    // alice's payload under mallory's signature.
    let (head, _) = token.rsplit_once('.').unwrap();
    let (_, sig) = other.rsplit_once('.').unwrap();
    let tampered = format!("{head}.{sig}");
    assert_eq!(
        h.signer.validate(&tampered),
        Err(TokenError::InvalidSignature)
    );
}
