//! Auth-related database queries.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::auth::{Credential, NewCredential, NewRefreshToken, RefreshTokenRecord};
use crate::store::StoreResult;

const CREDENTIAL_COLUMNS: &str =
    "id, username, email, password_hash, created_at, password_changed_at";

const REFRESH_TOKEN_COLUMNS: &str =
    "id, user_id, token_hash, issued_at, expires_at, user_agent, ip, revoked_at";

/// Fetch a user by username or email.
pub async fn find_credential_by_identifier(
    pool: &PgPool,
    identifier: &str,
) -> StoreResult<Option<Credential>> {
    let row = sqlx::query_as::<_, Credential>(&format!(
        "SELECT {CREDENTIAL_COLUMNS} FROM users WHERE username = $1 OR email = $1 LIMIT 1"
    ))
    .bind(identifier)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

/// Fetch a user by ID.
pub async fn find_credential_by_id(pool: &PgPool, user_id: Uuid) -> StoreResult<Option<Credential>> {
    let row = sqlx::query_as::<_, Credential>(&format!(
        "SELECT {CREDENTIAL_COLUMNS} FROM users WHERE id = $1"
    ))
    .bind(user_id)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

/// Check whether a username or email is already in use as any login identifier.
pub async fn credential_exists(pool: &PgPool, username: &str, email: &str) -> StoreResult<bool> {
    let exists = sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS(SELECT 1 FROM users \
         WHERE username IN ($1, $2) OR email IN ($1, $2))",
    )
    .bind(username)
    .bind(email)
    .fetch_one(pool)
    .await?;
    Ok(exists)
}

/// Create a new user.
pub async fn insert_credential(pool: &PgPool, new: &NewCredential) -> StoreResult<Credential> {
    let row = sqlx::query_as::<_, Credential>(&format!(
        "INSERT INTO users (username, email, password_hash) VALUES ($1, $2, $3) \
         RETURNING {CREDENTIAL_COLUMNS}"
    ))
    .bind(&new.username)
    .bind(&new.email)
    .bind(&new.password_hash)
    .fetch_one(pool)
    .await?;
    Ok(row)
}

/// Replace a user's password hash.
pub async fn update_password_hash(
    pool: &PgPool,
    user_id: Uuid,
    password_hash: &str,
    changed_at: DateTime<Utc>,
) -> StoreResult<bool> {
    let result = sqlx::query(
        "UPDATE users SET password_hash = $2, password_changed_at = $3, updated_at = now() \
         WHERE id = $1",
    )
    .bind(user_id)
    .bind(password_hash)
    .bind(changed_at)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// Find a non-revoked, non-expired refresh token by hash.
pub async fn find_active_refresh_token_by_hash(
    pool: &PgPool,
    token_hash: &str,
) -> StoreResult<Option<RefreshTokenRecord>> {
    let row = sqlx::query_as::<_, RefreshTokenRecord>(&format!(
        "SELECT {REFRESH_TOKEN_COLUMNS} FROM refresh_tokens \
         WHERE token_hash = $1 \
           AND revoked_at IS NULL \
           AND expires_at > now()"
    ))
    .bind(token_hash)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

/// Store a refresh token hash.
pub async fn insert_refresh_token(pool: &PgPool, token: &NewRefreshToken) -> StoreResult<Uuid> {
    let mut conn = pool.acquire().await?;
    insert_refresh_token_on(&mut *conn, token).await
}

async fn insert_refresh_token_on(
    conn: &mut sqlx::PgConnection,
    token: &NewRefreshToken,
) -> StoreResult<Uuid> {
    let id = sqlx::query_scalar::<_, Uuid>(
        "INSERT INTO refresh_tokens (id, user_id, token_hash, issued_at, expires_at, user_agent, ip) \
         VALUES ($1, $2, $3, $4, $5, $6, $7) \
         RETURNING id",
    )
    .bind(token.id)
    .bind(token.user_id)
    .bind(&token.token_hash)
    .bind(token.issued_at)
    .bind(token.expires_at)
    .bind(token.user_agent.as_deref())
    .bind(token.ip.as_deref())
    .fetch_one(&mut *conn)
    .await?;
    Ok(id)
}

/// Revoke a refresh token by ID.
pub async fn revoke_refresh_token_by_id(pool: &PgPool, id: Uuid) -> StoreResult<()> {
    sqlx::query("UPDATE refresh_tokens SET revoked_at = now() WHERE id = $1 AND revoked_at IS NULL")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Revoke `old_id` and insert `token` in one transaction.
pub async fn replace_refresh_token(
    pool: &PgPool,
    old_id: Uuid,
    token: &NewRefreshToken,
) -> StoreResult<Option<Uuid>> {
    let mut tx = pool.begin().await?;

    let revoked = sqlx::query(
        "UPDATE refresh_tokens SET revoked_at = now() \
         WHERE id = $1 AND revoked_at IS NULL AND expires_at > now()",
    )
    .bind(old_id)
    .execute(&mut *tx)
    .await?;

    if revoked.rows_affected() == 0 {
        tx.rollback().await?;
        return Ok(None);
    }

    let id = insert_refresh_token_on(&mut *tx, token).await?;
    tx.commit().await?;
    Ok(Some(id))
}

/// Revoke all refresh tokens for a user.
pub async fn revoke_all_refresh_tokens(pool: &PgPool, user_id: Uuid) -> StoreResult<u64> {
    let result = sqlx::query(
        "UPDATE refresh_tokens SET revoked_at = now() \
         WHERE user_id = $1 AND revoked_at IS NULL",
    )
    .bind(user_id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}
