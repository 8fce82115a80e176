//! Session room database queries.

use sqlx::PgPool;
use uuid::Uuid;

use crate::models::session::{NewSession, NewSessionItem, SessionItemRecord, SessionRecord};
use crate::store::StoreResult;

const SESSION_COLUMNS: &str =
    "id, session_code, session_name, creator_user_id, is_active, created_at, ended_at";

/// Check whether an active session already holds `code`.
pub async fn session_code_is_active(pool: &PgPool, code: &str) -> StoreResult<bool> {
    let exists = sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS(SELECT 1 FROM sessions WHERE session_code = $1 AND is_active)",
    )
    .bind(code)
    .fetch_one(pool)
    .await?;
    Ok(exists)
}

/// Create a new session.
pub async fn insert_session(pool: &PgPool, new: &NewSession) -> StoreResult<SessionRecord> {
    let row = sqlx::query_as::<_, SessionRecord>(&format!(
        "INSERT INTO sessions (id, session_code, session_name, creator_user_id) \
         VALUES ($1, $2, $3, $4) \
         RETURNING {SESSION_COLUMNS}"
    ))
    .bind(new.id)
    .bind(&new.session_code)
    .bind(&new.session_name)
    .bind(new.creator_user_id)
    .fetch_one(pool)
    .await?;
    Ok(row)
}

/// Fetch the active session holding `code`.
pub async fn find_active_session_by_code(
    pool: &PgPool,
    code: &str,
) -> StoreResult<Option<SessionRecord>> {
    let row = sqlx::query_as::<_, SessionRecord>(&format!(
        "SELECT {SESSION_COLUMNS} FROM sessions WHERE session_code = $1 AND is_active"
    ))
    .bind(code)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

/// Fetch an active session by ID.
pub async fn find_active_session_by_id(
    pool: &PgPool,
    session_id: Uuid,
) -> StoreResult<Option<SessionRecord>> {
    let row = sqlx::query_as::<_, SessionRecord>(&format!(
        "SELECT {SESSION_COLUMNS} FROM sessions WHERE id = $1 AND is_active"
    ))
    .bind(session_id)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

/// End an active session owned by `creator_id`.
pub async fn end_session(pool: &PgPool, session_id: Uuid, creator_id: Uuid) -> StoreResult<bool> {
    let result = sqlx::query(
        "UPDATE sessions SET is_active = FALSE, ended_at = now() \
         WHERE id = $1 AND creator_user_id = $2 AND is_active",
    )
    .bind(session_id)
    .bind(creator_id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// Add an item to a session.
pub async fn insert_session_item(
    pool: &PgPool,
    item: &NewSessionItem,
) -> StoreResult<SessionItemRecord> {
    let row = sqlx::query_as::<_, SessionItemRecord>(
        r#"
        INSERT INTO session_items
            (id, session_id, item_title, item_description, image_url, source_type, metadata, added_by_user_id)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        RETURNING id, session_id, item_title, item_description, image_url, source_type,
                  source_id, metadata, added_by_user_id, created_at
        "#,
    )
    .bind(item.id)
    .bind(item.session_id)
    .bind(&item.item_title)
    .bind(item.item_description.as_deref())
    .bind(item.image_url.as_deref())
    .bind(item.source_type.as_str())
    .bind(item.metadata.as_ref())
    .bind(item.added_by_user_id)
    .fetch_one(pool)
    .await?;
    Ok(row)
}
