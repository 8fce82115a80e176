//! Invite-code session rooms.
//!
//! A session is created by an authenticated user, gets a short code that is
//! unique among active sessions, and is shared as an invite link carrying
//! that code. Once ended, its code may be handed out again.

pub mod code;
pub mod queries;

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info};
use url::Url;
use uuid::Uuid;

use crate::models::session::{
    NewSession, NewSessionItem, SessionItemInput, SessionItemRecord, SessionRecord, SourceType,
};
use crate::store::{SessionStore, StoreError, StoreResult, bounded};
use crate::uuid::uuidv7;

pub use code::CodeGenerator;

/// Query parameter carrying the code in invite links.
const INVITE_CODE_PARAM: &str = "code";

/// Session errors.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("No free session code after {0} attempts")]
    CodeGenerationExhausted(u32),

    /// Invite links cannot be built with the configured base URL.
    #[error("Invite link error: {0}")]
    InviteLink(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),
}

/// Session room operations over a [`SessionStore`].
pub struct SessionService<S: ?Sized> {
    store: Arc<S>,
    codes: CodeGenerator,
    invite_url: Option<String>,
    timeout: Duration,
}

impl<S: SessionStore + ?Sized> SessionService<S> {
    pub fn new(
        store: Arc<S>,
        codes: CodeGenerator,
        invite_url: Option<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            store,
            codes,
            invite_url,
            timeout,
        }
    }

    /// Create a session owned by `creator_id`. Returns it with its invite link.
    pub async fn create_session(
        &self,
        name: &str,
        creator_id: Uuid,
    ) -> Result<(SessionRecord, String), SessionError> {
        if name.trim().is_empty() {
            return Err(SessionError::Validation("session name is required".into()));
        }
        // Fail before writing anything if links cannot be built.
        let base = self.invite_base()?;

        let store = &self.store;
        let limit = self.timeout;
        let session = self
            .codes
            .claim_unique_code(|code| {
                let new = NewSession {
                    id: uuidv7(),
                    session_code: code,
                    session_name: name.to_string(),
                    creator_user_id: creator_id,
                };
                insert_if_free(store.clone(), limit, new)
            })
            .await?;

        let link = build_invite_link(&base, &session.session_code);
        info!(session_id = %session.id, %creator_id, "session created");
        Ok((session, link))
    }

    /// Invite link for a code.
    pub fn invite_link(&self, code: &str) -> Result<String, SessionError> {
        Ok(build_invite_link(&self.invite_base()?, code))
    }

    pub async fn find_active_session(&self, code: &str) -> Result<SessionRecord, SessionError> {
        bounded(self.timeout, self.store.find_active_session_by_code(code))
            .await?
            .ok_or_else(|| SessionError::NotFound("session".into()))
    }

    /// Resolve an invite link to its active session.
    pub async fn find_session_by_invite_link(
        &self,
        link: &str,
    ) -> Result<SessionRecord, SessionError> {
        let code = code_from_invite_link(link)?;
        self.find_active_session(&code).await
    }

    /// End an active session. Only its creator may do so.
    pub async fn end_session(&self, session_id: Uuid, principal: Uuid) -> Result<(), SessionError> {
        let ended = bounded(self.timeout, self.store.end_session(session_id, principal)).await?;
        if !ended {
            return Err(SessionError::NotFound("active session".into()));
        }
        info!(%session_id, "session ended");
        Ok(())
    }

    /// Add a custom item to an active session.
    pub async fn add_item(
        &self,
        session_id: Uuid,
        principal: Uuid,
        input: SessionItemInput,
    ) -> Result<SessionItemRecord, SessionError> {
        if input.title.trim().is_empty() {
            return Err(SessionError::Validation("item title is required".into()));
        }
        bounded(self.timeout, self.store.find_active_session_by_id(session_id))
            .await?
            .ok_or_else(|| SessionError::NotFound("active session".into()))?;

        let item = NewSessionItem {
            id: uuidv7(),
            session_id,
            item_title: input.title,
            item_description: input.description,
            image_url: input.image_url,
            source_type: SourceType::Custom,
            metadata: input.metadata,
            added_by_user_id: principal,
        };
        let record = bounded(self.timeout, self.store.insert_session_item(&item)).await?;
        debug!(%session_id, item_id = %record.id, "session item added");
        Ok(record)
    }

    fn invite_base(&self) -> Result<Url, SessionError> {
        let raw = self
            .invite_url
            .as_deref()
            .filter(|u| !u.is_empty())
            .ok_or_else(|| SessionError::InviteLink("invite URL is not configured".into()))?;
        Url::parse(raw).map_err(|e| SessionError::InviteLink(format!("invalid invite URL: {e}")))
    }
}

/// Insert `new` unless its code is in use. A lookup hit and an insert-time
/// unique violation both come back as `None`.
async fn insert_if_free<S: SessionStore + ?Sized>(
    store: Arc<S>,
    limit: Duration,
    new: NewSession,
) -> StoreResult<Option<SessionRecord>> {
    if bounded(limit, store.session_code_is_active(&new.session_code)).await? {
        return Ok(None);
    }
    match bounded(limit, store.insert_session(&new)).await {
        Ok(session) => Ok(Some(session)),
        Err(StoreError::Conflict(constraint)) => {
            debug!(%constraint, "session code taken at insert");
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

/// Set `code` on the base URL, replacing any existing value.
fn build_invite_link(base: &Url, code: &str) -> String {
    let mut link = base.clone();
    let kept: Vec<(String, String)> = base
        .query_pairs()
        .filter(|(k, _)| k != INVITE_CODE_PARAM)
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    link.query_pairs_mut()
        .clear()
        .extend_pairs(kept)
        .append_pair(INVITE_CODE_PARAM, code);
    link.to_string()
}

fn code_from_invite_link(link: &str) -> Result<String, SessionError> {
    let url =
        Url::parse(link).map_err(|e| SessionError::Validation(format!("invalid invite link: {e}")))?;
    url.query_pairs()
        .find(|(k, _)| k == INVITE_CODE_PARAM)
        .map(|(_, v)| v.into_owned())
        .filter(|c| !c.is_empty())
        .ok_or_else(|| SessionError::Validation("invite link has no code".into()))
}
