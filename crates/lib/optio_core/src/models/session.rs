//! Session room domain models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A session room joinable by its invite code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct SessionRecord {
    pub id: Uuid,
    pub session_code: String,
    pub session_name: String,
    pub creator_user_id: Uuid,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

/// A session row about to be inserted.
#[derive(Debug, Clone)]
pub struct NewSession {
    pub id: Uuid,
    pub session_code: String,
    pub session_name: String,
    pub creator_user_id: Uuid,
}

/// Where a session item came from. Only custom items exist so far.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    Custom,
}

impl SourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceType::Custom => "custom",
        }
    }
}

/// An item added to a session room.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct SessionItemRecord {
    pub id: Uuid,
    pub session_id: Uuid,
    pub item_title: String,
    pub item_description: Option<String>,
    pub image_url: Option<String>,
    pub source_type: String,
    pub source_id: Option<String>,
    pub metadata: Option<serde_json::Value>,
    pub added_by_user_id: Uuid,
    pub created_at: DateTime<Utc>,
}

/// Caller-supplied fields for a new session item.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionItemInput {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

/// A session item row about to be inserted.
#[derive(Debug, Clone)]
pub struct NewSessionItem {
    pub id: Uuid,
    pub session_id: Uuid,
    pub item_title: String,
    pub item_description: Option<String>,
    pub image_url: Option<String>,
    pub source_type: SourceType,
    pub metadata: Option<serde_json::Value>,
    pub added_by_user_id: Uuid,
}
