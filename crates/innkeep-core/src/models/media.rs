use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[cfg(feature = "sqlx")]
use sqlx::FromRow;

/// Media type enum
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(
    feature = "sqlx",
    sqlx(type_name = "media_type", rename_all = "lowercase")
)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Image,
    Video,
}

/// One uploaded or linked file tracked by the media library.
///
/// Content rows copy `url` by value; nothing in the store ties them back to `id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(FromRow))]
pub struct MediaAsset {
    pub id: Uuid,
    pub url: String,
    pub filename: String,
    pub media_type: MediaType,
    /// Hex SHA-256 of the file bytes. `None` until the hash has been backfilled.
    pub content_hash: Option<String>,
    pub byte_size: i64,
    pub created_at: DateTime<Utc>,
    /// Referenced directly by application code; never deletable.
    pub is_protected: bool,
}

impl MediaAsset {
    /// Hash usable for grouping: trimmed and lowercased, blank values ignored.
    pub fn grouping_hash(&self) -> Option<String> {
        self.content_hash
            .as_deref()
            .map(str::trim)
            .filter(|h| !h.is_empty())
            .map(str::to_ascii_lowercase)
    }
}
