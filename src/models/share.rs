use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::collections::BTreeMap;

use super::{FileRecord, Folder, FolderSettings};

/// Who may open a gallery through its public link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum AccessTier {
    #[default]
    Public,
    Restricted,
    Private,
}

impl AccessTier {
    pub fn allows_anonymous(self) -> bool {
        matches!(self, AccessTier::Public)
    }
}

/// A folder published for sharing
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Gallery {
    pub id: String,
    pub user_id: String,
    pub folder_id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Hard expiry of the gallery itself, unrelated to the link.
    pub expires_at: Option<DateTime<Utc>>,
    pub is_public: bool,
    pub views: i64,
    pub share_id: String,
    pub share_enabled: bool,
    pub share_expires_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing)]
    pub share_password_hash: Option<String>,
    pub share_access: AccessTier,
    pub layout: String,
    pub color_scheme: String,
    pub watermark: Option<String>,
    pub allow_comments: bool,
    pub allow_downloads: bool,
}

impl Gallery {
    pub fn has_password(&self) -> bool {
        self.share_password_hash
            .as_deref()
            .is_some_and(|hash| !hash.is_empty())
    }

    pub fn link_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.share_expires_at.is_some_and(|expiry| expiry < now)
    }
}

/// Per-link counters, recreated whenever the link is regenerated
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ShareStats {
    pub share_id: String,
    pub gallery_id: String,
    pub created_at: DateTime<Utc>,
    pub total_clicks: i64,
    pub unique_visitors: i64,
    pub last_accessed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub struct ShareStatsResponse {
    #[serde(flatten)]
    pub stats: ShareStats,
    pub referrers: BTreeMap<String, i64>,
}

/// Request to publish a folder as a gallery
#[derive(Debug, Deserialize)]
pub struct PublishGalleryRequest {
    pub folder_id: String,
    pub name: String,
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub link: LinkOptions,
}

/// Options describing a freshly generated link. Absent fields mean no
/// expiry, no password and public access.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LinkOptions {
    pub share_expires_at: Option<DateTime<Utc>>,
    pub password: Option<String>,
    pub access: Option<AccessTier>,
}

#[derive(Debug, Deserialize)]
pub struct SetEnabledRequest {
    pub enabled: bool,
}

#[derive(Debug, Deserialize)]
pub struct BatchGalleryRequest {
    pub gallery_ids: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct BatchResult {
    pub updated: usize,
}

/// Request to verify a gallery password
#[derive(Debug, Deserialize)]
pub struct UnlockGalleryRequest {
    pub password: String,
}

/// Result of checking a public link. Only `Granted` lets content through.
#[derive(Debug, Clone)]
pub enum AccessOutcome {
    NotFound,
    Disabled,
    Expired,
    PasswordRequired,
    RequiresAuthenticatedView { gallery_id: String, owner_id: String },
    Granted { gallery: Gallery, folder: Folder },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessState {
    NotFound,
    Disabled,
    Expired,
    PasswordRequired,
    RequiresAuthenticatedView,
    Granted,
}

impl AccessOutcome {
    pub fn state(&self) -> AccessState {
        match self {
            AccessOutcome::NotFound => AccessState::NotFound,
            AccessOutcome::Disabled => AccessState::Disabled,
            AccessOutcome::Expired => AccessState::Expired,
            AccessOutcome::PasswordRequired => AccessState::PasswordRequired,
            AccessOutcome::RequiresAuthenticatedView { .. } => {
                AccessState::RequiresAuthenticatedView
            }
            AccessOutcome::Granted { .. } => AccessState::Granted,
        }
    }

    pub fn is_granted(&self) -> bool {
        matches!(self, AccessOutcome::Granted { .. })
    }
}

/// What a visitor sees once access is granted
#[derive(Debug, Serialize)]
pub struct PublicGalleryView {
    pub id: String,
    pub name: String,
    pub folder_name: String,
    pub layout: String,
    pub color_scheme: String,
    pub watermark: Option<String>,
    pub allow_comments: bool,
    pub allow_downloads: bool,
    pub created_at: DateTime<Utc>,
    pub files: Vec<FileRecord>,
    pub settings: FolderSettings,
}

#[derive(Debug, Serialize)]
pub struct AccessResponse<T: Serialize> {
    pub state: AccessState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect_target: Option<String>,
    /// Owner of a gallery that needs the authenticated view
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gallery: Option<T>,
}
