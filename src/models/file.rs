use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;

/// Folder model
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Folder {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// One uploaded object. Names are not unique inside a folder and older
/// uploads may only be addressable by `original_name` or `storage_name`.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct FileRecord {
    pub id: String,
    pub folder_id: String,
    pub user_id: String,
    pub name: String,
    pub original_name: Option<String>,
    pub storage_name: Option<String>,
    pub storage_path: String,
    pub mime_type: Option<String>,
    pub size: i64,
    pub created_at: DateTime<Utc>,
}

impl FileRecord {
    /// Case-insensitive substring match over every naming field.
    pub fn loosely_matches(&self, needle_lower: &str) -> bool {
        let contains = |field: &str| field.to_lowercase().contains(needle_lower);

        contains(&self.name)
            || self.original_name.as_deref().is_some_and(contains)
            || self.storage_name.as_deref().is_some_and(contains)
            || contains(&self.storage_path)
    }
}

/// Which step of the lookup chain produced a match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStrategy {
    Name,
    OriginalName,
    StorageName,
    Fuzzy,
}

impl MatchStrategy {
    /// Column consulted by the exact-match steps, in lookup order.
    pub const EXACT: [MatchStrategy; 3] = [
        MatchStrategy::Name,
        MatchStrategy::OriginalName,
        MatchStrategy::StorageName,
    ];

    pub fn column(self) -> Option<&'static str> {
        match self {
            MatchStrategy::Name => Some("name"),
            MatchStrategy::OriginalName => Some("original_name"),
            MatchStrategy::StorageName => Some("storage_name"),
            MatchStrategy::Fuzzy => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ResolvedFile {
    pub file: FileRecord,
    pub matched_by: MatchStrategy,
}
