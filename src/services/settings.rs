use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::db::Database;
use crate::error::{AppError, Result};
use crate::models::{FolderSettings, StoredFolderSettings};

/// Entry bound used when the caller does not pick one
pub const DEFAULT_CACHE_CAPACITY: usize = 10_000;

/// Cached settings with the document version they came from
#[derive(Clone)]
struct CachedSettings {
    settings: FolderSettings,
    version: i64,
    expires_at: DateTime<Utc>,
}

/// Time-bounded cache of folder sharing settings.
///
/// Every entry carries the version of the stored document it was built
/// from, and an entry is never replaced by an older version. A read that
/// started before a write therefore cannot put pre-write settings back
/// after `invalidate`. Concurrent misses are not coalesced.
///
/// The map holds at most `capacity` entries. When full, expired entries
/// are dropped first, then the one closest to expiry.
#[derive(Clone)]
pub struct SettingsCache {
    db: Database,
    entries: Arc<RwLock<HashMap<String, CachedSettings>>>,
    ttl: Duration,
    capacity: usize,
}

impl SettingsCache {
    pub fn new(db: Database, ttl: std::time::Duration) -> Self {
        Self {
            db,
            entries: Arc::new(RwLock::new(HashMap::new())),
            ttl: Duration::from_std(ttl).unwrap_or_else(|_| Duration::minutes(5)),
            capacity: DEFAULT_CACHE_CAPACITY,
        }
    }

    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity.max(1);
        self
    }

    /// Settings for `folder_id`, read through on a miss or stale entry
    pub async fn get(&self, folder_id: &str) -> Result<FolderSettings> {
        let now = Utc::now();
        {
            let entries = self.entries.read().await;
            if let Some(cached) = entries.get(folder_id) {
                if cached.expires_at > now {
                    return Ok(cached.settings.clone());
                }
            }
        }

        let (stored, version) = Self::load_stored(&self.db, folder_id).await?;
        Ok(self.store(folder_id, FolderSettings::from(stored), version).await)
    }

    /// Replace the cached entry right after a write of `version`
    pub async fn invalidate(&self, folder_id: &str, settings: FolderSettings, version: i64) {
        self.store(folder_id, settings, version).await;
        tracing::debug!(folder_id, version, "Folder settings cache refreshed");
    }

    /// Insert unless a newer version is already cached; returns what the
    /// cache holds afterwards.
    async fn store(&self, folder_id: &str, settings: FolderSettings, version: i64) -> FolderSettings {
        let now = Utc::now();
        let mut entries = self.entries.write().await;

        let newer = entries
            .get(folder_id)
            .filter(|existing| existing.version > version)
            .map(|existing| existing.settings.clone());
        if let Some(newer) = newer {
            tracing::debug!(folder_id, version, "Skipping settings older than the cached entry");
            return newer;
        }

        if !entries.contains_key(folder_id) && entries.len() >= self.capacity {
            Self::evict(&mut entries, now);
        }

        entries.insert(
            folder_id.to_string(),
            CachedSettings {
                settings: settings.clone(),
                version,
                expires_at: now + self.ttl,
            },
        );
        settings
    }

    fn evict(entries: &mut HashMap<String, CachedSettings>, now: DateTime<Utc>) {
        entries.retain(|_, entry| entry.expires_at > now);
        if entries.is_empty() {
            return;
        }

        let oldest = entries
            .iter()
            .min_by_key(|(_, entry)| entry.expires_at)
            .map(|(key, _)| key.clone());
        if let Some(key) = oldest {
            entries.remove(&key);
        }
    }

    /// Raw settings document and its version; empty at version 0 when none
    /// was ever written
    async fn load_stored(db: &Database, folder_id: &str) -> Result<(StoredFolderSettings, i64)> {
        let row: Option<(String, i64)> =
            sqlx::query_as("SELECT settings, version FROM folder_settings WHERE folder_id = ?")
                .bind(folder_id)
                .fetch_optional(db.pool())
                .await
                .map_err(AppError::lookup)?;

        match row {
            Some((raw, version)) => Ok((parse_document(folder_id, &raw), version)),
            None => Ok((StoredFolderSettings::default(), 0)),
        }
    }
}

fn parse_document(folder_id: &str, raw: &str) -> StoredFolderSettings {
    match serde_json::from_str(raw) {
        Ok(stored) => stored,
        Err(e) => {
            tracing::warn!(folder_id, error = %e, "Unreadable folder settings, using defaults");
            StoredFolderSettings::default()
        }
    }
}

/// Folder settings writes
pub struct SettingsService;

impl SettingsService {
    /// Merge `patch` into the stored document, persist it, and refresh the cache.
    ///
    /// The merge runs inside the upsert, so concurrent updates touching
    /// different fields both survive. An unreadable stored document is
    /// replaced by the patch.
    pub async fn update_settings(
        db: &Database,
        cache: &SettingsCache,
        folder_id: &str,
        patch: StoredFolderSettings,
    ) -> Result<FolderSettings> {
        let raw = serde_json::to_string(&patch)
            .map_err(|e| AppError::Internal(format!("Failed to encode settings: {}", e)))?;

        let (merged, version): (String, i64) = sqlx::query_as(
            r#"
            INSERT INTO folder_settings (folder_id, settings, version, updated_at) VALUES (?, ?, 1, ?)
            ON CONFLICT(folder_id) DO UPDATE SET
                settings = CASE
                    WHEN json_valid(folder_settings.settings)
                        THEN json_patch(folder_settings.settings, excluded.settings)
                    ELSE excluded.settings
                END,
                version = folder_settings.version + 1,
                updated_at = excluded.updated_at
            RETURNING settings, version
            "#,
        )
        .bind(folder_id)
        .bind(&raw)
        .bind(Utc::now())
        .fetch_one(db.pool())
        .await?;

        let settings = FolderSettings::from(parse_document(folder_id, &merged));
        cache.invalidate(folder_id, settings.clone(), version).await;
        tracing::info!(folder_id, version, "Folder settings updated");
        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ControlBarPosition;
    use crate::test_helpers::setup_db;

    async fn write_raw(db: &Database, folder_id: &str, raw: &str) {
        sqlx::query(
            r#"
            INSERT INTO folder_settings (folder_id, settings, updated_at) VALUES (?, ?, ?)
            ON CONFLICT(folder_id) DO UPDATE SET settings = excluded.settings
            "#,
        )
        .bind(folder_id)
        .bind(raw)
        .bind(Utc::now())
        .execute(db.pool())
        .await
        .unwrap();
    }

    fn five_minutes() -> std::time::Duration {
        std::time::Duration::from_secs(300)
    }

    #[tokio::test]
    async fn missing_document_yields_defaults() {
        let db = setup_db().await;
        let cache = SettingsCache::new(db, five_minutes());

        assert_eq!(cache.get("f1").await.unwrap(), FolderSettings::default());
    }

    #[tokio::test]
    async fn fresh_entry_is_served_from_cache() {
        let db = setup_db().await;
        let cache = SettingsCache::new(db.clone(), five_minutes());
        cache.get("f1").await.unwrap();

        write_raw(&db, "f1", r#"{"show_download_button":false}"#).await;

        assert!(cache.get("f1").await.unwrap().show_download_button);
    }

    #[tokio::test]
    async fn invalidate_replaces_entry_immediately() {
        let db = setup_db().await;
        let cache = SettingsCache::new(db.clone(), five_minutes());
        cache.get("f1").await.unwrap();

        write_raw(&db, "f1", r#"{"control_bar_position":"top"}"#).await;
        let new_settings = FolderSettings {
            control_bar_position: ControlBarPosition::Top,
            ..FolderSettings::default()
        };
        cache.invalidate("f1", new_settings.clone(), 1).await;

        // A closed pool proves the next read never reaches the store.
        db.pool().close().await;
        assert_eq!(cache.get("f1").await.unwrap(), new_settings);
    }

    #[tokio::test]
    async fn stale_entry_is_reloaded() {
        let db = setup_db().await;
        let cache = SettingsCache::new(db.clone(), std::time::Duration::ZERO);
        cache.get("f1").await.unwrap();

        write_raw(&db, "f1", r#"{"show_copy_link_button":false}"#).await;

        assert!(!cache.get("f1").await.unwrap().show_copy_link_button);
    }

    #[tokio::test]
    async fn corrupt_document_falls_back_to_defaults() {
        let db = setup_db().await;
        write_raw(&db, "f1", "not json").await;
        let cache = SettingsCache::new(db, five_minutes());

        assert_eq!(cache.get("f1").await.unwrap(), FolderSettings::default());
    }

    #[tokio::test]
    async fn read_failure_surfaces_as_lookup_failed() {
        let db = setup_db().await;
        let cache = SettingsCache::new(db.clone(), five_minutes());
        db.pool().close().await;

        assert!(matches!(
            cache.get("f1").await,
            Err(AppError::LookupFailed(_))
        ));
    }

    #[tokio::test]
    async fn update_merges_and_refreshes_cache() {
        let db = setup_db().await;
        let cache = SettingsCache::new(db.clone(), five_minutes());
        write_raw(&db, "f1", r#"{"show_share_buttons":false}"#).await;
        cache.get("f1").await.unwrap();

        let patch: StoredFolderSettings =
            serde_json::from_str(r#"{"show_download_button":false}"#).unwrap();
        let updated = SettingsService::update_settings(&db, &cache, "f1", patch)
            .await
            .unwrap();

        assert!(!updated.show_share_buttons);
        assert!(!updated.show_download_button);
        assert_eq!(cache.get("f1").await.unwrap(), updated);

        let (raw,): (String,) =
            sqlx::query_as("SELECT settings FROM folder_settings WHERE folder_id = 'f1'")
                .fetch_one(db.pool())
                .await
                .unwrap();
        let stored: StoredFolderSettings = serde_json::from_str(&raw).unwrap();
        assert_eq!(stored.show_share_buttons, Some(false));
        assert_eq!(stored.show_download_button, Some(false));
        assert_eq!(stored.control_bar_position, None);
    }

    #[tokio::test]
    async fn read_started_before_a_write_cannot_undo_it() {
        let db = setup_db().await;
        let cache = SettingsCache::new(db.clone(), five_minutes());

        // A reader loads the document, then a write lands before it stores.
        let (before, version) = SettingsCache::load_stored(&db, "f1").await.unwrap();
        let patch: StoredFolderSettings =
            serde_json::from_str(r#"{"show_share_buttons":false}"#).unwrap();
        let updated = SettingsService::update_settings(&db, &cache, "f1", patch)
            .await
            .unwrap();

        let served = cache.store("f1", FolderSettings::from(before), version).await;
        assert_eq!(served, updated);

        db.pool().close().await;
        assert_eq!(cache.get("f1").await.unwrap(), updated);
    }

    #[tokio::test]
    async fn unknown_folders_cannot_grow_the_cache_past_capacity() {
        let db = setup_db().await;
        let cache = SettingsCache::new(db, std::time::Duration::ZERO).with_capacity(100);

        for i in 0..5000 {
            cache.get(&format!("nonexistent-{}", i)).await.unwrap();
        }

        assert!(cache.entries.read().await.len() <= 100);
    }

    #[tokio::test]
    async fn full_cache_evicts_entry_closest_to_expiry() {
        let db = setup_db().await;
        let cache = SettingsCache::new(db, five_minutes()).with_capacity(3);

        for id in ["a", "b", "c", "d"] {
            cache.get(id).await.unwrap();
            tokio::time::sleep(std::time::Duration::from_millis(2)).await;
        }

        let entries = cache.entries.read().await;
        assert_eq!(entries.len(), 3);
        assert!(!entries.contains_key("a"));
        assert!(entries.contains_key("d"));
    }

    #[tokio::test]
    async fn concurrent_updates_keep_both_fields() {
        let db = setup_db().await;
        let cache = SettingsCache::new(db.clone(), five_minutes());

        let first: StoredFolderSettings =
            serde_json::from_str(r#"{"show_download_button":false}"#).unwrap();
        let second: StoredFolderSettings =
            serde_json::from_str(r#"{"platforms":{"email":false}}"#).unwrap();

        let (a, b) = tokio::join!(
            SettingsService::update_settings(&db, &cache, "f1", first),
            SettingsService::update_settings(&db, &cache, "f1", second),
        );
        a.unwrap();
        b.unwrap();

        let (stored, version) = SettingsCache::load_stored(&db, "f1").await.unwrap();
        assert_eq!(version, 2);
        assert_eq!(stored.show_download_button, Some(false));
        assert_eq!(stored.platforms.and_then(|p| p.email), Some(false));

        let cached = cache.get("f1").await.unwrap();
        assert!(!cached.show_download_button);
        assert!(!cached.platforms.email);
        assert!(cached.platforms.facebook);
    }

    #[tokio::test]
    async fn update_replaces_unreadable_document() {
        let db = setup_db().await;
        write_raw(&db, "f1", "not json").await;
        let cache = SettingsCache::new(db.clone(), five_minutes());

        let patch: StoredFolderSettings =
            serde_json::from_str(r#"{"control_bar_position":"top"}"#).unwrap();
        let updated = SettingsService::update_settings(&db, &cache, "f1", patch)
            .await
            .unwrap();

        assert_eq!(updated.control_bar_position, ControlBarPosition::Top);
        assert!(updated.show_share_buttons);
    }
}
