use crate::db::Database;
use crate::error::{AppError, Result};
use crate::models::{FileRecord, Folder, MatchStrategy, ResolvedFile};

/// Number of newest files the fuzzy step scans when no window is configured
pub const DEFAULT_FUZZY_WINDOW: i64 = 100;

/// File lookups inside a folder
pub struct FileService;

impl FileService {
    /// Get a folder by ID
    pub async fn get_folder(db: &Database, folder_id: &str) -> Result<Option<Folder>> {
        sqlx::query_as("SELECT * FROM folders WHERE id = ?")
            .bind(folder_id)
            .fetch_optional(db.pool())
            .await
            .map_err(AppError::lookup)
    }

    /// Get a folder and check that `user_id` owns it
    pub async fn get_owned_folder(db: &Database, user_id: &str, folder_id: &str) -> Result<Folder> {
        let folder = Self::get_folder(db, folder_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Folder not found".to_string()))?;

        if folder.user_id != user_id {
            return Err(AppError::Forbidden("Access denied".to_string()));
        }

        Ok(folder)
    }

    /// List the files of a folder, newest first
    pub async fn list_folder_files(db: &Database, folder_id: &str) -> Result<Vec<FileRecord>> {
        sqlx::query_as("SELECT * FROM files WHERE folder_id = ? ORDER BY created_at DESC, id DESC")
            .bind(folder_id)
            .fetch_all(db.pool())
            .await
            .map_err(AppError::lookup)
    }

    /// Resolve a requested file name to a single record.
    ///
    /// Tries, in order: exact display name, exact `original_name`, exact
    /// `storage_name`, then a case-insensitive substring scan over the
    /// `fuzzy_window` newest files. Within a step the newest record wins,
    /// ties broken by the greater id. The name is tried as given first; a
    /// percent-decoded form is only a fallback, so literal `%XX` names still
    /// match exactly. `Ok(None)` means nothing matched; read failures
    /// surface as `LookupFailed`.
    pub async fn resolve_file(
        db: &Database,
        folder_id: &str,
        token: &str,
        fuzzy_window: i64,
    ) -> Result<Option<ResolvedFile>> {
        let candidates = candidate_tokens(token);
        if candidates.is_empty() {
            return Ok(None);
        }

        for candidate in &candidates {
            for strategy in MatchStrategy::EXACT {
                if let Some(file) = Self::find_exact(db, folder_id, strategy, candidate).await? {
                    tracing::debug!(folder_id, token = %candidate, ?strategy, file_id = %file.id, "File resolved");
                    return Ok(Some(ResolvedFile {
                        file,
                        matched_by: strategy,
                    }));
                }
            }
        }

        let recent: Vec<FileRecord> = sqlx::query_as(
            "SELECT * FROM files WHERE folder_id = ? ORDER BY created_at DESC, id DESC LIMIT ?",
        )
        .bind(folder_id)
        .bind(fuzzy_window.max(1))
        .fetch_all(db.pool())
        .await
        .map_err(AppError::lookup)?;

        let found = candidates.iter().find_map(|candidate| {
            let needle = candidate.to_lowercase();
            recent.iter().find(|f| f.loosely_matches(&needle)).cloned()
        });

        match &found {
            Some(file) => {
                tracing::debug!(folder_id, token = %token, file_id = %file.id, "File resolved by fuzzy scan")
            }
            None => tracing::debug!(folder_id, token = %token, "No file matched"),
        }

        Ok(found.map(|file| ResolvedFile {
            file,
            matched_by: MatchStrategy::Fuzzy,
        }))
    }

    async fn find_exact(
        db: &Database,
        folder_id: &str,
        strategy: MatchStrategy,
        token: &str,
    ) -> Result<Option<FileRecord>> {
        let Some(column) = strategy.column() else {
            return Ok(None);
        };

        // `column` comes from a fixed list, never from the request.
        let sql = format!(
            "SELECT * FROM files WHERE folder_id = ? AND {} = ? ORDER BY created_at DESC, id DESC LIMIT 1",
            column
        );

        sqlx::query_as(&sql)
            .bind(folder_id)
            .bind(token)
            .fetch_optional(db.pool())
            .await
            .map_err(AppError::lookup)
    }
}

/// Names to try for a requested token: the trimmed token itself, then its
/// percent-decoded form when that differs. Blank forms are skipped.
fn candidate_tokens(raw: &str) -> Vec<String> {
    let mut candidates = Vec::with_capacity(2);

    let trimmed = raw.trim();
    if !trimmed.is_empty() {
        candidates.push(trimmed.to_string());
    }

    if let Ok(decoded) = urlencoding::decode(trimmed) {
        let decoded = decoded.trim();
        if !decoded.is_empty() && decoded != trimmed {
            candidates.push(decoded.to_string());
        }
    }

    candidates
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{insert_folder, setup_db, FileFixture};

    #[test]
    fn candidates_keep_the_literal_name_first() {
        assert_eq!(candidate_tokens("my%20photo.jpg"), vec!["my%20photo.jpg", "my photo.jpg"]);
        assert_eq!(candidate_tokens("  a.png "), vec!["a.png"]);
        assert!(candidate_tokens("   ").is_empty());
        assert_eq!(candidate_tokens("%20"), vec!["%20"]);
    }

    #[tokio::test]
    async fn literal_percent_names_match_exactly() {
        let db = setup_db().await;
        insert_folder(&db, "f1", "owner-1").await;
        FileFixture::new("spaced", "f1", "a%20b.jpg").insert(&db).await;
        FileFixture::new("percent", "f1", "100%25.jpg").insert(&db).await;

        let spaced = FileService::resolve_file(&db, "f1", "a%20b.jpg", DEFAULT_FUZZY_WINDOW)
            .await
            .unwrap()
            .unwrap();
        let percent = FileService::resolve_file(&db, "f1", "100%25.jpg", DEFAULT_FUZZY_WINDOW)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(spaced.file.id, "spaced");
        assert_eq!(spaced.matched_by, MatchStrategy::Name);
        assert_eq!(percent.file.id, "percent");
        assert_eq!(percent.matched_by, MatchStrategy::Name);
    }

    #[tokio::test]
    async fn encoded_request_still_finds_decoded_name() {
        let db = setup_db().await;
        insert_folder(&db, "f1", "owner-1").await;
        FileFixture::new("a", "f1", "my photo.jpg").insert(&db).await;

        let resolved = FileService::resolve_file(&db, "f1", "my%20photo.jpg", DEFAULT_FUZZY_WINDOW)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(resolved.file.id, "a");
        assert_eq!(resolved.matched_by, MatchStrategy::Name);
    }

    #[tokio::test]
    async fn exact_name_wins_first() {
        let db = setup_db().await;
        insert_folder(&db, "f1", "owner-1").await;
        FileFixture::new("a", "f1", "cover.jpg").insert(&db).await;
        FileFixture::new("b", "f1", "other.jpg")
            .original_name("cover.jpg")
            .insert(&db)
            .await;

        let resolved = FileService::resolve_file(&db, "f1", "cover.jpg", DEFAULT_FUZZY_WINDOW)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(resolved.file.id, "a");
        assert_eq!(resolved.matched_by, MatchStrategy::Name);
    }

    #[tokio::test]
    async fn original_name_before_storage_name() {
        let db = setup_db().await;
        insert_folder(&db, "f1", "owner-1").await;
        FileFixture::new("a", "f1", "x.jpg")
            .storage_name("legacy.jpg")
            .age_minutes(1)
            .insert(&db)
            .await;
        FileFixture::new("b", "f1", "y.jpg")
            .original_name("legacy.jpg")
            .age_minutes(5)
            .insert(&db)
            .await;

        let resolved = FileService::resolve_file(&db, "f1", "legacy.jpg", DEFAULT_FUZZY_WINDOW)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(resolved.file.id, "b");
        assert_eq!(resolved.matched_by, MatchStrategy::OriginalName);
    }

    #[tokio::test]
    async fn storage_name_match_is_not_reported_as_fuzzy() {
        let db = setup_db().await;
        insert_folder(&db, "f1", "owner-1").await;
        FileFixture::new("beach", "f1", "2024_01_01_beach.jpg")
            .storage_name("IMG_1002.jpg")
            .insert(&db)
            .await;

        let resolved = FileService::resolve_file(&db, "f1", "IMG_1002.jpg", DEFAULT_FUZZY_WINDOW)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(resolved.file.id, "beach");
        assert_eq!(resolved.matched_by, MatchStrategy::StorageName);
    }

    #[tokio::test]
    async fn storage_name_beats_newer_substring_match() {
        let db = setup_db().await;
        insert_folder(&db, "f1", "owner-1").await;
        FileFixture::new("exact", "f1", "holiday.jpg")
            .storage_name("IMG_1002.jpg")
            .age_minutes(60)
            .insert(&db)
            .await;
        FileFixture::new("substring", "f1", "copy of IMG_1002.jpg.png")
            .insert(&db)
            .await;

        let resolved = FileService::resolve_file(&db, "f1", "IMG_1002.jpg", DEFAULT_FUZZY_WINDOW)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(resolved.file.id, "exact");
    }

    #[tokio::test]
    async fn fuzzy_step_is_case_insensitive_and_prefers_newest() {
        let db = setup_db().await;
        insert_folder(&db, "f1", "owner-1").await;
        FileFixture::new("old", "f1", "Sunset_Old.JPG")
            .age_minutes(30)
            .insert(&db)
            .await;
        FileFixture::new("new", "f1", "SUNSET_new.jpg")
            .age_minutes(1)
            .insert(&db)
            .await;

        let resolved = FileService::resolve_file(&db, "f1", "sunset", DEFAULT_FUZZY_WINDOW)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(resolved.file.id, "new");
        assert_eq!(resolved.matched_by, MatchStrategy::Fuzzy);
    }

    #[tokio::test]
    async fn fuzzy_step_searches_storage_path() {
        let db = setup_db().await;
        insert_folder(&db, "f1", "owner-1").await;
        FileFixture::new("a", "f1", "photo.jpg")
            .storage_path("users/owner-1/f1/9f8e7d.jpg")
            .insert(&db)
            .await;

        let resolved = FileService::resolve_file(&db, "f1", "9F8E7D", DEFAULT_FUZZY_WINDOW)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(resolved.file.id, "a");
    }

    #[tokio::test]
    async fn fuzzy_window_bounds_the_scan() {
        let db = setup_db().await;
        insert_folder(&db, "f1", "owner-1").await;
        FileFixture::new("ancient", "f1", "needle.jpg")
            .age_minutes(100)
            .insert(&db)
            .await;
        for i in 0..3 {
            FileFixture::new(&format!("recent-{}", i), "f1", &format!("hay-{}.jpg", i))
                .age_minutes(i)
                .insert(&db)
                .await;
        }

        let within = FileService::resolve_file(&db, "f1", "needle", 4).await.unwrap();
        let outside = FileService::resolve_file(&db, "f1", "needle", 3).await.unwrap();

        assert!(within.is_some());
        assert!(outside.is_none());
    }

    #[tokio::test]
    async fn other_folders_are_ignored() {
        let db = setup_db().await;
        insert_folder(&db, "f1", "owner-1").await;
        insert_folder(&db, "f2", "owner-1").await;
        FileFixture::new("a", "f2", "cover.jpg").insert(&db).await;

        let resolved = FileService::resolve_file(&db, "f1", "cover.jpg", DEFAULT_FUZZY_WINDOW)
            .await
            .unwrap();

        assert!(resolved.is_none());
    }

    #[tokio::test]
    async fn read_failure_is_not_reported_as_missing() {
        let db = setup_db().await;
        db.pool().close().await;

        let err = FileService::resolve_file(&db, "f1", "cover.jpg", DEFAULT_FUZZY_WINDOW)
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::LookupFailed(_)));
    }

    #[tokio::test]
    async fn owned_folder_check() {
        let db = setup_db().await;
        insert_folder(&db, "f1", "owner-1").await;

        assert!(FileService::get_owned_folder(&db, "owner-1", "f1").await.is_ok());
        assert!(matches!(
            FileService::get_owned_folder(&db, "intruder", "f1").await,
            Err(AppError::Forbidden(_))
        ));
        assert!(matches!(
            FileService::get_owned_folder(&db, "owner-1", "missing").await,
            Err(AppError::NotFound(_))
        ));
    }
}
