use argon2::{
    password_hash::{rand_core::OsRng, PasswordHasher, SaltString},
    Argon2, PasswordHash, PasswordVerifier,
};
use chrono::Utc;
use rand::{distributions::Alphanumeric, Rng};
use sqlx::{Sqlite, Transaction};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::db::Database;
use crate::error::{AppError, Result};
use crate::models::{Gallery, LinkOptions, PublishGalleryRequest, ShareStats, ShareStatsResponse};
use crate::services::FileService;

const MAX_TOKEN_ATTEMPTS: usize = 10;

/// Owner-side share link management
pub struct ShareService;

impl ShareService {
    /// Look up a gallery by its current share token
    pub async fn find_by_share_id(db: &Database, share_id: &str) -> Result<Option<Gallery>> {
        sqlx::query_as("SELECT * FROM galleries WHERE share_id = ?")
            .bind(share_id)
            .fetch_optional(db.pool())
            .await
            .map_err(AppError::lookup)
    }

    /// Get a gallery owned by `user_id`
    pub async fn get_owned_gallery(db: &Database, user_id: &str, gallery_id: &str) -> Result<Gallery> {
        let gallery: Gallery = sqlx::query_as("SELECT * FROM galleries WHERE id = ?")
            .bind(gallery_id)
            .fetch_optional(db.pool())
            .await
            .map_err(AppError::lookup)?
            .ok_or_else(|| AppError::NotFound("Gallery not found".to_string()))?;

        if gallery.user_id != user_id {
            return Err(AppError::Forbidden("Access denied".to_string()));
        }

        Ok(gallery)
    }

    /// Publish a folder as a gallery with a fresh link
    pub async fn publish_gallery(
        db: &Database,
        user_id: &str,
        req: PublishGalleryRequest,
        token_length: usize,
    ) -> Result<Gallery> {
        let folder = FileService::get_owned_folder(db, user_id, &req.folder_id).await?;

        let name = req.name.trim();
        if name.is_empty() {
            return Err(AppError::BadRequest("Gallery name is required".to_string()));
        }

        let link = PreparedLink::from_options(req.link)?;
        let gallery_id = Uuid::new_v4().to_string();
        let now = Utc::now();

        let mut tx = db.pool().begin().await?;
        let mut inserted: Option<String> = None;
        for _ in 0..MAX_TOKEN_ATTEMPTS {
            let candidate = Self::generate_token(token_length);
            let result = sqlx::query(
                r#"
                INSERT INTO galleries (id, user_id, folder_id, name, created_at, updated_at, expires_at, share_id, share_enabled, share_expires_at, share_password_hash, share_access)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, 1, ?, ?, ?)
                "#,
            )
            .bind(&gallery_id)
            .bind(user_id)
            .bind(&folder.id)
            .bind(name)
            .bind(now)
            .bind(now)
            .bind(req.expires_at)
            .bind(&candidate)
            .bind(link.expires_at)
            .bind(&link.password_hash)
            .bind(link.access)
            .execute(&mut *tx)
            .await;

            match result {
                Ok(_) => {
                    inserted = Some(candidate);
                    break;
                }
                Err(e) if is_unique_violation(&e) => continue,
                Err(e) => return Err(e.into()),
            }
        }

        let share_id = inserted.ok_or_else(|| {
            AppError::Internal("Failed to generate unique share token".to_string())
        })?;
        Self::create_stats(&mut tx, &share_id, &gallery_id).await?;
        tx.commit().await?;

        tracing::info!(gallery_id = %gallery_id, folder_id = %folder.id, "Gallery published");
        Self::get_owned_gallery(db, user_id, &gallery_id).await
    }

    /// Replace the share token. The previous token stops resolving and its
    /// statistics are discarded in the same transaction.
    ///
    /// Concurrent regenerations are last-write-wins: each one commits a
    /// consistent token/statistics pair and the later commit replaces it.
    pub async fn regenerate_link(
        db: &Database,
        user_id: &str,
        gallery_id: &str,
        options: LinkOptions,
        token_length: usize,
    ) -> Result<Gallery> {
        Self::get_owned_gallery(db, user_id, gallery_id).await?;
        let link = PreparedLink::from_options(options)?;

        let mut tx = db.pool().begin().await?;

        // Re-read inside the transaction so the stats we drop belong to the
        // token we are replacing, even if another regeneration just landed.
        let (previous,): (String,) = sqlx::query_as("SELECT share_id FROM galleries WHERE id = ?")
            .bind(gallery_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| AppError::NotFound("Gallery not found".to_string()))?;

        let mut replaced: Option<String> = None;
        for _ in 0..MAX_TOKEN_ATTEMPTS {
            let candidate = Self::generate_token(token_length);
            let result = sqlx::query(
                r#"
                UPDATE galleries
                SET share_id = ?, share_enabled = 1, share_expires_at = ?, share_password_hash = ?, share_access = ?, updated_at = ?
                WHERE id = ?
                "#,
            )
            .bind(&candidate)
            .bind(link.expires_at)
            .bind(&link.password_hash)
            .bind(link.access)
            .bind(Utc::now())
            .bind(gallery_id)
            .execute(&mut *tx)
            .await;

            match result {
                Ok(_) => {
                    replaced = Some(candidate);
                    break;
                }
                Err(e) if is_unique_violation(&e) => continue,
                Err(e) => return Err(e.into()),
            }
        }

        let share_id = replaced.ok_or_else(|| {
            AppError::Internal("Failed to generate unique share token".to_string())
        })?;

        Self::delete_stats(&mut tx, &previous).await?;
        Self::create_stats(&mut tx, &share_id, gallery_id).await?;
        tx.commit().await?;

        tracing::info!(gallery_id, "Share link regenerated");
        Self::get_owned_gallery(db, user_id, gallery_id).await
    }

    /// Toggle the link without touching the token
    pub async fn set_enabled(
        db: &Database,
        user_id: &str,
        gallery_id: &str,
        enabled: bool,
    ) -> Result<Gallery> {
        Self::get_owned_gallery(db, user_id, gallery_id).await?;

        sqlx::query("UPDATE galleries SET share_enabled = ?, updated_at = ? WHERE id = ?")
            .bind(enabled)
            .bind(Utc::now())
            .bind(gallery_id)
            .execute(db.pool())
            .await?;

        tracing::info!(gallery_id, enabled, "Share link toggled");
        Self::get_owned_gallery(db, user_id, gallery_id).await
    }

    /// Enable or disable several galleries. Either all of them change or none.
    pub async fn batch_set_enabled(
        db: &Database,
        user_id: &str,
        gallery_ids: &[String],
        enabled: bool,
    ) -> Result<usize> {
        let ids = dedup_ids(gallery_ids)?;
        let mut tx = db.pool().begin().await?;
        let now = Utc::now();

        for id in &ids {
            let result = sqlx::query(
                "UPDATE galleries SET share_enabled = ?, updated_at = ? WHERE id = ? AND user_id = ?",
            )
            .bind(enabled)
            .bind(now)
            .bind(id)
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

            if result.rows_affected() == 0 {
                // Dropping the transaction rolls back the rows already touched.
                return Err(AppError::NotFound(format!("Gallery not found: {}", id)));
            }
        }

        tx.commit().await?;
        tracing::info!(count = ids.len(), enabled, "Batch share toggle applied");
        Ok(ids.len())
    }

    /// Delete a gallery along with its statistics
    pub async fn delete_gallery(db: &Database, user_id: &str, gallery_id: &str) -> Result<()> {
        Self::batch_delete(db, user_id, &[gallery_id.to_string()]).await?;
        Ok(())
    }

    /// Delete several galleries in one transaction
    pub async fn batch_delete(db: &Database, user_id: &str, gallery_ids: &[String]) -> Result<usize> {
        let ids = dedup_ids(gallery_ids)?;
        let mut tx = db.pool().begin().await?;

        for id in &ids {
            let row: Option<(String,)> =
                sqlx::query_as("SELECT share_id FROM galleries WHERE id = ? AND user_id = ?")
                    .bind(id)
                    .bind(user_id)
                    .fetch_optional(&mut *tx)
                    .await?;

            let Some((share_id,)) = row else {
                return Err(AppError::NotFound(format!("Gallery not found: {}", id)));
            };

            Self::delete_stats(&mut tx, &share_id).await?;
            sqlx::query("DELETE FROM galleries WHERE id = ?")
                .bind(id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        tracing::info!(count = ids.len(), "Galleries deleted");
        Ok(ids.len())
    }

    /// Statistics of the gallery's current link
    pub async fn get_stats(db: &Database, user_id: &str, gallery_id: &str) -> Result<ShareStatsResponse> {
        let gallery = Self::get_owned_gallery(db, user_id, gallery_id).await?;

        let stats: ShareStats = sqlx::query_as("SELECT * FROM share_stats WHERE share_id = ?")
            .bind(&gallery.share_id)
            .fetch_optional(db.pool())
            .await
            .map_err(AppError::lookup)?
            .ok_or_else(|| AppError::NotFound("Share statistics not found".to_string()))?;

        let rows: Vec<(String, i64)> = sqlx::query_as(
            "SELECT referrer, count FROM share_stat_referrers WHERE share_id = ?",
        )
        .bind(&gallery.share_id)
        .fetch_all(db.pool())
        .await
        .map_err(AppError::lookup)?;

        Ok(ShareStatsResponse {
            stats,
            referrers: rows.into_iter().collect::<BTreeMap<_, _>>(),
        })
    }

    /// Random lowercase alphanumeric token, safe to embed in a URL
    pub fn generate_token(length: usize) -> String {
        rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(length)
            .map(char::from)
            .collect::<String>()
            .to_lowercase()
    }

    /// Hash password using Argon2
    pub fn hash_password(password: &str) -> Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        let argon2 = Argon2::default();

        let password_hash = argon2
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| AppError::Internal(format!("Password hashing failed: {}", e)))?
            .to_string();

        Ok(password_hash)
    }

    /// Verify a visitor-supplied password against the stored hash.
    /// A corrupt hash never verifies.
    pub fn verify_password(password: &str, hash: &str) -> bool {
        let parsed_hash = match PasswordHash::new(hash) {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::error!(error = %e, "Stored share password hash is unreadable");
                return false;
            }
        };

        Argon2::default()
            .verify_password(password.as_bytes(), &parsed_hash)
            .is_ok()
    }

    async fn create_stats(
        tx: &mut Transaction<'_, Sqlite>,
        share_id: &str,
        gallery_id: &str,
    ) -> Result<()> {
        sqlx::query("INSERT INTO share_stats (share_id, gallery_id, created_at) VALUES (?, ?, ?)")
            .bind(share_id)
            .bind(gallery_id)
            .bind(Utc::now())
            .execute(&mut **tx)
            .await?;
        Ok(())
    }

    async fn delete_stats(tx: &mut Transaction<'_, Sqlite>, share_id: &str) -> Result<()> {
        sqlx::query("DELETE FROM share_stat_referrers WHERE share_id = ?")
            .bind(share_id)
            .execute(&mut **tx)
            .await?;
        sqlx::query("DELETE FROM share_visitors WHERE share_id = ?")
            .bind(share_id)
            .execute(&mut **tx)
            .await?;
        sqlx::query("DELETE FROM share_stats WHERE share_id = ?")
            .bind(share_id)
            .execute(&mut **tx)
            .await?;
        Ok(())
    }
}

/// Link options after validation, with the password already hashed
struct PreparedLink {
    expires_at: Option<chrono::DateTime<Utc>>,
    password_hash: Option<String>,
    access: crate::models::AccessTier,
}

impl PreparedLink {
    fn from_options(options: LinkOptions) -> Result<Self> {
        if let Some(expiry) = options.share_expires_at {
            if expiry <= Utc::now() {
                return Err(AppError::BadRequest(
                    "Link expiry must be in the future".to_string(),
                ));
            }
        }

        let password_hash = match options.password.as_deref() {
            Some(p) if !p.is_empty() => Some(ShareService::hash_password(p)?),
            _ => None,
        };

        Ok(Self {
            expires_at: options.share_expires_at,
            password_hash,
            access: options.access.unwrap_or_default(),
        })
    }
}

fn dedup_ids(ids: &[String]) -> Result<Vec<String>> {
    let mut unique: Vec<String> = Vec::with_capacity(ids.len());
    for id in ids {
        if !unique.contains(id) {
            unique.push(id.clone());
        }
    }
    if unique.is_empty() {
        return Err(AppError::BadRequest("No galleries selected".to_string()));
    }
    Ok(unique)
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.is_unique_violation(),
        _ => false,
    }
}
