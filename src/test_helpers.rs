//! Fixtures shared by the service and handler tests.

use chrono::{DateTime, Duration, Utc};

use jsonwebtoken::{encode, EncodingKey, Header};

use crate::config::Config;
use crate::db::Database;
use crate::models::{AccessTier, Claims};
use crate::services::ShareService;

pub async fn setup_db() -> Database {
    Database::open_in_memory().await.unwrap()
}

pub async fn insert_folder(db: &Database, id: &str, user_id: &str) {
    sqlx::query("INSERT INTO folders (id, user_id, name, created_at) VALUES (?, ?, ?, ?)")
        .bind(id)
        .bind(user_id)
        .bind(format!("Folder {}", id))
        .bind(Utc::now())
        .execute(db.pool())
        .await
        .unwrap();
}

/// Authorization header value for an owner session signed with the current secret
pub fn bearer_for(config: &Config, sub: &str) -> String {
    let now = Utc::now().timestamp();
    let claims = Claims {
        sub: sub.to_string(),
        exp: (now + 600) as usize,
        iat: now as usize,
    };
    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.jwt.secret.as_bytes()),
    )
    .unwrap();
    format!("Bearer {}", token)
}

/// File row builder; `age_minutes` pushes `created_at` into the past.
pub struct FileFixture {
    pub id: String,
    pub folder_id: String,
    pub name: String,
    pub original_name: Option<String>,
    pub storage_name: Option<String>,
    pub storage_path: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl FileFixture {
    pub fn new(id: &str, folder_id: &str, name: &str) -> Self {
        Self {
            id: id.to_string(),
            folder_id: folder_id.to_string(),
            name: name.to_string(),
            original_name: None,
            storage_name: None,
            storage_path: None,
            created_at: Utc::now(),
        }
    }

    pub fn original_name(mut self, name: &str) -> Self {
        self.original_name = Some(name.to_string());
        self
    }

    pub fn storage_name(mut self, name: &str) -> Self {
        self.storage_name = Some(name.to_string());
        self
    }

    pub fn storage_path(mut self, path: &str) -> Self {
        self.storage_path = Some(path.to_string());
        self
    }

    pub fn age_minutes(mut self, minutes: i64) -> Self {
        self.created_at = Utc::now() - Duration::minutes(minutes);
        self
    }

    pub async fn insert(self, db: &Database) {
        let storage_path = self
            .storage_path
            .unwrap_or_else(|| format!("objects/{}/{}", self.folder_id, self.id));

        sqlx::query(
            r#"
            INSERT INTO files (id, folder_id, user_id, name, original_name, storage_name, storage_path, mime_type, size, created_at)
            VALUES (?, ?, 'owner-1', ?, ?, ?, ?, 'image/jpeg', 2048, ?)
            "#,
        )
        .bind(&self.id)
        .bind(&self.folder_id)
        .bind(&self.name)
        .bind(&self.original_name)
        .bind(&self.storage_name)
        .bind(storage_path)
        .bind(self.created_at)
        .execute(db.pool())
        .await
        .unwrap();
    }
}

/// Gallery row builder with its statistics record.
pub struct GalleryFixture {
    pub id: String,
    pub folder_id: String,
    pub user_id: String,
    pub share_id: String,
    pub share_enabled: bool,
    pub share_expires_at: Option<DateTime<Utc>>,
    pub password: Option<String>,
    pub access: AccessTier,
}

impl GalleryFixture {
    pub fn new(id: &str, folder_id: &str, share_id: &str) -> Self {
        Self {
            id: id.to_string(),
            folder_id: folder_id.to_string(),
            user_id: "owner-1".to_string(),
            share_id: share_id.to_string(),
            share_enabled: true,
            share_expires_at: None,
            password: None,
            access: AccessTier::Public,
        }
    }

    pub fn owner(mut self, user_id: &str) -> Self {
        self.user_id = user_id.to_string();
        self
    }

    pub fn disabled(mut self) -> Self {
        self.share_enabled = false;
        self
    }

    pub fn link_expires_at(mut self, at: DateTime<Utc>) -> Self {
        self.share_expires_at = Some(at);
        self
    }

    pub fn password(mut self, password: &str) -> Self {
        self.password = Some(password.to_string());
        self
    }

    pub fn access(mut self, access: AccessTier) -> Self {
        self.access = access;
        self
    }

    pub async fn insert(self, db: &Database) {
        let now = Utc::now();
        let password_hash = self
            .password
            .as_deref()
            .map(|p| ShareService::hash_password(p).unwrap());

        sqlx::query(
            r#"
            INSERT INTO galleries (id, user_id, folder_id, name, created_at, updated_at, share_id, share_enabled, share_expires_at, share_password_hash, share_access)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&self.id)
        .bind(&self.user_id)
        .bind(&self.folder_id)
        .bind(format!("Gallery {}", self.id))
        .bind(now)
        .bind(now)
        .bind(&self.share_id)
        .bind(self.share_enabled)
        .bind(self.share_expires_at)
        .bind(password_hash)
        .bind(self.access)
        .execute(db.pool())
        .await
        .unwrap();

        sqlx::query("INSERT INTO share_stats (share_id, gallery_id, created_at) VALUES (?, ?, ?)")
            .bind(&self.share_id)
            .bind(&self.id)
            .bind(now)
            .execute(db.pool())
            .await
            .unwrap();
    }
}
