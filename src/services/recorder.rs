use chrono::{DateTime, Utc};
use tokio::sync::mpsc;

use crate::db::Database;
use crate::error::Result;

/// Longest referrer key kept in the histogram
const MAX_REFERRER_LEN: usize = 255;

/// A granted visit waiting to be counted
#[derive(Debug, Clone)]
pub struct AccessEvent {
    pub share_id: String,
    pub referrer: Option<String>,
    pub visitor_id: Option<String>,
    pub at: DateTime<Utc>,
}

impl AccessEvent {
    pub fn new(share_id: &str, referrer: Option<String>, visitor_id: Option<String>) -> Self {
        Self {
            share_id: share_id.to_string(),
            referrer,
            visitor_id,
            at: Utc::now(),
        }
    }
}

/// Hands granted visits to a background worker. Submitting never waits and
/// never fails; a full queue drops the event with a warning.
#[derive(Clone)]
pub struct AccessRecorder {
    tx: mpsc::Sender<AccessEvent>,
}

impl AccessRecorder {
    /// Create the recorder and spawn its worker on the current runtime
    pub fn spawn(db: Database, queue_size: usize) -> Self {
        let (recorder, rx) = Self::channel(queue_size);

        tokio::spawn(async move {
            Self::run(db, rx).await;
        });

        tracing::info!(queue_size, "Access recorder started");
        recorder
    }

    /// Recorder whose events land in the returned receiver
    pub fn channel(queue_size: usize) -> (Self, mpsc::Receiver<AccessEvent>) {
        let (tx, rx) = mpsc::channel(queue_size.max(1));
        (Self { tx }, rx)
    }

    pub fn submit(&self, event: AccessEvent) {
        if let Err(e) = self.tx.try_send(event) {
            match e {
                mpsc::error::TrySendError::Full(event) => {
                    tracing::warn!(share_id = %event.share_id, "Access recorder queue is full, dropping event");
                }
                mpsc::error::TrySendError::Closed(event) => {
                    tracing::warn!(share_id = %event.share_id, "Access recorder is not running, dropping event");
                }
            }
        }
    }

    async fn run(db: Database, mut rx: mpsc::Receiver<AccessEvent>) {
        while let Some(event) = rx.recv().await {
            if let Err(e) = Self::record_access(&db, &event).await {
                tracing::warn!(share_id = %event.share_id, error = %e, "Failed to record share access");
            }
        }
        tracing::info!("Access recorder stopped");
    }

    /// Count one visit. Returns `false` when the token has no statistics
    /// record, which is not an error.
    pub async fn record_access(db: &Database, event: &AccessEvent) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE share_stats SET total_clicks = total_clicks + 1, last_accessed_at = ? WHERE share_id = ?",
        )
        .bind(event.at)
        .bind(&event.share_id)
        .execute(db.pool())
        .await?;

        if result.rows_affected() == 0 {
            tracing::debug!(share_id = %event.share_id, "No statistics record for share, skipping");
            return Ok(false);
        }

        sqlx::query("UPDATE galleries SET views = views + 1 WHERE share_id = ?")
            .bind(&event.share_id)
            .execute(db.pool())
            .await?;

        if let Some(referrer) = event.referrer.as_deref().and_then(normalize_referrer) {
            sqlx::query(
                r#"
                INSERT INTO share_stat_referrers (share_id, referrer, count) VALUES (?, ?, 1)
                ON CONFLICT(share_id, referrer) DO UPDATE SET count = count + 1
                "#,
            )
            .bind(&event.share_id)
            .bind(&referrer)
            .execute(db.pool())
            .await?;
        }

        if let Some(visitor_id) = event.visitor_id.as_deref().filter(|v| !v.is_empty()) {
            let first_visit = sqlx::query(
                "INSERT OR IGNORE INTO share_visitors (share_id, visitor_id, first_seen_at) VALUES (?, ?, ?)",
            )
            .bind(&event.share_id)
            .bind(visitor_id)
            .bind(event.at)
            .execute(db.pool())
            .await?
            .rows_affected()
                == 1;

            if first_visit {
                sqlx::query(
                    "UPDATE share_stats SET unique_visitors = unique_visitors + 1 WHERE share_id = ?",
                )
                .bind(&event.share_id)
                .execute(db.pool())
                .await?;
            }
        }

        Ok(true)
    }
}

/// Reduce a referrer to a histogram key: the host for URLs, the trimmed
/// text otherwise. Blank referrers are not counted.
pub fn normalize_referrer(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(parsed) = url::Url::parse(trimmed) {
        if let Some(host) = parsed.host_str() {
            return Some(host.to_lowercase());
        }
    }

    Some(trimmed.chars().take(MAX_REFERRER_LEN).collect())
}
