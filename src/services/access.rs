use chrono::Utc;

use crate::db::Database;
use crate::error::Result;
use crate::models::AccessOutcome;
use crate::services::{AccessEvent, AccessRecorder, FileService, ShareService};

const MAX_SHARE_TOKEN_LEN: usize = 128;

/// Request-side context that only matters once access is granted
#[derive(Debug, Clone, Default)]
pub struct VisitContext {
    pub referrer: Option<String>,
    pub visitor_id: Option<String>,
    /// Set for requests that ride on an earlier visit, such as file fetches
    pub skip_recording: bool,
}

/// Decides what a visitor holding a public link may see
pub struct AccessService;

impl AccessService {
    /// Evaluate a share token.
    ///
    /// Checks run in a fixed order and stop at the first failure: the link
    /// exists, is enabled, has not expired, the password (if any) matches,
    /// and the access tier allows anonymous viewing. Unknown or malformed
    /// tokens are `NotFound`; a failed read is `LookupFailed`. A grant is
    /// handed to the recorder without waiting for it.
    pub async fn resolve_access(
        db: &Database,
        recorder: &AccessRecorder,
        share_token: &str,
        credential: Option<&str>,
        visit: VisitContext,
    ) -> Result<AccessOutcome> {
        let share_token = share_token.trim();
        if !is_well_formed(share_token) {
            return Ok(AccessOutcome::NotFound);
        }

        let Some(gallery) = ShareService::find_by_share_id(db, share_token).await? else {
            return Ok(AccessOutcome::NotFound);
        };

        if !gallery.share_enabled {
            return Ok(AccessOutcome::Disabled);
        }

        if gallery.link_expired_at(Utc::now()) {
            return Ok(AccessOutcome::Expired);
        }

        if gallery.has_password() {
            let hash = gallery.share_password_hash.as_deref().unwrap_or_default();
            let satisfied = credential
                .filter(|c| !c.is_empty())
                .is_some_and(|c| ShareService::verify_password(c, hash));
            if !satisfied {
                return Ok(AccessOutcome::PasswordRequired);
            }
        }

        if !gallery.share_access.allows_anonymous() {
            return Ok(AccessOutcome::RequiresAuthenticatedView {
                gallery_id: gallery.id,
                owner_id: gallery.user_id,
            });
        }

        let Some(folder) = FileService::get_folder(db, &gallery.folder_id).await? else {
            tracing::warn!(gallery_id = %gallery.id, folder_id = %gallery.folder_id, "Shared folder no longer exists");
            return Ok(AccessOutcome::NotFound);
        };

        if !visit.skip_recording {
            recorder.submit(AccessEvent::new(
                &gallery.share_id,
                visit.referrer,
                visit.visitor_id,
            ));
        }

        Ok(AccessOutcome::Granted { gallery, folder })
    }
}

fn is_well_formed(token: &str) -> bool {
    !token.is_empty()
        && token.len() <= MAX_SHARE_TOKEN_LEN
        && token
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}
