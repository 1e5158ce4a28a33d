use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Extension, Json,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use uuid::Uuid;

use crate::error::{ApiResponse, AppError, Result};
use crate::models::{
    AccessOutcome, AccessResponse, AccessState, BatchGalleryRequest, BatchResult, CurrentUser,
    Gallery, LinkOptions, PublicGalleryView, PublishGalleryRequest, ResolvedFile,
    SetEnabledRequest, ShareStatsResponse, UnlockGalleryRequest,
};
use crate::services::{AccessService, FileService, ShareService, VisitContext};
use crate::AppState;

const PASSWORD_COOKIE: &str = "ga_pass";
const VISITOR_COOKIE: &str = "ga_visitor";
const PASSWORD_HEADER: &str = "x-gallery-password";

/// Get a public gallery
/// GET /api/v1/public/gallery/:token
pub async fn get_public_gallery(
    State(state): State<AppState>,
    Path(token): Path<String>,
    jar: CookieJar,
    headers: HeaderMap,
) -> Result<(CookieJar, Response)> {
    let credential = headers
        .get(PASSWORD_HEADER)
        .and_then(|h| h.to_str().ok())
        .map(|s| s.to_string())
        .or_else(|| jar.get(PASSWORD_COOKIE).map(|c| c.value().to_string()));

    let (jar, visit) = visit_context(&state, jar, &headers);
    let outcome =
        AccessService::resolve_access(&state.db, &state.recorder, &token, credential.as_deref(), visit)
            .await?;

    let response = render_outcome(&state, &token, outcome).await?;
    Ok((jar, response))
}

/// Verify a gallery password and remember it for this link
/// POST /api/v1/public/gallery/:token/unlock
pub async fn unlock_gallery(
    State(state): State<AppState>,
    Path(token): Path<String>,
    jar: CookieJar,
    headers: HeaderMap,
    Json(req): Json<UnlockGalleryRequest>,
) -> Result<(CookieJar, Response)> {
    let (jar, visit) = visit_context(&state, jar, &headers);
    let outcome =
        AccessService::resolve_access(&state.db, &state.recorder, &token, Some(&req.password), visit)
            .await?;

    let jar = if outcome.is_granted() {
        let cookie = Cookie::build((PASSWORD_COOKIE, req.password))
            .http_only(true)
            .same_site(SameSite::Strict)
            .secure(state.config.jwt.cookie_secure)
            .path(format!("/api/v1/public/gallery/{}", token))
            .build();
        jar.add(cookie)
    } else {
        jar
    };

    let response = render_outcome(&state, &token, outcome).await?;
    Ok((jar, response))
}

/// Resolve a file inside a shared gallery. The access check runs again but
/// the fetch is not counted as a link visit.
/// GET /api/v1/public/gallery/:token/files/:name
pub async fn get_public_file(
    State(state): State<AppState>,
    Path((token, name)): Path<(String, String)>,
    jar: CookieJar,
    headers: HeaderMap,
) -> Result<(CookieJar, Response)> {
    let credential = headers
        .get(PASSWORD_HEADER)
        .and_then(|h| h.to_str().ok())
        .map(|s| s.to_string())
        .or_else(|| jar.get(PASSWORD_COOKIE).map(|c| c.value().to_string()));

    let (jar, mut visit) = visit_context(&state, jar, &headers);
    visit.skip_recording = true;
    let outcome =
        AccessService::resolve_access(&state.db, &state.recorder, &token, credential.as_deref(), visit)
            .await?;

    let folder = match outcome {
        AccessOutcome::Granted { folder, .. } => folder,
        other => {
            let response = render_outcome(&state, &token, other).await?;
            return Ok((jar, response));
        }
    };

    let resolved: ResolvedFile =
        FileService::resolve_file(&state.db, &folder.id, &name, state.config.share.fuzzy_window)
            .await?
            .ok_or_else(|| AppError::NotFound("File not found".to_string()))?;

    Ok((jar, Json(ApiResponse::success(resolved)).into_response()))
}

/// Publish a folder as a gallery
/// POST /api/v1/galleries
pub async fn publish_gallery(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Json(req): Json<PublishGalleryRequest>,
) -> Result<Json<ApiResponse<Gallery>>> {
    let gallery = ShareService::publish_gallery(
        &state.db,
        &current_user.id,
        req,
        state.config.share.token_length,
    )
    .await?;
    Ok(Json(ApiResponse::success(gallery)))
}

/// Delete a gallery
/// DELETE /api/v1/galleries/:id
pub async fn delete_gallery(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<()>>> {
    ShareService::delete_gallery(&state.db, &current_user.id, &id).await?;
    Ok(Json(ApiResponse::<()>::success_message("Gallery deleted")))
}

/// Issue a new share link
/// POST /api/v1/galleries/:id/link
pub async fn regenerate_link(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Path(id): Path<String>,
    Json(options): Json<LinkOptions>,
) -> Result<Json<ApiResponse<Gallery>>> {
    let gallery = ShareService::regenerate_link(
        &state.db,
        &current_user.id,
        &id,
        options,
        state.config.share.token_length,
    )
    .await?;
    Ok(Json(ApiResponse::success(gallery)))
}

/// Enable or disable a share link
/// PUT /api/v1/galleries/:id/enabled
pub async fn set_enabled(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Path(id): Path<String>,
    Json(req): Json<SetEnabledRequest>,
) -> Result<Json<ApiResponse<Gallery>>> {
    let gallery = ShareService::set_enabled(&state.db, &current_user.id, &id, req.enabled).await?;
    Ok(Json(ApiResponse::success(gallery)))
}

/// POST /api/v1/galleries/batch/enable
pub async fn batch_enable(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Json(req): Json<BatchGalleryRequest>,
) -> Result<Json<ApiResponse<BatchResult>>> {
    let updated =
        ShareService::batch_set_enabled(&state.db, &current_user.id, &req.gallery_ids, true).await?;
    Ok(Json(ApiResponse::success(BatchResult { updated })))
}

/// POST /api/v1/galleries/batch/disable
pub async fn batch_disable(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Json(req): Json<BatchGalleryRequest>,
) -> Result<Json<ApiResponse<BatchResult>>> {
    let updated =
        ShareService::batch_set_enabled(&state.db, &current_user.id, &req.gallery_ids, false).await?;
    Ok(Json(ApiResponse::success(BatchResult { updated })))
}

/// POST /api/v1/galleries/batch/delete
pub async fn batch_delete(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Json(req): Json<BatchGalleryRequest>,
) -> Result<Json<ApiResponse<BatchResult>>> {
    let updated = ShareService::batch_delete(&state.db, &current_user.id, &req.gallery_ids).await?;
    Ok(Json(ApiResponse::success(BatchResult { updated })))
}

/// Share link statistics
/// GET /api/v1/galleries/:id/stats
pub async fn get_stats(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<ShareStatsResponse>>> {
    let stats = ShareService::get_stats(&state.db, &current_user.id, &id).await?;
    Ok(Json(ApiResponse::success(stats)))
}

/// Referrer header plus the anonymous visitor cookie, minted on first visit
fn visit_context(state: &AppState, jar: CookieJar, headers: &HeaderMap) -> (CookieJar, VisitContext) {
    let referrer = headers
        .get("referer")
        .and_then(|h| h.to_str().ok())
        .map(|s| s.to_string());

    let (jar, visitor_id) = match jar.get(VISITOR_COOKIE).map(|c| c.value().to_string()) {
        Some(id) => (jar, id),
        None => {
            let id = Uuid::new_v4().to_string();
            let cookie = Cookie::build((VISITOR_COOKIE, id.clone()))
                .http_only(true)
                .same_site(SameSite::Lax)
                .secure(state.config.jwt.cookie_secure)
                .path("/api/v1/public")
                .build();
            (jar.add(cookie), id)
        }
    };

    (
        jar,
        VisitContext {
            referrer,
            visitor_id: Some(visitor_id),
            skip_recording: false,
        },
    )
}

/// Turn an access outcome into a response. Missing, disabled and expired
/// links render identically so the reason is not revealed.
async fn render_outcome(state: &AppState, token: &str, outcome: AccessOutcome) -> Result<Response> {
    let access_state = outcome.state();

    let response = match outcome {
        AccessOutcome::NotFound | AccessOutcome::Disabled | AccessOutcome::Expired => {
            tracing::debug!(share_id = %token, state = ?access_state, "Gallery unavailable");
            (
                StatusCode::NOT_FOUND,
                Json(ApiResponse::<()>::error(404, "Gallery unavailable")),
            )
                .into_response()
        }
        AccessOutcome::PasswordRequired => (
            StatusCode::UNAUTHORIZED,
            Json(ApiResponse::with_code(
                401,
                "Password required",
                AccessResponse::<PublicGalleryView> {
                    state: AccessState::PasswordRequired,
                    redirect_target: None,
                    owner_id: None,
                    gallery: None,
                },
            )),
        )
            .into_response(),
        AccessOutcome::RequiresAuthenticatedView { gallery_id, owner_id } => {
            let target = format!("{}/{}", state.config.share.authenticated_view_base, gallery_id);
            Json(ApiResponse::success(AccessResponse::<PublicGalleryView> {
                state: AccessState::RequiresAuthenticatedView,
                redirect_target: Some(target),
                owner_id: Some(owner_id),
                gallery: None,
            }))
            .into_response()
        }
        AccessOutcome::Granted { gallery, folder } => {
            let files = FileService::list_folder_files(&state.db, &folder.id).await?;
            let settings = state.settings.get(&folder.id).await?;

            let view = PublicGalleryView {
                id: gallery.id,
                name: gallery.name,
                folder_name: folder.name,
                layout: gallery.layout,
                color_scheme: gallery.color_scheme,
                watermark: gallery.watermark,
                allow_comments: gallery.allow_comments,
                allow_downloads: gallery.allow_downloads,
                created_at: gallery.created_at,
                files,
                settings,
            };
            Json(ApiResponse::success(AccessResponse {
                state: AccessState::Granted,
                redirect_target: None,
                owner_id: None,
                gallery: Some(view),
            }))
            .into_response()
        }
    };

    Ok(response)
}
