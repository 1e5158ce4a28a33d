mod config;
mod db;
mod error;
mod handlers;
mod middleware;
mod models;
mod services;
#[cfg(test)]
mod test_helpers;

use axum::{
    routing::{delete, get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;
use crate::db::Database;
use crate::services::{AccessRecorder, SettingsCache};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub config: Arc<Config>,
    pub settings: SettingsCache,
    pub recorder: AccessRecorder,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "galleria=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Galleria...");

    let config = Arc::new(Config::load()?);
    tracing::info!("Configuration loaded");

    let db = Database::new(&config.database.path).await?;
    db.run_migrations().await?;
    tracing::info!("Database initialized");

    let settings = SettingsCache::new(
        db.clone(),
        std::time::Duration::from_secs(config.share.settings_cache_ttl_secs),
    )
    .with_capacity(config.share.settings_cache_capacity);
    let recorder = AccessRecorder::spawn(db.clone(), config.share.stats_queue_size);

    let state = AppState {
        db,
        config: config.clone(),
        settings,
        recorder,
    };

    let app = create_router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Public routes (no auth required)
    let public_routes = Router::new()
        .route("/public/gallery/:token", get(handlers::share::get_public_gallery))
        .route("/public/gallery/:token/unlock", post(handlers::share::unlock_gallery))
        .route(
            "/public/gallery/:token/files/:name",
            get(handlers::share::get_public_file),
        )
        .route(
            "/public/folders/:folder_id/settings",
            get(handlers::settings::get_public_settings),
        );

    // Owner routes (auth required)
    let protected_routes = Router::new()
        .route("/galleries", post(handlers::share::publish_gallery))
        .route("/galleries/batch/enable", post(handlers::share::batch_enable))
        .route("/galleries/batch/disable", post(handlers::share::batch_disable))
        .route("/galleries/batch/delete", post(handlers::share::batch_delete))
        .route("/galleries/:id", delete(handlers::share::delete_gallery))
        .route("/galleries/:id/link", post(handlers::share::regenerate_link))
        .route("/galleries/:id/enabled", put(handlers::share::set_enabled))
        .route("/galleries/:id/stats", get(handlers::share::get_stats))
        .route(
            "/folders/:id/settings",
            get(handlers::settings::get_settings).put(handlers::settings::update_settings),
        )
        .route("/folders/:id/files", get(handlers::file::list_files))
        .route("/folders/:id/files/:name", get(handlers::file::resolve_file))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::auth_middleware,
        ));

    Router::new()
        .nest("/api/v1", public_routes.merge(protected_routes))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
