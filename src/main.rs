mod blobstore;
mod catalog;
mod config;
mod db;
mod error;
mod folders;
mod handlers;
mod hashing;
mod ingest;
mod middleware;
mod models;
mod usage;

use axum::{
    routing::{get, patch, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::blobstore::BlobStore;
use crate::config::Config;
use crate::db::Database;
use crate::handlers::{file, folder, storage};
use crate::middleware::identity;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub config: Arc<Config>,
    pub blobs: Arc<BlobStore>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "coffer=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting coffer...");

    // Load configuration
    let config = Config::load()?;
    let config = Arc::new(config);
    tracing::info!("Configuration loaded");

    // Initialize database
    let db = Database::new(&config.database.path).await?;
    db.run_migrations().await?;
    tracing::info!("Database initialized");

    // Initialize blob store
    let blobs = Arc::new(BlobStore::new(config.storage.upload_dir.clone()));

    // Create app state
    let state = AppState {
        db,
        config: config.clone(),
        blobs,
    };

    // Build router
    let app = create_router(state);

    // Start server
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_routes = Router::new()
        // Files
        .route(
            "/files",
            get(file::list_files).post(file::upload_file),
        )
        .route("/files/recent", get(file::recent_files))
        .route("/files/starred", get(file::starred_files))
        .route("/files/check-duplicate", post(file::check_duplicate))
        .route("/files/:id", get(file::get_file))
        .route("/files/:id/download", get(file::download_file))
        .route("/files/:id/star", post(file::star_file))
        .route("/files/:id/trash", post(file::trash_file))
        .route("/files/:id/restore", post(file::restore_file))
        // Folders
        .route(
            "/folders",
            get(folder::list_folders).post(folder::create_folder),
        )
        .route(
            "/folders/:id",
            patch(folder::rename_folder).delete(folder::delete_folder),
        )
        // Storage accounting
        .route("/storage/usage", get(storage::usage))
        .route("/storage/quota", get(storage::quota))
        .layer(axum::middleware::from_fn(identity::identity_middleware));

    Router::new()
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
