//! HTTP API server.
//!
//! Exposes the identity engine and local administration over a JSON HTTP API
//! for the desktop clients and CAD integrations that drive imports.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/api/v1/documents/import` | Import a batch of documents |
//! | `POST` | `/api/v1/documents/is-imported` | Imported-state of a batch |
//! | `GET`  | `/api/v1/directories/documents` | Resolved document set of a directory |
//! | `GET`  | `/api/v1/directories/scan` | Reconcile a directory against disk |
//! | `GET`  | `/api/v1/workspace/default-directory` | Effective workspace directory |
//! | `PUT`  | `/api/v1/workspace/default-directory` | Override the workspace directory |
//! | `GET`  | `/api/v1/plugins/subscribers` | Subscribed plugins |
//! | `PUT`  | `/api/v1/plugins/subscribers` | Replace the subscriber list |
//! | `POST` | `/api/v1/plugins/subscribers` | Add one subscriber |
//! | `POST` | `/api/v1/plugins/sync` | Fetch/update all subscribed plugins |
//! | `GET`  | `/api/v1/plugins/local` | Plugins present on disk |
//! | `DELETE` | `/api/v1/plugins/local/{name}` | Remove a local plugin |
//! | `GET`  | `/api/v1/content/{hash}/archive-path` | Blob path for a content hash |
//! | `GET`  | `/api/v1/content/{hash}/side-document` | Cached side document for a content hash |
//! | `POST` | `/api/v1/content/side-documents` | Cache side documents in batch |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! # Error Contract
//!
//! All error responses carry a machine-readable code:
//!
//! ```json
//! { "error": { "code": "not_found", "message": "no side document for hash" } }
//! ```
//!
//! Error codes: `bad_request` (400), `not_found` (404), `conflict` (409),
//! `internal` (500).
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted so browser-embedded
//! clients can call the API directly.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::warn;

use crate::blob::BlobStore;
use crate::config::Config;
use crate::db;
use crate::engine::{Engine, ImportState};
use crate::migrate;
use crate::models::{DocumentRecord, ImportRequest};
use crate::plugins;
use crate::scan::ScanResult;
use crate::settings::{PluginSubscriber, Settings};
use crate::store::SqliteStore;

/// Shared application state passed to all route handlers.
#[derive(Clone)]
struct AppState {
    config: Arc<Config>,
    engine: Engine,
    blobs: Arc<BlobStore>,
    settings: Arc<tokio::sync::Mutex<Settings>>,
}

/// Starts the HTTP server.
///
/// Connects the record store, runs migrations, loads local settings, brings
/// subscribed plugins up to date (best effort), and serves until the process
/// is terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let pool = db::connect(&config.db.path).await?;
    migrate::run_migrations(&pool).await?;

    let store = Arc::new(SqliteStore::new(pool));
    let blobs = Arc::new(BlobStore::new(&config.blobs.path));
    let engine = Engine::new(store, blobs.clone());
    let settings = Settings::load(&config.settings_path())?;

    if let Err(err) = plugins::sync_subscribers(&settings, &config.plugins_dir()).await {
        warn!(%err, "plugin sync at startup failed");
    }

    let bind_addr = config.server.bind.clone();
    let state = AppState {
        config: Arc::new(config.clone()),
        engine,
        blobs,
        settings: Arc::new(tokio::sync::Mutex::new(settings)),
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/api/v1/documents/import", post(handle_import))
        .route("/api/v1/documents/is-imported", post(handle_is_imported))
        .route(
            "/api/v1/directories/documents",
            get(handle_directory_documents),
        )
        .route("/api/v1/directories/scan", get(handle_scan))
        .route(
            "/api/v1/workspace/default-directory",
            get(handle_get_default_directory).put(handle_set_default_directory),
        )
        .route(
            "/api/v1/plugins/subscribers",
            get(handle_get_subscribers)
                .put(handle_set_subscribers)
                .post(handle_add_subscriber),
        )
        .route("/api/v1/plugins/sync", post(handle_sync_plugins))
        .route("/api/v1/plugins/local", get(handle_local_plugins))
        .route("/api/v1/plugins/local/{name}", delete(handle_remove_local_plugin))
        .route(
            "/api/v1/content/{hash}/archive-path",
            get(handle_archive_path),
        )
        .route(
            "/api/v1/content/{hash}/side-document",
            get(handle_side_document),
        )
        .route(
            "/api/v1/content/side-documents",
            post(handle_cache_side_documents),
        )
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(state);

    println!("docvault server listening on http://{}", bind_addr);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    /// Machine-readable error code (e.g., `"bad_request"`, `"not_found"`).
    code: String,
    /// Human-readable error message.
    message: String,
}

/// Internal error type that converts into an HTTP response.
struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
    }
}

fn not_found(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::NOT_FOUND,
        code: "not_found".to_string(),
        message: message.into(),
    }
}

fn conflict(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::CONFLICT,
        code: "conflict".to_string(),
        message: message.into(),
    }
}

fn internal(err: anyhow::Error) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "internal".to_string(),
        message: err.to_string(),
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ Documents ============

async fn handle_import(
    State(state): State<AppState>,
    Json(requests): Json<Vec<ImportRequest>>,
) -> Result<Json<Vec<DocumentRecord>>, AppError> {
    let records = state.engine.import(&requests).await.map_err(internal)?;
    Ok(Json(records))
}

async fn handle_is_imported(
    State(state): State<AppState>,
    Json(requests): Json<Vec<ImportRequest>>,
) -> Result<Json<Vec<ImportState>>, AppError> {
    let states = state.engine.is_imported(&requests).await.map_err(internal)?;
    Ok(Json(states))
}

// ============ Directories ============

#[derive(Deserialize)]
struct DirectoryQuery {
    path: Option<String>,
}

async fn handle_directory_documents(
    State(state): State<AppState>,
    Query(query): Query<DirectoryQuery>,
) -> Result<Json<Vec<DocumentRecord>>, AppError> {
    let path = query
        .path
        .ok_or_else(|| bad_request("path query parameter is required"))?;
    let records = state
        .engine
        .documents_by_directory(&path)
        .await
        .map_err(internal)?;
    Ok(Json(records))
}

async fn handle_scan(
    State(state): State<AppState>,
    Query(query): Query<DirectoryQuery>,
) -> Result<Json<ScanResult>, AppError> {
    let path = match query.path {
        Some(path) => PathBuf::from(path),
        None => {
            let settings = state.settings.lock().await;
            settings
                .effective_default_directory(state.config.workspace.default_directory.as_deref())
                .map(std::path::Path::to_path_buf)
                .ok_or_else(|| bad_request("no path given and no default directory configured"))?
        }
    };
    let result = state.engine.scan_directory(&path).await.map_err(internal)?;
    Ok(Json(result))
}

// ============ Workspace ============

#[derive(Serialize, Deserialize)]
struct DirectoryBody {
    path: PathBuf,
}

async fn handle_get_default_directory(
    State(state): State<AppState>,
) -> Result<Json<DirectoryBody>, AppError> {
    let settings = state.settings.lock().await;
    let path = settings
        .effective_default_directory(state.config.workspace.default_directory.as_deref())
        .map(std::path::Path::to_path_buf)
        .ok_or_else(|| not_found("no default directory configured"))?;
    Ok(Json(DirectoryBody { path }))
}

async fn handle_set_default_directory(
    State(state): State<AppState>,
    Json(body): Json<DirectoryBody>,
) -> Result<StatusCode, AppError> {
    let mut settings = state.settings.lock().await;
    settings.default_directory = Some(body.path);
    settings
        .save(&state.config.settings_path())
        .map_err(internal)?;
    Ok(StatusCode::NO_CONTENT)
}

// ============ Plugins ============

async fn handle_get_subscribers(
    State(state): State<AppState>,
) -> Json<Vec<PluginSubscriber>> {
    let settings = state.settings.lock().await;
    Json(settings.plugin_subscribers.clone())
}

async fn handle_set_subscribers(
    State(state): State<AppState>,
    Json(subscribers): Json<Vec<PluginSubscriber>>,
) -> Result<StatusCode, AppError> {
    let mut settings = state.settings.lock().await;
    settings.plugin_subscribers = subscribers;
    settings
        .save(&state.config.settings_path())
        .map_err(internal)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn handle_add_subscriber(
    State(state): State<AppState>,
    Json(subscriber): Json<PluginSubscriber>,
) -> Result<StatusCode, AppError> {
    let mut settings = state.settings.lock().await;
    settings
        .add_subscriber(subscriber)
        .map_err(|err| conflict(err.to_string()))?;
    settings
        .save(&state.config.settings_path())
        .map_err(internal)?;
    Ok(StatusCode::CREATED)
}

async fn handle_sync_plugins(State(state): State<AppState>) -> Result<StatusCode, AppError> {
    let settings = state.settings.lock().await.clone();
    plugins::sync_subscribers(&settings, &state.config.plugins_dir())
        .await
        .map_err(internal)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn handle_local_plugins(
    State(state): State<AppState>,
) -> Result<Json<Vec<plugins::LocalSubscriber>>, AppError> {
    let local = plugins::local_subscribers(&state.config.plugins_dir()).map_err(internal)?;
    Ok(Json(local))
}

async fn handle_remove_local_plugin(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<StatusCode, AppError> {
    plugins::remove_local_subscriber(&state.config.plugins_dir(), &name)
        .map_err(|err| bad_request(err.to_string()))?;
    Ok(StatusCode::NO_CONTENT)
}

// ============ Content ============

#[derive(Serialize)]
struct ArchivePathResponse {
    path: PathBuf,
}

async fn handle_archive_path(
    State(state): State<AppState>,
    Path(hash): Path<String>,
) -> Json<ArchivePathResponse> {
    Json(ArchivePathResponse {
        path: state.blobs.content_archive_path(&hash),
    })
}

async fn handle_side_document(
    State(state): State<AppState>,
    Path(hash): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let value = state
        .engine
        .archive
        .side_document_by_content(&hash)
        .await
        .map_err(internal)?;
    match value {
        Some(value) => Ok(Json(value)),
        None => Err(not_found(format!("no side document for hash {hash}"))),
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SideDocumentEntry {
    content_hash: String,
    side_document: serde_json::Value,
}

async fn handle_cache_side_documents(
    State(state): State<AppState>,
    Json(entries): Json<Vec<SideDocumentEntry>>,
) -> Result<StatusCode, AppError> {
    for entry in &entries {
        state
            .engine
            .archive
            .cache_side_document(&entry.content_hash, &entry.side_document)
            .await
            .map_err(internal)?;
    }
    Ok(StatusCode::NO_CONTENT)
}
