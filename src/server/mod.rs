//! # Server Module
//!
//! HTTP front end for the comparison engine.
//!
//! ## Routes
//! - `GET /` - upload form
//! - `POST /` - compare the `file_upload` field, render the verdict and artifacts
//! - `POST /api/compare` - same comparison, JSON report
//! - `GET /static/*path` - files under the static root (artifacts included)
//!
//! Comparisons run on the blocking thread pool, one at a time: the
//! candidate slot and the artifact files are shared by every request.

mod templates;

pub use templates::{render_error, render_index, ArtifactUrls};

use crate::config::ServiceConfig;
use crate::core::artifacts::ArtifactKey;
use crate::core::engine::DiffEngine;
use crate::core::reporter::ComparisonReport;
use crate::error::{ImageDiffError, ServerError};
use axum::extract::{DefaultBodyLimit, Multipart, Path as UrlPath, State};
use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

/// Name of the multipart field carrying the uploaded image
pub const UPLOAD_FIELD: &str = "file_upload";

/// Multipart overhead allowed on top of the upload limit
const MULTIPART_SLACK: usize = 64 * 1024;

/// Shared state of the HTTP server
#[derive(Clone)]
pub struct AppState {
    engine: Arc<DiffEngine>,
    comparison_lock: Arc<Mutex<()>>,
}

impl AppState {
    /// Create the state for a configuration
    pub fn new(config: ServiceConfig) -> Self {
        Self {
            engine: Arc::new(DiffEngine::new(config)),
            comparison_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn config(&self) -> &ServiceConfig {
        self.engine.config()
    }
}

/// An uploaded file read from a multipart request
struct Upload {
    file_name: String,
    bytes: Vec<u8>,
}

/// Build the application router
pub fn router(state: AppState) -> Router {
    let body_limit = state.config().max_upload_bytes + MULTIPART_SLACK;
    Router::new()
        .route("/", get(index).post(upload_form))
        .route("/api/compare", post(upload_api))
        .route("/static/*path", get(static_file))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}

/// Bind, bootstrap directories and serve until Ctrl-C
pub async fn serve(config: ServiceConfig) -> Result<(), ImageDiffError> {
    config.validate()?;
    config.ensure_directories()?;

    let reference = config.reference_path();
    if !reference.exists() {
        warn!(
            path = %reference.display(),
            "reference image is missing; comparisons will fail until it is added"
        );
    }

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .map_err(|e| ServerError::Bind {
            addr: config.bind_addr.clone(),
            source: e,
        })?;
    info!(addr = %config.bind_addr, static_dir = %config.static_dir.display(), "listening");

    axum::serve(listener, router(AppState::new(config)))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(ServerError::Serve)?;

    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "failed to listen for shutdown signal");
    }
}

async fn index() -> Html<String> {
    Html(render_index(None, None))
}

async fn upload_form(State(state): State<AppState>, multipart: Multipart) -> Response {
    let result = async {
        let upload = read_upload(multipart, state.config().max_upload_bytes).await?;
        run_comparison(&state, upload).await
    }
    .await;

    match result {
        Ok(report) => {
            let urls = ArtifactUrls::from_paths(
                &report.artifacts,
                &state.config().static_dir,
                report.compared_at.timestamp_millis(),
            );
            Html(render_index(Some(&report.prediction()), urls.as_ref())).into_response()
        }
        Err(e) => (failure_status(&e), Html(render_error(&e.to_string()))).into_response(),
    }
}

async fn upload_api(State(state): State<AppState>, multipart: Multipart) -> Response {
    let result = async {
        let upload = read_upload(multipart, state.config().max_upload_bytes).await?;
        run_comparison(&state, upload).await
    }
    .await;

    match result {
        Ok(report) => Json(report).into_response(),
        Err(e) => (
            failure_status(&e),
            Json(serde_json::json!({ "error": e.to_string() })),
        )
            .into_response(),
    }
}

async fn static_file(State(state): State<AppState>, UrlPath(path): UrlPath<String>) -> Response {
    let Some(full_path) = resolve_static(&state.config().static_dir, &path) else {
        warn!(path, "rejected static path");
        return StatusCode::BAD_REQUEST.into_response();
    };

    match tokio::fs::read(&full_path).await {
        Ok(bytes) => (
            [
                (header::CONTENT_TYPE, content_type(&full_path)),
                (header::CACHE_CONTROL, "no-cache"),
            ],
            bytes,
        )
            .into_response(),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => StatusCode::NOT_FOUND.into_response(),
        Err(e) => {
            error!(path = %full_path.display(), error = %e, "failed to read static file");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

async fn read_upload(mut multipart: Multipart, limit: usize) -> Result<Upload, ImageDiffError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ServerError::Multipart(e.to_string()))?
    {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }
        let file_name = field.file_name().unwrap_or("upload").to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ServerError::Multipart(e.to_string()))?;
        if bytes.len() > limit {
            return Err(ServerError::UploadTooLarge {
                size: bytes.len(),
                limit,
            }
            .into());
        }
        return Ok(Upload {
            file_name,
            bytes: bytes.to_vec(),
        });
    }

    Err(ServerError::MissingUpload {
        field: UPLOAD_FIELD.to_string(),
    }
    .into())
}

async fn run_comparison(state: &AppState, upload: Upload) -> Result<ComparisonReport, ImageDiffError> {
    let engine = Arc::clone(&state.engine);
    let key = if engine.config().per_request_artifacts {
        ArtifactKey::new_request()
    } else {
        ArtifactKey::Latest
    };
    info!(file = %upload.file_name, size = upload.bytes.len(), "comparing upload");

    run_exclusive(&state.comparison_lock, move || {
        engine.compare_upload(&upload.bytes, &upload.file_name, &key)
    })
    .await
}

/// Run blocking work while holding `lock`.
///
/// The guard moves into the blocking task, so the lock stays held until the
/// work finishes even if the request future is dropped first.
async fn run_exclusive<T, F>(lock: &Arc<Mutex<()>>, work: F) -> Result<T, ImageDiffError>
where
    F: FnOnce() -> Result<T, ImageDiffError> + Send + 'static,
    T: Send + 'static,
{
    let guard = Arc::clone(lock).lock_owned().await;
    tokio::task::spawn_blocking(move || {
        let _guard = guard;
        work()
    })
    .await
    .map_err(|e| ServerError::Task(e.to_string()))?
}

fn status_for(error: &ImageDiffError) -> StatusCode {
    match error {
        ImageDiffError::Server(ServerError::UploadTooLarge { .. }) => StatusCode::PAYLOAD_TOO_LARGE,
        e if e.is_client_error() => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Status for a failed comparison; service-side failures are logged with their full chain
fn failure_status(error: &ImageDiffError) -> StatusCode {
    let status = status_for(error);
    if status.is_server_error() {
        error!(error = ?error, "comparison request failed");
    }
    status
}

/// Join a request path onto the static root, refusing anything that could escape it
fn resolve_static(root: &Path, requested: &str) -> Option<PathBuf> {
    let relative = Path::new(requested);
    let mut resolved = root.to_path_buf();
    let mut depth = 0;
    for component in relative.components() {
        match component {
            Component::Normal(part) => {
                resolved.push(part);
                depth += 1;
            }
            Component::CurDir => {}
            _ => return None,
        }
    }
    (depth > 0).then_some(resolved)
}

fn content_type(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .as_deref()
    {
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("bmp") => "image/bmp",
        Some("css") => "text/css",
        Some("js") => "application/javascript",
        Some("html") => "text/html; charset=utf-8",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn resolve_static_rejects_traversal() {
        let root = Path::new("static");
        assert!(resolve_static(root, "../Cargo.toml").is_none());
        assert!(resolve_static(root, "generated/../../secret").is_none());
        assert!(resolve_static(root, "/etc/passwd").is_none());
        assert!(resolve_static(root, "").is_none());
    }

    #[test]
    fn resolve_static_joins_normal_paths() {
        let resolved = resolve_static(Path::new("static"), "generated/image_diff.jpg").unwrap();
        assert_eq!(resolved, PathBuf::from("static/generated/image_diff.jpg"));
    }

    #[test]
    fn content_type_from_extension() {
        assert_eq!(content_type(Path::new("a.JPG")), "image/jpeg");
        assert_eq!(content_type(Path::new("a.png")), "image/png");
        assert_eq!(content_type(Path::new("a.bin")), "application/octet-stream");
    }

    #[test]
    fn client_errors_map_to_bad_request() {
        let missing: ImageDiffError = ServerError::MissingUpload {
            field: UPLOAD_FIELD.to_string(),
        }
        .into();
        assert_eq!(status_for(&missing), StatusCode::BAD_REQUEST);

        let too_large: ImageDiffError = ServerError::UploadTooLarge { size: 10, limit: 5 }.into();
        assert_eq!(status_for(&too_large), StatusCode::PAYLOAD_TOO_LARGE);

        let config = ImageDiffError::Config("bad".to_string());
        assert_eq!(status_for(&config), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn lock_is_held_until_blocking_work_finishes() {
        let lock = Arc::new(Mutex::new(()));
        let slow = run_exclusive(&lock, || {
            std::thread::sleep(Duration::from_millis(300));
            Ok(())
        });

        // Dropping the caller's future must not release the lock early
        let timed_out = tokio::time::timeout(Duration::from_millis(20), slow).await;
        assert!(timed_out.is_err());
        assert!(lock.try_lock().is_err());

        let _released = lock.lock().await;
    }

    #[tokio::test]
    async fn exclusive_work_returns_its_result() {
        let lock = Arc::new(Mutex::new(()));
        let value = run_exclusive(&lock, || Ok(42)).await.unwrap();
        assert_eq!(value, 42);
        assert!(lock.try_lock().is_ok());
    }
}
