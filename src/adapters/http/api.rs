//! Inbound HTTP API.

use crate::application::dispatcher::JobDispatcher;
use crate::application::pipeline::DynJobPipeline;
use crate::config::AppConfig;
use crate::error::{PipelineError, PipelineResult};
use crate::ports::registry::JobRegistryPort;
use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Multipart, Path as UrlPath, Request, State},
    http::{header, HeaderValue, Method, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    BoxError, Json, Router,
};
use futures::{Stream, TryStreamExt};
use regex::Regex;
use serde_json::json;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, OnceLock};
use tokio::{fs::File, io::BufWriter};
use tokio_util::io::StreamReader;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};
use uuid::Uuid;

const UPLOAD_FIELD: &str = "file";

#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<DynJobPipeline>,
    pub registry: Arc<dyn JobRegistryPort>,
    pub dispatcher: JobDispatcher,
    /// Shared secret expected in `Authorization`; `None` disables the check.
    pub api_secret_key: Option<String>,
}

#[derive(Clone, Debug)]
pub struct RouterOptions {
    pub cors_allowed_origin: Option<String>,
    pub body_limit_bytes: usize,
}

impl RouterOptions {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            cors_allowed_origin: config.cors_allowed_origin.clone(),
            body_limit_bytes: config.body_limit_bytes,
        }
    }
}

pub fn router(state: AppState, options: &RouterOptions) -> Router {
    let protected = Router::new()
        .route("/transcode/video", post(transcode_video))
        .route("/transcode/image", post(transcode_image))
        .route("/transcode/job/:job_id", post(transcode_job))
        .route("/transcribe/audio", post(transcribe_audio))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_secret));

    Router::new()
        .route("/ping", get(ping))
        .merge(protected)
        .layer(DefaultBodyLimit::max(options.body_limit_bytes))
        .layer(cors_layer(options.cors_allowed_origin.as_deref()))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(origin: Option<&str>) -> CorsLayer {
    let Some(origin) = origin else {
        return CorsLayer::new()
            .allow_origin(Any)
            .allow_methods([Method::GET, Method::POST, Method::HEAD, Method::OPTIONS])
            .allow_headers(Any);
    };

    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::HEAD, Method::OPTIONS])
        .allow_headers([
            header::ORIGIN,
            header::CONTENT_TYPE,
            header::ACCEPT,
            header::CONTENT_LENGTH,
            header::ACCEPT_LANGUAGE,
            header::ACCEPT_ENCODING,
            header::AUTHORIZATION,
        ])
        .allow_credentials(true);
    match HeaderValue::from_str(origin) {
        Ok(value) => layer.allow_origin(value),
        Err(e) => {
            warn!(origin, error = %e, "Ignoring invalid CORS origin");
            layer
        }
    }
}

impl IntoResponse for PipelineError {
    fn into_response(self) -> Response {
        if self.is_validation() {
            warn!(error = %self, "Rejected request");
            StatusCode::BAD_REQUEST.into_response()
        } else {
            error!(error = %self, "Request failed");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

async fn require_secret(State(state): State<AppState>, request: Request, next: Next) -> Response {
    if let Some(secret) = &state.api_secret_key {
        let provided = request
            .headers()
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok());
        if provided != Some(secret.as_str()) {
            return StatusCode::UNAUTHORIZED.into_response();
        }
    }
    next.run(request).await
}

async fn ping() -> &'static str {
    "Pong!"
}

async fn transcode_video(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<serde_json::Value>, PipelineError> {
    let upload_dir = scratch_dir(&state)?;
    let source = save_upload(&mut multipart, UPLOAD_FIELD, upload_dir.path()).await?;

    let (master, duration) = state.pipeline.transcode_video(&source).await?;
    info!(master = %master, duration, "Video transcoded");
    Ok(Json(json!({ "dir": master, "videoDuration": duration })))
}

async fn transcode_image(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, PipelineError> {
    let upload_dir = scratch_dir(&state)?;
    let source = save_upload(&mut multipart, UPLOAD_FIELD, upload_dir.path()).await?;

    let converted = state.pipeline.convert_image(&source).await?;
    let bytes = tokio::fs::read(&converted).await?;
    Ok(([(header::CONTENT_TYPE, "image/webp")], bytes))
}

fn job_id_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z0-9_-]{1,128}$").expect("job id pattern compiles"))
}

async fn transcode_job(State(state): State<AppState>, UrlPath(job_id): UrlPath<String>) -> Response {
    if !job_id_pattern().is_match(&job_id) {
        return StatusCode::BAD_REQUEST.into_response();
    }

    let job = match state.registry.get_job(&job_id).await {
        Ok(job) => job,
        Err(e) => {
            warn!(job_id = %job_id, error = %e, "Job lookup failed");
            return StatusCode::NOT_FOUND.into_response();
        }
    };

    match state.dispatcher.submit(job) {
        Ok(()) => StatusCode::ACCEPTED.into_response(),
        Err(e) => e.into_response(),
    }
}

async fn transcribe_audio(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<serde_json::Value>, PipelineError> {
    let upload_dir = scratch_dir(&state)?;
    let source = save_upload(&mut multipart, UPLOAD_FIELD, upload_dir.path()).await?;

    let tracks = state.pipeline.transcribe(&source).await?;
    Ok(Json(json!({ "tracks": tracks })))
}

fn scratch_dir(state: &AppState) -> PipelineResult<tempfile::TempDir> {
    Ok(tempfile::Builder::new()
        .prefix("upload-")
        .tempdir_in(&state.pipeline.settings().scratch_root)?)
}

/// Stream the named multipart field into `dir` under a random name that
/// keeps the uploaded file's extension.
pub async fn save_upload(
    multipart: &mut Multipart,
    field_name: &str,
    dir: &Path,
) -> PipelineResult<PathBuf> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| PipelineError::validation(e.to_string()))?
    {
        if field.name() != Some(field_name) {
            continue;
        }

        let original = field
            .file_name()
            .map(str::to_owned)
            .ok_or_else(|| PipelineError::validation("upload has no file name"))?;
        if !path_is_valid(Path::new(&original)) {
            return Err(PipelineError::validation(format!(
                "invalid file name {:?}",
                original
            )));
        }

        let extension = Path::new(&original)
            .extension()
            .map(|ext| format!(".{}", ext.to_string_lossy()))
            .unwrap_or_default();
        let path = dir.join(format!("{}{}", Uuid::new_v4(), extension));
        stream_to_file(&path, field).await?;
        return Ok(path);
    }

    Err(PipelineError::validation(format!(
        "missing multipart field {:?}",
        field_name
    )))
}

// Save a `Stream` to a file
async fn stream_to_file<S, E>(path: &Path, stream: S) -> PipelineResult<()>
where
    S: Stream<Item = Result<Bytes, E>>,
    E: Into<BoxError>,
{
    let body_with_io_error = stream.map_err(|err| io::Error::new(io::ErrorKind::Other, err));
    let body_reader = StreamReader::new(body_with_io_error);
    futures::pin_mut!(body_reader);

    let mut file = BufWriter::new(File::create(path).await?);
    tokio::io::copy(&mut body_reader, &mut file).await?;
    tokio::io::AsyncWriteExt::flush(&mut file).await?;
    Ok(())
}

fn path_is_valid(path: &Path) -> bool {
    path.components()
        .all(|component| matches!(component, Component::Normal(_)))
}
