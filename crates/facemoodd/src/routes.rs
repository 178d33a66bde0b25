//! HTTP routes: landing page, uploaded files, prediction, health.

use crate::render;
use crate::state::SharedState;
use crate::upload;
use axum::{
    body::{Body, Bytes},
    extract::{multipart::MultipartError, DefaultBodyLimit, Multipart, Path, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use facemood_core::{labels, Outcome};
use facemood_store::{NewSubmission, StoreError};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tokio_util::io::ReaderStream;
use tower_http::trace::TraceLayer;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("No file uploaded")]
    NoFile,
    #[error("invalid form: {}", .0.body_text())]
    Multipart(#[from] MultipartError),
    #[error("File not found")]
    NotFound,
    #[error("failed to save upload: {0}")]
    SaveUpload(std::io::Error),
    #[error("failed to record submission: {0}")]
    Store(#[from] StoreError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::NoFile => StatusCode::BAD_REQUEST,
            ApiError::Multipart(e) => e.status(),
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::SaveUpload(_) | ApiError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
            return (status, "Internal server error").into_response();
        }
        (status, self.to_string()).into_response()
    }
}

/// Build the application router.
pub fn router(state: SharedState, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .route("/uploads/:filename", get(uploaded_file))
        .route("/predict", post(predict).layer(DefaultBodyLimit::max(max_upload_bytes)))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// GET / - upload form
pub async fn index() -> Html<&'static str> {
    Html(render::INDEX_HTML)
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub model_loaded: bool,
    pub profile: String,
    pub uptime_seconds: u64,
}

/// GET /health
pub async fn health(State(state): State<SharedState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        model_loaded: state.pipeline.is_available(),
        profile: state.pipeline.profile().name.clone(),
        uptime_seconds: state.uptime_seconds(),
    })
}

/// GET /uploads/:filename - a file directly under the upload directory
pub async fn uploaded_file(
    State(state): State<SharedState>,
    Path(filename): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    if !upload::is_plain_file_name(&filename) {
        tracing::debug!(filename = %filename, "rejected upload path");
        return Err(ApiError::NotFound);
    }

    let canonical_dir = tokio::fs::canonicalize(&state.upload_dir)
        .await
        .map_err(|_| ApiError::NotFound)?;
    let canonical_file = tokio::fs::canonicalize(state.upload_dir.join(&filename))
        .await
        .map_err(|_| ApiError::NotFound)?;

    // Symlinks may still point elsewhere.
    if canonical_file.parent() != Some(canonical_dir.as_path()) {
        tracing::warn!(filename = %filename, "upload resolves outside upload directory");
        return Err(ApiError::NotFound);
    }

    let metadata = tokio::fs::metadata(&canonical_file)
        .await
        .map_err(|_| ApiError::NotFound)?;
    if !metadata.is_file() {
        return Err(ApiError::NotFound);
    }

    let file = tokio::fs::File::open(&canonical_file)
        .await
        .map_err(|_| ApiError::NotFound)?;
    let body = Body::from_stream(ReaderStream::new(file));

    Ok((
        [
            (header::CONTENT_TYPE, content_type_for(&filename).to_string()),
            (header::CONTENT_LENGTH, metadata.len().to_string()),
        ],
        body,
    ))
}

fn content_type_for(filename: &str) -> &'static str {
    let ext = filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "bmp" => "image/bmp",
        "tif" | "tiff" => "image/tiff",
        _ => "application/octet-stream",
    }
}

struct Photo {
    file_name: String,
    bytes: Bytes,
}

/// Fields of the `/predict` form. Text fields default to empty.
#[derive(Default)]
struct PredictForm {
    name: String,
    matric: String,
    email: String,
    photo: Option<Photo>,
}

impl PredictForm {
    async fn read(mut multipart: Multipart) -> Result<Self, MultipartError> {
        let mut form = Self::default();

        while let Some(field) = multipart.next_field().await? {
            let field_name = field.name().map(str::to_string);
            match field_name.as_deref() {
                Some("name") => form.name = field.text().await?.trim().to_string(),
                Some("matric") => form.matric = field.text().await?.trim().to_string(),
                Some("email") => form.email = field.text().await?.trim().to_string(),
                Some("photo") => {
                    let file_name = field.file_name().unwrap_or_default().to_string();
                    let bytes = field.bytes().await?;
                    // Browsers send an empty, unnamed part when no file was picked.
                    if !file_name.is_empty() {
                        form.photo = Some(Photo { file_name, bytes });
                    }
                }
                _ => {}
            }
        }

        Ok(form)
    }
}

/// POST /predict - save upload, classify, record, render
pub async fn predict(
    State(state): State<SharedState>,
    multipart: Multipart,
) -> Result<Html<String>, ApiError> {
    let form = PredictForm::read(multipart).await?;
    let Some(photo) = form.photo else {
        tracing::info!("predict rejected: no photo");
        return Err(ApiError::NoFile);
    };

    let file_name = upload::upload_file_name(&form.matric, &photo.file_name, Utc::now());
    let saved = upload::save_upload(&state.upload_dir, &file_name, &photo.bytes)
        .await
        .map_err(ApiError::SaveUpload)?;
    let saved_name = saved
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or(file_name);

    let outcome = classify(&state, saved.clone()).await;
    let emotion = outcome.emotion().to_string();
    if labels::is_sentinel(&emotion) {
        tracing::warn!(
            file = %saved_name,
            emotion = %emotion,
            error = outcome.error().unwrap_or("none"),
            "prediction degraded"
        );
    }

    let id = state
        .store
        .insert(NewSubmission {
            name: form.name.clone(),
            matric: form.matric.clone(),
            email: form.email,
            image_path: saved.display().to_string(),
            emotion: emotion.clone(),
        })
        .await?;

    tracing::info!(id, emotion = %emotion, file = %saved_name, "prediction recorded");

    Ok(Html(render::result_page(
        &outcome.message(),
        &form.name,
        &form.matric,
        &render::upload_url(&saved_name),
    )))
}

/// Run the pipeline on the blocking pool. Never fails.
async fn classify(state: &SharedState, path: PathBuf) -> Outcome {
    let state = Arc::clone(state);
    tokio::task::spawn_blocking(move || state.pipeline.classify_file(&path))
        .await
        .unwrap_or_else(|e| Outcome::InferenceError(format!("inference task failed: {e}")))
}
