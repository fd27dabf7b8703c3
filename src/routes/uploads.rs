use std::path::{Component, Path as FsPath};

use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::error::{AppError, AppResult};
use crate::state::AppState;

/// Request body cap for routes that accept an image upload.
pub(crate) const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;
const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "webp"];

/// Only plain relative paths resolve; anything that could climb out of the
/// uploads dir is a 404.
fn is_safe_relative(path: &str) -> bool {
    !path.is_empty()
        && FsPath::new(path)
            .components()
            .all(|c| matches!(c, Component::Normal(_)))
}

pub async fn serve(State(state): State<AppState>, Path(path): Path<String>) -> Response {
    if !is_safe_relative(&path) {
        return StatusCode::NOT_FOUND.into_response();
    }

    let full = state.config.uploads_path().join(&path);
    match tokio::fs::read(&full).await {
        Ok(data) => {
            let mime = mime_guess::from_path(&path).first_or_octet_stream();
            (
                StatusCode::OK,
                [
                    (header::CONTENT_TYPE, mime.as_ref().to_string()),
                    (header::CACHE_CONTROL, "public, max-age=86400".to_string()),
                ],
                data,
            )
                .into_response()
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => StatusCode::NOT_FOUND.into_response(),
        Err(e) => {
            tracing::error!(path = %full.display(), "Failed to read upload: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

pub(crate) fn image_extension(file_name: &str) -> AppResult<String> {
    let ext = std::path::Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
        Ok(ext)
    } else {
        Err(AppError::BadRequest("Unsupported image type".into()))
    }
}

/// Write an uploaded image under the uploads dir and return its public path.
pub(crate) async fn store_image(state: &AppState, file_name: &str, bytes: &[u8]) -> AppResult<String> {
    let ext = image_extension(file_name)?;
    let stored = format!("{}.{}", uuid::Uuid::now_v7(), ext);
    let dir = state.config.uploads_path();
    tokio::fs::create_dir_all(&dir)
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?;
    tokio::fs::write(dir.join(&stored), bytes)
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?;
    Ok(format!("/uploads/{}", stored))
}
