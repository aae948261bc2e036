//! Upload file server: serves stored images over HTTP.
//!
//! Mounted at `/uploads`:
//!   GET /uploads/:filename  serves a stored image

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use std::{path::PathBuf, sync::Arc};
use tokio::fs;
use tracing::{debug, warn};

use crate::mime_detect::{detect_mime_type, is_inline_safe};

/// State shared by upload server routes.
#[derive(Clone)]
pub struct UploadServerState {
    pub upload_dir: Arc<PathBuf>,
}

/// Build the upload server router.
pub fn uploads_router(upload_dir: PathBuf) -> Router {
    let state = UploadServerState {
        upload_dir: Arc::new(upload_dir),
    };
    Router::new()
        .route("/:filename", get(serve_upload))
        .with_state(state)
}

/// Generated names only use ASCII alphanumerics, `_`, `-` and one `.`.
fn is_safe_filename(filename: &str) -> bool {
    !filename.is_empty()
        && !filename.starts_with('.')
        && !filename.contains("..")
        && filename
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
}

async fn serve_upload(
    Path(filename): Path<String>,
    State(state): State<UploadServerState>,
) -> Response {
    if !is_safe_filename(&filename) {
        warn!(filename = %filename, "Rejected suspicious upload path");
        return (StatusCode::BAD_REQUEST, "Invalid filename").into_response();
    }

    let path = state.upload_dir.join(&filename);
    debug!(path = %path.display(), "Serving upload");

    match fs::read(&path).await {
        Ok(bytes) => {
            let mime = detect_mime_type(&path);
            let disposition = if is_inline_safe(mime) {
                format!("inline; filename=\"{filename}\"")
            } else {
                format!("attachment; filename=\"{filename}\"")
            };

            (
                StatusCode::OK,
                [
                    (header::CONTENT_TYPE, mime.to_string()),
                    (header::CONTENT_DISPOSITION, disposition),
                    (header::CACHE_CONTROL, "public, max-age=86400".to_string()),
                ],
                bytes,
            )
                .into_response()
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            (StatusCode::NOT_FOUND, "File not found").into_response()
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Failed to read upload");
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to read file").into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    async fn get(router: Router, uri: &str) -> Response {
        router
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn serves_stored_image_inline() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("20240501_093005_0a1b2c3d.jpg"), [0xFF, 0xD8, 0xFF]).unwrap();

        let res = get(uploads_router(dir.path().to_path_buf()), "/20240501_093005_0a1b2c3d.jpg").await;

        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(res.headers()[header::CONTENT_TYPE], "image/jpeg");
        assert!(res.headers()[header::CONTENT_DISPOSITION]
            .to_str()
            .unwrap()
            .starts_with("inline"));
        let body = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], &[0xFF, 0xD8, 0xFF]);
    }

    #[tokio::test]
    async fn missing_file_is_404() {
        let dir = tempfile::tempdir().unwrap();
        let res = get(uploads_router(dir.path().to_path_buf()), "/nope.jpg").await;
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn rejects_traversal() {
        let dir = tempfile::tempdir().unwrap();
        let res = get(uploads_router(dir.path().to_path_buf()), "/..%2Fusers.json").await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn filename_filter() {
        assert!(is_safe_filename("20240501_093005_0a1b2c3d.jpg"));
        assert!(!is_safe_filename(".hidden"));
        assert!(!is_safe_filename("a/b.jpg"));
        assert!(!is_safe_filename("..jpg"));
        assert!(!is_safe_filename(""));
    }
}
