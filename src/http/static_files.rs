use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use include_dir::{Dir, include_dir};

use super::error_response;

/// Icons and other assets embedded at compile time for single-binary
/// distribution.
pub(super) static ASSETS: Dir<'_> = include_dir!("$CARGO_MANIFEST_DIR/assets");

/// Look up an embedded file and return it with the correct content-type.
/// Missing files get the same error envelope as any other failed call.
pub(super) fn serve_asset(path: &str) -> Response {
    match ASSETS.get_file(path) {
        Some(file) if !path.is_empty() => {
            let mime = mime_guess::from_path(path)
                .first_or_octet_stream()
                .to_string();
            (StatusCode::OK, [(header::CONTENT_TYPE, mime)], file.contents()).into_response()
        }
        _ => {
            tracing::warn!(path, "static asset not found");
            error_response(StatusCode::NOT_FOUND, format!("static asset \"{path}\" not found"))
        }
    }
}
