use axum::{
    body::Body,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use std::path::Path;
use std::time::UNIX_EPOCH;
use tokio::fs::File;
use tokio_util::io::ReaderStream;
use tracing::{debug, error};

/// Originals may be edited in place, so they revalidate.
pub const ORIGINAL_CACHE_CONTROL: &str = "public, max-age=3600";
/// A derivative never changes once it exists under its name.
pub const DERIVATIVE_CACHE_CONTROL: &str = "public, max-age=86400";

/// Streams a file from disk with its content type guessed from the name.
pub async fn serve_file(path: &Path, cache_control: &str) -> Response {
    let file = match File::open(path).await {
        Ok(file) => file,
        Err(e) => {
            debug!("Failed to open file {:?}: {}", path, e);
            return (StatusCode::NOT_FOUND, "File not found").into_response();
        }
    };

    let metadata = match file.metadata().await {
        Ok(m) => m,
        Err(e) => {
            error!("Failed to read metadata for {:?}: {}", path, e);
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let content_type = mime_guess::from_path(path)
        .first_or_octet_stream()
        .to_string();

    let mut response = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type)
        .header(header::CONTENT_LENGTH, metadata.len())
        .header(header::CACHE_CONTROL, cache_control);

    if let Ok(modified) = metadata.modified()
        && let Ok(duration) = modified.duration_since(UNIX_EPOCH)
    {
        response = response
            .header(header::LAST_MODIFIED, httpdate::fmt_http_date(modified))
            .header(
                header::ETAG,
                format!("\"{}-{}\"", duration.as_secs(), metadata.len()),
            );
    }

    let body = Body::from_stream(ReaderStream::new(file));
    match response.body(body) {
        Ok(response) => response,
        Err(e) => {
            error!("Failed to build response for {:?}: {}", path, e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
