//! Upload endpoint
//!
//! `POST /upload` with a multipart body carrying one file in the configured
//! field. Responds with the absolute URL of the stored copy.

use crate::config::{AppState, Config};
use crate::http;
use crate::logger;
use crate::storage::{StoreError, StoredFile};
use http_body_util::{BodyExt, Full};
use hyper::body::{Body, Bytes};
use hyper::header::{CONTENT_LENGTH, CONTENT_TYPE, HOST};
use hyper::{Request, Response, StatusCode};
use multer::{Constraints, Multipart, SizeLimit};
use serde::Serialize;

pub const NO_FILE: &str = "No file uploaded";
pub const MALFORMED: &str = "Malformed multipart body";
pub const TOO_LARGE: &str = "Upload too large";
pub const STORE_FAILED: &str = "Failed to store upload";

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub url: String,
}

#[derive(Debug, thiserror::Error)]
enum UploadError {
    #[error("invalid multipart body: {0}")]
    Multipart(#[from] multer::Error),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl UploadError {
    fn status_and_message(&self) -> (StatusCode, &'static str) {
        match self {
            Self::Multipart(e) if is_size_error(e) => (StatusCode::PAYLOAD_TOO_LARGE, TOO_LARGE),
            Self::Multipart(_) => (StatusCode::BAD_REQUEST, MALFORMED),
            Self::Store(StoreError::Incoming { source, .. }) => {
                match source.downcast_ref::<multer::Error>() {
                    Some(e) if is_size_error(e) => (StatusCode::PAYLOAD_TOO_LARGE, TOO_LARGE),
                    _ => (StatusCode::BAD_REQUEST, MALFORMED),
                }
            }
            Self::Store(_) => (StatusCode::INTERNAL_SERVER_ERROR, STORE_FAILED),
        }
    }
}

fn is_size_error(e: &multer::Error) -> bool {
    matches!(
        e,
        multer::Error::StreamSizeExceeded { .. } | multer::Error::FieldSizeExceeded { .. }
    )
}

/// Handle `POST /upload`
pub async fn handle_upload<B>(req: Request<B>, state: &AppState) -> Response<Full<Bytes>>
where
    B: Body<Data = Bytes> + Send + 'static,
    B::Error: std::error::Error + Send + Sync + 'static,
{
    let limit = state.config.http.max_body_size;
    if exceeds_declared_length(&req, limit) {
        return http::json_error(StatusCode::PAYLOAD_TOO_LARGE, TOO_LARGE);
    }

    // Non-multipart requests simply carry no file
    let Some(boundary) = req
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|ct| multer::parse_boundary(ct).ok())
    else {
        return http::json_error(StatusCode::BAD_REQUEST, NO_FILE);
    };

    let origin = request_origin(&req, &state.config);
    let stream = req.into_body().into_data_stream();
    let mut multipart = match limit {
        Some(max) => Multipart::with_constraints(
            stream,
            boundary,
            Constraints::new().size_limit(SizeLimit::new().whole_stream(max)),
        ),
        None => Multipart::new(stream, boundary),
    };

    match receive_file(&mut multipart, state).await {
        Ok(Some(stored)) => {
            logger::log_info(&format!(
                "Stored upload {} ({} bytes)",
                stored.name, stored.size
            ));
            let url = state.store.public_url(&origin, &stored.name);
            http::json_response(StatusCode::OK, &UploadResponse { url })
        }
        Ok(None) => http::json_error(StatusCode::BAD_REQUEST, NO_FILE),
        Err(e) => {
            let (status, message) = e.status_and_message();
            if status.is_server_error() {
                logger::log_error(&format!("Upload failed: {e}"));
            } else {
                logger::log_warning(&format!("Upload rejected: {e}"));
            }
            http::json_error(status, message)
        }
    }
}

/// Store the first part named after the upload field that carries a
/// non-empty filename. Parts before it are skipped; parts after it are never read.
async fn receive_file(
    multipart: &mut Multipart<'static>,
    state: &AppState,
) -> Result<Option<StoredFile>, UploadError> {
    let field_name = state.config.storage.field_name.as_str();

    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(field_name) {
            continue;
        }
        // Browsers send an empty filename when no file was picked
        let Some(original_name) = field
            .file_name()
            .filter(|n| !n.is_empty())
            .map(ToString::to_string)
        else {
            continue;
        };
        let stored = state.store.save(&original_name, field).await?;
        return Ok(Some(stored));
    }

    Ok(None)
}

/// Declared `Content-Length` above the configured limit
fn exceeds_declared_length<B>(req: &Request<B>, limit: Option<u64>) -> bool {
    let Some(max) = limit else {
        return false;
    };
    req.headers()
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok())
        .is_some_and(|size| size > max)
}

/// `scheme://host` the client used to reach us
///
/// `http.public_base_url` wins when set. Otherwise the scheme comes from
/// `X-Forwarded-Proto` (default `http`) and the host from the `Host` header.
fn request_origin<B>(req: &Request<B>, config: &Config) -> String {
    if let Some(base) = &config.http.public_base_url {
        return base.trim_end_matches('/').to_string();
    }

    let headers = req.headers();
    let scheme = headers
        .get("x-forwarded-proto")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or("http");

    let host = headers
        .get(HOST)
        .and_then(|v| v.to_str().ok())
        .map(ToString::to_string)
        .or_else(|| req.uri().authority().map(ToString::to_string))
        .unwrap_or_else(|| format!("{}:{}", config.server.host, config.server.port));

    format!("{scheme}://{host}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> Config {
        let dir = std::env::temp_dir();
        Config::for_dirs(&dir, &dir)
    }

    #[test]
    fn test_origin_from_host_header() {
        let req = Request::builder()
            .uri("/upload")
            .header("Host", "files.local:5000")
            .body(())
            .unwrap();
        assert_eq!(request_origin(&req, &config()), "http://files.local:5000");
    }

    #[test]
    fn test_origin_respects_forwarded_proto() {
        let req = Request::builder()
            .uri("/upload")
            .header("Host", "files.example.com")
            .header("X-Forwarded-Proto", "https, http")
            .body(())
            .unwrap();
        assert_eq!(request_origin(&req, &config()), "https://files.example.com");
    }

    #[test]
    fn test_origin_prefers_public_base_url() {
        let mut cfg = config();
        cfg.http.public_base_url = Some("https://cdn.example.com/".to_string());
        let req = Request::builder()
            .uri("/upload")
            .header("Host", "internal:5000")
            .body(())
            .unwrap();
        assert_eq!(request_origin(&req, &cfg), "https://cdn.example.com");
    }

    #[test]
    fn test_origin_falls_back_to_listen_address() {
        let req = Request::builder().uri("/upload").body(()).unwrap();
        assert_eq!(request_origin(&req, &config()), "http://0.0.0.0:5000");
    }

    #[test]
    fn test_declared_length_limit() {
        let req = Request::builder()
            .header("Content-Length", "2048")
            .body(())
            .unwrap();
        assert!(exceeds_declared_length(&req, Some(1024)));
        assert!(!exceeds_declared_length(&req, Some(4096)));
        assert!(!exceeds_declared_length(&req, None));
    }
}
