//! Listing endpoint: `GET /files`

use crate::config::AppState;
use crate::http;
use crate::logger;
use http_body_util::Full;
use hyper::body::Bytes;
use hyper::{Response, StatusCode};

pub const CANNOT_READ: &str = "Cannot read uploads";

/// JSON array of host-relative paths for stored files matching the suffix
pub async fn list_files(state: &AppState) -> Response<Full<Bytes>> {
    match state.lister.list_paths(&state.store).await {
        Ok(paths) => http::json_response(StatusCode::OK, &paths),
        Err(e) => {
            logger::log_error(&e.to_string());
            http::json_error(StatusCode::INTERNAL_SERVER_ERROR, CANNOT_READ)
        }
    }
}
