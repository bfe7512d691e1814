//! HTTP response building module
//!
//! Builders for the status codes the service emits. Builder failures are
//! logged and replaced by an empty response instead of panicking.

use http_body_util::Full;
use hyper::body::Bytes;
use hyper::{Response, StatusCode};
use serde::Serialize;

use super::range::ByteRange;

/// Methods accepted anywhere on the service
pub const ALLOWED_METHODS: &str = "GET, HEAD, POST, OPTIONS";

/// Body of every JSON error: `{"error": "..."}`
#[derive(Debug, Serialize)]
pub struct ErrorBody<'a> {
    pub error: &'a str,
}

/// Serialize `body` as compact JSON with the given status
pub fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Response<Full<Bytes>> {
    let (status, json) = match serde_json::to_vec(body) {
        Ok(j) => (status, Bytes::from(j)),
        Err(e) => {
            crate::logger::log_error(&format!("Failed to serialize response: {e}"));
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Bytes::from_static(br#"{"error":"Internal server error"}"#),
            )
        }
    };

    Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .header("Content-Length", json.len())
        .body(Full::new(json))
        .unwrap_or_else(|e| {
            log_build_error(status.as_str(), &e);
            Response::new(Full::new(Bytes::new()))
        })
}

/// `{"error": message}` with the given status
pub fn json_error(status: StatusCode, message: &str) -> Response<Full<Bytes>> {
    json_response(status, &ErrorBody { error: message })
}

/// Build 304 Not Modified response
pub fn build_304_response(etag: &str) -> Response<Full<Bytes>> {
    Response::builder()
        .status(StatusCode::NOT_MODIFIED)
        .header("ETag", etag)
        .body(Full::new(Bytes::new()))
        .unwrap_or_else(|e| {
            log_build_error("304", &e);
            Response::new(Full::new(Bytes::new()))
        })
}

/// Build 404 Not Found response
pub fn build_404_response() -> Response<Full<Bytes>> {
    plain_text(StatusCode::NOT_FOUND, "404 Not Found")
}

/// Build 405 Method Not Allowed response listing the route's methods
pub fn build_405_response(allow: &str) -> Response<Full<Bytes>> {
    let mut response = plain_text(StatusCode::METHOD_NOT_ALLOWED, "405 Method Not Allowed");
    if let Ok(value) = allow.parse() {
        response.headers_mut().insert("Allow", value);
    }
    response
}

/// Build OPTIONS response (preflight request)
pub fn build_options_response(enable_cors: bool) -> Response<Full<Bytes>> {
    let mut builder = Response::builder()
        .status(StatusCode::NO_CONTENT)
        .header("Allow", ALLOWED_METHODS);

    if enable_cors {
        builder = builder
            .header("Access-Control-Allow-Methods", ALLOWED_METHODS)
            .header("Access-Control-Allow-Headers", "Content-Type, Range")
            .header("Access-Control-Max-Age", "86400");
    }

    builder.body(Full::new(Bytes::new())).unwrap_or_else(|e| {
        log_build_error("OPTIONS", &e);
        Response::new(Full::new(Bytes::new()))
    })
}

/// Liveness check response
pub fn build_health_response() -> Response<Full<Bytes>> {
    plain_text(StatusCode::OK, "ok")
}

/// File contents with `ETag` and cache headers; body omitted for HEAD
pub fn build_cached_response(
    data: Bytes,
    content_type: &str,
    etag: &str,
    is_head: bool,
) -> Response<Full<Bytes>> {
    let content_length = data.len();
    let body = if is_head { Bytes::new() } else { data };

    Response::builder()
        .status(StatusCode::OK)
        .header("Content-Type", content_type)
        .header("Content-Length", content_length)
        .header("ETag", etag)
        .header("Cache-Control", "public, max-age=3600")
        .body(Full::new(body))
        .unwrap_or_else(|e| {
            log_build_error("200", &e);
            Response::new(Full::new(Bytes::new()))
        })
}

/// 206 Partial Content for one byte range; body omitted for HEAD
pub fn build_partial_response(
    data: Bytes,
    content_type: &str,
    etag: &str,
    range: ByteRange,
    total_size: u64,
    is_head: bool,
) -> Response<Full<Bytes>> {
    let body = if is_head { Bytes::new() } else { data };

    Response::builder()
        .status(StatusCode::PARTIAL_CONTENT)
        .header("Content-Type", content_type)
        .header("Content-Length", range.length())
        .header("Content-Range", range.content_range(total_size))
        .header("Accept-Ranges", "bytes")
        .header("ETag", etag)
        .header("Cache-Control", "public, max-age=3600")
        .body(Full::new(body))
        .unwrap_or_else(|e| {
            log_build_error("206", &e);
            Response::new(Full::new(Bytes::new()))
        })
}

/// 416 Range Not Satisfiable
pub fn build_416_response(total_size: u64) -> Response<Full<Bytes>> {
    let mut response =
        plain_text(StatusCode::RANGE_NOT_SATISFIABLE, "416 Range Not Satisfiable");
    if let Ok(value) = format!("bytes */{total_size}").parse() {
        response.headers_mut().insert("Content-Range", value);
    }
    response
}

fn plain_text(status: StatusCode, text: &'static str) -> Response<Full<Bytes>> {
    Response::builder()
        .status(status)
        .header("Content-Type", "text/plain; charset=utf-8")
        .body(Full::new(Bytes::from_static(text.as_bytes())))
        .unwrap_or_else(|e| {
            log_build_error(status.as_str(), &e);
            Response::new(Full::new(Bytes::from_static(text.as_bytes())))
        })
}

/// Log response build error
fn log_build_error(status: &str, error: &hyper::http::Error) {
    crate::logger::log_error(&format!("Failed to build {status} response: {error}"));
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    async fn body_string(response: Response<Full<Bytes>>) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_json_error_shape() {
        let response = json_error(StatusCode::BAD_REQUEST, "No file uploaded");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(response.headers()["Content-Type"], "application/json");
        assert_eq!(body_string(response).await, r#"{"error":"No file uploaded"}"#);
    }

    #[tokio::test]
    async fn test_json_error_escapes() {
        let response = json_error(StatusCode::BAD_REQUEST, "bad \"quote\"");
        assert_eq!(body_string(response).await, r#"{"error":"bad \"quote\""}"#);
    }

    #[tokio::test]
    async fn test_json_response_array() {
        let response = json_response(StatusCode::OK, &vec!["/uploads/1.pdf"]);
        assert_eq!(body_string(response).await, r#"["/uploads/1.pdf"]"#);
    }

    #[test]
    fn test_405_allow_header() {
        let response = build_405_response("POST, OPTIONS");
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(response.headers()["Allow"], "POST, OPTIONS");
    }

    #[test]
    fn test_options_cors_headers() {
        let with = build_options_response(true);
        assert_eq!(with.status(), StatusCode::NO_CONTENT);
        assert!(with.headers().contains_key("Access-Control-Allow-Methods"));

        let without = build_options_response(false);
        assert!(!without.headers().contains_key("Access-Control-Allow-Methods"));
    }

    #[tokio::test]
    async fn test_partial_response_headers() {
        let range = ByteRange { start: 2, end: 4 };
        let data = Bytes::from_static(b"cde");
        let response = build_partial_response(data, "application/pdf", "\"1\"", range, 10, false);
        assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
        assert_eq!(response.headers()["Content-Range"], "bytes 2-4/10");
        assert_eq!(response.headers()["Content-Length"], "3");
        assert_eq!(body_string(response).await, "cde");
    }

    #[test]
    fn test_416_reports_size() {
        let response = build_416_response(10);
        assert_eq!(response.status(), StatusCode::RANGE_NOT_SATISFIABLE);
        assert_eq!(response.headers()["Content-Range"], "bytes */10");
    }

    #[tokio::test]
    async fn test_cached_response_head_has_no_body() {
        let data = Bytes::from_static(b"abc");
        let response = build_cached_response(data, "text/plain", "\"1\"", true);
        assert_eq!(response.headers()["Content-Length"], "3");
        assert!(body_string(response).await.is_empty());
    }
}
