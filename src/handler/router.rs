//! Request routing dispatch module
//!
//! Entry point for HTTP request processing: method checks, route matching,
//! dispatch, and the headers every response carries.

use crate::config::{AppState, HttpConfig};
use crate::handler::{files, static_files, upload};
use crate::http;
use crate::logger::{self, AccessLogEntry};
use http_body_util::Full;
use hyper::body::{Body, Bytes};
use hyper::header::{HeaderName, HeaderValue, IF_NONE_MATCH, RANGE, REFERER, USER_AGENT};
use hyper::{Method, Request, Response, Version};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

const UPLOAD_PATH: &str = "/upload";
const FILES_PATH: &str = "/files";
const HEALTH_PATH: &str = "/healthz";

const WRITE_METHODS: &str = "POST, OPTIONS";
const READ_METHODS: &str = "GET, HEAD, OPTIONS";

/// Request context for the static file mounts
pub struct RequestContext<'a> {
    pub path: &'a str,
    pub is_head: bool,
    pub if_none_match: Option<String>,
    pub range_header: Option<String>,
}

impl<'a> RequestContext<'a> {
    fn new<B>(req: &Request<B>, path: &'a str) -> Self {
        Self {
            path,
            is_head: req.method() == Method::HEAD,
            if_none_match: header_string(req, IF_NONE_MATCH),
            range_header: header_string(req, RANGE),
        }
    }
}

/// Where a request path lands
#[derive(Debug, PartialEq, Eq)]
enum Route<'a> {
    Upload,
    Files,
    Health,
    /// Path below the static route, e.g. `1700000000000.pdf`
    StoredFile(&'a str),
    Frontend,
}

impl<'a> Route<'a> {
    fn resolve(path: &'a str, static_route: &str) -> Self {
        match path {
            UPLOAD_PATH => Self::Upload,
            FILES_PATH => Self::Files,
            HEALTH_PATH => Self::Health,
            _ => path
                .strip_prefix('/')
                .and_then(|p| p.strip_prefix(static_route))
                .and_then(|p| p.strip_prefix('/'))
                .filter(|_| !static_route.is_empty())
                .map_or(Self::Frontend, Self::StoredFile),
        }
    }
}

/// Main entry point for HTTP request handling
pub async fn handle_request<B>(
    req: Request<B>,
    state: Arc<AppState>,
) -> Result<Response<Full<Bytes>>, Infallible>
where
    B: Body<Data = Bytes> + Send + 'static,
    B::Error: std::error::Error + Send + Sync + 'static,
{
    let mut response = route_request(req, &state).await;
    apply_common_headers(&mut response, &state.config.http);
    Ok(response)
}

/// [`handle_request`] plus one access log line per request
pub async fn handle_with_access_log<B>(
    req: Request<B>,
    state: Arc<AppState>,
    peer_addr: SocketAddr,
) -> Result<Response<Full<Bytes>>, Infallible>
where
    B: Body<Data = Bytes> + Send + 'static,
    B::Error: std::error::Error + Send + Sync + 'static,
{
    if !state.config.logging.access_log {
        return handle_request(req, state).await;
    }

    let started = Instant::now();
    let mut entry = AccessLogEntry::new(
        peer_addr.ip().to_string(),
        req.method().to_string(),
        req.uri().path().to_string(),
    );
    entry.query = req.uri().query().map(ToString::to_string);
    entry.http_version = version_label(req.version()).to_string();
    entry.referer = header_string(&req, REFERER);
    entry.user_agent = header_string(&req, USER_AGENT);

    let format = state.config.logging.access_log_format.clone();
    let response = handle_request(req, state).await?;

    entry.status = response.status().as_u16();
    entry.body_bytes = response.body().size_hint().exact().unwrap_or(0);
    entry.request_time_us = u64::try_from(started.elapsed().as_micros()).unwrap_or(u64::MAX);
    logger::log_access(&entry, &format);

    Ok(response)
}

async fn route_request<B>(req: Request<B>, state: &AppState) -> Response<Full<Bytes>>
where
    B: Body<Data = Bytes> + Send + 'static,
    B::Error: std::error::Error + Send + Sync + 'static,
{
    let method = req.method().clone();
    if method == Method::OPTIONS {
        return http::build_options_response(state.config.http.enable_cors);
    }

    let path = req.uri().path().to_string();
    let is_read = method == Method::GET || method == Method::HEAD;

    match Route::resolve(&path, state.config.storage.route_segment()) {
        Route::Upload if method == Method::POST => upload::handle_upload(req, state).await,
        Route::Upload => method_not_allowed(&method, WRITE_METHODS),
        _ if !is_read => method_not_allowed(&method, READ_METHODS),
        Route::Files => files::list_files(state).await,
        Route::Health => http::build_health_response(),
        Route::StoredFile(name) => {
            let ctx = RequestContext::new(&req, &path);
            static_files::serve_upload(&ctx, state, name).await
        }
        Route::Frontend => {
            let ctx = RequestContext::new(&req, &path);
            static_files::serve_frontend(&ctx, state).await
        }
    }
}

fn method_not_allowed(method: &Method, allow: &str) -> Response<Full<Bytes>> {
    logger::log_debug(&format!("Method not allowed: {method}"));
    http::build_405_response(allow)
}

/// `Server` on everything, plus the CORS origin header when enabled
fn apply_common_headers(response: &mut Response<Full<Bytes>>, config: &HttpConfig) {
    let headers = response.headers_mut();
    if let Ok(name) = HeaderValue::from_str(&config.server_name) {
        headers.insert("Server", name);
    }
    if config.enable_cors {
        headers.insert("Access-Control-Allow-Origin", HeaderValue::from_static("*"));
    }
}

fn header_string<B>(req: &Request<B>, name: HeaderName) -> Option<String> {
    req.headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(ToString::to_string)
}

fn version_label(version: Version) -> &'static str {
    match version {
        Version::HTTP_09 => "0.9",
        Version::HTTP_10 => "1.0",
        Version::HTTP_2 => "2",
        Version::HTTP_3 => "3",
        _ => "1.1",
    }
}
