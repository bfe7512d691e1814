//! Static file serving module
//!
//! Serves stored uploads under the static route and the frontend bundle at
//! the site root. Request paths are percent-decoded, and both mounts refuse
//! paths that resolve outside their root. Stored uploads also answer single
//! byte-range requests.

use crate::config::AppState;
use crate::handler::router::RequestContext;
use crate::http::range::{self, ByteRange, RangeOutcome};
use crate::http::{self, cache, mime, response};
use crate::logger;
use crate::storage::disk::PARTIAL_PREFIX;
use http_body_util::Full;
use hyper::body::Bytes;
use hyper::header::{HeaderValue, ACCEPT_RANGES};
use hyper::Response;
use percent_encoding::percent_decode_str;
use std::io::{self, SeekFrom};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncSeekExt};

/// Serve a stored upload; `relative` is the still-encoded path after the
/// static route
pub async fn serve_upload(
    ctx: &RequestContext<'_>,
    state: &AppState,
    relative: &str,
) -> Response<Full<Bytes>> {
    let Some(path) = resolve_path(state.store.dir(), relative, None).await else {
        return http::build_404_response();
    };
    // Uploads still being written
    let hidden = path
        .file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with(PARTIAL_PREFIX));
    if hidden {
        return http::build_404_response();
    }

    match send_stored_file(ctx, &path).await {
        Ok(response) => response,
        Err(e) => {
            logger::log_debug(&format!("Failed to read '{}': {e}", path.display()));
            http::build_404_response()
        }
    }
}

/// Serve the frontend bundle; directory paths resolve to the index file
pub async fn serve_frontend(ctx: &RequestContext<'_>, state: &AppState) -> Response<Full<Bytes>> {
    let frontend = &state.config.frontend;
    let dir = Path::new(&frontend.dir);

    match load_from_directory(dir, ctx.path, Some(&frontend.index_file)).await {
        Some((content, content_type)) => build_file_response(ctx, content, content_type),
        None => http::build_404_response(),
    }
}

/// Read `relative` below `root`; see [`resolve_path`] for when this is `None`
pub async fn load_from_directory(
    root: &Path,
    relative: &str,
    index_file: Option<&str>,
) -> Option<(Vec<u8>, &'static str)> {
    let path = resolve_path(root, relative, index_file).await?;

    let content = match fs::read(&path).await {
        Ok(c) => c,
        Err(e) => {
            logger::log_debug(&format!("Failed to read '{}': {e}", path.display()));
            return None;
        }
    };

    Some((content, content_type_of(&path)))
}

/// Canonical path of the percent-encoded `relative` below `root`
///
/// Returns `None` for undecodable paths, missing files, directories without
/// an index file, and anything that escapes `root` after symlink resolution.
async fn resolve_path(root: &Path, relative: &str, index_file: Option<&str>) -> Option<PathBuf> {
    let Ok(decoded) = percent_decode_str(relative).decode_utf8() else {
        logger::log_debug(&format!("Undecodable request path: {relative}"));
        return None;
    };
    let relative = decoded.trim_start_matches('/');
    if relative.split(['/', '\\']).any(|segment| segment == "..") {
        logger::log_warning(&format!("Path traversal attempt blocked: {relative}"));
        return None;
    }

    let root = match fs::canonicalize(root).await {
        Ok(p) => p,
        Err(e) => {
            logger::log_warning(&format!(
                "Static directory not found or inaccessible '{}': {e}",
                root.display()
            ));
            return None;
        }
    };

    let mut file_path: PathBuf = root.join(relative);
    if relative.is_empty() || relative.ends_with('/') || is_dir(&file_path).await {
        file_path = file_path.join(index_file?);
    }

    // Missing files are the common 404 case, not worth a warning
    let canonical = fs::canonicalize(&file_path).await.ok()?;
    if !canonical.starts_with(&root) {
        logger::log_warning(&format!(
            "Path escapes static root: {relative} -> {}",
            canonical.display()
        ));
        return None;
    }

    Some(canonical)
}

async fn is_dir(path: &Path) -> bool {
    fs::metadata(path).await.is_ok_and(|m| m.is_dir())
}

fn content_type_of(path: &Path) -> &'static str {
    mime::get_content_type(path.extension().and_then(|e| e.to_str()))
}

/// Stored upload with a metadata `ETag`; range requests read only their slice
async fn send_stored_file(
    ctx: &RequestContext<'_>,
    path: &Path,
) -> io::Result<Response<Full<Bytes>>> {
    let meta = fs::metadata(path).await?;
    let total = meta.len();
    let etag = cache::metadata_etag(total, meta.modified().ok());
    if cache::check_etag_match(ctx.if_none_match.as_deref(), &etag) {
        return Ok(http::build_304_response(&etag));
    }

    let content_type = content_type_of(path);
    let mut response = match range::resolve_range(ctx.range_header.as_deref(), total) {
        RangeOutcome::Partial(byte_range) => {
            let data = if ctx.is_head {
                Bytes::new()
            } else {
                read_slice(path, byte_range).await?
            };
            response::build_partial_response(
                data,
                content_type,
                &etag,
                byte_range,
                total,
                ctx.is_head,
            )
        }
        RangeOutcome::Unsatisfiable => http::build_416_response(total),
        RangeOutcome::Full => {
            let data = Bytes::from(fs::read(path).await?);
            response::build_cached_response(data, content_type, &etag, ctx.is_head)
        }
    };

    response
        .headers_mut()
        .insert(ACCEPT_RANGES, HeaderValue::from_static("bytes"));
    Ok(response)
}

async fn read_slice(path: &Path, byte_range: ByteRange) -> io::Result<Bytes> {
    let len = usize::try_from(byte_range.length())
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "range too large"))?;
    let mut file = fs::File::open(path).await?;
    file.seek(SeekFrom::Start(byte_range.start)).await?;

    let mut buf = vec![0; len];
    file.read_exact(&mut buf).await?;
    Ok(Bytes::from(buf))
}

fn build_file_response(
    ctx: &RequestContext<'_>,
    content: Vec<u8>,
    content_type: &str,
) -> Response<Full<Bytes>> {
    let etag = cache::generate_etag(&content);
    if cache::check_etag_match(ctx.if_none_match.as_deref(), &etag) {
        return http::build_304_response(&etag);
    }
    response::build_cached_response(Bytes::from(content), content_type, &etag, ctx.is_head)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_loads_file_with_type() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("1.pdf"), b"%PDF").unwrap();

        let (content, content_type) =
            load_from_directory(dir.path(), "1.pdf", None).await.unwrap();
        assert_eq!(content, b"%PDF");
        assert_eq!(content_type, "application/pdf");
    }

    #[tokio::test]
    async fn test_index_file_for_directories() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("docs")).unwrap();
        std::fs::write(dir.path().join("index.html"), b"<h1>root</h1>").unwrap();
        std::fs::write(dir.path().join("docs/index.html"), b"<h1>docs</h1>").unwrap();

        let index = Some("index.html");
        let (root, _) = load_from_directory(dir.path(), "/", index).await.unwrap();
        assert_eq!(root, b"<h1>root</h1>");
        let (docs, _) = load_from_directory(dir.path(), "/docs", index).await.unwrap();
        assert_eq!(docs, b"<h1>docs</h1>");
    }

    #[tokio::test]
    async fn test_directory_without_index_is_missing() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();

        assert!(load_from_directory(dir.path(), "sub", None).await.is_none());
        assert!(load_from_directory(dir.path(), "", None).await.is_none());
    }

    #[tokio::test]
    async fn test_traversal_blocked() {
        let root = tempfile::tempdir().unwrap();
        let public = root.path().join("public");
        std::fs::create_dir(&public).unwrap();
        std::fs::write(root.path().join("secret.txt"), b"nope").unwrap();

        assert!(load_from_directory(&public, "../secret.txt", None).await.is_none());
        assert!(load_from_directory(&public, "a/../../secret.txt", None).await.is_none());
    }

    #[tokio::test]
    async fn test_percent_encoded_names() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a b.html"), b"<p>spaced</p>").unwrap();
        std::fs::write(dir.path().join("1.p df"), b"%PDF").unwrap();

        let (page, content_type) = load_from_directory(dir.path(), "/a%20b.html", None)
            .await
            .unwrap();
        assert_eq!(page, b"<p>spaced</p>");
        assert_eq!(content_type, "text/html; charset=utf-8");
        assert!(load_from_directory(dir.path(), "1.p%20df", None).await.is_some());
        assert!(load_from_directory(dir.path(), "%FF", None).await.is_none());
    }

    #[tokio::test]
    async fn test_encoded_traversal_blocked() {
        let root = tempfile::tempdir().unwrap();
        let public = root.path().join("public");
        std::fs::create_dir(&public).unwrap();
        std::fs::write(root.path().join("secret.txt"), b"nope").unwrap();

        assert!(load_from_directory(&public, "%2e%2e/secret.txt", None).await.is_none());
        assert!(load_from_directory(&public, "a%2F..%2F..%2Fsecret.txt", None).await.is_none());
    }

    #[tokio::test]
    async fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_from_directory(dir.path(), "nothing.pdf", None).await.is_none());
    }
}
