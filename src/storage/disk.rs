//! Disk store
//!
//! Persists uploads as flat files in the storage directory and maps generated
//! names to their public URLs.

use std::path::{Path, PathBuf};

use futures_util::{Stream, StreamExt};
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use hyper::body::Bytes;
use tokio::fs;
use tokio::io::AsyncWriteExt;

use super::naming::{self, NameGenerator};
use super::StoreError;
use crate::config::StorageConfig;
use crate::logger;

/// A file written by [`DiskStore::save`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    /// Generated on-disk name
    pub name: String,
    /// `<storage dir>/<name>`
    pub path: PathBuf,
    /// Bytes written
    pub size: u64,
}

pub struct DiskStore {
    dir: PathBuf,
    route: String,
    names: Box<dyn NameGenerator>,
}

impl DiskStore {
    pub fn new(config: &StorageConfig, names: Box<dyn NameGenerator>) -> Self {
        Self {
            dir: PathBuf::from(&config.dir),
            route: config.route_segment().to_string(),
            names,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Create the storage directory and any missing parents. No-op if present.
    pub async fn ensure_directory(&self) -> Result<(), StoreError> {
        fs::create_dir_all(&self.dir)
            .await
            .map_err(|source| StoreError::CreateDir {
                path: self.dir.clone(),
                source,
            })
    }

    /// Stream one upload to disk under a freshly generated name
    ///
    /// `original_name` only contributes its extension. Bytes go to a hidden
    /// partial file that is renamed into place once `body` ends, so a failed
    /// upload leaves nothing behind. An existing file with the same generated
    /// name is replaced.
    pub async fn save<S, E>(&self, original_name: &str, body: S) -> Result<StoredFile, StoreError>
    where
        S: Stream<Item = Result<Bytes, E>>,
        E: std::error::Error + Send + Sync + 'static,
    {
        let name = naming::generate_name(self.names.as_ref(), original_name);
        let path = self.dir.join(&name);
        let partial = self.dir.join(format!("{PARTIAL_PREFIX}{name}{PARTIAL_SUFFIX}"));

        let size = match write_stream(&partial, body).await {
            Ok(size) => size,
            Err(e) => {
                discard(&partial).await;
                return Err(e);
            }
        };

        if let Err(source) = fs::rename(&partial, &path).await {
            discard(&partial).await;
            return Err(StoreError::Write { path, source });
        }

        Ok(StoredFile { name, path, size })
    }

    /// Host-relative path of a stored file, e.g. `/uploads/1700000000000.pdf`.
    /// The name is percent-encoded.
    pub fn public_path(&self, name: &str) -> String {
        let name = utf8_percent_encode(name, PATH_SEGMENT);
        if self.route.is_empty() {
            format!("/{name}")
        } else {
            format!("/{}/{name}", self.route)
        }
    }

    /// Absolute URL of a stored file under `origin` (`scheme://host`)
    pub fn public_url(&self, origin: &str, name: &str) -> String {
        format!("{}{}", origin.trim_end_matches('/'), self.public_path(name))
    }
}

/// Escaped when a stored name becomes a URL path segment
const PATH_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'[')
    .add(b'\\')
    .add(b']')
    .add(b'^')
    .add(b'`')
    .add(b'{')
    .add(b'|')
    .add(b'}');

/// In-progress uploads are dotfiles, hidden from listing and serving
pub const PARTIAL_PREFIX: &str = ".";
const PARTIAL_SUFFIX: &str = ".part";

async fn write_stream<S, E>(path: &Path, body: S) -> Result<u64, StoreError>
where
    S: Stream<Item = Result<Bytes, E>>,
    E: std::error::Error + Send + Sync + 'static,
{
    let write_err = |source| StoreError::Write {
        path: path.to_path_buf(),
        source,
    };

    let mut file = fs::File::create(path).await.map_err(write_err)?;
    let mut body = std::pin::pin!(body);
    let mut size: u64 = 0;

    while let Some(chunk) = body.next().await {
        let chunk = chunk.map_err(|e| StoreError::Incoming {
            written: size,
            source: Box::new(e),
        })?;
        file.write_all(&chunk).await.map_err(write_err)?;
        size += chunk.len() as u64;
    }
    file.flush().await.map_err(write_err)?;

    Ok(size)
}

async fn discard(path: &Path) {
    match fs::remove_file(path).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => logger::log_warning(&format!(
            "Failed to remove partial upload {}: {e}",
            path.display()
        )),
    }
}
