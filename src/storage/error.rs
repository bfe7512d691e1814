use std::io;
use std::path::PathBuf;

/// Errors raised by the disk store and directory lister
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("failed to create storage directory {path}: {source}")]
    CreateDir { path: PathBuf, source: io::Error },

    #[error("failed to write {path}: {source}")]
    Write { path: PathBuf, source: io::Error },

    #[error("upload stream failed after {written} bytes: {source}")]
    Incoming {
        written: u64,
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("cannot read storage directory {path}: {source}")]
    List { path: PathBuf, source: io::Error },
}
