//! Directory lister
//!
//! Enumerates stored files whose names end with the configured suffix.

use std::path::PathBuf;

use tokio::fs;

use super::disk::{DiskStore, PARTIAL_PREFIX};
use super::StoreError;
use crate::config::StorageConfig;

pub struct DirectoryLister {
    dir: PathBuf,
    suffix: String,
    case_insensitive: bool,
}

impl DirectoryLister {
    pub fn new(config: &StorageConfig) -> Self {
        let case_insensitive = config.suffix_case_insensitive;
        let suffix = if case_insensitive {
            config.list_suffix.to_ascii_lowercase()
        } else {
            config.list_suffix.clone()
        };

        Self {
            dir: PathBuf::from(&config.dir),
            suffix,
            case_insensitive,
        }
    }

    fn matches(&self, name: &str) -> bool {
        if self.case_insensitive {
            name.to_ascii_lowercase().ends_with(&self.suffix)
        } else {
            name.ends_with(&self.suffix)
        }
    }

    /// Names of matching regular files, sorted. Subdirectories, dotfiles
    /// (uploads still in flight) and names that are not valid UTF-8 are skipped.
    pub async fn list_names(&self) -> Result<Vec<String>, StoreError> {
        let list_err = |source| StoreError::List {
            path: self.dir.clone(),
            source,
        };

        let mut entries = fs::read_dir(&self.dir).await.map_err(list_err)?;
        let mut names = Vec::new();

        while let Some(entry) = entries.next_entry().await.map_err(list_err)? {
            let Ok(name) = entry.file_name().into_string() else {
                continue;
            };
            if name.starts_with(PARTIAL_PREFIX) || !self.matches(&name) {
                continue;
            }
            // Entries removed mid-scan are simply skipped
            match entry.file_type().await {
                Ok(ft) if ft.is_file() => names.push(name),
                _ => {}
            }
        }

        names.sort_unstable();
        Ok(names)
    }

    /// Host-relative public paths of matching files
    pub async fn list_paths(&self, store: &DiskStore) -> Result<Vec<String>, StoreError> {
        let names = self.list_names().await?;
        Ok(names.iter().map(|n| store.public_path(n)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::storage::disk::tests::FixedNames;

    fn setup(dir: &std::path::Path, case_insensitive: bool) -> (DiskStore, DirectoryLister) {
        let mut cfg = Config::for_dirs(dir, dir);
        cfg.storage.suffix_case_insensitive = case_insensitive;
        (
            DiskStore::new(&cfg.storage, Box::new(FixedNames("0"))),
            DirectoryLister::new(&cfg.storage),
        )
    }

    #[tokio::test]
    async fn test_empty_directory() {
        let dir = tempfile::tempdir().unwrap();
        let (store, lister) = setup(dir.path(), false);
        assert!(lister.list_paths(&store).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_filters_by_suffix() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["2.pdf", "1.pdf", "3.txt", "4.PDF", "pdf"] {
            std::fs::write(dir.path().join(name), b"x").unwrap();
        }
        let (store, lister) = setup(dir.path(), false);

        assert_eq!(
            lister.list_paths(&store).await.unwrap(),
            vec!["/uploads/1.pdf", "/uploads/2.pdf"]
        );
    }

    #[tokio::test]
    async fn test_case_insensitive_suffix() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["1.pdf", "2.PDF", "3.Pdf", "4.txt"] {
            std::fs::write(dir.path().join(name), b"x").unwrap();
        }
        let (_, lister) = setup(dir.path(), true);

        assert_eq!(
            lister.list_names().await.unwrap(),
            vec!["1.pdf", "2.PDF", "3.Pdf"]
        );
    }

    #[tokio::test]
    async fn test_skips_directories() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("nested.pdf")).unwrap();
        std::fs::write(dir.path().join("nested.pdf/inner.pdf"), b"x").unwrap();
        std::fs::write(dir.path().join("top.pdf"), b"x").unwrap();
        let (_, lister) = setup(dir.path(), false);

        assert_eq!(lister.list_names().await.unwrap(), vec!["top.pdf"]);
    }

    #[tokio::test]
    async fn test_skips_uploads_in_flight() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(".2.pdf.part"), b"x").unwrap();
        std::fs::write(dir.path().join(".hidden.pdf"), b"x").unwrap();
        std::fs::write(dir.path().join("1.pdf"), b"x").unwrap();
        let (_, lister) = setup(dir.path(), false);

        assert_eq!(lister.list_names().await.unwrap(), vec!["1.pdf"]);
    }

    #[tokio::test]
    async fn test_lists_escaped_paths() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("1.my pdf"), b"x").unwrap();
        let mut cfg = Config::for_dirs(dir.path(), dir.path());
        cfg.storage.list_suffix = "pdf".to_string();
        let store = DiskStore::new(&cfg.storage, Box::new(FixedNames("0")));
        let lister = DirectoryLister::new(&cfg.storage);

        assert_eq!(lister.list_paths(&store).await.unwrap(), vec!["/uploads/1.my%20pdf"]);
    }

    #[tokio::test]
    async fn test_missing_directory() {
        let root = tempfile::tempdir().unwrap();
        let (_, lister) = setup(&root.path().join("removed"), false);

        let err = lister.list_names().await.unwrap_err();
        assert!(matches!(err, StoreError::List { .. }));
    }
}
