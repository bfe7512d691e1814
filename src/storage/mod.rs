//! Upload storage
//!
//! Flat-directory persistence for uploaded files: the disk store writes them,
//! the lister enumerates them, the naming module decides what they're called.

pub mod disk;
mod error;
pub mod lister;
pub mod naming;

pub use disk::{DiskStore, StoredFile};
pub use error::StoreError;
pub use lister::DirectoryLister;
pub use naming::NameGenerator;
