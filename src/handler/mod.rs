//! Request handler module
//!
//! Routing plus the upload, listing and static file endpoints.

pub mod files;
pub mod router;
pub mod static_files;
pub mod upload;

// Re-export main entry points
pub use router::{handle_request, handle_with_access_log};
