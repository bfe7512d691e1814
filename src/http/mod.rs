//! HTTP protocol layer module
//!
//! Response builders, conditional requests and MIME detection, independent of
//! the upload routes themselves.

pub mod cache;
pub mod mime;
pub mod range;
pub mod response;

// Re-export commonly used builders
pub use response::{
    build_304_response, build_404_response, build_405_response, build_416_response,
    build_health_response, build_options_response, json_error, json_response,
};
