//! Generated file names
//!
//! A stored file is named `<token><extension>`. The token comes from a
//! [`NameGenerator`] so the strategy can be swapped (and pinned in tests).

use std::path::Path;

use crate::config::NamingStrategy;

/// Produces the token part of a generated file name
pub trait NameGenerator: Send + Sync {
    fn next_token(&self) -> String;
}

/// Milliseconds since the Unix epoch. Two calls in the same millisecond
/// return the same token.
#[derive(Debug, Default, Clone, Copy)]
pub struct TimestampNames;

impl NameGenerator for TimestampNames {
    fn next_token(&self) -> String {
        chrono::Utc::now().timestamp_millis().to_string()
    }
}

/// Random v4 UUID in its 32-character simple form
#[derive(Debug, Default, Clone, Copy)]
pub struct UuidNames;

impl NameGenerator for UuidNames {
    fn next_token(&self) -> String {
        uuid::Uuid::new_v4().simple().to_string()
    }
}

/// Build the generator selected in configuration
pub fn from_strategy(strategy: NamingStrategy) -> Box<dyn NameGenerator> {
    match strategy {
        NamingStrategy::Timestamp => Box::new(TimestampNames),
        NamingStrategy::Uuid => Box::new(UuidNames),
    }
}

/// Extension of a client-supplied file name, including the leading dot
///
/// Only the final path component is considered and a leading dot does not
/// start an extension. Extensions carrying control characters are dropped;
/// anything else is kept as sent and escaped later when it becomes a URL.
///
/// ```
/// use filedrop::storage::naming::extension_of;
/// assert_eq!(extension_of("report.final.pdf"), ".pdf");
/// assert_eq!(extension_of("bundle.tar-gz"), ".tar-gz");
/// assert_eq!(extension_of(".bashrc"), "");
/// ```
pub fn extension_of(original_name: &str) -> String {
    // Browsers on Windows may send full paths
    let base = original_name.rsplit(['/', '\\']).next().unwrap_or_default();

    match Path::new(base).extension().and_then(|e| e.to_str()) {
        Some(ext) if !ext.chars().any(char::is_control) => format!(".{ext}"),
        _ => String::new(),
    }
}

/// Full generated name for an upload
pub fn generate_name(generator: &dyn NameGenerator, original_name: &str) -> String {
    format!("{}{}", generator.next_token(), extension_of(original_name))
}
