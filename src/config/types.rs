// Configuration types module
// Defines all configuration-related data structures

use serde::Deserialize;

/// Main configuration structure
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub frontend: FrontendConfig,
    pub logging: LoggingConfig,
    pub performance: PerformanceConfig,
    pub http: HttpConfig,
}

/// Server configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub workers: Option<usize>,
}

/// Upload storage configuration
#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    /// Directory holding every uploaded file
    pub dir: String,
    /// URL prefix under which stored files are served (e.g. "/uploads")
    pub route: String,
    /// Multipart field carrying the uploaded file
    pub field_name: String,
    /// Suffix a stored file must end with to appear in `/files`
    pub list_suffix: String,
    #[serde(default)]
    pub suffix_case_insensitive: bool,
    #[serde(default)]
    pub naming: NamingStrategy,
}

impl StorageConfig {
    /// Static route without surrounding slashes ("/uploads/" -> "uploads")
    pub fn route_segment(&self) -> &str {
        self.route.trim_matches('/')
    }
}

/// How the token part of a generated file name is produced
#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NamingStrategy {
    /// Milliseconds since the Unix epoch
    #[default]
    Timestamp,
    /// Random UUID v4 (hyphen-less)
    Uuid,
}

/// Frontend bundle configuration
#[derive(Debug, Deserialize, Clone)]
pub struct FrontendConfig {
    pub dir: String,
    pub index_file: String,
}

/// Logging configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub access_log: bool,
    /// Access log format (combined, common, json, or custom pattern)
    pub access_log_format: String,
    /// Access log file path (optional, stdout if not set)
    #[serde(default)]
    pub access_log_file: Option<String>,
    /// Error log file path (optional, stderr if not set)
    #[serde(default)]
    pub error_log_file: Option<String>,
}

/// Performance configuration
#[derive(Debug, Deserialize, Clone)]
pub struct PerformanceConfig {
    pub keep_alive: bool,
    /// Seconds a client gets to send a request's headers, 0 disables it.
    /// Bodies are never timed out, so slow uploads run to completion.
    pub header_read_timeout: u64,
    /// Seconds in-flight connections get to finish after a shutdown signal
    pub shutdown_grace: u64,
    pub max_connections: Option<u64>,
}

/// HTTP configuration
#[derive(Debug, Deserialize, Clone)]
pub struct HttpConfig {
    pub server_name: String,
    pub enable_cors: bool,
    /// Request body limit in bytes; unlimited when unset
    #[serde(default)]
    pub max_body_size: Option<u64>,
    /// Origin used for upload URLs instead of the request's scheme and Host
    #[serde(default)]
    pub public_base_url: Option<String>,
}
