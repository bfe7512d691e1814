// Configuration module entry point
// Loads layered configuration and owns the shared runtime state

mod state;
mod types;

use config::builder::DefaultState;
use config::ConfigBuilder;
use std::net::SocketAddr;

// Re-export public types
pub use state::AppState;
pub use types::{
    Config, FrontendConfig, HttpConfig, LoggingConfig, NamingStrategy, PerformanceConfig,
    ServerConfig, StorageConfig,
};

/// Environment variable that selects the listen port
const PORT_ENV: &str = "PORT";

/// `PORT` value to apply, if any; empty or blank values fall back to the
/// configured port
fn port_override(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl Config {
    /// Load configuration from specified file path (extension optional)
    ///
    /// Sources, lowest precedence first: built-in defaults, the file,
    /// `FILEDROP_*` environment variables, then `PORT`.
    pub fn load_from(config_path: &str) -> Result<Self, config::ConfigError> {
        let settings = Self::builder(config_path)?
            .add_source(
                config::Environment::with_prefix("FILEDROP")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .set_override_option("server.port", port_override(std::env::var(PORT_ENV).ok()))?
            .build()?;

        settings.try_deserialize()
    }

    fn builder(config_path: &str) -> Result<ConfigBuilder<DefaultState>, config::ConfigError> {
        config::Config::builder()
            .add_source(config::File::with_name(config_path).required(false))
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 5000)?
            .set_default("storage.dir", "uploads")?
            .set_default("storage.route", "/uploads")?
            .set_default("storage.field_name", "file")?
            .set_default("storage.list_suffix", ".pdf")?
            .set_default("storage.suffix_case_insensitive", false)?
            .set_default("storage.naming", "timestamp")?
            .set_default("frontend.dir", "frontend")?
            .set_default("frontend.index_file", "index.html")?
            .set_default("logging.level", "info")?
            .set_default("logging.access_log", true)?
            .set_default("logging.access_log_format", "combined")?
            .set_default("performance.keep_alive", true)?
            .set_default("performance.header_read_timeout", 30)?
            .set_default("performance.shutdown_grace", 5)?
            .set_default("http.server_name", "filedrop/0.1")?
            .set_default("http.enable_cors", true)
    }

    pub fn get_socket_addr(&self) -> Result<SocketAddr, String> {
        format!("{}:{}", self.server.host, self.server.port)
            .parse()
            .map_err(|e| format!("Invalid address: {e}"))
    }

    /// Defaults plus an optional file, ignoring the process environment
    #[cfg(test)]
    pub(crate) fn from_file(config_path: &str) -> Self {
        Self::builder(config_path)
            .and_then(|builder| builder.build())
            .and_then(|settings| settings.try_deserialize())
            .expect("test configuration should load")
    }

    /// Defaults with storage and frontend pointed at the given directories
    #[cfg(test)]
    pub(crate) fn for_dirs(storage_dir: &std::path::Path, frontend_dir: &std::path::Path) -> Self {
        let mut cfg = Self::from_file("does-not-exist");
        cfg.storage.dir = storage_dir.display().to_string();
        cfg.frontend.dir = frontend_dir.display().to_string();
        cfg.logging.access_log = false;
        cfg
    }
}
