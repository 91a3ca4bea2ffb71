// Configuration types module
// Defines all configuration-related data structures

use serde::Deserialize;

/// Main configuration structure
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub images: ImagesConfig,
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

/// Storage layout configuration
#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    /// Content root holding `text/`, `pictures/` and `tmp/`.
    /// Resolved at load time when not set explicitly.
    #[serde(default)]
    pub root: Option<String>,
    /// Directory of the client bundle served at `/`
    pub public_dir: String,
}

/// Image slot configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ImagesConfig {
    /// Slot names accepted by `POST /api/image`
    pub allowed: Vec<String>,
}

/// Logging configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub access_log: bool,
    /// Access log format (combined, common, json, or custom pattern)
    #[serde(default = "default_access_log_format")]
    pub access_log_format: String,
    /// Access log file path (optional, stdout if not set)
    #[serde(default)]
    pub access_log_file: Option<String>,
    /// Error log file path (optional, stderr if not set)
    #[serde(default)]
    pub error_log_file: Option<String>,
}

#[allow(clippy::missing_const_for_fn)]
fn default_access_log_format() -> String {
    "combined".to_string()
}

/// Performance configuration
#[derive(Debug, Deserialize, Clone)]
pub struct PerformanceConfig {
    /// Seconds to wait for the headers of a request, 0 disables keep-alive
    pub keep_alive_timeout: u64,
    pub max_connections: Option<u64>,
    /// Seconds to wait for in-flight connections on shutdown
    pub shutdown_grace: u64,
}

/// HTTP configuration
#[derive(Debug, Deserialize, Clone)]
pub struct HttpConfig {
    pub server_name: String,
    pub enable_cors: bool,
    /// Limit for `POST /api/content` bodies
    pub max_json_body: u64,
    /// Limit for `POST /api/image` bodies
    pub max_upload_size: u64,
}

/// Slot names of the reference deployment, one per site tab
pub const DEFAULT_IMAGE_SLOTS: [&str; 6] = [
    "homepage.png",
    "economicpage.png",
    "socialpage.png",
    "culturalpage.png",
    "healthpage.png",
    "crisispage.png",
];
