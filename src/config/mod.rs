// Configuration module entry point
// Loads layered configuration and holds the per-process application state

mod state;
mod types;

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

// Re-export public types
pub use state::AppState;
#[cfg(test)]
pub use state::test_state;
pub use types::{Config, DEFAULT_IMAGE_SLOTS};

/// Mount point of a persistent disk, used as storage when present
const PERSISTENT_DISK: &str = "/data";

impl Config {
    /// Load configuration from specified file path (without extension)
    /// Default config file is "config.toml" when no path specified
    pub fn load_from(config_path: &str) -> Result<Self, config::ConfigError> {
        // Hosting platforms hand the port over in a bare PORT variable
        let port_override = std::env::var("PORT")
            .ok()
            .and_then(|p| p.trim().parse::<u16>().ok())
            .map(i64::from);

        let settings = config::Config::builder()
            .add_source(config::File::with_name(config_path).required(false))
            .add_source(
                config::Environment::with_prefix("CMS")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("images.allowed")
                    .try_parsing(true),
            )
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 3000)?
            .set_default("storage.public_dir", "public")?
            .set_default("images.allowed", DEFAULT_IMAGE_SLOTS.to_vec())?
            .set_default("logging.level", "info")?
            .set_default("logging.access_log", true)?
            .set_default("performance.keep_alive_timeout", 75)?
            .set_default("performance.shutdown_grace", 10)?
            .set_default("http.server_name", "tabsite-cms")?
            .set_default("http.enable_cors", false)?
            .set_default("http.max_json_body", 1_048_576)? // 1MB
            .set_default("http.max_upload_size", 10_485_760)? // 10MB
            .set_override_option("server.port", port_override)?
            .build()?;

        let mut cfg: Self = settings.try_deserialize()?;
        if cfg.storage.root.is_none() {
            cfg.storage.root = Some(
                default_storage_root(Path::new(PERSISTENT_DISK))
                    .to_string_lossy()
                    .into_owned(),
            );
        }
        cfg.validate().map_err(config::ConfigError::Message)?;
        Ok(cfg)
    }

    pub fn get_socket_addr(&self) -> Result<SocketAddr, String> {
        format!("{}:{}", self.server.host, self.server.port)
            .parse()
            .map_err(|e| format!("Invalid address: {e}"))
    }

    /// Resolved content root directory
    pub fn storage_root(&self) -> PathBuf {
        self.storage
            .root
            .as_deref()
            .map_or_else(|| default_storage_root(Path::new(PERSISTENT_DISK)), PathBuf::from)
    }

    /// Reject configurations that would fail later at request time
    pub fn validate(&self) -> Result<(), String> {
        self.get_socket_addr()?;

        if crate::logger::LogLevel::parse(&self.logging.level).is_none() {
            return Err(format!(
                "Invalid logging.level '{}' (expected error, warn, info or debug)",
                self.logging.level
            ));
        }

        if self.images.allowed.is_empty() {
            return Err("images.allowed must name at least one slot".to_string());
        }
        if let Some(bad) = self
            .images
            .allowed
            .iter()
            .find(|name| !crate::store::is_plain_file_name(name))
        {
            return Err(format!(
                "Invalid image slot name '{bad}': must be a plain file name"
            ));
        }

        if self.http.max_json_body == 0 || self.http.max_upload_size == 0 {
            return Err("http body limits must be greater than zero".to_string());
        }
        Ok(())
    }
}

/// `<disk>/content` when the persistent disk is mounted, `./content` otherwise
fn default_storage_root(disk: &Path) -> PathBuf {
    if disk.is_dir() {
        disk.join("content")
    } else {
        PathBuf::from("content")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> Config {
        Config::load_from("tests/no-such-config").expect("defaults should load")
    }

    #[test]
    fn test_defaults_include_reference_slots() {
        let cfg = base_config();
        assert_eq!(cfg.images.allowed.len(), 6);
        assert!(cfg.images.allowed.iter().any(|s| s == "homepage.png"));
        assert_eq!(cfg.http.max_json_body, 1_048_576);
        assert_eq!(cfg.storage.public_dir, "public");
        assert!(cfg.storage.root.is_some());
    }

    #[test]
    fn test_rejects_traversing_slot_name() {
        let mut cfg = base_config();
        cfg.images.allowed.push("../secret.png".to_string());
        let err = cfg.validate().unwrap_err();
        assert!(err.contains("../secret.png"));
    }

    #[test]
    fn test_rejects_unknown_log_level() {
        let mut cfg = base_config();
        cfg.logging.level = "verbose".to_string();
        assert!(cfg.validate().is_err());
        cfg.logging.level = "trace".to_string();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_rejects_bad_address() {
        let mut cfg = base_config();
        cfg.server.host = "not an address".to_string();
        assert!(cfg.get_socket_addr().is_err());
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_default_storage_root_without_disk() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("absent");
        assert_eq!(default_storage_root(&missing), PathBuf::from("content"));
        assert_eq!(default_storage_root(dir.path()), dir.path().join("content"));
    }
}
