//! Configuration file management.
//!
//! Loads the TOML configuration file and layers environment overrides on top.

use std::fs;
use std::path::{Path, PathBuf};

use crate::domain::{AppConfig, AppError, Result};

/// Default configuration file content.
const DEFAULT_CONFIG: &str = r#"# Content Archiver Configuration
# Auto-generated - edit as needed

[paths]
# Custom data directory (optional, defaults to ~/.content-archiver)
# data_dir = "/custom/path"

[aweber]
# Prefer AWEBER_CLIENT_ID / AWEBER_CLIENT_SECRET in the environment or .env
# client_id = ""
# client_secret = ""
redirect_uri = "https://localhost"
# token_file = "/custom/path/aweber_token.json"

[linkedin]
# Directory with raw GraphQL dumps (defaults to <data_dir>/linkedin/raw_data_dumps)
# dumps_dir = "/custom/dumps"
sent_prefix = "linkedIn-response.sent"
queue_prefix = "linkedIn-response.queue"

[pdf]
# Extra directories searched for NotoSans-*.ttf
font_dirs = []
# Compress the PDF with Ghostscript when `gs` is installed
compress = true
"#;

/// Load configuration from `path` (or the default location) plus the environment.
///
/// A missing file yields the defaults.
///
/// # Errors
/// Returns error if the file exists but cannot be read or parsed.
pub fn load_config(path: Option<&Path>) -> Result<AppConfig> {
    let config_path = path.map_or_else(AppConfig::default_config_file, Path::to_path_buf);

    let mut config = if config_path.exists() {
        load_config_from_file(&config_path)?
    } else {
        tracing::debug!(path = %config_path.display(), "No config file, using defaults");
        AppConfig::default()
    };

    config.apply_env(|key| std::env::var(key).ok());

    Ok(config)
}

/// Load configuration from a specific file.
///
/// # Errors
/// Returns error if file cannot be read or parsed.
pub fn load_config_from_file(path: &Path) -> Result<AppConfig> {
    let content = fs::read_to_string(path)
        .map_err(|e| AppError::io(format!("Failed to read config file: {}", path.display()), e))?;

    toml::from_str(&content).map_err(|e| AppError::Config {
        message: format!("Failed to parse config file: {e}"),
    })
}

/// Create the default configuration file if it doesn't exist.
///
/// Returns the path of the file.
///
/// # Errors
/// Returns error if file cannot be created.
pub fn ensure_config_exists(path: Option<&Path>) -> Result<PathBuf> {
    let config_path = path.map_or_else(AppConfig::default_config_file, Path::to_path_buf);

    if !config_path.exists() {
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| AppError::io("Failed to create config directory", e))?;
        }

        fs::write(&config_path, DEFAULT_CONFIG)
            .map_err(|e| AppError::io("Failed to create default config", e))?;

        tracing::info!(path = %config_path.display(), "Created default configuration");
    }

    Ok(config_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config_parses() {
        let config: AppConfig = toml::from_str(DEFAULT_CONFIG).unwrap();
        assert_eq!(config.aweber.redirect_uri, "https://localhost");
        assert_eq!(config.linkedin.queue_prefix, "linkedIn-response.queue");
        assert!(config.pdf.compress);
        assert!(config.paths.data_dir.is_none());
    }

    #[test]
    fn test_ensure_and_load() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("nested").join("config.toml");

        let written = ensure_config_exists(Some(&config_path)).unwrap();
        assert_eq!(written, config_path);

        let loaded = load_config_from_file(&config_path).unwrap();
        assert_eq!(loaded.aweber.api_base, "https://api.aweber.com/1.0");
    }

    #[test]
    fn test_invalid_config_is_an_error() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("config.toml");
        fs::write(&config_path, "[pdf]\ncompress = \"maybe\"\n").unwrap();

        assert!(matches!(
            load_config_from_file(&config_path),
            Err(AppError::Config { .. })
        ));
    }
}
