//! Application configuration.
//!
//! Built once at startup from the TOML file and the environment, then passed
//! explicitly to every adapter and renderer.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Path configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PathConfig {
    /// Base data directory holding one subdirectory per source.
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
}

/// AWeber API and OAuth settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AweberConfig {
    #[serde(default)]
    pub client_id: Option<String>,

    #[serde(default)]
    pub client_secret: Option<String>,

    #[serde(default = "default_redirect_uri")]
    pub redirect_uri: String,

    /// Token cache file; defaults to `<data_dir>/aweber/aweber_token.json`.
    #[serde(default)]
    pub token_file: Option<PathBuf>,

    #[serde(default = "default_api_base")]
    pub api_base: String,

    #[serde(default = "default_auth_url")]
    pub auth_url: String,

    #[serde(default = "default_token_url")]
    pub token_url: String,

    #[serde(default = "default_scopes")]
    pub scopes: Vec<String>,
}

impl Default for AweberConfig {
    fn default() -> Self {
        Self {
            client_id: None,
            client_secret: None,
            redirect_uri: default_redirect_uri(),
            token_file: None,
            api_base: default_api_base(),
            auth_url: default_auth_url(),
            token_url: default_token_url(),
            scopes: default_scopes(),
        }
    }
}

fn default_redirect_uri() -> String {
    "https://localhost".to_string()
}

fn default_api_base() -> String {
    "https://api.aweber.com/1.0".to_string()
}

fn default_auth_url() -> String {
    "https://auth.aweber.com/oauth2/authorize".to_string()
}

fn default_token_url() -> String {
    "https://auth.aweber.com/oauth2/token".to_string()
}

fn default_scopes() -> Vec<String> {
    vec![
        "account.read".to_string(),
        "list.read".to_string(),
        "email.read".to_string(),
    ]
}

/// Buffer/LinkedIn dump locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DumpConfig {
    /// Directory holding raw GraphQL dumps; defaults to `<data_dir>/linkedin/raw_data_dumps`.
    #[serde(default)]
    pub dumps_dir: Option<PathBuf>,

    #[serde(default = "default_sent_prefix")]
    pub sent_prefix: String,

    #[serde(default = "default_queue_prefix")]
    pub queue_prefix: String,
}

impl Default for DumpConfig {
    fn default() -> Self {
        Self {
            dumps_dir: None,
            sent_prefix: default_sent_prefix(),
            queue_prefix: default_queue_prefix(),
        }
    }
}

fn default_sent_prefix() -> String {
    "linkedIn-response.sent".to_string()
}

fn default_queue_prefix() -> String {
    "linkedIn-response.queue".to_string()
}

/// PDF export settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PdfConfig {
    /// Extra directories searched for NotoSans fonts.
    #[serde(default)]
    pub font_dirs: Vec<PathBuf>,

    /// Run Ghostscript over the raw PDF when available.
    #[serde(default = "default_compress")]
    pub compress: bool,
}

impl Default for PdfConfig {
    fn default() -> Self {
        Self {
            font_dirs: Vec::new(),
            compress: default_compress(),
        }
    }
}

const fn default_compress() -> bool {
    true
}

/// Complete application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub paths: PathConfig,

    #[serde(default)]
    pub aweber: AweberConfig,

    #[serde(default)]
    pub linkedin: DumpConfig,

    #[serde(default)]
    pub pdf: PdfConfig,
}

impl AppConfig {
    /// Get the data directory, using default if not configured.
    #[must_use]
    pub fn data_dir(&self) -> PathBuf {
        self.paths
            .data_dir
            .clone()
            .unwrap_or_else(Self::default_data_dir)
    }

    /// Get the default data directory path.
    #[must_use]
    pub fn default_data_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".content-archiver")
    }

    /// Get the default config file path.
    #[must_use]
    pub fn default_config_file() -> PathBuf {
        Self::default_data_dir().join("config.toml")
    }

    /// Get the OAuth token cache path.
    #[must_use]
    pub fn token_file(&self) -> PathBuf {
        self.aweber
            .token_file
            .clone()
            .unwrap_or_else(|| self.data_dir().join("aweber").join("aweber_token.json"))
    }

    /// Get the directory scanned for LinkedIn dumps.
    #[must_use]
    pub fn dumps_dir(&self) -> PathBuf {
        self.linkedin
            .dumps_dir
            .clone()
            .unwrap_or_else(|| self.data_dir().join("linkedin").join("raw_data_dumps"))
    }

    /// Apply environment overrides through a lookup function.
    ///
    /// Recognized: `AWEBER_CLIENT_ID`, `AWEBER_CLIENT_SECRET`,
    /// `AWEBER_REDIRECT_URI`, `DATA_DIR`.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(id) = non_empty("AWEBER_CLIENT_ID") {
            self.aweber.client_id = Some(id);
        }
        if let Some(secret) = non_empty("AWEBER_CLIENT_SECRET") {
            self.aweber.client_secret = Some(secret);
        }
        if let Some(uri) = non_empty("AWEBER_REDIRECT_URI") {
            self.aweber.redirect_uri = uri;
        }
        if let Some(dir) = non_empty("DATA_DIR") {
            self.paths.data_dir = Some(PathBuf::from(dir));
        }
    }
}
