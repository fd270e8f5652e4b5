//! Infrastructure layer - external adapters (filesystem, HTTP, PDF).
//!
//! This layer handles all I/O operations and external dependencies.

pub mod config;
pub mod http;
pub mod json_store;
pub mod oauth;
pub mod pdf;
pub mod source_paths;

pub use config::{ensure_config_exists, load_config};
pub use http::{ApiTransport, HttpMediaFetcher, MediaFetcher};
pub use json_store::JsonStore;
pub use oauth::OAuthSession;
pub use source_paths::SourcePaths;
