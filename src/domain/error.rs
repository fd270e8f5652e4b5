//! Domain-level error types for content-archiver.
//!
//! All errors are typed with `thiserror` and carry enough context to be
//! printed directly to the console by `main`.

use thiserror::Error;

/// Application-level errors.
#[derive(Error, Debug)]
pub enum AppError {
    /// Invalid or corrupted data in the archive or a source payload.
    #[error("Invalid data: {message}")]
    InvalidData { message: String },

    /// JSON parsing failed.
    #[error("JSON parse error: {message}")]
    JsonParse {
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    /// Configuration or environment error.
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// IO operation failed.
    #[error("IO error: {message}")]
    Io {
        message: String,
        #[source]
        source: Option<std::io::Error>,
    },

    /// HTTP transport failure (connection, timeout, body decoding).
    #[error("HTTP error: {message}")]
    Http {
        message: String,
        #[source]
        source: Option<reqwest::Error>,
    },

    /// The remote API answered with an unexpected status.
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// OAuth token could not be obtained or refreshed.
    #[error("Authorization error: {message}")]
    Auth { message: String },

    /// PDF rendering failed.
    #[error("PDF error: {message}")]
    Pdf { message: String },
}

impl AppError {
    /// Create a JSON parse error.
    pub fn json_parse(err: serde_json::Error) -> Self {
        Self::JsonParse {
            message: err.to_string(),
            source: Some(err),
        }
    }

    /// Create an IO error with context.
    pub fn io(message: impl Into<String>, err: std::io::Error) -> Self {
        Self::Io {
            message: message.into(),
            source: Some(err),
        }
    }

    /// Create an HTTP error with context.
    pub fn http(message: impl Into<String>, err: reqwest::Error) -> Self {
        Self::Http {
            message: format!("{}: {err}", message.into()),
            source: Some(err),
        }
    }

    /// Create an authorization error.
    pub fn auth(message: impl Into<String>) -> Self {
        Self::Auth {
            message: message.into(),
        }
    }

    /// Create a PDF error from anything printable.
    pub fn pdf(err: impl std::fmt::Display) -> Self {
        Self::Pdf {
            message: err.to_string(),
        }
    }
}

/// Result type alias using `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;
