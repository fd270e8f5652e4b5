//! Blocking HTTP plumbing shared by the source adapters.
//!
//! Adapters talk to the network only through [`ApiTransport`] and
//! [`MediaFetcher`], so their logic runs against in-memory fakes in tests.

use std::time::Duration;

use reqwest::blocking::Client;

use crate::domain::{AppError, Result};

/// Timeout applied to media downloads.
pub const MEDIA_TIMEOUT: Duration = Duration::from_secs(10);

/// Status and decoded JSON body of an API response.
#[derive(Debug, Clone)]
pub struct ApiReply {
    pub status: u16,
    /// Decoded body; `Null` when a non-success body is not JSON.
    pub body: serde_json::Value,
}

impl ApiReply {
    /// Whether the response is `200 OK`.
    #[must_use]
    pub const fn is_ok(&self) -> bool {
        self.status == 200
    }

    /// Whether the response denies access to the resource.
    #[must_use]
    pub const fn is_permission_denied(&self) -> bool {
        matches!(self.status, 401 | 403)
    }
}

/// Authenticated JSON GET access to a remote API.
pub trait ApiTransport {
    /// GET `url` with optional query parameters.
    ///
    /// Non-success statuses are returned as replies, not errors.
    ///
    /// # Errors
    /// Returns error on transport failure or an undecodable success body.
    fn get_json(&mut self, url: &str, query: &[(&str, &str)]) -> Result<ApiReply>;
}

/// Downloader for attachment bytes.
pub trait MediaFetcher {
    /// Fetch the bytes behind `url`.
    ///
    /// # Errors
    /// Returns error on transport failure or a non-success status.
    fn fetch(&self, url: &str) -> Result<Vec<u8>>;
}

/// Decode a response into an [`ApiReply`].
///
/// # Errors
/// Returns error if a success body is not valid JSON.
pub fn into_reply(resp: reqwest::blocking::Response) -> Result<ApiReply> {
    let status = resp.status().as_u16();
    let text = resp
        .text()
        .map_err(|e| AppError::http("Failed to read response body", e))?;

    let body = if status == 200 {
        serde_json::from_str(&text).map_err(AppError::json_parse)?
    } else {
        serde_json::from_str(&text).unwrap_or(serde_json::Value::Null)
    };

    Ok(ApiReply { status, body })
}

/// Media downloader over plain HTTP with a fixed timeout.
pub struct HttpMediaFetcher {
    client: Client,
}

impl HttpMediaFetcher {
    /// Create a fetcher using [`MEDIA_TIMEOUT`].
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be built.
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .timeout(MEDIA_TIMEOUT)
            .build()
            .map_err(|e| AppError::http("Failed to build HTTP client", e))?;

        Ok(Self { client })
    }
}

impl MediaFetcher for HttpMediaFetcher {
    fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        let resp = self
            .client
            .get(url)
            .send()
            .map_err(|e| AppError::http(format!("Download of {url} failed"), e))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(AppError::Api {
                status: status.as_u16(),
                message: format!("Download of {url} failed"),
            });
        }

        resp.bytes()
            .map(|b| b.to_vec())
            .map_err(|e| AppError::http(format!("Failed to read {url}"), e))
    }
}
