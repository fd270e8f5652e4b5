//! OAuth2 session for the AWeber API.
//!
//! Authorization-code grant and refresh-token renewal through `oauth2`, with
//! a JSON token cache. The cache keeps the `requests-oauthlib` field layout
//! (`expires_at` in epoch seconds) so existing token files stay usable.

use std::fs;
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};

use chrono::Utc;
use oauth2::basic::{BasicClient, BasicTokenResponse};
use oauth2::{
    AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken, EndpointNotSet, EndpointSet,
    RedirectUrl, RefreshToken, Scope, TokenUrl,
};
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::domain::{AppError, AweberConfig, Result};

use super::http::{into_reply, ApiReply, ApiTransport};

/// OAuth client with the authorization and token endpoints configured.
type AweberClient =
    BasicClient<EndpointSet, EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointSet>;

/// Refresh tokens this many seconds before they expire.
const EXPIRY_SLACK_SECS: f64 = 30.0;

/// Cached OAuth token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredToken {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub expires_in: Option<f64>,
    /// Absolute expiry in epoch seconds.
    #[serde(default)]
    pub expires_at: Option<f64>,
    /// Any other field the provider returned.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl StoredToken {
    /// Whether the token expires within the refresh slack.
    #[must_use]
    pub fn is_expired(&self, now_secs: f64) -> bool {
        self.expires_at
            .is_some_and(|at| at - EXPIRY_SLACK_SECS <= now_secs)
    }

    /// Fill `expires_at` from `expires_in` when the provider omitted it.
    fn stamp_expiry(&mut self, now_secs: f64) {
        if self.expires_at.is_none() {
            self.expires_at = self.expires_in.map(|secs| now_secs + secs);
        }
    }
}

fn now_secs() -> f64 {
    Utc::now().timestamp_millis() as f64 / 1000.0
}

/// Read a cached token, if any.
///
/// # Errors
/// Returns error if the file exists but cannot be read or parsed.
pub fn load_token(path: &Path) -> Result<Option<StoredToken>> {
    if !path.exists() {
        return Ok(None);
    }

    let content = fs::read_to_string(path)
        .map_err(|e| AppError::io(format!("Failed to read {}", path.display()), e))?;
    serde_json::from_str(&content)
        .map(Some)
        .map_err(AppError::json_parse)
}

/// Persist a token to the cache file.
///
/// # Errors
/// Returns error if the file cannot be written.
pub fn save_token(path: &Path, token: &StoredToken) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| AppError::io("Failed to create token directory", e))?;
    }

    let json = serde_json::to_string_pretty(token).map_err(AppError::json_parse)?;
    fs::write(path, json)
        .map_err(|e| AppError::io(format!("Failed to write {}", path.display()), e))
}

/// Build the OAuth client from the configured endpoints.
///
/// # Errors
/// Returns error if an endpoint URL is invalid.
fn oauth_client(
    config: &AweberConfig,
    client_id: &str,
    client_secret: Option<&str>,
) -> Result<AweberClient> {
    let invalid = |what: &str, value: &str, e: oauth2::url::ParseError| AppError::Config {
        message: format!("Invalid {what} {value}: {e}"),
    };

    let client = BasicClient::new(ClientId::new(client_id.to_string()))
        .set_auth_uri(
            AuthUrl::new(config.auth_url.clone())
                .map_err(|e| invalid("authorization URL", &config.auth_url, e))?,
        )
        .set_token_uri(
            TokenUrl::new(config.token_url.clone())
                .map_err(|e| invalid("token URL", &config.token_url, e))?,
        )
        .set_redirect_uri(
            RedirectUrl::new(config.redirect_uri.clone())
                .map_err(|e| invalid("redirect URI", &config.redirect_uri, e))?,
        );

    Ok(match client_secret {
        Some(secret) => client.set_client_secret(ClientSecret::new(secret.to_string())),
        None => client,
    })
}

/// URL the user opens to grant access, with its fresh `state` token.
fn authorization_url(client: &AweberClient, scopes: &[String]) -> (String, CsrfToken) {
    let (url, state) = client
        .authorize_url(CsrfToken::new_random)
        .add_scopes(scopes.iter().cloned().map(Scope::new))
        .url();
    (url.to_string(), state)
}

/// Extract the authorization code from the pasted redirect URL.
///
/// # Errors
/// Returns error if the URL is invalid, reports an error, lacks a code, or
/// carries a different `state`.
pub fn extract_code(redirect: &str, expected_state: &str) -> Result<String> {
    let url = Url::parse(redirect.trim())
        .map_err(|e| AppError::auth(format!("Invalid redirect URL: {e}")))?;

    let mut code = None;
    let mut state = None;
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "code" => code = Some(value.into_owned()),
            "state" => state = Some(value.into_owned()),
            "error" => return Err(AppError::auth(format!("Authorization denied: {value}"))),
            _ => {}
        }
    }

    if state.as_deref() != Some(expected_state) {
        return Err(AppError::auth("State mismatch in redirect URL"));
    }

    code.ok_or_else(|| AppError::auth("Redirect URL has no authorization code"))
}

/// Convert a token endpoint response into the cached layout.
fn stored_token(response: &BasicTokenResponse) -> Result<StoredToken> {
    let value = serde_json::to_value(response).map_err(AppError::json_parse)?;
    let mut token: StoredToken = serde_json::from_value(value).map_err(AppError::json_parse)?;
    token.stamp_expiry(now_secs());
    Ok(token)
}

/// An authenticated API session with automatic token refresh.
pub struct OAuthSession {
    client: Client,
    oauth: AweberClient,
    /// Token endpoint client; never follows redirects.
    token_http: Client,
    token_file: PathBuf,
    token: StoredToken,
}

impl OAuthSession {
    /// Load the cached token or run the interactive authorization.
    ///
    /// # Errors
    /// Returns error if credentials are missing or no token can be obtained.
    pub fn establish(config: &AweberConfig, token_file: PathBuf) -> Result<Self> {
        let client_id = config.client_id.as_deref().ok_or_else(|| AppError::Config {
            message: "AWEBER_CLIENT_ID is not set".into(),
        })?;
        let client_secret = config.client_secret.as_deref().ok_or_else(|| AppError::Config {
            message: "AWEBER_CLIENT_SECRET is not set".into(),
        })?;

        let oauth = oauth_client(config, client_id, Some(client_secret))?;
        let client = Client::builder()
            .build()
            .map_err(|e| AppError::http("Failed to build HTTP client", e))?;
        let token_http = Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| AppError::http("Failed to build HTTP client", e))?;

        let token = if let Some(token) = load_token(&token_file)? {
            tracing::debug!(path = %token_file.display(), "Using cached token");
            token
        } else {
            let stdin = std::io::stdin();
            let token =
                authorize_interactive(&oauth, &token_http, &config.scopes, &mut stdin.lock())?;
            save_token(&token_file, &token)?;
            token
        };

        Ok(Self {
            client,
            oauth,
            token_http,
            token_file,
            token,
        })
    }

    /// Refresh the access token if it is about to expire.
    ///
    /// # Errors
    /// Returns error if the refresh request fails.
    pub fn ensure_fresh(&mut self) -> Result<()> {
        if !self.token.is_expired(now_secs()) {
            return Ok(());
        }

        let refresh_token = self
            .token
            .refresh_token
            .clone()
            .ok_or_else(|| AppError::auth("Token expired and no refresh token is cached"))?;

        let response = self
            .oauth
            .exchange_refresh_token(&RefreshToken::new(refresh_token.clone()))
            .request(&self.token_http)
            .map_err(|e| AppError::auth(format!("Token refresh failed: {e}")))?;

        let mut token = stored_token(&response)?;
        if token.refresh_token.is_none() {
            token.refresh_token = Some(refresh_token);
        }

        save_token(&self.token_file, &token)?;
        let name = self
            .token_file
            .file_name()
            .map_or_else(String::new, |n| n.to_string_lossy().into_owned());
        println!("🔄 Token refreshed and saved to {name}");

        self.token = token;
        Ok(())
    }
}

impl ApiTransport for OAuthSession {
    fn get_json(&mut self, url: &str, query: &[(&str, &str)]) -> Result<ApiReply> {
        self.ensure_fresh()?;

        let mut request = self.client.get(url).bearer_auth(&self.token.access_token);
        if !query.is_empty() {
            request = request.query(query);
        }

        let resp = request
            .send()
            .map_err(|e| AppError::http(format!("GET {url} failed"), e))?;

        into_reply(resp)
    }
}

/// Prompt for the redirect URL and exchange the code for a token.
fn authorize_interactive<R: BufRead>(
    oauth: &AweberClient,
    token_http: &Client,
    scopes: &[String],
    input: &mut R,
) -> Result<StoredToken> {
    let (url, state) = authorization_url(oauth, scopes);
    println!("🔐 Initial Authorization Required:\n{url}");
    print!("Paste redirect URL: ");
    std::io::stdout()
        .flush()
        .map_err(|e| AppError::io("Failed to flush stdout", e))?;

    let mut line = String::new();
    input
        .read_line(&mut line)
        .map_err(|e| AppError::io("Failed to read redirect URL", e))?;

    let code = extract_code(&line, state.secret())?;
    let response = oauth
        .exchange_code(AuthorizationCode::new(code))
        .request(token_http)
        .map_err(|e| AppError::auth(format!("Code exchange failed: {e}")))?;

    stored_token(&response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn token(expires_at: Option<f64>) -> StoredToken {
        StoredToken {
            access_token: "abc".into(),
            refresh_token: Some("r".into()),
            token_type: Some("bearer".into()),
            expires_in: Some(7200.0),
            expires_at,
            extra: serde_json::Map::new(),
        }
    }

    #[test]
    fn test_expiry_with_slack() {
        assert!(!token(None).is_expired(1000.0));
        assert!(!token(Some(2000.0)).is_expired(1000.0));
        assert!(token(Some(1020.0)).is_expired(1000.0));
        assert!(token(Some(900.0)).is_expired(1000.0));
    }

    #[test]
    fn test_stamp_expiry() {
        let mut t = token(None);
        t.stamp_expiry(100.0);
        assert_eq!(t.expires_at, Some(7300.0));
    }

    #[test]
    fn test_token_cache_keeps_unknown_fields() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("token.json");
        fs::write(
            &path,
            r#"{"access_token": "a", "refresh_token": "r", "expires_at": 1.5, "scope": ["list.read"]}"#,
        )
        .unwrap();

        let loaded = load_token(&path).unwrap().unwrap();
        assert_eq!(loaded.access_token, "a");
        assert!(loaded.extra.contains_key("scope"));

        save_token(&path, &loaded).unwrap();
        assert_eq!(load_token(&path).unwrap().unwrap(), loaded);
    }

    #[test]
    fn test_load_missing_token() {
        let dir = tempdir().unwrap();
        assert!(load_token(&dir.path().join("none.json")).unwrap().is_none());
    }

    #[test]
    fn test_authorization_url() {
        let config = AweberConfig::default();
        let client = oauth_client(&config, "my-client", None).unwrap();
        let (url, state) = authorization_url(&client, &config.scopes);

        assert!(url.starts_with("https://auth.aweber.com/oauth2/authorize?"));
        assert!(url.contains("response_type=code"));
        assert!(url.contains("client_id=my-client"));
        assert!(url.contains(&format!("state={}", state.secret())));
        assert!(url.contains("scope=account.read+list.read+email.read"));
        assert!(url.contains("redirect_uri=https%3A%2F%2Flocalhost"));
    }

    #[test]
    fn test_invalid_endpoint_is_config_error() {
        let config = AweberConfig {
            token_url: "not a url".into(),
            ..Default::default()
        };
        assert!(matches!(
            oauth_client(&config, "id", Some("secret")),
            Err(AppError::Config { .. })
        ));
    }

    #[test]
    fn test_token_response_maps_to_cache_layout() {
        let response: BasicTokenResponse = serde_json::from_str(
            r#"{"access_token": "acc", "token_type": "bearer", "expires_in": 7200, "refresh_token": "ref"}"#,
        )
        .unwrap();

        let before = now_secs();
        let token = stored_token(&response).unwrap();

        assert_eq!(token.access_token, "acc");
        assert_eq!(token.refresh_token.as_deref(), Some("ref"));
        assert_eq!(token.expires_in, Some(7200.0));
        let expires_at = token.expires_at.unwrap();
        assert!(expires_at >= before + 7200.0 && expires_at < before + 7300.0);
    }

    #[test]
    fn test_extract_code() {
        let code = extract_code("https://localhost/?code=C0DE&state=s1\n", "s1").unwrap();
        assert_eq!(code, "C0DE");

        assert!(extract_code("https://localhost/?code=C0DE&state=other", "s1").is_err());
        assert!(extract_code("https://localhost/?state=s1", "s1").is_err());
        assert!(extract_code("https://localhost/?error=access_denied&state=s1", "s1").is_err());
        assert!(extract_code("not a url", "s1").is_err());
    }
}
