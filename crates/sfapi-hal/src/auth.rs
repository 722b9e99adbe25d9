//! Token providers for authenticated API calls.
//!
//! Three providers are available:
//!
//! - [`StaticTokenProvider`] wraps a token obtained elsewhere.
//! - [`EnvTokenProvider`] reads a token from an environment variable
//!   (`SFAPI_TOKEN` by default).
//! - [`ClientCredentialsAuth`] runs the OAuth2 client-credentials grant and
//!   caches the access token until shortly before it expires.
//!
//! # Example
//!
//! ```ignore
//! use sfapi_hal::auth::{ClientCredentialsAuth, ClientCredentialsConfig, TokenProvider};
//!
//! let config = ClientCredentialsConfig::nersc("my-client-id", "my-secret");
//! let auth = ClientCredentialsAuth::new(config)?;
//! let token = auth.get_token().await?;
//! ```

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::error::{HalError, HalResult};

/// NERSC OAuth2 token endpoint.
pub const NERSC_TOKEN_URL: &str = "https://oidc.nersc.gov/c2id/token";

/// Environment variable read by [`EnvTokenProvider::sfapi`].
pub const SFAPI_TOKEN_VAR: &str = "SFAPI_TOKEN";

/// Token provider trait for dependency injection.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// Get a valid access token.
    async fn get_token(&self) -> HalResult<String>;

    /// Check if authentication is available without doing any I/O.
    fn has_valid_token(&self) -> bool;
}

/// Provider holding a fixed access token.
pub struct StaticTokenProvider {
    token: String,
}

impl StaticTokenProvider {
    /// Wrap an access token.
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

impl fmt::Debug for StaticTokenProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StaticTokenProvider")
            .field("token", &"[REDACTED]")
            .finish()
    }
}

#[async_trait]
impl TokenProvider for StaticTokenProvider {
    async fn get_token(&self) -> HalResult<String> {
        Ok(self.token.clone())
    }

    fn has_valid_token(&self) -> bool {
        !self.token.is_empty()
    }
}

/// Environment variable token provider.
#[derive(Debug)]
pub struct EnvTokenProvider {
    env_var: String,
}

impl EnvTokenProvider {
    /// Create a new environment variable token provider.
    pub fn new(env_var: impl Into<String>) -> Self {
        Self {
            env_var: env_var.into(),
        }
    }

    /// Create provider for `SFAPI_TOKEN`.
    pub fn sfapi() -> Self {
        Self::new(SFAPI_TOKEN_VAR)
    }
}

#[async_trait]
impl TokenProvider for EnvTokenProvider {
    async fn get_token(&self) -> HalResult<String> {
        std::env::var(&self.env_var).map_err(|_| {
            HalError::AuthenticationFailed(format!("Environment variable {} not set", self.env_var))
        })
    }

    fn has_valid_token(&self) -> bool {
        std::env::var(&self.env_var).is_ok_and(|v| !v.is_empty())
    }
}

/// OAuth2 client-credentials configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct ClientCredentialsConfig {
    /// Token endpoint URL.
    pub token_endpoint: String,
    /// Client ID issued by the provider.
    pub client_id: String,
    /// Client secret issued by the provider.
    pub client_secret: String,
    /// Scopes to request (space-joined in the request).
    #[serde(default)]
    pub scopes: Vec<String>,
    /// Refresh this many seconds before the token expires.
    #[serde(default = "default_refresh_buffer")]
    pub refresh_buffer_secs: u64,
}

fn default_refresh_buffer() -> u64 {
    60
}

impl ClientCredentialsConfig {
    /// Configuration for the NERSC token endpoint.
    pub fn nersc(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self::custom(NERSC_TOKEN_URL, client_id, client_secret)
    }

    /// Configuration for an arbitrary token endpoint.
    pub fn custom(
        token_endpoint: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        Self {
            token_endpoint: token_endpoint.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            scopes: Vec::new(),
            refresh_buffer_secs: default_refresh_buffer(),
        }
    }

    /// Set the scopes.
    pub fn with_scopes(mut self, scopes: Vec<String>) -> Self {
        self.scopes = scopes;
        self
    }
}

impl fmt::Debug for ClientCredentialsConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientCredentialsConfig")
            .field("token_endpoint", &self.token_endpoint)
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("scopes", &self.scopes)
            .field("refresh_buffer_secs", &self.refresh_buffer_secs)
            .finish()
    }
}

/// Cached token with metadata.
#[derive(Clone, Serialize, Deserialize)]
pub struct CachedToken {
    /// Access token.
    pub access_token: String,
    /// Token type (usually "Bearer").
    pub token_type: String,
    /// Expiration time (Unix timestamp).
    pub expires_at: i64,
}

impl CachedToken {
    /// Check if the token is expired.
    pub fn is_expired(&self) -> bool {
        chrono::Utc::now().timestamp() >= self.expires_at
    }

    /// Check if the token will expire soon (within buffer).
    pub fn expires_soon(&self, buffer_secs: u64) -> bool {
        let buffer = i64::try_from(buffer_secs).unwrap_or(i64::MAX);
        chrono::Utc::now().timestamp().saturating_add(buffer) >= self.expires_at
    }
}

impl fmt::Debug for CachedToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CachedToken")
            .field("access_token", &"[REDACTED]")
            .field("token_type", &self.token_type)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Token response from the provider.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_token_type")]
    token_type: String,
    #[serde(default = "default_expires_in")]
    expires_in: u64,
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

fn default_expires_in() -> u64 {
    600
}

/// OAuth2 client-credentials authentication handler.
pub struct ClientCredentialsAuth {
    config: ClientCredentialsConfig,
    client: reqwest::Client,
    cached_token: RwLock<Option<CachedToken>>,
}

impl ClientCredentialsAuth {
    /// Create a new handler. No request is made until the first token is needed.
    pub fn new(config: ClientCredentialsConfig) -> HalResult<Self> {
        if config.client_id.is_empty() || config.client_secret.is_empty() {
            return Err(HalError::Configuration(
                "client_id and client_secret must both be set".into(),
            ));
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| {
                HalError::Configuration(format!("Failed to create HTTP client: {e}"))
            })?;

        Ok(Self {
            config,
            client,
            cached_token: RwLock::new(None),
        })
    }

    /// Get a valid access token, requesting a new one if necessary.
    pub async fn get_token(&self) -> HalResult<String> {
        {
            let cached = self.cached_token.read().await;
            if let Some(ref token) = *cached {
                if !token.expires_soon(self.config.refresh_buffer_secs) {
                    return Ok(token.access_token.clone());
                }
            }
        }

        let mut cached = self.cached_token.write().await;
        // Another caller may have refreshed while we waited for the lock.
        if let Some(ref token) = *cached {
            if !token.expires_soon(self.config.refresh_buffer_secs) {
                return Ok(token.access_token.clone());
            }
        }

        let token = self.request_token().await?;
        let access_token = token.access_token.clone();
        *cached = Some(token);
        Ok(access_token)
    }

    /// Check whether a cached token is still usable.
    pub fn has_valid_token(&self) -> bool {
        self.cached_token
            .try_read()
            .map(|cached| cached.as_ref().is_some_and(|t| !t.is_expired()))
            .unwrap_or(false)
    }

    async fn request_token(&self) -> HalResult<CachedToken> {
        debug!("Requesting access token from {}", self.config.token_endpoint);

        let scope = self.config.scopes.join(" ");
        let mut form = vec![
            ("grant_type", "client_credentials"),
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
        ];
        if !scope.is_empty() {
            form.push(("scope", scope.as_str()));
        }

        let response = self
            .client
            .post(&self.config.token_endpoint)
            .form(&form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(HalError::AuthenticationFailed(format!(
                "token request failed ({status}): {body}"
            )));
        }

        let body: TokenResponse = response.json().await?;
        let expires_in = i64::try_from(body.expires_in).unwrap_or(i64::MAX);
        info!("Obtained access token (expires in {}s)", body.expires_in);

        Ok(CachedToken {
            access_token: body.access_token,
            token_type: body.token_type,
            expires_at: chrono::Utc::now().timestamp().saturating_add(expires_in),
        })
    }
}

impl fmt::Debug for ClientCredentialsAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientCredentialsAuth")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl TokenProvider for ClientCredentialsAuth {
    async fn get_token(&self) -> HalResult<String> {
        ClientCredentialsAuth::get_token(self).await
    }

    fn has_valid_token(&self) -> bool {
        ClientCredentialsAuth::has_valid_token(self)
    }
}
