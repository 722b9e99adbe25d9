//! CLI configuration file.
//!
//! ```yaml
//! batch:
//!   concurrency: 4
//!   poll_interval_secs: 30
//!   max_wait_time_secs: 86400
//!   max_poll_failures: 3
//! client:
//!   machine: perlmutter
//!   api_url: https://api.nersc.gov/api/v1.2
//!   client_id: abcdef
//!   client_secret: ...
//! ```
//!
//! Precedence: defaults, then the file, then `SFAPI_*` environment
//! variables, then command-line flags.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use sfapi_adapter_nersc::{BASE_URL, Machine};
use sfapi_hal::auth::{NERSC_TOKEN_URL, SFAPI_TOKEN_VAR};
use sfapi_sched::BatchConfig;

/// Top-level configuration file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CliConfig {
    /// Batch run settings.
    #[serde(default)]
    pub batch: BatchConfig,

    /// API endpoint and credentials.
    #[serde(default)]
    pub client: ClientConfig,
}

/// Endpoint and credential settings.
#[derive(Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Default machine for job commands.
    #[serde(default = "default_machine")]
    pub machine: String,

    /// Superfacility API base URL.
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// OAuth2 token endpoint.
    #[serde(default = "default_token_url")]
    pub token_url: String,

    /// OAuth2 client id.
    #[serde(default)]
    pub client_id: Option<String>,

    /// OAuth2 client secret.
    #[serde(default)]
    pub client_secret: Option<String>,

    /// Environment variable holding a pre-issued access token.
    #[serde(default = "default_token_env")]
    pub token_env: String,
}

fn default_machine() -> String {
    Machine::Perlmutter.to_string()
}

fn default_api_url() -> String {
    BASE_URL.to_string()
}

fn default_token_url() -> String {
    NERSC_TOKEN_URL.to_string()
}

fn default_token_env() -> String {
    SFAPI_TOKEN_VAR.to_string()
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            machine: default_machine(),
            api_url: default_api_url(),
            token_url: default_token_url(),
            client_id: None,
            client_secret: None,
            token_env: default_token_env(),
        }
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("machine", &self.machine)
            .field("api_url", &self.api_url)
            .field("token_url", &self.token_url)
            .field("client_id", &self.client_id)
            .field(
                "client_secret",
                &self.client_secret.as_ref().map(|_| "[REDACTED]"),
            )
            .field("token_env", &self.token_env)
            .finish()
    }
}

impl ClientConfig {
    /// Apply overrides from an arbitrary variable lookup.
    pub fn merge_env_with(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(v) = lookup("SFAPI_MACHINE") {
            self.machine = v;
        }
        if let Some(v) = lookup("SFAPI_API_URL") {
            self.api_url = v;
        }
        if let Some(v) = lookup("SFAPI_TOKEN_URL") {
            self.token_url = v;
        }
        if let Some(v) = lookup("SFAPI_CLIENT_ID") {
            self.client_id = Some(v);
        }
        if let Some(v) = lookup("SFAPI_CLIENT_SECRET") {
            self.client_secret = Some(v);
        }
        self
    }

    /// Parsed default machine.
    pub fn machine(&self) -> Result<Machine> {
        Ok(self.machine.parse()?)
    }

    /// Client id and secret, when both are configured.
    pub fn client_credentials(&self) -> Option<(&str, &str)> {
        match (self.client_id.as_deref(), self.client_secret.as_deref()) {
            (Some(id), Some(secret)) if !id.is_empty() && !secret.is_empty() => Some((id, secret)),
            _ => None,
        }
    }
}

impl CliConfig {
    /// Parse a YAML document.
    pub fn from_yaml(source: &str) -> Result<Self> {
        serde_yaml_ng::from_str(source).context("Invalid configuration file")
    }

    /// Read a YAML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let source = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::from_yaml(&source).with_context(|| format!("In {}", path.display()))
    }

    /// Load configuration.
    ///
    /// An explicit `path` must exist. Without one, the default location is
    /// used when present.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) => Self::from_file(path)?,
            None => match default_config_path() {
                Some(path) if path.exists() => Self::from_file(&path)?,
                _ => Self::default(),
            },
        };

        Ok(config.merge_env_with(|key| std::env::var(key).ok()))
    }

    /// Apply environment overrides to every section.
    pub fn merge_env_with(self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            batch: self.batch.merge_env_with(&lookup),
            client: self.client.merge_env_with(&lookup),
        }
    }
}

/// `~/.config/sfapi/config.yaml` (platform equivalent).
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("sfapi").join("config.yaml"))
}
