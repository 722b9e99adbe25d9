//! Shared helpers for CLI commands.

use std::sync::Arc;

use anyhow::{Context, Result};
use console::{StyledObject, style};

use sfapi_adapter_nersc::{Compute, Machine, SfApiClient};
use sfapi_hal::{
    ClientCredentialsAuth, ClientCredentialsConfig, EnvTokenProvider, JobStatus, TokenProvider,
};

use crate::config::ClientConfig;

/// Where the access token comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialSource {
    /// OAuth2 client credentials from the config file or environment.
    ClientCredentials { client_id: String },
    /// Pre-issued token in an environment variable.
    Environment { var: String },
    /// Nothing configured; public endpoints only.
    None,
}

impl std::fmt::Display for CredentialSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CredentialSource::ClientCredentials { client_id } => {
                write!(f, "OAuth2 client {client_id}")
            }
            CredentialSource::Environment { var } => write!(f, "${var}"),
            CredentialSource::None => write!(f, "none"),
        }
    }
}

/// Pick the credential source. Client credentials win over an env token.
pub fn credential_source(config: &ClientConfig) -> CredentialSource {
    credential_source_with(config, |var| std::env::var(var).is_ok_and(|v| !v.is_empty()))
}

fn credential_source_with(config: &ClientConfig, is_set: impl Fn(&str) -> bool) -> CredentialSource {
    if let Some((client_id, _)) = config.client_credentials() {
        CredentialSource::ClientCredentials {
            client_id: client_id.to_string(),
        }
    } else if is_set(&config.token_env) {
        CredentialSource::Environment {
            var: config.token_env.clone(),
        }
    } else {
        CredentialSource::None
    }
}

/// Build the token provider for the configured source.
pub fn token_provider(config: &ClientConfig) -> Result<Option<Arc<dyn TokenProvider>>> {
    let provider: Arc<dyn TokenProvider> = match credential_source(config) {
        CredentialSource::ClientCredentials { .. } => {
            let Some((id, secret)) = config.client_credentials() else {
                return Ok(None);
            };
            let auth = ClientCredentialsAuth::new(ClientCredentialsConfig::custom(
                &config.token_url,
                id,
                secret,
            ))
            .context("Failed to initialize OAuth2 client")?;
            Arc::new(auth)
        }
        CredentialSource::Environment { var } => Arc::new(EnvTokenProvider::new(var)),
        CredentialSource::None => return Ok(None),
    };
    Ok(Some(provider))
}

/// API client with whatever credentials are configured.
pub fn create_client(config: &ClientConfig) -> Result<SfApiClient> {
    let client = SfApiClient::new()
        .context("Failed to create HTTP client")?
        .with_base_url(&config.api_url);

    Ok(match token_provider(config)? {
        Some(provider) => client.with_token_provider(provider),
        None => client,
    })
}

/// Resolve `--machine`, falling back to the configured default.
pub fn resolve_machine(config: &ClientConfig, machine: Option<&str>) -> Result<Machine> {
    match machine {
        Some(name) => Ok(name.parse()?),
        None => config.machine(),
    }
}

/// Authenticated submitter for a machine.
pub fn create_compute(config: &ClientConfig, machine: Option<&str>) -> Result<Compute> {
    let machine = resolve_machine(config, machine)?;
    create_client(config)?.compute(machine).map_err(|e| {
        anyhow::anyhow!(
            "{e}\n  Set {} or configure client_id/client_secret.",
            config.token_env
        )
    })
}

/// Status name coloured by outcome.
pub fn styled_status(status: &JobStatus) -> StyledObject<&'static str> {
    let name = status.name();
    match status {
        JobStatus::Completed => style(name).green(),
        JobStatus::Failed(_) | JobStatus::Cancelled => style(name).red(),
        JobStatus::Queued => style(name).yellow(),
        _ => style(name).cyan(),
    }
}
