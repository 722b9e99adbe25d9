//! Auth command implementation.
//!
//! Inspect the configured credentials and fetch access tokens.

use anyhow::Result;
use console::style;

use super::common::{CredentialSource, credential_source, token_provider};
use crate::config::{CliConfig, default_config_path};

/// Execute the auth status subcommand.
pub async fn execute_status(config: &CliConfig) -> Result<()> {
    let source = credential_source(&config.client);

    println!("{} Authentication status:\n", style("→").cyan().bold());
    println!("  {}: {}", style("API").bold(), config.client.api_url);
    println!("  {}: {}", style("Credentials").bold(), source);

    let Some(provider) = token_provider(&config.client)? else {
        println!("\n  No credentials configured. Public endpoints only.");
        println!(
            "  Set {} or add client_id/client_secret to {}.",
            style(&config.client.token_env).dim(),
            style(
                default_config_path()
                    .map_or_else(|| "the config file".to_string(), |p| p.display().to_string())
            )
            .dim()
        );
        return Ok(());
    };

    match provider.get_token().await {
        Ok(_) => println!("  {}: {}", style("Token").bold(), style("valid").green()),
        Err(e) => println!("  {}: {}", style("Token").bold(), style(e).red()),
    }

    if let CredentialSource::ClientCredentials { .. } = source {
        println!("  {}: {}", style("Token endpoint").bold(), config.client.token_url);
    }

    Ok(())
}

/// Execute the auth token subcommand: print an access token to stdout.
pub async fn execute_token(config: &CliConfig) -> Result<()> {
    let provider = token_provider(&config.client)?.ok_or_else(|| {
        anyhow::anyhow!(
            "No credentials configured (set {} or client_id/client_secret)",
            config.client.token_env
        )
    })?;

    let token = provider.get_token().await?;
    println!("{token}");
    Ok(())
}
