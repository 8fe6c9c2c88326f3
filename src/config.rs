use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use dialoguer::{Confirm, Input, Password};
use std::path::{Path, PathBuf};

use crate::auth::{CredentialRecord, CredentialStore, JsonFileStore, DEFAULT_IMS_URL, DEFAULT_SANDBOX};

/// Credential and access-token toolkit for the Experience Platform API
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    /// Path to the JSON credentials file
    #[arg(
        short = 'c',
        long,
        env = "AEP_CREDENTIALS_FILE",
        default_value = "config/credentials.json"
    )]
    pub credentials: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// HTTP request timeout in seconds
    #[arg(long, env = "HTTP_REQUEST_TIMEOUT", default_value = "30")]
    pub http_timeout: u64,

    /// HTTP connect timeout in seconds
    #[arg(long, env = "HTTP_CONNECT_TIMEOUT", default_value = "10")]
    pub connect_timeout: u64,

    /// HTTP max retries for platform calls
    #[arg(long, env = "HTTP_MAX_RETRIES", default_value = "3")]
    pub http_retries: u32,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Print a validated access token (refreshing when needed)
    Token,
    /// Request a new access token even if the current one is valid
    Refresh,
    /// Check that the access token is accepted by the platform
    Check,
    /// Show how long the stored token has left
    Status,
    /// Print the credentials with secrets masked
    Show,
    /// Check the credentials file for missing fields
    Validate,
    /// Replace the active credentials with another file
    Import {
        /// Path of the credentials file to load
        path: PathBuf,
    },
    /// Create a credentials file interactively
    Init,
    /// Authenticated GET against the platform, printed as JSON
    Get {
        /// API path, e.g. /data/foundation/catalog/dataSets
        path: String,
        /// Query parameter as key=value (repeatable)
        #[arg(short, long = "query", value_parser = parse_key_value)]
        query: Vec<(String, String)>,
    },
}

#[derive(Clone, Debug)]
pub struct Config {
    // Credentials
    pub credentials_file: PathBuf,

    // HTTP client
    pub http_request_timeout: u64,
    pub http_connect_timeout: u64,
    pub http_max_retries: u32,

    // Logging
    pub log_level: String,
}

impl Config {
    /// Load configuration from all sources with priority: CLI > ENV > defaults
    pub fn load() -> Result<(Self, Command)> {
        // Load .env file if it exists
        dotenvy::dotenv().ok();

        let args = CliArgs::parse();
        let config = Self::from_args(&args);
        Ok((config, args.command))
    }

    pub fn from_args(args: &CliArgs) -> Self {
        Config {
            credentials_file: expand_tilde(&args.credentials),
            http_request_timeout: args.http_timeout,
            http_connect_timeout: args.connect_timeout,
            http_max_retries: args.http_retries,
            log_level: args.log_level.to_lowercase(),
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.http_request_timeout == 0 {
            anyhow::bail!("HTTP_REQUEST_TIMEOUT must be greater than zero");
        }
        if self.http_connect_timeout == 0 {
            anyhow::bail!("HTTP_CONNECT_TIMEOUT must be greater than zero");
        }
        Ok(())
    }
}

/// Expand tilde (~) in file paths to user's home directory
fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}

/// Parse a `key=value` query argument
fn parse_key_value(s: &str) -> std::result::Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{}'", s))?;
    if key.is_empty() {
        return Err(format!("empty key in '{}'", s));
    }
    Ok((key.to_string(), value.to_string()))
}

// === Interactive Setup ===

/// Prompt for credentials and write them to `path`
pub fn run_interactive_setup(path: &Path) -> Result<CredentialRecord> {
    println!();
    println!("Creating credentials file at {}", path.display());
    println!();

    if path.exists() {
        let overwrite = Confirm::new()
            .with_prompt("A credentials file already exists. Overwrite it?")
            .default(false)
            .interact()
            .context("Failed to read confirmation")?;
        if !overwrite {
            anyhow::bail!("Setup cancelled, existing credentials left untouched");
        }
    }

    let base_url: String = Input::new()
        .with_prompt("Platform base URL")
        .default("https://platform.adobe.io".to_string())
        .interact_text()
        .context("Failed to read base URL")?;

    let ims_url: String = Input::new()
        .with_prompt("IMS URL")
        .default(DEFAULT_IMS_URL.to_string())
        .interact_text()
        .context("Failed to read IMS URL")?;

    let org_id: String = Input::new()
        .with_prompt("IMS organization ID")
        .interact_text()
        .context("Failed to read organization ID")?;

    let sandbox: String = Input::new()
        .with_prompt("Sandbox name")
        .default(DEFAULT_SANDBOX.to_string())
        .interact_text()
        .context("Failed to read sandbox")?;

    let client_id: String = Input::new()
        .with_prompt("Client ID (also used as API key)")
        .interact_text()
        .context("Failed to read client ID")?;

    let client_secret: String = Password::new()
        .with_prompt("Client secret")
        .interact()
        .context("Failed to read client secret")?;

    let scopes: String = Input::new()
        .with_prompt("Scopes (space or comma separated)")
        .default("openid,AdobeID,read_organizations".to_string())
        .interact_text()
        .context("Failed to read scopes")?;

    let record = CredentialRecord {
        base_url,
        api_key: client_id.clone(),
        org_id,
        sandbox: Some(sandbox),
        client_id,
        client_secret,
        ims_url: Some(ims_url),
        scopes: Some(split_scopes(&scopes)),
        ..Default::default()
    };

    let missing = record.missing_fields();
    if !missing.is_empty() {
        anyhow::bail!("Missing required values: {}", missing.join(", "));
    }

    JsonFileStore::new(path)
        .save(&record)
        .context("Failed to write credentials file")?;

    println!();
    println!("✅ Credentials saved to {}", path.display());
    Ok(record)
}

fn split_scopes(s: &str) -> Vec<String> {
    s.split(|c: char| c == ',' || c.is_whitespace())
        .filter(|scope| !scope.is_empty())
        .map(str::to_string)
        .collect()
}
