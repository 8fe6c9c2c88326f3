// Command implementations for the binary
// Each command prints its result to stdout; diagnostics go through tracing

use anyhow::{Context, Result};
use chrono::{Local, Utc};
use std::sync::Arc;

use crate::auth::{
    import_credentials, CredentialRecord, JsonFileStore, TokenLifecycleManager, TokenStatus,
};
use crate::config::{run_interactive_setup, Command, Config};
use crate::http_client::{build_client, PlatformClient};

/// Run one command against the configured credentials file
pub async fn run(command: Command, config: &Config) -> Result<()> {
    let path = config.credentials_file.clone();

    match &command {
        Command::Init => {
            run_interactive_setup(&path)?;
            return Ok(());
        }
        Command::Validate => {
            let record = JsonFileStore::new(&path).read_record()?;
            println!("{}", describe_validation(&record));
            let missing = record.missing_fields();
            if !missing.is_empty() {
                anyhow::bail!("Credentials file is incomplete");
            }
            return Ok(());
        }
        Command::Import { path: source } => {
            let record = import_credentials(source, &JsonFileStore::new(&path))?;
            println!(
                "✅ Loaded credentials from {} into {} ({})",
                source.display(),
                path.display(),
                record.identity()
            );
            return Ok(());
        }
        _ => {}
    }

    let client = build_client(config.http_connect_timeout, config.http_request_timeout)?;
    let manager = Arc::new(TokenLifecycleManager::from_path(path, client.clone()));

    match command {
        Command::Token => {
            let token = manager.get_access_token().await?;
            println!("{}", token);
        }
        Command::Refresh => {
            manager.force_refresh().await?;
            let record = manager.record().await?;
            println!("✔ New access token loaded");
            println!("{}", describe_status(&record, Utc::now().timestamp()));
        }
        Command::Check => {
            manager.get_access_token().await?;
            println!("✔ Token is valid and authorized");
        }
        Command::Status => {
            let record = manager.record().await?;
            println!("{}", describe_status(&record, Utc::now().timestamp()));
        }
        Command::Show => {
            let record = manager.record().await?;
            let view = serde_json::to_string_pretty(&record.redacted())
                .context("Failed to render credentials")?;
            println!("{}", view);
        }
        Command::Get { path, query } => {
            let platform = PlatformClient::new(client, manager, config.http_max_retries);
            let body = platform.get_json(&path, &query).await?;
            println!(
                "{}",
                serde_json::to_string_pretty(&body).context("Failed to render response")?
            );
        }
        Command::Init | Command::Validate | Command::Import { .. } => {}
    }

    Ok(())
}

/// One-line summary of a credentials file check
pub fn describe_validation(record: &CredentialRecord) -> String {
    let missing = record.missing_fields();
    if missing.is_empty() {
        "✅ Credentials file is valid".to_string()
    } else {
        format!("❌ Missing fields: {}", missing.join(", "))
    }
}

/// Human-readable expiry report
pub fn describe_status(record: &CredentialRecord, now: i64) -> String {
    let expires = record
        .expires_at_datetime()
        .map(|dt| dt.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_default();

    match record.token_status(now) {
        TokenStatus::Missing => "⚠️ No access token or expiration time stored".to_string(),
        TokenStatus::Expired => format!("❌ Token has expired (at {})", expires),
        TokenStatus::ExpiringSoon { remaining } => format!(
            "⚠️ Token is expiring soon! {} left until {}",
            format_remaining(remaining),
            expires
        ),
        TokenStatus::Valid { remaining } => format!(
            "✔ Token is valid until {} ({} remaining)",
            expires,
            format_remaining(remaining)
        ),
    }
}

fn format_remaining(remaining: chrono::Duration) -> String {
    let secs = remaining.num_seconds().max(0);
    format!("{}:{:02}:{:02}", secs / 3600, (secs % 3600) / 60, secs % 60)
}
