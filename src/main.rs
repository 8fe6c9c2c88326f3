use anyhow::Result;

use aep_token_kit::{commands, config};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (for log level)
    let (config, command) = config::Config::load()?;
    config.validate()?;

    // Initialize logging with a configured level; stdout is reserved for command output
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .init();

    tracing::debug!(
        credentials = %config.credentials_file.display(),
        "Running {:?}",
        command
    );

    if let Err(e) = commands::run(command, &config).await {
        tracing::error!("❌ {:#}", e);
        return Err(e);
    }

    Ok(())
}
