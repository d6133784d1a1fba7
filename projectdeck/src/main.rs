// ProjectDeck - collaborative project and task tracking
// Entry point: logging, configuration and database bootstrap

use anyhow::Context;
use projectdeck::app::AppState;
use projectdeck::config::AppConfig;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const CONFIG_ENV: &str = "PROJECTDECK_CONFIG";

fn config_path() -> PathBuf {
    std::env::var_os(CONFIG_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("projectdeck.json"))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let path = config_path();
    let config = AppConfig::load(&path)
        .await
        .with_context(|| format!("failed to load configuration from {}", path.display()))?;

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.log_filter.as_str().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting ProjectDeck");

    let state = AppState::initialize(&config)
        .await
        .context("failed to initialize application")?;

    let profiles = state.profiles.list_profiles().await?;
    let tags = state.tags.list_tags(None).await?;

    tracing::info!(
        "ProjectDeck ready: database {:?}, {} profiles, {} global tags",
        config.database_path,
        profiles.len(),
        tags.len()
    );

    Ok(())
}
