//! Reward engine server binary

use anyhow::Result;
use reward_engine::{Config, RewardService};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    tracing::info!("Starting CoinVault Reward Engine");

    // Load configuration
    let config = Config::from_env()?;

    // Open the service
    let _service = RewardService::open(config)?;
    tracing::info!("Reward service opened successfully");

    // TODO: mount the HTTP frontend once the API surface is frozen
    tokio::signal::ctrl_c().await?;

    tracing::info!("Shutting down reward engine");
    Ok(())
}
