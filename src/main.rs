mod config;
mod filter;
mod line;
mod relay;
mod server;
mod webhook;

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;
use crate::line::LineClient;
use crate::relay::Relay;
use crate::server::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env is fine; deployments usually set real variables.
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,line_relay=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env().context("Failed to load configuration")?;

    info!("Configuration loaded successfully");
    info!("  Source group: {}", config.relay.source_group_id);
    info!("  Target group: {}", config.relay.target_group_id);
    info!("  Start keyword: {}", config.relay.filter.start_keyword);
    info!(
        "  Required substrings: {:?}",
        config.relay.filter.required_substrings
    );
    info!("  LINE API: {}", config.line.api_base_url);

    let api = Arc::new(LineClient::new(config.line.clone()));
    let relay = Relay::new(config.relay.clone(), api);
    let state = Arc::new(AppState::new(relay, config.line.channel_secret.clone()));

    info!("Relay is starting...");
    server::serve(config.server.bind_addr(), state).await?;

    Ok(())
}
