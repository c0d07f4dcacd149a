//! Water Barons multiplayer match server.

use anyhow::Context;
use barons_core::Catalog;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod config;
mod protocol;
mod room;
mod server;

use config::ServerConfig;
use server::ServerState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServerConfig::from_env()?;

    info!("Starting Water Barons server...");

    // Loaded once; every match shares it
    let catalog = Catalog::load(&config.content_path, &config.metadata_path).with_context(|| {
        format!(
            "loading catalog from {} and {}",
            config.content_path.display(),
            config.metadata_path.display()
        )
    })?;
    info!(
        facilities = catalog.facilities.len(),
        distributions = catalog.distributions.len(),
        whims = catalog.whims.len(),
        upgrades = catalog.upgrades.len(),
        "catalog loaded"
    );

    let state = Arc::new(ServerState::new(
        Arc::new(catalog),
        config.pick_timeout,
        config.shuffle,
    ));

    server::run_server(config.addr, state).await
}
