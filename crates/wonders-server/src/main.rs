//! Wonders multiplayer game server.

use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use wonders_core::{RuleRepository, StaticRepository};

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

    info!("Starting Wonders server...");

    let repo: Arc<dyn RuleRepository> = Arc::new(StaticRepository::base()?);
    let addr = config.addr;
    let state = Arc::new(ServerState::new(config, repo));

    server::run_server(addr, state).await
}
