//! Switchboard - real-time presence and notification gateway

use clap::Parser;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use switchboard::{
    config::Args,
    server::{self, AppState},
    store::{KeyValueStore, MemoryStore, RedisStore},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    // Parse command line arguments
    let args = Args::parse();

    // Initialize tracing/logging
    let log_level = args.log_level.clone();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("switchboard={},info", log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Validate configuration
    if let Err(e) = args.validate() {
        error!("Configuration error: {}", e);
        std::process::exit(1);
    }

    // Print startup banner
    info!("======================================");
    info!("  Switchboard - Real-time Gateway");
    info!("======================================");
    info!("Node ID: {}", args.node_id);
    info!("Listen: {}", args.listen);
    info!(
        "Mode: {}",
        if args.dev_mode { "DEVELOPMENT" } else { "PRODUCTION" }
    );
    info!("Cache: {}", args.cache_url);
    info!("Max connections: {}", args.max_connections);
    info!(
        "Credential TTLs: auth {}s, verification {}s",
        args.auth_ttl_seconds, args.verification_ttl_seconds
    );
    info!("======================================");

    // Connect to the cache (in-memory fallback in dev mode)
    let store: Arc<dyn KeyValueStore> = match RedisStore::connect(&args.cache_url).await {
        Ok(store) => {
            info!("Cache connected successfully");
            Arc::new(store)
        }
        Err(e) => {
            if args.dev_mode {
                warn!(
                    "Cache connection failed (dev mode, using in-memory store): {}",
                    e
                );
                Arc::new(MemoryStore::new())
            } else {
                error!("Cache connection failed: {}", e);
                std::process::exit(1);
            }
        }
    };

    let state = Arc::new(AppState::new(args, store));

    server::run(state).await?;

    Ok(())
}
