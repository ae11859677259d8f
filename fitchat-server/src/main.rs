//! FitChat messaging server -- real-time direct messages with history.
//!
//! An axum server exposing the live chat WebSocket at `/ws` and the message
//! history REST facade under `/messages`, both over one SQLite-backed store.
//!
//! # Usage
//!
//! ```bash
//! # Run on default address 0.0.0.0:3001
//! cargo run --bin fitchat-server
//!
//! # Run on custom address with a specific database
//! cargo run --bin fitchat-server -- --bind 127.0.0.1:8080 --database chat.db
//!
//! # Or via environment variables
//! FITCHAT_ADDR=127.0.0.1:8080 FITCHAT_DB=chat.db cargo run --bin fitchat-server
//! ```

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use fitchat_server::config::{ChatCliArgs, ChatConfig};
use fitchat_server::directory::UserDirectory;
use fitchat_server::server::{self, ChatState};
use fitchat_server::store::MessageStore;

#[tokio::main]
async fn main() {
    let cli = ChatCliArgs::parse();

    // Load config from CLI args + config file + env vars + defaults.
    let config = match ChatConfig::load(&cli) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error loading configuration: {e}");
            std::process::exit(1);
        }
    };

    // Initialize tracing with the resolved log level.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    tracing::info!(
        addr = %config.bind_addr,
        database = %config.database.display(),
        "starting fitchat messaging server"
    );

    let timeout = Duration::from_millis(config.store_timeout_ms);
    let store = match MessageStore::open(&config.database, timeout).await {
        Ok(s) => s,
        Err(e) => {
            tracing::error!(error = %e, "failed to open message store");
            std::process::exit(1);
        }
    };
    let directory = UserDirectory::new(store.pool().clone(), timeout);
    if let Err(e) = directory.init().await {
        tracing::error!(error = %e, "failed to initialize user directory");
        std::process::exit(1);
    }

    let state = Arc::new(ChatState::with_send_queue_capacity(
        store,
        directory,
        config.send_queue_capacity,
    ));

    match server::start_server_with_state(&config.bind_addr, Arc::clone(&state)).await {
        Ok((bound_addr, handle)) => {
            tracing::info!(addr = %bound_addr, "chat server listening");
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("shutdown signal received");
                    state.shutdown().await;
                }
                result = handle => {
                    if let Err(e) = result {
                        tracing::error!(error = %e, "chat server task failed");
                    }
                }
            }
        }
        Err(e) => {
            tracing::error!(error = %e, "failed to start chat server");
            std::process::exit(1);
        }
    }
}
