//! Sealbox Server
//!
//! The authoritative remote store. Holds only field ciphertext and account
//! password hashes; it never sees field keys or plaintext.

mod auth;
mod config;
mod error;
mod handlers;
mod server;
mod state;

use clap::Parser;
use sealbox_core::RemoteStore;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "sealbox-server", about = "Sealbox remote store and sync server")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "sealbox-server.toml")]
    config: PathBuf,

    /// Listen address override
    #[arg(short, long)]
    listen: Option<String>,

    /// Database path override
    #[arg(short, long)]
    database: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    let cli = Cli::parse();

    let mut cfg = if cli.config.exists() {
        config::ServerConfig::load(&cli.config)?
    } else {
        tracing::info!("No config file found, using defaults");
        config::ServerConfig::default()
    };

    if let Some(listen) = cli.listen {
        cfg.listen_addr = listen;
    }
    if let Some(database) = cli.database {
        cfg.storage_path = database;
    }

    tracing::info!("Starting sealbox server on {}", cfg.listen_addr);

    let store = RemoteStore::open(&cfg.storage_path, cfg.store_timeout())?;
    let state = state::AppState {
        store,
        tokens: auth::TokenIssuer::new(cfg.token_secret_bytes()?, cfg.token_ttl()),
        store_timeout: cfg.store_timeout(),
        kdf: cfg.kdf.clone(),
    };
    let app = server::build_router(state, &cfg);

    let listener = tokio::net::TcpListener::bind(&cfg.listen_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}
