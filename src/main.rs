use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, warn};

use agora::activity::FileActivitySink;
use agora::admin;
use agora::config::Config;
use agora::credentials::CredentialStore;
use agora::server;
use agora::service::ChatService;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file
    if let Err(e) = dotenvy::dotenv() {
        // It's not fatal if .env doesn't exist, but good to know
        info!("No .env file found or failed to load: {}", e);
    }

    // Initialize logging with default filter if RUST_LOG is not set
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();

    info!("Agora chat broker starting...");

    let config = Config::from_env();

    // The process must not serve traffic without a loaded credential set.
    info!("Loading credentials from {}", config.users_file);
    let credentials = CredentialStore::load_path(&config.users_file)
        .with_context(|| format!("Failed to load credentials from {}", config.users_file))?;
    if credentials.is_empty() {
        warn!(
            "Credential file {} is empty, every login will be rejected",
            config.users_file
        );
    } else {
        info!("Loaded {} users", credentials.len());
    }

    let activity = Arc::new(FileActivitySink::new(&config.activity_log));
    let service = Arc::new(ChatService::new(credentials, activity));

    let app = server::router(service.clone());

    let listener = tokio::net::TcpListener::bind(config.bind_addr())
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_addr()))?;
    info!("Listening on {}", config.bind_addr());

    // Operator console in the background; returning means "quit".
    let admin_handle = tokio::spawn(admin::run(service.clone()));

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down...");
        }
        _ = admin_handle => {
            info!("Admin console requested shutdown");
        }
        res = axum::serve(listener, app) => {
            if let Err(e) = res {
                info!("Server stopped with error: {}", e);
            }
        }
    }

    Ok(())
}
