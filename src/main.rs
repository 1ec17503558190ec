//! Dispatch Worker - Backend service for delivery orders and route scheduling
//!
//! This worker connects to NATS and handles messages from the admin and driver panels.

mod cli;
mod config;
mod db;
mod defaults;
mod handlers;
mod services;
mod types;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info, warn};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::cli::{Cli, Command};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration (also reads .env, so LOGS_DIR and RUST_LOG may come from there)
    let config = config::Config::from_env()?;

    if let Err(e) = std::fs::create_dir_all(&config.logs_dir) {
        eprintln!("Cannot create logs directory {}: {}", config.logs_dir, e);
    }

    // File appender for persistent logs (daily rotation)
    let file_appender = RollingFileAppender::new(Rotation::DAILY, &config.logs_dir, "worker.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    // Initialize logging - both stdout and file
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,dispatch_worker=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer()) // stdout
        .with(tracing_subscriber::fmt::layer().with_writer(non_blocking).with_ansi(false)) // file
        .init();

    info!("Starting Dispatch Worker...");
    info!("Configuration loaded (providers: {:?})", config.providers.backend);

    // Connect to database
    let pool = db::create_pool(&config.database_url).await?;
    info!("Connected to PostgreSQL");

    // Run migrations
    db::run_migrations(&pool).await?;
    info!("Database migrations complete");

    if let Some(Command::Migrate) = cli.command {
        return Ok(());
    }

    if config.blob.is_none() {
        warn!("BLOB_READ_WRITE_TOKEN not set, deleted orders keep their photos in storage");
    }

    // Connect to NATS (supports optional NATS_USER/NATS_PASSWORD auth).
    let nats_client = match &config.nats_credentials {
        Some((user, password)) => async_nats::ConnectOptions::new()
            .user_and_password(user.clone(), password.clone())
            .connect(&config.nats_url)
            .await
            .with_context(|| format!("Failed to connect to NATS at {}", config.nats_url))?,
        None => async_nats::connect(&config.nats_url)
            .await
            .with_context(|| format!("Failed to connect to NATS at {}", config.nats_url))?,
    };
    info!("Connected to NATS at {}", config.nats_url);

    // Start message handlers
    let handler_result = handlers::start_handlers(nats_client, pool, &config).await;

    if let Err(e) = handler_result {
        error!("Handler error: {}", e);
        return Err(e);
    }

    Ok(())
}
