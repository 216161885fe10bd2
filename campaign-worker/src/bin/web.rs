//! Campaigns Web Server - HTTP API for the campaign sender.
//!
//! This binary serves sessions, user management, templates, campaign intake
//! and reports. Accepted campaigns are published to RabbitMQ and sent by the
//! worker.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::{net::TcpListener, signal};
use tracing::{info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use campaigns::web::{router, SessionSigner};
use campaigns::{store, AppState, Config, Publisher, TwilioClient};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize structured JSON logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().json().flatten_event(true))
        .init();

    info!("web_server_starting");

    let config = Config::from_env();
    info!(
        port = config.port,
        provider_configured = config.provider_configured(),
        upload_dir = %config.upload_dir.display(),
        max_upload_bytes = config.max_upload_bytes,
        recipients_have_header = config.recipients_have_header,
        "config_loaded"
    );

    let pool = store::connect(&config.database_url)
        .await
        .context("Failed to open database")?;
    store::migrate(&pool).await.context("Failed to migrate database")?;

    tokio::fs::create_dir_all(&config.upload_dir)
        .await
        .with_context(|| format!("Failed to create {}", config.upload_dir.display()))?;

    let twilio = TwilioClient::from_config(&config).context("Failed to create HTTP client")?;
    if twilio.is_none() {
        warn!("provider_disabled_sample_templates_only");
    }

    let sessions = SessionSigner::new(
        &config.session_secret,
        config.session_max_age_secs,
        config.cookie_secure,
    )
    .context("Invalid session configuration")?;

    let publisher = Publisher::new(config.amqp_url.clone());
    info!("rabbitmq_publisher_created");

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let state = AppState::new(config, pool.clone(), Arc::new(publisher.clone()), twilio, sessions);
    let app = router(state);

    let listener = TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    info!(address = %addr, "web_server_listening");

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    publisher.close().await;
    pool.close().await;

    info!("web_server_shutdown_complete");

    Ok(())
}

/// Create a future that completes when a shutdown signal is received.
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT"),
        _ = terminate => info!("Received SIGTERM"),
    }

    info!("web_server_shutting_down");
}
