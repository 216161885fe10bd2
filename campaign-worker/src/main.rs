//! Campaigns Worker - RabbitMQ consumer that dispatches WhatsApp campaigns.
//!
//! Each job on the campaign_dispatch queue is one campaign: the worker reads
//! its recipient file, sends one templated message per recipient through
//! Twilio and records the outcome.

mod consumer;

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use campaigns::dispatch::DispatchContext;
use campaigns::provider::TwilioClient;
use campaigns::{store, Config};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize structured JSON logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().json().flatten_event(true))
        .init();

    tracing::info!("worker_starting");

    let config = Config::from_env();
    tracing::info!(
        amqp_url_set = !config.amqp_url.is_empty(),
        provider_configured = config.provider_configured(),
        messaging_service_set = config.twilio_messaging_service_sid.is_some(),
        recipients_have_header = config.recipients_have_header,
        concurrency = config.worker_concurrency,
        "config_loaded"
    );

    let pool = store::connect(&config.database_url)
        .await
        .context("Failed to open database")?;
    store::migrate(&pool).await.context("Failed to migrate database")?;

    let twilio = TwilioClient::from_config(&config)
        .context("Failed to create HTTP client")?
        .context("TWILIO_ACCOUNT_SID and TWILIO_AUTH_TOKEN are required by the worker")?;

    let ctx = DispatchContext::new(pool.clone(), Arc::new(twilio), &config);

    consumer::run(&config, ctx).await?;

    pool.close().await;
    Ok(())
}
