//! RabbitMQ consumer module using lapin.
//!
//! This module handles connecting to RabbitMQ, consuming dispatch jobs from
//! the campaign_dispatch queue, and spawning one async task per campaign.
//! In-flight campaigns run to completion before the connection closes.

use std::sync::Arc;

use anyhow::{Context, Result};
use futures::StreamExt;
use lapin::{
    options::{
        BasicAckOptions, BasicCancelOptions, BasicConsumeOptions, BasicNackOptions,
        BasicQosOptions, QueueDeclareOptions,
    },
    types::FieldTable,
    Channel, Connection, ConnectionProperties,
};
use tokio::signal;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use campaigns::dispatch::{dispatch_campaign, DispatchContext, DispatchError};
use campaigns::{Config, DispatchJob, DISPATCH_QUEUE};

/// Run the RabbitMQ consumer.
///
/// This function:
/// 1. Connects to RabbitMQ using the configured URL
/// 2. Limits unacknowledged deliveries to `worker_concurrency`
/// 3. Declares the queue (idempotent operation)
/// 4. Starts consuming messages, spawning a dispatch task for each
/// 5. Handles graceful shutdown on SIGINT/SIGTERM, waiting for running
///    campaigns so none is left in `Processing`
pub async fn run(config: &Config, ctx: DispatchContext) -> Result<()> {
    let ctx = Arc::new(ctx);

    info!(url_length = config.amqp_url.len(), "rabbitmq_connecting");

    let conn = Connection::connect(&config.amqp_url, ConnectionProperties::default())
        .await
        .context("Failed to connect to RabbitMQ")?;

    info!("rabbitmq_connected");

    let channel = conn.create_channel().await.context("Failed to create channel")?;

    info!("rabbitmq_channel_created");

    let prefetch_count = u16::try_from(config.worker_concurrency).unwrap_or(u16::MAX);
    channel
        .basic_qos(prefetch_count, BasicQosOptions::default())
        .await
        .context("Failed to set QoS")?;

    info!(prefetch_count = prefetch_count, "rabbitmq_qos_set");

    channel
        .queue_declare(
            DISPATCH_QUEUE,
            QueueDeclareOptions {
                durable: true,
                ..Default::default()
            },
            FieldTable::default(),
        )
        .await
        .context("Failed to declare queue")?;

    info!(queue = DISPATCH_QUEUE, "rabbitmq_queue_declared");

    let mut consumer = channel
        .basic_consume(
            DISPATCH_QUEUE,
            CONSUMER_TAG,
            BasicConsumeOptions::default(),
            FieldTable::default(),
        )
        .await
        .context("Failed to start consumer")?;

    info!(queue = DISPATCH_QUEUE, "rabbitmq_consumer_started");
    info!("worker_ready");

    let channel = Arc::new(channel);
    let mut tasks = JoinSet::new();

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("worker_stopping");
                break;
            }
            Some(finished) = tasks.join_next(), if !tasks.is_empty() => {
                log_task_result(finished);
            }
            delivery = consumer.next() => {
                match delivery {
                    Some(Ok(delivery)) => {
                        let delivery_tag = delivery.delivery_tag;
                        let message_id = delivery
                            .properties
                            .message_id()
                            .as_ref()
                            .map(|s| s.to_string())
                            .unwrap_or_else(|| "unknown".to_string());

                        info!(
                            queue = DISPATCH_QUEUE,
                            message_id = %message_id,
                            delivery_tag = delivery_tag,
                            "rabbitmq_job_received"
                        );

                        let ctx = Arc::clone(&ctx);
                        let channel = Arc::clone(&channel);

                        tasks.spawn(async move {
                            match serde_json::from_slice::<DispatchJob>(&delivery.data) {
                                Ok(job) => {
                                    run_job(&ctx, &job).await;
                                    ack(&channel, delivery_tag, &message_id).await;
                                }
                                Err(e) => {
                                    error!(
                                        message_id = %message_id,
                                        error = %e,
                                        "rabbitmq_job_parse_failed"
                                    );
                                    reject(&channel, delivery_tag).await;
                                }
                            }
                        });
                    }
                    Some(Err(e)) => {
                        error!(error = %e, "rabbitmq_delivery_error");
                    }
                    None => {
                        warn!("rabbitmq_consumer_closed");
                        break;
                    }
                }
            }
        }
    }

    if let Err(e) = channel
        .basic_cancel(CONSUMER_TAG, BasicCancelOptions::default())
        .await
    {
        warn!(error = %e, "rabbitmq_consumer_cancel_error");
    }

    drain(&mut tasks).await;

    if let Err(e) = conn.close(200, "Normal shutdown").await {
        warn!(error = %e, "rabbitmq_connection_close_error");
    }

    info!("worker_shutdown_complete");
    Ok(())
}

const CONSUMER_TAG: &str = "campaigns-worker";

/// Wait for every spawned dispatch task. Acks still go out on the open channel.
async fn drain(tasks: &mut JoinSet<()>) {
    if !tasks.is_empty() {
        info!(in_flight = tasks.len(), "worker_draining");
    }
    while let Some(finished) = tasks.join_next().await {
        log_task_result(finished);
    }
}

fn log_task_result(finished: Result<(), tokio::task::JoinError>) {
    if let Err(e) = finished {
        error!(error = %e, "worker_task_failed");
    }
}

/// Dispatch one campaign. Every outcome is final; nothing is retried.
async fn run_job(ctx: &DispatchContext, job: &DispatchJob) {
    match dispatch_campaign(ctx, job).await {
        Ok(outcome) => {
            info!(
                campaign_id = outcome.campaign_id,
                status = %outcome.status,
                "worker_job_finished"
            );
        }
        Err(e @ (DispatchError::NotQueued { .. } | DispatchError::CampaignNotFound(_))) => {
            warn!(campaign_id = job.campaign_id, reason = %e, "worker_job_skipped");
        }
        Err(e) => {
            error!(campaign_id = job.campaign_id, error = %e, "worker_job_failed");
        }
    }
}

async fn ack(channel: &Channel, delivery_tag: u64, message_id: &str) {
    if let Err(e) = channel
        .basic_ack(delivery_tag, BasicAckOptions::default())
        .await
    {
        error!(delivery_tag = delivery_tag, error = %e, "rabbitmq_ack_failed");
    } else {
        info!(queue = DISPATCH_QUEUE, message_id = %message_id, "rabbitmq_job_completed");
    }
}

/// Drop a message that can never be processed.
async fn reject(channel: &Channel, delivery_tag: u64) {
    if let Err(e) = channel
        .basic_nack(
            delivery_tag,
            BasicNackOptions {
                requeue: false,
                ..Default::default()
            },
        )
        .await
    {
        error!(delivery_tag = delivery_tag, error = %e, "rabbitmq_nack_failed");
    }
}

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
}
