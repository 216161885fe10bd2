//! Queue module for RabbitMQ operations.
//!
//! This module provides:
//! - The dispatch job message type
//! - An async publisher for enqueueing jobs
//! - The [`DispatchQueue`] seam the web server enqueues through
//!
//! ## Architecture
//!
//! ```text
//! Web Server → campaign_dispatch queue → Worker → messaging provider
//! ```

pub mod publisher;
pub mod types;

use anyhow::Result;
use async_trait::async_trait;

pub use publisher::Publisher;
pub use types::{DispatchJob, Schedule, ScheduleError, DISPATCH_QUEUE};

/// Somewhere dispatch jobs can be handed off to run in the background.
#[async_trait]
pub trait DispatchQueue: Send + Sync {
    /// Enqueue `job`. Returns once the broker has accepted it.
    async fn enqueue(&self, job: &DispatchJob) -> Result<()>;
}
