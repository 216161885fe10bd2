//! Campaigns - WhatsApp campaign sending over Twilio.
//!
//! This library provides shared modules for the three binaries:
//! - `campaigns-web`: HTTP API for users, templates, campaigns and reports
//! - `campaigns-worker`: Dispatcher that sends each queued campaign
//! - `campaigns-admin`: Database setup and user management CLI
//!
//! ## Architecture
//!
//! ```text
//! Upload → Web Server → campaign_dispatch → Worker → Twilio
//!              ↓                               ↓
//!              └────────── SQLite ─────────────┘
//! ```

pub mod config;
pub mod dispatch;
pub mod provider;
pub mod queue;
pub mod report;
pub mod store;
pub mod web;

// Re-export commonly used types
pub use config::Config;
pub use dispatch::{dispatch_campaign, DispatchContext, DispatchError, DispatchOutcome};
pub use provider::{MessagingProvider, OutboundMessage, ProviderError, TwilioClient};
pub use queue::{DispatchJob, DispatchQueue, Publisher, Schedule, DISPATCH_QUEUE};
pub use store::{Campaign, CampaignStatus, DbPool};
pub use web::AppState;
