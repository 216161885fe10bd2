//! Outbound messaging provider.
//!
//! The dispatcher only sees [`MessagingProvider`]: send one templated message,
//! get back success or an error description. [`TwilioClient`] is the
//! production implementation and also carries the content (template) and
//! message-history calls used by the web server.

pub mod content;
pub mod twilio;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

pub use content::{CreatedTemplate, NewTemplate, Template, TemplateKind};
pub use twilio::{MessageRecord, TwilioClient};

/// One templated message to one recipient.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundMessage {
    /// Destination phone number as uploaded
    pub to: String,
    /// Provider template identifier
    pub content_sid: String,
    /// Value injected as template variable `1`
    pub name: String,
    /// Provider-side delivery time for scheduled campaigns
    pub send_at: Option<DateTime<Utc>>,
}

/// Errors returned by provider calls.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// The provider answered with a non-success status.
    ///
    /// Rendered like the provider's own SDK errors; the dispatcher cleans
    /// this down to `message` before persisting it.
    #[error("{}", render_api_error(.status, .message, .more_info))]
    Api {
        status: u16,
        code: Option<i64>,
        message: String,
        more_info: Option<String>,
    },

    /// The request never produced a response (DNS, TLS, timeout, ...).
    #[error("request to messaging provider failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The response body did not have the expected shape.
    #[error("unexpected provider response: {0}")]
    Decode(String),
}

impl ProviderError {
    /// HTTP status reported by the provider, if it answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            ProviderError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Short human-readable cause.
    pub fn message(&self) -> String {
        match self {
            ProviderError::Api { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }
}

fn render_api_error(status: &u16, message: &str, more_info: &Option<String>) -> String {
    let mut rendered = format!(
        "HTTP {status} error: Unable to complete request: \
         Twilio returned the following information: {message}"
    );
    if let Some(url) = more_info {
        rendered.push_str("\nMore information may be available here: ");
        rendered.push_str(url);
    }
    rendered
}

/// Capability to send one templated message.
#[async_trait]
pub trait MessagingProvider: Send + Sync {
    /// Send `message`, returning the provider's message identifier.
    async fn send(&self, message: &OutboundMessage) -> Result<String, ProviderError>;
}
