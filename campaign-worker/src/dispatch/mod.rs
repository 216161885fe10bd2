//! Campaign dispatch - the core send pipeline.
//!
//! One run per campaign: claim it (`Queued` → `Processing`), read and delete
//! the recipient file, send one message per recipient in file order, record
//! failures and write the terminal status.

pub mod cleaner;
pub mod recipients;
pub mod status;

use std::path::Path;
use std::sync::Arc;

use tracing::{error, info, warn};

use crate::config::Config;
use crate::provider::{MessagingProvider, OutboundMessage};
use crate::queue::DispatchJob;
use crate::store::{CampaignRepo, CampaignStatus, DbId, DbPool};

pub use cleaner::clean_error_message;
pub use recipients::{parse_recipients, read_recipient_file, Recipient, RecipientFileError};
pub use status::terminal_status;

/// Longest error message stored per failed recipient, in characters.
const MAX_ERROR_CHARS: usize = 255;

/// Everything a dispatch run needs.
#[derive(Clone)]
pub struct DispatchContext {
    pub pool: DbPool,
    pub provider: Arc<dyn MessagingProvider>,
    /// Whether the first row of a recipient file is a header
    pub recipients_have_header: bool,
}

impl DispatchContext {
    pub fn new(pool: DbPool, provider: Arc<dyn MessagingProvider>, config: &Config) -> Self {
        Self {
            pool,
            provider,
            recipients_have_header: config.recipients_have_header,
        }
    }
}

/// Result of a dispatch run that claimed its campaign.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchOutcome {
    pub campaign_id: DbId,
    pub status: CampaignStatus,
    pub success_count: i64,
    pub error_count: i64,
}

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("campaign {0} does not exist")]
    CampaignNotFound(DbId),

    /// Another run already claimed the campaign.
    #[error("campaign {id} is {status}, not Queued")]
    NotQueued { id: DbId, status: CampaignStatus },

    #[error("database error: {0}")]
    Store(#[from] sqlx::Error),
}

/// Run one campaign to completion.
///
/// Per-recipient send failures never fail the run. An unreadable recipient
/// file ends the campaign in `Internal error` with no sends and is reported
/// as an `Ok` outcome; `Err` means the campaign was not claimed or the
/// database failed.
pub async fn dispatch_campaign(
    ctx: &DispatchContext,
    job: &DispatchJob,
) -> Result<DispatchOutcome, DispatchError> {
    let campaign_id = job.campaign_id;

    if !CampaignRepo::mark_processing(&ctx.pool, campaign_id).await? {
        return Err(match CampaignRepo::find_by_id(&ctx.pool, campaign_id).await? {
            Some(campaign) => DispatchError::NotQueued {
                id: campaign_id,
                status: campaign.status,
            },
            None => {
                // Deleted before dispatch; nothing else will clean up its file
                remove_recipient_file(campaign_id, &job.recipient_file).await;
                DispatchError::CampaignNotFound(campaign_id)
            }
        });
    }

    info!(
        campaign_id = campaign_id,
        template_sid = %job.template_sid,
        schedule = ?job.schedule.mode(),
        "campaign_dispatch_start"
    );

    let result = run_claimed(ctx, job).await;

    if let Err(ref e) = result {
        error!(campaign_id = campaign_id, error = %e, "campaign_dispatch_store_error");
        // Best effort: the same store just failed
        if let Err(e) =
            CampaignRepo::set_status(&ctx.pool, campaign_id, CampaignStatus::InternalError).await
        {
            error!(campaign_id = campaign_id, error = %e, "campaign_internal_error_mark_failed");
        }
    }

    result
}

async fn run_claimed(
    ctx: &DispatchContext,
    job: &DispatchJob,
) -> Result<DispatchOutcome, DispatchError> {
    let campaign_id = job.campaign_id;

    let parsed = read_recipient_file(&job.recipient_file, ctx.recipients_have_header).await;
    remove_recipient_file(campaign_id, &job.recipient_file).await;

    let recipients = match parsed {
        Ok(recipients) => recipients,
        Err(e) => {
            error!(
                campaign_id = campaign_id,
                path = %job.recipient_file.display(),
                error = %e,
                "campaign_recipient_file_failed"
            );
            CampaignRepo::set_status(&ctx.pool, campaign_id, CampaignStatus::InternalError).await?;
            return Ok(DispatchOutcome {
                campaign_id,
                status: CampaignStatus::InternalError,
                success_count: 0,
                error_count: 0,
            });
        }
    };

    info!(
        campaign_id = campaign_id,
        recipients = recipients.len(),
        "campaign_recipients_loaded"
    );

    let send_at = job.schedule.send_at();
    let mut success_count: i64 = 0;
    let mut error_count: i64 = 0;

    for recipient in &recipients {
        let message = OutboundMessage {
            to: recipient.phone.clone(),
            content_sid: job.template_sid.clone(),
            name: recipient.name.clone(),
            send_at,
        };

        match ctx.provider.send(&message).await {
            Ok(message_sid) => {
                success_count += 1;
                info!(
                    campaign_id = campaign_id,
                    to = %recipient.phone,
                    message_sid = %message_sid,
                    "campaign_send_ok"
                );
            }
            Err(e) => {
                error_count += 1;
                let cleaned = truncate_chars(&clean_error_message(&e.to_string()), MAX_ERROR_CHARS);
                warn!(
                    campaign_id = campaign_id,
                    to = %recipient.phone,
                    provider_status = ?e.status(),
                    error = %cleaned,
                    "campaign_send_failed"
                );
                CampaignRepo::record_error(&ctx.pool, campaign_id, &recipient.phone, &cleaned)
                    .await?;
            }
        }
    }

    let status = terminal_status(job.schedule.mode(), success_count, error_count);
    CampaignRepo::complete(&ctx.pool, campaign_id, success_count, error_count, status).await?;

    info!(
        campaign_id = campaign_id,
        status = %status,
        success_count = success_count,
        error_count = error_count,
        "campaign_dispatch_complete"
    );

    Ok(DispatchOutcome {
        campaign_id,
        status,
        success_count,
        error_count,
    })
}

/// Delete the recipient file. A file that is already gone is not an error.
pub async fn remove_recipient_file(campaign_id: DbId, path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => {
            warn!(
                campaign_id = campaign_id,
                path = %path.display(),
                error = %e,
                "campaign_recipient_file_remove_failed"
            );
        }
    }
}

fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}
