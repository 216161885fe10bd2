//! Message format of the `campaign_dispatch` queue.

use std::path::PathBuf;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::store::{DbId, ScheduleMode};

/// Queue name for campaign dispatch jobs.
pub const DISPATCH_QUEUE: &str = "campaign_dispatch";

/// When the provider should deliver a campaign's messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum Schedule {
    Now,
    Later { send_at: DateTime<Utc> },
}

/// Intake form values that do not describe a valid schedule.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScheduleError {
    #[error("scheduleType must be 'now' or 'later', got '{0}'")]
    UnknownType(String),

    #[error("scheduledAt is required when scheduleType is 'later'")]
    MissingTime,

    #[error("scheduledAt is not a valid date-time: '{0}'")]
    InvalidTime(String),
}

impl Schedule {
    /// Build a schedule from the intake form's `scheduleType` and `scheduledAt`.
    ///
    /// `scheduledAt` accepts RFC 3339 (`2026-11-02T15:30:00Z`, offsets allowed)
    /// or a bare `YYYY-MM-DDTHH:MM[:SS]`, read as UTC.
    pub fn from_form(schedule_type: &str, scheduled_at: Option<&str>) -> Result<Self, ScheduleError> {
        match schedule_type.trim() {
            "now" => Ok(Schedule::Now),
            "later" => {
                let raw = scheduled_at
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .ok_or(ScheduleError::MissingTime)?;
                parse_send_at(raw)
                    .map(|send_at| Schedule::Later { send_at })
                    .ok_or_else(|| ScheduleError::InvalidTime(raw.to_string()))
            }
            other => Err(ScheduleError::UnknownType(other.to_string())),
        }
    }

    pub fn mode(&self) -> ScheduleMode {
        match self {
            Schedule::Now => ScheduleMode::Now,
            Schedule::Later { .. } => ScheduleMode::Later,
        }
    }

    /// Provider-side delivery time, for scheduled campaigns.
    pub fn send_at(&self) -> Option<DateTime<Utc>> {
        match self {
            Schedule::Now => None,
            Schedule::Later { send_at } => Some(*send_at),
        }
    }
}

fn parse_send_at(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }

    ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
}

/// One campaign to dispatch.
///
/// Published by the web server after the campaign row and its recipient
/// file exist; consumed once by a worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchJob {
    pub campaign_id: DbId,
    /// Temporary recipient file, deleted by the dispatcher after reading
    pub recipient_file: PathBuf,
    /// Provider template identifier
    pub template_sid: String,
    pub schedule: Schedule,
}

impl DispatchJob {
    /// Message id used for broker-side tracing.
    pub fn message_id(&self) -> String {
        format!("campaign-{}", self.campaign_id)
    }
}
