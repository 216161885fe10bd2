//! Row types for users, campaigns and per-recipient send errors.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Primary key type for every table.
pub type DbId = i64;

/// Raised when a stored status or role string is not recognised.
#[derive(Debug, thiserror::Error)]
#[error("unknown {kind}: {value}")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

// =============================================================================
// Campaign status
// =============================================================================

/// Lifecycle status of a campaign.
///
/// `Queued` at intake, `Processing` while the dispatcher runs, then one of the
/// terminal variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CampaignStatus {
    #[serde(rename = "Queued")]
    Queued,
    #[serde(rename = "Processing")]
    Processing,
    #[serde(rename = "Sent")]
    Sent,
    #[serde(rename = "Sent with errors")]
    SentWithErrors,
    #[serde(rename = "Scheduled")]
    Scheduled,
    #[serde(rename = "Scheduled with errors")]
    ScheduledWithErrors,
    #[serde(rename = "Scheduling error")]
    SchedulingError,
    #[serde(rename = "Internal error")]
    InternalError,
}

impl CampaignStatus {
    const ALL: [CampaignStatus; 8] = [
        CampaignStatus::Queued,
        CampaignStatus::Processing,
        CampaignStatus::Sent,
        CampaignStatus::SentWithErrors,
        CampaignStatus::Scheduled,
        CampaignStatus::ScheduledWithErrors,
        CampaignStatus::SchedulingError,
        CampaignStatus::InternalError,
    ];

    /// Display string, also the value stored in `campaigns.status`.
    pub fn as_str(&self) -> &'static str {
        match self {
            CampaignStatus::Queued => "Queued",
            CampaignStatus::Processing => "Processing",
            CampaignStatus::Sent => "Sent",
            CampaignStatus::SentWithErrors => "Sent with errors",
            CampaignStatus::Scheduled => "Scheduled",
            CampaignStatus::ScheduledWithErrors => "Scheduled with errors",
            CampaignStatus::SchedulingError => "Scheduling error",
            CampaignStatus::InternalError => "Internal error",
        }
    }

    /// Whether the dispatcher will never touch the campaign again.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, CampaignStatus::Queued | CampaignStatus::Processing)
    }
}

impl fmt::Display for CampaignStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CampaignStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| UnknownVariant {
                kind: "campaign status",
                value: s.to_string(),
            })
    }
}

impl TryFrom<String> for CampaignStatus {
    type Error = UnknownVariant;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// How the provider should deliver a campaign.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleMode {
    /// Sent as soon as the dispatcher runs.
    Now,
    /// Handed to the provider for delivery at a fixed future time.
    Later,
}

// =============================================================================
// Campaigns
// =============================================================================

/// A row from the `campaigns` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Campaign {
    pub id: DbId,
    #[serde(rename = "templateName")]
    pub template_name: String,
    #[serde(rename = "templateBody")]
    pub template_body: Option<String>,
    #[sqlx(try_from = "String")]
    pub status: CampaignStatus,
    #[serde(rename = "recipients")]
    pub recipient_count: i64,
    pub success_count: i64,
    pub error_count: i64,
    #[serde(rename = "scheduledAt")]
    pub scheduled_at: DateTime<Utc>,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing)]
    pub user_id: DbId,
}

/// Input for creating a campaign at intake.
#[derive(Debug, Clone)]
pub struct NewCampaign {
    pub template_name: String,
    pub template_body: Option<String>,
    pub recipient_count: i64,
    pub scheduled_at: DateTime<Utc>,
    pub user_id: DbId,
}

/// A row from the `campaign_errors` table. Serialized as `{phone, error}`.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct CampaignError {
    #[serde(skip_serializing)]
    pub id: DbId,
    #[serde(skip_serializing)]
    pub campaign_id: DbId,
    #[serde(rename = "phone")]
    pub recipient_phone: String,
    #[serde(rename = "error")]
    pub error_message: String,
}

// =============================================================================
// Users
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Standard,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Standard => "standard",
        }
    }
}

impl FromStr for Role {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Role::Admin),
            "standard" => Ok(Role::Standard),
            other => Err(UnknownVariant {
                kind: "role",
                value: other.to_string(),
            }),
        }
    }
}

impl TryFrom<String> for Role {
    type Error = UnknownVariant;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// A row from the `users` table.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: DbId,
    pub email: String,
    pub password_hash: String,
    #[sqlx(try_from = "String")]
    pub role: Role,
}

/// Public view of a user, as returned by the API and stored in sessions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserView {
    pub uid: DbId,
    pub email: String,
    pub role: Role,
}

impl From<&User> for UserView {
    fn from(user: &User) -> Self {
        Self {
            uid: user.id,
            email: user.email.clone(),
            role: user.role,
        }
    }
}

/// Input for creating a user. `password_hash` is already an Argon2id PHC string.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub password_hash: String,
    pub role: Role,
}

/// Partial update of a user; `None` fields are left untouched.
#[derive(Debug, Clone, Default)]
pub struct UserChanges {
    pub email: Option<String>,
    pub role: Option<Role>,
    pub password_hash: Option<String>,
}
