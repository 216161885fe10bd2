//! Terminal campaign status from the outcome of a dispatch run.

use crate::store::{CampaignStatus, ScheduleMode};

/// Status a campaign ends in after every recipient was attempted.
///
/// Immediate sends are `Sent` even when some failed, since the run itself
/// completed. A scheduled campaign with no accepted message at all is a
/// `Scheduling error`.
pub fn terminal_status(mode: ScheduleMode, success_count: i64, error_count: i64) -> CampaignStatus {
    match mode {
        ScheduleMode::Now if error_count == 0 => CampaignStatus::Sent,
        ScheduleMode::Now => CampaignStatus::SentWithErrors,
        ScheduleMode::Later if success_count == 0 => CampaignStatus::SchedulingError,
        ScheduleMode::Later if error_count == 0 => CampaignStatus::Scheduled,
        ScheduleMode::Later => CampaignStatus::ScheduledWithErrors,
    }
}
