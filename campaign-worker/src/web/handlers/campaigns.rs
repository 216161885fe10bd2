//! Campaign intake and queries.

use std::path::{Path as FsPath, PathBuf};

use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use tracing::{error, info, warn};

use super::SuccessResponse;
use crate::dispatch::{parse_recipients, remove_recipient_file};
use crate::queue::{DispatchJob, Schedule};
use crate::store::{Campaign, CampaignError, CampaignRepo, CampaignStatus, DbId, NewCampaign};
use crate::web::error::{AppError, AppResult};
use crate::web::extract::CurrentUser;
use crate::web::state::AppState;

/// Fields of the campaign upload form.
#[derive(Debug, Default)]
struct CampaignForm {
    template_id: Option<String>,
    template_name: Option<String>,
    schedule_type: Option<String>,
    scheduled_at: Option<String>,
    csv_file: Option<Vec<u8>>,
}

impl CampaignForm {
    async fn read(mut multipart: Multipart) -> AppResult<Self> {
        let mut form = CampaignForm::default();

        while let Some(field) = multipart.next_field().await.map_err(bad_upload)? {
            let Some(name) = field.name().map(str::to_string) else {
                continue;
            };
            match name.as_str() {
                "csvFile" => form.csv_file = Some(field.bytes().await.map_err(bad_upload)?.to_vec()),
                "templateId" => form.template_id = Some(field.text().await.map_err(bad_upload)?),
                "templateName" => form.template_name = Some(field.text().await.map_err(bad_upload)?),
                "scheduleType" => form.schedule_type = Some(field.text().await.map_err(bad_upload)?),
                "scheduledAt" => form.scheduled_at = Some(field.text().await.map_err(bad_upload)?),
                _ => continue,
            }
        }

        Ok(form)
    }
}

fn bad_upload(e: axum::extract::multipart::MultipartError) -> AppError {
    AppError::BadRequest(format!("Invalid upload: {e}"))
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// Path of the temporary recipient file for a campaign.
pub fn recipient_file_path(upload_dir: &FsPath, campaign_id: DbId) -> PathBuf {
    upload_dir.join(format!("campaign_{campaign_id}.csv"))
}

pub async fn list(
    State(state): State<AppState>,
    user: CurrentUser,
) -> AppResult<Json<Vec<Campaign>>> {
    let campaigns = CampaignRepo::list_for_user(&state.pool, user.id()).await?;
    Ok(Json(campaigns))
}

/// Accept an upload, store the campaign and its recipient file, and enqueue
/// dispatch. Responds before any message is sent.
pub async fn create(
    State(state): State<AppState>,
    user: CurrentUser,
    multipart: Multipart,
) -> AppResult<(StatusCode, Json<Campaign>)> {
    let form = CampaignForm::read(multipart).await?;

    let template_sid = non_empty(form.template_id)
        .ok_or_else(|| AppError::BadRequest("templateId is required".into()))?;
    let csv_file = form
        .csv_file
        .ok_or_else(|| AppError::BadRequest("csvFile is required".into()))?;
    let schedule_type = non_empty(form.schedule_type).unwrap_or_else(|| "now".to_string());
    let schedule = Schedule::from_form(&schedule_type, form.scheduled_at.as_deref())
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let recipients = parse_recipients(csv_file.as_slice(), state.config.recipients_have_header)
        .map_err(|e| AppError::BadRequest(e.to_string()))?;
    if recipients.is_empty() {
        return Err(AppError::BadRequest(
            "The recipient file has no valid rows (phone, name)".into(),
        ));
    }

    let template_body = fetch_template_body(&state, &template_sid).await;

    let input = NewCampaign {
        template_name: non_empty(form.template_name).unwrap_or_else(|| template_sid.clone()),
        template_body,
        recipient_count: recipients.len() as i64,
        scheduled_at: schedule.send_at().unwrap_or_else(Utc::now),
        user_id: user.id(),
    };
    let campaign = CampaignRepo::create(&state.pool, &input).await?;

    let path = recipient_file_path(&state.config.upload_dir, campaign.id);
    if let Err(e) = write_recipient_file(&path, &csv_file).await {
        error!(campaign_id = campaign.id, path = %path.display(), error = %e, "recipient_file_write_failed");
        CampaignRepo::set_status(&state.pool, campaign.id, CampaignStatus::InternalError).await?;
        return Err(AppError::Internal("Could not store the recipient file".into()));
    }

    let job = DispatchJob {
        campaign_id: campaign.id,
        recipient_file: path.clone(),
        template_sid,
        schedule,
    };

    if let Err(e) = state.queue.enqueue(&job).await {
        error!(campaign_id = campaign.id, error = %e, "campaign_enqueue_failed");
        CampaignRepo::set_status(&state.pool, campaign.id, CampaignStatus::InternalError).await?;
        if let Err(e) = tokio::fs::remove_file(&path).await {
            warn!(campaign_id = campaign.id, error = %e, "recipient_file_remove_failed");
        }
        return Err(AppError::Internal("Could not queue the campaign for sending".into()));
    }

    info!(
        campaign_id = campaign.id,
        uid = user.id(),
        recipients = campaign.recipient_count,
        schedule = ?job.schedule.mode(),
        "campaign_accepted"
    );

    Ok((StatusCode::ACCEPTED, Json(campaign)))
}

/// Body of the chosen template, for display. Failure only loses the snapshot.
async fn fetch_template_body(state: &AppState, template_sid: &str) -> Option<String> {
    let twilio = state.twilio.as_ref()?;
    match twilio.fetch_template(template_sid).await {
        Ok(template) => Some(template.body),
        Err(e) => {
            warn!(template_sid = %template_sid, error = %e, "template_body_fetch_failed");
            None
        }
    }
}

async fn write_recipient_file(path: &FsPath, contents: &[u8]) -> std::io::Result<()> {
    if let Some(dir) = path.parent() {
        tokio::fs::create_dir_all(dir).await?;
    }
    tokio::fs::write(path, contents).await
}

pub async fn errors(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<DbId>,
) -> AppResult<Json<Vec<CampaignError>>> {
    CampaignRepo::find_owned(&state.pool, id, user.id())
        .await?
        .ok_or_else(|| AppError::NotFound("Campaign not found".into()))?;

    Ok(Json(CampaignRepo::list_errors(&state.pool, id).await?))
}

pub async fn delete(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<DbId>,
) -> AppResult<Json<SuccessResponse>> {
    if !CampaignRepo::delete_owned(&state.pool, id, user.id()).await? {
        return Err(AppError::NotFound("Campaign not found".into()));
    }
    // Present only while the campaign is still queued
    remove_recipient_file(id, &recipient_file_path(&state.config.upload_dir, id)).await;

    info!(campaign_id = id, uid = user.id(), "campaign_deleted");
    Ok(SuccessResponse::ok())
}
