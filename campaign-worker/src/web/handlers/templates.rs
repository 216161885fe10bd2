//! Template listing and creation, passed through to the provider.

use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::provider::{NewTemplate, ProviderError, Template, TemplateKind, TwilioClient};
use crate::web::error::{AppError, AppResult};
use crate::web::extract::{AdminUser, CurrentUser};
use crate::web::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateTemplateRequest {
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub template_type: Option<String>,
    pub body: Option<String>,
    #[serde(rename = "mediaUrl")]
    pub media_url: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CreateTemplateResponse {
    pub success: bool,
    pub sid: String,
    pub approval_status: String,
}

/// Listed when no provider is configured, so the UI stays usable locally.
fn sample_templates() -> Vec<Template> {
    vec![Template {
        sid: "HX123".to_string(),
        friendly_name: "egresados_bienvenida".to_string(),
        body: "Cuerpo de ejemplo.".to_string(),
    }]
}

pub async fn list(
    State(state): State<AppState>,
    _user: CurrentUser,
) -> AppResult<Json<Vec<Template>>> {
    let Some(twilio) = &state.twilio else {
        return Ok(Json(sample_templates()));
    };

    let templates = twilio.list_templates().await.map_err(|e| {
        error!(error = %e, "templates_list_failed");
        AppError::Internal("Could not fetch templates from Twilio".into())
    })?;
    Ok(Json(templates))
}

pub async fn create(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Json(req): Json<CreateTemplateRequest>,
) -> AppResult<(StatusCode, Json<CreateTemplateResponse>)> {
    let template = parse_new_template(req)?;
    let twilio = require_provider(&state)?;

    let created = twilio.create_template(&template).await.map_err(|e| {
        error!(name = %template.name, error = %e, "template_create_failed");
        match e {
            ProviderError::Api { status, message, .. } => AppError::Upstream {
                status,
                message: format!("Twilio error: {message}"),
            },
            _ => AppError::Internal("An unexpected error occurred".into()),
        }
    })?;

    info!(sid = %created.sid, by = admin.uid, "template_created");
    Ok((
        StatusCode::CREATED,
        Json(CreateTemplateResponse {
            success: true,
            sid: created.sid,
            approval_status: created.approval_status,
        }),
    ))
}

pub(crate) fn require_provider(state: &AppState) -> AppResult<&TwilioClient> {
    state
        .twilio
        .as_deref()
        .ok_or_else(|| AppError::ServiceUnavailable("Messaging provider is not configured".into()))
}

fn parse_new_template(req: CreateTemplateRequest) -> AppResult<NewTemplate> {
    let non_empty = |v: Option<String>| v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty());

    let (Some(name), Some(template_type), Some(body)) = (
        non_empty(req.name),
        non_empty(req.template_type),
        non_empty(req.body),
    ) else {
        return Err(AppError::BadRequest("Name, type and body are required".into()));
    };

    let kind = match template_type.as_str() {
        "twilio/text" => TemplateKind::Text,
        "twilio/media" => {
            let media_url = non_empty(req.media_url).ok_or_else(|| {
                AppError::BadRequest("A media URL is required for media templates".into())
            })?;
            TemplateKind::Media { media_url }
        }
        _ => return Err(AppError::BadRequest("Invalid template type".into())),
    };

    Ok(NewTemplate { name, kind, body })
}
