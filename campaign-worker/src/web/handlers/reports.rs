//! Delivery report from the provider's message history.

use axum::{
    extract::{Query, State},
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use serde::Deserialize;
use tracing::{error, info};

use super::templates::require_provider;
use crate::report::{build_rows, report_offset, to_csv, window_start};
use crate::web::error::{AppError, AppResult};
use crate::web::extract::CurrentUser;
use crate::web::state::AppState;

/// Longest report window, in days.
const MAX_DAYS: u32 = 90;

#[derive(Debug, Deserialize)]
pub struct ReportQuery {
    pub days: Option<u32>,
    pub format: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReportFormat {
    Json,
    Csv,
}

impl ReportFormat {
    fn parse(raw: Option<&str>) -> AppResult<Self> {
        match raw.map(str::trim) {
            None | Some("") | Some("json") => Ok(ReportFormat::Json),
            Some("csv") => Ok(ReportFormat::Csv),
            Some(other) => Err(AppError::BadRequest(format!(
                "format must be 'json' or 'csv', got '{other}'"
            ))),
        }
    }
}

pub async fn report(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(query): Query<ReportQuery>,
) -> AppResult<Response> {
    let format = ReportFormat::parse(query.format.as_deref())?;
    let days = query
        .days
        .unwrap_or(state.config.report_default_days)
        .clamp(1, MAX_DAYS);
    let twilio = require_provider(&state)?;

    let since = window_start(Utc::now(), days);
    let records = twilio
        .list_messages(since, state.config.report_max_pages)
        .await
        .map_err(|e| {
            error!(error = %e, "report_history_failed");
            AppError::Internal("Could not fetch message history from Twilio".into())
        })?;

    let rows = build_rows(&records, report_offset(state.config.report_utc_offset_minutes));
    info!(uid = user.id(), days = days, rows = rows.len(), format = ?format, "report_built");

    match format {
        ReportFormat::Json => Ok(Json(rows).into_response()),
        ReportFormat::Csv => {
            let csv = to_csv(&rows).map_err(|e| AppError::Internal(format!("Could not render CSV: {e}")))?;
            Ok((
                [
                    (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
                    (header::CONTENT_DISPOSITION, "attachment; filename=\"report.csv\""),
                ],
                csv,
            )
                .into_response())
        }
    }
}
