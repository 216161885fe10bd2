//! Delivery reports built from the provider's message history.

use chrono::{DateTime, FixedOffset, Offset, Utc};
use serde::Serialize;

use crate::provider::MessageRecord;

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One message in a report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportRow {
    /// Destination number without the `whatsapp:` channel prefix
    pub recipient: String,
    /// Send time in the report's local offset, empty when not yet sent
    pub sent_at: String,
    pub body: String,
    pub status: String,
}

/// Local offset for report times, falling back to UTC when out of range.
pub fn report_offset(minutes: i32) -> FixedOffset {
    minutes
        .checked_mul(60)
        .and_then(FixedOffset::east_opt)
        .unwrap_or_else(|| Utc.fix())
}

/// Start of the report window: `days` before `now`.
pub fn window_start(now: DateTime<Utc>, days: u32) -> DateTime<Utc> {
    now - chrono::Duration::days(i64::from(days))
}

/// Convert provider records to report rows, keeping provider order.
pub fn build_rows(records: &[MessageRecord], offset: FixedOffset) -> Vec<ReportRow> {
    records
        .iter()
        .map(|record| ReportRow {
            recipient: record
                .to
                .strip_prefix("whatsapp:")
                .unwrap_or(&record.to)
                .to_string(),
            sent_at: record
                .sent_at()
                .map(|at| at.with_timezone(&offset).format(TIME_FORMAT).to_string())
                .unwrap_or_default(),
            body: record.body.clone().unwrap_or_default(),
            status: record.status.clone().unwrap_or_default(),
        })
        .collect()
}

/// Render rows as CSV with a header line.
pub fn to_csv(rows: &[ReportRow]) -> Result<String, csv::Error> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    for row in rows {
        writer.serialize(row)?;
    }
    // An empty report still gets its header
    if rows.is_empty() {
        writer.write_record(["recipient", "sent_at", "body", "status"])?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| csv::Error::from(e.into_error()))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}
