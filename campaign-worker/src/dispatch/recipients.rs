//! Recipient file parsing.
//!
//! A recipient file is CSV with the phone number in the first column and the
//! display name in the second. Extra columns are ignored. Intake and the
//! dispatcher both go through [`parse_recipients`], so the stored recipient
//! count is exactly the number of messages the dispatcher will attempt.

use std::io::Read;
use std::path::Path;

use csv::{ReaderBuilder, Trim};

/// One message destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recipient {
    pub phone: String,
    pub name: String,
}

/// The recipient file could not be read as a whole.
#[derive(Debug, thiserror::Error)]
pub enum RecipientFileError {
    #[error("cannot read recipient file: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed recipient file: {0}")]
    Csv(#[from] csv::Error),
}

/// Parse recipients from CSV data.
///
/// Fields are trimmed. Rows with fewer than two fields, or with an empty or
/// whitespace-only phone or name, are skipped. With `has_header` the first row is never a
/// recipient. Invalid UTF-8 fails the whole file.
pub fn parse_recipients<R: Read>(
    reader: R,
    has_header: bool,
) -> Result<Vec<Recipient>, RecipientFileError> {
    let mut csv = ReaderBuilder::new()
        .has_headers(has_header)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(reader);

    let mut recipients = Vec::new();
    for record in csv.records() {
        let record = record?;
        match (record.get(0), record.get(1)) {
            (Some(phone), Some(name)) if !phone.is_empty() && !name.is_empty() => {
                recipients.push(Recipient {
                    phone: phone.to_string(),
                    name: name.to_string(),
                });
            }
            _ => continue,
        }
    }

    Ok(recipients)
}

/// Read and parse a stored recipient file.
pub async fn read_recipient_file(
    path: &Path,
    has_header: bool,
) -> Result<Vec<Recipient>, RecipientFileError> {
    let contents = tokio::fs::read(path).await?;
    parse_recipients(contents.as_slice(), has_header)
}
