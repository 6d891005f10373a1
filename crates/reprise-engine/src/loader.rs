//! Loads interaction records from headered CSV exports.

use chrono::{DateTime, NaiveDateTime};
use reprise_common::{EventKind, InteractionRecord};
use serde::Deserialize;
use std::io::Read;
use std::path::Path;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("Failed to read records: {0}")]
    Io(#[from] std::io::Error),
    #[error("Malformed record data: {0}")]
    Csv(#[from] csv::Error),
}

/// Accepted timestamp layouts, tried in order after RFC 3339.
const TIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S%.f",
    "%m/%d/%Y %H:%M:%S%.f",
    "%m/%d/%Y %I:%M:%S %p",
    "%d.%m.%Y %H:%M:%S%.f",
];

/// Row layout of the capture export. Unknown columns are ignored and missing
/// ones default to empty.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawRow {
    #[serde(rename = "ProcessName")]
    process_name: String,
    #[serde(rename = "UserName")]
    user_name: String,
    #[serde(rename = "ExeName")]
    exe_name: String,
    #[serde(rename = "Application")]
    application: String,
    #[serde(rename = "Event")]
    event: String,
    #[serde(rename = "FieldName")]
    field_name: String,
    #[serde(rename = "FieldType")]
    field_type: String,
    #[serde(rename = "Sentence")]
    sentence: String,
    #[serde(rename = "URL")]
    url: String,
    #[serde(rename = "StartTime")]
    start_time: String,
    #[serde(rename = "EndTime")]
    end_time: String,
    #[serde(rename = "UTCStartTime")]
    utc_start_time: String,
    #[serde(rename = "UTCEndTime")]
    utc_end_time: String,
    #[serde(rename = "WindowName")]
    window_name: String,
}

impl RawRow {
    fn into_record(self, index: usize) -> InteractionRecord {
        let start =
            parse_timestamp(&self.start_time).or_else(|| parse_timestamp(&self.utc_start_time));
        let end = parse_timestamp(&self.end_time).or_else(|| parse_timestamp(&self.utc_end_time));

        let mut record = InteractionRecord {
            index,
            process_name: self.process_name,
            user_name: self.user_name,
            exe_name: self.exe_name,
            application: self.application,
            window_name: self.window_name,
            event: EventKind::parse(&self.event),
            field_name: self.field_name,
            field_type: self.field_type,
            sentence: None,
            url: None,
            start_time: start,
            end_time: end,
        };
        record = record.with_sentence(self.sentence).with_url(self.url);

        if record.normalize_times() {
            warn!(
                "Record {} ends before it starts; end time clamped to start time",
                index
            );
        }
        record
    }
}

pub struct RecordLoader;

impl RecordLoader {
    pub async fn from_path(path: &Path) -> Result<Vec<InteractionRecord>, LoadError> {
        let content = tokio::fs::read(path).await?;
        let records = Self::from_reader(content.as_slice())?;
        info!(
            "Loaded {} interaction records from {}",
            records.len(),
            path.display()
        );
        Ok(records)
    }

    /// Parse CSV data. Records keep file order; `index` is the data row number.
    pub fn from_reader<R: Read>(reader: R) -> Result<Vec<InteractionRecord>, LoadError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let mut records = Vec::new();
        for (index, row) in csv_reader.deserialize::<RawRow>().enumerate() {
            records.push(row?.into_record(index));
        }
        Ok(records)
    }
}

/// Parse a timestamp, returning `None` for blank or unrecognised values.
pub fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.naive_utc());
    }
    TIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
}
