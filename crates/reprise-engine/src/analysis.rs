//! Static inspection of a record set before replaying it.

use crate::router;
use chrono::NaiveDateTime;
use reprise_common::BackendKind;
use reprise_common::InteractionRecord;
use reprise_common::formatter::{mask_sensitive, truncate};
use serde::Serialize;
use std::collections::HashMap;

const UNKNOWN: &str = "(unknown)";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Analysis {
    pub total: usize,
    /// Records per process name, most frequent first.
    pub processes: Vec<(String, usize)>,
    /// Records per event kind, most frequent first.
    pub events: Vec<(String, usize)>,
    pub web: usize,
    pub desktop: usize,
    pub first_start: Option<NaiveDateTime>,
    pub last_end: Option<NaiveDateTime>,
}

impl Analysis {
    pub fn of(records: &[InteractionRecord]) -> Self {
        let web = records
            .iter()
            .filter(|r| router::route(r) == BackendKind::Web)
            .count();

        Self {
            total: records.len(),
            processes: ranked(records.iter().map(|r| r.process_name.as_str())),
            events: ranked(records.iter().map(|r| r.event.as_str())),
            web,
            desktop: records.len() - web,
            first_start: records.iter().filter_map(|r| r.start_time).min(),
            last_end: records.iter().filter_map(|r| r.finished_at()).max(),
        }
    }

    pub fn span(&self) -> Option<chrono::Duration> {
        Some(self.last_end? - self.first_start?)
    }

    pub fn render(&self) -> String {
        let mut out = format!(
            "Records: {}\nWeb: {}  Desktop: {}",
            self.total, self.web, self.desktop
        );

        if let (Some(first), Some(last)) = (self.first_start, self.last_end) {
            out.push_str(&format!("\nTime range: {} .. {}", first, last));
            if let Some(span) = self.span() {
                out.push_str(&format!(
                    " ({:.1}s)",
                    span.num_milliseconds() as f64 / 1000.0
                ));
            }
        }

        if !self.processes.is_empty() {
            out.push_str("\n\nProcesses:");
            for (name, count) in &self.processes {
                out.push_str(&format!("\n  {:<30} {}", name, count));
            }
        }
        if !self.events.is_empty() {
            out.push_str("\n\nEvents:");
            for (name, count) in &self.events {
                out.push_str(&format!("\n  {:<30} {}", name, count));
            }
        }
        out
    }
}

fn ranked<'a>(values: impl Iterator<Item = &'a str>) -> Vec<(String, usize)> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for value in values {
        let key = if value.is_empty() { UNKNOWN } else { value };
        *counts.entry(key).or_default() += 1;
    }
    let mut ranked: Vec<(String, usize)> = counts
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    ranked
}

/// Table of the first `n` records.
pub fn preview(records: &[InteractionRecord], n: usize) -> String {
    let mut out = format!(
        "{:<5} {:<16} {:<12} {:<20} {:<10} {:<20} {:<30} {}",
        "#", "ProcessName", "Event", "FieldName", "FieldType", "Sentence", "URL", "StartTime"
    );
    for record in records.iter().take(n) {
        let sentence = record
            .sentence()
            .map(|s| mask_sensitive(s, &record.field_name))
            .unwrap_or_default();
        let start = record
            .start_time
            .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_default();
        out.push_str(&format!(
            "\n{:<5} {:<16} {:<12} {:<20} {:<10} {:<20} {:<30} {}",
            record.index,
            truncate(&record.process_name, 16),
            truncate(record.event.as_str(), 12),
            truncate(&record.field_name, 20),
            truncate(&record.field_type, 10),
            truncate(&sentence, 20),
            truncate(record.url().unwrap_or_default(), 30),
            start
        ));
    }
    if records.len() > n {
        out.push_str(&format!("\n... {} more", records.len() - n));
    }
    out
}
