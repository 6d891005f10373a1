use reprise_common::formatter::{mask_sensitive, truncate};
use reprise_common::{InteractionRecord, OutcomeStatus, RecordOutcome, ReplayResult};
use std::time::Duration;

pub fn format_summary(result: &ReplayResult) -> String {
    let mut output = format!(
        "Replay {}\nSelected: {}\nProcessed: {}\nSucceeded: {}\nFailed: {}\nSkipped: {}\nSuccess rate: {:.1}%",
        result.run_id(),
        result.selected(),
        result.total(),
        result.succeeded(),
        result.failed(),
        result.skipped(),
        result.success_rate()
    );

    let elapsed = result.finished_at() - result.started_at();
    output.push_str(&format!(
        "\nDuration: {:.1}s",
        elapsed.num_milliseconds() as f64 / 1000.0
    ));

    if !result.applications().is_empty() {
        output.push_str("\n\nApplications:");
        for app in result.applications() {
            output.push_str(&format!("\n- {}", app));
        }
    }

    if let Some(reason) = result.aborted() {
        output.push_str(&format!("\n\nAborted: {}", reason));
    }

    if result.selected() == 0 {
        output.push_str("\n\nNo records matched the selection.");
    }
    output
}

pub fn format_outcome(outcome: &RecordOutcome) -> String {
    let mut line = format!(
        "[{}] #{} {} on {} ({})",
        outcome.status,
        outcome.index,
        outcome.event,
        if outcome.target.is_empty() {
            "?"
        } else {
            &outcome.target
        },
        outcome.backend
    );

    if outcome.retry_count > 0 {
        line.push_str(&format!(" after {} retries", outcome.retry_count));
    }
    if let Some(err) = &outcome.error {
        match outcome.status {
            OutcomeStatus::Skipped => line.push_str(&format!(": {}", err.message)),
            _ => line.push_str(&format!(": [{}] {}", err.code, err.message)),
        }
    }
    if let Some(artifact) = &outcome.artifact {
        line.push_str(&format!("\n    screenshot: {}", artifact.path.display()));
    }
    if let Some(note) = &outcome.note {
        line.push_str(&format!("\n    note: {}", note));
    }
    line
}

/// One-line description of a record, with sensitive input masked.
pub fn describe_record(record: &InteractionRecord) -> String {
    let mut line = format!("#{} {} on {}", record.index, record.event, record.target_name());
    if !record.field_name.is_empty() {
        line.push_str(&format!(" -> {}", record.field_name));
        if !record.field_type.is_empty() {
            line.push_str(&format!(" [{}]", record.field_type));
        }
    }
    if let Some(sentence) = record.sentence() {
        let shown = mask_sensitive(sentence, &record.field_name);
        line.push_str(&format!(" \"{}\"", truncate(&shown, 40)));
    }
    if let Some(url) = record.url() {
        line.push_str(&format!(" @ {}", truncate(url, 60)));
    }
    line
}

pub fn format_delay(delay: Duration) -> String {
    format!("{:.2}s", delay.as_secs_f64())
}
