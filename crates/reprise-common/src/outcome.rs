use crate::error::{BackendError, FailureKind};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;

/// Execution backend a record is routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    Web,
    Desktop,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::Web => f.write_str("web"),
            BackendKind::Desktop => f.write_str("desktop"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    Succeeded,
    Failed,
    Skipped,
}

impl fmt::Display for OutcomeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutcomeStatus::Succeeded => f.write_str("ok"),
            OutcomeStatus::Failed => f.write_str("FAILED"),
            OutcomeStatus::Skipped => f.write_str("skipped"),
        }
    }
}

pub const ROUTING_SKIP_CODE: &str = "ROUTING_SKIP";

/// Error detail attached to a failed or skipped outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutcomeError {
    pub code: String,
    /// `None` for routing skips, which never reach a backend.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<FailureKind>,
    pub message: String,
}

impl OutcomeError {
    pub fn routing_skip(backend: BackendKind) -> Self {
        Self {
            code: ROUTING_SKIP_CODE.to_string(),
            kind: None,
            message: format!("no {} capability configured for this session", backend),
        }
    }

    pub fn is_routing_skip(&self) -> bool {
        self.code == ROUTING_SKIP_CODE
    }
}

impl From<&BackendError> for OutcomeError {
    fn from(err: &BackendError) -> Self {
        Self {
            code: err.code().to_string(),
            kind: Some(err.failure_kind()),
            message: err.to_string(),
        }
    }
}

/// Failure screenshot written to disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artifact {
    pub path: PathBuf,
    pub bytes: usize,
}

/// What happened to one record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordOutcome {
    /// Capture position of the record.
    pub index: usize,
    pub event: String,
    pub target: String,
    pub backend: BackendKind,
    pub status: OutcomeStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<OutcomeError>,
    pub retry_count: u32,
    pub attempts: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifact: Option<Artifact>,
    /// Reconstructed delay applied before the record, in milliseconds.
    pub delay_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum AbortReason {
    /// A record failed with `continue_on_error` disabled.
    FailedRecord { index: usize },
    /// External cancellation (operator interrupt).
    Cancelled,
}

impl fmt::Display for AbortReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AbortReason::FailedRecord { index } => {
                write!(f, "record {} failed and continue_on_error is off", index)
            }
            AbortReason::Cancelled => f.write_str("cancelled by operator"),
        }
    }
}

/// Accumulates outcomes while a session runs.
#[derive(Debug)]
pub struct ReplayReport {
    run_id: String,
    started_at: DateTime<Utc>,
    selected: usize,
    outcomes: Vec<RecordOutcome>,
    applications: BTreeSet<String>,
}

impl ReplayReport {
    pub fn new(run_id: impl Into<String>, selected: usize) -> Self {
        Self {
            run_id: run_id.into(),
            started_at: Utc::now(),
            selected,
            outcomes: Vec::new(),
            applications: BTreeSet::new(),
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn push(&mut self, outcome: RecordOutcome) {
        if outcome.status != OutcomeStatus::Skipped && !outcome.target.is_empty() {
            self.applications.insert(outcome.target.clone());
        }
        self.outcomes.push(outcome);
    }

    pub fn outcomes(&self) -> &[RecordOutcome] {
        &self.outcomes
    }

    pub fn finalize(self, aborted: Option<AbortReason>) -> ReplayResult {
        let count = |status| self.outcomes.iter().filter(|o| o.status == status).count();
        ReplayResult {
            succeeded: count(OutcomeStatus::Succeeded),
            failed: count(OutcomeStatus::Failed),
            skipped: count(OutcomeStatus::Skipped),
            total: self.outcomes.len(),
            run_id: self.run_id,
            started_at: self.started_at,
            finished_at: Utc::now(),
            selected: self.selected,
            outcomes: self.outcomes,
            applications: self.applications,
            aborted,
        }
    }
}

/// Finalized result of one replay session.
///
/// `selected` counts the records left after filtering and range selection, so
/// an empty selection (`selected == 0`) is distinguishable from a run in which
/// every action failed (`selected > 0`, `failed == total`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplayResult {
    run_id: String,
    started_at: DateTime<Utc>,
    finished_at: DateTime<Utc>,
    selected: usize,
    total: usize,
    succeeded: usize,
    failed: usize,
    skipped: usize,
    outcomes: Vec<RecordOutcome>,
    applications: BTreeSet<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    aborted: Option<AbortReason>,
}

impl ReplayResult {
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn finished_at(&self) -> DateTime<Utc> {
        self.finished_at
    }

    pub fn selected(&self) -> usize {
        self.selected
    }

    /// Records processed (succeeded + failed + skipped).
    pub fn total(&self) -> usize {
        self.total
    }

    pub fn succeeded(&self) -> usize {
        self.succeeded
    }

    pub fn failed(&self) -> usize {
        self.failed
    }

    pub fn skipped(&self) -> usize {
        self.skipped
    }

    pub fn outcomes(&self) -> &[RecordOutcome] {
        &self.outcomes
    }

    pub fn applications(&self) -> &BTreeSet<String> {
        &self.applications
    }

    pub fn aborted(&self) -> Option<&AbortReason> {
        self.aborted.as_ref()
    }

    pub fn is_aborted(&self) -> bool {
        self.aborted.is_some()
    }

    /// Percentage of processed records that succeeded.
    pub fn success_rate(&self) -> f64 {
        self.succeeded as f64 / self.total.max(1) as f64 * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(index: usize, status: OutcomeStatus) -> RecordOutcome {
        RecordOutcome {
            index,
            event: "click".into(),
            target: "chrome".into(),
            backend: BackendKind::Web,
            status,
            error: None,
            retry_count: 0,
            attempts: 1,
            artifact: None,
            delay_ms: 0,
            note: None,
        }
    }

    #[test]
    fn test_finalize_counts() {
        let mut report = ReplayReport::new("run", 3);
        report.push(outcome(0, OutcomeStatus::Succeeded));
        report.push(outcome(1, OutcomeStatus::Failed));
        report.push(outcome(2, OutcomeStatus::Skipped));
        let result = report.finalize(None);

        assert_eq!(result.total(), 3);
        assert_eq!(result.succeeded(), 1);
        assert_eq!(result.failed(), 1);
        assert_eq!(result.skipped(), 1);
        assert!((result.success_rate() - 33.333).abs() < 0.01);
        assert!(!result.is_aborted());
    }

    #[test]
    fn test_empty_selection_is_observable() {
        let result = ReplayReport::new("run", 0).finalize(None);
        assert_eq!(result.selected(), 0);
        assert_eq!(result.total(), 0);
        assert_eq!(result.success_rate(), 0.0);
    }

    #[test]
    fn test_skipped_records_do_not_count_as_applications() {
        let mut report = ReplayReport::new("run", 2);
        report.push(outcome(0, OutcomeStatus::Skipped));
        assert!(report.finalize(None).applications().is_empty());
    }
}
