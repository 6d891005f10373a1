//! Replay session orchestration.
//!
//! A session owns its backends for its whole lifetime: capabilities needed by
//! the selected records are launched once before the first record and closed
//! once after the last one, whether the run completed or was aborted.
//!
//! Sessions are single-pass. `run` and `start_stepping` consume the session;
//! replaying again means building a new one.

use crate::abort::AbortHandle;
use crate::backend::Backends;
use crate::config::ReplayConfig;
use crate::error::ReplayError;
use crate::filter::RecordFilter;
use crate::router;
use crate::supervisor::{PageState, Supervisor};
use crate::timing::TimingReconstructor;
use reprise_common::{
    AbortReason, BackendKind, InteractionRecord, OutcomeStatus, RecordOutcome, ReplayReport,
    ReplayResult,
};
use std::time::Duration;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Running,
    Completed,
    Aborted(AbortReason),
}

/// Whether delays are slept or only reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pace {
    Realtime,
    Manual,
}

pub struct ReplaySession {
    config: ReplayConfig,
    backends: Backends,
    filter: RecordFilter,
    start: usize,
    end: Option<usize>,
    abort: AbortHandle,
    run_id: String,
}

impl ReplaySession {
    /// Validates `config` and checks that at least one capability is present.
    pub fn new(config: ReplayConfig, backends: Backends) -> Result<Self, ReplayError> {
        config.validate()?;
        if backends.is_empty() {
            return Err(ReplayError::Configuration(
                "no execution backend configured".into(),
            ));
        }
        Ok(Self {
            config,
            backends,
            filter: RecordFilter::default(),
            start: 0,
            end: None,
            abort: AbortHandle::new(),
            run_id: uuid::Uuid::new_v4().to_string(),
        })
    }

    pub fn with_filter(mut self, filter: RecordFilter) -> Self {
        self.filter = filter;
        self
    }

    /// Restrict the run to positions `[start, end)` of the filtered records.
    pub fn with_range(mut self, start: usize, end: Option<usize>) -> Self {
        self.start = start;
        self.end = end;
        self
    }

    pub fn with_run_id(mut self, run_id: impl Into<String>) -> Self {
        self.run_id = run_id.into();
        self
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn config(&self) -> &ReplayConfig {
        &self.config
    }

    /// Share an existing cancellation handle instead of the session's own.
    pub fn with_abort_handle(mut self, abort: AbortHandle) -> Self {
        self.abort = abort;
        self
    }

    /// Handle that stops the session from another task.
    pub fn abort_handle(&self) -> AbortHandle {
        self.abort.clone()
    }

    /// Records that a run over `records` would process, in order.
    pub fn plan(&self, records: &[InteractionRecord]) -> Vec<InteractionRecord> {
        let filtered = self.filter.apply(records);
        let end = self.end.unwrap_or(filtered.len()).min(filtered.len());
        let start = self.start.min(end);
        filtered[start..end].to_vec()
    }

    /// Replay `records` to completion or abort.
    ///
    /// Only configuration problems and backend launch failures are returned as
    /// errors. Everything that goes wrong with individual records is reported in
    /// the result.
    pub async fn run(self, records: &[InteractionRecord]) -> Result<ReplayResult, ReplayError> {
        let mut replayer = self.into_replayer(records, Pace::Realtime).await?;
        while replayer.advance().await.is_some() {}
        Ok(replayer.finish().await)
    }

    /// Begin a session driven one record at a time.
    pub async fn start_stepping(
        self,
        records: &[InteractionRecord],
    ) -> Result<SteppingSession, ReplayError> {
        let replayer = self.into_replayer(records, Pace::Manual).await?;
        Ok(SteppingSession { replayer })
    }

    async fn into_replayer(
        mut self,
        records: &[InteractionRecord],
        pace: Pace,
    ) -> Result<Replayer, ReplayError> {
        let plan = self.plan(records);
        router::preflight(
            &plan,
            &self.backends,
            self.config.error_handling.require_all_backends,
        )?;

        info!(
            "Starting replay {} with {} of {} records",
            self.run_id,
            plan.len(),
            records.len()
        );

        let launched = launch(&mut self.backends, &router::required_backends(&plan)).await?;
        let guard = BackendGuard {
            backends: self.backends,
            launched,
        };

        Ok(Replayer {
            timing: TimingReconstructor::new(self.config.timing.clone()),
            supervisor: Supervisor::new(&self.config, self.run_id.clone()),
            continue_on_error: self.config.error_handling.continue_on_error,
            report: ReplayReport::new(self.run_id, plan.len()),
            plan,
            cursor: 0,
            guard,
            page: PageState::default(),
            abort: self.abort,
            aborted: None,
            pace,
        })
    }
}

/// Launch the variants in `kinds` that are present. On failure, whatever was
/// already launched is closed again.
async fn launch(
    backends: &mut Backends,
    kinds: &[BackendKind],
) -> Result<Vec<BackendKind>, ReplayError> {
    let mut launched = Vec::new();
    for &kind in kinds {
        let Some(mut backend) = backends.get_mut(kind) else {
            continue;
        };
        info!("Launching {} backend", kind);
        if let Err(source) = backend.launch().await {
            error!("Failed to launch {} backend: {}", kind, source);
            close(backends, &launched).await;
            return Err(ReplayError::BackendInit {
                backend: kind,
                source,
            });
        }
        launched.push(kind);
    }
    Ok(launched)
}

async fn close(backends: &mut Backends, kinds: &[BackendKind]) {
    for &kind in kinds {
        if let Some(mut backend) = backends.get_mut(kind) {
            debug!("Closing {} backend", kind);
            if let Err(e) = backend.close().await {
                warn!("Failed to close {} backend: {}", kind, e);
            }
        }
    }
}

/// Backends owned by a running session. Launched variants are closed by
/// `close`, or in the background if the guard is dropped first.
struct BackendGuard {
    backends: Backends,
    launched: Vec<BackendKind>,
}

impl BackendGuard {
    async fn close(&mut self) {
        let launched = std::mem::take(&mut self.launched);
        close(&mut self.backends, &launched).await;
    }
}

impl Drop for BackendGuard {
    fn drop(&mut self) {
        if self.launched.is_empty() {
            return;
        }
        let mut backends = std::mem::take(&mut self.backends);
        let launched = std::mem::take(&mut self.launched);
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                warn!("Session dropped before finish; closing backends in the background");
                handle.spawn(async move {
                    close(&mut backends, &launched).await;
                });
            }
            Err(_) => warn!(
                "Session dropped outside a runtime; {} backend(s) left open",
                launched.len()
            ),
        }
    }
}

struct Replayer {
    plan: Vec<InteractionRecord>,
    cursor: usize,
    timing: TimingReconstructor,
    supervisor: Supervisor,
    continue_on_error: bool,
    guard: BackendGuard,
    page: PageState,
    report: ReplayReport,
    abort: AbortHandle,
    aborted: Option<AbortReason>,
    pace: Pace,
}

impl Replayer {
    fn state(&self) -> SessionState {
        match &self.aborted {
            Some(reason) => SessionState::Aborted(reason.clone()),
            None if self.cursor >= self.plan.len() => SessionState::Completed,
            None => SessionState::Running,
        }
    }

    fn stop(&mut self, reason: AbortReason) {
        if self.aborted.is_none() {
            warn!("Replay {} aborted: {}", self.report.run_id(), reason);
            self.aborted = Some(reason);
        }
    }

    /// Process the next record. `None` once the plan is exhausted or the run
    /// was aborted.
    async fn advance(&mut self) -> Option<RecordOutcome> {
        if self.aborted.is_some() {
            return None;
        }
        if self.abort.is_aborted() {
            self.stop(AbortReason::Cancelled);
            return None;
        }

        let record = self.plan.get(self.cursor)?.clone();
        self.cursor += 1;

        let delay = self.timing.next_delay(&record);
        if self.pace == Pace::Realtime && !delay.is_zero() && !self.abort.sleep(delay).await {
            self.stop(AbortReason::Cancelled);
            return None;
        }

        let routing = router::classify(&record);
        let note = routing.ambiguous.then(|| {
            warn!(
                "Record {} has no URL but process '{}' looks like a browser; routing to desktop",
                record.index, record.process_name
            );
            "browser process without URL routed to desktop".to_string()
        });

        info!(
            "Replaying record {} ({} on {}) via {}",
            record.index,
            record.event,
            record.target_name(),
            routing.kind
        );

        let backend = self.guard.backends.get_mut(routing.kind);
        let supervised = self
            .supervisor
            .supervise(&record, routing.kind, backend, &mut self.page)
            .await;
        let outcome = supervised.into_outcome(&record, delay, note);
        self.report.push(outcome.clone());

        if outcome.status == OutcomeStatus::Failed && !self.continue_on_error {
            self.stop(AbortReason::FailedRecord {
                index: record.index,
            });
        }
        Some(outcome)
    }

    fn peek(&self) -> Option<&InteractionRecord> {
        if self.aborted.is_some() {
            return None;
        }
        self.plan.get(self.cursor)
    }

    fn remaining(&self) -> usize {
        if self.aborted.is_some() {
            return 0;
        }
        self.plan.len().saturating_sub(self.cursor)
    }

    async fn finish(mut self) -> ReplayResult {
        if self.aborted.is_none() && self.abort.is_aborted() && self.cursor < self.plan.len() {
            self.stop(AbortReason::Cancelled);
        }
        self.guard.close().await;
        let result = self.report.finalize(self.aborted);
        info!(
            "Replay {} finished: {}/{} succeeded, {} failed, {} skipped",
            result.run_id(),
            result.succeeded(),
            result.total(),
            result.failed(),
            result.skipped()
        );
        result
    }
}

/// A session advanced one record per call. Delays are computed and reported
/// but not slept.
///
/// Call `finish` to close the backends and get the result. Dropping the
/// session instead closes them on a background task of the current runtime.
pub struct SteppingSession {
    replayer: Replayer,
}

impl SteppingSession {
    pub async fn step(&mut self) -> Option<RecordOutcome> {
        self.replayer.advance().await
    }

    /// Next record to be processed.
    pub fn peek(&self) -> Option<&InteractionRecord> {
        self.replayer.peek()
    }

    pub fn remaining(&self) -> usize {
        self.replayer.remaining()
    }

    pub fn position(&self) -> usize {
        self.replayer.cursor
    }

    pub fn len(&self) -> usize {
        self.replayer.plan.len()
    }

    pub fn is_empty(&self) -> bool {
        self.replayer.plan.is_empty()
    }

    pub fn state(&self) -> SessionState {
        self.replayer.state()
    }

    pub fn outcomes(&self) -> &[RecordOutcome] {
        self.replayer.report.outcomes()
    }

    /// Delay the next record would wait in a realtime run.
    pub fn next_delay(&self) -> Option<Duration> {
        let record = self.peek()?;
        let mut timing = self.replayer.timing.clone();
        Some(timing.next_delay(record))
    }

    pub fn abort(&mut self) {
        self.replayer.abort.abort();
        self.replayer.stop(AbortReason::Cancelled);
    }

    /// Release backends and produce the result.
    pub async fn finish(self) -> ReplayResult {
        self.replayer.finish().await
    }
}
