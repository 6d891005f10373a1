//! Per-record execution with bounded retries.
//!
//! Each record walks `Pending -> Executing -> {Succeeded, Retrying, Failed}`,
//! where `Retrying` loops back to `Executing` after a backoff. A record with no
//! capability for its route goes straight from `Pending` to `Skipped` and is
//! never attempted.

use crate::backend::ActiveBackend;
use crate::config::ReplayConfig;
use reprise_common::{
    Artifact, BackendError, BackendKind, InteractionRecord, OutcomeError, OutcomeStatus,
    RecordOutcome,
};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionState {
    Pending,
    Executing,
    Retrying,
    Succeeded,
    Failed,
    Skipped,
}

impl ActionState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ActionState::Succeeded | ActionState::Failed | ActionState::Skipped
        )
    }
}

/// URL the web backend is currently showing, so navigation only happens when
/// a record's URL differs.
#[derive(Debug, Default)]
pub struct PageState {
    current_url: Option<String>,
}

impl PageState {
    pub fn current_url(&self) -> Option<&str> {
        self.current_url.as_deref()
    }
}

/// Result of supervising one record.
#[derive(Debug)]
pub struct Supervised {
    pub state: ActionState,
    pub backend: BackendKind,
    pub attempts: u32,
    pub error: Option<OutcomeError>,
    pub artifact: Option<Artifact>,
}

impl Supervised {
    pub fn retry_count(&self) -> u32 {
        self.attempts.saturating_sub(1)
    }

    pub fn into_outcome(
        self,
        record: &InteractionRecord,
        delay: Duration,
        note: Option<String>,
    ) -> RecordOutcome {
        let retry_count = self.retry_count();
        let status = match self.state {
            ActionState::Succeeded => OutcomeStatus::Succeeded,
            ActionState::Skipped => OutcomeStatus::Skipped,
            _ => OutcomeStatus::Failed,
        };
        RecordOutcome {
            index: record.index,
            event: record.event.to_string(),
            target: record.target_name().to_string(),
            backend: self.backend,
            status,
            error: self.error,
            retry_count,
            attempts: self.attempts,
            artifact: self.artifact,
            delay_ms: delay.as_millis() as u64,
            note,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Supervisor {
    max_retries: u32,
    retry_delay: Duration,
    max_backoff: Duration,
    screenshot_on_failure: bool,
    desktop_screenshot_on_error: bool,
    artifact_dir: PathBuf,
    run_id: String,
}

impl Supervisor {
    pub fn new(config: &ReplayConfig, run_id: impl Into<String>) -> Self {
        Self {
            max_retries: config.error_handling.max_retries,
            retry_delay: config.error_handling.retry_delay(),
            max_backoff: Duration::from_secs_f64(config.timing.max_delay),
            screenshot_on_failure: config.error_handling.screenshot_on_failure,
            desktop_screenshot_on_error: config.desktop_automation.screenshot_on_error,
            artifact_dir: config.error_handling.artifact_dir.clone(),
            run_id: run_id.into(),
        }
    }

    /// Wait before retry number `retry` (1-based): `retry_delay` doubled per
    /// retry, capped at `max_delay`.
    pub fn backoff(&self, retry: u32) -> Duration {
        let factor = 2f64.powi(retry.saturating_sub(1).min(30) as i32);
        self.retry_delay.mul_f64(factor).min(self.max_backoff)
    }

    /// Drive `record` to a terminal state. Never returns an error: failures end
    /// up in the returned value.
    pub async fn supervise(
        &self,
        record: &InteractionRecord,
        kind: BackendKind,
        backend: Option<ActiveBackend<'_>>,
        page: &mut PageState,
    ) -> Supervised {
        let Some(mut backend) = backend else {
            warn!(
                "Skipping record {}: no {} capability configured",
                record.index, kind
            );
            return Supervised {
                state: ActionState::Skipped,
                backend: kind,
                attempts: 0,
                error: Some(OutcomeError::routing_skip(kind)),
                artifact: None,
            };
        };

        let mut state = ActionState::Pending;
        let mut attempts = 0u32;
        let mut last_error: Option<BackendError> = None;

        while !state.is_terminal() {
            state = match state {
                ActionState::Pending => ActionState::Executing,
                ActionState::Executing => {
                    attempts += 1;
                    match self.attempt(record, &mut backend, page).await {
                        Ok(()) => ActionState::Succeeded,
                        Err(e) => {
                            let retry = attempts <= self.max_retries;
                            warn!(
                                "Record {} attempt {}/{} failed: {}",
                                record.index,
                                attempts,
                                self.max_retries.saturating_add(1),
                                e
                            );
                            last_error = Some(e);
                            if retry {
                                ActionState::Retrying
                            } else {
                                ActionState::Failed
                            }
                        }
                    }
                }
                ActionState::Retrying => {
                    let wait = self.backoff(attempts);
                    debug!("Retrying record {} in {:?}", record.index, wait);
                    tokio::time::sleep(wait).await;
                    ActionState::Executing
                }
                terminal => terminal,
            };
        }

        let mut artifact = None;
        if state == ActionState::Failed && self.wants_screenshot(kind) {
            artifact = self.capture_artifact(record, &mut backend).await;
        }
        if state == ActionState::Failed
            && let Some(e) = &last_error
        {
            error!(
                "Record {} failed after {} attempt(s). {}",
                record.index,
                attempts,
                e.recovery_hint()
            );
        }
        if state == ActionState::Succeeded && attempts > 1 {
            info!(
                "Record {} succeeded after {} retries",
                record.index,
                attempts - 1
            );
        }

        Supervised {
            state,
            backend: kind,
            attempts,
            error: last_error
                .as_ref()
                .filter(|_| state == ActionState::Failed)
                .map(OutcomeError::from),
            artifact,
        }
    }

    async fn attempt(
        &self,
        record: &InteractionRecord,
        backend: &mut ActiveBackend<'_>,
        page: &mut PageState,
    ) -> Result<(), BackendError> {
        if let ActiveBackend::Web(web) = backend
            && let Some(url) = record.url()
            && page.current_url() != Some(url)
        {
            page.current_url = None;
            let nav = web.navigate(url).await?;
            debug!("Navigated to {} ({})", nav.url, nav.title);
            page.current_url = Some(url.to_string());
        }
        backend.execute(record).await
    }

    fn wants_screenshot(&self, kind: BackendKind) -> bool {
        self.screenshot_on_failure
            || (kind == BackendKind::Desktop && self.desktop_screenshot_on_error)
    }

    pub fn artifact_path(&self, index: usize) -> PathBuf {
        self.artifact_dir
            .join(format!("{}_{}.png", self.run_id, index))
    }

    async fn capture_artifact(
        &self,
        record: &InteractionRecord,
        backend: &mut ActiveBackend<'_>,
    ) -> Option<Artifact> {
        let bytes = match backend.capture_screenshot().await {
            Ok(bytes) => bytes,
            Err(BackendError::NotSupported(_)) => {
                debug!("{} backend cannot capture screenshots", backend.kind());
                return None;
            }
            Err(e) => {
                warn!("Failed to capture screenshot for record {}: {}", record.index, e);
                return None;
            }
        };

        let path = self.artifact_path(record.index);
        if let Err(e) = tokio::fs::create_dir_all(&self.artifact_dir).await {
            warn!(
                "Failed to create artifact directory {}: {}",
                self.artifact_dir.display(),
                e
            );
            return None;
        }
        if let Err(e) = tokio::fs::write(&path, &bytes).await {
            warn!("Failed to write {}: {}", path.display(), e);
            return None;
        }
        info!("Saved failure screenshot to {}", path.display());
        Some(Artifact {
            path,
            bytes: bytes.len(),
        })
    }
}
