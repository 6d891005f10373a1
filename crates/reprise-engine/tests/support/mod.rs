#![allow(dead_code)]

use async_trait::async_trait;
use reprise_engine::AbortHandle;
use reprise_engine::backend::{
    BackendError, Capability, DesktopCapability, NavigationResult, WebCapability,
};
use reprise_engine::common::InteractionRecord;
use reprise_engine::config::ReplayConfig;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Shared call log, readable after the mock has moved into a session.
#[derive(Clone, Default)]
pub struct Journal(Arc<Mutex<Vec<String>>>);

impl Journal {
    pub fn push(&self, entry: String) {
        self.0.lock().unwrap().push(entry);
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.entries()
            .iter()
            .filter(|e| e.starts_with(prefix))
            .count()
    }

    pub fn executed(&self) -> Vec<String> {
        self.entries()
            .into_iter()
            .filter(|e| e.contains(":execute:"))
            .collect()
    }
}

/// Capability double used for both variants.
pub struct MockCapability {
    name: &'static str,
    journal: Journal,
    /// Remaining failures per record index; `u32::MAX` never recovers.
    failures: HashMap<usize, u32>,
    launch_fails: bool,
    screenshot: Option<Result<Vec<u8>, String>>,
    abort_on: Option<(usize, AbortHandle)>,
}

impl MockCapability {
    pub fn new(name: &'static str, journal: &Journal) -> Self {
        Self {
            name,
            journal: journal.clone(),
            failures: HashMap::new(),
            launch_fails: false,
            screenshot: None,
            abort_on: None,
        }
    }

    pub fn failing(mut self, index: usize, times: u32) -> Self {
        self.failures.insert(index, times);
        self
    }

    pub fn always_failing(self, index: usize) -> Self {
        self.failing(index, u32::MAX)
    }

    pub fn launch_fails(mut self) -> Self {
        self.launch_fails = true;
        self
    }

    pub fn with_screenshot(mut self, bytes: &[u8]) -> Self {
        self.screenshot = Some(Ok(bytes.to_vec()));
        self
    }

    pub fn with_broken_screenshot(mut self) -> Self {
        self.screenshot = Some(Err("display gone".into()));
        self
    }

    /// Trigger `handle` while executing the record at `index`.
    pub fn abort_during(mut self, index: usize, handle: AbortHandle) -> Self {
        self.abort_on = Some((index, handle));
        self
    }
}

#[async_trait]
impl Capability for MockCapability {
    async fn launch(&mut self) -> Result<(), BackendError> {
        self.journal.push(format!("{}:launch", self.name));
        if self.launch_fails {
            return Err(BackendError::Unavailable(format!("{} not running", self.name)));
        }
        Ok(())
    }

    async fn close(&mut self) -> Result<(), BackendError> {
        self.journal.push(format!("{}:close", self.name));
        Ok(())
    }

    async fn is_ready(&self) -> bool {
        true
    }

    async fn execute(&mut self, record: &InteractionRecord) -> Result<(), BackendError> {
        self.journal
            .push(format!("{}:execute:{}", self.name, record.index));
        if let Some((index, handle)) = &self.abort_on
            && *index == record.index
        {
            handle.abort();
        }
        if let Some(remaining) = self.failures.get_mut(&record.index)
            && *remaining > 0
        {
            if *remaining != u32::MAX {
                *remaining -= 1;
            }
            return Err(BackendError::element_not_found(record.field_name.clone()));
        }
        Ok(())
    }

    async fn capture_screenshot(&mut self) -> Result<Vec<u8>, BackendError> {
        self.journal.push(format!("{}:screenshot", self.name));
        match &self.screenshot {
            Some(Ok(bytes)) => Ok(bytes.clone()),
            Some(Err(msg)) => Err(BackendError::Other(msg.clone())),
            None => Err(BackendError::NotSupported("capture_screenshot".into())),
        }
    }
}

#[async_trait]
impl WebCapability for MockCapability {
    async fn navigate(&mut self, url: &str) -> Result<NavigationResult, BackendError> {
        self.journal.push(format!("{}:navigate:{}", self.name, url));
        Ok(NavigationResult {
            url: url.to_string(),
            title: "mock".into(),
        })
    }
}

impl DesktopCapability for MockCapability {}

/// Defaults with every delay zeroed so tests never sleep unless they ask to.
pub fn fast_config() -> ReplayConfig {
    let mut config = ReplayConfig::default();
    config.timing.default_delay = 0.0;
    config.timing.min_delay = 0.0;
    config.error_handling.retry_delay = 0.0;
    config
}

pub fn web_record(index: usize, url: &str) -> InteractionRecord {
    InteractionRecord::new(index, "click")
        .with_process("chrome")
        .with_application("Google Chrome")
        .with_field(format!("button{}", index), "button")
        .with_url(url)
}

pub fn desktop_record(index: usize) -> InteractionRecord {
    InteractionRecord::new(index, "click")
        .with_process("EXCEL")
        .with_application("Microsoft Excel")
        .with_field(format!("cell{}", index), "edit")
}
