use crate::plan::{Step, plan_actions};
use crate::xdotool::{InputDriver, WindowQuery, XdoTool};
use async_trait::async_trait;
use reprise_common::InteractionRecord;
use reprise_engine::backend::{BackendError, Capability, DesktopCapability};
use reprise_engine::config::DesktopConfig;
use std::collections::HashSet;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

const LAUNCH_POLL: Duration = Duration::from_millis(500);

/// Desktop capability injecting keyboard input into the recorded window.
pub struct DesktopBackend<D: InputDriver = XdoTool> {
    config: DesktopConfig,
    driver: D,
    ready: bool,
    /// Executables already started this session, so retries never start a
    /// second copy.
    started: HashSet<String>,
}

impl DesktopBackend<XdoTool> {
    pub fn new(config: DesktopConfig) -> Self {
        Self::with_driver(config, XdoTool::new())
    }
}

impl<D: InputDriver> DesktopBackend<D> {
    pub fn with_driver(config: DesktopConfig, driver: D) -> Self {
        Self {
            config,
            driver,
            ready: false,
            started: HashSet::new(),
        }
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    fn pause(&self) -> Duration {
        Duration::from_secs_f64(self.config.pause)
    }

    async fn guard_failsafe(&self) -> Result<(), BackendError> {
        if !self.config.failsafe {
            return Ok(());
        }
        if self.driver.pointer().await? == (0, 0) {
            return Err(BackendError::Unavailable(
                "failsafe triggered: pointer is at the screen origin".into(),
            ));
        }
        Ok(())
    }

    /// Window named by the record, falling back to its process class.
    async fn find_window(
        &self,
        record: &InteractionRecord,
    ) -> Result<Option<String>, BackendError> {
        let title = record.window_name.trim();
        if !title.is_empty()
            && let Some(id) = self.driver.search_window(WindowQuery::Title(title)).await?
        {
            return Ok(Some(id));
        }

        let class = process_class(&record.process_name);
        if !class.is_empty()
            && let Some(id) = self.driver.search_window(WindowQuery::Class(class)).await?
        {
            debug!("Matched window for record {} by process '{}'", record.index, class);
            return Ok(Some(id));
        }
        Ok(None)
    }

    /// Existing window for the record, or the window of its executable once
    /// started. Each executable is started at most once per session.
    async fn locate_window(&mut self, record: &InteractionRecord) -> Result<String, BackendError> {
        if let Some(id) = self.find_window(record).await? {
            return Ok(id);
        }

        let program = record.exe_name.trim();
        if !program.is_empty() && self.started.insert(program.to_string()) {
            info!("Starting {} for record {}", program, record.index);
            self.driver.spawn(program).await?;

            let deadline = Instant::now() + Duration::from_secs_f64(self.config.launch_timeout);
            loop {
                tokio::time::sleep(LAUNCH_POLL).await;
                if let Some(id) = self.find_window(record).await? {
                    return Ok(id);
                }
                if Instant::now() >= deadline {
                    warn!(
                        "No window appeared for {} within {}s",
                        program, self.config.launch_timeout
                    );
                    break;
                }
            }
        }

        Err(BackendError::WindowNotFound {
            window: record.target_name().to_string(),
        })
    }

    async fn perform(&self, step: &Step) -> Result<(), BackendError> {
        match step {
            Step::Key(combo) => self.driver.key(combo).await?,
            Step::Type(text) => self.driver.type_text(text, self.pause()).await?,
        }
        let pause = self.pause();
        if !pause.is_zero() {
            tokio::time::sleep(pause).await;
        }
        Ok(())
    }
}

/// Process name as an X11 window class (`EXCEL.EXE` -> `EXCEL`).
pub fn process_class(process_name: &str) -> &str {
    let name = process_name.trim();
    match name.rsplit_once('.') {
        Some((stem, ext)) if ext.eq_ignore_ascii_case("exe") => stem,
        _ => name,
    }
}

#[async_trait]
impl<D: InputDriver> Capability for DesktopBackend<D> {
    async fn launch(&mut self) -> Result<(), BackendError> {
        self.driver.check().await?;
        self.ready = true;
        info!("Desktop backend ready");
        Ok(())
    }

    async fn close(&mut self) -> Result<(), BackendError> {
        self.ready = false;
        self.started.clear();
        Ok(())
    }

    async fn is_ready(&self) -> bool {
        self.ready
    }

    async fn execute(&mut self, record: &InteractionRecord) -> Result<(), BackendError> {
        if !self.ready {
            return Err(BackendError::NotReady);
        }

        // Plan first so inapplicable records fail without touching the screen.
        let steps = plan_actions(record)?;
        if steps.is_empty() {
            debug!("Record {} needs no input", record.index);
            return Ok(());
        }

        self.guard_failsafe().await?;
        let window = self.locate_window(record).await?;
        self.driver.activate(&window).await?;

        for step in &steps {
            if let Err(e) = self.perform(step).await {
                warn!("Desktop input failed for record {}: {}", record.index, e);
                return Err(e);
            }
        }
        Ok(())
    }

    async fn capture_screenshot(&mut self) -> Result<Vec<u8>, BackendError> {
        if !self.ready {
            return Err(BackendError::NotReady);
        }
        self.driver.screenshot().await
    }
}

impl<D: InputDriver> DesktopCapability for DesktopBackend<D> {}
