use async_trait::async_trait;
pub use reprise_common::error::BackendError;
use reprise_common::{BackendKind, InteractionRecord};

#[derive(Debug, Clone)]
pub struct NavigationResult {
    pub url: String,
    pub title: String,
}

/// Contract shared by every execution backend.
///
/// `execute` may be called again for the same record after a failure, so
/// implementations must not keep per-attempt state that a retry would trip
/// over.
#[async_trait]
pub trait Capability: Send + Sync {
    /// Acquire the underlying automation resource (browser session, display).
    async fn launch(&mut self) -> Result<(), BackendError>;

    /// Release the resource.
    async fn close(&mut self) -> Result<(), BackendError>;

    /// Check if the backend is ready to accept actions.
    async fn is_ready(&self) -> bool;

    /// Perform the record's action.
    async fn execute(&mut self, record: &InteractionRecord) -> Result<(), BackendError>;

    /// Capture the current screen or viewport as PNG bytes.
    async fn capture_screenshot(&mut self) -> Result<Vec<u8>, BackendError> {
        Err(BackendError::NotSupported("capture_screenshot".into()))
    }
}

/// Browser-backed execution.
#[async_trait]
pub trait WebCapability: Capability {
    /// Load `url` before the record's action.
    async fn navigate(&mut self, url: &str) -> Result<NavigationResult, BackendError>;
}

/// OS-level input execution.
pub trait DesktopCapability: Capability {}

/// The capabilities owned by one session. Either may be absent.
#[derive(Default)]
pub struct Backends {
    web: Option<Box<dyn WebCapability>>,
    desktop: Option<Box<dyn DesktopCapability>>,
}

impl Backends {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_web(mut self, web: impl WebCapability + 'static) -> Self {
        self.web = Some(Box::new(web));
        self
    }

    pub fn with_desktop(mut self, desktop: impl DesktopCapability + 'static) -> Self {
        self.desktop = Some(Box::new(desktop));
        self
    }

    pub fn set_web(&mut self, web: Box<dyn WebCapability>) {
        self.web = Some(web);
    }

    pub fn set_desktop(&mut self, desktop: Box<dyn DesktopCapability>) {
        self.desktop = Some(desktop);
    }

    pub fn has(&self, kind: BackendKind) -> bool {
        match kind {
            BackendKind::Web => self.web.is_some(),
            BackendKind::Desktop => self.desktop.is_some(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.web.is_none() && self.desktop.is_none()
    }

    pub fn get_mut(&mut self, kind: BackendKind) -> Option<ActiveBackend<'_>> {
        match kind {
            BackendKind::Web => match self.web.as_mut() {
                Some(web) => Some(ActiveBackend::Web(web.as_mut())),
                None => None,
            },
            BackendKind::Desktop => match self.desktop.as_mut() {
                Some(desktop) => Some(ActiveBackend::Desktop(desktop.as_mut())),
                None => None,
            },
        }
    }
}

/// Borrowed handle to the capability a record was routed to.
pub enum ActiveBackend<'a> {
    Web(&'a mut dyn WebCapability),
    Desktop(&'a mut dyn DesktopCapability),
}

impl ActiveBackend<'_> {
    pub fn kind(&self) -> BackendKind {
        match self {
            ActiveBackend::Web(_) => BackendKind::Web,
            ActiveBackend::Desktop(_) => BackendKind::Desktop,
        }
    }

    pub async fn launch(&mut self) -> Result<(), BackendError> {
        match self {
            ActiveBackend::Web(b) => b.launch().await,
            ActiveBackend::Desktop(b) => b.launch().await,
        }
    }

    pub async fn close(&mut self) -> Result<(), BackendError> {
        match self {
            ActiveBackend::Web(b) => b.close().await,
            ActiveBackend::Desktop(b) => b.close().await,
        }
    }

    pub async fn execute(&mut self, record: &InteractionRecord) -> Result<(), BackendError> {
        match self {
            ActiveBackend::Web(b) => b.execute(record).await,
            ActiveBackend::Desktop(b) => b.execute(record).await,
        }
    }

    pub async fn capture_screenshot(&mut self) -> Result<Vec<u8>, BackendError> {
        match self {
            ActiveBackend::Web(b) => b.capture_screenshot().await,
            ActiveBackend::Desktop(b) => b.capture_screenshot().await,
        }
    }
}
