use serde::{Deserialize, Serialize};
use std::fmt;

/// The four ways an action can fail, as seen by the retry policy and the
/// result report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    ElementNotFound,
    Timeout,
    ActionNotApplicable,
    BackendUnavailable,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FailureKind::ElementNotFound => "element not found",
            FailureKind::Timeout => "timeout",
            FailureKind::ActionNotApplicable => "action not applicable",
            FailureKind::BackendUnavailable => "backend unavailable",
        };
        f.write_str(s)
    }
}

/// Errors raised by execution backends.
#[derive(thiserror::Error, Debug, Clone)]
pub enum BackendError {
    // ============================================================
    // Element Errors
    // ============================================================
    #[error("Element not found: {field}")]
    ElementNotFound { field: String },

    #[error("Window not found: {window}")]
    WindowNotFound { window: String },

    // ============================================================
    // Action Errors
    // ============================================================
    #[error("Event '{event}' cannot be applied to {target}")]
    NotApplicable { event: String, target: String },

    #[error("Option not found: {value}")]
    OptionNotFound { value: String },

    #[error("Timeout: {operation}")]
    Timeout { operation: String },

    #[error("Navigation failed: {0}")]
    Navigation(String),

    // ============================================================
    // System Errors
    // ============================================================
    #[error("Backend unavailable: {0}")]
    Unavailable(String),

    #[error("Not ready")]
    NotReady,

    #[error("Not supported: {0}")]
    NotSupported(String),

    #[error("IO error: {0}")]
    Io(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Other: {0}")]
    Other(String),
}

impl From<std::io::Error> for BackendError {
    fn from(err: std::io::Error) -> Self {
        BackendError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for BackendError {
    fn from(err: serde_json::Error) -> Self {
        BackendError::Serialization(err.to_string())
    }
}

impl BackendError {
    pub fn element_not_found(field: impl Into<String>) -> Self {
        BackendError::ElementNotFound {
            field: field.into(),
        }
    }

    pub fn timeout(operation: impl Into<String>) -> Self {
        BackendError::Timeout {
            operation: operation.into(),
        }
    }

    pub fn not_applicable(event: impl fmt::Display, target: impl Into<String>) -> Self {
        BackendError::NotApplicable {
            event: event.to_string(),
            target: target.into(),
        }
    }

    /// Stable error code for reports.
    pub fn code(&self) -> &'static str {
        match self {
            BackendError::ElementNotFound { .. } => "ELEMENT_NOT_FOUND",
            BackendError::WindowNotFound { .. } => "WINDOW_NOT_FOUND",
            BackendError::NotApplicable { .. } => "ACTION_NOT_APPLICABLE",
            BackendError::OptionNotFound { .. } => "OPTION_NOT_FOUND",
            BackendError::Timeout { .. } => "TIMEOUT",
            BackendError::Navigation(_) => "NAVIGATION_ERROR",
            BackendError::Unavailable(_) => "BACKEND_UNAVAILABLE",
            BackendError::NotReady => "NOT_READY",
            BackendError::NotSupported(_) => "NOT_SUPPORTED",
            BackendError::Io(_) => "IO_ERROR",
            BackendError::Serialization(_) => "SERIALIZATION_ERROR",
            BackendError::Other(_) => "INTERNAL_ERROR",
        }
    }

    pub fn failure_kind(&self) -> FailureKind {
        match self {
            BackendError::ElementNotFound { .. }
            | BackendError::WindowNotFound { .. }
            | BackendError::OptionNotFound { .. } => FailureKind::ElementNotFound,
            BackendError::Timeout { .. } => FailureKind::Timeout,
            BackendError::NotApplicable { .. } | BackendError::NotSupported(_) => {
                FailureKind::ActionNotApplicable
            }
            BackendError::Navigation(_)
            | BackendError::Unavailable(_)
            | BackendError::NotReady
            | BackendError::Io(_)
            | BackendError::Serialization(_)
            | BackendError::Other(_) => FailureKind::BackendUnavailable,
        }
    }

    pub fn recovery_hint(&self) -> &'static str {
        match self {
            BackendError::ElementNotFound { .. } | BackendError::OptionNotFound { .. } => {
                "Check that the page or window is in the recorded state"
            }
            BackendError::WindowNotFound { .. } => "Start the application before replaying",
            BackendError::Timeout { .. } => "Increase timeouts or lower the speed multiplier",
            BackendError::NotApplicable { .. } | BackendError::NotSupported(_) => {
                "Filter this event type out of the replay"
            }
            BackendError::Navigation(_) => "Check URL and network connectivity",
            BackendError::Unavailable(_) | BackendError::NotReady => {
                "Check that the automation backend is installed and running"
            }
            _ => "Check the backend logs",
        }
    }
}
