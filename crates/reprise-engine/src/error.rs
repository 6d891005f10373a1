use crate::config::ConfigError;
use reprise_common::{BackendError, BackendKind};

/// Errors that escape a replay session. Record-level failures never do; they
/// are folded into the result instead.
#[derive(Debug, thiserror::Error)]
pub enum ReplayError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Failed to initialise {backend} backend: {source}")]
    BackendInit {
        backend: BackendKind,
        #[source]
        source: BackendError,
    },
}

impl From<ConfigError> for ReplayError {
    fn from(err: ConfigError) -> Self {
        ReplayError::Configuration(err.to_string())
    }
}
