pub mod loader;
pub mod schema;

pub use loader::{ConfigError, ConfigLoader};
pub use schema::{
    DesktopConfig, ErrorHandlingConfig, LoggingConfig, ReplayConfig, SeleniumConfig, TimingConfig,
};
