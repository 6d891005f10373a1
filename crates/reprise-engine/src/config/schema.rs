use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use super::loader::ConfigError;

/// Replay configuration. Every section and key is optional; unknown keys are
/// ignored so one document can be shared with other tools.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReplayConfig {
    #[serde(default)]
    pub selenium: SeleniumConfig,
    #[serde(default)]
    pub desktop_automation: DesktopConfig,
    #[serde(default)]
    pub timing: TimingConfig,
    #[serde(default)]
    pub error_handling: ErrorHandlingConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl ReplayConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.selenium.validate()?;
        self.timing.validate()?;
        self.desktop_automation.validate()?;
        if !self.error_handling.retry_delay.is_finite() || self.error_handling.retry_delay < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "error_handling.retry_delay must be >= 0, got {}",
                self.error_handling.retry_delay
            )));
        }
        Ok(())
    }
}

/// Browser (WebDriver) settings. Times are in seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeleniumConfig {
    #[serde(default = "default_implicit_wait")]
    pub implicit_wait: f64,
    #[serde(default = "default_page_load_timeout")]
    pub page_load_timeout: f64,
    #[serde(default = "default_script_timeout")]
    pub script_timeout: f64,
    #[serde(default)]
    pub headless: bool,
    /// Extra command-line arguments per browser, e.g. `chrome: ["--no-sandbox"]`.
    #[serde(default)]
    pub browser_options: HashMap<String, Vec<String>>,
    #[serde(default = "default_webdriver_url")]
    pub webdriver_url: String,
}

impl Default for SeleniumConfig {
    fn default() -> Self {
        Self {
            implicit_wait: default_implicit_wait(),
            page_load_timeout: default_page_load_timeout(),
            script_timeout: default_script_timeout(),
            headless: false,
            browser_options: HashMap::new(),
            webdriver_url: default_webdriver_url(),
        }
    }
}

impl SeleniumConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("implicit_wait", self.implicit_wait),
            ("page_load_timeout", self.page_load_timeout),
            ("script_timeout", self.script_timeout),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::Invalid(format!(
                    "selenium.{} must be >= 0, got {}",
                    name, value
                )));
            }
        }
        Ok(())
    }
}

fn default_implicit_wait() -> f64 {
    10.0
}

fn default_page_load_timeout() -> f64 {
    30.0
}

fn default_script_timeout() -> f64 {
    30.0
}

fn default_webdriver_url() -> String {
    "http://localhost:9515".to_string()
}

/// Desktop input settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DesktopConfig {
    #[serde(default)]
    pub screenshot_on_error: bool,
    /// Refuse to inject input while the pointer is parked at the screen origin.
    #[serde(default = "default_failsafe")]
    pub failsafe: bool,
    /// Pause after each injected input, in seconds.
    #[serde(default = "default_pause")]
    pub pause: f64,
    /// Match confidence for image/text based lookups, in `[0, 1]`.
    #[serde(default = "default_confidence")]
    pub confidence: f64,
    /// How long to wait for a window after starting the recorded executable,
    /// in seconds.
    #[serde(default = "default_launch_timeout")]
    pub launch_timeout: f64,
}

impl Default for DesktopConfig {
    fn default() -> Self {
        Self {
            screenshot_on_error: false,
            failsafe: default_failsafe(),
            pause: default_pause(),
            confidence: default_confidence(),
            launch_timeout: default_launch_timeout(),
        }
    }
}

impl DesktopConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.confidence) {
            return Err(ConfigError::Invalid(format!(
                "desktop_automation.confidence must be within [0, 1], got {}",
                self.confidence
            )));
        }
        for (name, value) in [("pause", self.pause), ("launch_timeout", self.launch_timeout)] {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::Invalid(format!(
                    "desktop_automation.{} must be >= 0, got {}",
                    name, value
                )));
            }
        }
        Ok(())
    }
}

fn default_failsafe() -> bool {
    true
}

fn default_pause() -> f64 {
    0.1
}

fn default_confidence() -> f64 {
    0.8
}

fn default_launch_timeout() -> f64 {
    10.0
}

/// Inter-record delay reconstruction. Delays are in seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimingConfig {
    #[serde(default = "default_delay")]
    pub default_delay: f64,
    #[serde(default = "default_max_delay")]
    pub max_delay: f64,
    #[serde(default = "default_min_delay")]
    pub min_delay: f64,
    /// > 1 replays faster than recorded, < 1 slower.
    #[serde(default = "default_speed_multiplier")]
    pub speed_multiplier: f64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            default_delay: default_delay(),
            max_delay: default_max_delay(),
            min_delay: default_min_delay(),
            speed_multiplier: default_speed_multiplier(),
        }
    }
}

impl TimingConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.speed_multiplier.is_finite() || self.speed_multiplier <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "timing.speed_multiplier must be > 0, got {}",
                self.speed_multiplier
            )));
        }
        for (name, value) in [
            ("default_delay", self.default_delay),
            ("max_delay", self.max_delay),
            ("min_delay", self.min_delay),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::Invalid(format!(
                    "timing.{} must be >= 0, got {}",
                    name, value
                )));
            }
        }
        if self.min_delay > self.max_delay {
            return Err(ConfigError::Invalid(format!(
                "timing.min_delay ({}) exceeds timing.max_delay ({})",
                self.min_delay, self.max_delay
            )));
        }
        Ok(())
    }
}

fn default_delay() -> f64 {
    1.0
}

fn default_max_delay() -> f64 {
    5.0
}

fn default_min_delay() -> f64 {
    0.1
}

fn default_speed_multiplier() -> f64 {
    1.0
}

/// Retry and failure policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorHandlingConfig {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_continue_on_error")]
    pub continue_on_error: bool,
    #[serde(default)]
    pub screenshot_on_failure: bool,
    /// Base backoff before the first retry, in seconds. Doubles per retry.
    #[serde(default = "default_retry_delay")]
    pub retry_delay: f64,
    /// Fail at session start if a selected record routes to a backend that
    /// was not supplied, instead of skipping that record.
    #[serde(default)]
    pub require_all_backends: bool,
    #[serde(default = "default_artifact_dir")]
    pub artifact_dir: PathBuf,
}

impl Default for ErrorHandlingConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            continue_on_error: default_continue_on_error(),
            screenshot_on_failure: false,
            retry_delay: default_retry_delay(),
            require_all_backends: false,
            artifact_dir: default_artifact_dir(),
        }
    }
}

impl ErrorHandlingConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs_f64(self.retry_delay.max(0.0))
    }
}

fn default_max_retries() -> u32 {
    3
}

fn default_continue_on_error() -> bool {
    true
}

fn default_retry_delay() -> f64 {
    0.5
}

fn default_artifact_dir() -> PathBuf {
    PathBuf::from("artifacts")
}

/// Consumed by the binary when installing the subscriber; the engine itself
/// only emits `tracing` events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ReplayConfig::default();
        assert_eq!(config.selenium.implicit_wait, 10.0);
        assert!(!config.selenium.headless);
        assert!(config.desktop_automation.failsafe);
        assert_eq!(config.timing.max_delay, 5.0);
        assert_eq!(config.timing.min_delay, 0.1);
        assert_eq!(config.error_handling.max_retries, 3);
        assert!(config.error_handling.continue_on_error);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_non_positive_speed() {
        let mut timing = TimingConfig::default();
        timing.speed_multiplier = 0.0;
        assert!(timing.validate().is_err());
        timing.speed_multiplier = -2.0;
        assert!(timing.validate().is_err());
        timing.speed_multiplier = f64::NAN;
        assert!(timing.validate().is_err());
    }

    #[test]
    fn test_rejects_inverted_bounds() {
        let timing = TimingConfig {
            min_delay: 3.0,
            max_delay: 1.0,
            ..Default::default()
        };
        assert!(timing.validate().is_err());
    }

    #[test]
    fn test_rejects_invalid_selenium_timeouts() {
        let mut config = ReplayConfig::default();
        config.selenium.implicit_wait = -1.0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = ReplayConfig::default();
        config.selenium.page_load_timeout = f64::NAN;
        assert!(config.validate().is_err());

        let mut config = ReplayConfig::default();
        config.selenium.script_timeout = f64::INFINITY;
        assert!(config.validate().is_err());

        let mut config = ReplayConfig::default();
        config.selenium.implicit_wait = 0.0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_out_of_range_confidence() {
        let mut config = ReplayConfig::default();
        config.desktop_automation.confidence = 1.5;
        assert!(config.validate().is_err());
    }
}
