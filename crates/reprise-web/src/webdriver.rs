use fantoccini::wd::TimeoutConfiguration;
use fantoccini::{Client, ClientBuilder};
use reprise_common::BackendError;
use reprise_engine::config::SeleniumConfig;
use serde_json::{Map, Value, json};
use std::time::Duration;
use tracing::{debug, info};

/// Vendor capability key for each browser family accepted in
/// `selenium.browser_options`.
fn options_key(browser: &str) -> Option<&'static str> {
    match browser.to_lowercase().as_str() {
        "chrome" | "chromium" => Some("goog:chromeOptions"),
        "firefox" => Some("moz:firefoxOptions"),
        "edge" | "msedge" => Some("ms:edgeOptions"),
        _ => None,
    }
}

fn headless_flag(key: &str) -> &'static str {
    match key {
        "moz:firefoxOptions" => "-headless",
        _ => "--headless=new",
    }
}

/// W3C capabilities for a new session.
pub fn build_capabilities(config: &SeleniumConfig) -> Map<String, Value> {
    let mut args_by_key: Vec<(&'static str, Vec<String>)> = Vec::new();

    let mut browsers: Vec<(&String, &Vec<String>)> = config.browser_options.iter().collect();
    browsers.sort_by(|a, b| a.0.cmp(b.0));
    for (browser, args) in browsers {
        match options_key(browser) {
            Some(key) => match args_by_key.iter_mut().find(|(k, _)| *k == key) {
                Some((_, existing)) => existing.extend(args.iter().cloned()),
                None => args_by_key.push((key, args.clone())),
            },
            None => debug!("Ignoring options for unknown browser '{}'", browser),
        }
    }

    if config.headless {
        if args_by_key.is_empty() {
            args_by_key.push(("goog:chromeOptions", Vec::new()));
        }
        for (key, args) in args_by_key.iter_mut() {
            let flag = headless_flag(key);
            if !args.iter().any(|a| a.starts_with(flag.split('=').next().unwrap_or(flag))) {
                args.push(flag.to_string());
            }
        }
    }

    let mut caps = Map::new();
    for (key, args) in args_by_key {
        caps.insert(key.to_string(), json!({ "args": args }));
    }
    caps
}

/// Ask the WebDriver server whether it accepts new sessions.
pub async fn probe_status(webdriver_url: &str, timeout: Duration) -> Result<(), BackendError> {
    let url = format!("{}/status", webdriver_url.trim_end_matches('/'));
    let client = reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| BackendError::Other(e.to_string()))?;

    match client.get(&url).send().await {
        Ok(resp) if resp.status().is_success() => Ok(()),
        Ok(resp) => Err(BackendError::Unavailable(format!(
            "WebDriver at {} answered {}",
            webdriver_url,
            resp.status()
        ))),
        Err(e) => Err(BackendError::Unavailable(format!(
            "WebDriver not reachable at {}: {}",
            webdriver_url, e
        ))),
    }
}

pub struct WebDriverClient {
    pub client: Client,
}

impl WebDriverClient {
    pub async fn connect(config: &SeleniumConfig) -> Result<Self, BackendError> {
        let caps = build_capabilities(config);
        let client = ClientBuilder::native()
            .capabilities(caps)
            .connect(&config.webdriver_url)
            .await
            .map_err(|e| {
                BackendError::Unavailable(format!(
                    "Failed to connect to WebDriver at {}: {}",
                    config.webdriver_url, e
                ))
            })?;

        // Element lookup polls on its own, so the server-side implicit wait
        // stays at zero.
        let timeouts = TimeoutConfiguration::new(
            Some(Duration::from_secs_f64(config.script_timeout)),
            Some(Duration::from_secs_f64(config.page_load_timeout)),
            Some(Duration::ZERO),
        );
        client
            .update_timeouts(timeouts)
            .await
            .map_err(|e| BackendError::Other(format!("Failed to set timeouts: {}", e)))?;

        info!("WebDriver session opened at {}", config.webdriver_url);
        Ok(Self { client })
    }

    pub async fn close(self) -> Result<(), BackendError> {
        self.client
            .close()
            .await
            .map_err(|e| BackendError::Other(format!("Failed to close session: {}", e)))
    }
}
