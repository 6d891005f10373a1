use crate::locator::{lookups_for, webdriver_key};
use crate::webdriver::{WebDriverClient, probe_status};
use async_trait::async_trait;
use fantoccini::Client;
use fantoccini::elements::Element;
use fantoccini::error::CmdError;
use reprise_common::formatter::mask_sensitive;
use reprise_common::{EventKind, InteractionRecord};
use reprise_engine::backend::{BackendError, Capability, NavigationResult, WebCapability};
use reprise_engine::config::SeleniumConfig;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info};
use url::Url;

const POLL_INTERVAL: Duration = Duration::from_millis(250);
const STATUS_TIMEOUT: Duration = Duration::from_secs(5);

/// Web capability backed by a W3C WebDriver server.
pub struct WebDriverBackend {
    config: SeleniumConfig,
    client: Option<WebDriverClient>,
}

impl WebDriverBackend {
    pub fn new(config: SeleniumConfig) -> Self {
        Self {
            config,
            client: None,
        }
    }

    fn client(&self) -> Result<&Client, BackendError> {
        self.client
            .as_ref()
            .map(|c| &c.client)
            .ok_or(BackendError::NotReady)
    }

    /// Try every lookup strategy until one matches or `implicit_wait` runs out.
    async fn find(&self, field: &str) -> Result<Element, BackendError> {
        let client = self.client()?;
        let lookups = lookups_for(field);
        if lookups.is_empty() {
            return Err(BackendError::element_not_found(field));
        }

        let deadline = Instant::now() + Duration::from_secs_f64(self.config.implicit_wait);
        loop {
            for lookup in &lookups {
                let selector = lookup.selector();
                match client.find_all(lookup.locator(&selector)).await {
                    Ok(found) => {
                        if let Some(element) = found.into_iter().next() {
                            debug!("Found '{}' by {}", field, lookup.strategy());
                            return Ok(element);
                        }
                    }
                    Err(e) => debug!(
                        "Lookup by {} failed for '{}': {}",
                        lookup.strategy(),
                        field,
                        e
                    ),
                }
            }
            if Instant::now() >= deadline {
                return Err(BackendError::element_not_found(field));
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    /// Record target, or the focused element when the record names none.
    async fn target_or_active(&self, record: &InteractionRecord) -> Result<Element, BackendError> {
        if record.field_name.trim().is_empty() {
            self.client()?
                .active_element()
                .await
                .map_err(|e| map_cmd_error(e, "active element"))
        } else {
            self.find(&record.field_name).await
        }
    }

    async fn dispatch(&self, element: &Element, event: &str) -> Result<(), BackendError> {
        let script = format!(
            "arguments[0].dispatchEvent(new MouseEvent('{}', {{bubbles: true, cancelable: true, view: window, button: {}}}));",
            event,
            if event == "contextmenu" { 2 } else { 0 }
        );
        let arg = serde_json::to_value(element)?;
        self.client()?
            .execute(&script, vec![arg])
            .await
            .map_err(|e| map_cmd_error(e, event))?;
        Ok(())
    }

    async fn type_text(&self, record: &InteractionRecord) -> Result<(), BackendError> {
        let text = record.sentence().unwrap_or_default();
        let element = self.target_or_active(record).await?;
        // read-only or detached inputs reject clear; typing still proceeds
        if let Err(e) = element.clear().await {
            debug!("Could not clear '{}': {}", record.field_name, e);
        }
        debug!(
            "Typing '{}' into '{}'",
            mask_sensitive(text, &record.field_name),
            record.field_name
        );
        element
            .send_keys(text)
            .await
            .map_err(|e| map_cmd_error(e, "type"))
    }

    async fn press_key(&self, record: &InteractionRecord) -> Result<(), BackendError> {
        let raw = record.sentence().unwrap_or(record.field_name.as_str()).trim();
        if raw.is_empty() {
            return Err(BackendError::not_applicable(&record.event, "record without a key"));
        }
        let keys = match webdriver_key(raw) {
            Some(key) => key.to_string(),
            None => raw.to_string(),
        };
        let element = self
            .client()?
            .active_element()
            .await
            .map_err(|e| map_cmd_error(e, "active element"))?;
        element
            .send_keys(&keys)
            .await
            .map_err(|e| map_cmd_error(e, "key press"))
    }

    async fn select(&self, record: &InteractionRecord) -> Result<(), BackendError> {
        let Some(value) = record.sentence() else {
            return Err(BackendError::not_applicable(&record.event, "select without a value"));
        };
        let element = self.find(&record.field_name).await?;
        if element.select_by_label(value).await.is_ok() {
            return Ok(());
        }
        element
            .select_by_value(value)
            .await
            .map_err(|_| BackendError::OptionNotFound {
                value: value.to_string(),
            })
    }
}

/// Classify a WebDriver command error.
pub fn map_cmd_error(err: CmdError, context: &str) -> BackendError {
    if err.is_no_such_element() {
        return BackendError::element_not_found(context);
    }
    let message = err.to_string();
    let lower = message.to_lowercase();
    if lower.contains("timeout") || lower.contains("timed out") {
        BackendError::timeout(context)
    } else {
        BackendError::Other(format!("{}: {}", context, message))
    }
}

/// Accept absolute http(s) and file URLs only.
pub fn validate_url(raw: &str) -> Result<Url, BackendError> {
    let url = Url::parse(raw.trim())
        .map_err(|e| BackendError::Navigation(format!("invalid URL '{}': {}", raw, e)))?;
    match url.scheme() {
        "http" | "https" | "file" => Ok(url),
        other => Err(BackendError::Navigation(format!(
            "unsupported URL scheme '{}' in '{}'",
            other, raw
        ))),
    }
}

#[async_trait]
impl Capability for WebDriverBackend {
    async fn launch(&mut self) -> Result<(), BackendError> {
        info!("Connecting to WebDriver at {}...", self.config.webdriver_url);
        probe_status(&self.config.webdriver_url, STATUS_TIMEOUT).await?;
        self.client = Some(WebDriverClient::connect(&self.config).await?);
        Ok(())
    }

    async fn close(&mut self) -> Result<(), BackendError> {
        if let Some(client) = self.client.take() {
            client.close().await?;
        }
        Ok(())
    }

    async fn is_ready(&self) -> bool {
        self.client.is_some()
    }

    async fn execute(&mut self, record: &InteractionRecord) -> Result<(), BackendError> {
        match &record.event {
            EventKind::Click => {
                let element = self.find(&record.field_name).await?;
                element
                    .click()
                    .await
                    .map_err(|e| map_cmd_error(e, &record.field_name))
            }
            EventKind::DoubleClick => {
                let element = self.find(&record.field_name).await?;
                self.dispatch(&element, "dblclick").await
            }
            EventKind::RightClick => {
                let element = self.find(&record.field_name).await?;
                self.dispatch(&element, "contextmenu").await
            }
            EventKind::Hover => {
                let element = self.find(&record.field_name).await?;
                self.dispatch(&element, "mouseover").await
            }
            EventKind::Type => self.type_text(record).await,
            EventKind::KeyPress => self.press_key(record).await,
            EventKind::Select => self.select(record).await,
            EventKind::Other(_) => Err(BackendError::not_applicable(
                &record.event,
                record.target_name(),
            )),
        }
    }

    async fn capture_screenshot(&mut self) -> Result<Vec<u8>, BackendError> {
        self.client()?
            .screenshot()
            .await
            .map_err(|e| BackendError::Other(format!("Screenshot failed: {}", e)))
    }
}

#[async_trait]
impl WebCapability for WebDriverBackend {
    async fn navigate(&mut self, url: &str) -> Result<NavigationResult, BackendError> {
        let target = validate_url(url)?;
        let client = self.client()?;

        info!("Navigating to: {}", target);
        client.goto(target.as_str()).await.map_err(|e| {
            match map_cmd_error(e, "page load") {
                BackendError::Other(msg) => BackendError::Navigation(msg),
                other => other,
            }
        })?;

        let title = client.title().await.unwrap_or_default();
        let current = client
            .current_url()
            .await
            .map(|u| u.to_string())
            .unwrap_or_else(|_| target.to_string());
        Ok(NavigationResult {
            url: current,
            title,
        })
    }
}
