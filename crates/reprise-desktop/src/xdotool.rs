use async_trait::async_trait;
use reprise_common::BackendError;
use std::process::{Output, Stdio};
use std::time::Duration;
use tokio::process::Command;
use tokio::sync::OnceCell;
use tracing::debug;

/// Common paths where xdotool might be installed
const XDOTOOL_PATHS: &[&str] = &["/usr/bin/xdotool", "/usr/local/bin/xdotool"];

/// Common paths where ImageMagick's `import` might be installed
const IMPORT_PATHS: &[&str] = &["/usr/bin/import", "/usr/local/bin/import"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowQuery<'a> {
    Title(&'a str),
    Class(&'a str),
}

/// OS input primitives the desktop backend is built on.
#[async_trait]
pub trait InputDriver: Send + Sync {
    /// Verify the driver can reach a display.
    async fn check(&self) -> Result<(), BackendError>;
    async fn search_window(&self, query: WindowQuery<'_>) -> Result<Option<String>, BackendError>;
    async fn activate(&self, window: &str) -> Result<(), BackendError>;
    async fn key(&self, combo: &str) -> Result<(), BackendError>;
    async fn type_text(&self, text: &str, per_key: Duration) -> Result<(), BackendError>;
    async fn pointer(&self) -> Result<(i32, i32), BackendError>;
    async fn screenshot(&self) -> Result<Vec<u8>, BackendError>;
    /// Start `program` detached; the replay never waits for it to exit.
    async fn spawn(&self, program: &str) -> Result<(), BackendError>;
}

/// Detect if we're in a headless environment (no display server)
pub fn is_headless_environment() -> bool {
    std::env::var("DISPLAY").is_err() && std::env::var("WAYLAND_DISPLAY").is_err()
}

/// Find `name` on PATH, then in `fallbacks`.
pub async fn find_binary(name: &str, fallbacks: &[&str]) -> Option<String> {
    if let Ok(output) = Command::new("which").arg(name).output().await
        && output.status.success()
        && let Ok(path) = String::from_utf8(output.stdout)
    {
        let path = path.trim();
        if !path.is_empty() {
            return Some(path.to_string());
        }
    }

    fallbacks
        .iter()
        .find(|p| std::path::Path::new(p).exists())
        .map(|p| p.to_string())
}

/// Parse `xdotool getmouselocation --shell` output.
pub fn parse_mouse_location(output: &str) -> Option<(i32, i32)> {
    let mut x = None;
    let mut y = None;
    for line in output.lines() {
        match line.split_once('=') {
            Some(("X", v)) => x = v.trim().parse().ok(),
            Some(("Y", v)) => y = v.trim().parse().ok(),
            _ => {}
        }
    }
    Some((x?, y?))
}

/// Escape a window title for xdotool's regex search.
pub fn title_pattern(title: &str) -> String {
    format!("^{}$", regex::escape(title.trim()))
}

#[derive(Debug, Default)]
struct Binaries {
    xdotool: Option<String>,
    import: Option<String>,
}

/// X11 driver shelling out to `xdotool` and ImageMagick `import`.
///
/// Binaries are located on first use, so construction never fails.
#[derive(Debug, Default)]
pub struct XdoTool {
    binaries: OnceCell<Binaries>,
}

impl XdoTool {
    pub fn new() -> Self {
        Self::default()
    }

    async fn binaries(&self) -> &Binaries {
        self.binaries
            .get_or_init(|| async {
                Binaries {
                    xdotool: find_binary("xdotool", XDOTOOL_PATHS).await,
                    import: find_binary("import", IMPORT_PATHS).await,
                }
            })
            .await
    }

    async fn run(&self, args: &[&str]) -> Result<Output, BackendError> {
        let binary = self
            .binaries()
            .await
            .xdotool
            .as_deref()
            .ok_or_else(|| BackendError::Unavailable("xdotool not found on PATH".into()))?;
        debug!("xdotool {}", args.join(" "));
        Ok(Command::new(binary).args(args).output().await?)
    }

    async fn run_checked(&self, args: &[&str]) -> Result<Output, BackendError> {
        let output = self.run(args).await?;
        if !output.status.success() {
            return Err(BackendError::Other(format!(
                "xdotool {} failed: {}",
                args.first().copied().unwrap_or_default(),
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(output)
    }
}

#[async_trait]
impl InputDriver for XdoTool {
    async fn check(&self) -> Result<(), BackendError> {
        if is_headless_environment() {
            return Err(BackendError::Unavailable(
                "no display server (DISPLAY is not set)".into(),
            ));
        }
        self.run_checked(&["getdisplaygeometry"]).await?;
        Ok(())
    }

    async fn search_window(&self, query: WindowQuery<'_>) -> Result<Option<String>, BackendError> {
        let output = match query {
            WindowQuery::Title(title) => {
                let pattern = title_pattern(title);
                self.run(&["search", "--onlyvisible", "--name", &pattern]).await?
            }
            WindowQuery::Class(class) => {
                self.run(&["search", "--onlyvisible", "--class", class]).await?
            }
        };
        // exit status 1 just means nothing matched
        if !output.status.success() {
            return Ok(None);
        }
        Ok(String::from_utf8_lossy(&output.stdout)
            .lines()
            .map(str::trim)
            .find(|l| !l.is_empty())
            .map(str::to_string))
    }

    async fn activate(&self, window: &str) -> Result<(), BackendError> {
        self.run_checked(&["windowactivate", "--sync", window])
            .await?;
        Ok(())
    }

    async fn key(&self, combo: &str) -> Result<(), BackendError> {
        self.run_checked(&["key", "--clearmodifiers", combo])
            .await?;
        Ok(())
    }

    async fn type_text(&self, text: &str, per_key: Duration) -> Result<(), BackendError> {
        let delay = per_key.as_millis().to_string();
        self.run_checked(&["type", "--clearmodifiers", "--delay", &delay, "--", text])
            .await?;
        Ok(())
    }

    async fn pointer(&self) -> Result<(i32, i32), BackendError> {
        let output = self.run_checked(&["getmouselocation", "--shell"]).await?;
        parse_mouse_location(&String::from_utf8_lossy(&output.stdout))
            .ok_or_else(|| BackendError::Other("unreadable pointer location".into()))
    }

    async fn screenshot(&self) -> Result<Vec<u8>, BackendError> {
        let Some(import) = self.binaries().await.import.as_deref() else {
            return Err(BackendError::NotSupported(
                "screenshot (ImageMagick import not found)".into(),
            ));
        };
        let output = Command::new(import)
            .args(["-window", "root", "png:-"])
            .output()
            .await?;
        if !output.status.success() || output.stdout.is_empty() {
            return Err(BackendError::Other(format!(
                "Screenshot failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(output.stdout)
    }

    async fn spawn(&self, program: &str) -> Result<(), BackendError> {
        debug!("Starting {}", program);
        Command::new(program)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| BackendError::Unavailable(format!("failed to start {}: {}", program, e)))?;
        Ok(())
    }
}
