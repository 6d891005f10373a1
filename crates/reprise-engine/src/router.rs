//! Web/desktop classification.
//!
//! A non-blank URL is authoritative: such records go to the web backend and
//! everything else goes to the desktop backend. Records without a URL whose
//! process looks like a browser are flagged as ambiguous but still routed by
//! the URL rule.

use crate::backend::Backends;
use crate::error::ReplayError;
use reprise_common::{BackendKind, InteractionRecord};

const BROWSER_PROCESSES: &[&str] = &[
    "chrome", "chromium", "firefox", "msedge", "edge", "safari", "brave", "opera",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Routing {
    pub kind: BackendKind,
    /// Routed to the desktop although the process looks like a browser.
    pub ambiguous: bool,
}

pub fn route(record: &InteractionRecord) -> BackendKind {
    if record.url().is_some() {
        BackendKind::Web
    } else {
        BackendKind::Desktop
    }
}

pub fn classify(record: &InteractionRecord) -> Routing {
    let kind = route(record);
    let ambiguous = kind == BackendKind::Desktop
        && (looks_like_browser(&record.process_name) || looks_like_browser(&record.exe_name));
    Routing { kind, ambiguous }
}

fn looks_like_browser(name: &str) -> bool {
    let lower = name.to_lowercase();
    !lower.is_empty() && BROWSER_PROCESSES.iter().any(|b| lower.contains(b))
}

/// Backend variants needed by `records`, web first.
pub fn required_backends(records: &[InteractionRecord]) -> Vec<BackendKind> {
    [BackendKind::Web, BackendKind::Desktop]
        .into_iter()
        .filter(|kind| records.iter().any(|r| route(r) == *kind))
        .collect()
}

/// Session-start checks.
///
/// No capability at all is a configuration error. With `require_all` set, a
/// selected record routing to an absent variant is one as well; otherwise such
/// records are skipped individually when reached.
pub fn preflight(
    records: &[InteractionRecord],
    backends: &Backends,
    require_all: bool,
) -> Result<(), ReplayError> {
    if backends.is_empty() {
        return Err(ReplayError::Configuration(
            "no execution backend configured".into(),
        ));
    }
    if require_all {
        for record in records {
            let kind = route(record);
            if !backends.has(kind) {
                return Err(ReplayError::Configuration(format!(
                    "record {} routes to the {} backend, which is not configured",
                    record.index, kind
                )));
            }
        }
    }
    Ok(())
}
