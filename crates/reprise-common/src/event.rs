use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of a captured interaction.
///
/// Recorders disagree on naming (`LeftMouseClick`, `click`, `double_click`,
/// `KeyPress`), so labels are parsed case- and separator-insensitively into a
/// known subset. Anything unrecognised is kept verbatim in `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EventKind {
    Click,
    DoubleClick,
    RightClick,
    Type,
    KeyPress,
    Select,
    Hover,
    Other(String),
}

impl EventKind {
    pub fn parse(label: &str) -> Self {
        let norm: String = label
            .chars()
            .filter(|c| !matches!(c, ' ' | '_' | '-'))
            .flat_map(char::to_lowercase)
            .collect();

        if norm.contains("double") || norm == "dblclick" {
            EventKind::DoubleClick
        } else if (norm.contains("right") && norm.contains("click")) || norm == "contextmenu" {
            EventKind::RightClick
        } else if norm.contains("click") {
            EventKind::Click
        } else if norm.contains("select") {
            EventKind::Select
        } else if norm.contains("hover") || norm == "mouseover" {
            EventKind::Hover
        } else if norm.contains("keypress") || norm.contains("keydown") || norm == "key" {
            EventKind::KeyPress
        } else if norm.contains("type") || norm == "input" || norm == "text" {
            EventKind::Type
        } else {
            EventKind::Other(label.trim().to_string())
        }
    }

    /// Canonical label, used for display and serialization.
    pub fn as_str(&self) -> &str {
        match self {
            EventKind::Click => "click",
            EventKind::DoubleClick => "double_click",
            EventKind::RightClick => "right_click",
            EventKind::Type => "type",
            EventKind::KeyPress => "key_press",
            EventKind::Select => "select",
            EventKind::Hover => "hover",
            EventKind::Other(raw) => raw,
        }
    }

    /// Events whose payload is the record's `sentence`.
    pub fn takes_text(&self) -> bool {
        matches!(
            self,
            EventKind::Type | EventKind::KeyPress | EventKind::Select
        )
    }
}

impl Default for EventKind {
    fn default() -> Self {
        EventKind::Other(String::new())
    }
}

impl From<String> for EventKind {
    fn from(label: String) -> Self {
        EventKind::parse(&label)
    }
}

impl From<&str> for EventKind {
    fn from(label: &str) -> Self {
        EventKind::parse(label)
    }
}

impl From<EventKind> for String {
    fn from(kind: EventKind) -> Self {
        kind.as_str().to_string()
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
