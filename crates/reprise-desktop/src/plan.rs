//! Translation of a recorded desktop event into keyboard input.
//!
//! Captures carry no screen coordinates, so every action is expressed as
//! keystrokes against the activated window.

use regex::Regex;
use reprise_common::{BackendError, EventKind, InteractionRecord};
use std::sync::OnceLock;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// xdotool key combination, e.g. `ctrl+s`.
    Key(String),
    Type(String),
}

fn key(combo: &str) -> Step {
    Step::Key(combo.to_string())
}

/// Well-known button captions and the shortcut that triggers them.
const SHORTCUTS: &[(&str, &str)] = &[
    ("ok", "Return"),
    ("cancel", "Escape"),
    ("close", "alt+F4"),
    ("save", "ctrl+s"),
    ("open", "ctrl+o"),
    ("copy", "ctrl+c"),
    ("paste", "ctrl+v"),
    ("cut", "ctrl+x"),
    ("undo", "ctrl+z"),
    ("redo", "ctrl+y"),
    ("find", "ctrl+f"),
    ("new", "ctrl+n"),
    ("print", "ctrl+p"),
    ("refresh", "F5"),
    ("help", "F1"),
];

pub fn shortcut_for(caption: &str) -> Option<&'static str> {
    let normalized: String = caption
        .chars()
        .filter(|c| *c != '&')
        .collect::<String>()
        .trim()
        .trim_end_matches("...")
        .trim_end_matches('…')
        .trim()
        .to_lowercase();
    SHORTCUTS
        .iter()
        .find(|(name, _)| *name == normalized)
        .map(|(_, combo)| *combo)
}

/// xdotool keysym for a recorded key name. Combinations pass through.
pub fn keysym(name: &str) -> String {
    let trimmed = name.trim();
    let mapped = match trimmed.to_lowercase().as_str() {
        "enter" | "return" => "Return",
        "esc" | "escape" => "Escape",
        "tab" => "Tab",
        "backspace" | "back" => "BackSpace",
        "delete" | "del" => "Delete",
        "space" => "space",
        "up" => "Up",
        "down" => "Down",
        "left" => "Left",
        "right" => "Right",
        "home" => "Home",
        "end" => "End",
        "pageup" | "pgup" => "Prior",
        "pagedown" | "pgdn" => "Next",
        _ => return trimmed.to_string(),
    };
    mapped.to_string()
}

fn cell_reference() -> Option<&'static Regex> {
    static CELL: OnceLock<Option<Regex>> = OnceLock::new();
    CELL.get_or_init(|| Regex::new(r"^(?i)\$?[a-z]{1,3}\$?[0-9]{1,7}$").ok())
        .as_ref()
}

/// Spreadsheet cell address such as `B12` or `$AA$100`.
pub fn is_cell_reference(field: &str) -> bool {
    cell_reference().is_some_and(|re| re.is_match(field.trim()))
}

fn is_spreadsheet(record: &InteractionRecord) -> bool {
    let haystack = format!("{} {}", record.process_name, record.application).to_lowercase();
    haystack.contains("excel") || haystack.contains("scalc")
}

fn field_type(record: &InteractionRecord) -> String {
    record.field_type.trim().to_lowercase()
}

fn is_text_field(kind: &str) -> bool {
    matches!(kind, "edit" | "text" | "textbox" | "document" | "input")
}

fn is_dropdown(kind: &str) -> bool {
    matches!(kind, "combobox" | "combo box" | "dropdown" | "list")
}

fn is_menu(record: &InteractionRecord) -> bool {
    record.field_name.contains('>') || field_type(record).starts_with("menu")
}

/// Menu path such as `File > Save As`: Alt accelerator for the top level,
/// then the first letter of each nested item.
fn menu_steps(path: &str) -> Vec<Step> {
    let mut items = path
        .split('>')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .filter_map(|s| s.chars().find(|c| c.is_alphanumeric()))
        .map(|c| c.to_lowercase().to_string());

    let mut steps = Vec::new();
    if let Some(top) = items.next() {
        steps.push(Step::Key(format!("alt+{}", top)));
    }
    steps.extend(items.map(Step::Key));
    steps
}

/// Keystrokes replaying `record`. An empty plan means there is nothing to do
/// (focusing a text field).
pub fn plan_actions(record: &InteractionRecord) -> Result<Vec<Step>, BackendError> {
    let kind = field_type(record);
    let field = record.field_name.trim();
    let sentence = record.sentence().map(str::to_string);

    match &record.event {
        EventKind::Other(_) | EventKind::Hover => {
            return Err(BackendError::not_applicable(&record.event, record.target_name()));
        }
        EventKind::KeyPress => {
            let name = sentence.as_deref().unwrap_or(field);
            if name.trim().is_empty() {
                return Err(BackendError::not_applicable(&record.event, "record without a key"));
            }
            return Ok(vec![Step::Key(keysym(name))]);
        }
        _ => {}
    }

    if is_menu(record) && matches!(record.event, EventKind::Click | EventKind::Select) {
        let steps = menu_steps(field);
        if steps.is_empty() {
            return Err(BackendError::element_not_found(field));
        }
        return Ok(steps);
    }

    if is_spreadsheet(record) && is_cell_reference(field) {
        let mut steps = vec![key("ctrl+g"), Step::Type(field.replace('$', "")), key("Return")];
        if let Some(text) = sentence.filter(|_| record.event.takes_text()) {
            steps.push(Step::Type(text));
            steps.push(key("Return"));
        }
        return Ok(steps);
    }

    if is_dropdown(&kind) || record.event == EventKind::Select {
        let Some(value) = sentence else {
            if record.event == EventKind::Select {
                return Err(BackendError::not_applicable(&record.event, "select without a value"));
            }
            return Ok(vec![key("alt+Down")]);
        };
        return Ok(vec![key("alt+Down"), Step::Type(value), key("Return")]);
    }

    if record.event == EventKind::Type || is_text_field(&kind) {
        return match sentence {
            Some(text) if is_text_field(&kind) => Ok(vec![key("ctrl+a"), Step::Type(text)]),
            Some(text) => Ok(vec![Step::Type(text)]),
            None if record.event == EventKind::Type => Err(BackendError::not_applicable(
                &record.event,
                "type without text",
            )),
            None => Ok(Vec::new()),
        };
    }

    match &record.event {
        EventKind::Click | EventKind::DoubleClick => match shortcut_for(field) {
            Some(combo) => Ok(vec![key(combo)]),
            None => Err(BackendError::element_not_found(field)),
        },
        EventKind::RightClick => Ok(vec![key("shift+F10")]),
        _ => Err(BackendError::not_applicable(&record.event, record.target_name())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn click(field: &str, kind: &str) -> InteractionRecord {
        InteractionRecord::new(0, "click")
            .with_process("notepad")
            .with_field(field, kind)
    }

    #[test]
    fn test_button_shortcuts() {
        assert_eq!(plan_actions(&click("OK", "button")).unwrap(), vec![key("Return")]);
        assert_eq!(plan_actions(&click("&Save", "button")).unwrap(), vec![key("ctrl+s")]);
        assert_eq!(plan_actions(&click("Print...", "button")).unwrap(), vec![key("ctrl+p")]);
    }

    #[test]
    fn test_unknown_button_is_element_not_found() {
        let err = plan_actions(&click("Frobnicate", "button")).unwrap_err();
        assert_eq!(err.code(), "ELEMENT_NOT_FOUND");
    }

    #[test]
    fn test_text_field() {
        let record = InteractionRecord::new(0, "type")
            .with_field("Text Editor", "edit")
            .with_sentence("hello");
        assert_eq!(
            plan_actions(&record).unwrap(),
            vec![key("ctrl+a"), Step::Type("hello".into())]
        );
        // focusing a text field needs no input
        assert!(plan_actions(&click("Text Editor", "edit")).unwrap().is_empty());
    }

    #[test]
    fn test_dropdown() {
        let record = InteractionRecord::new(0, "select")
            .with_field("Country", "combobox")
            .with_sentence("Norway");
        assert_eq!(
            plan_actions(&record).unwrap(),
            vec![key("alt+Down"), Step::Type("Norway".into()), key("Return")]
        );
    }

    #[test]
    fn test_menu_path() {
        assert_eq!(
            plan_actions(&click("File > Save As", "menuitem")).unwrap(),
            vec![key("alt+f"), key("s")]
        );
    }

    #[test]
    fn test_excel_cell_reference() {
        let record = InteractionRecord::new(0, "type")
            .with_process("EXCEL")
            .with_field("B12", "edit")
            .with_sentence("42");
        assert_eq!(
            plan_actions(&record).unwrap(),
            vec![
                key("ctrl+g"),
                Step::Type("B12".into()),
                key("Return"),
                Step::Type("42".into()),
                key("Return")
            ]
        );
        assert!(is_cell_reference("$AA$100"));
        assert!(!is_cell_reference("Total"));
    }

    #[test]
    fn test_key_press() {
        let record = InteractionRecord::new(0, "KeyPress").with_sentence("enter");
        assert_eq!(plan_actions(&record).unwrap(), vec![key("Return")]);
        let record = InteractionRecord::new(0, "KeyPress").with_sentence("ctrl+shift+t");
        assert_eq!(plan_actions(&record).unwrap(), vec![key("ctrl+shift+t")]);
    }

    #[test]
    fn test_not_applicable_events() {
        let hover = InteractionRecord::new(0, "hover").with_field("Toolbar", "pane");
        assert_eq!(plan_actions(&hover).unwrap_err().code(), "ACTION_NOT_APPLICABLE");
        let scroll = InteractionRecord::new(0, "scroll");
        assert_eq!(plan_actions(&scroll).unwrap_err().code(), "ACTION_NOT_APPLICABLE");
    }
}
