/// Field names whose typed values are never echoed to logs or reports.
const DEFAULT_SENSITIVE_FIELDS: &[&str] = &[
    "password",
    "passwd",
    "secret",
    "token",
    "cvv",
    "ssn",
    "card_number",
    "credit_card",
];

pub fn is_sensitive_field(field_name: &str) -> bool {
    let lower = field_name.to_lowercase();
    DEFAULT_SENSITIVE_FIELDS.iter().any(|f| lower.contains(f))
}

pub fn mask_sensitive(value: &str, field_name: &str) -> String {
    if is_sensitive_field(field_name) {
        "••••••••".to_string()
    } else {
        value.to_string()
    }
}

/// Shortens `value` to at most `max` characters, appending an ellipsis.
pub fn truncate(value: &str, max: usize) -> String {
    if value.chars().count() <= max {
        value.to_string()
    } else {
        let head: String = value.chars().take(max.saturating_sub(1)).collect();
        format!("{}…", head)
    }
}
