//! Element lookup strategies derived from a recorded field name.

use fantoccini::Locator;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    Name(String),
    Id(String),
    Css(String),
    Text(String),
    Placeholder(String),
}

impl Lookup {
    pub fn strategy(&self) -> &'static str {
        match self {
            Lookup::Name(_) => "name",
            Lookup::Id(_) => "id",
            Lookup::Css(_) => "css",
            Lookup::Text(_) => "text",
            Lookup::Placeholder(_) => "placeholder",
        }
    }

    /// Selector string in the form `locator()` expects.
    pub fn selector(&self) -> String {
        match self {
            Lookup::Name(v) => format!("[name=\"{}\"]", css_escape(v)),
            Lookup::Id(v) => v.clone(),
            Lookup::Css(v) => v.clone(),
            Lookup::Text(v) => format!(
                "//*[normalize-space(.)={lit} or @value={lit} or @aria-label={lit}]",
                lit = xpath_literal(v)
            ),
            Lookup::Placeholder(v) => format!("[placeholder=\"{}\"]", css_escape(v)),
        }
    }

    pub fn locator<'a>(&self, selector: &'a str) -> Locator<'a> {
        match self {
            Lookup::Id(_) => Locator::Id(selector),
            Lookup::Text(_) => Locator::XPath(selector),
            Lookup::Name(_) | Lookup::Css(_) | Lookup::Placeholder(_) => Locator::Css(selector),
        }
    }
}

/// Strategies to try for `field_name`, in order.
pub fn lookups_for(field_name: &str) -> Vec<Lookup> {
    let field = field_name.trim();
    if field.is_empty() {
        return Vec::new();
    }
    let mut lookups = vec![Lookup::Name(field.to_string()), Lookup::Id(field.to_string())];
    if field.contains('.') || field.contains('#') {
        lookups.push(Lookup::Css(field.to_string()));
    }
    lookups.push(Lookup::Text(field.to_string()));
    lookups.push(Lookup::Placeholder(field.to_string()));
    lookups
}

fn css_escape(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Quote `value` as an XPath string literal. XPath 1.0 has no escapes, so
/// values holding both quote kinds are spliced with `concat()`.
pub fn xpath_literal(value: &str) -> String {
    if !value.contains('\'') {
        format!("'{}'", value)
    } else if !value.contains('"') {
        format!("\"{}\"", value)
    } else {
        let parts: Vec<String> = value.split('\'').map(|p| format!("'{}'", p)).collect();
        format!("concat({})", parts.join(", \"'\", "))
    }
}

/// WebDriver code point for a named key, per the W3C key table.
pub fn webdriver_key(name: &str) -> Option<char> {
    let key = match name.trim().to_lowercase().as_str() {
        "enter" | "return" => '\u{E007}',
        "tab" => '\u{E004}',
        "escape" | "esc" => '\u{E00C}',
        "backspace" => '\u{E003}',
        "delete" | "del" => '\u{E017}',
        "space" => ' ',
        "up" | "arrowup" => '\u{E013}',
        "down" | "arrowdown" => '\u{E015}',
        "left" | "arrowleft" => '\u{E012}',
        "right" | "arrowright" => '\u{E014}',
        "home" => '\u{E011}',
        "end" => '\u{E010}',
        "pageup" => '\u{E00E}',
        "pagedown" => '\u{E00F}',
        "f5" => '\u{E035}',
        _ => return None,
    };
    Some(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_order() {
        let strategies: Vec<&str> = lookups_for("email").iter().map(Lookup::strategy).collect();
        assert_eq!(strategies, vec!["name", "id", "text", "placeholder"]);

        let strategies: Vec<&str> = lookups_for("#login .submit")
            .iter()
            .map(Lookup::strategy)
            .collect();
        assert_eq!(strategies, vec!["name", "id", "css", "text", "placeholder"]);

        assert!(lookups_for("  ").is_empty());
    }

    #[test]
    fn test_selectors_are_quoted() {
        assert_eq!(
            Lookup::Name("user\"name".into()).selector(),
            "[name=\"user\\\"name\"]"
        );
        assert_eq!(
            Lookup::Placeholder("Search".into()).selector(),
            "[placeholder=\"Search\"]"
        );
    }

    #[test]
    fn test_xpath_literal() {
        assert_eq!(xpath_literal("Sign in"), "'Sign in'");
        assert_eq!(xpath_literal("Don't"), "\"Don't\"");
        assert_eq!(
            xpath_literal("a'b\"c"),
            "concat('a', \"'\", 'b\"c')"
        );
    }

    #[test]
    fn test_webdriver_keys() {
        assert_eq!(webdriver_key("Enter"), Some('\u{E007}'));
        assert_eq!(webdriver_key(" tab "), Some('\u{E004}'));
        assert_eq!(webdriver_key("hyper"), None);
    }
}
