//! CSS selector construction from a step's `(tag, class, attr, value)`
//! fields.

/// Normalizes a whitespace-separated class list (optionally already
/// dot-prefixed) into a dotted CSS class selector fragment, e.g.
/// `"foo bar"` -> `".foo.bar"`. Returns `""` for `None`/empty input.
pub fn normalize_class_selector(class: Option<&str>) -> String {
    let Some(raw) = class else {
        return String::new();
    };
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return String::new();
    }
    if trimmed.starts_with('.') {
        return trimmed.to_string();
    }
    let parts: Vec<&str> = trimmed.split_whitespace().collect();
    if parts.is_empty() {
        String::new()
    } else {
        format!(".{}", parts.join("."))
    }
}

/// Builds a CSS selector from a step's tag/class/attr/value fields.
///
/// - Missing tag defaults to `*`.
/// - `attr` with a `value` becomes `[attr="value"]`; `attr` alone becomes
///   `[attr]`.
pub fn build_css_selector(
    tag: Option<&str>,
    class: Option<&str>,
    attr: Option<&str>,
    value: Option<&str>,
) -> String {
    let tag = tag.map(str::trim).filter(|t| !t.is_empty()).unwrap_or("*");
    let class_part = normalize_class_selector(class);
    let attr_part = match (attr, value) {
        (Some(a), Some(v)) => format!("[{a}=\"{v}\"]"),
        (Some(a), None) => format!("[{a}]"),
        (None, _) => String::new(),
    };
    format!("{tag}{class_part}{attr_part}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_tag_to_wildcard() {
        assert_eq!(build_css_selector(None, None, None, None), "*");
    }

    #[test]
    fn dotted_class_list() {
        assert_eq!(
            build_css_selector(Some("div"), Some("foo bar"), None, None),
            "div.foo.bar"
        );
    }

    #[test]
    fn class_already_dotted_is_kept_verbatim() {
        assert_eq!(
            build_css_selector(Some("div"), Some(".foo.bar"), None, None),
            "div.foo.bar"
        );
    }

    #[test]
    fn attr_with_value() {
        assert_eq!(
            build_css_selector(Some("input"), None, Some("name"), Some("email")),
            "input[name=\"email\"]"
        );
    }

    #[test]
    fn attr_without_value() {
        assert_eq!(
            build_css_selector(Some("input"), None, Some("disabled"), None),
            "input[disabled]"
        );
    }

    #[test]
    fn combines_class_and_attr() {
        assert_eq!(
            build_css_selector(Some("a"), Some("link active"), Some("href"), Some("/x")),
            "a.link.active[href=\"/x\"]"
        );
    }

    #[test]
    fn blank_class_is_ignored() {
        assert_eq!(build_css_selector(Some("span"), Some("   "), None, None), "span");
    }
}
