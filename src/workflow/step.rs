//! A workflow step as a case-insensitive, alias-tolerant JSON object.
//!
//! A step is never decoded into a typed struct. Every executor pulls
//! fields out through an accessor that checks the exact key, then each
//! declared alias, then falls back to a case-insensitive scan of every key
//! in the object. A step's field set also varies by `type`, and several
//! kinds (click/write/select/scroll/array/group_action/...) all read the
//! same locator fields (`tag`/`class`/`attr`/`value`/`text`), so a single
//! tagged `enum Step` with per-variant `#[serde(alias = ...)]` would need
//! to redeclare the same alias set on every variant and still could not
//! express "any casing of any key". `StepData` is a JSON object plus a
//! lower-cased key index instead, with typed accessor methods standing in
//! for the repeated key-lookup call sites a dynamically-typed interpreter
//! would otherwise scatter across every executor.

use std::collections::HashMap;

use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};

use crate::selector::build_css_selector;

#[derive(Debug, Clone, Default)]
pub struct StepData {
    raw: Map<String, Value>,
    /// lower-cased key -> actual key present in `raw`.
    lower: HashMap<String, String>,
}

impl StepData {
    pub fn from_map(raw: Map<String, Value>) -> Self {
        let lower = raw.keys().map(|k| (k.to_lowercase(), k.clone())).collect();
        Self { raw, lower }
    }

    pub fn from_value(value: Value) -> Option<Self> {
        value.as_object().cloned().map(Self::from_map)
    }

    /// Case-insensitive single-key lookup — the final fallback tier of
    /// `get_key`.
    pub fn get_ci(&self, key: &str) -> Option<&Value> {
        self.lower
            .get(&key.to_lowercase())
            .and_then(|actual| self.raw.get(actual))
    }

    /// `get_key(d, key, *alts)`: exact key, then each alias, in order,
    /// all matched case-insensitively.
    pub fn get_any(&self, keys: &[&str]) -> Option<&Value> {
        keys.iter().find_map(|k| self.get_ci(k))
    }

    pub fn str_any(&self, keys: &[&str]) -> Option<String> {
        self.get_any(keys).and_then(|v| match v {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        })
    }

    pub fn bool_any(&self, keys: &[&str], default: bool) -> bool {
        self.get_any(keys)
            .and_then(|v| v.as_bool().or_else(|| v.as_str().map(|s| s.eq_ignore_ascii_case("true"))))
            .unwrap_or(default)
    }

    pub fn f64_any(&self, keys: &[&str]) -> Option<f64> {
        self.get_any(keys)
            .and_then(|v| v.as_f64().or_else(|| v.as_str().and_then(|s| s.trim().parse().ok())))
    }

    pub fn u64_any(&self, keys: &[&str]) -> Option<u64> {
        self.get_any(keys)
            .and_then(|v| v.as_u64().or_else(|| v.as_str().and_then(|s| s.trim().parse().ok())))
    }

    pub fn usize_any(&self, keys: &[&str]) -> Option<usize> {
        self.u64_any(keys).map(|n| n as usize)
    }

    pub fn object_any(&self, keys: &[&str]) -> Option<StepData> {
        self.get_any(keys)
            .and_then(|v| v.as_object().cloned())
            .map(StepData::from_map)
    }

    /// `actions`/`click` lists: a JSON array of objects, or — mirroring the
    /// original's `if not isinstance(alt_clicks, list): alt_clicks = [alt_clicks]`
    /// normalization for the conditional `click` field — a single bare
    /// object is treated as a one-element list.
    pub fn array_any(&self, keys: &[&str]) -> Vec<StepData> {
        match self.get_any(keys) {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|v| v.as_object().cloned().map(StepData::from_map))
                .collect(),
            Some(Value::Object(o)) => vec![StepData::from_map(o.clone())],
            _ => Vec::new(),
        }
    }

    pub fn step_type(&self) -> Option<String> {
        self.str_any(&["type"]).map(|s| s.trim().to_lowercase())
    }

    pub fn title(&self) -> Option<String> {
        self.str_any(&["title"])
    }

    pub fn ignore(&self) -> bool {
        self.bool_any(&["ignore"], false)
    }

    /// Post-step delay, in seconds.
    pub fn sleep_secs(&self) -> Option<f64> {
        self.f64_any(&["sleep"])
    }

    pub fn timeout_ms(&self, default: u64) -> u64 {
        self.u64_any(&["timeout"]).unwrap_or(default)
    }

    pub fn selector_fields(&self) -> SelectorFields {
        SelectorFields {
            tag: self.str_any(&["tag"]),
            class: self.str_any(&["class"]),
            attr: self.str_any(ALIAS_ATTR),
            value: self.str_any(&["value"]),
            text: self.str_any(&["text"]),
            array_select_one: self.usize_any(&["array_select_one"]),
        }
    }

    /// Builds the step's CSS selector from its locator fields.
    pub fn css_selector(&self) -> String {
        let f = self.selector_fields();
        build_css_selector(
            f.tag.as_deref(),
            f.class.as_deref(),
            f.attr.as_deref(),
            f.value.as_deref(),
        )
    }

    pub fn raw(&self) -> &Map<String, Value> {
        &self.raw
    }
}

impl<'de> Deserialize<'de> for StepData {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Map::deserialize(deserializer)?;
        Ok(StepData::from_map(raw))
    }
}

/// `attr`/`arrt`/`attribute` aliasing.
pub const ALIAS_ATTR: &[&str] = &["attr", "arrt", "attribute"];

/// `write`/`value`/`text` payload aliasing for the `write` step.
pub const ALIAS_WRITE_PAYLOAD: &[&str] = &["write", "value", "text"];

/// `url`/`value` aliasing for `goto`.
pub const ALIAS_GOTO_URL: &[&str] = &["value", "url"];

/// The selector triple's source fields, plus the zero-based
/// `array_select_one` index used to pick among matches.
#[derive(Debug, Clone, Default)]
pub struct SelectorFields {
    pub tag: Option<String>,
    pub class: Option<String>,
    pub attr: Option<String>,
    pub value: Option<String>,
    pub text: Option<String>,
    pub array_select_one: Option<usize>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn step(v: Value) -> StepData {
        StepData::from_value(v).unwrap()
    }

    #[test]
    fn case_insensitive_exact_key() {
        let s = step(json!({"Type": "Click", "Title": "Save button"}));
        assert_eq!(s.step_type().as_deref(), Some("click"));
        assert_eq!(s.title().as_deref(), Some("Save button"));
    }

    #[test]
    fn alias_resolution_for_attr() {
        let s = step(json!({"type": "click", "arrt": "data-id"}));
        assert_eq!(s.str_any(ALIAS_ATTR).as_deref(), Some("data-id"));
    }

    #[test]
    fn arbitrary_casing_on_any_key_not_just_documented_alias() {
        let s = step(json!({"TYPE": "goto", "VALUE": "https://example.com"}));
        assert_eq!(s.step_type().as_deref(), Some("goto"));
        assert_eq!(s.str_any(ALIAS_GOTO_URL).as_deref(), Some("https://example.com"));
    }

    #[test]
    fn bare_object_click_list_becomes_single_element_list() {
        let cond = step(json!({
            "status": "found",
            "click": {"type": "click", "tag": "a"}
        }));
        let clicks = cond.array_any(&["click"]);
        assert_eq!(clicks.len(), 1);
        assert_eq!(clicks[0].step_type().as_deref(), Some("click"));
    }

    #[test]
    fn missing_sleep_is_none_not_zero() {
        let s = step(json!({"type": "goto"}));
        assert_eq!(s.sleep_secs(), None);
    }
}
