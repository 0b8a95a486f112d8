//! The raw, case-insensitive parameter map a rule is built from.
//!
//! Keys arrive either as named parameters (`dtstart`, `count`, `format`, ...) or
//! inside an inline `rrule` value (`FREQ=WEEKLY;BYDAY=MO,WE`). Named parameters
//! win over parts extracted from the RRULE text.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::config::ExpandOptions;
use crate::error::{Result, RuleError};

/// Parts that may appear inside RRULE text.
const RRULE_PARTS: &[&str] = &[
    "freq",
    "until",
    "count",
    "interval",
    "bysecond",
    "byminute",
    "byhour",
    "byday",
    "bymonthday",
    "byyearday",
    "byweekno",
    "bymonth",
    "bysetpos",
    "wkst",
];

/// Alternate spellings folded onto their canonical key.
const ALIASES: &[(&str, &str)] = &[
    ("timezone", "tzid"),
    ("tz", "tzid"),
    ("max_iterations", "max"),
    ("exdates", "exdate"),
    ("rdates", "rdate"),
];

fn canonical_key(key: &str) -> String {
    let key = key.trim().to_ascii_lowercase();
    ALIASES
        .iter()
        .find(|(alias, _)| *alias == key)
        .map(|(_, canonical)| (*canonical).to_string())
        .unwrap_or(key)
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Params {
    entries: BTreeMap<String, String>,
    options: Option<ExpandOptions>,
}

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style [`Params::insert`].
    pub fn set(mut self, key: impl AsRef<str>, value: impl AsRef<str>) -> Self {
        self.insert(key, value);
        self
    }

    /// Inserts a parameter, lowercasing the key and trimming the value.
    pub fn insert(&mut self, key: impl AsRef<str>, value: impl AsRef<str>) {
        self.entries
            .insert(canonical_key(key.as_ref()), value.as_ref().trim().to_string());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(&canonical_key(key)).map(String::as_str)
    }

    /// Typed options used as the base before `format`/`max`/`sequence`/`dst` keys
    /// are applied.
    pub fn with_options(mut self, options: ExpandOptions) -> Self {
        self.options = Some(options);
        self
    }

    pub fn options(&self) -> Option<&ExpandOptions> {
        self.options.as_ref()
    }

    /// Reads parameters from a flat JSON object. Strings, numbers and booleans are
    /// accepted as values; arrays are joined with commas.
    ///
    /// # Errors
    /// Returns `RuleError::InvalidParams` if the input is not a JSON object of
    /// scalar (or array of scalar) values.
    pub fn from_json(json: &str) -> Result<Self> {
        let value: Value =
            serde_json::from_str(json).map_err(|e| RuleError::InvalidParams(e.to_string()))?;
        let Value::Object(map) = value else {
            return Err(RuleError::InvalidParams("expected a JSON object".to_string()));
        };

        let mut params = Params::new();
        for (key, value) in map {
            let text = match value {
                Value::Array(items) => items
                    .iter()
                    .map(scalar_text)
                    .collect::<Option<Vec<_>>>()
                    .map(|parts| parts.join(",")),
                other => scalar_text(&other),
            }
            .ok_or_else(|| RuleError::InvalidParams(format!("unsupported value for {key}")))?;
            params.insert(key, text);
        }
        Ok(params)
    }

    /// Flattens named parameters and the inline RRULE text into one map.
    ///
    /// # Errors
    /// Returns an error if the RRULE text is malformed, names an unknown part, or
    /// repeats a part.
    pub(crate) fn merged(&self) -> Result<BTreeMap<String, String>> {
        let mut merged = self.entries.clone();
        let Some(text) = self.entries.get("rrule") else {
            return Ok(merged);
        };

        for (key, value) in split_rrule(text)? {
            merged.entry(key).or_insert(value);
        }
        Ok(merged)
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Splits `FREQ=DAILY;COUNT=5` into lowercase keys and trimmed values.
pub(crate) fn split_rrule(text: &str) -> Result<Vec<(String, String)>> {
    let text = text.trim();
    let body = match text.get(..6) {
        Some(prefix) if prefix.eq_ignore_ascii_case("rrule:") => &text[6..],
        _ => text,
    };

    let mut parts: Vec<(String, String)> = Vec::new();
    for raw in body.split(';').map(str::trim).filter(|p| !p.is_empty()) {
        let (key, value) = raw
            .split_once('=')
            .ok_or_else(|| RuleError::InvalidRule(format!("expected KEY=VALUE, got {raw:?}")))?;
        let key = key.trim().to_ascii_lowercase();
        if key.starts_with("x-") {
            continue;
        }
        if !RRULE_PARTS.contains(&key.as_str()) {
            return Err(RuleError::InvalidRule(format!("unknown part {key:?}")));
        }
        if parts.iter().any(|(seen, _)| *seen == key) {
            return Err(RuleError::DuplicatePart(key.to_ascii_uppercase()));
        }
        parts.push((key, value.trim().to_string()));
    }

    if parts.is_empty() {
        return Err(RuleError::InvalidRule("empty RRULE string".to_string()));
    }
    Ok(parts)
}

impl<K: AsRef<str>, V: AsRef<str>> FromIterator<(K, V)> for Params {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = Params::new();
        for (key, value) in iter {
            params.insert(key, value);
        }
        params
    }
}
