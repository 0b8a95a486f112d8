//! Expansion options: output format, iteration guard, sequence numbering and the
//! DST policy.
//!
//! Options can be deserialized from JSON (every field is optional) or set through
//! the raw `format` / `max` / `sequence` / `dst` parameter keys.

use chrono::format::{Item, StrftimeItems};
use chrono::DateTime;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::dst::DstPolicy;
use crate::error::{Result, RuleError};

/// Default bound on interval passes per `next()` call.
pub const DEFAULT_MAX_ITERATIONS: u32 = 10_000;

/// How occurrence start/end values are rendered.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum OutputFormat {
    /// `2024-01-01T09:00:00+00:00`
    #[default]
    Rfc3339,
    /// iCalendar basic form: `20240101T090000`, with a `Z` suffix in UTC.
    Ical,
    /// Unix epoch seconds.
    Timestamp,
    /// A `strftime`-style pattern.
    Pattern(String),
}

impl OutputFormat {
    /// Parses a format token. Anything that is not a named format is treated as a
    /// `strftime` pattern and validated.
    ///
    /// # Errors
    /// Returns `RuleError::InvalidFormat` for an empty or malformed pattern.
    pub fn from_token(token: &str) -> Result<Self> {
        match token.trim().to_ascii_lowercase().as_str() {
            "rfc3339" | "iso8601" | "iso" => Ok(Self::Rfc3339),
            "ical" | "icalendar" | "basic" => Ok(Self::Ical),
            "timestamp" | "epoch" | "unix" => Ok(Self::Timestamp),
            _ => {
                let pattern = token.trim();
                if pattern.is_empty()
                    || StrftimeItems::new(pattern).any(|item| matches!(item, Item::Error))
                {
                    return Err(RuleError::InvalidFormat(token.to_string()));
                }
                Ok(Self::Pattern(pattern.to_string()))
            }
        }
    }

    pub fn render(&self, at: &DateTime<Tz>) -> String {
        match self {
            Self::Rfc3339 => at.to_rfc3339(),
            Self::Ical if at.timezone() == Tz::UTC => at.format("%Y%m%dT%H%M%SZ").to_string(),
            Self::Ical => at.format("%Y%m%dT%H%M%S").to_string(),
            Self::Timestamp => at.timestamp().to_string(),
            Self::Pattern(pattern) => at.format(pattern).to_string(),
        }
    }
}

impl TryFrom<String> for OutputFormat {
    type Error = RuleError;

    fn try_from(value: String) -> Result<Self> {
        Self::from_token(&value)
    }
}

impl From<OutputFormat> for String {
    fn from(format: OutputFormat) -> Self {
        match format {
            OutputFormat::Rfc3339 => "rfc3339".to_string(),
            OutputFormat::Ical => "ical".to_string(),
            OutputFormat::Timestamp => "timestamp".to_string(),
            OutputFormat::Pattern(pattern) => pattern,
        }
    }
}

/// Engine options carried by every rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExpandOptions {
    pub format: OutputFormat,
    /// Interval passes allowed per `next()` call before the search gives up.
    pub max_iterations: u32,
    /// Attach a 1-based `sequence` to every occurrence after the first.
    pub include_sequence_numbers: bool,
    pub dst_policy: DstPolicy,
}

impl Default for ExpandOptions {
    fn default() -> Self {
        Self {
            format: OutputFormat::default(),
            max_iterations: DEFAULT_MAX_ITERATIONS,
            include_sequence_numbers: false,
            dst_policy: DstPolicy::default(),
        }
    }
}

impl ExpandOptions {
    /// Reads options from a JSON object such as `{"format":"ical","max_iterations":500}`.
    ///
    /// # Errors
    /// Returns `RuleError::InvalidParams` if the JSON is malformed or a field has
    /// the wrong type.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| RuleError::InvalidParams(e.to_string()))
    }
}
