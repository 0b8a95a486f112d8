//! Error types for rule construction.
//!
//! Every variant describes a malformed rule. Runtime exhaustion and empty
//! windows are not errors: they surface as an ordinary end of sequence.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RuleError {
    #[error("Invalid timestamp for {key}: {value:?}")]
    InvalidTimestamp { key: String, value: String },

    #[error("Invalid duration: {0:?}")]
    InvalidDuration(String),

    #[error("Invalid timezone: {0}")]
    InvalidTimezone(String),

    #[error("Unknown frequency: {0:?}")]
    UnknownFrequency(String),

    #[error("Missing FREQ")]
    MissingFrequency,

    #[error("Missing DTSTART")]
    MissingStart,

    #[error("Invalid value for {key}: {value:?}")]
    InvalidValue { key: String, value: String },

    #[error("{key} value {value} is outside {min}..={max}")]
    OutOfRange {
        key: &'static str,
        value: i64,
        min: i64,
        max: i64,
    },

    #[error("Invalid weekday: {0:?}")]
    InvalidWeekday(String),

    #[error("{0} and {1} are mutually exclusive")]
    MutuallyExclusive(&'static str, &'static str),

    #[error("{part} cannot be used with FREQ={freq}")]
    IncompatiblePart { part: &'static str, freq: String },

    #[error("BYSETPOS requires another BY* rule part")]
    LoneSetPos,

    #[error("Invalid RRULE: {0}")]
    InvalidRule(String),

    #[error("RRULE part {0} appears more than once")]
    DuplicatePart(String),

    #[error("Invalid output format: {0:?}")]
    InvalidFormat(String),

    #[error("Invalid parameters: {0}")]
    InvalidParams(String),
}

pub type Result<T> = std::result::Result<T, RuleError>;
