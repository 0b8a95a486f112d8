//! Output records.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::Serialize;

use crate::config::ExpandOptions;

/// One concrete instance of a recurring event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Occurrence {
    /// Start rendered with the rule's output format.
    pub start: String,
    /// End rendered with the rule's output format.
    pub end: String,
    /// The start instant in UTC basic form (`20240101T090000Z`).
    pub recurrence_id: String,
    /// 1-based position among all instances; absent for the first one or when
    /// sequence numbers are disabled.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sequence: Option<u32>,
    #[serde(skip)]
    pub start_at: DateTime<Tz>,
    #[serde(skip)]
    pub end_at: DateTime<Tz>,
}

impl Occurrence {
    /// Formats the instance at zero-based `index`.
    pub(crate) fn new(
        start: DateTime<Tz>,
        end: DateTime<Tz>,
        index: u32,
        options: &ExpandOptions,
    ) -> Self {
        Self {
            start: options.format.render(&start),
            end: options.format.render(&end),
            recurrence_id: recurrence_id(&start),
            sequence: (options.include_sequence_numbers && index > 0).then(|| index + 1),
            start_at: start,
            end_at: end,
        }
    }
}

/// Canonical RECURRENCE-ID form of an instant.
pub fn recurrence_id(at: &DateTime<Tz>) -> String {
    at.with_timezone(&Utc).format("%Y%m%dT%H%M%SZ").to_string()
}
