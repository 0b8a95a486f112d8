//! # recurrence-engine
//!
//! Lazy RFC 5545 recurrence expansion with DST-aware timezone handling.
//!
//! A rule is described by a flat set of string parameters (the RRULE parts plus
//! DTSTART, DTEND/DURATION, TZID, RDATE, EXDATE and an optional query window),
//! validated once into an immutable [`Rule`], and expanded on demand into
//! [`Occurrence`]s in chronological order. Calendar math runs on the local wall
//! clock; candidates become instants only after expansion, so a 09:00 meeting
//! stays at 09:00 across daylight-saving changes.
//!
//! ## Modules
//!
//! - [`params`] - raw parameter map, RRULE text splitting, JSON input
//! - [`rule`] - validated, immutable rule model
//! - [`window`] - query window and occurrence span resolution
//! - [`classify`] - which BY* parts expand and which limit, per frequency
//! - [`calendar`] - memoized year/month/week helpers
//! - [`expand`] - BY* expansion, limitation and BYSETPOS selection
//! - [`iter`] - the lazy occurrence iterator
//! - [`occurrence`] - formatted output records
//! - [`zone`], [`dst`] - timezone resolution and DST gap policies
//! - [`duration`] - nominal day/second spans
//! - [`config`] - output options
//! - [`error`] - error types
//!
//! ```
//! use recurrence_engine::{expand, Params};
//!
//! let params = Params::new()
//!     .set("dtstart", "20240101T090000")
//!     .set("tzid", "America/New_York")
//!     .set("rrule", "FREQ=WEEKLY;BYDAY=MO,WE;COUNT=4");
//! let occurrences = expand(&params).unwrap();
//! assert_eq!(occurrences.len(), 4);
//! assert_eq!(occurrences[1].start, "2024-01-03T09:00:00-05:00");
//! ```

pub mod calendar;
pub mod classify;
pub mod config;
pub mod dst;
pub mod duration;
pub mod error;
pub mod expand;
pub mod iter;
pub mod occurrence;
pub mod params;
pub mod rule;
pub mod window;
pub mod zone;

pub use config::{ExpandOptions, OutputFormat};
pub use dst::DstPolicy;
pub use duration::Span;
pub use error::{Result, RuleError};
pub use iter::{expand, Occurrences, Phase, Recurrence};
pub use occurrence::Occurrence;
pub use params::Params;
pub use rule::{Frequency, Rule, WeekdayNum};
pub use zone::Zone;
