//! Timezone-aware timestamp handling.
//!
//! All wall-clock arithmetic in the engine happens on naive values; `Zone` is the
//! single place where those values are turned into instants, so DST gaps and
//! overlaps are resolved consistently according to the rule's [`DstPolicy`].

use chrono::{
    DateTime, Duration, LocalResult, NaiveDate, NaiveDateTime, NaiveTime, Offset, TimeZone, Utc,
};
use chrono_tz::Tz;

use crate::dst::DstPolicy;
use crate::duration::Span;
use crate::error::{Result, RuleError};

/// Wall-clock layouts accepted for date-times, tried in order.
const DATETIME_LAYOUTS: &[&str] = &[
    "%Y%m%dT%H%M%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
    "%Y%m%dT%H%M",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

const DATE_LAYOUTS: &[&str] = &["%Y%m%d", "%Y-%m-%d"];

/// A parsed input timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timestamp {
    pub instant: DateTime<Tz>,
    /// The input carried no time of day (`VALUE=DATE`).
    pub date_only: bool,
}

/// A calendar zone plus the policy used for nonexistent wall-clock values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Zone {
    tz: Tz,
    policy: DstPolicy,
}

impl Default for Zone {
    fn default() -> Self {
        Self::utc()
    }
}

impl Zone {
    /// Resolves an IANA identifier such as `America/New_York`.
    ///
    /// # Errors
    /// Returns `RuleError::InvalidTimezone` if the name is unknown.
    pub fn new(name: &str, policy: DstPolicy) -> Result<Self> {
        let tz: Tz = name
            .trim()
            .parse()
            .map_err(|_| RuleError::InvalidTimezone(name.to_string()))?;
        Ok(Self { tz, policy })
    }

    pub fn utc() -> Self {
        Self {
            tz: Tz::UTC,
            policy: DstPolicy::default(),
        }
    }

    pub fn tz(&self) -> Tz {
        self.tz
    }

    pub fn name(&self) -> &'static str {
        self.tz.name()
    }

    pub fn policy(&self) -> DstPolicy {
        self.policy
    }

    pub fn from_epoch(&self, seconds: i64) -> Option<DateTime<Tz>> {
        self.tz.timestamp_opt(seconds, 0).single()
    }

    /// Converts a wall-clock value into an instant following the DST policy.
    ///
    /// Returns `None` only for gap values under [`DstPolicy::Skip`].
    pub fn localize(&self, local: NaiveDateTime) -> Option<DateTime<Tz>> {
        match self.tz.from_local_datetime(&local) {
            LocalResult::Single(dt) => Some(dt),
            LocalResult::Ambiguous(earliest, _) => Some(earliest),
            LocalResult::None => match self.policy {
                DstPolicy::Skip => None,
                DstPolicy::ShiftForward => self.gap_end(local),
                DstPolicy::WallClock => self.wall_clock(local),
            },
        }
    }

    /// Like [`Zone::localize`] but never drops the value: gap values move to the
    /// end of the gap. Used for period boundaries.
    pub(crate) fn localize_boundary(&self, local: NaiveDateTime) -> Option<DateTime<Tz>> {
        match self.tz.from_local_datetime(&local) {
            LocalResult::Single(dt) => Some(dt),
            LocalResult::Ambiguous(earliest, _) => Some(earliest),
            LocalResult::None => self.gap_end(local),
        }
    }

    /// Like [`Zone::localize`] but gap values keep their wall-clock distance.
    /// Used for input values and span arithmetic.
    pub(crate) fn localize_lenient(&self, local: NaiveDateTime) -> Option<DateTime<Tz>> {
        match self.tz.from_local_datetime(&local) {
            LocalResult::Single(dt) => Some(dt),
            LocalResult::Ambiguous(earliest, _) => Some(earliest),
            LocalResult::None => self.wall_clock(local),
        }
    }

    /// Interprets a gap value with the offset in effect before the gap.
    fn wall_clock(&self, local: NaiveDateTime) -> Option<DateTime<Tz>> {
        let before = (1..=48).find_map(|hours| {
            let probe = local.checked_sub_signed(Duration::hours(hours))?;
            self.tz.from_local_datetime(&probe).earliest()
        })?;
        let offset = before.offset().fix().local_minus_utc();
        let utc = local.checked_sub_signed(Duration::seconds(i64::from(offset)))?;
        Some(self.tz.from_utc_datetime(&utc))
    }

    /// The first instant after the gap containing `local`.
    fn gap_end(&self, local: NaiveDateTime) -> Option<DateTime<Tz>> {
        let mut hi = (1..=48).find_map(|hours| {
            let probe = local.checked_add_signed(Duration::hours(hours))?;
            self.tz.from_local_datetime(&probe).earliest().map(|_| probe)
        })?;
        let mut lo = local;
        while (hi - lo).num_seconds() > 1 {
            let mid = lo + (hi - lo) / 2;
            if self.tz.from_local_datetime(&mid).earliest().is_some() {
                hi = mid;
            } else {
                lo = mid;
            }
        }
        self.tz.from_local_datetime(&hi).earliest()
    }

    /// Adds a span: nominal days on the wall clock, then exact seconds.
    pub fn add_span(&self, at: &DateTime<Tz>, span: Span) -> Option<DateTime<Tz>> {
        let shifted = if span.days() == 0 {
            *at
        } else {
            let local = at
                .naive_local()
                .checked_add_signed(Duration::try_days(span.days())?)?;
            self.localize_lenient(local)?
        };
        shifted.checked_add_signed(Duration::try_seconds(span.seconds())?)
    }

    /// Parses a timestamp in any accepted layout.
    ///
    /// Values with a `Z` suffix or an explicit offset are instants; everything else
    /// is a wall-clock value in this zone. `@<seconds>` reads a Unix epoch.
    pub fn parse(&self, text: &str) -> Option<Timestamp> {
        let text = text.trim();
        let instant = |instant| Timestamp {
            instant,
            date_only: false,
        };

        if let Some(epoch) = text.strip_prefix('@') {
            return self.from_epoch(epoch.parse().ok()?).map(instant);
        }
        if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
            return Some(instant(dt.with_timezone(&self.tz)));
        }

        let (body, utc) = match text.strip_suffix(['Z', 'z']) {
            Some(body) => (body, true),
            None => (text, false),
        };

        for layout in DATETIME_LAYOUTS {
            if let Ok(naive) = NaiveDateTime::parse_from_str(body, layout) {
                let dt = if utc {
                    Utc.from_utc_datetime(&naive).with_timezone(&self.tz)
                } else {
                    self.localize_lenient(naive)?
                };
                return Some(instant(dt));
            }
        }

        if utc {
            return None;
        }
        for layout in DATE_LAYOUTS {
            if let Ok(date) = NaiveDate::parse_from_str(body, layout) {
                let dt = self.localize_boundary(date.and_time(NaiveTime::MIN))?;
                return Some(Timestamp {
                    instant: dt,
                    date_only: true,
                });
            }
        }
        None
    }
}
