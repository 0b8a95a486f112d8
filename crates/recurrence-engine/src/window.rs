//! Query window and occurrence span resolution.

use chrono::{DateTime, NaiveTime};
use chrono_tz::Tz;

use crate::duration::Span;
use crate::zone::{Timestamp, Zone};

/// The half-open `[after, before)` window an expansion is restricted to.
///
/// `after` is compared against occurrence *ends*: an occurrence that started
/// earlier but is still running at `after` is kept. `before` is compared against
/// starts. UNTIL folds into the bound that applies to rule-generated starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Window {
    after: Option<DateTime<Tz>>,
    before: Option<DateTime<Tz>>,
    rule_end: Option<DateTime<Tz>>,
}

impl Window {
    pub fn new(
        after: Option<DateTime<Tz>>,
        before: Option<DateTime<Tz>>,
        until: Option<DateTime<Tz>>,
    ) -> Self {
        let rule_end = match (before, until) {
            (Some(b), Some(u)) => Some(b.min(u)),
            (b, u) => b.or(u),
        };
        Self {
            after,
            before,
            rule_end,
        }
    }

    pub fn after(&self) -> Option<DateTime<Tz>> {
        self.after
    }

    pub fn before(&self) -> Option<DateTime<Tz>> {
        self.before
    }

    /// Exclusive bound on starts generated by the rule: `min(before, UNTIL)`.
    pub fn rule_end(&self) -> Option<DateTime<Tz>> {
        self.rule_end
    }

    pub fn admits_end(&self, end: &DateTime<Tz>) -> bool {
        self.after.is_none_or(|after| *end >= after)
    }

    pub fn admits_start(&self, start: &DateTime<Tz>) -> bool {
        self.before.is_none_or(|before| *start < before)
    }

    pub fn admits_rule_start(&self, start: &DateTime<Tz>) -> bool {
        self.rule_end.is_none_or(|end| *start < end)
    }
}

/// Derives the span of every occurrence from the anchor event.
///
/// An explicit DURATION wins. Otherwise DTEND - DTSTART, expressed in whole
/// nominal days when both fall on local midnight so that all-day events keep
/// their shape across DST changes. A bare-date DTSTART with neither lasts one
/// day; anything else has no span.
pub fn resolve_span(
    zone: &Zone,
    start: &Timestamp,
    end: Option<&Timestamp>,
    duration: Option<Span>,
) -> Span {
    if let Some(duration) = duration {
        return duration;
    }
    match end {
        Some(end) => {
            let start_local = start.instant.naive_local();
            let end_local = end.instant.with_timezone(&zone.tz()).naive_local();
            if start_local.time() == NaiveTime::MIN && end_local.time() == NaiveTime::MIN {
                Span::from_days((end_local.date() - start_local.date()).num_days())
            } else {
                Span::between(&start.instant, &end.instant)
            }
        }
        None if start.date_only => Span::from_days(1),
        None => Span::ZERO,
    }
}

