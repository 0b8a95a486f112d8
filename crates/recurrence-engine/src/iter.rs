//! The iterator core.
//!
//! [`Occurrences`] pulls one interval of the rule at a time, expands it into
//! candidates, and merges the result with pending RDATE entries in start order.
//! Nothing is computed ahead beyond the current interval.

use std::collections::VecDeque;

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, Offset};
use chrono_tz::Tz;
use tracing::{debug, trace};

use crate::calendar::Calendar;
use crate::error::{Result, RuleError};
use crate::expand::interval_candidates;
use crate::occurrence::Occurrence;
use crate::params::Params;
use crate::rule::{Frequency, Rule};

/// Months or years skipped at most while looking for one containing the anchor
/// day (e.g. the 31st, or Feb 29).
const MAX_DAY_SKIPS: u32 = 1_000;

/// Margin, in seconds, kept between a fast-forward target and `after`.
const FAST_FORWARD_MARGIN: i64 = 3_600;

/// Iteration session states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// No `next()` call yet.
    Ready,
    /// The last call returned an occurrence.
    Producing,
    /// Searching the next interval.
    Advancing,
    /// Terminal: no further occurrences.
    Exhausted,
    /// Terminal: the rule failed validation.
    Errored,
}

/// Where an occurrence comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Source {
    /// DTSTART itself, always the first rule instance unless excluded.
    Start,
    /// A date produced by expanding an interval.
    Cached(DateTime<Tz>),
    /// An RDATE entry with its end already resolved.
    RDate {
        start: DateTime<Tz>,
        end: DateTime<Tz>,
    },
}

impl Source {
    fn start(&self, rule: &Rule) -> DateTime<Tz> {
        match self {
            Source::Start => rule.start(),
            Source::Cached(at) => *at,
            Source::RDate { start, .. } => *start,
        }
    }
}

enum Cursor {
    At(NaiveDateTime),
    /// The anchor day does not exist in this month or year.
    Missing,
    Overflow,
}

/// Mutable state of one iteration session. Owned by a single [`Occurrences`].
#[derive(Debug, Clone)]
pub struct IteratorState {
    phase: Phase,
    current_date: NaiveDateTime,
    iteration: i64,
    primed: bool,
    current_count: u32,
    rule_count: u32,
    start_pending: bool,
    rule_done: bool,
    /// Latest rule instant handed out; later candidates must exceed it.
    floor: DateTime<Tz>,
    lookahead: Option<Source>,
    cached_dates: VecDeque<DateTime<Tz>>,
    cached_rdates: VecDeque<(DateTime<Tz>, DateTime<Tz>)>,
    calendar: Calendar,
}

impl IteratorState {
    fn new(rule: &Rule) -> Self {
        let cached_rdates = rule
            .rdates()
            .iter()
            .filter(|r| rule.window().admits_start(&r.start))
            .filter_map(|r| Some((r.start, r.end_at(rule.zone(), rule.span())?)))
            .collect();

        Self {
            phase: Phase::Ready,
            current_date: rule.start().naive_local(),
            iteration: 0,
            primed: false,
            current_count: 0,
            rule_count: 0,
            start_pending: true,
            rule_done: false,
            floor: rule.start(),
            lookahead: None,
            cached_dates: VecDeque::new(),
            cached_rdates,
            calendar: Calendar::new(*rule.zone(), rule.wkst()),
        }
    }

    fn next_occurrence(&mut self, rule: &Rule) -> Option<Occurrence> {
        loop {
            if self.phase == Phase::Exhausted {
                return None;
            }
            if self.lookahead.is_none() && !self.rule_done {
                self.lookahead = self.next_rule_source(rule);
                self.rule_done = self.lookahead.is_none();
            }

            let source = match (self.lookahead, self.cached_rdates.front().copied()) {
                (None, None) => {
                    self.phase = Phase::Exhausted;
                    return None;
                }
                (Some(next), Some((start, end))) if start <= next.start(rule) => {
                    if start == next.start(rule) {
                        self.lookahead = None;
                    }
                    self.cached_rdates.pop_front();
                    Source::RDate { start, end }
                }
                (Some(next), _) => {
                    self.lookahead = None;
                    next
                }
                (None, Some((start, end))) => {
                    self.cached_rdates.pop_front();
                    Source::RDate { start, end }
                }
            };

            self.phase = Phase::Producing;
            let index = self.current_count;
            self.current_count += 1;
            if let Some(occurrence) = resolve(rule, source, index) {
                return Some(occurrence);
            }
        }
    }

    /// The next instance generated by the rule itself, honouring COUNT.
    fn next_rule_source(&mut self, rule: &Rule) -> Option<Source> {
        if rule.count().is_some_and(|count| self.rule_count >= count) {
            return None;
        }

        if self.start_pending {
            self.start_pending = false;
            let start = rule.start();
            if rule.window().admits_rule_start(&start) && !rule.is_excluded(&start) {
                self.rule_count += 1;
                return Some(Source::Start);
            }
        }

        loop {
            if let Some(at) = self.cached_dates.pop_front() {
                self.rule_count += 1;
                return Some(Source::Cached(at));
            }
            if !self.advance(rule) {
                return None;
            }
        }
    }

    /// Searches forward interval by interval until one yields candidates.
    /// Returns `false` once the rule can produce nothing more.
    fn advance(&mut self, rule: &Rule) -> bool {
        self.phase = Phase::Advancing;
        let max_iterations = rule.options().max_iterations;
        let mut passes: u32 = 0;

        loop {
            if self.primed {
                if !self.step(rule) {
                    return false;
                }
            } else {
                self.primed = true;
            }

            if self.out_of_range(rule) {
                trace!(cursor = %self.current_date, "cursor past the end of the range");
                return false;
            }
            if self.not_in_range(rule) {
                self.fast_forward(rule);
                continue;
            }

            let found = self.collect_candidates(rule);
            if !found.is_empty() {
                trace!(cursor = %self.current_date, found = found.len(), "expanded interval");
                if let Some(last) = found.last() {
                    self.floor = *last;
                }
                self.cached_dates.extend(found);
                return true;
            }

            passes += 1;
            if passes >= max_iterations {
                debug!(
                    rule_id = rule.id(),
                    max_iterations,
                    cursor = %self.current_date,
                    "iteration guard reached without a match; ending rule expansion"
                );
                return false;
            }
        }
    }

    /// Moves the cursor one interval forward, skipping months or years that
    /// lack the anchor day instead of clamping it.
    fn step(&mut self, rule: &Rule) -> bool {
        for _ in 0..MAX_DAY_SKIPS {
            let Some(next) = self.iteration.checked_add(1) else {
                return false;
            };
            self.iteration = next;
            match cursor_at(rule, next) {
                Cursor::At(at) => {
                    self.current_date = at;
                    return true;
                }
                Cursor::Missing => continue,
                Cursor::Overflow => return false,
            }
        }
        false
    }

    /// True once the period at the cursor starts at or after the range end.
    fn out_of_range(&mut self, rule: &Rule) -> bool {
        let Some(end) = rule.window().rule_end() else {
            return false;
        };
        let boundary = if rule.expansion_count() == 0 {
            rule.zone().localize_boundary(self.current_date)
        } else {
            self.calendar
                .bounds(rule.freq(), self.current_date)
                .map(|b| b.start)
        };
        boundary.is_none_or(|b| b >= end)
    }

    /// True if every occurrence the period at the cursor could produce ends
    /// before `after`. Only used when skipping cannot change COUNT or sequence
    /// numbering.
    fn not_in_range(&mut self, rule: &Rule) -> bool {
        if rule.count().is_some() || rule.options().include_sequence_numbers {
            return false;
        }
        let Some(after) = rule.window().after() else {
            return false;
        };
        let latest_start = if rule.expansion_count() == 0 {
            rule.zone().localize_boundary(self.current_date)
        } else {
            self.calendar
                .bounds(rule.freq(), self.current_date)
                .map(|b| b.end)
        };
        latest_start
            .and_then(|at| rule.zone().add_span(&at, rule.span()))
            .is_some_and(|end| end < after)
    }

    /// Jumps whole intervals toward `after` for fixed-length frequencies, stopping
    /// short enough that the landing period is still entirely before it.
    fn fast_forward(&mut self, rule: &Rule) {
        let unit: i64 = match rule.freq() {
            Frequency::Secondly => 1,
            Frequency::Minutely => 60,
            Frequency::Hourly => 3_600,
            Frequency::Daily => 86_400,
            Frequency::Weekly => 604_800,
            Frequency::Monthly | Frequency::Yearly => return,
        };
        let Some(after) = rule.window().after() else {
            return;
        };
        let step = unit * i64::from(rule.interval());

        let cursor_offset = rule
            .zone()
            .localize_boundary(self.current_date)
            .map_or(0, |at| at.offset().fix().local_minus_utc());
        let after_offset = after.offset().fix().local_minus_utc();
        let slack = i64::from((after_offset - cursor_offset).abs())
            + rule.span().max_seconds()
            + FAST_FORWARD_MARGIN;

        let gap = (after.naive_local() - self.current_date).num_seconds() - unit - slack;
        if gap < step {
            return;
        }
        let jump = gap / step;
        let Some(target) = self.iteration.checked_add(jump) else {
            return;
        };
        if let Cursor::At(at) = cursor_at(rule, target) {
            trace!(intervals = jump, from = %self.current_date, to = %at, "fast-forward");
            self.iteration = target;
            self.current_date = at;
        }
    }

    /// Candidates for the current interval as instants, minus EXDATE, anything
    /// not after DTSTART or the previous interval, and anything at or past the
    /// range end. Two wall-clock values can map to one instant around a DST gap.
    fn collect_candidates(&mut self, rule: &Rule) -> Vec<DateTime<Tz>> {
        let zone = rule.zone();
        let floor = self.floor;
        let mut found: Vec<DateTime<Tz>> =
            interval_candidates(rule, &mut self.calendar, self.current_date)
                .into_iter()
                .filter_map(|local| zone.localize(local))
                .filter(|at| {
                    *at > floor && rule.window().admits_rule_start(at) && !rule.is_excluded(at)
                })
                .collect();
        found.sort();
        found.dedup();
        found
    }
}

/// The wall-clock cursor `n` intervals after DTSTART.
fn cursor_at(rule: &Rule, n: i64) -> Cursor {
    let anchor = rule.start().naive_local();
    let Some(steps) = n.checked_mul(i64::from(rule.interval())) else {
        return Cursor::Overflow;
    };
    let offset = match rule.freq() {
        Frequency::Secondly => Duration::try_seconds(steps),
        Frequency::Minutely => Duration::try_minutes(steps),
        Frequency::Hourly => Duration::try_hours(steps),
        Frequency::Daily => Duration::try_days(steps),
        Frequency::Weekly => Duration::try_weeks(steps),
        Frequency::Monthly => return month_cursor(rule, anchor, Some(steps)),
        Frequency::Yearly => return month_cursor(rule, anchor, steps.checked_mul(12)),
    };
    match offset.and_then(|d| anchor.checked_add_signed(d)) {
        Some(at) => Cursor::At(at),
        None => Cursor::Overflow,
    }
}

/// MONTHLY/YEARLY stepping. The anchor day is kept unless a day-level expansion
/// re-selects days anyway, in which case the cursor sits on the 1st.
fn month_cursor(rule: &Rule, anchor: NaiveDateTime, months: Option<i64>) -> Cursor {
    let Some(total) = months.and_then(|m| m.checked_add(i64::from(anchor.month0()))) else {
        return Cursor::Overflow;
    };
    let Ok(year) = i32::try_from(i64::from(anchor.year()) + total.div_euclid(12)) else {
        return Cursor::Overflow;
    };
    let month = total.rem_euclid(12) as u32 + 1;
    if NaiveDate::from_ymd_opt(year, month, 1).is_none() {
        return Cursor::Overflow;
    }
    let day = if rule.plan().expands_days() {
        1
    } else {
        anchor.day()
    };
    match NaiveDate::from_ymd_opt(year, month, day) {
        Some(date) => Cursor::At(date.and_time(anchor.time())),
        None => Cursor::Missing,
    }
}

/// Builds the occurrence for `source`, or `None` if it ends before `after` or
/// past the last representable instant.
fn resolve(rule: &Rule, source: Source, index: u32) -> Option<Occurrence> {
    let (start, end) = match source {
        Source::Start | Source::Cached(_) => {
            let start = source.start(rule);
            let Some(end) = rule.zone().add_span(&start, rule.span()) else {
                trace!(start = %start, "occurrence end is not representable; skipped");
                return None;
            };
            (start, end)
        }
        Source::RDate { start, end } => (start, end),
    };
    if !rule.window().admits_end(&end) {
        trace!(start = %start, "occurrence ends before the window; skipped");
        return None;
    }
    Some(Occurrence::new(start, end, index, rule.options()))
}

/// A lazy, ordered sequence of occurrences. Yields nothing for an invalid rule.
#[derive(Debug, Clone)]
pub struct Occurrences<'r> {
    session: Option<(&'r Rule, IteratorState)>,
}

impl<'r> Occurrences<'r> {
    pub fn new(rule: &'r Rule) -> Self {
        Self {
            session: Some((rule, IteratorState::new(rule))),
        }
    }

    /// A session that is terminal from the start.
    pub fn errored() -> Self {
        Self { session: None }
    }

    pub fn phase(&self) -> Phase {
        self.session
            .as_ref()
            .map_or(Phase::Errored, |(_, state)| state.phase)
    }

    pub fn rule(&self) -> Option<&'r Rule> {
        self.session.as_ref().map(|(rule, _)| *rule)
    }
}

impl Iterator for Occurrences<'_> {
    type Item = Occurrence;

    fn next(&mut self) -> Option<Occurrence> {
        let (rule, state) = self.session.as_mut()?;
        state.next_occurrence(*rule)
    }
}

/// A rule that is either valid or carries the reason it was rejected. Invalid
/// rules expand to an empty sequence.
#[derive(Debug, Clone)]
pub struct Recurrence {
    rule: std::result::Result<Rule, RuleError>,
}

impl Recurrence {
    pub fn new(params: &Params) -> Self {
        Self {
            rule: Rule::from_params(params),
        }
    }

    pub fn is_error(&self) -> bool {
        self.rule.is_err()
    }

    pub fn error(&self) -> Option<&RuleError> {
        self.rule.as_ref().err()
    }

    pub fn rule(&self) -> Option<&Rule> {
        self.rule.as_ref().ok()
    }

    pub fn occurrences(&self) -> Occurrences<'_> {
        match &self.rule {
            Ok(rule) => Occurrences::new(rule),
            Err(_) => Occurrences::errored(),
        }
    }
}

impl From<&Params> for Recurrence {
    fn from(params: &Params) -> Self {
        Self::new(params)
    }
}

/// Expand a rule into all of its occurrences.
///
/// # Errors
/// Returns the validation error if `params` do not describe a valid rule, or
/// [`RuleError::InvalidParams`] if the rule has neither COUNT, UNTIL nor a
/// `before` bound. Iterate [`Rule::occurrences`] lazily for open-ended rules.
pub fn expand(params: &Params) -> Result<Vec<Occurrence>> {
    let rule = Rule::from_params(params)?;
    if rule.count().is_none() && rule.window().rule_end().is_none() {
        return Err(RuleError::InvalidParams(
            "unbounded rule: set count, until or before".into(),
        ));
    }
    Ok(rule.occurrences().collect())
}
