//! Expanders and limiters for each BY* part, dispatched on [`ByRule`].
//!
//! Everything here works on wall-clock values; converting to instants and
//! applying EXDATE happens in the iterator.

use std::collections::BTreeSet;

use chrono::{Datelike, NaiveDate, NaiveDateTime, Timelike};

use crate::calendar::{days_in_month, days_in_year, Calendar};
use crate::classify::ByRule;
use crate::rule::{Frequency, Rule};

impl ByRule {
    /// Every value this part selects within the period `seed` belongs to.
    /// Day-level parts keep the seed's time of day; time-level parts keep its date.
    pub fn expand(
        self,
        rule: &Rule,
        calendar: &mut Calendar,
        seed: NaiveDateTime,
    ) -> Vec<NaiveDateTime> {
        let time = seed.time();
        match self {
            ByRule::Hour => rule
                .by_hour()
                .iter()
                .filter_map(|&h| seed.with_hour(u32::from(h)))
                .collect(),
            ByRule::Minute => rule
                .by_minute()
                .iter()
                .filter_map(|&m| seed.with_minute(u32::from(m)))
                .collect(),
            ByRule::Second => rule
                .by_second()
                .iter()
                .filter_map(|&s| seed.with_second(u32::from(s)))
                .collect(),
            ByRule::WeekNo => week_days(rule, calendar, seed.date())
                .into_iter()
                .map(|d| d.and_time(time))
                .collect(),
            _ => calendar
                .period_days(rule.freq(), seed.date())
                .into_iter()
                .filter(|d| self.matches_day(rule, calendar, *d))
                .map(|d| d.and_time(time))
                .collect(),
        }
    }

    /// Whether a single candidate passes this part.
    pub fn limit(self, rule: &Rule, calendar: &mut Calendar, candidate: NaiveDateTime) -> bool {
        match self {
            ByRule::Hour => contains(rule.by_hour(), candidate.hour()),
            ByRule::Minute => contains(rule.by_minute(), candidate.minute()),
            ByRule::Second => contains(rule.by_second(), candidate.second()),
            _ => self.matches_day(rule, calendar, candidate.date()),
        }
    }

    fn matches_day(self, rule: &Rule, calendar: &mut Calendar, date: NaiveDate) -> bool {
        match self {
            ByRule::Month => contains(rule.by_month(), date.month()),
            ByRule::WeekNo => week_days(rule, calendar, date).contains(&date),
            ByRule::YearDay => {
                let len = i64::from(days_in_year(date.year()));
                let ordinal = i64::from(date.ordinal());
                rule.by_year_day()
                    .iter()
                    .any(|&n| relative_index(i64::from(n), len) == ordinal)
            }
            ByRule::MonthDay => {
                let len = i64::from(days_in_month(date.year(), date.month()));
                let day = i64::from(date.day());
                rule.by_month_day()
                    .iter()
                    .any(|&n| relative_index(i64::from(n), len) == day)
            }
            ByRule::Day => rule.by_day().iter().any(|wd| {
                wd.weekday == date.weekday()
                    && wd
                        .ordinal
                        .is_none_or(|n| nth_weekday_matches(rule, calendar, date, n))
            }),
            ByRule::AnchorMonthDay => date.day() == rule.start().day(),
            ByRule::AnchorWeekday => date.weekday() == rule.start().weekday(),
            ByRule::Hour | ByRule::Minute | ByRule::Second => true,
        }
    }
}

fn contains(set: &[u8], value: u32) -> bool {
    u8::try_from(value).is_ok_and(|v| set.contains(&v))
}

/// Resolves a signed 1-based index against a length: `-1` is the last element.
fn relative_index(n: i64, len: i64) -> i64 {
    if n > 0 {
        n
    } else {
        len + n + 1
    }
}

/// Checks "the nth `weekday`" of the month (MONTHLY, or YEARLY with BYMONTH) or
/// of the year.
fn nth_weekday_matches(rule: &Rule, calendar: &mut Calendar, date: NaiveDate, n: i8) -> bool {
    let month_scope = rule.freq() == Frequency::Monthly
        || (rule.freq() == Frequency::Yearly && !rule.by_month().is_empty());
    let scope = if month_scope {
        calendar
            .month(date.year(), date.month())
            .map(|m| (m.first_day, m.last_day))
    } else {
        calendar.year(date.year()).map(|y| (y.first_day, y.last_day))
    };
    let Some((first, last)) = scope else {
        return false;
    };
    if n > 0 {
        (date - first).num_days() / 7 + 1 == i64::from(n)
    } else {
        (last - date).num_days() / 7 + 1 == -i64::from(n)
    }
}

/// Days of `date`'s year that fall in a BYWEEKNO week. Weeks are numbered per
/// week-year, so week 1 of next year may contribute late-December days and the
/// last week of the previous year early-January ones.
fn week_days(rule: &Rule, calendar: &mut Calendar, date: NaiveDate) -> Vec<NaiveDate> {
    let year = date.year();
    let mut days = BTreeSet::new();
    for &week in rule.by_week_no() {
        for week_year in [year - 1, year, year + 1] {
            if let Some(first) = calendar.week_of_year(week_year, week) {
                days.extend(first.iter_days().take(7).filter(|d| d.year() == year));
            }
        }
    }
    days.into_iter().collect()
}

/// Applies one expansion group to a seed: every part expands the seed and only
/// values produced by all of them survive.
pub fn expand_group(
    group: &[ByRule],
    rule: &Rule,
    calendar: &mut Calendar,
    seed: NaiveDateTime,
) -> Vec<NaiveDateTime> {
    let mut sets = group.iter().map(|part| part.expand(rule, calendar, seed));
    let Some(first) = sets.next() else {
        return vec![seed];
    };
    let rest: Vec<BTreeSet<NaiveDateTime>> = sets.map(BTreeSet::from_iter).collect();
    first
        .into_iter()
        .filter(|c| rest.iter().all(|set| set.contains(c)))
        .collect()
}

/// Picks BYSETPOS positions out of a sorted candidate list.
pub fn select_positions<T: Copy + Ord>(sorted: &[T], positions: &[i16]) -> Vec<T> {
    let len = sorted.len() as i64;
    let mut picked: Vec<T> = positions
        .iter()
        .filter_map(|&p| {
            let index = relative_index(i64::from(p), len) - 1;
            usize::try_from(index).ok().and_then(|i| sorted.get(i)).copied()
        })
        .collect();
    picked.sort();
    picked.dedup();
    picked
}

/// All wall-clock candidates for the period at `cursor`, sorted and
/// deduplicated, after limitation and BYSETPOS.
pub fn interval_candidates(
    rule: &Rule,
    calendar: &mut Calendar,
    cursor: NaiveDateTime,
) -> Vec<NaiveDateTime> {
    let mut candidates = vec![cursor];
    for group in rule.plan().expansions() {
        let mut next = Vec::new();
        for seed in &candidates {
            next.extend(expand_group(group, rule, calendar, *seed));
        }
        if next.is_empty() {
            return next;
        }
        candidates = next;
    }

    candidates.sort();
    candidates.dedup();
    candidates.retain(|c| {
        rule.plan()
            .limitations()
            .iter()
            .all(|part| part.limit(rule, calendar, *c))
    });

    if rule.by_set_pos().is_empty() {
        candidates
    } else {
        select_positions(&candidates, rule.by_set_pos())
    }
}
