//! Frequency classifier: which BY* parts expand a period into many candidates and
//! which merely filter single candidates.
//!
//! This is RFC 5545 §3.3.10's BYxxx table. Day-level parts that expand share one
//! group whose results are intersected; each time-level part is its own group.

use crate::rule::Frequency;

/// A BY* rule part, plus the implicit DTSTART anchors used when a YEARLY rule
/// narrows the period without naming a day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ByRule {
    Month,
    WeekNo,
    YearDay,
    MonthDay,
    Day,
    Hour,
    Minute,
    Second,
    /// DTSTART's day of the month.
    AnchorMonthDay,
    /// DTSTART's weekday.
    AnchorWeekday,
}

impl ByRule {
    pub fn name(self) -> &'static str {
        match self {
            Self::Month => "BYMONTH",
            Self::WeekNo => "BYWEEKNO",
            Self::YearDay => "BYYEARDAY",
            Self::MonthDay => "BYMONTHDAY",
            Self::Day => "BYDAY",
            Self::Hour => "BYHOUR",
            Self::Minute => "BYMINUTE",
            Self::Second => "BYSECOND",
            Self::AnchorMonthDay => "DTSTART day",
            Self::AnchorWeekday => "DTSTART weekday",
        }
    }

    /// True for parts that select days rather than times of day.
    pub fn is_day_level(self) -> bool {
        !matches!(self, Self::Hour | Self::Minute | Self::Second)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Expand,
    Limit,
    Invalid,
}

use self::Role::{Expand as E, Invalid as N, Limit as L};

// Columns: SECONDLY MINUTELY HOURLY DAILY WEEKLY MONTHLY YEARLY
const ROLES: [[Role; 7]; 8] = [
    [L, L, L, L, L, L, E], // BYMONTH
    [N, N, N, N, N, N, E], // BYWEEKNO
    [L, L, L, N, N, N, E], // BYYEARDAY
    [L, L, L, L, N, E, E], // BYMONTHDAY
    [L, L, L, L, E, E, E], // BYDAY
    [L, L, L, E, E, E, E], // BYHOUR
    [L, L, E, E, E, E, E], // BYMINUTE
    [L, E, E, E, E, E, E], // BYSECOND
];

/// The role `part` plays under `freq`. Anchors always expand.
pub fn role(freq: Frequency, part: ByRule) -> Role {
    let row = match part {
        ByRule::Month => 0,
        ByRule::WeekNo => 1,
        ByRule::YearDay => 2,
        ByRule::MonthDay => 3,
        ByRule::Day => 4,
        ByRule::Hour => 5,
        ByRule::Minute => 6,
        ByRule::Second => 7,
        ByRule::AnchorMonthDay | ByRule::AnchorWeekday => return Role::Expand,
    };
    ROLES[row][freq as usize]
}

/// Expansion groups and limitation predicates for one rule, fixed at
/// construction time.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Plan {
    expansions: Vec<Vec<ByRule>>,
    limitations: Vec<ByRule>,
}

impl Plan {
    /// Groups in the order they are applied. Results are intersected within a
    /// group and concatenated across candidates.
    pub fn expansions(&self) -> &[Vec<ByRule>] {
        &self.expansions
    }

    pub fn limitations(&self) -> &[ByRule] {
        &self.limitations
    }

    pub fn expansion_count(&self) -> usize {
        self.expansions.len()
    }

    /// True when the first group picks days, so the cursor's own day of the
    /// month is irrelevant.
    pub fn expands_days(&self) -> bool {
        self.expansions
            .first()
            .and_then(|group| group.first())
            .is_some_and(|rule| rule.is_day_level())
    }
}

/// Builds the plan for `freq` from the BY* parts that are present.
///
/// `present` must only contain parts valid for `freq`.
pub fn classify(freq: Frequency, present: &[ByRule]) -> Plan {
    let mut day_group = Vec::new();
    let mut time_groups = Vec::new();
    let mut limitations = Vec::new();

    for &part in present {
        match role(freq, part) {
            Role::Expand if part.is_day_level() => day_group.push(part),
            Role::Expand => time_groups.push(vec![part]),
            Role::Limit => limitations.push(part),
            Role::Invalid => {}
        }
    }

    if freq == Frequency::Yearly
        && !day_group.is_empty()
        && !day_group
            .iter()
            .any(|p| matches!(p, ByRule::YearDay | ByRule::MonthDay | ByRule::Day))
    {
        if day_group.contains(&ByRule::WeekNo) {
            day_group.push(ByRule::AnchorWeekday);
        } else {
            day_group.push(ByRule::AnchorMonthDay);
        }
    }

    day_group.sort();
    time_groups.sort();

    let mut expansions = Vec::new();
    if !day_group.is_empty() {
        expansions.push(day_group);
    }
    expansions.extend(time_groups);

    Plan {
        expansions,
        limitations,
    }
}
