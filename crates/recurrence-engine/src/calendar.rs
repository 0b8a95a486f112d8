//! Calendar math: year, month and week boundaries with per-session memoization.
//!
//! Boundaries are computed on the wall clock and converted to instants through
//! the rule's [`Zone`], so a month that starts inside a DST gap begins at the
//! first instant after it.

use std::collections::HashMap;

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, Timelike, Weekday};
use chrono_tz::Tz;

use crate::rule::Frequency;
use crate::zone::Zone;

pub fn is_leap_year(year: i32) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}

pub fn days_in_year(year: i32) -> u32 {
    if is_leap_year(year) {
        366
    } else {
        365
    }
}

pub fn days_in_month(year: i32, month: u32) -> u32 {
    match month {
        4 | 6 | 9 | 11 => 30,
        2 if is_leap_year(year) => 29,
        2 => 28,
        _ => 31,
    }
}

/// The seven weekdays starting at `first`.
pub fn week_order(first: Weekday) -> [Weekday; 7] {
    let mut order = [first; 7];
    for i in 1..7 {
        order[i] = order[i - 1].succ();
    }
    order
}

/// Signed day distance from Jan 1 to the first day of week 1, where week 1 is
/// the first `wkst`-aligned week holding at least four days of the year.
/// Negative when week 1 starts in the previous December.
pub fn week_offset(jan1: Weekday, wkst: Weekday) -> i64 {
    let ahead = (i64::from(wkst.num_days_from_monday()) + 7
        - i64::from(jan1.num_days_from_monday()))
        % 7;
    if ahead >= 4 {
        ahead - 7
    } else {
        ahead
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct YearDetails {
    pub year: i32,
    pub first_day: NaiveDate,
    pub last_day: NaiveDate,
    pub start: DateTime<Tz>,
    /// Exclusive: the first instant of the next year.
    pub end: DateTime<Tz>,
    pub day_count: u32,
    pub first_weekday: Weekday,
    pub last_weekday: Weekday,
    /// Weekdays in order starting from Jan 1's weekday.
    pub weekday_order: [Weekday; 7],
    pub week_offset: i64,
    pub week_count: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonthDetails {
    pub year: i32,
    pub month: u32,
    pub first_day: NaiveDate,
    pub last_day: NaiveDate,
    pub start: DateTime<Tz>,
    /// Exclusive: the first instant of the next month.
    pub end: DateTime<Tz>,
    pub day_count: u32,
    /// Weekdays in order starting from the 1st's weekday.
    pub weekday_order: [Weekday; 7],
}

/// Start (inclusive) and end (exclusive) of the period a cursor falls in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bounds {
    pub local_start: NaiveDateTime,
    pub local_end: NaiveDateTime,
    pub start: DateTime<Tz>,
    pub end: DateTime<Tz>,
}

/// Memoized calendar lookups for one iteration session.
#[derive(Debug, Clone)]
pub struct Calendar {
    zone: Zone,
    wkst: Weekday,
    years: HashMap<i32, Option<YearDetails>>,
    months: HashMap<(i32, u32), Option<MonthDetails>>,
    weeks: HashMap<(i32, i8), Option<NaiveDate>>,
}

fn midnight(date: NaiveDate) -> NaiveDateTime {
    date.and_time(NaiveTime::MIN)
}

impl Calendar {
    pub fn new(zone: Zone, wkst: Weekday) -> Self {
        Self {
            zone,
            wkst,
            years: HashMap::new(),
            months: HashMap::new(),
            weeks: HashMap::new(),
        }
    }

    pub fn zone(&self) -> &Zone {
        &self.zone
    }

    pub fn wkst(&self) -> Weekday {
        self.wkst
    }

    pub fn year(&mut self, year: i32) -> Option<YearDetails> {
        if let Some(details) = self.years.get(&year) {
            return *details;
        }
        let details = self.build_year(year);
        self.years.insert(year, details);
        details
    }

    fn build_year(&self, year: i32) -> Option<YearDetails> {
        let first_day = NaiveDate::from_ymd_opt(year, 1, 1)?;
        let last_day = NaiveDate::from_ymd_opt(year, 12, 31)?;
        let next_first = NaiveDate::from_ymd_opt(year + 1, 1, 1)?;
        let offset = week_offset(first_day.weekday(), self.wkst);
        let next_offset = week_offset(next_first.weekday(), self.wkst);
        let day_count = days_in_year(year);

        Some(YearDetails {
            year,
            first_day,
            last_day,
            start: self.zone.localize_boundary(midnight(first_day))?,
            end: self.zone.localize_boundary(midnight(next_first))?,
            day_count,
            first_weekday: first_day.weekday(),
            last_weekday: last_day.weekday(),
            weekday_order: week_order(first_day.weekday()),
            week_offset: offset,
            week_count: ((i64::from(day_count) + next_offset - offset) / 7) as u32,
        })
    }

    pub fn month(&mut self, year: i32, month: u32) -> Option<MonthDetails> {
        if let Some(details) = self.months.get(&(year, month)) {
            return *details;
        }
        let details = self.build_month(year, month);
        self.months.insert((year, month), details);
        details
    }

    fn build_month(&self, year: i32, month: u32) -> Option<MonthDetails> {
        let first_day = NaiveDate::from_ymd_opt(year, month, 1)?;
        let day_count = days_in_month(year, month);
        let last_day = NaiveDate::from_ymd_opt(year, month, day_count)?;
        let next_first = last_day.succ_opt()?;

        Some(MonthDetails {
            year,
            month,
            first_day,
            last_day,
            start: self.zone.localize_boundary(midnight(first_day))?,
            end: self.zone.localize_boundary(midnight(next_first))?,
            day_count,
            weekday_order: week_order(first_day.weekday()),
        })
    }

    /// First day of week `week` (±1..=53) of `year`, or `None` if the year has
    /// fewer weeks.
    pub fn week_of_year(&mut self, year: i32, week: i8) -> Option<NaiveDate> {
        if let Some(start) = self.weeks.get(&(year, week)) {
            return *start;
        }
        let start = self.build_week(year, week);
        self.weeks.insert((year, week), start);
        start
    }

    fn build_week(&mut self, year: i32, week: i8) -> Option<NaiveDate> {
        let details = self.year(year)?;
        let count = i64::from(details.week_count);
        let index = if week > 0 {
            i64::from(week)
        } else {
            count + i64::from(week) + 1
        };
        if index < 1 || index > count {
            return None;
        }
        details
            .first_day
            .checked_add_signed(Duration::days(details.week_offset + (index - 1) * 7))
    }

    /// The WKST-aligned first day of the week containing `date`.
    pub fn week_start(&self, date: NaiveDate) -> Option<NaiveDate> {
        let back = (i64::from(date.weekday().num_days_from_monday()) + 7
            - i64::from(self.wkst.num_days_from_monday()))
            % 7;
        date.checked_sub_signed(Duration::days(back))
    }

    /// The period of length `freq` containing `cursor`.
    pub fn bounds(&mut self, freq: Frequency, cursor: NaiveDateTime) -> Option<Bounds> {
        let date = cursor.date();
        match freq {
            Frequency::Yearly => {
                let y = self.year(date.year())?;
                Some(Bounds {
                    local_start: midnight(y.first_day),
                    local_end: midnight(y.last_day.succ_opt()?),
                    start: y.start,
                    end: y.end,
                })
            }
            Frequency::Monthly => {
                let m = self.month(date.year(), date.month())?;
                Some(Bounds {
                    local_start: midnight(m.first_day),
                    local_end: midnight(m.last_day.succ_opt()?),
                    start: m.start,
                    end: m.end,
                })
            }
            Frequency::Weekly => {
                let first = self.week_start(date)?;
                self.local_bounds(midnight(first), Duration::days(7))
            }
            Frequency::Daily => self.local_bounds(midnight(date), Duration::days(1)),
            Frequency::Hourly => {
                let start = date.and_hms_opt(cursor.hour(), 0, 0)?;
                self.local_bounds(start, Duration::hours(1))
            }
            Frequency::Minutely => {
                let start = date.and_hms_opt(cursor.hour(), cursor.minute(), 0)?;
                self.local_bounds(start, Duration::minutes(1))
            }
            Frequency::Secondly => {
                let start = date.and_hms_opt(cursor.hour(), cursor.minute(), cursor.second())?;
                self.local_bounds(start, Duration::seconds(1))
            }
        }
    }

    fn local_bounds(&self, local_start: NaiveDateTime, length: Duration) -> Option<Bounds> {
        let local_end = local_start.checked_add_signed(length)?;
        Some(Bounds {
            local_start,
            local_end,
            start: self.zone.localize_boundary(local_start)?,
            end: self.zone.localize_boundary(local_end)?,
        })
    }

    /// Every day of the period of length `freq` containing `date`. Periods shorter
    /// than a day yield just `date`.
    pub fn period_days(&mut self, freq: Frequency, date: NaiveDate) -> Vec<NaiveDate> {
        let (first, last) = match freq {
            Frequency::Yearly => match self.year(date.year()) {
                Some(y) => (y.first_day, y.last_day),
                None => return Vec::new(),
            },
            Frequency::Monthly => match self.month(date.year(), date.month()) {
                Some(m) => (m.first_day, m.last_day),
                None => return Vec::new(),
            },
            Frequency::Weekly => {
                let week = self.week_start(date).and_then(|first| {
                    Some((first, first.checked_add_signed(Duration::days(6))?))
                });
                match week {
                    Some(week) => week,
                    None => return Vec::new(),
                }
            }
            _ => return vec![date],
        };
        first.iter_days().take_while(|d| *d <= last).collect()
    }
}
