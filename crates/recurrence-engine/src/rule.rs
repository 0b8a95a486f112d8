//! The validated recurrence rule.
//!
//! A [`Rule`] is built once from [`Params`] and never changes afterwards. All
//! malformed input is rejected here, so iteration never has to re-validate.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Weekday};
use chrono_tz::Tz;
use tracing::debug;

use crate::calendar::week_order;
use crate::classify::{self, ByRule, Plan, Role};
use crate::config::{ExpandOptions, OutputFormat};
use crate::dst::DstPolicy;
use crate::duration::Span;
use crate::error::{Result, RuleError};
use crate::iter::Occurrences;
use crate::params::Params;
use crate::window::{self, Window};
use crate::zone::{Timestamp, Zone};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Frequency {
    Secondly,
    Minutely,
    Hourly,
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl Frequency {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Secondly => "SECONDLY",
            Self::Minutely => "MINUTELY",
            Self::Hourly => "HOURLY",
            Self::Daily => "DAILY",
            Self::Weekly => "WEEKLY",
            Self::Monthly => "MONTHLY",
            Self::Yearly => "YEARLY",
        }
    }
}

impl FromStr for Frequency {
    type Err = RuleError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "SECONDLY" => Ok(Self::Secondly),
            "MINUTELY" => Ok(Self::Minutely),
            "HOURLY" => Ok(Self::Hourly),
            "DAILY" => Ok(Self::Daily),
            "WEEKLY" => Ok(Self::Weekly),
            "MONTHLY" => Ok(Self::Monthly),
            "YEARLY" => Ok(Self::Yearly),
            _ => Err(RuleError::UnknownFrequency(s.to_string())),
        }
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A BYDAY entry: a weekday with an optional signed ordinal (`-1FR`, `2TU`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WeekdayNum {
    pub ordinal: Option<i8>,
    pub weekday: Weekday,
}

impl FromStr for WeekdayNum {
    type Err = RuleError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let invalid = || RuleError::InvalidWeekday(s.to_string());
        if s.len() < 2 || !s.is_char_boundary(s.len() - 2) {
            return Err(invalid());
        }
        let (ordinal, code) = s.split_at(s.len() - 2);
        let weekday = parse_weekday(code).ok_or_else(invalid)?;
        let ordinal = match ordinal {
            "" => None,
            text => {
                let n: i64 = text.parse().map_err(|_| invalid())?;
                check_range("BYDAY", n, 1, 53, true)?;
                Some(n as i8)
            }
        };
        Ok(Self { ordinal, weekday })
    }
}

/// Parses a two-letter weekday code (`MO` .. `SU`), case-insensitively.
pub fn parse_weekday(code: &str) -> Option<Weekday> {
    match code.trim().to_ascii_uppercase().as_str() {
        "MO" => Some(Weekday::Mon),
        "TU" => Some(Weekday::Tue),
        "WE" => Some(Weekday::Wed),
        "TH" => Some(Weekday::Thu),
        "FR" => Some(Weekday::Fri),
        "SA" => Some(Weekday::Sat),
        "SU" => Some(Weekday::Sun),
        _ => None,
    }
}

/// An explicit extra occurrence. At most one of `end` / `duration` is set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RDate {
    pub start: DateTime<Tz>,
    pub end: Option<DateTime<Tz>>,
    pub duration: Option<Span>,
}

impl RDate {
    /// Its own duration, else its own end, else `span` from the rule.
    pub fn end_at(&self, zone: &Zone, span: Span) -> Option<DateTime<Tz>> {
        match (self.duration, self.end) {
            (Some(duration), _) => zone.add_span(&self.start, duration),
            (None, Some(end)) => Some(end),
            (None, None) => zone.add_span(&self.start, span),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Rule {
    id: String,
    zone: Zone,
    start: DateTime<Tz>,
    start_date_only: bool,
    end: Option<DateTime<Tz>>,
    duration: Option<Span>,
    span: Span,
    freq: Frequency,
    interval: u32,
    count: Option<u32>,
    until: Option<DateTime<Tz>>,
    by_month: Vec<u8>,
    by_week_no: Vec<i8>,
    by_year_day: Vec<i16>,
    by_month_day: Vec<i8>,
    by_day: Vec<WeekdayNum>,
    by_hour: Vec<u8>,
    by_minute: Vec<u8>,
    by_second: Vec<u8>,
    by_set_pos: Vec<i16>,
    wkst: Weekday,
    week_order: [Weekday; 7],
    rdates: Vec<RDate>,
    exdates: BTreeSet<DateTime<Tz>>,
    exdate_days: BTreeSet<NaiveDate>,
    window: Window,
    options: ExpandOptions,
    plan: Plan,
}

impl Rule {
    /// Validates `params` and builds a rule.
    ///
    /// # Errors
    /// Returns the first validation failure found; see [`RuleError`].
    pub fn from_params(params: &Params) -> Result<Self> {
        let rule = build(params);
        if let Err(err) = &rule {
            debug!(error = %err, "rejected recurrence rule");
        }
        rule
    }

    /// Starts a new, independent iteration session over this rule.
    pub fn occurrences(&self) -> Occurrences<'_> {
        Occurrences::new(self)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn zone(&self) -> &Zone {
        &self.zone
    }

    pub fn start(&self) -> DateTime<Tz> {
        self.start
    }

    /// True when DTSTART was given as a bare date.
    pub fn is_all_day(&self) -> bool {
        self.start_date_only
    }

    pub fn end(&self) -> Option<DateTime<Tz>> {
        self.end
    }

    pub fn duration(&self) -> Option<Span> {
        self.duration
    }

    /// The span added to every generated start to obtain its end.
    pub fn span(&self) -> Span {
        self.span
    }

    pub fn freq(&self) -> Frequency {
        self.freq
    }

    pub fn interval(&self) -> u32 {
        self.interval
    }

    pub fn count(&self) -> Option<u32> {
        self.count
    }

    pub fn until(&self) -> Option<DateTime<Tz>> {
        self.until
    }

    pub fn by_month(&self) -> &[u8] {
        &self.by_month
    }

    pub fn by_week_no(&self) -> &[i8] {
        &self.by_week_no
    }

    pub fn by_year_day(&self) -> &[i16] {
        &self.by_year_day
    }

    pub fn by_month_day(&self) -> &[i8] {
        &self.by_month_day
    }

    pub fn by_day(&self) -> &[WeekdayNum] {
        &self.by_day
    }

    pub fn by_hour(&self) -> &[u8] {
        &self.by_hour
    }

    pub fn by_minute(&self) -> &[u8] {
        &self.by_minute
    }

    pub fn by_second(&self) -> &[u8] {
        &self.by_second
    }

    pub fn by_set_pos(&self) -> &[i16] {
        &self.by_set_pos
    }

    pub fn wkst(&self) -> Weekday {
        self.wkst
    }

    /// The seven weekdays starting at WKST.
    pub fn week_order(&self) -> [Weekday; 7] {
        self.week_order
    }

    /// RDATE entries sorted by start, without excluded or duplicate starts.
    pub fn rdates(&self) -> &[RDate] {
        &self.rdates
    }

    pub fn exdates(&self) -> &BTreeSet<DateTime<Tz>> {
        &self.exdates
    }

    pub fn window(&self) -> &Window {
        &self.window
    }

    pub fn options(&self) -> &ExpandOptions {
        &self.options
    }

    pub fn plan(&self) -> &Plan {
        &self.plan
    }

    /// Number of non-empty expansion groups; zero selects the single-candidate
    /// path during iteration.
    pub fn expansion_count(&self) -> usize {
        self.plan.expansion_count()
    }

    /// True if `at` is listed in EXDATE, either as an instant or as a bare date
    /// covering its local day.
    pub fn is_excluded(&self, at: &DateTime<Tz>) -> bool {
        self.exdates.contains(at) || self.exdate_days.contains(&at.date_naive())
    }
}

fn build(params: &Params) -> Result<Rule> {
    let map = params.merged()?;

    let mut options = params.options().cloned().unwrap_or_default();
    if let Some(format) = map.get("format") {
        options.format = OutputFormat::from_token(format)?;
    }
    if let Some(max) = map.get("max") {
        options.max_iterations = positive(max, "max")?;
    }
    if let Some(flag) = map.get("sequence") {
        options.include_sequence_numbers = boolean(flag, "sequence")?;
    }
    if let Some(policy) = map.get("dst") {
        options.dst_policy = DstPolicy::from_token(policy).ok_or_else(|| invalid("dst", policy))?;
    }

    let zone = Zone::new(
        map.get("tzid").map(String::as_str).unwrap_or("UTC"),
        options.dst_policy,
    )?;

    let start = timestamp(&zone, &map, "dtstart")?.ok_or(RuleError::MissingStart)?;
    let end = timestamp(&zone, &map, "dtend")?;
    let duration = map.get("duration").map(|d| Span::parse(d)).transpose()?;
    if end.is_some() && duration.is_some() {
        return Err(RuleError::MutuallyExclusive("DTEND", "DURATION"));
    }

    let freq: Frequency = map
        .get("freq")
        .ok_or(RuleError::MissingFrequency)?
        .parse()?;
    let interval = map
        .get("interval")
        .map(|v| positive(v, "interval"))
        .transpose()?
        .unwrap_or(1);
    let count = map.get("count").map(|v| positive(v, "count")).transpose()?;
    let until = timestamp(&zone, &map, "until")?.map(|t| t.instant);
    if count.is_some() && until.is_some() {
        return Err(RuleError::MutuallyExclusive("COUNT", "UNTIL"));
    }

    let by_month: Vec<u8> = int_set(&map, "bymonth", 1, 12, false)?;
    let by_week_no: Vec<i8> = int_set(&map, "byweekno", 1, 53, true)?;
    let by_year_day: Vec<i16> = int_set(&map, "byyearday", 1, 366, true)?;
    let by_month_day: Vec<i8> = int_set(&map, "bymonthday", 1, 31, true)?;
    let by_hour: Vec<u8> = int_set(&map, "byhour", 0, 23, false)?;
    let by_minute: Vec<u8> = int_set(&map, "byminute", 0, 59, false)?;
    let by_second: Vec<u8> = int_set(&map, "bysecond", 0, 59, false)?;
    let by_set_pos: Vec<i16> = int_set(&map, "bysetpos", 1, 366, true)?;
    let by_day = weekday_list(&map)?;
    let wkst = match map.get("wkst") {
        Some(code) => parse_weekday(code).ok_or_else(|| RuleError::InvalidWeekday(code.clone()))?,
        None => Weekday::Mon,
    };

    let present: Vec<ByRule> = [
        (ByRule::Month, !by_month.is_empty()),
        (ByRule::WeekNo, !by_week_no.is_empty()),
        (ByRule::YearDay, !by_year_day.is_empty()),
        (ByRule::MonthDay, !by_month_day.is_empty()),
        (ByRule::Day, !by_day.is_empty()),
        (ByRule::Hour, !by_hour.is_empty()),
        (ByRule::Minute, !by_minute.is_empty()),
        (ByRule::Second, !by_second.is_empty()),
    ]
    .into_iter()
    .filter_map(|(part, set)| set.then_some(part))
    .collect();

    for part in &present {
        if classify::role(freq, *part) == Role::Invalid {
            return Err(RuleError::IncompatiblePart {
                part: part.name(),
                freq: freq.to_string(),
            });
        }
    }
    if by_day.iter().any(|d| d.ordinal.is_some())
        && (!matches!(freq, Frequency::Monthly | Frequency::Yearly) || !by_week_no.is_empty())
    {
        return Err(RuleError::IncompatiblePart {
            part: "BYDAY ordinal",
            freq: freq.to_string(),
        });
    }
    if !by_set_pos.is_empty() && present.is_empty() {
        return Err(RuleError::LoneSetPos);
    }

    let exdate_list = timestamp_list(&zone, &map, "exdate")?;
    let exdates: BTreeSet<DateTime<Tz>> = exdate_list.iter().map(|t| t.instant).collect();
    let exdate_days: BTreeSet<NaiveDate> = exdate_list
        .iter()
        .filter(|t| t.date_only && !start.date_only)
        .map(|t| t.instant.date_naive())
        .collect();

    let mut rdates = rdate_list(&zone, &map)?;
    rdates.retain(|r| {
        !(exdates.contains(&r.start) || exdate_days.contains(&r.start.date_naive()))
    });
    rdates.retain(|r| {
        let keep = r.start >= start.instant;
        if !keep {
            debug!(rdate = %r.start, "dropping RDATE before DTSTART");
        }
        keep
    });
    rdates.sort_by_key(|r| r.start);
    rdates.dedup_by_key(|r| r.start);

    let after = timestamp(&zone, &map, "after")?.map(|t| t.instant);
    let before = timestamp(&zone, &map, "before")?.map(|t| t.instant);

    let span = window::resolve_span(&zone, &start, end.as_ref(), duration);
    if zone.add_span(&start.instant, span).is_none() {
        return Err(RuleError::InvalidDuration(span.to_string()));
    }
    if let Some(rdate) = rdates.iter().find(|r| r.end_at(&zone, span).is_none()) {
        return Err(RuleError::InvalidDuration(
            rdate.duration.unwrap_or(span).to_string(),
        ));
    }
    let plan = classify::classify(freq, &present);

    Ok(Rule {
        id: map.get("id").cloned().unwrap_or_default(),
        zone,
        start: start.instant,
        start_date_only: start.date_only,
        end: end.map(|t| t.instant),
        duration,
        span,
        freq,
        interval,
        count,
        until,
        by_month,
        by_week_no,
        by_year_day,
        by_month_day,
        by_day,
        by_hour,
        by_minute,
        by_second,
        by_set_pos,
        wkst,
        week_order: week_order(wkst),
        rdates,
        exdates,
        exdate_days,
        window: Window::new(after, before, until),
        options,
        plan,
    })
}

// ---------------------------------------------------------------------------
// Sanitizers
// ---------------------------------------------------------------------------

fn invalid(key: &str, value: &str) -> RuleError {
    RuleError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    }
}

fn positive(value: &str, key: &str) -> Result<u32> {
    match value.trim().parse::<u32>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(invalid(key, value)),
    }
}

fn boolean(value: &str, key: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(invalid(key, value)),
    }
}

fn check_range(key: &'static str, value: i64, min: i64, max: i64, signed: bool) -> Result<()> {
    let magnitude = if signed { value.abs() } else { value };
    if (signed && value < 0 && magnitude >= min && magnitude <= max)
        || (value >= min && value <= max)
    {
        return Ok(());
    }
    Err(RuleError::OutOfRange {
        key,
        value,
        min: if signed { -max } else { min },
        max,
    })
}

/// Parses a comma-separated BY* list into a sorted set. Signed lists accept
/// `-max..=-min` as well as `min..=max`.
fn int_set<T>(
    map: &BTreeMap<String, String>,
    key: &'static str,
    min: i64,
    max: i64,
    signed: bool,
) -> Result<Vec<T>>
where
    T: TryFrom<i64> + Ord + Copy,
{
    let Some(raw) = map.get(key) else {
        return Ok(Vec::new());
    };
    let name = part_name(key);
    let mut values = BTreeSet::new();
    for item in raw.split(',').map(str::trim) {
        let n: i64 = item.parse().map_err(|_| invalid(key, item))?;
        check_range(name, n, min, max, signed)?;
        values.insert(T::try_from(n).map_err(|_| invalid(key, item))?);
    }
    Ok(values.into_iter().collect())
}

fn part_name(key: &str) -> &'static str {
    match key {
        "bymonth" => "BYMONTH",
        "byweekno" => "BYWEEKNO",
        "byyearday" => "BYYEARDAY",
        "bymonthday" => "BYMONTHDAY",
        "byhour" => "BYHOUR",
        "byminute" => "BYMINUTE",
        "bysecond" => "BYSECOND",
        "bysetpos" => "BYSETPOS",
        _ => "BY*",
    }
}

fn weekday_list(map: &BTreeMap<String, String>) -> Result<Vec<WeekdayNum>> {
    let Some(raw) = map.get("byday") else {
        return Ok(Vec::new());
    };
    let mut days: Vec<WeekdayNum> = Vec::new();
    for item in raw.split(',') {
        let day: WeekdayNum = item.parse()?;
        if !days.contains(&day) {
            days.push(day);
        }
    }
    Ok(days)
}

fn timestamp(zone: &Zone, map: &BTreeMap<String, String>, key: &str) -> Result<Option<Timestamp>> {
    map.get(key)
        .map(|value| parse_timestamp(zone, key, value))
        .transpose()
}

fn parse_timestamp(zone: &Zone, key: &str, value: &str) -> Result<Timestamp> {
    zone.parse(value).ok_or_else(|| RuleError::InvalidTimestamp {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn timestamp_list(zone: &Zone, map: &BTreeMap<String, String>, key: &str) -> Result<Vec<Timestamp>> {
    let Some(raw) = map.get(key) else {
        return Ok(Vec::new());
    };
    raw.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(|item| parse_timestamp(zone, key, item))
        .collect()
}

/// RDATE entries: `start`, `start/duration` or `start/end`.
fn rdate_list(zone: &Zone, map: &BTreeMap<String, String>) -> Result<Vec<RDate>> {
    let Some(raw) = map.get("rdate") else {
        return Ok(Vec::new());
    };
    let mut rdates = Vec::new();
    for item in raw.split(',').map(str::trim).filter(|item| !item.is_empty()) {
        let (start, period) = match item.split_once('/') {
            Some((start, period)) => (start, Some(period.trim())),
            None => (item, None),
        };
        let start = parse_timestamp(zone, "rdate", start)?.instant;
        let (end, duration) = match period {
            None => (None, None),
            Some(period) if period.starts_with(['P', 'p', '+', '-']) => {
                (None, Some(Span::parse(period)?))
            }
            Some(period) => match Span::parse(period) {
                Ok(span) => (None, Some(span)),
                Err(_) => (Some(parse_timestamp(zone, "rdate", period)?.instant), None),
            },
        };
        rdates.push(RDate {
            start,
            end,
            duration,
        });
    }
    Ok(rdates)
}

