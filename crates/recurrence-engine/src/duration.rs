//! RFC 5545 duration values.
//!
//! Weeks and days are nominal: adding one day keeps the wall-clock time even when
//! a DST transition happens in between. Hours, minutes and seconds are exact.

use std::fmt;

use chrono::{DateTime, TimeZone};

use crate::error::{Result, RuleError};

/// A signed span of nominal days plus exact seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Span {
    days: i64,
    seconds: i64,
}

impl Span {
    pub const ZERO: Span = Span {
        days: 0,
        seconds: 0,
    };

    pub fn new(days: i64, seconds: i64) -> Self {
        Self { days, seconds }
    }

    pub fn from_days(days: i64) -> Self {
        Self { days, seconds: 0 }
    }

    pub fn from_seconds(seconds: i64) -> Self {
        Self { days: 0, seconds }
    }

    /// The exact elapsed time between two instants.
    pub fn between<A: TimeZone, B: TimeZone>(start: &DateTime<A>, end: &DateTime<B>) -> Self {
        Self::from_seconds(end.timestamp() - start.timestamp())
    }

    pub fn days(&self) -> i64 {
        self.days
    }

    pub fn seconds(&self) -> i64 {
        self.seconds
    }

    pub fn is_zero(&self) -> bool {
        self.days == 0 && self.seconds == 0
    }

    /// Upper bound on the elapsed seconds, allowing a day to last 25 hours.
    pub(crate) fn max_seconds(&self) -> i64 {
        self.days.max(0) * 90_000 + self.seconds.max(0)
    }

    /// Parses a `dur-value` such as `P1W`, `-P2DT3H` or `PT15M`. A bare integer is
    /// read as a number of seconds.
    pub fn parse(input: &str) -> Result<Self> {
        let raw = input.trim();
        let invalid = || RuleError::InvalidDuration(input.to_string());

        if let Ok(seconds) = raw.parse::<i64>() {
            return Ok(Self::from_seconds(seconds));
        }

        let (negative, rest) = match raw.as_bytes().first() {
            Some(b'-') => (true, &raw[1..]),
            Some(b'+') => (false, &raw[1..]),
            _ => (false, raw),
        };
        let rest = rest
            .strip_prefix('P')
            .or_else(|| rest.strip_prefix('p'))
            .ok_or_else(invalid)?;

        let (date_part, time_part) = match rest.find(['T', 't']) {
            Some(at) => (&rest[..at], Some(&rest[at + 1..])),
            None => (rest, None),
        };

        let mut span = Span::ZERO;
        let mut seen_any = false;

        for (value, unit) in components(date_part).ok_or_else(invalid)? {
            seen_any = true;
            let days = match unit {
                'W' => value.checked_mul(7),
                'D' => Some(value),
                _ => return Err(invalid()),
            };
            span.days = days
                .and_then(|days| span.days.checked_add(days))
                .ok_or_else(invalid)?;
        }

        if let Some(time_part) = time_part {
            let parts = components(time_part).ok_or_else(invalid)?;
            if parts.is_empty() {
                return Err(invalid());
            }
            for (value, unit) in parts {
                seen_any = true;
                let factor = match unit {
                    'H' => 3600,
                    'M' => 60,
                    'S' => 1,
                    _ => return Err(invalid()),
                };
                span.seconds = value
                    .checked_mul(factor)
                    .and_then(|seconds| span.seconds.checked_add(seconds))
                    .ok_or_else(invalid)?;
            }
        }

        if !seen_any {
            return Err(invalid());
        }
        if negative {
            span = Span::new(-span.days, -span.seconds);
        }
        Ok(span)
    }
}

/// Splits `1D2H` style text into `(value, designator)` pairs.
fn components(text: &str) -> Option<Vec<(i64, char)>> {
    let mut out = Vec::new();
    let mut digits = String::new();
    for c in text.chars() {
        if c.is_ascii_digit() {
            digits.push(c);
        } else {
            if digits.is_empty() {
                return None;
            }
            let unit = c.to_ascii_uppercase();
            if out.iter().any(|&(_, seen)| seen == unit) {
                return None;
            }
            out.push((digits.parse().ok()?, unit));
            digits.clear();
        }
    }
    if !digits.is_empty() {
        return None;
    }
    Some(out)
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_zero() {
            return f.write_str("PT0S");
        }
        let negative = self.days < 0 || (self.days == 0 && self.seconds < 0);
        let days = self.days.abs();
        let seconds = self.seconds.abs();
        if negative {
            f.write_str("-")?;
        }
        f.write_str("P")?;
        if days > 0 {
            write!(f, "{days}D")?;
        }
        if seconds > 0 {
            f.write_str("T")?;
            let (h, m, s) = (seconds / 3600, seconds % 3600 / 60, seconds % 60);
            if h > 0 {
                write!(f, "{h}H")?;
            }
            if m > 0 {
                write!(f, "{m}M")?;
            }
            if s > 0 {
                write!(f, "{s}S")?;
            }
        }
        Ok(())
    }
}
