// src/cron.rs

//! Five-field cron expression evaluation for workflow schedules.
//!
//! Standard `minute hour day-of-month month day-of-week` with Sunday as
//! 0. Each field accepts `*`, explicit values, `*/N` steps, ranges
//! (`1-5`), and comma lists (`1,3,5`). Next-run computation scans
//! forward at minute granularity and returns the smallest instant
//! strictly after the reference time, so a schedule never re-fires on
//! the minute it just matched.

use crate::error::{Error, Result};
use chrono::{DateTime, Datelike, Duration, TimeZone, Timelike, Utc};
use std::fmt;
use std::str::FromStr;

/// One term within a cron field
#[derive(Debug, Clone, PartialEq, Eq)]
enum Term {
    Any,
    Step(u32),
    Value(u32),
    Range(u32, u32),
}

impl Term {
    fn matches(&self, value: u32) -> bool {
        match self {
            Term::Any => true,
            Term::Step(n) => value % n == 0,
            Term::Value(v) => *v == value,
            Term::Range(start, end) => value >= *start && value <= *end,
        }
    }
}

/// One of the five cron fields: a list of terms, matching if any does
#[derive(Debug, Clone, PartialEq, Eq)]
struct Field {
    terms: Vec<Term>,
}

impl Field {
    fn parse(input: &str, min: u32, max: u32, name: &str) -> Result<Self> {
        let mut terms = Vec::new();

        for part in input.split(',') {
            let part = part.trim();
            if part.is_empty() {
                return Err(Error::Cron(format!("empty {name} term")));
            }

            let term = if part == "*" {
                Term::Any
            } else if let Some(step) = part.strip_prefix("*/") {
                let n: u32 = step
                    .parse()
                    .map_err(|_| Error::Cron(format!("bad {name} step: {part}")))?;
                if n == 0 {
                    return Err(Error::Cron(format!("zero {name} step")));
                }
                Term::Step(n)
            } else if let Some((start, end)) = part.split_once('-') {
                let start: u32 = start
                    .parse()
                    .map_err(|_| Error::Cron(format!("bad {name} range: {part}")))?;
                let end: u32 = end
                    .parse()
                    .map_err(|_| Error::Cron(format!("bad {name} range: {part}")))?;
                if start > end || start < min || end > max {
                    return Err(Error::Cron(format!("{name} range out of bounds: {part}")));
                }
                Term::Range(start, end)
            } else {
                let v: u32 = part
                    .parse()
                    .map_err(|_| Error::Cron(format!("bad {name} value: {part}")))?;
                if v < min || v > max {
                    return Err(Error::Cron(format!(
                        "{name} value {v} out of range {min}-{max}"
                    )));
                }
                Term::Value(v)
            };

            terms.push(term);
        }

        Ok(Self { terms })
    }

    fn matches(&self, value: u32) -> bool {
        self.terms.iter().any(|t| t.matches(value))
    }
}

/// A parsed five-field cron expression
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CronExpression {
    source: String,
    minute: Field,
    hour: Field,
    day_of_month: Field,
    month: Field,
    day_of_week: Field,
}

impl CronExpression {
    /// Longest forward scan: a year of minutes covers every satisfiable
    /// expression with these field types.
    const MAX_SCAN_MINUTES: i64 = 366 * 24 * 60;

    pub fn parse(expression: &str) -> Result<Self> {
        let parts: Vec<&str> = expression.split_whitespace().collect();
        if parts.len() != 5 {
            return Err(Error::Cron(format!(
                "expected 5 fields, got {}: {expression}",
                parts.len()
            )));
        }

        Ok(Self {
            source: expression.to_string(),
            minute: Field::parse(parts[0], 0, 59, "minute")?,
            hour: Field::parse(parts[1], 0, 23, "hour")?,
            day_of_month: Field::parse(parts[2], 1, 31, "day-of-month")?,
            month: Field::parse(parts[3], 1, 12, "month")?,
            day_of_week: Field::parse(parts[4], 0, 6, "day-of-week")?,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Whether the given instant (at minute resolution) matches
    pub fn matches(&self, dt: DateTime<Utc>) -> bool {
        self.minute.matches(dt.minute())
            && self.hour.matches(dt.hour())
            && self.day_of_month.matches(dt.day())
            && self.month.matches(dt.month())
            && self.day_of_week.matches(dt.weekday().num_days_from_sunday())
    }

    /// The smallest minute-resolution instant strictly after `now` that
    /// matches all five fields.
    pub fn next_after(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        // Truncate to the minute, then step forward from the next one
        let base = Utc
            .with_ymd_and_hms(now.year(), now.month(), now.day(), now.hour(), now.minute(), 0)
            .single()?;

        let mut candidate = base + Duration::minutes(1);
        for _ in 0..Self::MAX_SCAN_MINUTES {
            if self.matches(candidate) {
                return Some(candidate);
            }
            candidate += Duration::minutes(1);
        }

        None
    }
}

impl fmt::Display for CronExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.source)
    }
}

impl FromStr for CronExpression {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn test_parse_rejects_wrong_field_count() {
        assert!(CronExpression::parse("* * * *").is_err());
        assert!(CronExpression::parse("* * * * * *").is_err());
        assert!(CronExpression::parse("").is_err());
    }

    #[test]
    fn test_parse_rejects_out_of_range() {
        assert!(CronExpression::parse("60 * * * *").is_err());
        assert!(CronExpression::parse("* 24 * * *").is_err());
        assert!(CronExpression::parse("* * 0 * *").is_err());
        assert!(CronExpression::parse("* * * 13 *").is_err());
        assert!(CronExpression::parse("* * * * 7").is_err());
        assert!(CronExpression::parse("*/0 * * * *").is_err());
    }

    #[test]
    fn test_daily_at_two_rolls_forward() {
        let cron = CronExpression::parse("0 2 * * *").unwrap();

        // Before 02:00: same day
        let next = cron.next_after(at("2026-03-10T01:15:00Z")).unwrap();
        assert_eq!(next, at("2026-03-10T02:00:00Z"));

        // After 02:00: next day
        let next = cron.next_after(at("2026-03-10T14:30:00Z")).unwrap();
        assert_eq!(next, at("2026-03-11T02:00:00Z"));

        // Exactly 02:00: strictly greater, so next day
        let next = cron.next_after(at("2026-03-10T02:00:00Z")).unwrap();
        assert_eq!(next, at("2026-03-11T02:00:00Z"));
    }

    #[test]
    fn test_step_every_fifteen_minutes() {
        let cron = CronExpression::parse("*/15 * * * *").unwrap();

        let next = cron.next_after(at("2026-03-10T10:07:00Z")).unwrap();
        assert_eq!(next, at("2026-03-10T10:15:00Z"));

        // From an exact match, the next slot
        let next = cron.next_after(at("2026-03-10T10:45:00Z")).unwrap();
        assert_eq!(next, at("2026-03-10T11:00:00Z"));
    }

    #[test]
    fn test_weekly_sunday() {
        // 2026-03-08 is a Sunday
        let cron = CronExpression::parse("30 3 * * 0").unwrap();

        let next = cron.next_after(at("2026-03-05T12:00:00Z")).unwrap();
        assert_eq!(next, at("2026-03-08T03:30:00Z"));
        assert_eq!(next.weekday().num_days_from_sunday(), 0);
    }

    #[test]
    fn test_range_and_list() {
        // Weekdays at 09:00
        let cron = CronExpression::parse("0 9 * * 1-5").unwrap();
        // 2026-03-07 is a Saturday; next weekday is Monday the 9th
        let next = cron.next_after(at("2026-03-07T10:00:00Z")).unwrap();
        assert_eq!(next, at("2026-03-09T09:00:00Z"));

        // First of January and July
        let cron = CronExpression::parse("0 0 1 1,7 *").unwrap();
        let next = cron.next_after(at("2026-03-01T00:00:00Z")).unwrap();
        assert_eq!(next, at("2026-07-01T00:00:00Z"));
    }

    #[test]
    fn test_monthly_day() {
        let cron = CronExpression::parse("0 4 15 * *").unwrap();

        let next = cron.next_after(at("2026-01-20T00:00:00Z")).unwrap();
        assert_eq!(next, at("2026-02-15T04:00:00Z"));
    }

    #[test]
    fn test_every_minute() {
        let cron = CronExpression::parse("* * * * *").unwrap();

        let next = cron.next_after(at("2026-03-10T10:07:30Z")).unwrap();
        assert_eq!(next, at("2026-03-10T10:08:00Z"));
    }

    #[test]
    fn test_matches_sub_minute_truncation() {
        let cron = CronExpression::parse("0 2 * * *").unwrap();
        assert!(cron.matches(at("2026-03-10T02:00:45Z")));
        assert!(!cron.matches(at("2026-03-10T02:01:00Z")));
    }
}
