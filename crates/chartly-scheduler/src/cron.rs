// SPDX-License-Identifier: MIT OR Apache-2.0
//! A hand-rolled standard 5-field cron grammar: `minute hour day-of-month
//! month day-of-week`. Each field accepts `*`, a single value, a
//! comma-separated list, a range (`a-b`), or a step (`*/n`, `a-b/n`).

use chrono::{DateTime, Datelike, TimeZone, Timelike};
use std::collections::BTreeSet;

/// How far a [`CronSchedule::next_run_after`] search is allowed to look
/// ahead before giving up on a schedule that can never fire (e.g.
/// `0 0 30 2 *`, February 30th).
const MAX_LOOKAHEAD_MINUTES: i64 = 4 * 366 * 24 * 60;

/// Failures parsing a cron expression.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CronError {
    /// The expression did not have exactly 5 whitespace-separated fields.
    #[error("cron expression must have 5 fields, got {0}")]
    WrongFieldCount(usize),
    /// A field could not be parsed or contained an out-of-range value.
    #[error("invalid cron field {field:?}: {value:?}")]
    InvalidField {
        /// Field name (`minute`, `hour`, `day_of_month`, `month`, `day_of_week`).
        field: &'static str,
        /// The raw field text that failed to parse.
        value: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Field {
    values: BTreeSet<u32>,
    is_wildcard: bool,
}

impl Field {
    fn parse(raw: &str, field_name: &'static str, min: u32, max: u32) -> Result<Self, CronError> {
        let mut values = BTreeSet::new();
        let is_wildcard = raw == "*";
        for part in raw.split(',') {
            parse_part(part, min, max, &mut values)
                .map_err(|_| CronError::InvalidField { field: field_name, value: raw.to_string() })?;
        }
        if values.is_empty() {
            return Err(CronError::InvalidField { field: field_name, value: raw.to_string() });
        }
        Ok(Self { values, is_wildcard })
    }

    fn contains(&self, v: u32) -> bool {
        self.values.contains(&v)
    }
}

fn parse_part(part: &str, min: u32, max: u32, out: &mut BTreeSet<u32>) -> Result<(), ()> {
    let (range_part, step) = match part.split_once('/') {
        Some((r, s)) => (r, s.parse::<u32>().map_err(|_| ())?),
        None => (part, 1),
    };
    if step == 0 {
        return Err(());
    }
    let (lo, hi) = if range_part == "*" {
        (min, max)
    } else if let Some((a, b)) = range_part.split_once('-') {
        (a.parse::<u32>().map_err(|_| ())?, b.parse::<u32>().map_err(|_| ())?)
    } else {
        let v = range_part.parse::<u32>().map_err(|_| ())?;
        (v, v)
    };
    if lo > hi || lo < min || hi > max {
        return Err(());
    }
    let mut v = lo;
    while v <= hi {
        out.insert(v);
        v += step;
    }
    Ok(())
}

/// A parsed, ready-to-evaluate cron schedule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CronSchedule {
    minute: Field,
    hour: Field,
    day_of_month: Field,
    month: Field,
    day_of_week: Field,
}

impl CronSchedule {
    /// Parse a standard 5-field cron expression.
    ///
    /// # Errors
    ///
    /// Returns [`CronError`] if the expression does not have exactly 5
    /// fields or any field is malformed or out of range.
    pub fn parse(expr: &str) -> Result<Self, CronError> {
        let fields: Vec<&str> = expr.split_whitespace().collect();
        if fields.len() != 5 {
            return Err(CronError::WrongFieldCount(fields.len()));
        }
        Ok(Self {
            minute: Field::parse(fields[0], "minute", 0, 59)?,
            hour: Field::parse(fields[1], "hour", 0, 23)?,
            day_of_month: Field::parse(fields[2], "day_of_month", 1, 31)?,
            month: Field::parse(fields[3], "month", 1, 12)?,
            day_of_week: Field::parse(fields[4], "day_of_week", 0, 6)?,
        })
    }

    /// Does this schedule fire at `dt` (minute resolution)?
    ///
    /// Follows standard cron day semantics: if both `day_of_month` and
    /// `day_of_week` are restricted (non-`*`), a match on *either* fires;
    /// if only one is restricted, that one alone governs.
    #[must_use]
    pub fn matches<Tz: TimeZone>(&self, dt: &DateTime<Tz>) -> bool {
        if !self.minute.contains(dt.minute()) {
            return false;
        }
        if !self.hour.contains(dt.hour()) {
            return false;
        }
        if !self.month.contains(dt.month()) {
            return false;
        }
        let dom_hit = self.day_of_month.contains(dt.day());
        let dow_hit = self.day_of_week.contains(dt.weekday().num_days_from_sunday());
        match (self.day_of_month.is_wildcard, self.day_of_week.is_wildcard) {
            (true, true) => true,
            (false, true) => dom_hit,
            (true, false) => dow_hit,
            (false, false) => dom_hit || dow_hit,
        }
    }

    /// Find the first minute strictly after `after` at which this schedule
    /// fires, searching up to roughly 4 years ahead.
    ///
    /// Returns `None` if no matching minute is found within that horizon
    /// (e.g. a `day_of_month` that never occurs in the given `month`).
    #[must_use]
    pub fn next_run_after<Tz: TimeZone>(&self, after: &DateTime<Tz>) -> Option<DateTime<Tz>> {
        let mut candidate = truncate_to_minute(after) + chrono::Duration::minutes(1);
        for _ in 0..MAX_LOOKAHEAD_MINUTES {
            if self.matches(&candidate) {
                return Some(candidate);
            }
            candidate += chrono::Duration::minutes(1);
        }
        None
    }
}

fn truncate_to_minute<Tz: TimeZone>(dt: &DateTime<Tz>) -> DateTime<Tz> {
    dt.clone() - chrono::Duration::seconds(i64::from(dt.second())) - chrono::Duration::nanoseconds(i64::from(dt.nanosecond()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
    }

    #[test]
    fn rejects_expressions_without_exactly_five_fields() {
        assert_eq!(CronSchedule::parse("* * *").unwrap_err(), CronError::WrongFieldCount(3));
    }

    #[test]
    fn wildcard_schedule_matches_every_minute() {
        let s = CronSchedule::parse("* * * * *").unwrap();
        assert!(s.matches(&at(2024, 1, 1, 13, 37)));
    }

    #[test]
    fn exact_minute_and_hour_match_only_that_slot() {
        let s = CronSchedule::parse("30 9 * * *").unwrap();
        assert!(s.matches(&at(2024, 1, 1, 9, 30)));
        assert!(!s.matches(&at(2024, 1, 1, 9, 31)));
        assert!(!s.matches(&at(2024, 1, 1, 10, 30)));
    }

    #[test]
    fn step_field_matches_every_nth_value() {
        let s = CronSchedule::parse("*/15 * * * *").unwrap();
        assert!(s.matches(&at(2024, 1, 1, 0, 0)));
        assert!(s.matches(&at(2024, 1, 1, 0, 15)));
        assert!(!s.matches(&at(2024, 1, 1, 0, 20)));
    }

    #[test]
    fn day_of_month_and_day_of_week_are_ored_when_both_restricted() {
        // Fires on the 1st of the month OR on Mondays.
        let s = CronSchedule::parse("0 0 1 * 1").unwrap();
        assert!(s.matches(&at(2024, 3, 1, 0, 0))); // 1st (a Friday)
        assert!(s.matches(&at(2024, 3, 4, 0, 0))); // a Monday
        assert!(!s.matches(&at(2024, 3, 5, 0, 0))); // neither
    }

    #[test]
    fn next_run_after_finds_the_following_matching_minute() {
        let s = CronSchedule::parse("30 9 * * *").unwrap();
        let next = s.next_run_after(&at(2024, 1, 1, 9, 30)).unwrap();
        assert_eq!(next, at(2024, 1, 2, 9, 30));
    }

    #[test]
    fn next_run_after_returns_none_for_an_impossible_schedule() {
        let s = CronSchedule::parse("0 0 30 2 *").unwrap();
        assert!(s.next_run_after(&at(2024, 1, 1, 0, 0)).is_none());
    }

    #[test]
    fn out_of_range_value_is_rejected() {
        assert!(CronSchedule::parse("60 * * * *").is_err());
    }
}
