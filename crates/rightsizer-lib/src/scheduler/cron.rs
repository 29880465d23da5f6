//! Cron expressions
//!
//! Supports the standard five-field form (`minute hour day-of-month month
//! day-of-week`) with lists, ranges, steps and month/weekday names, plus the
//! `@hourly`, `@daily`, `@weekly`, `@monthly`, `@yearly` and `@every <dur>`
//! descriptors. All times are UTC.

use crate::policy::parse_duration;
use chrono::{DateTime, Datelike, Duration as ChronoDuration, NaiveDate, TimeZone, Timelike, Utc};
use std::time::Duration;
use thiserror::Error;

/// How far ahead `next_after` searches before giving up
const SEARCH_HORIZON_DAYS: i64 = 366 * 5;

const MONTH_NAMES: &[&str] = &[
    "JAN", "FEB", "MAR", "APR", "MAY", "JUN", "JUL", "AUG", "SEP", "OCT", "NOV", "DEC",
];
const WEEKDAY_NAMES: &[&str] = &["SUN", "MON", "TUE", "WED", "THU", "FRI", "SAT"];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CronError {
    #[error("expected 5 fields, found {0}")]
    FieldCount(usize),
    #[error("invalid {field} field '{value}'")]
    InvalidField { field: &'static str, value: String },
    #[error("invalid @every interval '{0}'")]
    InvalidInterval(String),
    #[error("unknown descriptor '{0}'")]
    UnknownDescriptor(String),
}

#[derive(Debug, Clone, Copy)]
struct FieldSpec {
    name: &'static str,
    min: u32,
    max: u32,
    names: &'static [&'static str],
    /// Offset of the first entry of `names`
    name_base: u32,
}

const MINUTE: FieldSpec = FieldSpec { name: "minute", min: 0, max: 59, names: &[], name_base: 0 };
const HOUR: FieldSpec = FieldSpec { name: "hour", min: 0, max: 23, names: &[], name_base: 0 };
const DAY_OF_MONTH: FieldSpec = FieldSpec { name: "day-of-month", min: 1, max: 31, names: &[], name_base: 0 };
const MONTH: FieldSpec = FieldSpec { name: "month", min: 1, max: 12, names: MONTH_NAMES, name_base: 1 };
// 7 is accepted as an alias for Sunday
const DAY_OF_WEEK: FieldSpec = FieldSpec { name: "day-of-week", min: 0, max: 7, names: WEEKDAY_NAMES, name_base: 0 };

/// Set of permitted values for one field, as a bitmask
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FieldSet {
    bits: u64,
    any: bool,
}

impl FieldSet {
    fn contains(&self, value: u32) -> bool {
        self.bits & (1 << value) != 0
    }
}

/// Permitted values of each of the five fields
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CronFields {
    minute: FieldSet,
    hour: FieldSet,
    day_of_month: FieldSet,
    month: FieldSet,
    day_of_week: FieldSet,
}

impl CronFields {
    fn day_matches(&self, t: &DateTime<Utc>) -> bool {
        let dom = self.day_of_month.contains(t.day());
        let dow = self.day_of_week.contains(t.weekday().num_days_from_sunday());
        // Classic cron: when both day fields are restricted, either may match
        if self.day_of_month.any || self.day_of_week.any {
            dom && dow
        } else {
            dom || dow
        }
    }
}

/// A parsed schedule
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CronSchedule {
    Every(Duration),
    Fields(CronFields),
}

impl CronSchedule {
    pub fn parse(expr: &str) -> Result<Self, CronError> {
        let expr = expr.trim();
        if let Some(descriptor) = expr.strip_prefix('@') {
            return Self::parse_descriptor(descriptor);
        }

        let parts: Vec<&str> = expr.split_whitespace().collect();
        if parts.len() != 5 {
            return Err(CronError::FieldCount(parts.len()));
        }

        let mut day_of_week = parse_field(parts[4], DAY_OF_WEEK)?;
        if day_of_week.contains(7) {
            day_of_week.bits |= 1;
            day_of_week.bits &= !(1 << 7);
        }

        Ok(CronSchedule::Fields(CronFields {
            minute: parse_field(parts[0], MINUTE)?,
            hour: parse_field(parts[1], HOUR)?,
            day_of_month: parse_field(parts[2], DAY_OF_MONTH)?,
            month: parse_field(parts[3], MONTH)?,
            day_of_week,
        }))
    }

    fn parse_descriptor(descriptor: &str) -> Result<Self, CronError> {
        if let Some(interval) = descriptor.strip_prefix("every") {
            let interval = interval.trim();
            return match parse_duration(interval) {
                // Longer intervals could overrun chrono's date range
                Ok(d) if !d.is_zero() && d <= max_interval() => Ok(CronSchedule::Every(d)),
                _ => Err(CronError::InvalidInterval(interval.to_string())),
            };
        }

        let expr = match descriptor {
            "yearly" | "annually" => "0 0 1 1 *",
            "monthly" => "0 0 1 * *",
            "weekly" => "0 0 * * 0",
            "daily" | "midnight" => "0 0 * * *",
            "hourly" => "0 * * * *",
            other => return Err(CronError::UnknownDescriptor(other.to_string())),
        };
        Self::parse(expr)
    }

    /// First fire time strictly after `after`
    pub fn next_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            CronSchedule::Every(interval) => {
                after.checked_add_signed(ChronoDuration::from_std(*interval).ok()?)
            }
            CronSchedule::Fields(fields) => next_matching(fields, after),
        }
    }
}

fn next_matching(fields: &CronFields, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let mut t = (after + ChronoDuration::minutes(1))
        .with_second(0)?
        .with_nanosecond(0)?;
    let horizon = after.checked_add_signed(ChronoDuration::days(SEARCH_HORIZON_DAYS))?;

    while t <= horizon {
        if !fields.month.contains(t.month()) {
            let (year, month) = if t.month() == 12 {
                (t.year() + 1, 1)
            } else {
                (t.year(), t.month() + 1)
            };
            t = midnight(NaiveDate::from_ymd_opt(year, month, 1)?)?;
            continue;
        }
        if !fields.day_matches(&t) {
            t = midnight(t.date_naive().succ_opt()?)?;
            continue;
        }
        if !fields.hour.contains(t.hour()) {
            t = t.with_minute(0)? + ChronoDuration::hours(1);
            continue;
        }
        if !fields.minute.contains(t.minute()) {
            t += ChronoDuration::minutes(1);
            continue;
        }
        return Some(t);
    }
    None
}

fn max_interval() -> Duration {
    Duration::from_secs(SEARCH_HORIZON_DAYS as u64 * 24 * 3600)
}

fn midnight(date: NaiveDate) -> Option<DateTime<Utc>> {
    Some(Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0)?))
}

fn parse_field(raw: &str, spec: FieldSpec) -> Result<FieldSet, CronError> {
    let invalid = || CronError::InvalidField {
        field: spec.name,
        value: raw.to_string(),
    };

    let mut bits = 0u64;
    let mut any = false;
    for item in raw.split(',') {
        let (range, step) = match item.split_once('/') {
            Some((range, step)) => {
                let step: u32 = step.parse().map_err(|_| invalid())?;
                if step == 0 {
                    return Err(invalid());
                }
                (range, step)
            }
            None => (item, 1),
        };

        let (start, end) = if range == "*" {
            any = any || step == 1;
            (spec.min, spec.max)
        } else if let Some((lo, hi)) = range.split_once('-') {
            (parse_value(lo, spec).ok_or_else(invalid)?, parse_value(hi, spec).ok_or_else(invalid)?)
        } else {
            let start = parse_value(range, spec).ok_or_else(invalid)?;
            // `5/15` means every 15 starting at 5
            let end = if item.contains('/') { spec.max } else { start };
            (start, end)
        };

        if start > end {
            return Err(invalid());
        }
        for value in (start..=end).step_by(step as usize) {
            bits |= 1 << value;
        }
    }

    Ok(FieldSet { bits, any })
}

fn parse_value(raw: &str, spec: FieldSpec) -> Option<u32> {
    let value = match raw.parse::<u32>() {
        Ok(v) => v,
        Err(_) => {
            let upper = raw.to_ascii_uppercase();
            let index = spec.names.iter().position(|n| *n == upper)?;
            index as u32 + spec.name_base
        }
    };
    (spec.min..=spec.max).contains(&value).then_some(value)
}
