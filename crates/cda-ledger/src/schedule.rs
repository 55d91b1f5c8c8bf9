// Copyright 2026 Boundless Foundation, Inc.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Calendar triggers and month-window arithmetic. Triggers expose next-fire
//! semantics over an explicit `after` instant so tests drive time by
//! argument instead of waiting on wall-clock intervals.

use std::str::FromStr;

use chrono::{DateTime, Datelike, NaiveDate, TimeZone, Utc};
use thiserror::Error;

#[derive(Debug, Error)]
#[error("invalid cron expression `{expression}`: {reason}")]
pub struct InvalidCronExpr {
    pub expression: String,
    pub reason: String,
}

/// A cron-expression trigger. Accepts the common 5-field form
/// (`min hour dom month dow`) as well as the 6-field form with seconds.
#[derive(Debug, Clone)]
pub struct CronTrigger {
    schedule: cron::Schedule,
    expression: String,
}

impl FromStr for CronTrigger {
    type Err = InvalidCronExpr;

    fn from_str(expression: &str) -> Result<Self, Self::Err> {
        let normalized = if expression.split_whitespace().count() == 5 {
            format!("0 {expression}")
        } else {
            expression.to_string()
        };
        let schedule = cron::Schedule::from_str(&normalized).map_err(|err| InvalidCronExpr {
            expression: expression.to_string(),
            reason: err.to_string(),
        })?;
        Ok(Self { schedule, expression: expression.to_string() })
    }
}

impl CronTrigger {
    /// The next instant strictly after `after` at which this trigger fires.
    pub fn next_fire(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.schedule.after(&after).next()
    }

    pub fn expression(&self) -> &str {
        &self.expression
    }
}

/// Current Unix timestamp in seconds.
pub fn now_secs() -> u64 {
    Utc::now().timestamp().max(0) as u64
}

/// The `YYYY-MM` key used for monthly reward records and reports.
pub fn month_key(at: DateTime<Utc>) -> String {
    format!("{:04}-{:02}", at.year(), at.month())
}

fn month_start(year: i32, month: u32) -> DateTime<Utc> {
    let date = NaiveDate::from_ymd_opt(year, month, 1).expect("first of month is a valid date");
    Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0).expect("midnight is a valid time"))
}

/// Half-open window `[start of previous month, start of current month)`
/// relative to `now`.
pub fn previous_month_window(now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
    let current = month_start(now.year(), now.month());
    let previous = if now.month() == 1 {
        month_start(now.year() - 1, 12)
    } else {
        month_start(now.year(), now.month() - 1)
    };
    (previous, current)
}

#[cfg(test)]
mod tests {
    use chrono::Timelike;

    use super::*;

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
    }

    #[test]
    fn five_field_expression_is_accepted() {
        let trigger: CronTrigger = "0 0 1 8 *".parse().unwrap();
        let next = trigger.next_fire(utc(2026, 3, 15, 12, 0)).unwrap();
        assert_eq!((next.year(), next.month(), next.day()), (2026, 8, 1));
        assert_eq!((next.hour(), next.minute()), (0, 0));
    }

    #[test]
    fn annual_trigger_rolls_to_next_year_after_firing() {
        let trigger: CronTrigger = "0 0 1 8 *".parse().unwrap();
        let next = trigger.next_fire(utc(2026, 8, 1, 0, 0)).unwrap();
        assert_eq!((next.year(), next.month(), next.day()), (2027, 8, 1));
    }

    #[test]
    fn daily_trigger_fires_each_day() {
        let trigger: CronTrigger = "0 9 * * *".parse().unwrap();
        let next = trigger.next_fire(utc(2026, 3, 15, 10, 0)).unwrap();
        assert_eq!((next.day(), next.hour()), (16, 9));
    }

    #[test]
    fn invalid_expression_is_rejected() {
        assert!("not a cron".parse::<CronTrigger>().is_err());
    }

    #[test]
    fn month_key_format() {
        assert_eq!(month_key(utc(2026, 7, 14, 3, 0)), "2026-07");
    }

    #[test]
    fn previous_month_window_mid_year() {
        let (start, end) = previous_month_window(utc(2026, 8, 1, 0, 30));
        assert_eq!(start, utc(2026, 7, 1, 0, 0));
        assert_eq!(end, utc(2026, 8, 1, 0, 0));
    }

    #[test]
    fn previous_month_window_across_year_boundary() {
        let (start, end) = previous_month_window(utc(2026, 1, 1, 1, 0));
        assert_eq!(start, utc(2025, 12, 1, 0, 0));
        assert_eq!(end, utc(2026, 1, 1, 0, 0));
    }
}
