//! Five-field cron expressions: "MIN HOUR DOM MON DOW".
//!
//! Each field accepts `*`, `N`, `A-B`, `*/N`, `A-B/N` and comma lists of
//! those. Day-of-week is 0-7 with both 0 and 7 meaning Sunday. When both
//! day fields are restricted a day matches if either does (classic cron).
//! Times are evaluated in the time zone of the instant passed in, so
//! `0 0 * * *` with a `Local` instant means local midnight.

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, TimeZone};
use pokebot_core::error::{PokebotError, Result};

/// How far ahead `next_after` searches before giving up (covers Feb 29).
const MAX_LOOKAHEAD_DAYS: i64 = 366 * 8;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CronSpec {
    expression: String,
    minutes: Vec<u32>,
    hours: Vec<u32>,
    days_of_month: Vec<u32>,
    months: Vec<u32>,
    days_of_week: Vec<u32>,
    dom_restricted: bool,
    dow_restricted: bool,
}

impl CronSpec {
    pub fn parse(expression: &str) -> Result<Self> {
        let parts: Vec<&str> = expression.split_whitespace().collect();
        if parts.len() != 5 {
            return Err(PokebotError::Config(format!(
                "invalid cron expression '{expression}' (need 5 fields: MIN HOUR DOM MON DOW)"
            )));
        }

        let field = |idx: usize, min: u32, max: u32, name: &str| {
            parse_field(parts[idx], min, max).ok_or_else(|| {
                PokebotError::Config(format!(
                    "invalid {name} field '{}' in cron expression '{expression}'",
                    parts[idx]
                ))
            })
        };

        let mut days_of_week: Vec<u32> = field(4, 0, 7, "day-of-week")?
            .into_iter()
            .map(|d| d % 7)
            .collect();
        days_of_week.sort_unstable();
        days_of_week.dedup();

        Ok(Self {
            expression: parts.join(" "),
            minutes: field(0, 0, 59, "minute")?,
            hours: field(1, 0, 23, "hour")?,
            days_of_month: field(2, 1, 31, "day-of-month")?,
            months: field(3, 1, 12, "month")?,
            days_of_week,
            dom_restricted: parts[2] != "*",
            dow_restricted: parts[4] != "*",
        })
    }

    pub fn expression(&self) -> &str {
        &self.expression
    }

    fn matches_day(&self, date: NaiveDate) -> bool {
        if !self.months.contains(&date.month()) {
            return false;
        }
        let dom = self.days_of_month.contains(&date.day());
        let dow = self
            .days_of_week
            .contains(&date.weekday().num_days_from_sunday());
        match (self.dom_restricted, self.dow_restricted) {
            (true, true) => dom || dow,
            (true, false) => dom,
            (false, true) => dow,
            (false, false) => true,
        }
    }

    /// First matching minute strictly after `after`, in `after`'s time zone.
    /// Local times skipped by a DST change are passed over.
    pub fn next_after<Tz: TimeZone>(&self, after: &DateTime<Tz>) -> Option<DateTime<Tz>> {
        let tz = after.timezone();
        let local = after.naive_local();

        for offset in 0..MAX_LOOKAHEAD_DAYS {
            let date = local.date().checked_add_signed(Duration::days(offset))?;
            if !self.matches_day(date) {
                continue;
            }
            for &hour in &self.hours {
                for &minute in &self.minutes {
                    let Some(time) = NaiveTime::from_hms_opt(hour, minute, 0) else {
                        continue;
                    };
                    let candidate = date.and_time(time);
                    if candidate <= local {
                        continue;
                    }
                    if let Some(next) = tz.from_local_datetime(&candidate).earliest()
                        && next > *after
                    {
                        return Some(next);
                    }
                }
            }
        }
        None
    }
}

impl std::fmt::Display for CronSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.expression)
    }
}

/// Expand one field into its sorted matching values.
fn parse_field(field: &str, min: u32, max: u32) -> Option<Vec<u32>> {
    let mut values = Vec::new();
    for part in field.split(',') {
        let (range, step) = match part.split_once('/') {
            Some((range, step)) => (range, step.parse::<usize>().ok().filter(|n| *n > 0)?),
            None => (part, 1),
        };

        let (lo, hi) = if range == "*" {
            (min, max)
        } else if let Some((a, b)) = range.split_once('-') {
            (a.trim().parse().ok()?, b.trim().parse().ok()?)
        } else {
            let n: u32 = range.trim().parse().ok()?;
            // "5/15" means 5, 20, 35, ...
            (n, if step > 1 { max } else { n })
        };

        if lo < min || hi > max || lo > hi {
            return None;
        }
        values.extend((lo..=hi).step_by(step));
    }
    values.sort_unstable();
    values.dedup();
    Some(values)
}
