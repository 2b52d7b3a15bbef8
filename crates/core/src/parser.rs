use anyhow::{anyhow, Context, Result};
use chrono::{prelude::*, Days, Duration};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::schedule;

/// Hour used when a date is given without a time of day.
const DEFAULT_HOUR: u32 = 9;

static RELATIVE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\+(\d+)([dwh])$").expect("valid regex"));

const DATETIME_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
];

/// Parse a human date/time specification relative to `now`, in `now`'s time zone.
///
/// Accepts `now`, `today`, `tomorrow`, `+Nd`/`+Nw`/`+Nh`, weekday names,
/// RFC 3339, `YYYY-MM-DD[ HH:MM]` and a bare `HH:MM` (today).
pub fn parse_when<Tz: TimeZone>(spec: &str, now: &DateTime<Tz>) -> Result<DateTime<Tz>> {
    let trimmed = spec.trim();
    if trimmed.is_empty() {
        return Err(anyhow!("Date specification cannot be empty"));
    }

    let lower = trimmed.to_ascii_lowercase();
    let tz = now.timezone();
    let today = now.date_naive();

    match lower.as_str() {
        "now" => return Ok(now.clone()),
        "today" => return at_default_hour(&tz, today),
        "tomorrow" => {
            let date = today
                .checked_add_days(Days::new(1))
                .ok_or_else(|| anyhow!("Date out of range"))?;
            return at_default_hour(&tz, date);
        }
        _ => {}
    }

    if let Some(caps) = RELATIVE_RE.captures(&lower) {
        let value: u32 = caps[1].parse().context("Invalid relative offset")?;
        return match &caps[2] {
            "d" => Ok(schedule::add_calendar_days(now, value)?.with_timezone(&tz)),
            "w" => Ok(schedule::add_calendar_days(now, value.saturating_mul(7))?.with_timezone(&tz)),
            _ => Ok(now.clone() + Duration::hours(i64::from(value))),
        };
    }

    if let Some(weekday) = parse_weekday(&lower) {
        let mut days_ahead = (weekday.num_days_from_monday() as i64
            - today.weekday().num_days_from_monday() as i64)
            .rem_euclid(7);
        if days_ahead == 0 {
            days_ahead = 7;
        }
        let date = today
            .checked_add_days(Days::new(days_ahead as u64))
            .ok_or_else(|| anyhow!("Date out of range"))?;
        return at_default_hour(&tz, date);
    }

    if let Ok(parsed) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(parsed.with_timezone(&tz));
    }

    for format in DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, format) {
            return resolve(&tz, naive);
        }
    }

    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return at_default_hour(&tz, date);
    }

    if let Ok(time) = NaiveTime::parse_from_str(trimmed, "%H:%M") {
        return resolve(&tz, today.and_time(time));
    }

    Err(anyhow!(
        "Unrecognized date specification '{}'. Try YYYY-MM-DD, YYYY-MM-DD HH:MM, today, tomorrow, +3d, mon",
        spec
    ))
}

/// Parse several specifications against the same `now`, preserving their order.
pub fn parse_all<Tz: TimeZone>(specs: &[String], now: &DateTime<Tz>) -> Result<Vec<DateTime<Utc>>> {
    specs
        .iter()
        .map(|spec| parse_when(spec, now).map(|dt| dt.with_timezone(&Utc)))
        .collect()
}

fn at_default_hour<Tz: TimeZone>(tz: &Tz, date: NaiveDate) -> Result<DateTime<Tz>> {
    let naive = date
        .and_hms_opt(DEFAULT_HOUR, 0, 0)
        .ok_or_else(|| anyhow!("Invalid default hour"))?;
    resolve(tz, naive)
}

fn resolve<Tz: TimeZone>(tz: &Tz, naive: NaiveDateTime) -> Result<DateTime<Tz>> {
    tz.from_local_datetime(&naive)
        .earliest()
        .ok_or_else(|| anyhow!("Local time {} does not exist in this time zone", naive))
}

fn parse_weekday(label: &str) -> Option<Weekday> {
    match label {
        "mon" | "monday" => Some(Weekday::Mon),
        "tue" | "tuesday" => Some(Weekday::Tue),
        "wed" | "wednesday" => Some(Weekday::Wed),
        "thu" | "thursday" => Some(Weekday::Thu),
        "fri" | "friday" => Some(Weekday::Fri),
        "sat" | "saturday" => Some(Weekday::Sat),
        "sun" | "sunday" => Some(Weekday::Sun),
        _ => None,
    }
}
