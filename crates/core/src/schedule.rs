//! Derives concrete reminder timestamps from a start date and a template or custom dates.

use chrono::{DateTime, Days, Duration, NaiveDateTime, TimeZone, Utc};

use crate::error::ScheduleError;
use crate::templates;

/// Caller-maintained list of explicit reminder dates.
///
/// Dates are kept exactly as added: no sorting and no deduplication.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CustomSchedule {
    dates: Vec<DateTime<Utc>>,
}

impl CustomSchedule {
    pub fn new(dates: Vec<DateTime<Utc>>) -> Self {
        Self { dates }
    }

    pub fn add(&mut self, date: DateTime<Utc>) {
        self.dates.push(date);
    }

    pub fn dates(&self) -> &[DateTime<Utc>] {
        &self.dates
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Selection {
    #[default]
    None,
    Template(String),
    Custom(CustomSchedule),
}

impl Selection {
    pub fn template(id: impl Into<String>) -> Self {
        Selection::Template(id.into())
    }

    pub fn custom(dates: Vec<DateTime<Utc>>) -> Self {
        Selection::Custom(CustomSchedule::new(dates))
    }
}

/// Produce the reminder timestamps for `selection`, anchored at `start`.
///
/// Template offsets are whole calendar days in `start`'s own time zone, so the
/// wall-clock time of day survives daylight-saving transitions.
pub fn derive<Tz: TimeZone>(
    start: &DateTime<Tz>,
    selection: &Selection,
) -> Result<Vec<DateTime<Utc>>, ScheduleError> {
    match selection {
        Selection::None => Ok(Vec::new()),
        Selection::Custom(custom) => Ok(custom.dates().to_vec()),
        Selection::Template(id) => {
            let template =
                templates::lookup(id).ok_or_else(|| ScheduleError::UnknownTemplate(id.clone()))?;
            template
                .offsets
                .iter()
                .map(|offset| add_calendar_days(start, *offset))
                .collect()
        }
    }
}

/// Advance `start` by `days` calendar days, keeping its local time of day.
pub fn add_calendar_days<Tz: TimeZone>(
    start: &DateTime<Tz>,
    days: u32,
) -> Result<DateTime<Utc>, ScheduleError> {
    let local = start.naive_local();
    let date = local
        .date()
        .checked_add_days(Days::new(u64::from(days)))
        .ok_or(ScheduleError::OutOfRange(days))?;
    let target = date.and_time(local.time());
    resolve_local(&start.timezone(), target).ok_or(ScheduleError::OutOfRange(days))
}

// Ambiguous wall times (clocks falling back) resolve to the earlier instant.
// Skipped wall times (clocks springing forward) move past the gap.
fn resolve_local<Tz: TimeZone>(tz: &Tz, naive: NaiveDateTime) -> Option<DateTime<Utc>> {
    if let Some(dt) = tz.from_local_datetime(&naive).earliest() {
        return Some(dt.with_timezone(&Utc));
    }
    let shifted = naive.checked_add_signed(Duration::hours(1))?;
    tz.from_local_datetime(&shifted)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono_tz::America::New_York;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    #[test]
    fn water_template_from_new_year() {
        let start = utc(2024, 1, 1, 9, 0);
        let dates = derive(&start, &Selection::template("water")).unwrap();
        assert_eq!(
            dates,
            vec![
                utc(2024, 1, 3, 9, 0),
                utc(2024, 1, 8, 9, 0),
                utc(2024, 1, 15, 9, 0)
            ]
        );
    }

    #[rstest]
    #[case("swab", vec![utc(2024, 3, 2, 14, 30)])]
    #[case("bacteria", vec![utc(2024, 3, 1, 14, 30), utc(2024, 3, 3, 14, 30), utc(2024, 3, 5, 14, 30)])]
    fn template_offsets_roll_over_months(#[case] id: &str, #[case] expected: Vec<DateTime<Utc>>) {
        // 2024 is a leap year: Feb 29 + 2 days is Mar 2.
        let start = utc(2024, 2, 29, 14, 30);
        assert_eq!(derive(&start, &Selection::template(id)).unwrap(), expected);
    }

    #[test]
    fn offsets_roll_over_year_end() {
        let start = utc(2024, 12, 20, 8, 15);
        let dates = derive(&start, &Selection::template("water")).unwrap();
        assert_eq!(dates[2], utc(2025, 1, 3, 8, 15));
    }

    #[test]
    fn calendar_day_survives_spring_forward() {
        let start = New_York.with_ymd_and_hms(2024, 3, 9, 9, 0, 0).unwrap();
        let next = add_calendar_days(&start, 1).unwrap();
        let local = next.with_timezone(&New_York);
        assert_eq!(local.naive_local().to_string(), "2024-03-10 09:00:00");
        // EDT is UTC-4, so one calendar day here is only 23 hours.
        assert_eq!(next, utc(2024, 3, 10, 13, 0));
    }

    #[test]
    fn skipped_wall_time_moves_past_gap() {
        let start = New_York.with_ymd_and_hms(2024, 3, 9, 2, 30, 0).unwrap();
        let next = add_calendar_days(&start, 1).unwrap();
        assert_eq!(
            next.with_timezone(&New_York).naive_local().to_string(),
            "2024-03-10 03:30:00"
        );
    }

    #[test]
    fn ambiguous_wall_time_takes_earlier_instant() {
        let start = New_York.with_ymd_and_hms(2024, 11, 2, 1, 30, 0).unwrap();
        let next = add_calendar_days(&start, 1).unwrap();
        assert_eq!(next, utc(2024, 11, 3, 5, 30));
    }

    #[test]
    fn custom_dates_pass_through_unchanged() {
        let a = utc(2024, 5, 10, 9, 0);
        let b = utc(2024, 5, 1, 9, 0);
        let start = utc(2024, 1, 1, 0, 0);

        assert!(derive(&start, &Selection::custom(vec![])).unwrap().is_empty());
        assert_eq!(
            derive(&start, &Selection::custom(vec![a, b, a])).unwrap(),
            vec![a, b, a]
        );
    }

    #[test]
    fn no_selection_is_empty() {
        let start = utc(2024, 1, 1, 9, 0);
        assert!(derive(&start, &Selection::None).unwrap().is_empty());
        assert!(derive(&start, &Selection::template("custom"))
            .unwrap()
            .is_empty());
    }

    #[test]
    fn unknown_template_is_an_error() {
        let start = utc(2024, 1, 1, 9, 0);
        assert_eq!(
            derive(&start, &Selection::template("plasma")),
            Err(ScheduleError::UnknownTemplate("plasma".into()))
        );
    }

    #[test]
    fn custom_schedule_keeps_insertion_order() {
        let mut custom = CustomSchedule::default();
        custom.add(utc(2024, 2, 1, 9, 0));
        custom.add(utc(2024, 1, 1, 9, 0));
        assert_eq!(
            custom.dates(),
            &[utc(2024, 2, 1, 9, 0), utc(2024, 1, 1, 9, 0)]
        );
    }
}
