//! Weekly schedule arithmetic.
//!
//! A job's schedule is a weekday plus a wall-clock time, both in UTC.
//! After every run the job's `next_run_at` is recomputed from these fields
//! by [`next_occurrence`].

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, Duration, NaiveTime, TimeZone, Utc};

use crate::error::ScheduleError;

/// `HH:MM` in 24-hour time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct TimeOfDay {
    hour: u32,
    minute: u32,
}

impl TimeOfDay {
    pub fn new(hour: u32, minute: u32) -> Result<Self, ScheduleError> {
        if hour > 23 || minute > 59 {
            return Err(ScheduleError::TimeOfDay(format!("{:02}:{:02}", hour, minute)));
        }
        Ok(Self { hour, minute })
    }

    pub fn parse(raw: &str) -> Result<Self, ScheduleError> {
        let invalid = || ScheduleError::TimeOfDay(raw.to_string());

        // Postgres `time` columns serialise as HH:MM:SS; accept and ignore seconds.
        let mut parts = raw.trim().split(':');
        let hour = parts.next().ok_or_else(invalid)?;
        let minute = parts.next().ok_or_else(invalid)?;
        if let Some(seconds) = parts.next() {
            if seconds.len() != 2 || seconds.parse::<u32>().map_or(true, |s| s > 59) {
                return Err(invalid());
            }
        }
        if parts.next().is_some() || hour.is_empty() || hour.len() > 2 || minute.len() != 2 {
            return Err(invalid());
        }

        let hour = hour.parse::<u32>().map_err(|_| invalid())?;
        let minute = minute.parse::<u32>().map_err(|_| invalid())?;
        Self::new(hour, minute).map_err(|_| invalid())
    }

    fn as_naive(&self) -> NaiveTime {
        NaiveTime::from_hms_opt(self.hour, self.minute, 0).unwrap_or(NaiveTime::MIN)
    }
}

impl FromStr for TimeOfDay {
    type Err = ScheduleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

/// First instant strictly after `after` that falls on `day_of_week`
/// (0 = Sunday) at `time`.
pub fn next_occurrence(
    day_of_week: i64,
    time: TimeOfDay,
    after: DateTime<Utc>,
) -> Result<DateTime<Utc>, ScheduleError> {
    if !(0..=6).contains(&day_of_week) {
        return Err(ScheduleError::DayOfWeek(day_of_week));
    }

    let today = i64::from(after.weekday().num_days_from_sunday());
    let days_ahead = (day_of_week - today).rem_euclid(7);

    let date = after.date_naive() + Duration::days(days_ahead);
    let mut candidate = Utc.from_utc_datetime(&date.and_time(time.as_naive()));
    if candidate <= after {
        candidate += Duration::days(7);
    }

    Ok(candidate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    #[test]
    fn parse_accepts_hh_mm_and_hh_mm_ss() {
        assert_eq!(TimeOfDay::parse("09:00").unwrap(), TimeOfDay::new(9, 0).unwrap());
        assert_eq!(TimeOfDay::parse("23:59").unwrap(), TimeOfDay::new(23, 59).unwrap());
        assert_eq!(TimeOfDay::parse("7:30").unwrap(), TimeOfDay::new(7, 30).unwrap());
        assert_eq!(TimeOfDay::parse("09:00:00").unwrap(), TimeOfDay::new(9, 0).unwrap());
    }

    #[test]
    fn parse_rejects_out_of_range_and_garbage() {
        for raw in ["24:00", "12:60", "noon", "12", "12:5", "", "12:00:61", "1:00:00:00"] {
            assert!(TimeOfDay::parse(raw).is_err(), "{} should be rejected", raw);
        }
    }

    #[test]
    fn display_is_zero_padded() {
        assert_eq!(TimeOfDay::new(7, 5).unwrap().to_string(), "07:05");
    }

    #[test]
    fn next_occurrence_later_same_week() {
        // Friday 2024-03-15 09:01 -> next Monday 09:00 is 2024-03-18
        let after = at(2024, 3, 15, 9, 1);
        let next = next_occurrence(1, TimeOfDay::new(9, 0).unwrap(), after).unwrap();
        assert_eq!(next, at(2024, 3, 18, 9, 0));
    }

    #[test]
    fn next_occurrence_same_day_later_time() {
        // Monday 2024-03-18 08:00 -> same day 09:00
        let after = at(2024, 3, 18, 8, 0);
        let next = next_occurrence(1, TimeOfDay::new(9, 0).unwrap(), after).unwrap();
        assert_eq!(next, at(2024, 3, 18, 9, 0));
    }

    #[test]
    fn next_occurrence_exact_instant_moves_a_week() {
        let after = at(2024, 3, 18, 9, 0);
        let next = next_occurrence(1, TimeOfDay::new(9, 0).unwrap(), after).unwrap();
        assert_eq!(next, at(2024, 3, 25, 9, 0));
    }

    #[test]
    fn next_occurrence_rejects_bad_weekday() {
        let after = at(2024, 3, 18, 9, 0);
        let err = next_occurrence(7, TimeOfDay::new(9, 0).unwrap(), after).unwrap_err();
        assert_eq!(err, ScheduleError::DayOfWeek(7));
    }

    proptest! {
        #[test]
        fn next_occurrence_is_within_a_week_and_on_the_right_day(
            secs in 1_600_000_000i64..1_900_000_000i64,
            dow in 0i64..7,
            hour in 0u32..24,
            minute in 0u32..60,
        ) {
            let after = Utc.timestamp_opt(secs, 0).unwrap();
            let time = TimeOfDay::new(hour, minute).unwrap();
            let next = next_occurrence(dow, time, after).unwrap();

            prop_assert!(next > after);
            prop_assert!(next - after <= Duration::days(7));
            prop_assert_eq!(i64::from(next.weekday().num_days_from_sunday()), dow);
            prop_assert_eq!(next.time(), NaiveTime::from_hms_opt(hour, minute, 0).unwrap());
        }
    }
}
