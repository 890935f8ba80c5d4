use chrono::{DateTime, Duration, NaiveTime, TimeZone, Utc};
use serde::Serialize;

use crate::error::ScheduleError;

/// The `[start, end]` range one report covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReportWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl ReportWindow {
    /// `end = now`, `start = midnight(now - date_range_days)`.
    ///
    /// Independent of when the job last ran: a job that missed several
    /// ticks still only reports on the window ending now.
    pub fn ending_at(now: DateTime<Utc>, date_range_days: i64) -> Result<Self, ScheduleError> {
        if date_range_days < 1 {
            return Err(ScheduleError::DateRange(date_range_days));
        }

        let start_day = Duration::try_days(date_range_days)
            .and_then(|range| now.checked_sub_signed(range))
            .ok_or(ScheduleError::DateRange(date_range_days))?
            .date_naive();
        let start = Utc.from_utc_datetime(&start_day.and_time(NaiveTime::MIN));

        Ok(Self { start, end: now })
    }

    /// `YYYY-MM-DD` of the first day, used in attachment filenames.
    pub fn start_date_label(&self) -> String {
        self.start.format("%Y-%m-%d").to_string()
    }
}
