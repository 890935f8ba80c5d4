//! Scheduled report jobs and their run bookkeeping.
//!
//! A job moves through [`JobPhase`] once per tick: it starts `Due`, becomes
//! `Running` once its owner resolves, and ends either `Finished` with a
//! [`RunOutcome`] (which is persisted) or `Skipped` (which is not).

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ScheduleError;
use crate::schedule::TimeOfDay;

/// One row of `scheduled_reports`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduledReport {
    pub id: String,
    pub user_id: String,
    pub report_type: String,
    /// 0 = Sunday .. 6 = Saturday.
    pub day_of_week: i64,
    /// `HH:MM`, 24-hour.
    pub time_of_day: String,
    pub date_range_days: i64,
    pub active: bool,
    pub last_run_at: Option<DateTime<Utc>>,
    pub next_run_at: Option<DateTime<Utc>>,
    pub last_status: Option<RunStatus>,
    pub last_error: Option<String>,
}

impl ScheduledReport {
    /// Active and either never scheduled or scheduled at or before `now`.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.active && self.next_run_at.map_or(true, |next| next <= now)
    }

    /// Check that `day_of_week` and `time_of_day` describe a weekly slot.
    pub fn validate_schedule(&self) -> Result<TimeOfDay, ScheduleError> {
        if !(0..=6).contains(&self.day_of_week) {
            return Err(ScheduleError::DayOfWeek(self.day_of_week));
        }
        TimeOfDay::parse(&self.time_of_day)
    }
}

/// Persisted result of the last run attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Delivered,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Delivered => "delivered",
            RunStatus::Failed => "failed",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "delivered" => Some(RunStatus::Delivered),
            "failed" => Some(RunStatus::Failed),
            _ => None,
        }
    }
}

/// Which step of a run failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureStage {
    Schedule,
    Statistics,
    Render,
    Delivery,
}

impl fmt::Display for FailureStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            FailureStage::Schedule => "schedule",
            FailureStage::Statistics => "statistics",
            FailureStage::Render => "render",
            FailureStage::Delivery => "delivery",
        };
        f.write_str(label)
    }
}

/// Result of a run that got past recipient resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Delivered,
    Failed { stage: FailureStage, message: String },
}

impl RunOutcome {
    pub fn failed(stage: FailureStage, err: impl fmt::Display) -> Self {
        RunOutcome::Failed { stage, message: err.to_string() }
    }

    pub fn status(&self) -> RunStatus {
        match self {
            RunOutcome::Delivered => RunStatus::Delivered,
            RunOutcome::Failed { .. } => RunStatus::Failed,
        }
    }

    /// Value stored in `last_error`: `"<stage>: <message>"` for failures.
    pub fn error_message(&self) -> Option<String> {
        match self {
            RunOutcome::Delivered => None,
            RunOutcome::Failed { stage, message } => Some(format!("{}: {}", stage, message)),
        }
    }
}

/// Why a due job was left untouched this tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// The owner has no usable email address.
    MissingRecipient,
    /// Looking the owner up failed.
    RecipientLookup(String),
    /// The schedule is unusable and its failure is already recorded.
    InvalidSchedule,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobPhase {
    Due,
    Running,
    Finished(RunOutcome),
    Skipped(SkipReason),
}

impl JobPhase {
    /// `Due -> Running`. Any other phase is returned unchanged.
    pub fn start(self) -> Self {
        match self {
            JobPhase::Due => JobPhase::Running,
            other => other,
        }
    }

    /// `Running -> Finished`. Any other phase is returned unchanged.
    pub fn finish(self, outcome: RunOutcome) -> Self {
        match self {
            JobPhase::Running => JobPhase::Finished(outcome),
            other => other,
        }
    }

    /// `Due -> Skipped`. Running or finished jobs cannot be skipped.
    pub fn skip(self, reason: SkipReason) -> Self {
        match self {
            JobPhase::Due => JobPhase::Skipped(reason),
            other => other,
        }
    }
}

impl fmt::Display for JobPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobPhase::Due => f.write_str("due"),
            JobPhase::Running => f.write_str("running"),
            JobPhase::Finished(RunOutcome::Delivered) => f.write_str("delivered"),
            JobPhase::Finished(RunOutcome::Failed { stage, .. }) => {
                write!(f, "failed at {}", stage)
            }
            JobPhase::Skipped(SkipReason::MissingRecipient) => {
                f.write_str("skipped (no recipient email)")
            }
            JobPhase::Skipped(SkipReason::RecipientLookup(_)) => {
                f.write_str("skipped (recipient lookup failed)")
            }
            JobPhase::Skipped(SkipReason::InvalidSchedule) => {
                f.write_str("skipped (invalid schedule)")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn make_job(active: bool, next_run_at: Option<DateTime<Utc>>) -> ScheduledReport {
        ScheduledReport {
            id: "job-1".into(),
            user_id: "user-1".into(),
            report_type: "temperature".into(),
            day_of_week: 1,
            time_of_day: "09:00".into(),
            date_range_days: 7,
            active,
            last_run_at: None,
            next_run_at,
            last_status: None,
            last_error: None,
        }
    }

    #[test]
    fn due_when_active_and_never_scheduled() {
        let now = Utc.with_ymd_and_hms(2024, 3, 15, 9, 1, 0).unwrap();
        assert!(make_job(true, None).is_due(now));
    }

    #[test]
    fn due_when_next_run_is_now_or_past() {
        let now = Utc.with_ymd_and_hms(2024, 3, 15, 9, 1, 0).unwrap();
        assert!(make_job(true, Some(now)).is_due(now));
        assert!(make_job(true, Some(now - Duration::minutes(5))).is_due(now));
    }

    #[test]
    fn not_due_when_next_run_is_in_future() {
        let now = Utc.with_ymd_and_hms(2024, 3, 15, 9, 1, 0).unwrap();
        assert!(!make_job(true, Some(now + Duration::seconds(1))).is_due(now));
    }

    #[test]
    fn inactive_job_is_never_due() {
        let now = Utc.with_ymd_and_hms(2024, 3, 15, 9, 1, 0).unwrap();
        assert!(!make_job(false, None).is_due(now));
        assert!(!make_job(false, Some(now - Duration::days(1))).is_due(now));
    }

    #[test]
    fn validate_schedule_rejects_bad_weekday_and_time() {
        let mut job = make_job(true, None);
        assert_eq!(job.validate_schedule().unwrap().to_string(), "09:00");

        job.time_of_day = "9am".into();
        assert_eq!(
            job.validate_schedule().unwrap_err(),
            ScheduleError::TimeOfDay("9am".into())
        );

        job.time_of_day = "09:00".into();
        job.day_of_week = 7;
        assert_eq!(job.validate_schedule().unwrap_err(), ScheduleError::DayOfWeek(7));
    }

    #[test]
    fn failed_outcome_error_message_includes_stage() {
        let outcome = RunOutcome::failed(FailureStage::Delivery, "connection refused");
        assert_eq!(outcome.status(), RunStatus::Failed);
        assert_eq!(
            outcome.error_message().as_deref(),
            Some("delivery: connection refused")
        );
        assert_eq!(RunOutcome::Delivered.error_message(), None);
    }

    #[test]
    fn run_status_parses_its_own_labels() {
        for status in [RunStatus::Delivered, RunStatus::Failed] {
            assert_eq!(RunStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(RunStatus::parse("pending"), None);
    }

    #[test]
    fn phase_transitions_follow_due_running_finished() {
        let phase = JobPhase::Due.start();
        assert_eq!(phase, JobPhase::Running);

        let phase = phase.finish(RunOutcome::Delivered);
        assert_eq!(phase, JobPhase::Finished(RunOutcome::Delivered));

        // Finished jobs ignore further transitions
        let phase = phase.skip(SkipReason::MissingRecipient);
        assert_eq!(phase.to_string(), "delivered");
    }

    #[test]
    fn only_due_jobs_can_be_skipped() {
        let skipped = JobPhase::Due.skip(SkipReason::MissingRecipient);
        assert_eq!(skipped, JobPhase::Skipped(SkipReason::MissingRecipient));

        let running = JobPhase::Running.skip(SkipReason::MissingRecipient);
        assert_eq!(running, JobPhase::Running);
    }
}
