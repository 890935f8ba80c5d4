//! Data access seam for the scheduler.
//!
//! The scheduler only talks to [`ReportStore`]. Production uses
//! [`ReportRepository`](crate::repository::ReportRepository) over SQLite;
//! unit tests use the in-memory [`mock::MockReportStore`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::StoreError;
use crate::jobs::{RunOutcome, ScheduledReport};
use crate::scheduler::window::ReportWindow;
use crate::stats::{OverallStats, SensorStats};

#[async_trait]
pub trait ReportStore: Send + Sync {
    /// Every job with `active` set and `next_run_at` null or `<= now`,
    /// in the store's natural order.
    async fn due_jobs(&self, now: DateTime<Utc>) -> Result<Vec<ScheduledReport>, StoreError>;

    /// Fill `next_run_at` for jobs that have run and were left unscheduled.
    /// Returns how many jobs were rescheduled.
    async fn reschedule_completed(&self) -> Result<u64, StoreError>;

    /// The owner's email address, or `None` if there is no usable one.
    async fn recipient_email(&self, user_id: &str) -> Result<Option<String>, StoreError>;

    async fn overall_stats(
        &self,
        user_id: &str,
        window: &ReportWindow,
    ) -> Result<OverallStats, StoreError>;

    async fn sensor_stats(
        &self,
        user_id: &str,
        window: &ReportWindow,
    ) -> Result<Vec<SensorStats>, StoreError>;

    /// Stamp `last_run_at`, clear `next_run_at` and store the outcome.
    async fn record_run(
        &self,
        job_id: &str,
        ran_at: DateTime<Utc>,
        outcome: &RunOutcome,
    ) -> Result<(), StoreError>;
}
