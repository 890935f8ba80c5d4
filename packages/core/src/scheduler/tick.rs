use chrono::{DateTime, Utc};
use serde::Serialize;

use super::window::ReportWindow;
use super::ReportScheduler;
use crate::error::StoreError;
use crate::jobs::{FailureStage, JobPhase, RunOutcome, RunStatus, ScheduledReport, SkipReason};
use crate::mail::ReportEmail;
use crate::report::ReportDocument;

/// Counts for one completed tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TickSummary {
    pub ran_at: DateTime<Utc>,
    pub rescheduled: u64,
    pub due: usize,
    pub delivered: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl TickSummary {
    fn new(ran_at: DateTime<Utc>, rescheduled: u64, due: usize) -> Self {
        Self { ran_at, rescheduled, due, delivered: 0, failed: 0, skipped: 0 }
    }

    fn record(&mut self, phase: &JobPhase) {
        match phase {
            JobPhase::Finished(RunOutcome::Delivered) => self.delivered += 1,
            JobPhase::Finished(RunOutcome::Failed { .. }) => self.failed += 1,
            JobPhase::Skipped(_) => self.skipped += 1,
            JobPhase::Due | JobPhase::Running => {}
        }
    }
}

impl ReportScheduler {
    pub async fn tick(&self) -> Result<TickSummary, StoreError> {
        self.tick_at(Utc::now()).await
    }

    /// Process every job due at `now`, one at a time.
    ///
    /// Only store failures before any job is touched abort the tick. Once a
    /// job runs, its failures are recorded on the job and the tick moves on.
    pub async fn tick_at(&self, now: DateTime<Utc>) -> Result<TickSummary, StoreError> {
        tracing::debug!("Checking for scheduled reports due at {}", now.to_rfc3339());

        let rescheduled = self.store.reschedule_completed().await?;
        if rescheduled > 0 {
            tracing::info!("Rescheduled {} completed report(s)", rescheduled);
        }

        let jobs = self.store.due_jobs(now).await?;
        let mut summary = TickSummary::new(now, rescheduled, jobs.len());

        if jobs.is_empty() {
            tracing::debug!("No scheduled reports due");
            return Ok(summary);
        }

        tracing::info!("Found {} scheduled report(s) due", jobs.len());

        for job in &jobs {
            let phase = self.process_job(job, now).await;
            summary.record(&phase);
        }

        tracing::info!(
            "Tick complete: {} delivered, {} failed, {} skipped",
            summary.delivered,
            summary.failed,
            summary.skipped
        );

        Ok(summary)
    }

    async fn process_job(&self, job: &ScheduledReport, now: DateTime<Utc>) -> JobPhase {
        let phase = JobPhase::Due;

        // Invalid schedules never get a next_run_at. Record the failure once.
        if let Err(err) = job.validate_schedule() {
            let outcome = RunOutcome::failed(FailureStage::Schedule, err);
            if job.last_status == Some(RunStatus::Failed) && job.last_error == outcome.error_message() {
                tracing::debug!("Report {} still has an invalid schedule, skipping", job.id);
                return phase.skip(SkipReason::InvalidSchedule);
            }

            tracing::error!(
                "Report {} has an invalid schedule (day {} at '{}'), not sending",
                job.id,
                job.day_of_week,
                job.time_of_day
            );
            self.record(job, now, &outcome).await;
            return phase.start().finish(outcome);
        }

        let recipient = match self.store.recipient_email(&job.user_id).await {
            Ok(Some(email)) => email,
            Ok(None) => {
                tracing::warn!("No email found for user {}, skipping report {}", job.user_id, job.id);
                return phase.skip(SkipReason::MissingRecipient);
            }
            Err(err) => {
                tracing::warn!(
                    "Recipient lookup failed for user {}, skipping report {}: {}",
                    job.user_id,
                    job.id,
                    err
                );
                return phase.skip(SkipReason::RecipientLookup(err.to_string()));
            }
        };

        let phase = phase.start();
        tracing::info!(
            "Running report {} for user {} (day {} at {}, last {} days)",
            job.id,
            job.user_id,
            job.day_of_week,
            job.time_of_day,
            job.date_range_days
        );
        let outcome = self.run_report(job, &recipient, now).await;

        match &outcome {
            RunOutcome::Delivered => {
                tracing::info!("Report {} sent to {}", job.id, recipient);
            }
            RunOutcome::Failed { stage, message } => {
                tracing::error!("Error processing report {} at {}: {}", job.id, stage, message);
            }
        }

        self.record(job, now, &outcome).await;
        phase.finish(outcome)
    }

    async fn record(&self, job: &ScheduledReport, now: DateTime<Utc>, outcome: &RunOutcome) {
        if let Err(err) = self.store.record_run(&job.id, now, outcome).await {
            tracing::error!("Failed to record run for report {}: {}", job.id, err);
        }
    }

    async fn run_report(&self, job: &ScheduledReport, recipient: &str, now: DateTime<Utc>) -> RunOutcome {
        let window = match ReportWindow::ending_at(now, job.date_range_days) {
            Ok(window) => window,
            Err(err) => return RunOutcome::failed(FailureStage::Statistics, err),
        };

        let overall = match self.store.overall_stats(&job.user_id, &window).await {
            Ok(stats) => stats,
            Err(err) => return RunOutcome::failed(FailureStage::Statistics, err),
        };
        let sensors = match self.store.sensor_stats(&job.user_id, &window).await {
            Ok(stats) => stats,
            Err(err) => return RunOutcome::failed(FailureStage::Statistics, err),
        };

        let document = ReportDocument::build(&overall, &sensors, &window);
        let rendered = match self.renderer.render(&job.id, &document, &window).await {
            Ok(rendered) => rendered,
            Err(err) => return RunOutcome::failed(FailureStage::Render, err),
        };

        let email = ReportEmail::for_report(recipient, &window, &rendered);
        match self.mailer.send(&email).await {
            Ok(()) => RunOutcome::Delivered,
            Err(err) => RunOutcome::failed(FailureStage::Delivery, err),
        }
    }
}
