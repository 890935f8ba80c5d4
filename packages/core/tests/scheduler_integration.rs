//! End-to-end scheduler tests.
//!
//! Each test runs `ReportScheduler::tick_at` against an in-memory SQLite
//! database with all migrations applied, rendering real PDFs into a temp
//! directory. Only the mail transport is replaced, by `RecordingMailer`
//! below, so no SMTP server or email API is needed.

use std::sync::{Arc, Mutex};
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use chrono::{DateTime, Duration, TimeZone, Utc};
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use report_scheduler::{
    api,
    db::{self, to_db_timestamp},
    error::DeliveryError,
    jobs::{RunStatus, ScheduledReport},
    mail::{Mailer, ReportEmail},
    metrics::AppMetrics,
    repository::ReportRepository,
    scheduler::{ReportScheduler, SchedulerSettings},
};

// ---- Helpers ----------------------------------------------------------------

#[derive(Default)]
struct RecordingMailer {
    sent: Mutex<Vec<ReportEmail>>,
    attempts: Mutex<usize>,
    fail_first: bool,
}

impl RecordingMailer {
    fn failing_first() -> Self {
        Self { fail_first: true, ..Self::default() }
    }

    fn sent(&self) -> Vec<ReportEmail> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, email: &ReportEmail) -> Result<(), DeliveryError> {
        let first = {
            let mut attempts = self.attempts.lock().unwrap();
            *attempts += 1;
            *attempts == 1
        };
        if self.fail_first && first {
            return Err(DeliveryError::Transport("mail server unavailable".into()));
        }
        self.sent.lock().unwrap().push(email.clone());
        Ok(())
    }

    fn transport_name(&self) -> &str {
        "recording"
    }
}

/// Friday 15 March 2024, one minute after the scheduled 09:00 slot.
fn tick_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 15, 9, 1, 0).unwrap()
}

fn make_job(id: &str, user_id: &str) -> ScheduledReport {
    ScheduledReport {
        id: id.to_string(),
        user_id: user_id.to_string(),
        report_type: "temperature".into(),
        day_of_week: 5,
        time_of_day: "09:00".into(),
        date_range_days: 7,
        active: true,
        last_run_at: None,
        next_run_at: None,
        last_status: None,
        last_error: None,
    }
}

struct TestApp {
    repo: ReportRepository,
    mailer: Arc<RecordingMailer>,
    scheduler: ReportScheduler,
    _work_dir: tempfile::TempDir,
}

async fn build_test_app(mailer: RecordingMailer) -> TestApp {
    let pool = db::create_pool("sqlite::memory:").await.unwrap();
    let repo = ReportRepository::new(pool);
    let mailer = Arc::new(mailer);
    let work_dir = tempfile::tempdir().unwrap();

    let scheduler = ReportScheduler::new(
        Arc::new(repo.clone()),
        mailer.clone(),
        Arc::new(AppMetrics::new().unwrap()),
        SchedulerSettings {
            tick_interval: StdDuration::from_secs(60),
            cleanup_interval: StdDuration::from_secs(900),
            temp_file_max_age: StdDuration::from_secs(3600),
            work_dir: work_dir.path().to_path_buf(),
        },
    );

    TestApp { repo, mailer, scheduler, _work_dir: work_dir }
}

async fn seed_user(repo: &ReportRepository, id: &str, email: Option<&str>) {
    sqlx::query("INSERT INTO users (id, email) VALUES (?, ?)")
        .bind(id)
        .bind(email)
        .execute(repo.pool())
        .await
        .unwrap();
}

async fn seed_sensor(repo: &ReportRepository, id: &str, user_id: &str, name: &str) {
    sqlx::query("INSERT INTO sensors (id, user_id, name) VALUES (?, ?, ?)")
        .bind(id)
        .bind(user_id)
        .bind(name)
        .execute(repo.pool())
        .await
        .unwrap();
}

async fn seed_reading(repo: &ReportRepository, sensor_id: &str, temperature: f64, at: DateTime<Utc>) {
    sqlx::query("INSERT INTO sensor_readings (sensor_id, temperature, recorded_at) VALUES (?, ?, ?)")
        .bind(sensor_id)
        .bind(temperature)
        .bind(to_db_timestamp(at))
        .execute(repo.pool())
        .await
        .unwrap();
}

async fn seed_household(repo: &ReportRepository) {
    seed_user(repo, "user-1", Some("owner@example.com")).await;
    seed_sensor(repo, "sensor-bed", "user-1", "Bedroom").await;
    seed_sensor(repo, "sensor-kit", "user-1", "Kitchen").await;
    seed_reading(repo, "sensor-bed", 16.5, Utc.with_ymd_and_hms(2024, 3, 10, 4, 0, 0).unwrap()).await;
    seed_reading(repo, "sensor-kit", 23.0, Utc.with_ymd_and_hms(2024, 3, 12, 18, 30, 0).unwrap()).await;
    // Outside the seven day window.
    seed_reading(repo, "sensor-kit", 40.0, Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()).await;
}

// ---- Tick behaviour ---------------------------------------------------------

#[tokio::test]
async fn due_report_is_emailed_and_job_is_stamped() {
    let app = build_test_app(RecordingMailer::default()).await;
    seed_household(&app.repo).await;
    app.repo.insert_job(&make_job("job-1", "user-1")).await.unwrap();

    let summary = app.scheduler.tick_at(tick_time()).await.unwrap();

    assert_eq!(summary.due, 1);
    assert_eq!(summary.delivered, 1);

    let sent = app.mailer.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, "owner@example.com");
    assert_eq!(sent[0].subject, "Your Scheduled Temperature Report");
    assert_eq!(sent[0].attachment_name, "temperature-report-2024-03-08.pdf");
    assert!(sent[0].attachment.starts_with(b"%PDF"));
    assert!(sent[0]
        .html_body
        .contains("Report period: Friday 8th March 2024 to Friday 15th March 2024"));

    let job = app.repo.get_job("job-1").await.unwrap().unwrap();
    assert_eq!(job.last_run_at, Some(tick_time()));
    assert_eq!(job.next_run_at, None);
    assert_eq!(job.last_status, Some(RunStatus::Delivered));
    assert_eq!(job.last_error, None);
}

#[tokio::test]
async fn failed_delivery_does_not_block_later_jobs() {
    let app = build_test_app(RecordingMailer::failing_first()).await;
    seed_household(&app.repo).await;
    app.repo.insert_job(&make_job("job-a", "user-1")).await.unwrap();
    app.repo.insert_job(&make_job("job-b", "user-1")).await.unwrap();

    let summary = app.scheduler.tick_at(tick_time()).await.unwrap();

    assert_eq!(summary.due, 2);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.delivered, 1);
    assert_eq!(app.mailer.sent().len(), 1);

    let mut statuses = Vec::new();
    for id in ["job-a", "job-b"] {
        let job = app.repo.get_job(id).await.unwrap().unwrap();
        assert_eq!(job.last_run_at, Some(tick_time()), "{} not stamped", id);
        statuses.push(job.last_status);
    }
    assert!(statuses.contains(&Some(RunStatus::Failed)));
    assert!(statuses.contains(&Some(RunStatus::Delivered)));
}

#[tokio::test]
async fn user_without_email_is_skipped_and_stays_due() {
    let app = build_test_app(RecordingMailer::default()).await;
    seed_user(&app.repo, "user-2", None).await;
    app.repo.insert_job(&make_job("job-1", "user-2")).await.unwrap();

    let summary = app.scheduler.tick_at(tick_time()).await.unwrap();
    assert_eq!(summary.skipped, 1);
    assert!(app.mailer.sent().is_empty());

    let job = app.repo.get_job("job-1").await.unwrap().unwrap();
    assert_eq!(job.last_run_at, None);

    let again = app
        .scheduler
        .tick_at(tick_time() + Duration::minutes(1))
        .await
        .unwrap();
    assert_eq!(again.due, 1);
}

#[tokio::test]
async fn completed_job_is_rescheduled_for_its_next_slot() {
    let app = build_test_app(RecordingMailer::default()).await;
    seed_household(&app.repo).await;
    app.repo.insert_job(&make_job("job-1", "user-1")).await.unwrap();

    app.scheduler.tick_at(tick_time()).await.unwrap();

    let next_tick = app
        .scheduler
        .tick_at(tick_time() + Duration::minutes(1))
        .await
        .unwrap();
    assert_eq!(next_tick.rescheduled, 1);
    assert_eq!(next_tick.due, 0);

    let job = app.repo.get_job("job-1").await.unwrap().unwrap();
    assert_eq!(
        job.next_run_at,
        Some(Utc.with_ymd_and_hms(2024, 3, 22, 9, 0, 0).unwrap())
    );

    let following_week = app
        .scheduler
        .tick_at(Utc.with_ymd_and_hms(2024, 3, 22, 9, 0, 30).unwrap())
        .await
        .unwrap();
    assert_eq!(following_week.delivered, 1);
    assert_eq!(app.mailer.sent().len(), 2);
    assert_eq!(
        app.mailer.sent()[1].attachment_name,
        "temperature-report-2024-03-15.pdf"
    );
}

#[tokio::test]
async fn inactive_jobs_are_ignored() {
    let app = build_test_app(RecordingMailer::default()).await;
    seed_household(&app.repo).await;
    let mut job = make_job("job-1", "user-1");
    job.active = false;
    app.repo.insert_job(&job).await.unwrap();

    let summary = app.scheduler.tick_at(tick_time()).await.unwrap();

    assert_eq!(summary.due, 0);
    assert!(app.mailer.sent().is_empty());
}

#[tokio::test]
async fn malformed_time_of_day_fails_once_without_sending() {
    let app = build_test_app(RecordingMailer::default()).await;
    seed_household(&app.repo).await;
    let mut job = make_job("job-1", "user-1");
    job.time_of_day = "9am".into();
    app.repo.insert_job(&job).await.unwrap();

    let first = app.scheduler.tick_at(tick_time()).await.unwrap();
    assert_eq!(first.failed, 1);

    for minutes in 1..=2 {
        let later = app
            .scheduler
            .tick_at(tick_time() + Duration::minutes(minutes))
            .await
            .unwrap();
        assert_eq!(later.failed, 0);
        assert_eq!(later.skipped, 1);
    }

    assert!(app.mailer.sent().is_empty());
    let job = app.repo.get_job("job-1").await.unwrap().unwrap();
    assert_eq!(job.last_run_at, Some(tick_time()));
    assert_eq!(job.last_status, Some(RunStatus::Failed));
    assert!(job.last_error.unwrap().starts_with("schedule: "));
}

// ---- HTTP surface -----------------------------------------------------------

#[tokio::test]
async fn status_endpoint_reflects_the_last_tick() {
    let app = build_test_app(RecordingMailer::default()).await;
    seed_household(&app.repo).await;
    app.repo.insert_job(&make_job("job-1", "user-1")).await.unwrap();

    let summary = app.scheduler.run_tick().await.unwrap();
    assert_eq!(summary.delivered, 1);

    let router = api::create_router(
        app.scheduler.last_tick(),
        Arc::new(AppMetrics::new().unwrap()),
    );
    let resp = router
        .oneshot(
            Request::builder()
                .uri("/scheduler/status")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    let json: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(json["due"], 1);
    assert_eq!(json["delivered"], 1);
}
