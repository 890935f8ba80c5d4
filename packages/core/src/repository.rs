//! SQLite implementation of [`ReportStore`].
//!
//! All SQL lives here. Timestamps are written as RFC 3339 strings (see
//! [`to_db_timestamp`]) but rows written by other tools may use any format
//! SQLite understands, so every comparison goes through `julianday()`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use crate::db::{parse_db_timestamp, to_db_timestamp};
use crate::error::StoreError;
use crate::jobs::{RunOutcome, RunStatus, ScheduledReport};
use crate::schedule::{next_occurrence, TimeOfDay};
use crate::scheduler::window::ReportWindow;
use crate::stats::{OverallStats, SensorStats};
use crate::store::ReportStore;

const JOB_COLUMNS: &str = "id, user_id, report_type, day_of_week, time_of_day, date_range_days,
     active, last_run_at, next_run_at, last_status, last_error";

/// Repository for scheduled report jobs and the readings they summarise.
#[derive(Clone)]
pub struct ReportRepository {
    pool: SqlitePool,
}

impl ReportRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Fetch a single job by id.
    pub async fn get_job(&self, id: &str) -> Result<Option<ScheduledReport>, StoreError> {
        let sql = format!("SELECT {} FROM scheduled_reports WHERE id = ?", JOB_COLUMNS);
        let row = sqlx::query(&sql).bind(id).fetch_optional(&self.pool).await?;

        row.map(|row| job_from_row(&row)).transpose()
    }

    /// Insert a job row. Jobs are normally created by the dashboard; this
    /// exists for seeding and administrative tooling.
    pub async fn insert_job(&self, job: &ScheduledReport) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO scheduled_reports
             (id, user_id, report_type, day_of_week, time_of_day, date_range_days,
              active, last_run_at, next_run_at, last_status, last_error)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&job.id)
        .bind(&job.user_id)
        .bind(&job.report_type)
        .bind(job.day_of_week)
        .bind(&job.time_of_day)
        .bind(job.date_range_days)
        .bind(if job.active { 1i64 } else { 0i64 })
        .bind(job.last_run_at.map(to_db_timestamp))
        .bind(job.next_run_at.map(to_db_timestamp))
        .bind(job.last_status.map(|s| s.as_str()))
        .bind(&job.last_error)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn extreme_reading(
        &self,
        user_id: &str,
        window: &ReportWindow,
        order: &str,
    ) -> Result<(Option<String>, Option<DateTime<Utc>>), StoreError> {
        let sql = format!(
            "SELECT s.name AS sensor_name, r.recorded_at AS recorded_at
             FROM sensor_readings r
             JOIN sensors s ON s.id = r.sensor_id
             WHERE s.user_id = ?
               AND julianday(r.recorded_at) BETWEEN julianday(?) AND julianday(?)
             ORDER BY r.temperature {}, julianday(r.recorded_at) ASC
             LIMIT 1",
            order
        );

        let row = sqlx::query(&sql)
            .bind(user_id)
            .bind(to_db_timestamp(window.start))
            .bind(to_db_timestamp(window.end))
            .fetch_optional(&self.pool)
            .await?;

        Ok(match row {
            Some(row) => {
                let name: String = row.try_get("sensor_name")?;
                let recorded_at: String = row.try_get("recorded_at")?;
                (Some(name), parse_db_timestamp(&recorded_at))
            }
            None => (None, None),
        })
    }
}

#[async_trait]
impl ReportStore for ReportRepository {
    async fn due_jobs(&self, now: DateTime<Utc>) -> Result<Vec<ScheduledReport>, StoreError> {
        let sql = format!(
            "SELECT {} FROM scheduled_reports
             WHERE active = 1
               AND (next_run_at IS NULL OR julianday(next_run_at) <= julianday(?))",
            JOB_COLUMNS
        );

        let rows = sqlx::query(&sql)
            .bind(to_db_timestamp(now))
            .fetch_all(&self.pool)
            .await?;

        let jobs = rows
            .iter()
            .filter_map(|row| match job_from_row(row) {
                Ok(job) => Some(job),
                Err(err) => {
                    tracing::warn!("Ignoring unreadable scheduled report row: {}", err);
                    None
                }
            })
            .collect();

        Ok(jobs)
    }

    async fn reschedule_completed(&self) -> Result<u64, StoreError> {
        let rows = sqlx::query(
            "SELECT id, day_of_week, time_of_day, last_run_at
             FROM scheduled_reports
             WHERE last_run_at IS NOT NULL AND next_run_at IS NULL",
        )
        .fetch_all(&self.pool)
        .await?;

        if rows.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await?;
        let mut rescheduled = 0;

        for row in rows {
            let id: String = row.try_get("id")?;
            let day_of_week: i64 = row.try_get("day_of_week")?;
            let time_of_day: String = row.try_get("time_of_day")?;
            let last_run_at: String = row.try_get("last_run_at")?;

            let Some(last_run_at) = parse_db_timestamp(&last_run_at) else {
                tracing::warn!("Report {} has an unreadable last_run_at, not rescheduling", id);
                continue;
            };

            let next = match TimeOfDay::parse(&time_of_day)
                .and_then(|time| next_occurrence(day_of_week, time, last_run_at))
            {
                Ok(next) => next,
                Err(err) => {
                    tracing::debug!("Report {} has an invalid schedule: {}", id, err);
                    continue;
                }
            };

            sqlx::query("UPDATE scheduled_reports SET next_run_at = ? WHERE id = ?")
                .bind(to_db_timestamp(next))
                .bind(&id)
                .execute(&mut *tx)
                .await?;

            tracing::debug!("Report {} next run at {}", id, next.to_rfc3339());
            rescheduled += 1;
        }

        tx.commit().await?;
        Ok(rescheduled)
    }

    async fn recipient_email(&self, user_id: &str) -> Result<Option<String>, StoreError> {
        let row = sqlx::query("SELECT email FROM users WHERE id = ?")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let email: Option<String> = row.try_get("email")?;
        Ok(email
            .map(|e| e.trim().to_string())
            .filter(|e| !e.is_empty()))
    }

    async fn overall_stats(
        &self,
        user_id: &str,
        window: &ReportWindow,
    ) -> Result<OverallStats, StoreError> {
        let row = sqlx::query(
            "SELECT MIN(r.temperature) AS min_temp,
                    MAX(r.temperature) AS max_temp,
                    AVG(r.temperature) AS avg_temp
             FROM sensor_readings r
             JOIN sensors s ON s.id = r.sensor_id
             WHERE s.user_id = ?
               AND julianday(r.recorded_at) BETWEEN julianday(?) AND julianday(?)",
        )
        .bind(user_id)
        .bind(to_db_timestamp(window.start))
        .bind(to_db_timestamp(window.end))
        .fetch_one(&self.pool)
        .await?;

        let min_temp: Option<f64> = row.try_get("min_temp")?;
        let max_temp: Option<f64> = row.try_get("max_temp")?;
        let avg_temp: Option<f64> = row.try_get("avg_temp")?;

        if min_temp.is_none() {
            return Ok(OverallStats::default());
        }

        let (min_temp_sensor_name, min_temp_time) =
            self.extreme_reading(user_id, window, "ASC").await?;
        let (max_temp_sensor_name, max_temp_time) =
            self.extreme_reading(user_id, window, "DESC").await?;

        Ok(OverallStats {
            min_temp,
            max_temp,
            avg_temp,
            min_temp_sensor_name,
            max_temp_sensor_name,
            min_temp_time,
            max_temp_time,
        })
    }

    async fn sensor_stats(
        &self,
        user_id: &str,
        window: &ReportWindow,
    ) -> Result<Vec<SensorStats>, StoreError> {
        // ?1 = window start, ?2 = window end, ?3 = user id
        let rows = sqlx::query(
            "SELECT s.id AS sensor_id,
                    s.name AS sensor_name,
                    MIN(r.temperature) AS min_temp,
                    MAX(r.temperature) AS max_temp,
                    AVG(r.temperature) AS avg_temp,
                    (SELECT r2.recorded_at FROM sensor_readings r2
                      WHERE r2.sensor_id = s.id
                        AND julianday(r2.recorded_at) BETWEEN julianday(?1) AND julianday(?2)
                      ORDER BY r2.temperature ASC, julianday(r2.recorded_at) ASC LIMIT 1) AS min_temp_time,
                    (SELECT r3.recorded_at FROM sensor_readings r3
                      WHERE r3.sensor_id = s.id
                        AND julianday(r3.recorded_at) BETWEEN julianday(?1) AND julianday(?2)
                      ORDER BY r3.temperature DESC, julianday(r3.recorded_at) ASC LIMIT 1) AS max_temp_time
             FROM sensors s
             LEFT JOIN sensor_readings r
               ON r.sensor_id = s.id
              AND julianday(r.recorded_at) BETWEEN julianday(?1) AND julianday(?2)
             WHERE s.user_id = ?3
             GROUP BY s.id, s.name
             ORDER BY s.name ASC",
        )
        .bind(to_db_timestamp(window.start))
        .bind(to_db_timestamp(window.end))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| -> Result<SensorStats, StoreError> {
                let min_temp_time: Option<String> = row.try_get("min_temp_time")?;
                let max_temp_time: Option<String> = row.try_get("max_temp_time")?;

                Ok(SensorStats {
                    sensor_id: row.try_get("sensor_id")?,
                    sensor_name: row.try_get("sensor_name")?,
                    min_temp: row.try_get("min_temp")?,
                    max_temp: row.try_get("max_temp")?,
                    avg_temp: row.try_get("avg_temp")?,
                    min_temp_time: min_temp_time.as_deref().and_then(parse_db_timestamp),
                    max_temp_time: max_temp_time.as_deref().and_then(parse_db_timestamp),
                })
            })
            .collect()
    }

    async fn record_run(
        &self,
        job_id: &str,
        ran_at: DateTime<Utc>,
        outcome: &RunOutcome,
    ) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE scheduled_reports
             SET last_run_at = ?, next_run_at = NULL, last_status = ?, last_error = ?
             WHERE id = ?",
        )
        .bind(to_db_timestamp(ran_at))
        .bind(outcome.status().as_str())
        .bind(outcome.error_message())
        .bind(job_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            tracing::warn!("Report {} disappeared before its run could be recorded", job_id);
        }

        Ok(())
    }
}

fn job_from_row(row: &SqliteRow) -> Result<ScheduledReport, StoreError> {
    let id: String = row.try_get("id")?;
    let active: i64 = row.try_get("active")?;
    let last_run_at: Option<String> = row.try_get("last_run_at")?;
    let next_run_at: Option<String> = row.try_get("next_run_at")?;
    let last_status: Option<String> = row.try_get("last_status")?;

    let parse_optional = |raw: Option<String>, column: &str| -> Result<_, StoreError> {
        raw.map(|value| {
            parse_db_timestamp(&value).ok_or_else(|| {
                StoreError::invalid_row(
                    "scheduled_reports",
                    format!("{}: bad {} '{}'", id, column, value),
                )
            })
        })
        .transpose()
    };

    Ok(ScheduledReport {
        user_id: row.try_get("user_id")?,
        report_type: row.try_get("report_type")?,
        day_of_week: row.try_get("day_of_week")?,
        time_of_day: row.try_get("time_of_day")?,
        date_range_days: row.try_get("date_range_days")?,
        active: active != 0,
        last_run_at: parse_optional(last_run_at, "last_run_at")?,
        next_run_at: parse_optional(next_run_at, "next_run_at")?,
        last_status: last_status.as_deref().and_then(RunStatus::parse),
        last_error: row.try_get("last_error")?,
        id,
    })
}
