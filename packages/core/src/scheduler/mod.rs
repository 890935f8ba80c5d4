//! Scheduled report service.
//!
//! [`ReportScheduler`] owns everything a tick needs: the store, the
//! renderer, the mailer and the metrics. [`ReportScheduler::start`] spawns
//! two independent loops, the job tick and the temp-file cleanup, and hands
//! back a [`SchedulerHandle`] that stops both.
//!
//! Ticks never overlap: the tick loop awaits each tick before taking the
//! next interval tick, and late ticks are delayed rather than bunched.

pub mod cleanup;
pub mod tick;
pub mod window;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};

use tokio::sync::{watch, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};

use crate::config::Config;
use crate::mail::Mailer;
use crate::metrics::AppMetrics;
use crate::report::ReportRenderer;
use crate::store::ReportStore;

pub use tick::TickSummary;
pub use window::ReportWindow;

/// Latest tick result, shared with the HTTP status endpoint.
pub type SharedTickSummary = Arc<RwLock<Option<TickSummary>>>;

#[derive(Debug, Clone)]
pub struct SchedulerSettings {
    pub tick_interval: Duration,
    pub cleanup_interval: Duration,
    pub temp_file_max_age: Duration,
    pub work_dir: PathBuf,
}

impl SchedulerSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            tick_interval: config.tick_interval(),
            cleanup_interval: config.cleanup_interval(),
            temp_file_max_age: config.temp_file_max_age(),
            work_dir: config.temp_dir.clone(),
        }
    }
}

#[derive(Clone)]
pub struct ReportScheduler {
    store: Arc<dyn ReportStore>,
    renderer: ReportRenderer,
    mailer: Arc<dyn Mailer>,
    metrics: Arc<AppMetrics>,
    settings: SchedulerSettings,
    last_tick: SharedTickSummary,
}

impl ReportScheduler {
    pub fn new(
        store: Arc<dyn ReportStore>,
        mailer: Arc<dyn Mailer>,
        metrics: Arc<AppMetrics>,
        settings: SchedulerSettings,
    ) -> Self {
        Self {
            store,
            renderer: ReportRenderer::new(settings.work_dir.clone()),
            mailer,
            metrics,
            settings,
            last_tick: Arc::new(RwLock::new(None)),
        }
    }

    pub fn last_tick(&self) -> SharedTickSummary {
        self.last_tick.clone()
    }

    /// Spawn the tick and cleanup loops.
    pub fn start(&self) -> SchedulerHandle {
        let (shutdown, shutdown_rx) = watch::channel(false);

        let tick_task = tokio::spawn(run_tick_loop(self.clone(), shutdown_rx.clone()));
        let cleanup_task = tokio::spawn(run_cleanup_loop(self.clone(), shutdown_rx));

        SchedulerHandle {
            shutdown,
            tasks: vec![tick_task, cleanup_task],
        }
    }

    /// One tick with metrics and logging; errors end here.
    pub async fn run_tick(&self) -> Option<TickSummary> {
        let started = Instant::now();
        let result = self.tick().await;
        self.metrics
            .tick_duration
            .observe(started.elapsed().as_secs_f64());

        match result {
            Ok(summary) => {
                self.metrics.ticks_total.inc();
                self.metrics.reports_delivered_total.inc_by(summary.delivered as f64);
                self.metrics.reports_failed_total.inc_by(summary.failed as f64);
                self.metrics.reports_skipped_total.inc_by(summary.skipped as f64);

                *self.last_tick.write().await = Some(summary.clone());
                Some(summary)
            }
            Err(err) => {
                self.metrics.tick_errors_total.inc();
                tracing::error!("Error checking scheduled reports, skipping tick: {}", err);
                None
            }
        }
    }

    /// Remove stale rendered files from the working directory.
    pub async fn run_cleanup(&self) -> usize {
        let dir = self.settings.work_dir.clone();
        let max_age = self.settings.temp_file_max_age;
        let removed = match tokio::task::spawn_blocking(move || {
            cleanup::cleanup_temp_files(&dir, max_age, SystemTime::now())
        })
        .await
        {
            Ok(removed) => removed,
            Err(err) => {
                tracing::error!("Temp file cleanup task failed: {}", err);
                0
            }
        };
        if removed > 0 {
            self.metrics.temp_files_removed_total.inc_by(removed as f64);
            tracing::info!("Removed {} expired report file(s)", removed);
        }
        removed
    }
}

/// Running scheduler loops.
pub struct SchedulerHandle {
    shutdown: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl SchedulerHandle {
    /// Signal both loops and wait for them. A tick in progress finishes
    /// first.
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        for task in self.tasks {
            if let Err(err) = task.await {
                tracing::error!("Scheduler task ended abnormally: {}", err);
            }
        }
    }
}

async fn run_tick_loop(scheduler: ReportScheduler, mut shutdown: watch::Receiver<bool>) {
    let mut interval = time::interval(scheduler.settings.tick_interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    tracing::info!(
        "Report scheduler started (interval: {}s)",
        scheduler.settings.tick_interval.as_secs()
    );

    loop {
        tokio::select! {
            _ = interval.tick() => {
                scheduler.run_tick().await;
            }

            _ = shutdown.changed() => {
                tracing::info!("Shutdown signal received. Stopping report scheduler.");
                break;
            }
        }
    }

    tracing::info!("Report scheduler stopped cleanly");
}

async fn run_cleanup_loop(scheduler: ReportScheduler, mut shutdown: watch::Receiver<bool>) {
    let mut interval = time::interval(scheduler.settings.cleanup_interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    tracing::info!(
        "Temp file cleanup started (interval: {}s, max age: {}s, dir: {})",
        scheduler.settings.cleanup_interval.as_secs(),
        scheduler.settings.temp_file_max_age.as_secs(),
        scheduler.settings.work_dir.display()
    );

    loop {
        tokio::select! {
            _ = interval.tick() => {
                scheduler.run_cleanup().await;
            }

            _ = shutdown.changed() => {
                break;
            }
        }
    }

    tracing::debug!("Temp file cleanup stopped");
}
