//! Prometheus metrics registry for the report scheduler.
//!
//! [`AppMetrics`] owns all registered metrics and the [`Registry`] they
//! belong to. Construct it once at startup, wrap in `Arc`, and pass it
//! to the scheduler and the HTTP router.
//!
//! Exposed at `GET /metrics` in Prometheus text exposition format
//! (`text/plain; version=0.0.4`).

use prometheus::{Counter, Histogram, HistogramOpts, Opts, Registry};

/// All application-level Prometheus metrics.
pub struct AppMetrics {
    /// Ticks that got past the due-job query.
    pub ticks_total: Counter,
    /// Ticks aborted by a store failure.
    pub tick_errors_total: Counter,
    /// Reports rendered and handed to the mail transport.
    pub reports_delivered_total: Counter,
    /// Runs that failed at statistics, render or delivery.
    pub reports_failed_total: Counter,
    /// Due jobs left for the next tick (no recipient).
    pub reports_skipped_total: Counter,
    /// Rendered files removed by the cleanup loop.
    pub temp_files_removed_total: Counter,
    /// Wall time of a full tick in seconds.
    pub tick_duration: Histogram,
    /// The registry that owns all of the above metrics.
    pub registry: Registry,
}

impl AppMetrics {
    /// Create and register all metrics.
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let ticks_total = Counter::with_opts(Opts::new(
            "report_scheduler_ticks_total",
            "Completed scheduler ticks",
        ))?;

        let tick_errors_total = Counter::with_opts(Opts::new(
            "report_scheduler_tick_errors_total",
            "Scheduler ticks aborted by a store error",
        ))?;

        let reports_delivered_total = Counter::with_opts(Opts::new(
            "report_scheduler_reports_delivered_total",
            "Scheduled reports delivered",
        ))?;

        let reports_failed_total = Counter::with_opts(Opts::new(
            "report_scheduler_reports_failed_total",
            "Scheduled report runs that failed",
        ))?;

        let reports_skipped_total = Counter::with_opts(Opts::new(
            "report_scheduler_reports_skipped_total",
            "Due reports skipped because the owner had no email",
        ))?;

        let temp_files_removed_total = Counter::with_opts(Opts::new(
            "report_scheduler_temp_files_removed_total",
            "Rendered report files removed by cleanup",
        ))?;

        let tick_duration = Histogram::with_opts(
            HistogramOpts::new(
                "report_scheduler_tick_duration_seconds",
                "Scheduler tick duration in seconds",
            )
            .buckets(vec![0.01, 0.05, 0.1, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0]),
        )?;

        registry.register(Box::new(ticks_total.clone()))?;
        registry.register(Box::new(tick_errors_total.clone()))?;
        registry.register(Box::new(reports_delivered_total.clone()))?;
        registry.register(Box::new(reports_failed_total.clone()))?;
        registry.register(Box::new(reports_skipped_total.clone()))?;
        registry.register(Box::new(temp_files_removed_total.clone()))?;
        registry.register(Box::new(tick_duration.clone()))?;

        Ok(Self {
            ticks_total,
            tick_errors_total,
            reports_delivered_total,
            reports_failed_total,
            reports_skipped_total,
            temp_files_removed_total,
            tick_duration,
            registry,
        })
    }

    /// Render all metrics as Prometheus text format (for the `/metrics` endpoint).
    pub fn render(&self) -> Result<String, prometheus::Error> {
        use prometheus::Encoder;
        let encoder = prometheus::TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buf = Vec::new();
        encoder.encode(&metric_families, &mut buf)?;
        Ok(String::from_utf8(buf).unwrap_or_default())
    }
}
