use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use dotenvy::dotenv;

use report_scheduler::api;
use report_scheduler::cli::Cli;
use report_scheduler::config::Config;
use report_scheduler::db;
use report_scheduler::error::AppError;
use report_scheduler::logging::init_logging;
use report_scheduler::mail::build_mailer;
use report_scheduler::metrics::AppMetrics;
use report_scheduler::repository::ReportRepository;
use report_scheduler::scheduler::{ReportScheduler, SchedulerSettings};

#[tokio::main]
async fn main() {
    dotenv().ok();
    init_logging();

    let cli = Cli::parse();

    let config = Config::from_env()
        .and_then(|config| config.apply_cli(&cli))
        .map_err(AppError::Config)
        .unwrap_or_else(|err| {
            tracing::error!("{}", err);
            std::process::exit(1);
        });

    tracing::info!("Service started with config: {:?}", config);

    if let Err(err) = run(config, cli.once).await {
        tracing::error!("{}", err);
        std::process::exit(1);
    }
}

async fn run(config: Config, once: bool) -> Result<(), AppError> {
    let pool = db::create_pool(&config.database_url).await?;
    let store = Arc::new(ReportRepository::new(pool));

    tokio::fs::create_dir_all(&config.temp_dir).await?;

    let mailer = build_mailer(&config.from_email, &config.mail)?;
    tracing::info!("Using {} mail transport", mailer.transport_name());

    let metrics = Arc::new(AppMetrics::new()?);
    let scheduler = ReportScheduler::new(
        store,
        mailer,
        metrics.clone(),
        SchedulerSettings::from_config(&config),
    );

    if once {
        tracing::info!("Running a single scheduler tick");
        scheduler.run_tick().await;
        scheduler.run_cleanup().await;
        return Ok(());
    }

    let handle = scheduler.start();

    let app = api::create_router(scheduler.last_tick(), metrics);
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Health server listening on {}", addr);

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    handle.stop().await;
    tracing::info!("Report scheduler shut down");

    served.map_err(AppError::from)
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", err);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
