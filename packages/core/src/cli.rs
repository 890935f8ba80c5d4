use std::path::PathBuf;

use clap::Parser;

/// Scheduled temperature report service CLI arguments
#[derive(Debug, Parser)]
#[command(
    name = "report-scheduler",
    version,
    about = "Renders and emails scheduled residential temperature reports"
)]
pub struct Cli {
    /// Port for the health/metrics HTTP server
    #[arg(long)]
    pub port: Option<u16>,

    /// Seconds between due-report checks
    #[arg(long)]
    pub tick_interval: Option<u64>,

    /// Directory for rendered report files
    #[arg(long)]
    pub temp_dir: Option<PathBuf>,

    /// Run a single check and exit
    #[arg(long)]
    pub once: bool,
}
