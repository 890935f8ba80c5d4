use tracing_subscriber::{fmt, EnvFilter};

/// Filter used when `RUST_LOG` is unset or unparsable. sqlx statement
/// logging is noisy at info, so it is held back to warnings.
pub const DEFAULT_LOG_FILTER: &str = "info,sqlx=warn";

/// Install the global subscriber. Call once, first thing in `main`.
pub fn init_logging() {
    fmt()
        .with_env_filter(build_filter(std::env::var("RUST_LOG").ok().as_deref()))
        .with_target(false)
        .compact()
        .init();

    tracing::info!("Logging initialized");
}

fn build_filter(directives: Option<&str>) -> EnvFilter {
    directives
        .and_then(|raw| EnvFilter::try_new(raw).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_LOG_FILTER))
}
