use std::fmt;
use std::error::Error;

/// Unified application error.
///
/// Everything that can stop the process at startup (config, database,
/// bind/listen) ends up here. Per-job failures never do; they are
/// recorded on the job row instead.
#[derive(Debug)]
pub enum AppError {
    Config(String),
    Database(String),
    Delivery(String),
    Metrics(String),
    Io(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Config(msg) => write!(f, "Config error: {}", msg),
            AppError::Database(msg) => write!(f, "Database error: {}", msg),
            AppError::Delivery(msg) => write!(f, "Delivery error: {}", msg),
            AppError::Metrics(msg) => write!(f, "Metrics error: {}", msg),
            AppError::Io(msg) => write!(f, "IO error: {}", msg),
        }
    }
}

impl Error for AppError {}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::Database(err.to_string())
    }
}

impl From<sqlx::migrate::MigrateError> for AppError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        AppError::Database(err.to_string())
    }
}

impl From<DeliveryError> for AppError {
    fn from(err: DeliveryError) -> Self {
        AppError::Delivery(err.to_string())
    }
}

impl From<prometheus::Error> for AppError {
    fn from(err: prometheus::Error) -> Self {
        AppError::Metrics(err.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Io(err.to_string())
    }
}

/// Errors from the report data store.
#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("invalid row in {table}: {message}")]
    InvalidRow { table: &'static str, message: String },

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    pub fn invalid_row(table: &'static str, message: impl Into<String>) -> Self {
        Self::InvalidRow { table, message: message.into() }
    }
}

/// Errors from turning statistics into a PDF file.
#[derive(thiserror::Error, Debug)]
pub enum RenderError {
    #[error("PDF generation failed: {0}")]
    Pdf(String),

    #[error("failed to write report file: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors from handing a report to the mail provider.
#[derive(thiserror::Error, Debug)]
pub enum DeliveryError {
    #[error("invalid address '{address}': {message}")]
    Address { address: String, message: String },

    #[error("failed to build message: {0}")]
    Message(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("email API returned HTTP {status}: {body}")]
    Rejected { status: u16, body: String },
}

/// Errors from interpreting a job's schedule fields.
#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum ScheduleError {
    #[error("day_of_week must be between 0 and 6, got {0}")]
    DayOfWeek(i64),

    #[error("time_of_day must be HH:MM, got '{0}'")]
    TimeOfDay(String),

    #[error("date_range_days must be a positive number of days, got {0}")]
    DateRange(i64),
}
