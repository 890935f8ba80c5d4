// Library root. Exposes internal modules for integration tests in `tests/`.
// Production entry point remains `src/main.rs`.

pub mod api;
pub mod db;
pub mod error;
pub mod jobs;
pub mod mail;
pub mod metrics;
pub mod report;
pub mod repository;
pub mod schedule;
pub mod scheduler;
pub mod stats;
pub mod store;

// Only needed by the binary, but public so tests can build a config.
pub mod cli;
pub mod config;
pub mod logging;
