use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::cli::Cli;

pub const DEFAULT_PORT: u16 = 3003;
pub const DEFAULT_TICK_INTERVAL_SECONDS: u64 = 60;
pub const DEFAULT_CLEANUP_INTERVAL_SECONDS: u64 = 15 * 60;
pub const DEFAULT_TEMP_FILE_MAX_AGE_SECONDS: u64 = 60 * 60;
pub const DEFAULT_SMTP_PORT: u16 = 587;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub from_email: String,
    pub mail: MailSettings,
    pub port: u16,
    pub tick_interval_seconds: u64,
    pub cleanup_interval_seconds: u64,
    pub temp_file_max_age_seconds: u64,
    pub temp_dir: PathBuf,
}

#[derive(Debug, Clone)]
pub enum MailSettings {
    Smtp(SmtpSettings),
    Http(HttpApiSettings),
}

#[derive(Clone)]
pub struct SmtpSettings {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
}

#[derive(Clone)]
pub struct HttpApiSettings {
    pub api_url: String,
    pub api_key: String,
}

// Credentials stay out of the startup log.
impl std::fmt::Debug for SmtpSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpSettings")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl std::fmt::Debug for HttpApiSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpApiSettings")
            .field("api_url", &self.api_url)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the config from any key lookup. Every missing required
    /// variable is reported in one error.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, String>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let mut missing: Vec<&str> = Vec::new();

        let mut required = |key: &'static str| {
            let value = get(key);
            if value.is_none() {
                missing.push(key);
            }
            value.unwrap_or_default()
        };

        let database_url = required("DATABASE_URL");
        let from_email = required("REPORT_FROM_EMAIL");

        let transport = get("MAIL_TRANSPORT").unwrap_or_else(|| "smtp".to_string());
        let mail = match transport.as_str() {
            "smtp" => MailSettings::Smtp(SmtpSettings {
                host: required("SMTP_HOST"),
                port: DEFAULT_SMTP_PORT,
                username: required("SMTP_USERNAME"),
                password: required("SMTP_PASSWORD"),
            }),
            "http" => MailSettings::Http(HttpApiSettings {
                api_url: required("EMAIL_API_URL"),
                api_key: required("EMAIL_API_KEY"),
            }),
            other => {
                return Err(format!(
                    "Invalid MAIL_TRANSPORT: {} (expected smtp or http)",
                    other
                ))
            }
        };

        if !missing.is_empty() {
            return Err(format!(
                "Missing required environment variables: {}",
                missing.join(", ")
            ));
        }

        let mail = match mail {
            MailSettings::Smtp(mut smtp) => {
                smtp.port = parse_or(&get, "SMTP_PORT", DEFAULT_SMTP_PORT)?;
                MailSettings::Smtp(smtp)
            }
            http => http,
        };

        let port = parse_or(&get, "REPORT_SCHEDULER_PORT", DEFAULT_PORT)?;
        let tick_interval_seconds =
            parse_or(&get, "TICK_INTERVAL_SECONDS", DEFAULT_TICK_INTERVAL_SECONDS)?;
        let cleanup_interval_seconds =
            parse_or(&get, "CLEANUP_INTERVAL_SECONDS", DEFAULT_CLEANUP_INTERVAL_SECONDS)?;
        let temp_file_max_age_seconds =
            parse_or(&get, "TEMP_FILE_MAX_AGE_SECONDS", DEFAULT_TEMP_FILE_MAX_AGE_SECONDS)?;

        if tick_interval_seconds == 0 {
            return Err("TICK_INTERVAL_SECONDS must be greater than zero".to_string());
        }
        if cleanup_interval_seconds == 0 {
            return Err("CLEANUP_INTERVAL_SECONDS must be greater than zero".to_string());
        }

        let temp_dir = get("REPORT_TEMP_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(default_temp_dir);

        Ok(Self {
            database_url,
            from_email,
            mail,
            port,
            tick_interval_seconds,
            cleanup_interval_seconds,
            temp_file_max_age_seconds,
            temp_dir,
        })
    }

    /// Command-line flags win over the environment.
    pub fn apply_cli(mut self, cli: &Cli) -> Result<Self, String> {
        if let Some(port) = cli.port {
            self.port = port;
        }
        if let Some(interval) = cli.tick_interval {
            if interval == 0 {
                return Err("--tick-interval must be greater than zero".to_string());
            }
            self.tick_interval_seconds = interval;
        }
        if let Some(dir) = &cli.temp_dir {
            self.temp_dir = dir.clone();
        }
        Ok(self)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs(self.tick_interval_seconds)
    }

    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_seconds)
    }

    pub fn temp_file_max_age(&self) -> Duration {
        Duration::from_secs(self.temp_file_max_age_seconds)
    }
}

pub fn default_temp_dir() -> PathBuf {
    env::temp_dir().join("residential-temperature-reports")
}

fn parse_or<T, G>(get: &G, key: &str, default: T) -> Result<T, String>
where
    T: std::str::FromStr,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw
            .parse::<T>()
            .map_err(|_| format!("{} must be a valid number", key)),
        None => Ok(default),
    }
}
