//! Layout model of a temperature report.
//!
//! Everything the PDF shows is decided here, as plain strings, so the
//! content can be checked without parsing a PDF.

use chrono::{DateTime, Datelike, Utc};

use crate::scheduler::window::ReportWindow;
use crate::stats::{OverallStats, SensorStats};

pub const REPORT_TITLE: &str = "Temperature Report";
pub const NOT_AVAILABLE: &str = "N/A";
pub const NO_DATA_NOTE: &str = "No temperature data available for the selected period";

#[derive(Debug, Clone, PartialEq)]
pub struct ReportTable {
    pub heading: String,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReportDocument {
    pub title: String,
    pub period: String,
    pub overall: ReportTable,
    /// Shown under the overall table when the window had no readings.
    pub note: Option<String>,
    pub sensors: ReportTable,
}

impl ReportDocument {
    pub fn build(overall: &OverallStats, sensors: &[SensorStats], window: &ReportWindow) -> Self {
        let period = format!(
            "Report Period: {} to {}",
            format_date(window.start),
            format_date(window.end)
        );

        let overall_rows = vec![
            vec![
                "Minimum Temperature".to_string(),
                format_temperature(overall.min_temp),
                or_not_available(overall.min_temp_sensor_name.clone()),
                format_optional_time(overall.min_temp_time, format_date_time),
            ],
            vec![
                "Maximum Temperature".to_string(),
                format_temperature(overall.max_temp),
                or_not_available(overall.max_temp_sensor_name.clone()),
                format_optional_time(overall.max_temp_time, format_date_time),
            ],
            vec![
                "Average Temperature".to_string(),
                format_temperature(overall.avg_temp),
                String::new(),
                String::new(),
            ],
        ];

        let sensor_rows = sensors
            .iter()
            .map(|stat| {
                vec![
                    stat.sensor_name.clone(),
                    format_temperature(stat.min_temp),
                    format_optional_time(stat.min_temp_time, format_short_date_time),
                    format_temperature(stat.max_temp),
                    format_optional_time(stat.max_temp_time, format_short_date_time),
                    format_temperature(stat.avg_temp),
                ]
            })
            .collect();

        Self {
            title: REPORT_TITLE.to_string(),
            period,
            overall: ReportTable {
                heading: "Overall Statistics".to_string(),
                columns: columns(&["Metric", "Value", "Sensor", "Time"]),
                rows: overall_rows,
            },
            note: overall.is_empty().then(|| NO_DATA_NOTE.to_string()),
            sensors: ReportTable {
                heading: "Sensor Statistics".to_string(),
                columns: columns(&["Sensor", "Min Temp", "Min Time", "Max Temp", "Max Time", "Avg Temp"]),
                rows: sensor_rows,
            },
        }
    }
}

fn columns(names: &[&str]) -> Vec<String> {
    names.iter().map(|n| n.to_string()).collect()
}

fn or_not_available(value: Option<String>) -> String {
    value
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| NOT_AVAILABLE.to_string())
}

fn format_optional_time(
    value: Option<DateTime<Utc>>,
    format: fn(DateTime<Utc>) -> String,
) -> String {
    value.map(format).unwrap_or_else(|| NOT_AVAILABLE.to_string())
}

/// `21.5°C`, or `N/A`.
pub fn format_temperature(value: Option<f64>) -> String {
    match value {
        Some(v) if v.is_finite() => format!("{:.1}°C", v),
        _ => NOT_AVAILABLE.to_string(),
    }
}

/// `Friday 15th March 2024`
pub fn format_date(timestamp: DateTime<Utc>) -> String {
    format!(
        "{} {}{} {}",
        timestamp.format("%A"),
        timestamp.day(),
        ordinal_suffix(timestamp.day()),
        timestamp.format("%B %Y")
    )
}

/// `Friday 15th March 2024 9:01 AM`
pub fn format_date_time(timestamp: DateTime<Utc>) -> String {
    format!("{} {}", format_date(timestamp), timestamp.format("%-I:%M %p"))
}

/// `Fri 15 Mar 2024 9:01 AM`, for the narrow sensor table columns.
pub fn format_short_date_time(timestamp: DateTime<Utc>) -> String {
    timestamp.format("%a %-d %b %Y %-I:%M %p").to_string()
}

fn ordinal_suffix(day: u32) -> &'static str {
    match (day % 10, day % 100) {
        (_, 11..=13) => "th",
        (1, _) => "st",
        (2, _) => "nd",
        (3, _) => "rd",
        _ => "th",
    }
}
