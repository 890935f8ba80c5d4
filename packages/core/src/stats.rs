//! Aggregated temperature statistics for one report window.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Overall min/max/avg across all of a user's sensors.
///
/// Every field is `None` when no readings fall inside the window.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OverallStats {
    pub min_temp: Option<f64>,
    pub max_temp: Option<f64>,
    pub avg_temp: Option<f64>,
    pub min_temp_sensor_name: Option<String>,
    pub max_temp_sensor_name: Option<String>,
    pub min_temp_time: Option<DateTime<Utc>>,
    pub max_temp_time: Option<DateTime<Utc>>,
}

impl OverallStats {
    pub fn is_empty(&self) -> bool {
        self.min_temp.is_none() && self.max_temp.is_none() && self.avg_temp.is_none()
    }
}

/// Per-sensor breakdown. Sensors without readings still get a row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorStats {
    pub sensor_id: String,
    pub sensor_name: String,
    pub min_temp: Option<f64>,
    pub max_temp: Option<f64>,
    pub avg_temp: Option<f64>,
    pub min_temp_time: Option<DateTime<Utc>>,
    pub max_temp_time: Option<DateTime<Utc>>,
}

impl SensorStats {
    pub fn without_readings(sensor_id: impl Into<String>, sensor_name: impl Into<String>) -> Self {
        Self {
            sensor_id: sensor_id.into(),
            sensor_name: sensor_name.into(),
            min_temp: None,
            max_temp: None,
            avg_temp: None,
            min_temp_time: None,
            max_temp_time: None,
        }
    }
}
