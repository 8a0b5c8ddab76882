use std::time::Duration;

use anyhow::{Result, bail};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::FetchError;

/// A named point to fetch weather for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    /// Grouping label, e.g. a continent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

impl Location {
    pub fn new(name: impl Into<String>, latitude: f64, longitude: f64) -> Self {
        Self {
            name: name.into(),
            latitude,
            longitude,
            category: None,
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    /// Reject empty names and coordinates outside the WGS84 ranges.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            bail!("Location name must not be empty");
        }
        if !(-90.0..=90.0).contains(&self.latitude) {
            bail!(
                "Latitude {} of '{}' is outside -90..90",
                self.latitude,
                self.name
            );
        }
        if !(-180.0..=180.0).contains(&self.longitude) {
            bail!(
                "Longitude {} of '{}' is outside -180..180",
                self.longitude,
                self.name
            );
        }
        Ok(())
    }
}

/// Current conditions reported for one location.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Measurement {
    pub temperature_c: f64,
    pub apparent_temperature_c: Option<f64>,
    pub humidity_pct: Option<f64>,
    pub precipitation_mm: Option<f64>,
    /// WMO weather interpretation code.
    pub weather_code: Option<u8>,
    pub wind_speed_kmh: Option<f64>,
    pub wind_direction_deg: Option<f64>,
    pub wind_gusts_kmh: Option<f64>,
    pub cloud_cover_pct: Option<f64>,
    pub visibility_m: Option<f64>,
    pub pressure_hpa: Option<f64>,
}

/// Outcome of one fetch attempt. Always timed, whether it succeeded or not.
#[derive(Debug, Clone)]
pub struct MeasurementResult {
    pub location: Location,
    pub outcome: Result<Measurement, FetchError>,
    pub elapsed: Duration,
    pub fetched_at: DateTime<Utc>,
}

impl MeasurementResult {
    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }

    pub fn measurement(&self) -> Option<&Measurement> {
        self.outcome.as_ref().ok()
    }

    pub fn error(&self) -> Option<&FetchError> {
        self.outcome.as_ref().err()
    }

    pub fn temperature(&self) -> Option<f64> {
        self.measurement().map(|m| m.temperature_c)
    }

    pub fn elapsed_secs(&self) -> f64 {
        self.elapsed.as_secs_f64()
    }
}

/// Human-readable text for a WMO weather code.
pub fn describe_weather_code(code: u8) -> &'static str {
    match code {
        0 => "Clear sky",
        1 => "Mainly clear",
        2 => "Partly cloudy",
        3 => "Overcast",
        45 => "Fog",
        48 => "Depositing rime fog",
        51 => "Light drizzle",
        53 => "Moderate drizzle",
        55 => "Dense drizzle",
        56 => "Light freezing drizzle",
        57 => "Dense freezing drizzle",
        61 => "Slight rain",
        63 => "Moderate rain",
        65 => "Heavy rain",
        66 => "Light freezing rain",
        67 => "Heavy freezing rain",
        71 => "Slight snow fall",
        73 => "Moderate snow fall",
        75 => "Heavy snow fall",
        77 => "Snow grains",
        80 => "Slight rain showers",
        81 => "Moderate rain showers",
        82 => "Violent rain showers",
        85 => "Slight snow showers",
        86 => "Heavy snow showers",
        95 => "Thunderstorm",
        96 => "Thunderstorm with slight hail",
        99 => "Thunderstorm with heavy hail",
        _ => "Unknown",
    }
}
