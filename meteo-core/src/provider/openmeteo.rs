use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use crate::{FetchError, Location, Measurement};

use super::WeatherProvider;

pub const DEFAULT_API_URL: &str = "https://api.open-meteo.com";

const CURRENT_FIELDS: &str = "temperature_2m,apparent_temperature,relative_humidity_2m,\
precipitation,weather_code,wind_speed_10m,wind_direction_10m,wind_gusts_10m,\
cloud_cover,visibility,pressure_msl";

/// Current-conditions client for the Open-Meteo forecast API (no API key).
#[derive(Debug, Clone)]
pub struct OpenMeteoProvider {
    base_url: String,
    http: Client,
}

impl OpenMeteoProvider {
    pub fn new(base_url: &str) -> Self {
        Self::with_client(base_url, Client::new())
    }

    pub fn with_client(base_url: &str, http: Client) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
        }
    }

    fn forecast_url(&self) -> String {
        format!("{}/v1/forecast", self.base_url)
    }
}

#[derive(Debug, Deserialize)]
struct OmCurrent {
    temperature_2m: f64,
    apparent_temperature: Option<f64>,
    relative_humidity_2m: Option<f64>,
    precipitation: Option<f64>,
    weather_code: Option<u8>,
    wind_speed_10m: Option<f64>,
    wind_direction_10m: Option<f64>,
    wind_gusts_10m: Option<f64>,
    cloud_cover: Option<f64>,
    visibility: Option<f64>,
    pressure_msl: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct OmResponse {
    current: OmCurrent,
}

impl From<OmCurrent> for Measurement {
    fn from(c: OmCurrent) -> Self {
        Measurement {
            temperature_c: c.temperature_2m,
            apparent_temperature_c: c.apparent_temperature,
            humidity_pct: c.relative_humidity_2m,
            precipitation_mm: c.precipitation,
            weather_code: c.weather_code,
            wind_speed_kmh: c.wind_speed_10m,
            wind_direction_deg: c.wind_direction_10m,
            wind_gusts_kmh: c.wind_gusts_10m,
            cloud_cover_pct: c.cloud_cover,
            visibility_m: c.visibility,
            pressure_hpa: c.pressure_msl,
        }
    }
}

#[async_trait]
impl WeatherProvider for OpenMeteoProvider {
    async fn current(&self, location: &Location) -> Result<Measurement, FetchError> {
        let latitude = location.latitude.to_string();
        let longitude = location.longitude.to_string();

        let res = self
            .http
            .get(self.forecast_url())
            .query(&[
                ("latitude", latitude.as_str()),
                ("longitude", longitude.as_str()),
                ("current", CURRENT_FIELDS),
            ])
            .send()
            .await
            .map_err(|e| FetchError::Transport(format!("request to Open-Meteo failed: {e}")))?;

        let status = res.status();

        // A non-success status wins over a broken body.
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            return Err(FetchError::Status {
                status: status.as_u16(),
                body: truncate_body(&body),
            });
        }

        let body = res
            .text()
            .await
            .map_err(|e| FetchError::Transport(format!("failed to read Open-Meteo body: {e}")))?;

        if body.trim().is_empty() {
            return Err(FetchError::Decode("empty response body".to_string()));
        }

        let parsed: OmResponse = serde_json::from_str(&body)?;

        Ok(parsed.current.into())
    }
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    if body.chars().count() > MAX {
        format!("{}...", body.chars().take(MAX).collect::<String>())
    } else {
        body.to_string()
    }
}
