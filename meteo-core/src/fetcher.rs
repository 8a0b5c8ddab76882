use std::sync::Arc;

use chrono::Utc;
use tokio::time::{Instant, timeout_at};
use tracing::{debug, instrument, warn};

use crate::{FetchError, Location, MeasurementResult, WeatherProvider};

/// Runs one provider lookup under a deadline and captures the outcome.
#[derive(Debug, Clone)]
pub struct Fetcher {
    provider: Arc<dyn WeatherProvider>,
}

impl Fetcher {
    pub fn new(provider: Arc<dyn WeatherProvider>) -> Self {
        Self { provider }
    }

    /// Fetch current conditions for `location`.
    ///
    /// Never fails outward: transport, status and decode errors, as well as the
    /// deadline firing, all end up in [`MeasurementResult::outcome`]. The
    /// elapsed time is recorded on every path.
    #[instrument(skip(self, location), fields(location = %location.name))]
    pub async fn fetch(&self, location: Location, deadline: Instant) -> MeasurementResult {
        let start = Instant::now();

        let outcome = match timeout_at(deadline, self.provider.current(&location)).await {
            Ok(outcome) => outcome,
            Err(_) => Err(FetchError::DeadlineExceeded {
                after: start.elapsed(),
            }),
        };
        let elapsed = start.elapsed();
        let elapsed_ms = elapsed.as_millis() as u64;

        match &outcome {
            Ok(m) => debug!(temperature = m.temperature_c, elapsed_ms, "fetched"),
            Err(err) => warn!(error = %err, elapsed_ms, "fetch failed"),
        }

        MeasurementResult {
            location,
            outcome,
            elapsed,
            fetched_at: Utc::now(),
        }
    }
}
