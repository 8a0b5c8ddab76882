//! Core library for the `meteo` CLI.
//!
//! This crate defines:
//! - Configuration of the provider and of grouped location lists
//! - Abstraction over weather providers (Open-Meteo out of the box)
//! - Concurrent fetching with per-item failure isolation and a shared deadline
//! - Grouped statistics and a plain-text comparison report
//!
//! Data flows one way: locations → [`Orchestrator`] → [`MeasurementResult`]s →
//! [`aggregate()`] → [`report::render`].

pub mod aggregate;
pub mod config;
pub mod error;
pub mod fetcher;
pub mod model;
pub mod orchestrator;
pub mod provider;
pub mod report;

pub use aggregate::{GroupStatistics, Summary, aggregate, group_key};
pub use config::{Config, LocationGroup};
pub use error::{ErrorKind, FetchError};
pub use fetcher::Fetcher;
pub use model::{Location, Measurement, MeasurementResult, describe_weather_code};
pub use orchestrator::{GroupedFetch, Orchestrator};
pub use provider::{ProviderId, WeatherProvider, openmeteo::OpenMeteoProvider, provider_from_config};
