use anyhow::{Context, Result, anyhow, bail};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{
    collections::HashSet,
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::{Location, provider::ProviderId, provider::openmeteo::DEFAULT_API_URL};

const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// A named batch of locations reported together, e.g. a continent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationGroup {
    pub name: String,
    #[serde(default)]
    pub locations: Vec<Location>,
}

/// Top-level configuration stored on disk.
///
/// Example TOML:
/// ```toml
/// api_url = "https://api.open-meteo.com"
/// timeout_secs = 5
///
/// [[groups]]
/// name = "Europe"
/// locations = [{ name = "Berlin", latitude = 52.52, longitude = 13.41 }]
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Provider id, e.g. "openmeteo". Absent means the default provider.
    pub provider: Option<String>,

    pub api_url: String,

    /// Per-request timeout, also used as the default deadline for a whole run.
    pub timeout_secs: u64,

    /// Upper bound on in-flight requests; absent means one request per location.
    pub concurrency_limit: Option<usize>,

    pub groups: Vec<LocationGroup>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            provider: None,
            api_url: DEFAULT_API_URL.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            concurrency_limit: None,
            groups: Vec::new(),
        }
    }
}

impl Config {
    pub fn provider_id(&self) -> Result<ProviderId> {
        match &self.provider {
            Some(s) => ProviderId::try_from(s.as_str()),
            None => Ok(ProviderId::OpenMeteo),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// All configured locations, each tagged with its group name.
    pub fn locations(&self) -> Vec<Location> {
        self.groups
            .iter()
            .flat_map(|g| {
                g.locations
                    .iter()
                    .map(|l| l.clone().with_category(g.name.clone()))
            })
            .collect()
    }

    /// Check the invariants the fetch pipeline relies on: unique group names,
    /// unique location names across the whole run, valid coordinates.
    pub fn validate(&self) -> Result<()> {
        if self.timeout_secs == 0 {
            bail!("timeout_secs must be greater than zero");
        }
        if self.concurrency_limit == Some(0) {
            bail!("concurrency_limit must be greater than zero when set");
        }
        self.provider_id()?;

        let mut group_names = HashSet::new();
        let mut location_names = HashSet::new();

        for group in &self.groups {
            if group.name.trim().is_empty() {
                bail!("Group names must not be empty");
            }
            if !group_names.insert(group.name.as_str()) {
                bail!("Duplicate group '{}'", group.name);
            }
            for location in &group.locations {
                location
                    .validate()
                    .with_context(|| format!("Invalid location in group '{}'", group.name))?;
                if !location_names.insert(location.name.as_str()) {
                    bail!(
                        "Duplicate location '{}' (location names must be unique)",
                        location.name
                    );
                }
            }
        }

        Ok(())
    }

    /// Load config from the default path, or return an empty default if it doesn't exist yet.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_file_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            // First run: no config file, return empty.
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let cfg: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(cfg)
    }

    /// Save config to the default path, creating parent directories as needed.
    pub fn save(&self) -> Result<PathBuf> {
        let path = Self::config_file_path()?;
        self.save_to(&path)?;
        Ok(path)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml =
            toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")?;

        fs::write(path, toml)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Path to the config file.
    pub fn config_file_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("dev", "meteo", "meteo-cli")
            .ok_or_else(|| anyhow!("Could not determine platform config directory"))?;

        Ok(dirs.config_dir().join("config.toml"))
    }

    /// A starter city list spread over several continents.
    pub fn sample() -> Self {
        let group = |name: &str, cities: &[(&str, f64, f64)]| LocationGroup {
            name: name.to_string(),
            locations: cities
                .iter()
                .map(|(n, lat, lon)| Location::new(*n, *lat, *lon))
                .collect(),
        };

        let europe = [
            ("Berlin", 52.52, 13.41),
            ("London", 51.51, -0.13),
            ("Madrid", 40.42, -3.70),
        ];
        let asia = [
            ("Tokyo", 35.68, 139.75),
            ("Mumbai", 19.08, 72.88),
            ("Singapore", 1.35, 103.82),
        ];
        let north_america = [("New York", 40.71, -74.01), ("Mexico City", 19.43, -99.13)];
        let south_america = [
            ("São Paulo", -23.55, -46.63),
            ("Buenos Aires", -34.60, -58.38),
        ];
        let africa = [
            ("Cairo", 30.04, 31.24),
            ("Lagos", 6.52, 3.38),
            ("Nairobi", -1.29, 36.82),
        ];
        let oceania = [("Sydney", -33.87, 151.21), ("Auckland", -36.85, 174.76)];

        Self {
            groups: vec![
                group("Europe", &europe),
                group("Asia", &asia),
                group("North America", &north_america),
                group("South America", &south_america),
                group("Africa", &africa),
                group("Oceania", &oceania),
            ],
            ..Self::default()
        }
    }
}
