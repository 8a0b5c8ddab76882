use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use inquire::{Confirm, CustomType, Text};
use meteo_core::{
    Config, Fetcher, Location, LocationGroup, Orchestrator, aggregate, group_key,
    provider_from_config, report,
};
use tokio::time::{Duration, Instant};
use tracing::info;

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(
    name = "meteo",
    version,
    about = "Fetch and compare current weather across many locations"
)]
pub struct Cli {
    /// Config file to use instead of the platform default.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log fetch progress to stderr.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Set API URL, timeout and concurrency; seeds a sample city list on first run.
    Configure,

    /// Fetch every configured location and print the grouped comparison.
    Compare {
        /// Deadline for the whole run in seconds; defaults to the configured timeout.
        #[arg(long)]
        timeout: Option<u64>,

        /// Only compare these groups (repeatable).
        #[arg(long = "group")]
        groups: Vec<String>,
    },

    /// Show detailed current weather for one coordinate.
    Show {
        /// Display name for the location.
        name: String,

        #[arg(long, allow_hyphen_values = true)]
        lat: f64,

        #[arg(long, allow_hyphen_values = true)]
        lon: f64,

        /// Print JSON instead of text.
        #[arg(long)]
        json: bool,
    },

    /// List configured groups and locations.
    List,
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        let path = match self.config {
            Some(path) => path,
            None => Config::config_file_path()?,
        };

        match self.command {
            Command::Configure => configure(&path),
            Command::Compare { timeout, groups } => compare(&path, timeout, groups).await,
            Command::Show {
                name,
                lat,
                lon,
                json,
            } => show(&path, Location::new(name, lat, lon), json).await,
            Command::List => list(&path),
        }
    }
}

fn load(path: &Path) -> anyhow::Result<Config> {
    let cfg = Config::load_from(path)?;
    cfg.validate()
        .with_context(|| format!("Invalid configuration in {}", path.display()))?;
    Ok(cfg)
}

fn configure(path: &Path) -> anyhow::Result<()> {
    let mut cfg = Config::load_from(path)?;

    cfg.api_url = Text::new("API URL:").with_default(&cfg.api_url).prompt()?;

    cfg.timeout_secs = CustomType::<u64>::new("Request timeout (seconds):")
        .with_default(cfg.timeout_secs)
        .with_error_message("Please type a whole number of seconds")
        .prompt()?;

    let limit = CustomType::<usize>::new("Max concurrent requests (0 = one per location):")
        .with_default(cfg.concurrency_limit.unwrap_or(0))
        .with_error_message("Please type a whole number")
        .prompt()?;
    cfg.concurrency_limit = (limit > 0).then_some(limit);

    let seed = Confirm::new("Add a sample city list?").with_default(true);
    if cfg.groups.is_empty() && seed.prompt()? {
        cfg.groups = Config::sample().groups;
    }

    cfg.validate()?;
    cfg.save_to(path)?;
    println!("Configuration saved to {}", path.display());

    Ok(())
}

async fn compare(path: &Path, timeout: Option<u64>, only: Vec<String>) -> anyhow::Result<()> {
    let cfg = load(path)?;

    let groups = select_groups(&cfg.groups, &only)?;
    if groups.iter().all(|g| g.locations.is_empty()) {
        bail!(
            "No locations to compare.\n\
             Hint: run `meteo configure` to add a sample city list, or edit {}.",
            path.display()
        );
    }

    let provider = provider_from_config(&cfg)?;
    let orchestrator =
        Orchestrator::new(provider).with_concurrency_limit(cfg.concurrency_limit);
    let budget = timeout
        .map(Duration::from_secs)
        .unwrap_or_else(|| cfg.timeout());

    let started = Instant::now();
    let grouped = orchestrator.fetch_grouped(groups, started + budget).await;
    info!(results = grouped.results.len(), "all fetches finished");

    let stats = aggregate(&grouped.results, group_key, &grouped.durations);
    print!("{}", report::render(&stats, &grouped.results, group_key));
    println!("\nTotal wall time: {}ms", started.elapsed().as_millis());

    Ok(())
}

/// Narrow `groups` to the names in `only`, keeping configured order.
/// An empty `only` selects everything; an unknown name is an error.
fn select_groups(groups: &[LocationGroup], only: &[String]) -> anyhow::Result<Vec<LocationGroup>> {
    if only.is_empty() {
        return Ok(groups.to_vec());
    }

    let unknown: Vec<&str> = only
        .iter()
        .filter(|name| !groups.iter().any(|g| &g.name == *name))
        .map(String::as_str)
        .collect();
    if !unknown.is_empty() {
        let available: Vec<&str> = groups.iter().map(|g| g.name.as_str()).collect();
        bail!(
            "Unknown group(s): {}. Available groups: {}",
            unknown.join(", "),
            available.join(", ")
        );
    }

    Ok(groups
        .iter()
        .filter(|g| only.contains(&g.name))
        .cloned()
        .collect())
}

async fn show(path: &Path, location: Location, json: bool) -> anyhow::Result<()> {
    location.validate()?;
    let cfg = load(path)?;

    let fetcher = Fetcher::new(provider_from_config(&cfg)?);
    let result = fetcher.fetch(location, Instant::now() + cfg.timeout()).await;

    if json {
        let value = serde_json::json!({
            "location": result.location,
            "measurement": result.measurement(),
            "error": result.error().map(ToString::to_string),
            "fetch_secs": result.elapsed_secs(),
            "fetched_at": result.fetched_at,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
    } else {
        print!("{}", report::render_detailed(std::slice::from_ref(&result)));
    }

    Ok(())
}

fn list(path: &Path) -> anyhow::Result<()> {
    let cfg = load(path)?;

    if cfg.groups.is_empty() {
        println!("No groups configured. Run `meteo configure` to add a sample city list.");
        return Ok(());
    }

    for group in &cfg.groups {
        println!("{} ({} locations)", group.name, group.locations.len());
        for loc in &group.locations {
            println!(
                "  {:<16} {:>8.2} {:>9.2}",
                loc.name, loc.latitude, loc.longitude
            );
        }
    }

    Ok(())
}
