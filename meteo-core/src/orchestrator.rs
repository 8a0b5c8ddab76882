use std::{collections::HashMap, sync::Arc, time::Duration};

use chrono::Utc;
use futures::future::join_all;
use tokio::{
    sync::Semaphore,
    task::JoinHandle,
    time::{Instant, timeout_at},
};
use tracing::{debug, info};

use crate::{FetchError, Fetcher, Location, LocationGroup, MeasurementResult, WeatherProvider};

/// Output of [`Orchestrator::fetch_grouped`].
#[derive(Debug, Default)]
pub struct GroupedFetch {
    /// Group by group, input order inside each group. Every result carries its
    /// group name in `location.category`.
    pub results: Vec<MeasurementResult>,
    /// Wall-clock span from launching a group's fetches until the last one finished.
    pub durations: HashMap<String, Duration>,
}

struct Task {
    location: Location,
    launched: Instant,
    handle: JoinHandle<MeasurementResult>,
}

/// Fans fetches out over tokio tasks and collects exactly one result per input.
#[derive(Debug, Clone)]
pub struct Orchestrator {
    fetcher: Fetcher,
    limiter: Option<Arc<Semaphore>>,
}

impl Orchestrator {
    pub fn new(provider: Arc<dyn WeatherProvider>) -> Self {
        Self {
            fetcher: Fetcher::new(provider),
            limiter: None,
        }
    }

    /// Cap the number of in-flight provider calls. `None` or `Some(0)` means unbounded.
    pub fn with_concurrency_limit(mut self, limit: Option<usize>) -> Self {
        self.limiter = limit
            .filter(|n| *n > 0)
            .map(|n| Arc::new(Semaphore::new(n)));
        self
    }

    /// Fetch every location concurrently. The output has the same length and
    /// order as `locations`, regardless of completion order.
    pub async fn fetch_all(
        &self,
        locations: Vec<Location>,
        deadline: Instant,
    ) -> Vec<MeasurementResult> {
        if locations.is_empty() {
            return Vec::new();
        }

        info!(count = locations.len(), "fetching locations");
        let tasks = locations
            .into_iter()
            .map(|location| self.spawn(location, deadline))
            .collect();
        join_tasks(tasks).await
    }

    /// Fetch every group's locations concurrently, timing each group on its own.
    ///
    /// All groups are launched before any is awaited. Empty groups are skipped.
    pub async fn fetch_grouped(
        &self,
        groups: Vec<LocationGroup>,
        deadline: Instant,
    ) -> GroupedFetch {
        let batches: Vec<_> = groups
            .into_iter()
            .filter(|group| !group.locations.is_empty())
            .map(|group| {
                let started = Instant::now();
                let tasks: Vec<Task> = group
                    .locations
                    .into_iter()
                    .map(|location| {
                        let location = location.with_category(group.name.clone());
                        self.spawn(location, deadline)
                    })
                    .collect();
                let name = group.name;

                async move {
                    let results = join_tasks(tasks).await;
                    let wall_time = started.elapsed();
                    info!(
                        group = %name,
                        items = results.len(),
                        wall_ms = wall_time.as_millis() as u64,
                        "group finished"
                    );
                    (name, wall_time, results)
                }
            })
            .collect();

        let mut grouped = GroupedFetch::default();
        for (name, wall_time, results) in join_all(batches).await {
            grouped.durations.insert(name, wall_time);
            grouped.results.extend(results);
        }
        grouped
    }

    fn spawn(&self, location: Location, deadline: Instant) -> Task {
        let fetcher = self.fetcher.clone();
        let limiter = self.limiter.clone();
        let launched = Instant::now();
        let task_location = location.clone();

        let handle = tokio::spawn(async move {
            let _permit = match limiter {
                Some(semaphore) => match timeout_at(deadline, semaphore.acquire_owned()).await {
                    Ok(Ok(permit)) => Some(permit),
                    Ok(Err(closed)) => {
                        let error = FetchError::Task(closed.to_string());
                        return failed(task_location, launched, error);
                    }
                    Err(_) => {
                        debug!(location = %task_location.name, "deadline fired while queued");
                        let after = launched.elapsed();
                        let error = FetchError::DeadlineExceeded { after };
                        return failed(task_location, launched, error);
                    }
                },
                None => None,
            };

            fetcher.fetch(task_location, deadline).await
        });

        Task {
            location,
            launched,
            handle,
        }
    }
}

async fn join_tasks(tasks: Vec<Task>) -> Vec<MeasurementResult> {
    let (slots, handles): (Vec<_>, Vec<_>) = tasks
        .into_iter()
        .map(|t| ((t.location, t.launched), t.handle))
        .unzip();

    join_all(handles)
        .await
        .into_iter()
        .zip(slots)
        .map(|(joined, (location, launched))| match joined {
            Ok(result) => result,
            Err(err) => failed(location, launched, FetchError::Task(err.to_string())),
        })
        .collect()
}

fn failed(location: Location, launched: Instant, error: FetchError) -> MeasurementResult {
    MeasurementResult {
        location,
        outcome: Err(error),
        elapsed: launched.elapsed(),
        fetched_at: Utc::now(),
    }
}
