//! Per-group statistics over fetch results.

use std::{collections::HashMap, time::Duration};

use crate::MeasurementResult;

/// Group name used for results whose location carries no category.
pub const UNGROUPED: &str = "Ungrouped";

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Summary {
    pub avg: f64,
    pub min: f64,
    pub max: f64,
}

impl Summary {
    /// `None` when `values` is empty, so no average is ever invented.
    pub fn from_values<I>(values: I) -> Option<Self>
    where
        I: IntoIterator<Item = f64>,
    {
        let mut count = 0usize;
        let mut sum = 0.0;
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;

        for v in values {
            count += 1;
            sum += v;
            min = min.min(v);
            max = max.max(v);
        }

        (count > 0).then(|| Summary {
            avg: sum / count as f64,
            min,
            max,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GroupStatistics {
    /// All results in the group, failed ones included.
    pub items: usize,
    /// Results with a usable measurement.
    pub valid: usize,
    /// Over valid results only; `None` when `valid == 0`.
    pub temperature: Option<Summary>,
    /// Fetch latency in seconds, over every result.
    pub latency: Summary,
    /// Group wall-clock span, when the fetch was batched per group.
    pub wall_time: Option<Duration>,
}

/// Default grouping key: the location's category, or [`UNGROUPED`].
pub fn group_key(result: &MeasurementResult) -> &str {
    result.location.category.as_deref().unwrap_or(UNGROUPED)
}

/// Partition `results` with `key_of` and summarise each partition.
///
/// `durations` supplies per-group wall-clock spans measured by the orchestrator;
/// groups missing from it get `wall_time: None`. Groups without results do not
/// appear in the output.
pub fn aggregate<F>(
    results: &[MeasurementResult],
    key_of: F,
    durations: &HashMap<String, Duration>,
) -> HashMap<String, GroupStatistics>
where
    F: Fn(&MeasurementResult) -> &str,
{
    let mut groups: HashMap<&str, Vec<&MeasurementResult>> = HashMap::new();
    for result in results {
        groups.entry(key_of(result)).or_default().push(result);
    }

    groups
        .into_iter()
        .filter_map(|(key, items)| {
            let latency = Summary::from_values(items.iter().map(|r| r.elapsed_secs()))?;
            let temperature = Summary::from_values(items.iter().filter_map(|r| r.temperature()));
            let valid = items.iter().filter(|r| r.is_success()).count();

            let stats = GroupStatistics {
                items: items.len(),
                valid,
                temperature,
                latency,
                wall_time: durations.get(key).copied(),
            };
            Some((key.to_string(), stats))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{FetchError, Location, Measurement};
    use chrono::Utc;

    fn item(name: &str, group: &str, temp: Option<f64>, secs: f64) -> MeasurementResult {
        let outcome = match temp {
            Some(t) => Ok(Measurement {
                temperature_c: t,
                ..Measurement::default()
            }),
            None => Err(FetchError::Status {
                status: 500,
                body: String::new(),
            }),
        };
        MeasurementResult {
            location: Location::new(name, 0.0, 0.0).with_category(group),
            outcome,
            elapsed: Duration::from_secs_f64(secs),
            fetched_at: Utc::now(),
        }
    }

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-6
    }

    #[test]
    fn summary_of_nothing_is_none() {
        assert_eq!(Summary::from_values(Vec::new()), None);
    }

    #[test]
    fn temperature_stats_over_valid_items() {
        let results = vec![
            item("A", "Europe", Some(10.0), 0.1),
            item("B", "Europe", Some(20.0), 0.1),
            item("C", "Europe", Some(30.0), 0.1),
        ];
        let stats = aggregate(&results, group_key, &HashMap::new());
        let europe = &stats["Europe"];

        let temp = europe.temperature.expect("valid items present");
        assert!(approx(temp.avg, 20.0));
        assert_eq!(temp.min, 10.0);
        assert_eq!(temp.max, 30.0);
        assert_eq!((europe.items, europe.valid), (3, 3));
        assert_eq!(europe.wall_time, None);
    }

    #[test]
    fn latency_stats_include_failed_items() {
        let results = vec![
            item("A", "Asia", Some(25.0), 0.1),
            item("B", "Asia", Some(27.0), 0.2),
            item("C", "Asia", None, 0.05),
        ];
        let stats = aggregate(&results, group_key, &HashMap::new());
        let asia = &stats["Asia"];

        assert!(approx(asia.latency.avg, 0.116_666_7));
        assert!(approx(asia.latency.min, 0.05));
        assert!(approx(asia.latency.max, 0.2));
        assert_eq!((asia.items, asia.valid), (3, 2));
        assert!(approx(asia.temperature.unwrap().avg, 26.0));
    }

    #[test]
    fn group_without_valid_items_has_no_temperature() {
        let results = vec![item("A", "Africa", None, 0.3), item("B", "Africa", None, 0.1)];
        let stats = aggregate(&results, group_key, &HashMap::new());
        let africa = &stats["Africa"];

        assert_eq!(africa.valid, 0);
        assert_eq!(africa.temperature, None);
        assert!(approx(africa.latency.avg, 0.2));
    }

    #[test]
    fn partitions_by_key_and_attaches_wall_time() {
        let results = vec![
            item("Berlin", "Europe", Some(15.0), 0.1),
            item("Tokyo", "Asia", Some(22.0), 0.2),
            item("Paris", "Europe", Some(17.0), 0.3),
        ];
        let durations = HashMap::from([("Europe".to_string(), Duration::from_millis(310))]);

        let stats = aggregate(&results, group_key, &durations);

        assert_eq!(stats.len(), 2);
        assert_eq!(stats["Europe"].items, 2);
        assert_eq!(stats["Europe"].wall_time, Some(Duration::from_millis(310)));
        assert_eq!(stats["Asia"].items, 1);
        assert_eq!(stats["Asia"].wall_time, None);
    }

    #[test]
    fn uncategorised_results_fall_into_default_group() {
        let mut result = item("Lonely", "x", Some(5.0), 0.1);
        result.location.category = None;

        let stats = aggregate(&[result], group_key, &HashMap::new());
        assert!(stats.contains_key(UNGROUPED));
    }

    #[test]
    fn custom_key_function() {
        let results = vec![
            item("Berlin", "Europe", Some(15.0), 0.1),
            item("Tokyo", "Asia", Some(22.0), 0.2),
        ];
        let stats = aggregate(&results, |_| "all", &HashMap::new());

        assert_eq!(stats.len(), 1);
        assert_eq!(stats["all"].items, 2);
    }

    #[test]
    fn empty_input_yields_no_groups() {
        assert!(aggregate(&[], group_key, &HashMap::new()).is_empty());
    }
}
