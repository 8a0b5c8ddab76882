//! Plain-text rendering of fetch results.

use std::collections::HashMap;

use crate::{GroupStatistics, MeasurementResult, describe_weather_code};

const RULE: &str = "========================================";
const THIN_RULE: &str = "----------------------------------------";

/// Render the grouped comparison report.
///
/// Groups appear in order of their first result in `results`; items keep their
/// order within a group. Failed items are listed with their error, never dropped.
/// `key_of` must be the key function the statistics were aggregated with; a
/// group missing from `stats` is flagged rather than skipped.
pub fn render<F>(
    stats: &HashMap<String, GroupStatistics>,
    results: &[MeasurementResult],
    key_of: F,
) -> String
where
    F: Fn(&MeasurementResult) -> &str,
{
    if results.is_empty() {
        return "No weather data to compare.\n".to_string();
    }

    let mut order: Vec<&str> = Vec::new();
    let mut members: HashMap<&str, Vec<&MeasurementResult>> = HashMap::new();
    for result in results {
        let key = key_of(result);
        if !members.contains_key(key) {
            order.push(key);
        }
        members.entry(key).or_default().push(result);
    }

    let mut lines = vec!["Weather comparison summary".to_string(), RULE.to_string()];

    for key in order {
        lines.push(String::new());
        lines.push(format!("Group: {key}"));
        lines.push(THIN_RULE.to_string());

        match stats.get(key) {
            Some(group) => lines.extend(stat_lines(group)),
            None => lines.push("No statistics available for this group".to_string()),
        }

        lines.push(String::new());
        lines.push("Per-location results:".to_string());
        for item in &members[key] {
            lines.push(item_line(item));
        }
    }

    let mut out = lines.join("\n");
    out.push('\n');
    out
}

fn stat_lines(group: &GroupStatistics) -> Vec<String> {
    let mut lines = Vec::new();

    if let Some(wall) = group.wall_time {
        lines.push(format!("Wall time: {}ms", wall.as_millis()));
    }

    match group.temperature {
        Some(t) => lines.push(format!(
            "Valid temperatures: {}/{}, Avg: {:.2} °C, Min: {:.1} °C, Max: {:.1} °C",
            group.valid, group.items, t.avg, t.min, t.max
        )),
        None => lines.push(format!(
            "No valid temperature data ({} of {} failed)",
            group.items, group.items
        )),
    }

    let l = group.latency;
    lines.push(format!(
        "Fetch times (s): Avg: {:.3}, Min: {:.3}, Max: {:.3}",
        l.avg, l.min, l.max
    ));
    lines
}

fn item_line(item: &MeasurementResult) -> String {
    let name = &item.location.name;
    let secs = item.elapsed_secs();
    match &item.outcome {
        Ok(m) => format!("  {name}: {:.1} °C (fetch {secs:.3}s)", m.temperature_c),
        Err(err) => format!("  {name}: ERROR: {err} (fetch {secs:.3}s)"),
    }
}

/// Render every available field of each result, one block per location.
pub fn render_detailed(results: &[MeasurementResult]) -> String {
    let mut lines = Vec::new();

    for result in results {
        let m = match &result.outcome {
            Ok(m) => m,
            Err(err) => {
                lines.push(format!("{}: ERROR: {}", result.location.name, err));
                lines.push(String::new());
                continue;
            }
        };

        lines.push(format!(
            "{} ({:.2}, {:.2})",
            result.location.name, result.location.latitude, result.location.longitude
        ));
        lines.push(field("Temperature", format!("{:.1} °C", m.temperature_c)));

        let conditions = m
            .weather_code
            .map(|c| format!("{} ({c})", describe_weather_code(c)));
        let optional = [
            ("Feels like", m.apparent_temperature_c.map(|v| format!("{v:.1} °C"))),
            ("Humidity", m.humidity_pct.map(|v| format!("{v:.0}%"))),
            ("Wind speed", m.wind_speed_kmh.map(|v| format!("{v:.1} km/h"))),
            ("Wind direction", m.wind_direction_deg.map(|v| format!("{v:.0}°"))),
            ("Wind gusts", m.wind_gusts_kmh.map(|v| format!("{v:.1} km/h"))),
            ("Precipitation", m.precipitation_mm.map(|v| format!("{v:.1} mm"))),
            ("Cloud cover", m.cloud_cover_pct.map(|v| format!("{v:.0}%"))),
            ("Visibility", m.visibility_m.map(|v| format!("{v:.0} m"))),
            ("Pressure", m.pressure_hpa.map(|v| format!("{v:.0} hPa"))),
            ("Conditions", conditions),
        ];
        for (label, value) in optional {
            if let Some(value) = value {
                lines.push(field(label, value));
            }
        }

        let fetched = format!(
            "{:.3}s at {}",
            result.elapsed_secs(),
            result.fetched_at.format("%H:%M:%S UTC")
        );
        lines.push(field("Fetched", fetched));
        lines.push(String::new());
    }

    lines.join("\n")
}

fn field(label: &str, value: String) -> String {
    format!("   {:<16}{}", format!("{label}:"), value)
}
