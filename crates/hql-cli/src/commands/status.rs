//! Status command implementation.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashMap;

/// Health response from the server.
#[derive(Debug, Deserialize)]
struct HealthResponse {
    status: String,
    #[serde(default)]
    ready: bool,
    #[serde(default)]
    uptime_seconds: u64,
    components: HashMap<String, ComponentStatus>,
}

/// Component status from the server.
#[derive(Debug, Deserialize)]
struct ComponentStatus {
    status: String,
    message: Option<String>,
}

/// Show status and health.
pub async fn run(url: &str) -> Result<()> {
    println!("Checking health at {}...\n", url);

    // Fetch health status
    let health_url = format!("{}/health", url.trim_end_matches('/'));
    let client = reqwest::Client::new();

    match client.get(&health_url).send().await {
        Ok(response) => {
            let status_code = response.status();
            match response.json::<HealthResponse>().await {
                Ok(health) => {
                    print_health_status(&health, status_code.as_u16());
                }
                Err(e) => {
                    println!("Failed to parse health response: {}", e);
                    println!("HTTP Status: {}", status_code);
                }
            }
        }
        Err(e) => {
            println!("Failed to connect to health endpoint: {}", e);
            println!("\nIs the hql metastore service running?");
            println!("Start it with: hql serve --config <path-to-config>");
            return Ok(());
        }
    }

    // The metastore port also serves /metrics
    let metrics_url = format!("{}/metrics", url.trim_end_matches('/'));

    println!("\n--- Metrics ---");
    println!("Fetching from {}...\n", metrics_url);

    match client.get(&metrics_url).send().await {
        Ok(response) => {
            let text = response.text().await.context("Failed to read metrics")?;
            print_metrics(&text);
        }
        Err(e) => {
            println!("Failed to fetch metrics: {}", e);
        }
    }

    Ok(())
}

fn print_health_status(health: &HealthResponse, status_code: u16) {
    let status_emoji = match health.status.as_str() {
        "healthy" => "[OK]",
        "degraded" => "[WARN]",
        "unhealthy" => "[FAIL]",
        _ => "[?]",
    };

    println!(
        "{} Overall Status: {} (HTTP {})",
        status_emoji,
        health.status.to_uppercase(),
        status_code
    );
    println!(
        "Ready: {}  Uptime: {}s",
        if health.ready { "yes" } else { "no" },
        health.uptime_seconds
    );
    println!();

    if !health.components.is_empty() {
        println!("Components:");
        for (name, status) in &health.components {
            let emoji = match status.status.as_str() {
                "healthy" => "[OK]",
                "degraded" => "[WARN]",
                "unhealthy" => "[FAIL]",
                _ => "[?]",
            };

            if let Some(msg) = &status.message {
                println!("  {} {}: {} ({})", emoji, name, status.status, msg);
            } else {
                println!("  {} {}: {}", emoji, name, status.status);
            }
        }
    }
}

fn print_metrics(metrics_text: &str) {
    let values = parse_metrics(metrics_text);

    if let Some(v) = values.get("hql_plans_total") {
        println!("Plans Built:        {}", format_number(*v));
    }
    if let Some(v) = values.get("hql_stages_total") {
        println!("Stages Generated:   {}", format_number(*v));
    }
    if let Some(v) = values.get("hql_grouping_set_additional_jobs_total") {
        println!("Additional Jobs:    {}", v);
    }
    let failures: u64 = values
        .iter()
        .filter(|(name, _)| name.starts_with("hql_plan_failures_total"))
        .map(|(_, v)| *v)
        .sum();
    println!("Plan Failures:      {}", failures);
    let calls: u64 = values
        .iter()
        .filter(|(name, _)| name.starts_with("hql_metastore_calls_total"))
        .map(|(_, v)| *v)
        .sum();
    println!("Metastore Calls:    {}", format_number(calls));
}

/// Integer samples of a Prometheus text exposition, keyed by series.
fn parse_metrics(metrics_text: &str) -> HashMap<&str, u64> {
    let mut values = HashMap::new();
    for line in metrics_text.lines() {
        if line.starts_with('#') || line.is_empty() {
            continue;
        }
        // "series value"; labels never contain spaces here
        if let Some((series, value)) = line.rsplit_once(' ') {
            if let Ok(value) = value.parse::<u64>() {
                values.insert(series, value);
            }
        }
    }
    values
}

fn format_number(n: u64) -> String {
    if n >= 1_000_000_000 {
        format!("{:.2}B", n as f64 / 1_000_000_000.0)
    } else if n >= 1_000_000 {
        format!("{:.2}M", n as f64 / 1_000_000.0)
    } else if n >= 1_000 {
        format!("{:.2}K", n as f64 / 1_000.0)
    } else {
        n.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_metrics() {
        let text = "# HELP hql_plans_total Total query plans built\n\
                    # TYPE hql_plans_total counter\n\
                    hql_plans_total 12\n\
                    hql_plan_failures_total{kind=\"grouping_sets\"} 2\n\
                    hql_plan_duration_seconds_sum 0.25\n";
        let values = parse_metrics(text);
        assert_eq!(values.get("hql_plans_total"), Some(&12));
        assert_eq!(
            values.get("hql_plan_failures_total{kind=\"grouping_sets\"}"),
            Some(&2)
        );
        assert!(!values.contains_key("hql_plan_duration_seconds_sum"));
    }

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(999), "999");
        assert_eq!(format_number(1_500), "1.50K");
        assert_eq!(format_number(2_000_000), "2.00M");
    }
}
