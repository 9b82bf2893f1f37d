//! Results reporting and formatting.

use comfy_table::{modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL, Table};

use crate::metrics::{EndpointStats, TestResults};

/// Formats test results for output.
pub struct ResultsReport;

impl ResultsReport {
    /// Format results as console tables: summary, per-request breakdown and failures.
    pub fn format_table(results: &TestResults) -> String {
        let mut summary = Table::new();
        summary
            .load_preset(UTF8_FULL)
            .apply_modifier(UTF8_ROUND_CORNERS)
            .set_header(vec![format!("Load Test Results: {}", results.config_name)]);

        let total = &results.total;
        summary.add_row(vec!["Duration:", &format!("{:.1}s", results.duration_secs)]);
        summary.add_row(vec!["Actors:", &results.users.to_string()]);
        summary.add_row(vec!["Total Requests:", &total.requests.to_string()]);
        summary.add_row(vec![
            "Failure Rate:",
            &format!("{:.1}%", total.failure_rate * 100.0),
        ]);
        summary.add_row(vec![
            "Requests/sec:",
            &format!("{:.1}", total.requests_per_second),
        ]);
        summary.add_row(vec!["Latency (ms)", "p50 / p90 / p95 / p99 / max"]);
        summary.add_row(vec![
            "",
            &format!(
                "{:.1} / {:.1} / {:.1} / {:.1} / {:.1}",
                total.latency_p50,
                total.latency_p90,
                total.latency_p95,
                total.latency_p99,
                total.latency_max
            ),
        ]);

        let mut endpoints = Table::new();
        endpoints
            .load_preset(UTF8_FULL)
            .apply_modifier(UTF8_ROUND_CORNERS)
            .set_header(vec![
                "Name", "Reqs", "Fails", "p50", "p95", "p99", "Avg", "Max", "Req/s",
            ]);
        for stats in results.endpoints.iter().chain(std::iter::once(total)) {
            endpoints.add_row(endpoint_row(stats));
        }

        let mut output = format!("{}\n{}", summary, endpoints);

        if !results.failures.is_empty() {
            let mut failures = Table::new();
            failures
                .load_preset(UTF8_FULL)
                .apply_modifier(UTF8_ROUND_CORNERS)
                .set_header(vec!["Occurrences", "Name", "Error"]);
            for failure in &results.failures {
                failures.add_row(vec![
                    failure.occurrences.to_string(),
                    failure.name.clone(),
                    failure.message.clone(),
                ]);
            }
            output.push('\n');
            output.push_str(&failures.to_string());
        }

        output
    }

    /// Format results as JSON.
    pub fn format_json(results: &TestResults) -> anyhow::Result<String> {
        Ok(serde_json::to_string_pretty(results)?)
    }

    /// Format results as CSV, one row per request name plus the aggregate.
    pub fn format_csv(results: &TestResults) -> String {
        results
            .endpoints
            .iter()
            .chain(std::iter::once(&results.total))
            .map(|stats| {
                format!(
                    "{},{},\"{}\",{},{},{:.1},{:.1},{:.1},{:.1},{:.4}",
                    results.timestamp,
                    results.config_name,
                    stats.name.replace('"', "\"\""),
                    stats.requests,
                    stats.failures,
                    stats.requests_per_second,
                    stats.latency_p50,
                    stats.latency_p95,
                    stats.latency_p99,
                    stats.failure_rate
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// CSV header row.
    pub fn csv_header() -> &'static str {
        "timestamp,config,name,requests,failures,rps,p50,p95,p99,failure_rate"
    }
}

fn endpoint_row(stats: &EndpointStats) -> Vec<String> {
    vec![
        stats.name.clone(),
        stats.requests.to_string(),
        stats.failures.to_string(),
        format!("{:.1}", stats.latency_p50),
        format!("{:.1}", stats.latency_p95),
        format!("{:.1}", stats.latency_p99),
        format!("{:.1}", stats.latency_avg),
        format!("{:.1}", stats.latency_max),
        format!("{:.1}", stats.requests_per_second),
    ]
}
