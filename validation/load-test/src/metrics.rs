//! Metrics collection and statistics.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use hdrhistogram::Histogram;
use serde::{Deserialize, Serialize};

use crate::config::Thresholds;
use crate::error::TaskFailure;

/// Name under which aggregated totals are reported.
pub const AGGREGATED: &str = "Aggregated";

/// Collects metrics for one request name.
pub struct MetricsCollector {
    histogram: Histogram<u64>,
    requests_total: u64,
    requests_success: u64,
    requests_failed: u64,
    bytes_total: u64,
}

impl MetricsCollector {
    /// Create a new metrics collector.
    pub fn new() -> Self {
        Self {
            histogram: Histogram::new(3).expect("Failed to create histogram"),
            requests_total: 0,
            requests_success: 0,
            requests_failed: 0,
            bytes_total: 0,
        }
    }

    /// Record a successful request.
    pub fn record_success(&mut self, latency_us: u64, bytes: usize) {
        self.requests_total += 1;
        self.requests_success += 1;
        self.bytes_total += bytes as u64;
        self.histogram.record(latency_us).ok();
    }

    /// Record a failed request. Latency still counts toward percentiles.
    pub fn record_failure(&mut self, latency_us: u64) {
        self.requests_total += 1;
        self.requests_failed += 1;
        self.histogram.record(latency_us).ok();
    }

    pub fn requests_total(&self) -> u64 {
        self.requests_total
    }

    /// Summarize into a report row.
    pub fn summary(&self, name: &str, elapsed: Duration) -> EndpointStats {
        let duration_secs = elapsed.as_secs_f64();
        let per_second = |n: u64| {
            if duration_secs > 0.0 {
                n as f64 / duration_secs
            } else {
                0.0
            }
        };

        EndpointStats {
            name: name.to_string(),
            requests: self.requests_total,
            successes: self.requests_success,
            failures: self.requests_failed,
            failure_rate: if self.requests_total > 0 {
                self.requests_failed as f64 / self.requests_total as f64
            } else {
                0.0
            },
            requests_per_second: per_second(self.requests_total),
            latency_p50: self.histogram.value_at_percentile(50.0) as f64 / 1000.0,
            latency_p75: self.histogram.value_at_percentile(75.0) as f64 / 1000.0,
            latency_p90: self.histogram.value_at_percentile(90.0) as f64 / 1000.0,
            latency_p95: self.histogram.value_at_percentile(95.0) as f64 / 1000.0,
            latency_p99: self.histogram.value_at_percentile(99.0) as f64 / 1000.0,
            latency_min: self.histogram.min() as f64 / 1000.0,
            latency_max: self.histogram.max() as f64 / 1000.0,
            latency_avg: self.histogram.mean() / 1000.0,
            bytes_per_second: per_second(self.bytes_total),
        }
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-request-name statistics shared by every actor of a run.
#[derive(Default)]
pub struct MetricsRegistry {
    endpoints: BTreeMap<String, MetricsCollector>,
    total: MetricsCollector,
    failures: BTreeMap<(String, String), u64>,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one request under `name`.
    pub fn record(
        &mut self,
        name: &str,
        latency_us: u64,
        bytes: usize,
        outcome: &Result<(), TaskFailure>,
    ) {
        let endpoint = self.endpoints.entry(name.to_string()).or_default();
        match outcome {
            Ok(()) => {
                endpoint.record_success(latency_us, bytes);
                self.total.record_success(latency_us, bytes);
            }
            Err(failure) => {
                endpoint.record_failure(latency_us);
                self.total.record_failure(latency_us);
                *self
                    .failures
                    .entry((name.to_string(), failure.to_string()))
                    .or_insert(0) += 1;
            }
        }
    }

    pub fn total_requests(&self) -> u64 {
        self.total.requests_total()
    }

    /// Generate final test results.
    pub fn results(&self, config_name: String, users: u32, elapsed: Duration) -> TestResults {
        TestResults {
            timestamp: chrono::Utc::now().to_rfc3339(),
            config_name,
            duration_secs: elapsed.as_secs_f64(),
            users,
            total: self.total.summary(AGGREGATED, elapsed),
            endpoints: self
                .endpoints
                .iter()
                .map(|(name, collector)| collector.summary(name, elapsed))
                .collect(),
            failures: self
                .failures
                .iter()
                .map(|((name, message), occurrences)| FailureCount {
                    name: name.clone(),
                    message: message.clone(),
                    occurrences: *occurrences,
                })
                .collect(),
        }
    }
}

/// Statistics for one request name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointStats {
    pub name: String,
    pub requests: u64,
    pub successes: u64,
    pub failures: u64,
    pub failure_rate: f64,
    pub requests_per_second: f64,

    // Latency percentiles (ms)
    pub latency_p50: f64,
    pub latency_p75: f64,
    pub latency_p90: f64,
    pub latency_p95: f64,
    pub latency_p99: f64,
    pub latency_min: f64,
    pub latency_max: f64,
    pub latency_avg: f64,

    pub bytes_per_second: f64,
}

/// How often a request name failed with a given message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailureCount {
    pub name: String,
    pub message: String,
    pub occurrences: u64,
}

/// Final test results.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestResults {
    pub timestamp: String,
    pub config_name: String,
    pub duration_secs: f64,
    pub users: u32,
    pub total: EndpointStats,
    pub endpoints: Vec<EndpointStats>,
    pub failures: Vec<FailureCount>,
}

/// A threshold that the run exceeded.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ThresholdViolation {
    pub metric: &'static str,
    pub limit: f64,
    pub actual: f64,
}

impl fmt::Display for ThresholdViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} = {:.3} exceeds limit {:.3}",
            self.metric, self.actual, self.limit
        )
    }
}

impl TestResults {
    pub fn endpoint(&self, name: &str) -> Option<&EndpointStats> {
        self.endpoints.iter().find(|e| e.name == name)
    }

    /// Compare aggregated totals against the configured limits.
    pub fn check_thresholds(&self, thresholds: &Thresholds) -> Vec<ThresholdViolation> {
        let mut violations = Vec::new();

        if let Some(limit) = thresholds.p95_ms {
            if self.total.latency_p95 > limit {
                violations.push(ThresholdViolation {
                    metric: "p95_ms",
                    limit,
                    actual: self.total.latency_p95,
                });
            }
        }
        if let Some(limit) = thresholds.max_failure_rate {
            if self.total.failure_rate > limit {
                violations.push(ThresholdViolation {
                    metric: "failure_rate",
                    limit,
                    actual: self.total.failure_rate,
                });
            }
        }

        violations
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> MetricsRegistry {
        let mut registry = MetricsRegistry::new();
        registry.record("/clients [LIST]", 10_000, 100, &Ok(()));
        registry.record("/clients [LIST]", 20_000, 100, &Ok(()));
        registry.record("/clients [LIST]", 30_000, 0, &Err(TaskFailure::Unauthorized));
        registry.record("/metrics [GET]", 5_000, 50, &Ok(()));
        registry
    }

    #[test]
    fn test_registry_splits_by_name() {
        let results = registry().results("t".to_string(), 2, Duration::from_secs(2));

        assert_eq!(results.total.requests, 4);
        assert_eq!(results.total.failures, 1);
        assert_eq!(results.total.requests_per_second, 2.0);

        let list = results.endpoint("/clients [LIST]").unwrap();
        assert_eq!(list.requests, 3);
        assert_eq!(list.successes, 2);
        assert!((list.failure_rate - 1.0 / 3.0).abs() < 1e-9);
        assert!((list.latency_max - 30.0).abs() < 0.1);

        assert_eq!(results.failures.len(), 1);
        assert_eq!(results.failures[0].name, "/clients [LIST]");
        assert_eq!(results.failures[0].occurrences, 1);
    }

    #[test]
    fn test_empty_collector_summary() {
        let summary = MetricsCollector::new().summary("x", Duration::ZERO);
        assert_eq!(summary.requests, 0);
        assert_eq!(summary.failure_rate, 0.0);
        assert_eq!(summary.requests_per_second, 0.0);
    }

    #[test]
    fn test_thresholds() {
        let results = registry().results("t".to_string(), 2, Duration::from_secs(1));

        let loose = Thresholds {
            p95_ms: Some(1_000.0),
            max_failure_rate: Some(0.5),
        };
        assert!(results.check_thresholds(&loose).is_empty());

        let strict = Thresholds {
            p95_ms: Some(1.0),
            max_failure_rate: Some(0.1),
        };
        let violations = results.check_thresholds(&strict);
        assert_eq!(violations.len(), 2);
        assert_eq!(violations[0].metric, "p95_ms");
        assert_eq!(violations[1].metric, "failure_rate");

        assert!(results.check_thresholds(&Thresholds::default()).is_empty());
    }
}
