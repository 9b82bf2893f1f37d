//! Shared sink for request outcomes: statistics plus an optional JSONL log.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::api::ApiResponse;
use crate::error::TaskFailure;
use crate::metrics::MetricsRegistry;

/// A single logged request for debugging.
#[derive(Debug, Serialize)]
pub struct RequestLog<'a> {
    pub timestamp_ms: u64,
    pub actor: usize,
    pub name: &'a str,
    pub status: u16,
    pub latency_ms: f64,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Cheap to clone; every actor holds one.
#[derive(Clone)]
pub struct Recorder {
    metrics: Arc<Mutex<MetricsRegistry>>,
    log: Option<Arc<Mutex<BufWriter<File>>>>,
    log_failures: Arc<AtomicU64>,
    started: Instant,
}

impl Recorder {
    pub fn new() -> Self {
        Self {
            metrics: Arc::new(Mutex::new(MetricsRegistry::new())),
            log: None,
            log_failures: Arc::new(AtomicU64::new(0)),
            started: Instant::now(),
        }
    }

    /// Also append every request to `path` as JSON lines.
    pub fn with_log_file(mut self, path: &Path) -> std::io::Result<Self> {
        let file = File::create(path)?;
        self.log = Some(Arc::new(Mutex::new(BufWriter::new(file))));
        Ok(self)
    }

    pub fn metrics(&self) -> Arc<Mutex<MetricsRegistry>> {
        self.metrics.clone()
    }

    /// Record the outcome of one request under `name`.
    pub async fn record(
        &self,
        actor: usize,
        name: &str,
        response: &ApiResponse,
        outcome: &Result<(), TaskFailure>,
    ) {
        if let Err(failure) = outcome {
            debug!(actor, request = name, status = response.status, error = %failure, "Request failed");
        }

        self.metrics
            .lock()
            .await
            .record(name, response.latency_us, response.bytes(), outcome);

        if let Some(ref log) = self.log {
            let entry = RequestLog {
                timestamp_ms: self.started.elapsed().as_millis() as u64,
                actor,
                name,
                status: response.status,
                latency_ms: response.latency_us as f64 / 1000.0,
                success: outcome.is_ok(),
                error: outcome.as_ref().err().map(|f| f.to_string()),
            };
            if let Ok(json) = serde_json::to_string(&entry) {
                let mut writer = log.lock().await;
                if let Err(err) = writeln!(writer, "{}", json) {
                    // Warn once, a broken log usually stays broken
                    if self.log_failures.fetch_add(1, Ordering::Relaxed) == 0 {
                        warn!(error = %err, "Failed to write request log");
                    }
                }
            }
        }
    }

    /// Request log lines that could not be written.
    pub fn log_write_failures(&self) -> u64 {
        self.log_failures.load(Ordering::Relaxed)
    }

    /// Flush the request log, if any.
    pub async fn flush(&self) -> std::io::Result<()> {
        if let Some(ref log) = self.log {
            log.lock().await.flush()?;
        }
        Ok(())
    }
}

impl Default for Recorder {
    fn default() -> Self {
        Self::new()
    }
}
