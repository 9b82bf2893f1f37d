//! Actor spawning and load test orchestration.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio::time::{interval, sleep_until, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::actors::{drive, ActorContext, ActorKind, PrivilegedActor, StandardActor};
use crate::api::ApiClient;
use crate::config::TestConfig;
use crate::metrics::TestResults;
use crate::recorder::Recorder;
use crate::tasks::TaskSet;

/// How often the running actor count is compared with the scenario's target.
const CONTROL_TICK: Duration = Duration::from_millis(100);

/// Runs one scenario: keeps the number of running actors on the configured
/// rate or staged ramp until the run ends (or Ctrl-C), then collects statistics.
pub struct LoadRunner {
    config: TestConfig,
    show_progress: bool,
    results_dir: PathBuf,
}

impl LoadRunner {
    pub fn new(config: TestConfig) -> Self {
        Self {
            config,
            show_progress: true,
            results_dir: PathBuf::from("results"),
        }
    }

    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    /// Directory for request logs when `log_requests` is set.
    pub fn with_results_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.results_dir = dir.into();
        self
    }

    /// Run the load test.
    pub async fn run(&self) -> anyhow::Result<TestResults> {
        let config = &self.config;
        config.validate()?;
        let standard_tasks = config.standard_tasks()?;
        let privileged_tasks = config.privileged_tasks()?;
        let standard_wait = config.actors.standard.wait_time()?;
        let privileged_wait = config.actors.privileged.wait_time()?;
        let total = config.total_duration();

        let client = ApiClient::from_config(config)?;
        let recorder = self.recorder()?;

        info!(
            name = %config.name,
            host = %config.host,
            peak_users = config.peak_users(),
            stages = config.stages.len(),
            duration_secs = total.as_secs(),
            "Starting load test"
        );

        let pb = self.progress_bar(total);
        let (interrupt_tx, mut interrupt) = watch::channel(false);
        let interrupt_tx = Arc::new(interrupt_tx);

        let signal_tx = interrupt_tx.clone();
        let signal = tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupted, stopping actors");
                let _ = signal_tx.send(true);
            }
        });

        let classes = TaskSet::new(&[
            (ActorKind::Standard, config.actors.standard.weight),
            (ActorKind::Privileged, config.actors.privileged.weight),
        ]);
        let mut master = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let start = Instant::now();
        let deadline = start + total;
        let mut ticker = interval(CONTROL_TICK);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut actors = JoinSet::new();
        // One stop channel per running actor, oldest first
        let mut running: Vec<watch::Sender<bool>> = Vec::new();
        let mut spawned = 0u32;

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = sleep_until(deadline) => break,
                // Only ever flips to true
                _ = interrupt.changed() => break,
            }

            let elapsed = start.elapsed();
            let target = config.target_users(elapsed) as usize;

            while running.len() < target {
                let Some(kind) = classes.pick(&mut master) else {
                    break;
                };
                let id = spawned as usize;
                let rng = match config.seed {
                    Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(id as u64)),
                    None => StdRng::from_entropy(),
                };
                let ctx = ActorContext::new(id, client.clone(), recorder.clone(), rng);
                let (stop_tx, stop_rx) = watch::channel(false);
                match kind {
                    ActorKind::Standard => {
                        let actor =
                            StandardActor::new(standard_wait).with_tasks(standard_tasks.clone());
                        actors.spawn(drive(actor, ctx, stop_rx));
                    }
                    ActorKind::Privileged => {
                        let actor = PrivilegedActor::new(privileged_wait)
                            .with_tasks(privileged_tasks.clone());
                        actors.spawn(drive(actor, ctx, stop_rx));
                    }
                }
                running.push(stop_tx);
                spawned += 1;
            }

            if running.len() > target {
                debug!(from = running.len(), to = target, "Ramping down");
                for stop in running.drain(target..) {
                    let _ = stop.send(true);
                }
            }

            pb.set_position(elapsed.as_secs().min(total.as_secs()));
            pb.set_message(format!("{} actors", running.len()));
        }
        info!(spawned, running = running.len(), "Stopping actors");

        pb.set_message("Waiting for in-flight requests...");
        for stop in running.drain(..) {
            let _ = stop.send(true);
        }
        signal.abort();
        while let Some(joined) = actors.join_next().await {
            if let Err(err) = joined {
                warn!(error = %err, "Actor task failed");
            }
        }
        let elapsed = start.elapsed();
        pb.finish_with_message("Complete!");

        recorder.flush().await?;
        let metrics = recorder.metrics();
        let registry = metrics.lock().await;
        info!(
            requests = registry.total_requests(),
            elapsed_secs = elapsed.as_secs_f64(),
            "Load test finished"
        );
        Ok(registry.results(config.name.clone(), spawned, elapsed))
    }

    fn recorder(&self) -> anyhow::Result<Recorder> {
        let recorder = Recorder::new();
        if !self.config.log_requests {
            return Ok(recorder);
        }

        std::fs::create_dir_all(&self.results_dir)?;
        let scenario_name = self.config.name.replace(' ', "_").to_lowercase();
        let log_path = self.results_dir.join(format!(
            "{}_{}.jsonl",
            scenario_name,
            chrono::Utc::now().format("%Y%m%d_%H%M%S")
        ));
        info!(path = %log_path.display(), "Logging requests");
        Ok(recorder.with_log_file(&log_path)?)
    }

    fn progress_bar(&self, total: Duration) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }
        let pb = ProgressBar::new(total.as_secs());
        if let Ok(style) =
            ProgressStyle::with_template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len}s {msg}")
        {
            pb.set_style(style.progress_chars("##-"));
        }
        pb
    }
}
