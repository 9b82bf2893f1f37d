//! Configuration loading and management.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::actors::{PrivilegedTask, StandardTask};
use crate::tasks::{TaskSet, WaitTime};

/// Main test configuration loaded from YAML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestConfig {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_api_prefix")]
    pub api_prefix: String,
    #[serde(default = "default_users")]
    pub users: u32,
    /// Actors started per second until `users` are running.
    #[serde(default = "default_spawn_rate")]
    pub spawn_rate: f64,
    #[serde(default = "default_duration_secs")]
    pub duration_secs: u64,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default)]
    pub seed: Option<u64>, // Actor i seeds its RNG with seed + i
    #[serde(default)]
    pub actors: ActorMix,
    #[serde(default)]
    pub thresholds: Thresholds,
    #[serde(default)]
    pub log_requests: bool, // Log all requests to a JSONL file
    /// Staged ramp. When present it replaces `users`, `spawn_rate` and `duration_secs`.
    #[serde(default)]
    pub stages: Vec<LoadStage>,
}

/// Move linearly to `target` running actors over `duration_secs`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadStage {
    pub duration_secs: u64,
    pub target: u32,
}

/// Relative share and pacing of each actor class.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActorMix {
    #[serde(default = "ActorProfile::standard")]
    pub standard: ActorProfile,
    #[serde(default = "ActorProfile::privileged")]
    pub privileged: ActorProfile,
}

impl Default for ActorMix {
    fn default() -> Self {
        Self {
            standard: ActorProfile::standard(),
            privileged: ActorProfile::privileged(),
        }
    }
}

/// Pacing and task mix of one actor class.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActorProfile {
    pub weight: u32,
    pub wait_min_secs: f64,
    pub wait_max_secs: f64,
    /// Task weights by name. Empty keeps the class defaults; otherwise unlisted tasks never run.
    #[serde(default)]
    pub tasks: BTreeMap<String, u32>,
}

impl ActorProfile {
    pub fn standard() -> Self {
        Self {
            weight: 1,
            wait_min_secs: 1.0,
            wait_max_secs: 3.0,
            tasks: BTreeMap::new(),
        }
    }

    pub fn privileged() -> Self {
        Self {
            weight: 2,
            wait_min_secs: 0.5,
            wait_max_secs: 2.0,
            tasks: BTreeMap::new(),
        }
    }

    pub fn wait_time(&self) -> anyhow::Result<WaitTime> {
        let min = seconds("wait_min_secs", self.wait_min_secs)?;
        let max = seconds("wait_max_secs", self.wait_max_secs)?;
        if min > max {
            anyhow::bail!("wait_min_secs must be <= wait_max_secs");
        }
        Ok(WaitTime::between(min, max))
    }
}

fn seconds(field: &str, value: f64) -> anyhow::Result<Duration> {
    // Rejects NaN, infinities, negatives and overflow
    Duration::try_from_secs_f64(value)
        .map_err(|_| anyhow::anyhow!("{} must be a finite, non-negative number of seconds", field))
}

/// Pass/fail limits checked after the run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Thresholds {
    /// Upper bound on the aggregated 95th percentile latency.
    #[serde(default)]
    pub p95_ms: Option<f64>,
    /// Upper bound on failed / total requests, in [0, 1].
    #[serde(default)]
    pub max_failure_rate: Option<f64>,
}

fn default_host() -> String {
    "http://localhost:80".to_string()
}

fn default_api_prefix() -> String {
    "/api/v1".to_string()
}

fn default_users() -> u32 {
    10
}

fn default_spawn_rate() -> f64 {
    1.0
}

fn default_duration_secs() -> u64 {
    60
}

fn default_request_timeout_secs() -> u64 {
    30
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            name: "quick".to_string(),
            description: "Mixed standard and privileged traffic".to_string(),
            host: default_host(),
            api_prefix: default_api_prefix(),
            users: default_users(),
            spawn_rate: default_spawn_rate(),
            duration_secs: default_duration_secs(),
            request_timeout_secs: default_request_timeout_secs(),
            seed: None,
            actors: ActorMix::default(),
            thresholds: Thresholds::default(),
            log_requests: false,
            stages: Vec::new(),
        }
    }
}

impl TestConfig {
    /// Load configuration from YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: TestConfig = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Validate configuration.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.host.is_empty() {
            anyhow::bail!("host must not be empty");
        }
        if self.stages.is_empty() {
            if self.users == 0 {
                anyhow::bail!("users must be > 0");
            }
            if self.duration_secs == 0 {
                anyhow::bail!("duration_secs must be > 0");
            }
        } else {
            if self.peak_users() == 0 {
                anyhow::bail!("stages must target at least one actor");
            }
            if self.total_duration().is_zero() {
                anyhow::bail!("stages must last longer than 0s");
            }
        }
        if self.spawn_interval().is_err() {
            anyhow::bail!("spawn_rate must be a positive number with a representable interval");
        }

        let total_weight =
            u64::from(self.actors.standard.weight) + u64::from(self.actors.privileged.weight);
        if total_weight == 0 {
            anyhow::bail!("at least one actor class must have a non-zero weight");
        }
        if total_weight > u64::from(u32::MAX) {
            anyhow::bail!("actor class weights must sum to at most {}", u32::MAX);
        }
        for (class, profile, task_weight) in [
            ("standard", &self.actors.standard, self.standard_tasks()?.total_weight()),
            ("privileged", &self.actors.privileged, self.privileged_tasks()?.total_weight()),
        ] {
            profile
                .wait_time()
                .map_err(|e| anyhow::anyhow!("actors.{}: {}", class, e))?;
            if profile.weight > 0 && task_weight == 0 {
                anyhow::bail!("actors.{}: no task has a non-zero weight", class);
            }
        }

        if let Some(rate) = self.thresholds.max_failure_rate {
            if !(0.0..=1.0).contains(&rate) {
                anyhow::bail!("thresholds.max_failure_rate must be within [0, 1]");
            }
        }
        Ok(())
    }

    /// Pause between spawns when no stages are configured.
    pub fn spawn_interval(&self) -> anyhow::Result<Duration> {
        seconds("1 / spawn_rate", 1.0 / self.spawn_rate)
    }

    pub fn standard_tasks(&self) -> anyhow::Result<TaskSet<StandardTask>> {
        TaskSet::from_table(&StandardTask::WEIGHTS, &self.actors.standard.tasks)
            .map_err(|e| anyhow::anyhow!("actors.standard.tasks: {}", e))
    }

    pub fn privileged_tasks(&self) -> anyhow::Result<TaskSet<PrivilegedTask>> {
        TaskSet::from_table(&PrivilegedTask::WEIGHTS, &self.actors.privileged.tasks)
            .map_err(|e| anyhow::anyhow!("actors.privileged.tasks: {}", e))
    }

    /// Length of the whole run.
    pub fn total_duration(&self) -> Duration {
        if self.stages.is_empty() {
            Duration::from_secs(self.duration_secs)
        } else {
            Duration::from_secs(
                self.stages
                    .iter()
                    .fold(0u64, |total, s| total.saturating_add(s.duration_secs)),
            )
        }
    }

    /// Most actors running at once.
    pub fn peak_users(&self) -> u32 {
        if self.stages.is_empty() {
            self.users
        } else {
            self.stages.iter().map(|s| s.target).max().unwrap_or(0)
        }
    }

    /// How many actors should be running `elapsed` into the run.
    ///
    /// Without stages: one actor immediately, then `spawn_rate` per second up to
    /// `users`. With stages: linear interpolation from the previous stage's target
    /// (0 at the start).
    pub fn target_users(&self, elapsed: Duration) -> u32 {
        let t = elapsed.as_secs_f64();
        if self.stages.is_empty() {
            let spawned = (self.spawn_rate * t).floor() + 1.0;
            return (spawned.min(f64::from(self.users))) as u32;
        }

        let mut from = 0u32;
        let mut stage_start = 0.0;
        for stage in &self.stages {
            let stage_end = stage_start + stage.duration_secs as f64;
            if t < stage_end {
                let progress = (t - stage_start) / (stage_end - stage_start);
                let delta = f64::from(stage.target) - f64::from(from);
                return (f64::from(from) + delta * progress).round() as u32;
            }
            from = stage.target;
            stage_start = stage_end;
        }
        from
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_yaml_uses_defaults() {
        let config: TestConfig = serde_yaml::from_str("name: minimal").unwrap();
        assert_eq!(config.api_prefix, "/api/v1");
        assert_eq!(config.actors.standard.weight, 1);
        assert_eq!(config.actors.privileged.weight, 2);
        assert_eq!(config.actors.privileged.wait_min_secs, 0.5);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_actor_mix() {
        let yaml = r#"
name: admins only
actors:
  standard:
    weight: 0
    wait_min_secs: 1.0
    wait_max_secs: 1.0
thresholds:
  p95_ms: 1000.0
"#;
        let config: TestConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.actors.standard.weight, 0);
        assert_eq!(config.actors.privileged.weight, 2);
        assert_eq!(config.thresholds.p95_ms, Some(1000.0));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = TestConfig::default();
        config.users = 0;
        assert!(config.validate().is_err());

        let mut config = TestConfig::default();
        config.spawn_rate = 0.0;
        assert!(config.validate().is_err());

        let mut config = TestConfig::default();
        config.actors.standard.wait_min_secs = 5.0;
        assert!(config.validate().is_err());

        let mut config = TestConfig::default();
        config.actors.standard.weight = 0;
        config.actors.privileged.weight = 0;
        assert!(config.validate().is_err());

        let mut config = TestConfig::default();
        config.thresholds.max_failure_rate = Some(1.5);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_non_finite_waits() {
        let yaml = r#"
name: broken waits
actors:
  standard:
    weight: 1
    wait_min_secs: .nan
    wait_max_secs: 1.0
"#;
        let config: TestConfig = serde_yaml::from_str(yaml).unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("actors.standard"), "{}", err);
        assert!(config.actors.standard.wait_time().is_err());

        let mut config = TestConfig::default();
        config.actors.privileged.wait_max_secs = f64::INFINITY;
        assert!(config.validate().is_err());

        let mut config = TestConfig::default();
        config.actors.privileged.wait_min_secs = -1.0;
        assert!(config.validate().is_err());

        let mut config = TestConfig::default();
        config.actors.standard.wait_max_secs = 1e300;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_unrepresentable_spawn_rate() {
        for rate in [f64::NAN, f64::INFINITY, -2.0, 1e-300] {
            let mut config = TestConfig::default();
            config.spawn_rate = rate;
            assert!(config.validate().is_err(), "spawn_rate {} accepted", rate);
        }

        let mut config = TestConfig::default();
        config.spawn_rate = 0.5;
        assert!(config.validate().is_ok());
        assert_eq!(config.spawn_interval().unwrap(), Duration::from_secs(2));
    }

    #[test]
    fn test_validate_bounds_class_weights() {
        let yaml = r#"
name: heavy
actors:
  standard:
    weight: 4294967295
    wait_min_secs: 1.0
    wait_max_secs: 3.0
"#;
        let config: TestConfig = serde_yaml::from_str(yaml).unwrap();
        assert!(config.validate().is_err());

        let mut config = TestConfig::default();
        config.actors.standard.weight = u32::MAX - 2;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_task_tables() {
        let yaml = r#"
name: metrics only
actors:
  standard:
    weight: 1
    wait_min_secs: 0.1
    wait_max_secs: 0.1
    tasks:
      get_metrics: 1
  privileged:
    weight: 0
    wait_min_secs: 0.1
    wait_max_secs: 0.1
"#;
        let config: TestConfig = serde_yaml::from_str(yaml).unwrap();
        assert!(config.validate().is_ok());
        let tasks = config.standard_tasks().unwrap();
        assert_eq!(tasks.total_weight(), 1);
        assert_eq!(config.privileged_tasks().unwrap().total_weight(), 38);

        let mut config = TestConfig::default();
        config.actors.standard.tasks.insert("fly".to_string(), 1);
        assert!(config.validate().is_err());

        // A class that can spawn but has nothing to do
        let mut config = TestConfig::default();
        config.actors.privileged.tasks.insert("manage_users".to_string(), 0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_target_users_without_stages() {
        let config = TestConfig {
            users: 5,
            spawn_rate: 2.0,
            ..TestConfig::default()
        };
        assert_eq!(config.target_users(Duration::ZERO), 1);
        assert_eq!(config.target_users(Duration::from_millis(499)), 1);
        assert_eq!(config.target_users(Duration::from_millis(500)), 2);
        assert_eq!(config.target_users(Duration::from_secs(60)), 5);
        assert_eq!(config.total_duration(), Duration::from_secs(60));
    }

    #[test]
    fn test_staged_ramp() {
        let yaml = r#"
name: ramp
stages:
  - duration_secs: 10
    target: 100
  - duration_secs: 20
    target: 100
  - duration_secs: 10
    target: 20
"#;
        let config: TestConfig = serde_yaml::from_str(yaml).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.total_duration(), Duration::from_secs(40));
        assert_eq!(config.peak_users(), 100);

        assert_eq!(config.target_users(Duration::ZERO), 0);
        assert_eq!(config.target_users(Duration::from_secs(5)), 50);
        assert_eq!(config.target_users(Duration::from_secs(25)), 100);
        assert_eq!(config.target_users(Duration::from_secs(35)), 60);
        assert_eq!(config.target_users(Duration::from_secs(45)), 20);

        let mut idle = config.clone();
        for stage in &mut idle.stages {
            stage.target = 0;
        }
        assert!(idle.validate().is_err());
    }

    #[test]
    fn test_bundled_scenarios_validate() {
        let dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("scenarios");
        let mut names = Vec::new();
        for entry in std::fs::read_dir(&dir).unwrap() {
            let path = entry.unwrap().path();
            if path.extension().and_then(|e| e.to_str()) != Some("yaml") {
                continue;
            }
            let config = TestConfig::from_file(&path).unwrap();
            config
                .validate()
                .unwrap_or_else(|e| panic!("{}: {}", path.display(), e));
            config.standard_tasks().unwrap();
            config.privileged_tasks().unwrap();
            names.push(config.name);
        }
        names.sort();
        for expected in ["create_clients", "get_metrics", "get_user_by_id", "update_clients"] {
            assert!(names.iter().any(|n| n == expected), "missing {}", expected);
        }

        let metrics = TestConfig::from_file(dir.join("get_metrics.yaml")).unwrap();
        let tasks = metrics.standard_tasks().unwrap();
        assert_eq!(tasks.total_weight(), 1);
        assert_eq!(metrics.peak_users(), 1000);
        assert_eq!(metrics.total_duration(), Duration::from_secs(130));
    }
}
