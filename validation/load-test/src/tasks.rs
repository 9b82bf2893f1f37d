//! Weighted task tables and inter-task pauses.

use std::collections::BTreeMap;
use std::time::Duration;

use rand::Rng;

/// A task that scenario files can refer to by name.
pub trait NamedTask: Copy {
    fn name(&self) -> &'static str;
}

/// A fixed table of tasks with integer weights.
#[derive(Debug, Clone)]
pub struct TaskSet<T> {
    tasks: Vec<(T, u32)>,
    // u64 so that any number of u32 weights sums without overflow
    cumulative: Vec<u64>,
}

impl<T: Copy> TaskSet<T> {
    /// Build from `(task, weight)` pairs. Zero-weight tasks are never picked.
    pub fn new(tasks: &[(T, u32)]) -> Self {
        let mut cumulative = Vec::with_capacity(tasks.len());
        let mut sum = 0u64;
        for (_, weight) in tasks {
            sum += u64::from(*weight);
            cumulative.push(sum);
        }

        Self {
            tasks: tasks.to_vec(),
            cumulative,
        }
    }

    pub fn total_weight(&self) -> u64 {
        self.cumulative.last().copied().unwrap_or(0)
    }

    /// Pick a task with probability proportional to its weight.
    pub fn pick<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<T> {
        let total = self.total_weight();
        if total == 0 {
            return None;
        }
        let r = rng.gen_range(0..total);
        let idx = self.cumulative.partition_point(|&cum| cum <= r);
        self.tasks.get(idx).map(|(task, _)| *task)
    }

    pub fn iter(&self) -> impl Iterator<Item = &(T, u32)> {
        self.tasks.iter()
    }
}

impl<T: NamedTask> TaskSet<T> {
    /// The `defaults` table, or the weights named in `table` when it is not empty.
    ///
    /// A non-empty table replaces the defaults entirely: unlisted tasks get
    /// weight 0. Unknown names are rejected.
    pub fn from_table(defaults: &[(T, u32)], table: &BTreeMap<String, u32>) -> anyhow::Result<Self> {
        if table.is_empty() {
            return Ok(Self::new(defaults));
        }
        if let Some(unknown) = table
            .keys()
            .find(|name| !defaults.iter().any(|(task, _)| task.name() == name.as_str()))
        {
            let known: Vec<&str> = defaults.iter().map(|(task, _)| task.name()).collect();
            anyhow::bail!("unknown task '{}' (expected one of: {})", unknown, known.join(", "));
        }

        let weights: Vec<(T, u32)> = defaults
            .iter()
            .map(|(task, _)| (*task, table.get(task.name()).copied().unwrap_or(0)))
            .collect();
        Ok(Self::new(&weights))
    }
}

/// Uniform random pause between tasks.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WaitTime {
    pub min: Duration,
    pub max: Duration,
}

impl WaitTime {
    pub fn between(min: Duration, max: Duration) -> Self {
        if min <= max {
            Self { min, max }
        } else {
            Self { min: max, max: min }
        }
    }

    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        if self.min == self.max {
            return self.min;
        }
        let secs = rng.gen_range(self.min.as_secs_f64()..=self.max.as_secs_f64());
        Duration::from_secs_f64(secs)
    }
}
