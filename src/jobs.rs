//! Rate-limited, retrying runner for bulk work across projects.
//!
//! Tasks start at most once per `min_interval`; a task whose error is
//! retryable (a lost revision race) is re-run after an exponential backoff,
//! up to `max_attempts` runs in total. Everything else fails immediately.

use std::time::{Duration, Instant};

use crate::config::QueueConfig;
use crate::error::SyncError;

pub trait Sleeper {
    fn sleep(&self, duration: Duration);
}

pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &QueueConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            initial_backoff: Duration::from_millis(config.initial_backoff_ms),
            max_backoff: Duration::from_millis(config.max_backoff_ms),
        }
    }

    /// Delay before re-running after the `failed_attempt`-th failure (1-based).
    pub fn backoff(&self, failed_attempt: u32) -> Duration {
        let exponent = failed_attempt.saturating_sub(1).min(31);
        self.initial_backoff
            .saturating_mul(1u32 << exponent)
            .min(self.max_backoff)
    }
}

#[derive(Debug)]
pub struct TaskOutcome<T> {
    pub key: String,
    pub attempts: u32,
    pub result: Result<T, SyncError>,
}

pub struct TaskQueue<S: Sleeper = ThreadSleeper> {
    min_interval: Duration,
    retry: RetryPolicy,
    sleeper: S,
    last_start: Option<Instant>,
}

impl TaskQueue<ThreadSleeper> {
    pub fn new(config: &QueueConfig) -> Self {
        Self::with_sleeper(config, ThreadSleeper)
    }
}

impl<S: Sleeper> TaskQueue<S> {
    pub fn with_sleeper(config: &QueueConfig, sleeper: S) -> Self {
        Self {
            min_interval: Duration::from_millis(config.min_interval_ms),
            retry: RetryPolicy::from_config(config),
            sleeper,
            last_start: None,
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    /// Run `task` for every key in order. `on_done` sees each outcome as soon
    /// as it is final, which lets callers drive a progress display.
    pub fn run<T>(
        &mut self,
        keys: impl IntoIterator<Item = String>,
        mut task: impl FnMut(&str) -> Result<T, SyncError>,
        mut on_done: impl FnMut(&TaskOutcome<T>),
    ) -> Vec<TaskOutcome<T>> {
        let mut outcomes = Vec::new();
        for key in keys {
            let outcome = self.run_one(key, &mut task);
            on_done(&outcome);
            outcomes.push(outcome);
        }
        outcomes
    }

    fn run_one<T>(
        &mut self,
        key: String,
        task: &mut impl FnMut(&str) -> Result<T, SyncError>,
    ) -> TaskOutcome<T> {
        let mut attempts = 0;
        loop {
            attempts += 1;
            self.wait_for_slot();
            let result = task(&key);
            match result {
                Err(err) if err.is_retryable() && attempts < self.retry.max_attempts => {
                    let delay = self.retry.backoff(attempts);
                    tracing::warn!(
                        key = %key,
                        attempt = attempts,
                        max_attempts = self.retry.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "jobs: retrying task"
                    );
                    self.sleeper.sleep(delay);
                }
                result => {
                    if let Err(err) = &result {
                        tracing::warn!(key = %key, attempts, error = %err, "jobs: task failed");
                    }
                    return TaskOutcome {
                        key,
                        attempts,
                        result,
                    };
                }
            }
        }
    }

    fn wait_for_slot(&mut self) {
        if let Some(last) = self.last_start {
            let elapsed = last.elapsed();
            if elapsed < self.min_interval {
                self.sleeper.sleep(self.min_interval - elapsed);
            }
        }
        self.last_start = Some(Instant::now());
    }
}
