// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Scheduler configuration.

use std::thread;

use tracing::warn;

/// Environment variable overriding the worker count.
pub const WORKERS_ENV: &str = "SKEIN_WORKERS";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// Worker threads. 0 means one per available core.
    pub workers: usize,
    /// Prefix for worker thread names; the worker index is appended.
    pub thread_name: String,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self { workers: 0, thread_name: "skein-worker".to_string() }
    }
}

impl SchedulerConfig {
    pub fn with_workers(workers: usize) -> Self {
        Self { workers, ..Self::default() }
    }

    /// Defaults, with the worker count taken from `SKEIN_WORKERS` when set.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(raw) = std::env::var(WORKERS_ENV) {
            match raw.trim().parse::<usize>() {
                Ok(n) => config.workers = n,
                Err(_) => warn!(value = %raw, "ignoring invalid {}", WORKERS_ENV),
            }
        }
        config
    }

    /// The number of workers actually started.
    pub fn worker_count(&self) -> usize {
        if self.workers == 0 {
            thread::available_parallelism().map(|p| p.get()).unwrap_or(4)
        } else {
            self.workers
        }
    }
}
