use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Worker pool sizing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
#[schemars(title = "Workers", inline)]
#[serde(default)]
pub struct WorkerOptions {
    /// Number of surface worker threads.
    #[schemars(title = "Worker Threads", range(min = 1, max = 64))]
    pub num_workers: usize,
    /// Jobs that may wait in one worker's inbound queue. Extra jobs are
    /// held back on the coordinator until the worker drains.
    #[schemars(skip)]
    pub queue_depth: usize,
    /// Prefix for worker thread names (`{prefix}-{index}`).
    #[schemars(skip)]
    pub thread_name_prefix: String,
}

impl Default for WorkerOptions {
    fn default() -> Self {
        Self {
            num_workers: 4,
            queue_depth: 8,
            thread_name_prefix: "surface-worker".to_owned(),
        }
    }
}

impl WorkerOptions {
    /// Copy with zero counts raised to one.
    #[must_use]
    pub fn clamped(&self) -> Self {
        Self {
            num_workers: self.num_workers.max(1),
            queue_depth: self.queue_depth.max(1),
            thread_name_prefix: self.thread_name_prefix.clone(),
        }
    }
}
