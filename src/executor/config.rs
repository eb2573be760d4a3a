//! Worker pool configuration types.

use crate::env;
use serde::{Deserialize, Serialize};

/// Sizing of the background worker pool
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExecutorConfig {
    /// Number of workers draining the queue (default: 4)
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,

    /// Jobs that may wait for a free worker before submission fails (default: 64)
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

fn default_worker_count() -> usize {
    env::executor::DEFAULT_WORKER_COUNT
}

fn default_queue_capacity() -> usize {
    env::executor::DEFAULT_QUEUE_CAPACITY
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            worker_count: default_worker_count(),
            queue_capacity: default_queue_capacity(),
        }
    }
}

impl ExecutorConfig {
    pub fn new(worker_count: usize, queue_capacity: usize) -> Self {
        Self {
            worker_count,
            queue_capacity,
        }
    }

    /// Worker count, never below one
    pub fn effective_workers(&self) -> usize {
        self.worker_count.max(1)
    }

    /// Queue capacity, never below one
    pub fn effective_capacity(&self) -> usize {
        self.queue_capacity.max(1)
    }
}
