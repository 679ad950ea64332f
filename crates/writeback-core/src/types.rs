use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::WriteBackError;

pub type Result<T> = std::result::Result<T, WriteBackError>;

/// Upper bound on how long [`drain`](crate::WritePipeline::drain) waits for in-flight writes.
pub const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_secs(10 * 60);
/// Upper bound on how long shutdown waits for worker threads to exit.
pub const DEFAULT_TERMINATION_TIMEOUT: Duration = Duration::from_secs(60);
pub const DEFAULT_SUBMISSION_CAPACITY: usize = 1024;
pub const DEFAULT_QUEUE_CAPACITY: usize = 64;

/// Construction config for a [`WritePipeline`](crate::WritePipeline).
///
/// Only the worker count and the bounds that produce backpressure are tunable;
/// everything else about the importer is configured by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Number of I/O threads shared by every open file.
    pub max_io_threads: usize,
    /// Capacity of the worker pool submission channel.
    pub submission_capacity: usize,
    /// Maximum number of jobs waiting in a single file's queue.
    pub queue_capacity: usize,
    /// Hard bound for `drain`; exceeding it aborts the import.
    #[serde(with = "duration_millis")]
    pub drain_timeout: Duration,
    /// Hard bound for worker termination during `shutdown`.
    #[serde(with = "duration_millis")]
    pub termination_timeout: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_io_threads: num_cpus::get().max(1),
            submission_capacity: DEFAULT_SUBMISSION_CAPACITY,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            drain_timeout: DEFAULT_DRAIN_TIMEOUT,
            termination_timeout: DEFAULT_TERMINATION_TIMEOUT,
        }
    }
}

impl PipelineConfig {
    /// Creates a config with `max_io_threads` workers and default bounds.
    pub fn new(max_io_threads: usize) -> Self {
        Self {
            max_io_threads,
            ..Self::default()
        }
    }

    pub fn with_submission_capacity(mut self, capacity: usize) -> Self {
        self.submission_capacity = capacity;
        self
    }

    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    pub fn with_drain_timeout(mut self, timeout: Duration) -> Self {
        self.drain_timeout = timeout;
        self
    }

    pub fn with_termination_timeout(mut self, timeout: Duration) -> Self {
        self.termination_timeout = timeout;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_io_threads == 0 {
            return Err(WriteBackError::InvalidConfig(
                "max_io_threads must be at least 1",
            ));
        }
        if self.submission_capacity == 0 {
            return Err(WriteBackError::InvalidConfig(
                "submission_capacity must be at least 1",
            ));
        }
        if self.queue_capacity == 0 {
            return Err(WriteBackError::InvalidConfig(
                "queue_capacity must be at least 1",
            ));
        }
        Ok(())
    }
}

mod duration_millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let millis = duration.as_millis().min(u64::MAX as u128) as u64;
        serializer.serialize_u64(millis)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
