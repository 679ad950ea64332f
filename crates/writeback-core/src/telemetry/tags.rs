/// Profiling target for buffer pool operations.
pub const PROFILE_BUFFER: &str = "writeback.profile.buffer";
/// Profiling target for per-file write queues.
pub const PROFILE_QUEUE: &str = "writeback.profile.queue";
/// Profiling target for worker runtime.
pub const PROFILE_WORKER: &str = "writeback.profile.worker";
/// Profiling target for drain and shutdown.
pub const PROFILE_PIPELINE: &str = "writeback.profile.pipeline";

/// Global system-level tag shared by all profiling events.
pub const TAG_SYSTEM: &str = "system";
/// Logical tag for buffer subsystem events.
pub const TAG_BUFFER: &str = "buffer";
/// Logical tag for write queue events.
pub const TAG_QUEUE: &str = "queue";
/// Logical tag for worker subsystem events.
pub const TAG_WORKER: &str = "worker";
/// Logical tag for pipeline lifecycle events.
pub const TAG_PIPELINE: &str = "pipeline";

pub const METRIC_BUFFER_ACQUIRE_CREATED_COUNT: &str = "writeback.buffer.acquire.created.count";
pub const METRIC_BUFFER_ACQUIRE_RECYCLED_COUNT: &str = "writeback.buffer.acquire.recycled.count";
pub const METRIC_BUFFER_RELEASE_OK_COUNT: &str = "writeback.buffer.release.ok.count";
pub const METRIC_BUFFER_RELEASE_DROPPED_COUNT: &str = "writeback.buffer.release.dropped.count";
pub const METRIC_BUFFER_ACQUIRE_LATENCY_US: &str = "writeback.buffer.acquire.latency_us";
pub const METRIC_BUFFER_POOL_IDLE_BYTES: &str = "writeback.buffer.pool.idle_bytes";

pub const METRIC_JOB_ACCEPTED_COUNT: &str = "writeback.job.accepted.count";
pub const METRIC_JOB_COMPLETED_COUNT: &str = "writeback.job.completed.count";
pub const METRIC_JOB_FAILED_COUNT: &str = "writeback.job.failed.count";
pub const METRIC_JOB_DISCARDED_COUNT: &str = "writeback.job.discarded.count";
pub const METRIC_JOB_ACTIVE: &str = "writeback.job.active";
pub const METRIC_JOB_BYTES_WRITTEN: &str = "writeback.job.bytes_written";
pub const METRIC_JOB_WRITE_LATENCY_US: &str = "writeback.job.write.latency_us";

pub const METRIC_QUEUE_SCHEDULE_COUNT: &str = "writeback.queue.schedule.count";
pub const METRIC_QUEUE_PENDING_DEPTH: &str = "writeback.queue.pending.depth";

pub const METRIC_DRAIN_LATENCY_US: &str = "writeback.drain.latency_us";
pub const METRIC_DRAIN_TIMEOUT_COUNT: &str = "writeback.drain.timeout.count";

pub const METRIC_WORKER_TASK_COUNT: &str = "writeback.worker.task.count";
pub const METRIC_WORKER_TASK_START_COUNT: &str = "writeback.worker.task.start.count";
pub const METRIC_WORKER_TASK_FINISH_COUNT: &str = "writeback.worker.task.finish.count";
pub const METRIC_WORKER_TASK_FAIL_COUNT: &str = "writeback.worker.task.fail.count";
pub const METRIC_WORKER_TASK_LATENCY_US: &str = "writeback.worker.task.latency_us";
pub const METRIC_WORKER_QUEUE_DEPTH: &str = "writeback.worker.queue.depth";
pub const METRIC_WORKER_ACTIVE_COUNT: &str = "writeback.worker.active.count";
