use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Condvar, Mutex};
use std::time::Duration;

use crate::telemetry;
use crate::telemetry::tags;

/// Counts write jobs that were accepted but have not finished yet.
///
/// Shared by every write queue of one pipeline. The counter itself is a plain
/// atomic; the mutex and condition variable only exist so that
/// [`await_idle`](Self::await_idle) can sleep until the count reaches zero.
#[derive(Debug, Default)]
pub struct JobMonitor {
    active: AtomicUsize,
    idle_lock: Mutex<()>,
    idle: Condvar,
}

impl JobMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a newly accepted job.
    pub fn job_started(&self) {
        let active = self.active.fetch_add(1, Ordering::AcqRel) + 1;
        telemetry::set_gauge(
            tags::METRIC_JOB_ACTIVE,
            active as u64,
            &[("subsystem", "monitor"), ("op", "job_started")],
        );
    }

    /// Registers a job that finished, successfully or not.
    pub fn job_finished(&self) {
        let previous = self
            .active
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |active| {
                active.checked_sub(1)
            });

        match previous {
            Ok(1) => {
                telemetry::set_gauge(
                    tags::METRIC_JOB_ACTIVE,
                    0,
                    &[("subsystem", "monitor"), ("op", "job_finished")],
                );
                // Taking the lock orders this wake-up after any waiter's check.
                let _guard = self
                    .idle_lock
                    .lock()
                    .unwrap_or_else(|poisoned| poisoned.into_inner());
                self.idle.notify_all();
            }
            Ok(previous) => telemetry::set_gauge(
                tags::METRIC_JOB_ACTIVE,
                (previous - 1) as u64,
                &[("subsystem", "monitor"), ("op", "job_finished")],
            ),
            Err(_) => tracing::error!("job_finished called with no active jobs"),
        }
    }

    pub fn has_active_jobs(&self) -> bool {
        self.active_jobs() > 0
    }

    pub fn active_jobs(&self) -> usize {
        self.active.load(Ordering::Acquire)
    }

    /// Blocks until no jobs are active or `timeout` elapses.
    ///
    /// Returns `true` when the monitor became idle.
    pub fn await_idle(&self, timeout: Duration) -> bool {
        if !self.has_active_jobs() {
            return true;
        }

        let guard = self
            .idle_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let (_guard, result) = self
            .idle
            .wait_timeout_while(guard, timeout, |_| self.has_active_jobs())
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        !result.timed_out() || !self.has_active_jobs()
    }
}

/// Outcome counters for every job of a pipeline.
#[derive(Debug, Default)]
pub struct JobCounters {
    accepted: AtomicUsize,
    completed: AtomicUsize,
    failed: AtomicUsize,
    discarded: AtomicUsize,
    bytes_written: AtomicU64,
}

impl JobCounters {
    pub(crate) fn accepted(&self) {
        self.accepted.fetch_add(1, Ordering::AcqRel);
        telemetry::increment_counter(tags::METRIC_JOB_ACCEPTED_COUNT, 1, &[("op", "accept")]);
    }

    pub(crate) fn completed(&self, bytes: usize) {
        self.completed.fetch_add(1, Ordering::AcqRel);
        self.bytes_written.fetch_add(bytes as u64, Ordering::AcqRel);
        telemetry::increment_counter(tags::METRIC_JOB_COMPLETED_COUNT, 1, &[("result", "ok")]);
        telemetry::increment_counter(
            tags::METRIC_JOB_BYTES_WRITTEN,
            bytes as u64,
            &[("result", "ok")],
        );
    }

    pub(crate) fn failed(&self) {
        self.failed.fetch_add(1, Ordering::AcqRel);
        telemetry::increment_counter(tags::METRIC_JOB_FAILED_COUNT, 1, &[("result", "error")]);
    }

    pub(crate) fn discarded(&self) {
        self.discarded.fetch_add(1, Ordering::AcqRel);
        telemetry::increment_counter(
            tags::METRIC_JOB_DISCARDED_COUNT,
            1,
            &[("result", "discarded")],
        );
    }

    pub fn snapshot(&self) -> JobCountersSnapshot {
        JobCountersSnapshot {
            accepted: self.accepted.load(Ordering::Acquire),
            completed: self.completed.load(Ordering::Acquire),
            failed: self.failed.load(Ordering::Acquire),
            discarded: self.discarded.load(Ordering::Acquire),
            bytes_written: self.bytes_written.load(Ordering::Acquire),
        }
    }
}

/// Point-in-time copy of [`JobCounters`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JobCountersSnapshot {
    pub accepted: usize,
    pub completed: usize,
    pub failed: usize,
    /// Jobs dropped without writing because their channel failed earlier.
    pub discarded: usize,
    pub bytes_written: u64,
}
