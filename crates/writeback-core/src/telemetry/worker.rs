use std::time::Duration;

use crate::telemetry;
#[cfg(feature = "profiling")]
use crate::telemetry::profile;
use crate::telemetry::tags;

#[cfg(feature = "profiling")]
const PROFILE_TAG_STACK_WORKER: [&str; 2] = [tags::TAG_SYSTEM, tags::TAG_WORKER];

/// Telemetry contract for the I/O worker pool.
///
/// The pool calls these hooks around every task so metrics backends can be
/// swapped without touching the scheduling code.
pub trait WorkerTelemetry: Send + Sync {
    fn on_queue_depth(&self, worker_id: usize, depth: usize);
    fn on_task_started(&self, worker_id: usize, task_kind: &str);
    fn on_task_finished(&self, worker_id: usize, task_kind: &str, elapsed: Duration);
    fn on_task_failed(&self, worker_id: usize, task_kind: &str, elapsed: Duration);
}

/// Default telemetry implementation that reports worker metrics.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultWorkerTelemetry;

impl DefaultWorkerTelemetry {
    fn record_task_end(&self, result: &'static str, elapsed: Duration) -> u64 {
        let elapsed_us = elapsed.as_micros().min(u64::MAX as u128) as u64;
        let counter = if result == "ok" {
            tags::METRIC_WORKER_TASK_FINISH_COUNT
        } else {
            tags::METRIC_WORKER_TASK_FAIL_COUNT
        };

        telemetry::increment_counter(
            counter,
            1,
            &[
                ("subsystem", "worker"),
                ("op", "task_finish"),
                ("result", result),
            ],
        );
        telemetry::increment_counter(
            tags::METRIC_WORKER_TASK_COUNT,
            1,
            &[("subsystem", "worker"), ("op", "task"), ("result", result)],
        );
        telemetry::record_histogram(
            tags::METRIC_WORKER_TASK_LATENCY_US,
            elapsed_us,
            &[("subsystem", "worker"), ("op", "task"), ("result", result)],
        );
        telemetry::sub_gauge_saturating(
            tags::METRIC_WORKER_ACTIVE_COUNT,
            1,
            &[("subsystem", "worker"), ("op", "task_finish")],
        );

        elapsed_us
    }
}

impl WorkerTelemetry for DefaultWorkerTelemetry {
    fn on_queue_depth(&self, _worker_id: usize, depth: usize) {
        telemetry::set_gauge(
            tags::METRIC_WORKER_QUEUE_DEPTH,
            depth as u64,
            &[("subsystem", "worker"), ("op", "queue_depth")],
        );
    }

    fn on_task_started(&self, _worker_id: usize, _task_kind: &str) {
        telemetry::increment_counter(
            tags::METRIC_WORKER_TASK_START_COUNT,
            1,
            &[("subsystem", "worker"), ("op", "task_start")],
        );
        telemetry::add_gauge(
            tags::METRIC_WORKER_ACTIVE_COUNT,
            1,
            &[("subsystem", "worker"), ("op", "task_start")],
        );

        #[cfg(feature = "profiling")]
        if profile::is_tag_stack_enabled(&PROFILE_TAG_STACK_WORKER) {
            tracing::debug!(
                target: tags::PROFILE_WORKER,
                op = "task_start",
                worker_id = _worker_id,
                task_kind = _task_kind,
                tags = ?PROFILE_TAG_STACK_WORKER,
                "worker task started"
            );
        }
    }

    fn on_task_finished(&self, _worker_id: usize, _task_kind: &str, elapsed: Duration) {
        let _elapsed_us = self.record_task_end("ok", elapsed);

        #[cfg(feature = "profiling")]
        profile::event(
            tags::PROFILE_WORKER,
            &PROFILE_TAG_STACK_WORKER,
            "task_finish",
            "ok",
            _elapsed_us,
            "worker task finished",
        );
    }

    fn on_task_failed(&self, _worker_id: usize, _task_kind: &str, elapsed: Duration) {
        let _elapsed_us = self.record_task_end("error", elapsed);

        #[cfg(feature = "profiling")]
        profile::event(
            tags::PROFILE_WORKER,
            &PROFILE_TAG_STACK_WORKER,
            "task_finish",
            "error",
            _elapsed_us,
            "worker task failed",
        );
    }
}
