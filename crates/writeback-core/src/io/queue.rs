use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use crossbeam_channel::{Receiver, Sender, bounded};

use crate::WriteBackError;
use crate::core::WorkerPool;
use crate::io::failure::FailureSlot;
use crate::io::job::WriteJob;
use crate::io::monitor::{JobCounters, JobMonitor};
use crate::telemetry;
use crate::telemetry::events::{TelemetryEvent, WriteFailedEvent, emit_global};
#[cfg(feature = "profiling")]
use crate::telemetry::profile;
use crate::telemetry::tags;
use crate::types::Result;

#[cfg(feature = "profiling")]
const PROFILE_TAG_STACK_QUEUE: [&str; 2] = [tags::TAG_SYSTEM, tags::TAG_QUEUE];

/// Shared collaborators every queue of one pipeline reports to.
#[derive(Clone)]
pub struct QueueContext {
    pub pool: Arc<WorkerPool>,
    pub monitor: Arc<JobMonitor>,
    pub failures: Arc<FailureSlot>,
    pub counters: Arc<JobCounters>,
}

/// Ordered write queue for a single destination channel.
///
/// Jobs wait in a bounded pending channel. At most one drain task per queue is
/// scheduled on the shared worker pool at any time, and it runs the jobs one
/// after another, so writes reach the channel in enqueue order while queues of
/// other files proceed in parallel on the remaining workers.
///
/// `enqueue` expects a single producer per queue.
pub struct WriteQueue {
    shared: Arc<QueueShared>,
}

struct QueueShared {
    path: PathBuf,
    pending_tx: Sender<WriteJob>,
    pending_rx: Receiver<WriteJob>,
    scheduled: AtomicBool,
    failed: AtomicBool,
    context: QueueContext,
}

impl WriteQueue {
    pub fn new(path: impl Into<PathBuf>, capacity: usize, context: QueueContext) -> Self {
        let (pending_tx, pending_rx) = bounded(capacity.max(1));
        Self {
            shared: Arc::new(QueueShared {
                path: path.into(),
                pending_tx,
                pending_rx,
                scheduled: AtomicBool::new(false),
                failed: AtomicBool::new(false),
                context,
            }),
        }
    }

    pub fn path(&self) -> &Path {
        &self.shared.path
    }

    /// Jobs accepted by this queue that no worker has picked up yet.
    pub fn pending_jobs(&self) -> usize {
        self.shared.pending_rx.len()
    }

    /// True once a write on this channel failed; later jobs are discarded.
    pub fn is_failed(&self) -> bool {
        self.shared.failed.load(Ordering::Acquire)
    }

    /// Accepts `job` and makes sure a drain task will run it.
    ///
    /// Blocks while the queue holds `capacity` pending jobs or the worker pool
    /// submission channel is full.
    pub fn enqueue(&self, job: WriteJob) -> Result<()> {
        let shared = &self.shared;
        if self.is_failed() {
            job.discard();
            return Err(WriteBackError::ChannelFailed {
                path: shared.path.clone(),
            });
        }

        shared.context.monitor.job_started();
        shared.context.counters.accepted();
        // Cannot disconnect: `shared` owns the receiving side.
        if let Err(error) = shared.pending_tx.send(job) {
            shared.finish_discarded(error.into_inner());
            return Err(WriteBackError::ChannelFailed {
                path: shared.path.clone(),
            });
        }
        telemetry::set_gauge(
            tags::METRIC_QUEUE_PENDING_DEPTH,
            shared.pending_rx.len() as u64,
            &[("subsystem", "queue"), ("op", "enqueue")],
        );

        self.schedule()
    }

    fn schedule(&self) -> Result<()> {
        let shared = &self.shared;
        if shared.scheduled.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        telemetry::increment_counter(
            tags::METRIC_QUEUE_SCHEDULE_COUNT,
            1,
            &[("subsystem", "queue"), ("op", "schedule")],
        );
        #[cfg(feature = "profiling")]
        profile::event(
            tags::PROFILE_QUEUE,
            &PROFILE_TAG_STACK_QUEUE,
            "schedule",
            "ok",
            0,
            "write queue scheduled on worker pool",
        );

        let runner = Arc::clone(shared);
        match shared.context.pool.submit(Box::new(move || runner.run())) {
            Ok(()) => Ok(()),
            Err(error) => {
                tracing::error!(path = %shared.path.display(), %error, "worker pool rejected write queue");
                while let Ok(job) = shared.pending_rx.try_recv() {
                    shared.finish_discarded(job);
                }
                shared.scheduled.store(false, Ordering::Release);
                Err(error)
            }
        }
    }
}

impl QueueShared {
    /// Drain task body: runs pending jobs in order until the queue is empty.
    fn run(&self) -> Result<()> {
        let mut failed_here = false;
        loop {
            while let Ok(job) = self.pending_rx.try_recv() {
                if self.failed.load(Ordering::Acquire) {
                    self.finish_discarded(job);
                    continue;
                }
                if !self.execute(job) {
                    failed_here = true;
                }
            }

            self.scheduled.store(false, Ordering::Release);
            // A producer may have enqueued after the last `try_recv` but seen
            // `scheduled` still set; pick its job up unless another drain task
            // already claimed the queue.
            if self.pending_rx.is_empty() || self.scheduled.swap(true, Ordering::AcqRel) {
                break;
            }
        }

        if failed_here {
            Err(WriteBackError::ChannelFailed {
                path: self.path.clone(),
            })
        } else {
            Ok(())
        }
    }

    fn execute(&self, job: WriteJob) -> bool {
        let offset = job.offset();
        let len = job.len();
        let started_at = Instant::now();

        let result = job.execute();

        telemetry::record_histogram(
            tags::METRIC_JOB_WRITE_LATENCY_US,
            telemetry::profile::elapsed_us(started_at),
            &[("subsystem", "queue"), ("op", "write")],
        );
        let succeeded = match result {
            Ok(()) => {
                self.context.counters.completed(len);
                tracing::trace!(path = %self.path.display(), offset, len, "page written");
                true
            }
            Err(error) => {
                self.failed.store(true, Ordering::Release);
                self.context.counters.failed();
                tracing::error!(
                    path = %self.path.display(),
                    offset,
                    len,
                    %error,
                    "positioned write failed; discarding remaining writes for this channel"
                );
                emit_global(TelemetryEvent::WriteFailed(WriteFailedEvent {
                    path: self.path.clone(),
                    offset,
                    len,
                    message: error.to_string(),
                }));
                self.context.failures.record(&self.path, offset, error);
                false
            }
        };

        self.context.monitor.job_finished();
        succeeded
    }

    fn finish_discarded(&self, job: WriteJob) {
        tracing::warn!(
            path = %self.path.display(),
            offset = job.offset(),
            "discarding write for failed channel"
        );
        job.discard();
        self.context.counters.discarded();
        self.context.monitor.job_finished();
    }
}
