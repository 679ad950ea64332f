pub mod types;

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use crate::WriteBackError;
use crate::buffer::BufferRelease;
use crate::core::WorkerPool;
use crate::io::{
    FailureSlot, JobCounters, JobMonitor, PageWriter, QueueContext, StoreChannel,
    SynchronousWriterFactory, WriteJob, WriteMonitor, WriteQueue, WriterFactory,
};
use crate::telemetry;
use crate::telemetry::events::{DrainCompletedEvent, TelemetryEvent, emit_global};
#[cfg(feature = "profiling")]
use crate::telemetry::profile;
use crate::telemetry::tags;
use crate::types::{PipelineConfig, Result};

pub use types::PipelineStats;

#[cfg(feature = "profiling")]
const PROFILE_TAG_STACK_PIPELINE: [&str; 2] = [tags::TAG_SYSTEM, tags::TAG_PIPELINE];

/// Asynchronous write-back pipeline for one import run.
///
/// Every file opened through [`open`](Self::open) gets its own ordered
/// [`WriteQueue`]; all queues share one [`WorkerPool`] and one [`JobMonitor`].
/// Producers hand buffers to a [`Funnel`] and carry on; [`drain`](Self::drain)
/// is the barrier that tells them everything reached the channels.
///
/// # Example
/// ```
/// use std::sync::Arc;
///
/// use writeback_core::{BufferPool, FileChannel, NoWriteMonitor, PipelineConfig, WritePipeline};
///
/// let dir = tempfile::tempdir()?;
/// let path = dir.path().join("nodes.store");
/// let pipeline = WritePipeline::synchronous(PipelineConfig::new(2))?;
/// let pages = Arc::new(BufferPool::new(8192, 4));
///
/// let mut nodes = pipeline.open(
///     &path,
///     Arc::new(FileChannel::open(&path)?),
///     Arc::new(NoWriteMonitor),
/// )?;
/// let mut page = pages.acquire();
/// page.extend_from_slice(&[7u8; 8192]);
/// nodes.write(page, 0, pages.clone())?;
///
/// pipeline.shutdown()?;
/// assert_eq!(std::fs::read(&path)?.len(), 8192);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct WritePipeline {
    config: PipelineConfig,
    delegate: Arc<dyn WriterFactory>,
    pool: Arc<WorkerPool>,
    monitor: Arc<JobMonitor>,
    failures: Arc<FailureSlot>,
    counters: Arc<JobCounters>,
    accepting: Arc<AtomicBool>,
}

impl WritePipeline {
    /// Creates a pipeline with `config.max_io_threads` workers writing through `delegate`.
    pub fn new(config: PipelineConfig, delegate: Arc<dyn WriterFactory>) -> Result<Self> {
        config.validate()?;
        let pool = WorkerPool::new(config.max_io_threads, config.submission_capacity)?;
        Self::with_worker_pool(config, delegate, Arc::new(pool))
    }

    /// Creates a pipeline whose files are written by [`SynchronousWriterFactory`].
    pub fn synchronous(config: PipelineConfig) -> Result<Self> {
        Self::new(config, Arc::new(SynchronousWriterFactory))
    }

    /// Creates a pipeline on an existing worker pool, e.g. one with custom telemetry.
    ///
    /// The pipeline takes over the pool's lifecycle: [`shutdown`](Self::shutdown) stops it.
    pub fn with_worker_pool(
        config: PipelineConfig,
        delegate: Arc<dyn WriterFactory>,
        pool: Arc<WorkerPool>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            delegate,
            pool,
            monitor: Arc::new(JobMonitor::new()),
            failures: Arc::new(FailureSlot::new()),
            counters: Arc::new(JobCounters::default()),
            accepting: Arc::new(AtomicBool::new(true)),
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Opens `path` for asynchronous writes through `channel`.
    pub fn open(
        &self,
        path: impl AsRef<Path>,
        channel: Arc<dyn StoreChannel>,
        monitor: Arc<dyn WriteMonitor>,
    ) -> Result<Funnel> {
        if !self.is_accepting() {
            return Err(WriteBackError::ShutDown);
        }

        let path = path.as_ref();
        let writer = self
            .delegate
            .create(path, channel, monitor)
            .map_err(|error| error.with_context(format!("creating writer for {}", path.display())))?;
        let queue = WriteQueue::new(
            path,
            self.config.queue_capacity,
            QueueContext {
                pool: Arc::clone(&self.pool),
                monitor: Arc::clone(&self.monitor),
                failures: Arc::clone(&self.failures),
                counters: Arc::clone(&self.counters),
            },
        );
        tracing::debug!(path = %path.display(), "opened write funnel");

        Ok(Funnel {
            writer,
            queue,
            accepting: Arc::clone(&self.accepting),
        })
    }

    /// Blocks until every accepted write of every file finished.
    ///
    /// Fails with [`WriteBackError::DrainTimeout`] when jobs are still active
    /// after `drain_timeout`, and with [`WriteBackError::WriteFailed`] when any
    /// write failed since the pipeline was created.
    pub fn drain(&self) -> Result<()> {
        let started_at = Instant::now();
        let timeout = self.config.drain_timeout;
        let idle = self.monitor.await_idle(timeout);
        let elapsed_us = telemetry::profile::elapsed_us(started_at);
        let failure = self.failures.error();

        emit_global(TelemetryEvent::DrainCompleted(DrainCompletedEvent {
            elapsed: started_at.elapsed(),
            timed_out: !idle,
            failed: failure.is_some(),
        }));

        if !idle {
            let active_jobs = self.monitor.active_jobs();
            telemetry::increment_counter(
                tags::METRIC_DRAIN_TIMEOUT_COUNT,
                1,
                &[("subsystem", "pipeline"), ("op", "drain"), ("result", "timeout")],
            );
            tracing::error!(?timeout, active_jobs, "writes did not drain in time");
            return Err(WriteBackError::DrainTimeout {
                timeout,
                active_jobs,
            });
        }

        telemetry::record_histogram(
            tags::METRIC_DRAIN_LATENCY_US,
            elapsed_us,
            &[("subsystem", "pipeline"), ("op", "drain")],
        );
        #[cfg(feature = "profiling")]
        profile::event(
            tags::PROFILE_PIPELINE,
            &PROFILE_TAG_STACK_PIPELINE,
            "drain",
            if failure.is_some() { "error" } else { "ok" },
            elapsed_us,
            "write pipeline drained",
        );

        match failure {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    /// Refuses new writes, drains in-flight ones and waits for the I/O threads to exit.
    ///
    /// Meant to be called once, at the end of an import.
    pub fn shutdown(&self) -> Result<()> {
        self.accepting.store(false, Ordering::Release);
        self.pool.shutdown();

        let drained = match self.drain() {
            Err(error @ WriteBackError::DrainTimeout { .. }) => return Err(error),
            other => other,
        };

        let timeout = self.config.termination_timeout;
        if !self.pool.await_termination(timeout)? {
            tracing::error!(?timeout, "I/O workers did not terminate in time");
            return Err(WriteBackError::TerminationTimeout { timeout });
        }

        let stats = self.stats();
        tracing::info!(
            written = stats.jobs.completed,
            failed = stats.jobs.failed,
            discarded = stats.jobs.discarded,
            bytes = stats.jobs.bytes_written,
            "write pipeline shut down"
        );
        drained
    }

    pub fn is_accepting(&self) -> bool {
        self.accepting.load(Ordering::Acquire)
    }

    pub fn active_jobs(&self) -> usize {
        self.monitor.active_jobs()
    }

    pub fn has_active_jobs(&self) -> bool {
        self.monitor.has_active_jobs()
    }

    /// True once any write failed; the import output is then unusable.
    pub fn has_failed(&self) -> bool {
        self.failures.has_failed()
    }

    pub fn stats(&self) -> PipelineStats {
        PipelineStats {
            jobs: self.counters.snapshot(),
            active_jobs: self.monitor.active_jobs(),
            failures: self.failures.failure_count(),
            accepting: self.is_accepting(),
            runtime: self.pool.runtime_snapshot(),
        }
    }
}

/// Producer-facing writer for one file.
///
/// Writes are queued and return before the bytes reach the channel; the
/// buffer belongs to the pipeline until the pool's `release` sees it again.
pub struct Funnel {
    writer: Arc<dyn PageWriter>,
    queue: WriteQueue,
    accepting: Arc<AtomicBool>,
}

impl Funnel {
    /// Queues `buffer` to be written at `offset`, then released to `pool`.
    ///
    /// Fails with [`WriteBackError::ShutDown`] after shutdown started and with
    /// [`WriteBackError::ChannelFailed`] once an earlier write to this file
    /// failed. The buffer is released to `pool` in both cases.
    pub fn write(
        &mut self,
        buffer: Vec<u8>,
        offset: u64,
        pool: Arc<dyn BufferRelease>,
    ) -> Result<()> {
        if !self.accepting.load(Ordering::Acquire) {
            pool.release(buffer);
            return Err(WriteBackError::ShutDown);
        }

        let job = WriteJob::new(Arc::clone(&self.writer), buffer, offset, pool);
        self.queue.enqueue(job)
    }

    pub fn path(&self) -> &Path {
        self.queue.path()
    }

    pub fn pending_jobs(&self) -> usize {
        self.queue.pending_jobs()
    }

    pub fn is_failed(&self) -> bool {
        self.queue.is_failed()
    }
}
