use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender, bounded};

use crate::WriteBackError;
use crate::telemetry::worker::{DefaultWorkerTelemetry, WorkerTelemetry};
use crate::types::Result;

/// Unit of work executed on an I/O thread.
pub type Task = Box<dyn FnOnce() -> Result<()> + Send + 'static>;

const TASK_KIND: &str = "write";

/// Fixed-size pool of I/O threads fed by a bounded submission channel.
///
/// [`submit`](Self::submit) blocks while the channel is full, which is the
/// backpressure point between producers and the disk.
pub struct WorkerPool {
    num_workers: usize,
    submission_capacity: usize,
    state: Arc<WorkerPoolState>,
    sender: Mutex<Option<Sender<Task>>>,
    worker_handles: Mutex<Vec<JoinHandle<()>>>,
}

impl WorkerPool {
    /// Spawns `num_workers` threads using the default worker telemetry.
    pub fn new(num_workers: usize, submission_capacity: usize) -> Result<Self> {
        Self::with_telemetry(
            num_workers,
            submission_capacity,
            Arc::new(DefaultWorkerTelemetry),
        )
    }

    /// Spawns `num_workers` threads reporting to a custom telemetry backend.
    pub fn with_telemetry(
        num_workers: usize,
        submission_capacity: usize,
        telemetry: Arc<dyn WorkerTelemetry>,
    ) -> Result<Self> {
        let workers = num_workers.max(1);
        let capacity = submission_capacity.max(1);
        let (sender, receiver) = bounded::<Task>(capacity);
        let state = Arc::new(WorkerPoolState::new(telemetry, workers));

        let pool = Self {
            num_workers: workers,
            submission_capacity: capacity,
            state: Arc::clone(&state),
            sender: Mutex::new(Some(sender)),
            worker_handles: Mutex::new(Vec::with_capacity(workers)),
        };

        for worker_id in 0..workers {
            let worker_state = Arc::clone(&state);
            let worker_rx = receiver.clone();
            let spawned = thread::Builder::new()
                .name(format!("writeback-io-{worker_id}"))
                .spawn(move || run_worker_loop(worker_id, worker_rx, worker_state));

            match spawned {
                Ok(handle) => lock_unpoisoned(&pool.worker_handles).push(handle),
                Err(error) => {
                    // Threads that never started can't decrement the live count themselves.
                    state.worker_exited_many(workers - worker_id);
                    pool.shutdown();
                    return Err(WriteBackError::from(error).with_context("spawning I/O worker"));
                }
            }
        }

        tracing::debug!(workers, submission_capacity = capacity, "I/O worker pool started");
        Ok(pool)
    }

    pub fn num_workers(&self) -> usize {
        self.num_workers
    }

    pub fn submission_capacity(&self) -> usize {
        self.submission_capacity
    }

    /// Hands a task to the pool, blocking while the submission channel is full.
    ///
    /// Fails with [`WriteBackError::PoolShutDown`] once [`shutdown`](Self::shutdown) was requested.
    pub fn submit(&self, task: Task) -> Result<()> {
        if !self.state.accepting.load(Ordering::Acquire) {
            return Err(WriteBackError::PoolShutDown);
        }

        let sender = lock_unpoisoned(&self.sender)
            .as_ref()
            .cloned()
            .ok_or(WriteBackError::PoolShutDown)?;

        self.state.submitted.fetch_add(1, Ordering::AcqRel);
        if sender.send(task).is_err() {
            self.state.submitted.fetch_sub(1, Ordering::AcqRel);
            return Err(WriteBackError::PoolShutDown);
        }
        Ok(())
    }

    /// Stops accepting new tasks; already queued tasks still run.
    pub fn shutdown(&self) {
        self.state.accepting.store(false, Ordering::Release);
        // Workers exit once every sender is gone and the channel is empty.
        drop(lock_unpoisoned(&self.sender).take());
    }

    pub fn is_shutdown(&self) -> bool {
        !self.state.accepting.load(Ordering::Acquire)
    }

    /// Blocks until every worker thread exited or `timeout` elapsed.
    ///
    /// Returns `Ok(true)` when all workers terminated and were joined.
    pub fn await_termination(&self, timeout: Duration) -> Result<bool> {
        let live = lock_unpoisoned(&self.state.live_workers);
        let (live, _) = self
            .state
            .terminated
            .wait_timeout_while(live, timeout, |live| *live > 0)
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if *live > 0 {
            return Ok(false);
        }
        drop(live);

        let handles: Vec<_> = lock_unpoisoned(&self.worker_handles).drain(..).collect();
        for handle in handles {
            if let Err(payload) = handle.join() {
                return Err(WriteBackError::WriterPanicked(panic_message(payload.as_ref())));
            }
        }
        Ok(true)
    }

    /// Number of tasks waiting in the submission channel.
    pub fn queue_depth(&self) -> usize {
        lock_unpoisoned(&self.sender)
            .as_ref()
            .map_or(0, |sender| sender.len())
    }

    /// Number of worker threads that have not exited yet.
    pub fn live_workers(&self) -> usize {
        *lock_unpoisoned(&self.state.live_workers)
    }

    /// Returns runtime metrics for the pool and each worker.
    pub fn runtime_snapshot(&self) -> PoolRuntimeSnapshot {
        let submitted = self.state.submitted.load(Ordering::Acquire);
        let completed = self.state.completed.load(Ordering::Acquire);
        let workers = (0..self.num_workers)
            .map(|worker_id| WorkerRuntimeSnapshot {
                worker_id,
                tasks_completed: self.state.task_counts[worker_id].load(Ordering::Acquire),
                busy: Duration::from_micros(
                    self.state.worker_busy_us[worker_id].load(Ordering::Acquire),
                ),
            })
            .collect();

        PoolRuntimeSnapshot {
            elapsed: self.state.started_at.elapsed(),
            submitted,
            completed,
            failed: self.state.failed.load(Ordering::Acquire),
            panicked: self.state.panicked.load(Ordering::Acquire),
            pending: submitted.saturating_sub(completed),
            workers,
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

struct WorkerPoolState {
    telemetry: Arc<dyn WorkerTelemetry>,
    started_at: Instant,
    accepting: AtomicBool,
    submitted: AtomicUsize,
    completed: AtomicUsize,
    failed: AtomicUsize,
    panicked: AtomicUsize,
    task_counts: Vec<AtomicUsize>,
    worker_busy_us: Vec<AtomicU64>,
    live_workers: Mutex<usize>,
    terminated: Condvar,
}

impl WorkerPoolState {
    fn new(telemetry: Arc<dyn WorkerTelemetry>, num_workers: usize) -> Self {
        Self {
            telemetry,
            started_at: Instant::now(),
            accepting: AtomicBool::new(true),
            submitted: AtomicUsize::new(0),
            completed: AtomicUsize::new(0),
            failed: AtomicUsize::new(0),
            panicked: AtomicUsize::new(0),
            task_counts: (0..num_workers).map(|_| AtomicUsize::new(0)).collect(),
            worker_busy_us: (0..num_workers).map(|_| AtomicU64::new(0)).collect(),
            live_workers: Mutex::new(num_workers),
            terminated: Condvar::new(),
        }
    }

    fn worker_exited_many(&self, count: usize) {
        let mut live = lock_unpoisoned(&self.live_workers);
        *live = live.saturating_sub(count);
        if *live == 0 {
            self.terminated.notify_all();
        }
    }
}

/// Per-worker runtime metrics captured by the worker pool.
#[derive(Debug, Clone)]
pub struct WorkerRuntimeSnapshot {
    pub worker_id: usize,
    pub tasks_completed: usize,
    pub busy: Duration,
}

/// Runtime metrics snapshot for the worker pool.
#[derive(Debug, Clone)]
pub struct PoolRuntimeSnapshot {
    pub elapsed: Duration,
    pub submitted: usize,
    pub completed: usize,
    pub failed: usize,
    pub panicked: usize,
    pub pending: usize,
    pub workers: Vec<WorkerRuntimeSnapshot>,
}

fn run_worker_loop(worker_id: usize, receiver: Receiver<Task>, state: Arc<WorkerPoolState>) {
    for task in receiver.iter() {
        state.telemetry.on_queue_depth(worker_id, receiver.len());
        state.telemetry.on_task_started(worker_id, TASK_KIND);
        let started_at = Instant::now();

        let outcome = catch_unwind(AssertUnwindSafe(task));

        let elapsed = started_at.elapsed();
        let elapsed_us = elapsed.as_micros().min(u64::MAX as u128) as u64;
        state.worker_busy_us[worker_id].fetch_add(elapsed_us, Ordering::AcqRel);
        match outcome {
            Ok(Ok(())) => state
                .telemetry
                .on_task_finished(worker_id, TASK_KIND, elapsed),
            Ok(Err(error)) => {
                state.failed.fetch_add(1, Ordering::AcqRel);
                state.telemetry.on_task_failed(worker_id, TASK_KIND, elapsed);
                tracing::warn!(worker_id, %error, "I/O task failed");
            }
            Err(payload) => {
                state.panicked.fetch_add(1, Ordering::AcqRel);
                state.telemetry.on_task_failed(worker_id, TASK_KIND, elapsed);
                tracing::error!(
                    worker_id,
                    panic = %panic_message(payload.as_ref()),
                    "I/O task panicked"
                );
            }
        }

        state.completed.fetch_add(1, Ordering::AcqRel);
        state.task_counts[worker_id].fetch_add(1, Ordering::AcqRel);
    }

    tracing::trace!(worker_id, "I/O worker exiting");
    state.worker_exited_many(1);
}

pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
