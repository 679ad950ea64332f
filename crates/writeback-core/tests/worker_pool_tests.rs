mod support;

use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use support::Gate;
use writeback_core::{WorkerPool, WorkerTelemetry, WriteBackError};

#[test]
fn worker_pool_runs_every_task() -> Result<(), Box<dyn std::error::Error>> {
    let pool = WorkerPool::new(4, 8)?;
    let ran = Arc::new(AtomicUsize::new(0));

    for _ in 0..200 {
        let ran = Arc::clone(&ran);
        pool.submit(Box::new(move || {
            ran.fetch_add(1, Ordering::AcqRel);
            Ok(())
        }))?;
    }

    pool.shutdown();
    assert!(pool.await_termination(Duration::from_secs(10))?);
    assert_eq!(ran.load(Ordering::Acquire), 200);

    let snapshot = pool.runtime_snapshot();
    assert_eq!(snapshot.submitted, 200);
    assert_eq!(snapshot.completed, 200);
    assert_eq!(snapshot.pending, 0);
    assert_eq!(snapshot.workers.len(), 4);
    assert_eq!(
        snapshot
            .workers
            .iter()
            .map(|worker| worker.tasks_completed)
            .sum::<usize>(),
        200
    );
    Ok(())
}

#[test]
fn shutdown_rejects_new_work_and_runs_queued_tasks() -> Result<(), Box<dyn std::error::Error>> {
    let pool = WorkerPool::new(2, 32)?;
    let ran = Arc::new(AtomicUsize::new(0));

    for _ in 0..16 {
        let ran = Arc::clone(&ran);
        pool.submit(Box::new(move || {
            thread::sleep(Duration::from_millis(1));
            ran.fetch_add(1, Ordering::AcqRel);
            Ok(())
        }))?;
    }

    pool.shutdown();
    assert!(pool.is_shutdown());
    let rejected = pool.submit(Box::new(|| Ok(())));
    assert!(matches!(rejected, Err(WriteBackError::PoolShutDown)));

    assert!(pool.await_termination(Duration::from_secs(10))?);
    assert_eq!(ran.load(Ordering::Acquire), 16);
    assert_eq!(pool.live_workers(), 0);
    assert_eq!(pool.queue_depth(), 0);
    Ok(())
}

#[test]
fn full_submission_channel_blocks_submitter() -> Result<(), Box<dyn std::error::Error>> {
    let pool = Arc::new(WorkerPool::new(1, 1)?);
    let gate = Gate::new();
    let submitted = Arc::new(AtomicUsize::new(0));

    let submitter = {
        let pool = Arc::clone(&pool);
        let gate = Arc::clone(&gate);
        let submitted = Arc::clone(&submitted);
        thread::spawn(move || -> writeback_core::Result<()> {
            for _ in 0..4 {
                let gate = Arc::clone(&gate);
                pool.submit(Box::new(move || {
                    gate.wait();
                    Ok(())
                }))?;
                submitted.fetch_add(1, Ordering::AcqRel);
            }
            Ok(())
        })
    };

    thread::sleep(Duration::from_millis(100));
    // One task running, one waiting in the channel.
    assert!(submitted.load(Ordering::Acquire) <= 2);

    gate.open();
    submitter
        .join()
        .map_err(|_| io::Error::other("submitter thread panicked"))??;
    assert_eq!(submitted.load(Ordering::Acquire), 4);

    pool.shutdown();
    assert!(pool.await_termination(Duration::from_secs(10))?);
    Ok(())
}

#[test]
fn failing_and_panicking_tasks_are_counted() -> Result<(), Box<dyn std::error::Error>> {
    let pool = WorkerPool::new(1, 4)?;

    pool.submit(Box::new(|| -> writeback_core::Result<()> {
        Err(WriteBackError::Io(io::Error::other("disk gone")))
    }))?;
    pool.submit(Box::new(|| -> writeback_core::Result<()> { panic!("writer blew up") }))?;
    let survived = Arc::new(AtomicUsize::new(0));
    {
        let survived = Arc::clone(&survived);
        pool.submit(Box::new(move || {
            survived.fetch_add(1, Ordering::AcqRel);
            Ok(())
        }))?;
    }

    pool.shutdown();
    assert!(pool.await_termination(Duration::from_secs(10))?);

    let snapshot = pool.runtime_snapshot();
    assert_eq!(snapshot.failed, 1);
    assert_eq!(snapshot.panicked, 1);
    assert_eq!(snapshot.completed, 3);
    assert_eq!(survived.load(Ordering::Acquire), 1);
    Ok(())
}

#[derive(Default)]
struct CountingTelemetry {
    started: AtomicUsize,
    finished: AtomicUsize,
    failed: AtomicUsize,
    kinds: Mutex<Vec<String>>,
}

impl WorkerTelemetry for CountingTelemetry {
    fn on_queue_depth(&self, _worker_id: usize, _depth: usize) {}

    fn on_task_started(&self, _worker_id: usize, task_kind: &str) {
        self.started.fetch_add(1, Ordering::AcqRel);
        self.kinds
            .lock()
            .expect("kinds mutex poisoned")
            .push(task_kind.to_string());
    }

    fn on_task_finished(&self, _worker_id: usize, _task_kind: &str, _elapsed: Duration) {
        self.finished.fetch_add(1, Ordering::AcqRel);
    }

    fn on_task_failed(&self, _worker_id: usize, _task_kind: &str, _elapsed: Duration) {
        self.failed.fetch_add(1, Ordering::AcqRel);
    }
}

#[test]
fn custom_telemetry_sees_every_task() -> Result<(), Box<dyn std::error::Error>> {
    let telemetry = Arc::new(CountingTelemetry::default());
    let pool = WorkerPool::with_telemetry(2, 4, telemetry.clone())?;

    for index in 0..10 {
        pool.submit(Box::new(move || {
            if index % 5 == 0 {
                Err(WriteBackError::Io(io::Error::other("short write")))
            } else {
                Ok(())
            }
        }))?;
    }

    pool.shutdown();
    assert!(pool.await_termination(Duration::from_secs(10))?);

    assert_eq!(telemetry.started.load(Ordering::Acquire), 10);
    assert_eq!(telemetry.finished.load(Ordering::Acquire), 8);
    assert_eq!(telemetry.failed.load(Ordering::Acquire), 2);
    assert!(
        telemetry
            .kinds
            .lock()
            .expect("kinds mutex poisoned")
            .iter()
            .all(|kind| kind == "write")
    );
    Ok(())
}

#[test]
fn worker_threads_are_named() -> Result<(), Box<dyn std::error::Error>> {
    let pool = WorkerPool::new(1, 1)?;
    let name = Arc::new(Mutex::new(None));
    {
        let name = Arc::clone(&name);
        pool.submit(Box::new(move || {
            *name.lock().expect("name mutex poisoned") =
                thread::current().name().map(str::to_string);
            Ok(())
        }))?;
    }

    pool.shutdown();
    assert!(pool.await_termination(Duration::from_secs(10))?);
    assert_eq!(
        name.lock().expect("name mutex poisoned").as_deref(),
        Some("writeback-io-0")
    );
    Ok(())
}
