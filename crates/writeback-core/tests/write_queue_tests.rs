mod support;

use std::sync::Arc;

use support::{RecordingChannel, RecordingPool, event_log, page, write_offsets};
use writeback_core::io::{FailureSlot, JobCounters, QueueContext};
use writeback_core::{
    JobMonitor, NoWriteMonitor, PageWriter, SynchronousWriter, WorkerPool, WriteBackError,
    WriteJob, WriteQueue,
};

fn context(pool: Arc<WorkerPool>) -> QueueContext {
    QueueContext {
        pool,
        monitor: Arc::new(JobMonitor::new()),
        failures: Arc::new(FailureSlot::new()),
        counters: Arc::new(JobCounters::default()),
    }
}

fn writer(name: &'static str, channel: RecordingChannel) -> Arc<dyn PageWriter> {
    Arc::new(SynchronousWriter::new(
        name,
        Arc::new(channel),
        Arc::new(NoWriteMonitor),
    ))
}

#[test]
fn queue_runs_jobs_in_enqueue_order() -> Result<(), Box<dyn std::error::Error>> {
    let log = event_log();
    let pool = Arc::new(WorkerPool::new(2, 4)?);
    let context = context(Arc::clone(&pool));
    let queue = WriteQueue::new("ids.store", 4, context.clone());
    let writer = writer("ids", RecordingChannel::new("ids", &log));
    let buffers = RecordingPool::new("ids", &log);

    for offset in [300u64, 100, 200, 0] {
        queue.enqueue(WriteJob::new(
            Arc::clone(&writer),
            page(8, 1),
            offset,
            buffers.clone(),
        ))?;
    }

    assert!(context.monitor.await_idle(std::time::Duration::from_secs(10)));
    assert_eq!(write_offsets(&log, "ids"), vec![300, 100, 200, 0]);
    assert_eq!(queue.pending_jobs(), 0);
    assert_eq!(context.counters.snapshot().completed, 4);
    assert_eq!(context.counters.snapshot().bytes_written, 32);
    Ok(())
}

#[test]
fn enqueue_on_stopped_pool_releases_the_buffer() -> Result<(), Box<dyn std::error::Error>> {
    let log = event_log();
    let pool = Arc::new(WorkerPool::new(1, 4)?);
    pool.shutdown();
    let context = context(Arc::clone(&pool));
    let queue = WriteQueue::new("x.store", 4, context.clone());
    let buffers = RecordingPool::new("x", &log);

    let result = queue.enqueue(WriteJob::new(
        writer("x", RecordingChannel::new("x", &log)),
        page(8, 1),
        0,
        buffers.clone(),
    ));

    assert!(matches!(result, Err(WriteBackError::PoolShutDown)));
    assert_eq!(buffers.released(), 1);
    assert_eq!(context.monitor.active_jobs(), 0);
    assert_eq!(context.counters.snapshot().discarded, 1);
    assert!(write_offsets(&log, "x").is_empty());
    Ok(())
}

#[test]
fn failed_queue_rejects_without_counting() -> Result<(), Box<dyn std::error::Error>> {
    let log = event_log();
    let pool = Arc::new(WorkerPool::new(1, 4)?);
    let context = context(Arc::clone(&pool));
    let queue = WriteQueue::new("bad.store", 4, context.clone());
    let writer = writer("bad", RecordingChannel::new("bad", &log).failing_at(0));
    let buffers = RecordingPool::new("bad", &log);

    queue.enqueue(WriteJob::new(Arc::clone(&writer), page(4, 1), 0, buffers.clone()))?;
    assert!(context.monitor.await_idle(std::time::Duration::from_secs(10)));
    assert!(queue.is_failed());
    assert_eq!(context.failures.failure_count(), 1);

    let rejected = queue.enqueue(WriteJob::new(writer, page(4, 2), 4, buffers.clone()));
    assert!(matches!(rejected, Err(WriteBackError::ChannelFailed { .. })));
    assert_eq!(buffers.released(), 2);

    let counters = context.counters.snapshot();
    assert_eq!(counters.accepted, 1);
    assert_eq!(counters.failed, 1);
    assert_eq!(counters.discarded, 0);

    match context.failures.error() {
        Some(WriteBackError::WriteFailed { offset, .. }) => assert_eq!(offset, 0),
        other => panic!("unexpected failure record: {other:?}"),
    }
    Ok(())
}
