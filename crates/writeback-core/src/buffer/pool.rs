use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

use crossbeam_channel::{Receiver, Sender, TryRecvError, TrySendError, bounded};

use crate::telemetry;
#[cfg(feature = "profiling")]
use crate::telemetry::profile;
use crate::telemetry::tags;

#[cfg(feature = "profiling")]
const PROFILE_TAG_STACK_BUFFER: [&str; 2] = [tags::TAG_SYSTEM, tags::TAG_BUFFER];

/// Capability to take back a write buffer once the pipeline is done with it.
///
/// The write pipeline owns a buffer from the moment it is handed to
/// [`Funnel::write`](crate::Funnel::write) until `release` is called for it,
/// exactly once, after the positioned write was attempted.
pub trait BufferRelease: Send + Sync {
    fn release(&self, buffer: Vec<u8>);
}

/// A pool of reusable page buffers shared by every file of an import.
///
/// Buffers are handed out by [`acquire`](Self::acquire) and come back through
/// [`BufferRelease::release`] once their write completed.
///
/// # Example
/// ```
/// use writeback_core::{BufferPool, BufferRelease};
///
/// let pool = BufferPool::new(4096, 16);
/// let mut page = pool.acquire();
/// page.extend_from_slice(b"page");
/// pool.release(page);
/// assert_eq!(pool.metrics().released, 1);
/// ```
#[derive(Debug)]
pub struct BufferPool {
    recycler: Sender<Vec<u8>>,
    receiver: Receiver<Vec<u8>>,
    default_capacity: usize,
    max_buffers: usize,
    metrics: PoolMetricsInner,
}

impl BufferPool {
    /// Creates a new buffer pool.
    ///
    /// # Arguments
    /// * `default_capacity` - Initial capacity for newly created buffers
    /// * `max_buffers` - Maximum number of idle buffers kept for reuse
    pub fn new(default_capacity: usize, max_buffers: usize) -> Self {
        let (tx, rx) = bounded(max_buffers);
        Self {
            recycler: tx,
            receiver: rx,
            default_capacity,
            max_buffers,
            metrics: PoolMetricsInner::default(),
        }
    }

    /// Acquires an empty buffer, recycling an idle one when available.
    pub fn acquire(&self) -> Vec<u8> {
        let started_at = Instant::now();
        let (result, buffer) = match self.receiver.try_recv() {
            Ok(mut buffer) => {
                let capacity = buffer.capacity();
                buffer.clear();
                self.metrics.recycled.fetch_add(1, Ordering::Relaxed);
                telemetry::increment_counter(
                    tags::METRIC_BUFFER_ACQUIRE_RECYCLED_COUNT,
                    1,
                    &[
                        ("subsystem", "buffer"),
                        ("op", "acquire"),
                        ("result", "recycled"),
                    ],
                );
                telemetry::sub_gauge_saturating(
                    tags::METRIC_BUFFER_POOL_IDLE_BYTES,
                    capacity as u64,
                    &[("subsystem", "buffer"), ("op", "acquire")],
                );
                ("recycled", buffer)
            }
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => {
                self.metrics.created.fetch_add(1, Ordering::Relaxed);
                telemetry::increment_counter(
                    tags::METRIC_BUFFER_ACQUIRE_CREATED_COUNT,
                    1,
                    &[
                        ("subsystem", "buffer"),
                        ("op", "acquire"),
                        ("result", "created"),
                    ],
                );
                ("created", Vec::with_capacity(self.default_capacity))
            }
        };
        let elapsed_us = telemetry::profile::elapsed_us(started_at);
        telemetry::record_histogram(
            tags::METRIC_BUFFER_ACQUIRE_LATENCY_US,
            elapsed_us,
            &[("subsystem", "buffer"), ("op", "acquire")],
        );
        #[cfg(not(feature = "profiling"))]
        let _ = result;
        #[cfg(feature = "profiling")]
        profile::event(
            tags::PROFILE_BUFFER,
            &PROFILE_TAG_STACK_BUFFER,
            "acquire",
            result,
            elapsed_us,
            "buffer acquire completed",
        );

        buffer
    }

    /// Returns a snapshot of the current pool metrics.
    pub fn metrics(&self) -> PoolMetricsSnapshot {
        PoolMetricsSnapshot {
            created: self.metrics.created.load(Ordering::Relaxed),
            recycled: self.metrics.recycled.load(Ordering::Relaxed),
            released: self.metrics.released.load(Ordering::Relaxed),
            dropped: self.metrics.dropped.load(Ordering::Relaxed),
        }
    }

    /// Number of idle buffers currently waiting for reuse.
    pub fn idle_buffers(&self) -> usize {
        self.receiver.len()
    }

    pub fn default_capacity(&self) -> usize {
        self.default_capacity
    }

    pub fn max_buffers(&self) -> usize {
        self.max_buffers
    }
}

impl BufferRelease for BufferPool {
    fn release(&self, buffer: Vec<u8>) {
        self.metrics.released.fetch_add(1, Ordering::Relaxed);
        let capacity = buffer.capacity();
        match self.recycler.try_send(buffer) {
            Ok(()) => {
                telemetry::increment_counter(
                    tags::METRIC_BUFFER_RELEASE_OK_COUNT,
                    1,
                    &[
                        ("subsystem", "buffer"),
                        ("op", "release"),
                        ("result", "recycled"),
                    ],
                );
                telemetry::add_gauge(
                    tags::METRIC_BUFFER_POOL_IDLE_BYTES,
                    capacity as u64,
                    &[("subsystem", "buffer"), ("op", "release")],
                );
            }
            Err(TrySendError::Full(_)) | Err(TrySendError::Disconnected(_)) => {
                // Pool is full; let the allocation go.
                self.metrics.dropped.fetch_add(1, Ordering::Relaxed);
                telemetry::increment_counter(
                    tags::METRIC_BUFFER_RELEASE_DROPPED_COUNT,
                    1,
                    &[
                        ("subsystem", "buffer"),
                        ("op", "release"),
                        ("result", "dropped"),
                    ],
                );
                #[cfg(feature = "profiling")]
                if profile::is_tag_stack_enabled(&PROFILE_TAG_STACK_BUFFER) {
                    tracing::debug!(
                        target: tags::PROFILE_BUFFER,
                        op = "release",
                        result = "dropped",
                        tags = ?PROFILE_TAG_STACK_BUFFER,
                        buffer_capacity = capacity,
                        "buffer dropped instead of recycled"
                    );
                }
            }
        }
    }
}

/// A snapshot of buffer pool metrics at a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PoolMetricsSnapshot {
    /// Number of buffers created by the pool
    pub created: usize,
    /// Number of acquisitions served by a recycled buffer
    pub recycled: usize,
    /// Number of buffers handed back through `release`
    pub released: usize,
    /// Number of released buffers dropped because the pool was full
    pub dropped: usize,
}

#[derive(Debug, Default)]
struct PoolMetricsInner {
    created: AtomicUsize,
    recycled: AtomicUsize,
    released: AtomicUsize,
    dropped: AtomicUsize,
}
