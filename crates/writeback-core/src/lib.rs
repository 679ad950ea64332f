//! Asynchronous write-back of page buffers to store files.
//!
//! A [`WritePipeline`] hands every opened file a [`Funnel`]. Writes through a
//! funnel are queued and executed on a shared pool of I/O threads, in order per
//! file, while the producer keeps generating pages. [`WritePipeline::drain`]
//! waits for everything to reach the channels and reports any failed write.

pub mod buffer;
pub mod core;
pub mod error;
pub mod io;
pub mod pipeline;
pub mod telemetry;
pub mod types;

pub use buffer::{BufferPool, BufferRelease, PoolMetricsSnapshot};
pub use crate::core::{PoolRuntimeSnapshot, WorkerPool, WorkerRuntimeSnapshot};
pub use error::WriteBackError;
pub use io::{
    FileChannel, JobMonitor, NoWriteMonitor, PageWriter, StoreChannel, SynchronousWriter,
    SynchronousWriterFactory, WriteJob, WriteMonitor, WriteQueue, WriterFactory, WrittenBytes,
};
pub use pipeline::{Funnel, PipelineStats, WritePipeline};
pub use telemetry::worker::{DefaultWorkerTelemetry, WorkerTelemetry};
pub use types::{PipelineConfig, Result};
