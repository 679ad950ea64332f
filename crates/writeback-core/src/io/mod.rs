pub mod channel;
pub mod failure;
pub mod job;
pub mod monitor;
pub mod queue;
pub mod writer;

pub use channel::{FileChannel, StoreChannel};
pub use failure::FailureSlot;
pub use job::WriteJob;
pub use monitor::{JobCounters, JobCountersSnapshot, JobMonitor};
pub use queue::{QueueContext, WriteQueue};
pub use writer::{
    NoWriteMonitor, PageWriter, SynchronousWriter, SynchronousWriterFactory, WriteMonitor,
    WriterFactory, WrittenBytes,
};
