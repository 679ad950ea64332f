use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::io::channel::StoreChannel;
use crate::types::Result;

/// Observer of bytes that reached a channel.
pub trait WriteMonitor: Send + Sync {
    fn data_written(&self, bytes: usize);
}

/// Monitor that ignores every notification.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoWriteMonitor;

impl WriteMonitor for NoWriteMonitor {
    fn data_written(&self, _bytes: usize) {}
}

/// Monitor that sums written bytes; share one across files to get an import total.
#[derive(Debug, Default)]
pub struct WrittenBytes {
    total: AtomicU64,
}

impl WrittenBytes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn total(&self) -> u64 {
        self.total.load(Ordering::Acquire)
    }
}

impl WriteMonitor for WrittenBytes {
    fn data_written(&self, bytes: usize) {
        self.total.fetch_add(bytes as u64, Ordering::AcqRel);
    }
}

/// Low-level writer bound to one channel.
///
/// Implementations perform the write synchronously on the calling thread; the
/// pipeline decides which thread that is.
pub trait PageWriter: Send + Sync {
    fn write_page(&self, page: &[u8], offset: u64) -> Result<()>;
}

/// Strategy creating the low-level writer for each opened file.
pub trait WriterFactory: Send + Sync {
    fn create(
        &self,
        path: &Path,
        channel: Arc<dyn StoreChannel>,
        monitor: Arc<dyn WriteMonitor>,
    ) -> Result<Arc<dyn PageWriter>>;
}

/// Factory for [`SynchronousWriter`], a pass-through to the channel.
#[derive(Debug, Clone, Copy, Default)]
pub struct SynchronousWriterFactory;

impl WriterFactory for SynchronousWriterFactory {
    fn create(
        &self,
        path: &Path,
        channel: Arc<dyn StoreChannel>,
        monitor: Arc<dyn WriteMonitor>,
    ) -> Result<Arc<dyn PageWriter>> {
        Ok(Arc::new(SynchronousWriter::new(path, channel, monitor)))
    }
}

/// Writes each page straight to its channel and reports the byte count.
pub struct SynchronousWriter {
    path: PathBuf,
    channel: Arc<dyn StoreChannel>,
    monitor: Arc<dyn WriteMonitor>,
}

impl SynchronousWriter {
    pub fn new(
        path: impl Into<PathBuf>,
        channel: Arc<dyn StoreChannel>,
        monitor: Arc<dyn WriteMonitor>,
    ) -> Self {
        Self {
            path: path.into(),
            channel,
            monitor,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl PageWriter for SynchronousWriter {
    fn write_page(&self, page: &[u8], offset: u64) -> Result<()> {
        self.channel.write_all_at(page, offset)?;
        self.monitor.data_written(page.len());
        Ok(())
    }
}
