use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum WriteBackError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),
    #[error("write pipeline is shutting down; no new writes accepted")]
    ShutDown,
    #[error("worker pool is shut down; task rejected")]
    PoolShutDown,
    #[error("channel {path} failed earlier; write rejected")]
    ChannelFailed { path: PathBuf },
    #[error("write to {path} at offset {offset} failed: {source}")]
    WriteFailed {
        path: PathBuf,
        offset: u64,
        #[source]
        source: Arc<WriteBackError>,
    },
    #[error("page writer panicked: {0}")]
    WriterPanicked(String),
    #[error("writes did not drain within {timeout:?} ({active_jobs} jobs still active)")]
    DrainTimeout {
        timeout: Duration,
        active_jobs: usize,
    },
    #[error("worker threads did not terminate within {timeout:?}")]
    TerminationTimeout { timeout: Duration },
    #[error("{context}: {source}")]
    Context {
        context: String,
        #[source]
        source: Box<WriteBackError>,
    },
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl WriteBackError {
    pub fn with_context(self, context: impl Into<String>) -> Self {
        Self::Context {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// True for conditions that abort the whole import rather than a single call.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::WriteFailed { .. }
            | Self::WriterPanicked(_)
            | Self::DrainTimeout { .. }
            | Self::TerminationTimeout { .. } => true,
            Self::Context { source, .. } => source.is_fatal(),
            _ => false,
        }
    }
}
