use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::WriteBackError;

#[derive(Debug, Clone)]
struct RecordedFailure {
    path: PathBuf,
    offset: u64,
    error: Arc<WriteBackError>,
}

/// Collects write failures raised on worker threads so the importer sees them.
///
/// The first failure is kept and handed out by [`error`](Self::error) on every
/// call; later ones are only counted.
#[derive(Debug, Default)]
pub struct FailureSlot {
    first: Mutex<Option<RecordedFailure>>,
    count: AtomicUsize,
}

impl FailureSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, path: impl Into<PathBuf>, offset: u64, error: WriteBackError) {
        self.count.fetch_add(1, Ordering::AcqRel);
        let mut first = self
            .first
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if first.is_none() {
            *first = Some(RecordedFailure {
                path: path.into(),
                offset,
                error: Arc::new(error),
            });
        }
    }

    pub fn has_failed(&self) -> bool {
        self.count.load(Ordering::Acquire) > 0
    }

    pub fn failure_count(&self) -> usize {
        self.count.load(Ordering::Acquire)
    }

    /// The first recorded failure as a [`WriteBackError::WriteFailed`].
    pub fn error(&self) -> Option<WriteBackError> {
        let first = self
            .first
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        first.as_ref().map(|failure| WriteBackError::WriteFailed {
            path: failure.path.clone(),
            offset: failure.offset,
            source: Arc::clone(&failure.error),
        })
    }
}
