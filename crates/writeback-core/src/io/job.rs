use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use crate::WriteBackError;
use crate::buffer::BufferRelease;
use crate::core::worker_pool::panic_message;
use crate::io::writer::PageWriter;
use crate::types::Result;

/// One pending positioned write: "write `buffer` through `writer` at `offset`,
/// then give the buffer back to `pool`".
///
/// Jobs are consumed by [`execute`](Self::execute) or [`discard`](Self::discard),
/// so each one runs at most once and always returns its buffer.
pub struct WriteJob {
    writer: Arc<dyn PageWriter>,
    buffer: Vec<u8>,
    offset: u64,
    pool: Arc<dyn BufferRelease>,
}

impl WriteJob {
    pub fn new(
        writer: Arc<dyn PageWriter>,
        buffer: Vec<u8>,
        offset: u64,
        pool: Arc<dyn BufferRelease>,
    ) -> Self {
        Self {
            writer,
            buffer,
            offset,
            pool,
        }
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Performs the write, then releases the buffer whatever the outcome.
    ///
    /// A panic inside the writer is caught and reported as
    /// [`WriteBackError::WriterPanicked`].
    pub fn execute(self) -> Result<()> {
        let Self {
            writer,
            buffer,
            offset,
            pool,
        } = self;

        let outcome = catch_unwind(AssertUnwindSafe(|| writer.write_page(&buffer, offset)));
        pool.release(buffer);

        match outcome {
            Ok(result) => result,
            Err(payload) => Err(WriteBackError::WriterPanicked(panic_message(
                payload.as_ref(),
            ))),
        }
    }

    /// Drops the write and returns the buffer to its pool untouched.
    pub fn discard(self) {
        self.pool.release(self.buffer);
    }
}

impl fmt::Debug for WriteJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WriteJob")
            .field("offset", &self.offset)
            .field("len", &self.buffer.len())
            .finish_non_exhaustive()
    }
}
