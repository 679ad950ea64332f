use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

/// Destination of positioned writes, usually one store file.
pub trait StoreChannel: Send + Sync {
    /// Writes all of `buf` starting at byte `offset`.
    fn write_all_at(&self, buf: &[u8], offset: u64) -> io::Result<()>;

    /// Flushes written data to the underlying storage.
    fn sync(&self) -> io::Result<()> {
        Ok(())
    }
}

/// [`StoreChannel`] over a regular file.
///
/// Writes are positioned (`pwrite` on Unix, `seek_write` on Windows), so writers
/// of the same file never share a cursor and need no lock.
#[derive(Debug)]
pub struct FileChannel {
    path: PathBuf,
    file: File,
}

impl FileChannel {
    /// Opens `path` for writing, creating it when missing. Existing content is kept.
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;
        Ok(Self::from_file(path, file))
    }

    pub fn from_file(path: impl Into<PathBuf>, file: File) -> Self {
        Self {
            path: path.into(),
            file,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current length of the file in bytes.
    pub fn len(&self) -> io::Result<u64> {
        Ok(self.file.metadata()?.len())
    }

    pub fn is_empty(&self) -> io::Result<bool> {
        self.len().map(|len| len == 0)
    }
}

impl StoreChannel for FileChannel {
    #[cfg(unix)]
    fn write_all_at(&self, buf: &[u8], offset: u64) -> io::Result<()> {
        use std::os::unix::fs::FileExt;

        self.file.write_all_at(buf, offset)
    }

    #[cfg(windows)]
    fn write_all_at(&self, mut buf: &[u8], mut offset: u64) -> io::Result<()> {
        use std::os::windows::fs::FileExt;

        while !buf.is_empty() {
            match self.file.seek_write(buf, offset) {
                Ok(0) => return Err(io::Error::from(io::ErrorKind::WriteZero)),
                Ok(written) => {
                    buf = &buf[written..];
                    offset += written as u64;
                }
                Err(error) if error.kind() == io::ErrorKind::Interrupted => {}
                Err(error) => return Err(error),
            }
        }
        Ok(())
    }

    fn sync(&self) -> io::Result<()> {
        self.file.sync_data()
    }
}
