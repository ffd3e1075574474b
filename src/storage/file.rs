//! File-backed page storage.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use log::{debug, trace};
use parking_lot::Mutex;

use super::config::page_size;
use super::error::StorageError;

/// Raw page-granular I/O over a single backing file.
///
/// Pages are stored as contiguous fixed-size blocks, tightly packed with no
/// file header or trailer.
///
/// # File layout
///
/// ```text
/// +--------------+--------------+--------------+
/// | Page 0 (P B) | Page 1 (P B) | Page 2 (P B) | ...
/// +--------------+--------------+--------------+
/// ^ offset 0     ^ offset P     ^ offset 2P
/// ```
///
/// # Concurrency
///
/// A mutex around the file handle serializes all I/O, including appends, so
/// two concurrent writers cannot both extend the file at the same offset.
pub struct PageFile {
    /// Path to the backing file.
    path: PathBuf,
    /// File handle, serialized by a mutex.
    file: Mutex<File>,
    /// Number of whole pages currently in the file.
    page_count: AtomicU64,
}

impl PageFile {
    /// Opens or creates a page file at the given path.
    ///
    /// If the file exists, its page count is derived from its length.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Corrupted` if the file length is not a
    /// multiple of the page size.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let path = path.into();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)?;

        let file_len = file.metadata()?.len();
        if file_len % page_size() as u64 != 0 {
            return Err(StorageError::Corrupted(format!(
                "file length {} is not a multiple of page size {}",
                file_len,
                page_size()
            )));
        }

        debug!(
            "opened page file {:?} with {} pages",
            path,
            file_len / page_size() as u64
        );

        Ok(Self {
            path,
            file: Mutex::new(file),
            page_count: AtomicU64::new(file_len / page_size() as u64),
        })
    }

    /// Returns the path to the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the number of whole pages in the file.
    pub fn page_count(&self) -> usize {
        self.page_count.load(Ordering::Acquire) as usize
    }

    /// Reads the page image at `page_no`.
    ///
    /// # Errors
    ///
    /// Returns `PageNotFound` for a page number beyond the end of the file;
    /// a short read surfaces as `Io`.
    pub fn read(&self, page_no: usize) -> Result<Vec<u8>, StorageError> {
        if page_no >= self.page_count() {
            return Err(StorageError::PageNotFound(page_no));
        }

        let mut buf = vec![0u8; page_size()];
        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(page_no as u64 * page_size() as u64))?;
        file.read_exact(&mut buf)?;
        trace!("read page {} from {:?}", page_no, self.path);
        Ok(buf)
    }

    /// Writes a page image at `page_no`.
    ///
    /// Writing at `page_no == page_count()` appends a new page and extends
    /// the file.
    ///
    /// # Errors
    ///
    /// Returns `InvalidBufferSize` unless `buf` is exactly one page, and
    /// `PageNotFound` for a page number past the append position.
    pub fn write(&self, page_no: usize, buf: &[u8]) -> Result<(), StorageError> {
        if buf.len() != page_size() {
            return Err(StorageError::InvalidBufferSize {
                expected: page_size(),
                actual: buf.len(),
            });
        }

        let mut file = self.file.lock();
        // Check under the handle lock so concurrent appends serialize.
        let count = self.page_count.load(Ordering::Acquire) as usize;
        if page_no > count {
            return Err(StorageError::PageNotFound(page_no));
        }

        file.seek(SeekFrom::Start(page_no as u64 * page_size() as u64))?;
        file.write_all(buf)?;

        if page_no == count {
            self.page_count.store(count as u64 + 1, Ordering::Release);
            debug!("extended {:?} to {} pages", self.path, count + 1);
        }
        trace!("wrote page {} to {:?}", page_no, self.path);
        Ok(())
    }

    /// Flushes file contents to stable storage.
    pub fn sync_all(&self) -> Result<(), StorageError> {
        let file = self.file.lock();
        file.sync_all()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn page_of(byte: u8) -> Vec<u8> {
        vec![byte; page_size()]
    }

    #[test]
    fn test_create_new_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("table.dat");
        let file = PageFile::open(&path).unwrap();
        assert_eq!(file.page_count(), 0);
        assert!(path.exists());
        assert_eq!(file.path(), path);
    }

    #[test]
    fn test_write_read_roundtrip() {
        let dir = tempdir().unwrap();
        let file = PageFile::open(dir.path().join("table.dat")).unwrap();

        file.write(0, &page_of(0xAB)).unwrap();
        file.write(1, &page_of(0xCD)).unwrap();
        assert_eq!(file.page_count(), 2);

        assert_eq!(file.read(0).unwrap(), page_of(0xAB));
        assert_eq!(file.read(1).unwrap(), page_of(0xCD));
    }

    #[test]
    fn test_overwrite_existing_page() {
        let dir = tempdir().unwrap();
        let file = PageFile::open(dir.path().join("table.dat")).unwrap();

        file.write(0, &page_of(1)).unwrap();
        file.write(0, &page_of(2)).unwrap();
        assert_eq!(file.page_count(), 1);
        assert_eq!(file.read(0).unwrap(), page_of(2));
    }

    #[test]
    fn test_read_past_end() {
        let dir = tempdir().unwrap();
        let file = PageFile::open(dir.path().join("table.dat")).unwrap();
        assert!(matches!(file.read(0), Err(StorageError::PageNotFound(0))));
    }

    #[test]
    fn test_write_with_hole_rejected() {
        let dir = tempdir().unwrap();
        let file = PageFile::open(dir.path().join("table.dat")).unwrap();
        assert!(matches!(
            file.write(1, &page_of(0)),
            Err(StorageError::PageNotFound(1))
        ));
    }

    #[test]
    fn test_invalid_buffer_size() {
        let dir = tempdir().unwrap();
        let file = PageFile::open(dir.path().join("table.dat")).unwrap();
        assert!(matches!(
            file.write(0, &[0u8; 7]),
            Err(StorageError::InvalidBufferSize { actual: 7, .. })
        ));
    }

    #[test]
    fn test_corrupted_file_length() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("table.dat");
        std::fs::write(&path, vec![0u8; 100]).unwrap();
        assert!(matches!(
            PageFile::open(&path),
            Err(StorageError::Corrupted(_))
        ));
    }

    #[test]
    fn test_persistence_across_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("table.dat");

        {
            let file = PageFile::open(&path).unwrap();
            file.write(0, &page_of(0x11)).unwrap();
            file.write(1, &page_of(0x22)).unwrap();
            file.sync_all().unwrap();
        }

        let file = PageFile::open(&path).unwrap();
        assert_eq!(file.page_count(), 2);
        assert_eq!(file.read(0).unwrap(), page_of(0x11));
        assert_eq!(file.read(1).unwrap(), page_of(0x22));
    }
}
