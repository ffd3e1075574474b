//! Heap files: one backing file of pages per table.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::debug;
use parking_lot::Mutex;

use crate::buffer::{BufferPool, Permissions, SharedPage};
use crate::storage::{HeapPageId, PageFile, StorageError};
use crate::tuple::{Tuple, TupleDesc};
use crate::tx::TransactionId;

use super::error::HeapError;
use super::page::HeapPage;

/// A heap file: an unordered collection of pages backing one table.
///
/// The file owns raw page I/O ([`read_page`](HeapFile::read_page) /
/// [`write_page`](HeapFile::write_page)) and the tuple-level write path.
/// Tuple inserts and deletes go through the caller's
/// [`BufferPool`](crate::buffer::BufferPool) so that an external pool and
/// lock manager can coordinate concurrent transactions; only page appends
/// write to disk directly.
pub struct HeapFile {
    file: PageFile,
    desc: Arc<TupleDesc>,
    table_id: u64,
    /// Serializes the decide-and-append step of inserts against concurrent
    /// appends to the same file.
    append_lock: Mutex<()>,
}

impl HeapFile {
    /// Opens or creates a heap file at `path` holding rows of `desc`.
    ///
    /// The table id is a stable hash of the absolute path: the same path
    /// yields the same id across process runs. The catalog is responsible
    /// for refusing id collisions between distinct paths.
    pub fn open(path: impl Into<PathBuf>, desc: Arc<TupleDesc>) -> Result<Self, HeapError> {
        let path = path.into();
        let file = PageFile::open(&path)?;
        let absolute = std::path::absolute(&path).map_err(StorageError::Io)?;
        let table_id = stable_table_id(&absolute);
        debug!("opened heap file {:?} as table {}", absolute, table_id);
        Ok(Self {
            file,
            desc,
            table_id,
            append_lock: Mutex::new(()),
        })
    }

    /// Returns the table id derived from this file's absolute path.
    pub fn table_id(&self) -> u64 {
        self.table_id
    }

    /// Returns the row descriptor for this table.
    pub fn desc(&self) -> &Arc<TupleDesc> {
        &self.desc
    }

    /// Returns the path to the backing file.
    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Returns the number of whole pages in the backing file.
    pub fn num_pages(&self) -> usize {
        self.file.page_count()
    }

    /// Reads and decodes the page at `pid`.
    pub fn read_page(&self, pid: HeapPageId) -> Result<HeapPage, HeapError> {
        let data = self.file.read(pid.page_no)?;
        HeapPage::from_bytes(pid, &data, self.desc.clone())
    }

    /// Serializes `page` and writes it at its page number.
    ///
    /// Writing at `num_pages()` appends and extends the file.
    pub fn write_page(&self, page: &HeapPage) -> Result<(), HeapError> {
        let image = page.page_data()?;
        self.file.write(page.id().page_no, &image)?;
        Ok(())
    }

    /// Inserts a tuple into the first page with a free slot, allocating a
    /// new page when every existing page is full.
    ///
    /// Pages are fetched through `pool` with read-write intent; the mutated
    /// page is marked dirty with `tid` and returned. A newly allocated page
    /// is written through to disk empty before the insert goes through the
    /// pool.
    pub fn insert_tuple(
        &self,
        pool: &dyn BufferPool,
        tid: TransactionId,
        tuple: Tuple,
    ) -> Result<Vec<SharedPage>, HeapError> {
        for page_no in 0..self.num_pages() {
            let pid = HeapPageId::new(self.table_id, page_no);
            let shared = pool.get_page(tid, pid, Permissions::ReadWrite)?;
            let mut page = shared.write();
            if page.num_empty_slots() > 0 {
                page.insert_tuple(tuple)?;
                page.mark_dirty(true, tid);
                drop(page);
                return Ok(vec![shared]);
            }
        }

        // Every page is full: append an empty page, then insert through the
        // pool. The lock keeps concurrent appenders from claiming the same
        // page number.
        let _append = self.append_lock.lock();
        let page_no = self.num_pages();
        self.file.write(page_no, &HeapPage::empty_page_data())?;
        debug!("table {}: allocated page {}", self.table_id, page_no);

        let pid = HeapPageId::new(self.table_id, page_no);
        let shared = pool.get_page(tid, pid, Permissions::ReadWrite)?;
        let mut page = shared.write();
        page.insert_tuple(tuple)?;
        page.mark_dirty(true, tid);
        drop(page);
        Ok(vec![shared])
    }

    /// Deletes a tuple from the page named by its record id.
    ///
    /// # Errors
    ///
    /// Returns `MissingRecordId` when the tuple has never been stored, and
    /// `NotOnPage` when the record id names another table.
    pub fn delete_tuple(
        &self,
        pool: &dyn BufferPool,
        tid: TransactionId,
        tuple: &Tuple,
    ) -> Result<Vec<SharedPage>, HeapError> {
        let record_id = tuple.record_id().ok_or(HeapError::MissingRecordId)?;
        if record_id.page_id.table_id != self.table_id {
            return Err(HeapError::NotOnPage);
        }

        let shared = pool.get_page(tid, record_id.page_id, Permissions::ReadWrite)?;
        let mut page = shared.write();
        page.delete_tuple(tuple)?;
        page.mark_dirty(true, tid);
        drop(page);
        Ok(vec![shared])
    }
}

/// FNV-1a 64-bit hash of a path, stable across process runs.
fn stable_table_id(path: &Path) -> u64 {
    const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

    let mut hash = FNV_OFFSET;
    for byte in path.to_string_lossy().as_bytes() {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}
