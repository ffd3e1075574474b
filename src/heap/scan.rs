//! Sequential scan over one heap file.

use std::sync::Arc;

use crate::buffer::{BufferPool, Permissions};
use crate::storage::HeapPageId;
use crate::tuple::Tuple;
use crate::tx::TransactionId;

use super::error::HeapError;
use super::file::HeapFile;

/// Per-page tuple cursor while a scan is open.
struct ScanState {
    page_no: usize,
    total_pages: usize,
    tuples: std::vec::IntoIter<Tuple>,
}

/// Stateful page-by-page scan over a heap file.
///
/// The scan is a small lifecycle machine: it starts closed, [`open`]
/// positions it on page 0, [`has_next`]/[`next`] walk the populated tuples
/// in page order, [`rewind`] restarts, and [`close`] returns it to the
/// closed state. Pages are fetched read-only through the buffer pool, one at
/// a time; memory use is proportional to a single page.
///
/// The page count is captured at `open`, so file growth during a scan is not
/// observed until the next `open` or `rewind`.
///
/// [`open`]: HeapScan::open
/// [`has_next`]: HeapScan::has_next
/// [`next`]: HeapScan::next
/// [`rewind`]: HeapScan::rewind
/// [`close`]: HeapScan::close
pub struct HeapScan {
    file: Arc<HeapFile>,
    pool: Arc<dyn BufferPool>,
    tid: TransactionId,
    state: Option<ScanState>,
}

impl HeapScan {
    /// Creates a closed scan over `file`.
    pub fn new(file: Arc<HeapFile>, pool: Arc<dyn BufferPool>, tid: TransactionId) -> Self {
        Self {
            file,
            pool,
            tid,
            state: None,
        }
    }

    /// Opens the scan at page 0, capturing the current page count.
    ///
    /// An empty file opens as an immediately exhausted scan.
    pub fn open(&mut self) -> Result<(), HeapError> {
        let total_pages = self.file.num_pages();
        let tuples = if total_pages == 0 {
            Vec::new().into_iter()
        } else {
            self.page_tuples(0)?
        };
        self.state = Some(ScanState {
            page_no: 0,
            total_pages,
            tuples,
        });
        Ok(())
    }

    /// Returns true if the scan is open.
    pub fn is_open(&self) -> bool {
        self.state.is_some()
    }

    /// Returns whether another tuple is available, advancing across
    /// exhausted pages as needed. A closed scan has no tuples.
    pub fn has_next(&mut self) -> Result<bool, HeapError> {
        loop {
            let next_page = match &self.state {
                None => return Ok(false),
                Some(state) => {
                    if !state.tuples.as_slice().is_empty() {
                        return Ok(true);
                    }
                    if state.page_no + 1 < state.total_pages {
                        state.page_no + 1
                    } else {
                        return Ok(false);
                    }
                }
            };

            let tuples = self.page_tuples(next_page)?;
            if let Some(state) = self.state.as_mut() {
                state.page_no = next_page;
                state.tuples = tuples;
            }
        }
    }

    /// Returns the next tuple.
    ///
    /// # Errors
    ///
    /// Returns `NoMoreTuples` when the scan is closed or exhausted.
    pub fn next(&mut self) -> Result<Tuple, HeapError> {
        if !self.has_next()? {
            return Err(HeapError::NoMoreTuples);
        }
        self.state
            .as_mut()
            .and_then(|state| state.tuples.next())
            .ok_or(HeapError::NoMoreTuples)
    }

    /// Restarts the scan from the first page: close followed by open.
    pub fn rewind(&mut self) -> Result<(), HeapError> {
        self.close();
        self.open()
    }

    /// Closes the scan, dropping the current page cursor.
    pub fn close(&mut self) {
        self.state = None;
    }

    fn page_tuples(&self, page_no: usize) -> Result<std::vec::IntoIter<Tuple>, HeapError> {
        let pid = HeapPageId::new(self.file.table_id(), page_no);
        let shared = self.pool.get_page(self.tid, pid, Permissions::ReadOnly)?;
        let page = shared.read();
        Ok(page.iter())
    }
}
