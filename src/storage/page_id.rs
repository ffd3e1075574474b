//! Page and record identity.

use std::fmt;

use super::config::page_size;

/// Unique identifier for a heap page: the owning table plus the page's
/// position within the table's backing file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HeapPageId {
    /// Id of the table this page belongs to.
    pub table_id: u64,
    /// Zero-based page number within the backing file.
    pub page_no: usize,
}

impl HeapPageId {
    /// Creates a new page identifier.
    pub const fn new(table_id: u64, page_no: usize) -> Self {
        Self { table_id, page_no }
    }

    /// Byte offset of this page in its backing file.
    pub fn byte_offset(&self) -> u64 {
        self.page_no as u64 * page_size() as u64
    }
}

impl fmt::Display for HeapPageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.table_id, self.page_no)
    }
}

/// Location of a tuple: a page plus a slot within it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RecordId {
    /// Page containing the tuple.
    pub page_id: HeapPageId,
    /// Slot within the page.
    pub slot: usize,
}

impl RecordId {
    /// Creates a new record identifier.
    pub const fn new(page_id: HeapPageId, slot: usize) -> Self {
        Self { page_id, slot }
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.page_id, self.slot)
    }
}
