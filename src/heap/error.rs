//! Error types for the heap layer.

use std::fmt;

use crate::catalog::CatalogError;
use crate::datum::SerializationError;
use crate::storage::StorageError;
use crate::tx::TransactionId;

/// Errors from heap pages, heap files, and page scans.
#[derive(Debug)]
pub enum HeapError {
    /// A tuple's descriptor differs from the page's descriptor.
    SchemaMismatch,
    /// No empty slot is available on the page.
    PageFull,
    /// The slot named by a tuple's record id is already empty.
    SlotAlreadyEmpty(usize),
    /// A tuple's record id is missing or names a different page.
    NotOnPage,
    /// An operation requires a record id but the tuple has none.
    MissingRecordId,
    /// The buffer pool aborted the requesting transaction.
    TransactionAborted(TransactionId),
    /// `next` was called on an exhausted or closed scan.
    NoMoreTuples,
    /// Raw page I/O failure.
    Storage(StorageError),
    /// Tuple or value codec failure.
    Serialization(SerializationError),
    /// Table lookup failure during a pool fetch.
    Catalog(CatalogError),
}

impl fmt::Display for HeapError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HeapError::SchemaMismatch => {
                write!(f, "tuple descriptor does not match the page descriptor")
            }
            HeapError::PageFull => write!(f, "page is full"),
            HeapError::SlotAlreadyEmpty(slot) => {
                write!(f, "slot {} is already empty", slot)
            }
            HeapError::NotOnPage => write!(f, "tuple is not on this page"),
            HeapError::MissingRecordId => write!(f, "tuple has no record id"),
            HeapError::TransactionAborted(tid) => {
                write!(f, "transaction {} aborted", tid)
            }
            HeapError::NoMoreTuples => write!(f, "no more tuples"),
            HeapError::Storage(e) => write!(f, "{}", e),
            HeapError::Serialization(e) => write!(f, "{}", e),
            HeapError::Catalog(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for HeapError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            HeapError::Storage(e) => Some(e),
            HeapError::Serialization(e) => Some(e),
            HeapError::Catalog(e) => Some(e),
            _ => None,
        }
    }
}

impl From<StorageError> for HeapError {
    fn from(e: StorageError) -> Self {
        HeapError::Storage(e)
    }
}

impl From<SerializationError> for HeapError {
    fn from(e: SerializationError) -> Self {
        HeapError::Serialization(e)
    }
}

impl From<CatalogError> for HeapError {
    fn from(e: CatalogError) -> Self {
        HeapError::Catalog(e)
    }
}
