//! Storage layer errors.

use std::fmt;

/// Errors from raw page I/O.
#[derive(Debug)]
pub enum StorageError {
    /// The requested page number is beyond the end of the file.
    PageNotFound(usize),

    /// A buffer passed to read or write was not exactly one page long.
    InvalidBufferSize {
        /// Expected buffer size (the page size).
        expected: usize,
        /// Actual buffer size provided.
        actual: usize,
    },

    /// I/O error from the underlying file system.
    Io(std::io::Error),

    /// The backing file has an invalid format or size.
    Corrupted(String),
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::PageNotFound(page_no) => {
                write!(f, "page {} not found", page_no)
            }
            StorageError::InvalidBufferSize { expected, actual } => {
                write!(
                    f,
                    "invalid buffer size: expected {}, got {}",
                    expected, actual
                )
            }
            StorageError::Io(e) => write!(f, "I/O error: {}", e),
            StorageError::Corrupted(msg) => write!(f, "data corruption: {}", msg),
        }
    }
}

impl std::error::Error for StorageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StorageError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for StorageError {
    fn from(e: std::io::Error) -> Self {
        StorageError::Io(e)
    }
}
