//! Process-wide page size.
//!
//! The page size is a single knob shared by every file and page in the
//! process. It defaults to 4096 bytes and may be changed once at startup,
//! before any page is read or constructed; changing it afterwards would make
//! existing page images unreadable.

use std::sync::atomic::{AtomicUsize, Ordering};

/// Default page size in bytes.
pub const DEFAULT_PAGE_SIZE: usize = 4096;

static PAGE_SIZE: AtomicUsize = AtomicUsize::new(DEFAULT_PAGE_SIZE);

/// Returns the current page size in bytes.
pub fn page_size() -> usize {
    PAGE_SIZE.load(Ordering::Relaxed)
}

/// Sets the process-wide page size.
///
/// Call once during initialization, before opening any file. Panics on zero.
pub fn set_page_size(size: usize) {
    assert!(size > 0, "page size must be positive");
    PAGE_SIZE.store(size, Ordering::Relaxed);
}
