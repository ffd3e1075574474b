//! The buffer pool interface.
//!
//! The core never caches pages itself: every page access on the tuple read
//! and write paths goes through a [`BufferPool`]. Production deployments
//! supply an implementation with real caching, eviction, and a lock manager;
//! this module defines the narrow trait the core needs plus
//! [`MemoryPool`], a minimal non-evicting implementation for embedding and
//! tests.

use std::collections::HashMap;
use std::sync::Arc;

use log::trace;
use parking_lot::RwLock;

use crate::catalog::Catalog;
use crate::heap::{HeapError, HeapPage};
use crate::storage::HeapPageId;
use crate::tx::TransactionId;

/// Lock intent for a page access.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permissions {
    /// Shared read access.
    ReadOnly,
    /// Exclusive read-write access.
    ReadWrite,
}

/// A pool-owned page shared between the pool and its callers.
pub type SharedPage = Arc<RwLock<HeapPage>>;

/// Page access interface required of the buffer pool collaborator.
///
/// `get_page` must be idempotent within a transaction: fetching the same
/// page twice returns the same shared instance, so mutations through one
/// handle are visible through the other. Implementations may fail any fetch
/// with [`HeapError::TransactionAborted`]; the core propagates it to the
/// consumer and releases its resources on the way out.
pub trait BufferPool: Send + Sync {
    /// Fetches a page on behalf of `tid` with the given lock intent.
    fn get_page(
        &self,
        tid: TransactionId,
        pid: HeapPageId,
        perm: Permissions,
    ) -> Result<SharedPage, HeapError>;
}

/// Minimal non-evicting buffer pool backed by a [`Catalog`].
///
/// A cache miss reads the page through the owning table's heap file; a hit
/// returns the already shared instance, which keeps dirty pages visible to
/// later readers. Nothing is ever evicted or written back, and the lock
/// intent is not enforced between transactions.
pub struct MemoryPool {
    catalog: Arc<Catalog>,
    pages: RwLock<HashMap<HeapPageId, SharedPage>>,
}

impl MemoryPool {
    /// Creates an empty pool over `catalog`.
    pub fn new(catalog: Arc<Catalog>) -> Self {
        Self {
            catalog,
            pages: RwLock::new(HashMap::new()),
        }
    }

    /// Returns the number of cached pages.
    pub fn cached_pages(&self) -> usize {
        self.pages.read().len()
    }

    /// Drops a page from the cache, if present.
    ///
    /// The next fetch re-reads it from disk; unwritten changes are lost,
    /// which mirrors what eviction of a clean page would do.
    pub fn evict(&self, pid: HeapPageId) {
        self.pages.write().remove(&pid);
    }
}

impl BufferPool for MemoryPool {
    fn get_page(
        &self,
        _tid: TransactionId,
        pid: HeapPageId,
        _perm: Permissions,
    ) -> Result<SharedPage, HeapError> {
        if let Some(page) = self.pages.read().get(&pid) {
            return Ok(page.clone());
        }

        let file = self.catalog.file(pid.table_id)?;
        let page = Arc::new(RwLock::new(file.read_page(pid)?));
        trace!("pool miss: loaded page {}", pid);

        // Another thread may have loaded the page in the meantime; keep the
        // first instance so all callers share one page.
        let mut pages = self.pages.write();
        Ok(pages.entry(pid).or_insert(page).clone())
    }
}
