//! Transaction identity.
//!
//! The core never interprets transaction ids; it only carries them so that an
//! external buffer pool / lock manager can attribute page accesses and dirty
//! marks to a transaction.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_TX_ID: AtomicU64 = AtomicU64::new(1);

/// Transaction ID (64-bit).
///
/// Ids are allocated sequentially starting from 1. Id 0 is reserved as
/// INVALID.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TransactionId(u64);

impl TransactionId {
    /// Invalid transaction ID (0).
    pub const INVALID: Self = Self(0);

    /// Creates a transaction ID from a raw value.
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Allocates a fresh, process-unique transaction ID.
    pub fn fresh() -> Self {
        Self(NEXT_TX_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the raw u64 value.
    pub const fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
