//! heapdb: a heap-file storage engine with a pull-based query executor.
//!
//! The crate has two halves. The storage half ([`storage`], [`heap`]) stores
//! table rows in fixed-size pages inside a single backing file per table,
//! using a bitmap-indexed slotted page format with byte-exact serialization.
//! The execution half ([`executor`]) evaluates queries as a tree of pull-based
//! operators (sequential scan, filter, nested-loops join, grouped aggregation)
//! that produce rows one at a time.
//!
//! Page caching and locking live behind the narrow [`buffer::BufferPool`]
//! trait; the crate ships a minimal non-evicting [`buffer::MemoryPool`] for
//! embedding and tests, and expects production deployments to supply their
//! own implementation.

pub mod buffer;
pub mod catalog;
pub mod datum;
pub mod executor;
pub mod heap;
pub mod storage;
pub mod tuple;
pub mod tx;
