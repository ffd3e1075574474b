//! Pull-based query execution.
//!
//! Queries run as a tree of [`Operator`]s in the volcano style: each node
//! produces tuples one at a time on demand, pulling from its children. The
//! shared lifecycle (`open` / `has_next` / `next` / `rewind` / `close`) lives
//! in [`Operator`]; the per-node algorithms are enum-dispatched, which keeps
//! the small, fixed set of node types free of boxing and virtual calls.
//!
//! Node types and their child arity:
//!
//! - sequential scan over a heap file (0 children)
//! - filter by a [`Predicate`] (1 child)
//! - nested-loops join on a [`JoinPredicate`] (2 children)
//! - grouped aggregation (1 child, blocking: the child is drained on `open`)

pub mod aggregate;
pub mod error;
pub mod node;
pub mod predicate;

pub use aggregate::{AggregateOp, Aggregator, IntAggregator, StrAggregator};
pub use error::ExecutorError;
pub use node::Operator;
pub use predicate::{CmpOp, JoinPredicate, Predicate};
