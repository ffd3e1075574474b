//! Executor-specific errors.

use std::fmt;

use crate::datum::{SerializationError, Type};
use crate::heap::HeapError;

use super::aggregate::AggregateOp;

/// Errors that can occur while building or running an operator tree.
#[derive(Debug)]
pub enum ExecutorError {
    /// `next`, `has_next`, or `rewind` was called on an operator that is not
    /// open (never opened, or already closed).
    NotOpen,

    /// `next` was called past the end of the sequence.
    NoMoreTuples,

    /// `set_children` was called with the wrong number of children.
    WrongChildCount {
        /// Children the operator requires.
        expected: usize,
        /// Children provided.
        actual: usize,
    },

    /// A predicate or aggregate referenced a field index past the end of
    /// the tuple.
    FieldIndexOutOfBounds {
        /// Referenced index.
        index: usize,
        /// Number of fields in the tuple.
        len: usize,
    },

    /// The aggregate operator is not defined for the aggregate field's type.
    UnsupportedAggregate {
        /// Requested aggregate operator.
        op: AggregateOp,
        /// Type of the aggregate field.
        ty: Type,
    },

    /// A field value had an unexpected type at evaluation time.
    TypeMismatch {
        /// Description of what was expected.
        expected: String,
        /// Description of what was found.
        found: String,
    },

    /// Failure constructing an output tuple.
    Serialization(SerializationError),

    /// Storage or buffer pool failure underneath a scan or write.
    Heap(HeapError),
}

impl fmt::Display for ExecutorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutorError::NotOpen => write!(f, "operator is not open"),
            ExecutorError::NoMoreTuples => write!(f, "no more tuples"),
            ExecutorError::WrongChildCount { expected, actual } => {
                write!(f, "expected {} children, got {}", expected, actual)
            }
            ExecutorError::FieldIndexOutOfBounds { index, len } => {
                write!(
                    f,
                    "field index {} out of bounds for tuple with {} fields",
                    index, len
                )
            }
            ExecutorError::UnsupportedAggregate { op, ty } => {
                write!(f, "aggregate {} is not defined for type {}", op, ty)
            }
            ExecutorError::TypeMismatch { expected, found } => {
                write!(f, "type mismatch: expected {}, found {}", expected, found)
            }
            ExecutorError::Serialization(e) => write!(f, "{}", e),
            ExecutorError::Heap(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for ExecutorError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ExecutorError::Serialization(e) => Some(e),
            ExecutorError::Heap(e) => Some(e),
            _ => None,
        }
    }
}

impl From<SerializationError> for ExecutorError {
    fn from(e: SerializationError) -> Self {
        ExecutorError::Serialization(e)
    }
}

impl From<HeapError> for ExecutorError {
    fn from(e: HeapError) -> Self {
        ExecutorError::Heap(e)
    }
}
