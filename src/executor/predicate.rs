//! Row predicates.
//!
//! [`Predicate`] tests one tuple against a constant; [`JoinPredicate`] tests
//! a pair of tuples field-against-field. Both are built from a [`CmpOp`].

use std::fmt;

use crate::datum::Value;
use crate::tuple::Tuple;

use super::error::ExecutorError;

/// Comparison operator for predicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Equals,
    GreaterThan,
    LessThan,
    LessThanOrEq,
    GreaterThanOrEq,
    /// Substring containment; defined for string operands only.
    Like,
    NotEquals,
}

impl CmpOp {
    /// Evaluates `lhs OP rhs`.
    ///
    /// The comparison is total and never fails: operands of different types
    /// are simply unequal (`Equals` is false, `NotEquals` is true, orderings
    /// are false), and `Like` on non-string operands is false.
    pub fn compare(&self, lhs: &Value, rhs: &Value) -> bool {
        match self {
            CmpOp::Equals => lhs == rhs,
            CmpOp::NotEquals => lhs != rhs,
            CmpOp::GreaterThan => Self::ordered(lhs, rhs, |o| o.is_gt()),
            CmpOp::LessThan => Self::ordered(lhs, rhs, |o| o.is_lt()),
            CmpOp::LessThanOrEq => Self::ordered(lhs, rhs, |o| o.is_le()),
            CmpOp::GreaterThanOrEq => Self::ordered(lhs, rhs, |o| o.is_ge()),
            CmpOp::Like => match (lhs, rhs) {
                (Value::Varchar(field), Value::Varchar(pattern)) => {
                    field.contains(pattern.as_str())
                }
                _ => false,
            },
        }
    }

    fn ordered(lhs: &Value, rhs: &Value, test: impl Fn(std::cmp::Ordering) -> bool) -> bool {
        match (lhs, rhs) {
            (Value::Int(a), Value::Int(b)) => test(a.cmp(b)),
            (Value::Varchar(a), Value::Varchar(b)) => test(a.cmp(b)),
            _ => false,
        }
    }
}

impl fmt::Display for CmpOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CmpOp::Equals => "=",
            CmpOp::GreaterThan => ">",
            CmpOp::LessThan => "<",
            CmpOp::LessThanOrEq => "<=",
            CmpOp::GreaterThanOrEq => ">=",
            CmpOp::Like => "LIKE",
            CmpOp::NotEquals => "<>",
        };
        write!(f, "{}", s)
    }
}

/// Selection predicate: `tuple.field(index) OP constant`.
#[derive(Debug, Clone)]
pub struct Predicate {
    field: usize,
    op: CmpOp,
    operand: Value,
}

impl Predicate {
    /// Creates a predicate comparing field `field` against `operand`.
    pub fn new(field: usize, op: CmpOp, operand: Value) -> Self {
        Self { field, op, operand }
    }

    /// Returns the tested field index.
    pub fn field(&self) -> usize {
        self.field
    }

    /// Returns the comparison operator.
    pub fn op(&self) -> CmpOp {
        self.op
    }

    /// Returns the constant operand.
    pub fn operand(&self) -> &Value {
        &self.operand
    }

    /// Evaluates this predicate against a tuple.
    ///
    /// # Errors
    ///
    /// Returns `FieldIndexOutOfBounds` when the field index does not exist
    /// in the tuple.
    pub fn eval(&self, tuple: &Tuple) -> Result<bool, ExecutorError> {
        let value = tuple
            .value(self.field)
            .ok_or(ExecutorError::FieldIndexOutOfBounds {
                index: self.field,
                len: tuple.values().len(),
            })?;
        Ok(self.op.compare(value, &self.operand))
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "f{} {} {}", self.field, self.op, self.operand)
    }
}

/// Join predicate: `left.field(index1) OP right.field(index2)`.
#[derive(Debug, Clone)]
pub struct JoinPredicate {
    field1: usize,
    op: CmpOp,
    field2: usize,
}

impl JoinPredicate {
    /// Creates a join predicate over a left and right field index.
    pub fn new(field1: usize, op: CmpOp, field2: usize) -> Self {
        Self { field1, op, field2 }
    }

    /// Returns the left field index.
    pub fn field1(&self) -> usize {
        self.field1
    }

    /// Returns the right field index.
    pub fn field2(&self) -> usize {
        self.field2
    }

    /// Returns the comparison operator.
    pub fn op(&self) -> CmpOp {
        self.op
    }

    /// Evaluates this predicate against a pair of tuples.
    ///
    /// # Errors
    ///
    /// Returns `FieldIndexOutOfBounds` when either field index does not
    /// exist in its tuple.
    pub fn eval(&self, left: &Tuple, right: &Tuple) -> Result<bool, ExecutorError> {
        let l = left
            .value(self.field1)
            .ok_or(ExecutorError::FieldIndexOutOfBounds {
                index: self.field1,
                len: left.values().len(),
            })?;
        let r = right
            .value(self.field2)
            .ok_or(ExecutorError::FieldIndexOutOfBounds {
                index: self.field2,
                len: right.values().len(),
            })?;
        Ok(self.op.compare(l, r))
    }
}

impl fmt::Display for JoinPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "left.f{} {} right.f{}", self.field1, self.op, self.field2)
    }
}
