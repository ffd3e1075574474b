//! Aggregation functions and accumulators.
//!
//! An [`Aggregator`] consumes a child's tuples one at a time
//! ([`merge`](Aggregator::merge)) and produces one output tuple per group
//! ([`results`](Aggregator::results)). Grouping is by field-value equality;
//! `group_by: None` accumulates every row under a single absent key and
//! yields a single output row.
//!
//! Memory is proportional to the number of distinct groups.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::datum::{Type, Value};
use crate::tuple::{FieldDef, Tuple, TupleDesc};

use super::error::ExecutorError;

/// Aggregation operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateOp {
    Min,
    Max,
    Sum,
    Avg,
    Count,
}

impl fmt::Display for AggregateOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AggregateOp::Min => "min",
            AggregateOp::Max => "max",
            AggregateOp::Sum => "sum",
            AggregateOp::Avg => "avg",
            AggregateOp::Count => "count",
        };
        write!(f, "{}", s)
    }
}

/// Stateful grouped accumulator.
///
/// Lifecycle: feed every input tuple through `merge`, then read the final
/// per-group rows from `results`. An aggregator is single-use; the
/// aggregate operator builds a fresh one on every `open`.
pub trait Aggregator: Send {
    /// Folds one input tuple into its group.
    fn merge(&mut self, tuple: &Tuple) -> Result<(), ExecutorError>;

    /// Produces one output tuple per group, in unspecified group order.
    ///
    /// Grouped output rows are `(group value, aggregate value)`; ungrouped
    /// output is a single `(aggregate value)` row. No input yields no rows.
    fn results(&self) -> Result<Vec<Tuple>, ExecutorError>;

    /// Returns the output row descriptor.
    fn output_desc(&self) -> &Arc<TupleDesc>;
}

/// Builds the aggregator for `op` over `afield`, dispatching on the
/// aggregate field's type.
///
/// # Errors
///
/// Returns `FieldIndexOutOfBounds` for a bad field index and
/// `UnsupportedAggregate` for an operator the field type does not support.
pub fn build_aggregator(
    child_desc: &TupleDesc,
    afield: usize,
    group_by: Option<usize>,
    op: AggregateOp,
) -> Result<Box<dyn Aggregator>, ExecutorError> {
    let ty = child_desc
        .field_type(afield)
        .ok_or(ExecutorError::FieldIndexOutOfBounds {
            index: afield,
            len: child_desc.num_fields(),
        })?;
    match ty {
        Type::Int => Ok(Box::new(IntAggregator::new(
            child_desc, afield, group_by, op,
        )?)),
        Type::Varchar(_) => Ok(Box::new(StrAggregator::new(
            child_desc, afield, group_by, op,
        )?)),
    }
}

/// Builds the output descriptor shared by both aggregators: the group
/// column (when grouping) followed by an `Int` column named `op(afield)`.
fn output_desc(
    child_desc: &TupleDesc,
    afield: usize,
    group_by: Option<usize>,
    op: AggregateOp,
) -> Result<Arc<TupleDesc>, ExecutorError> {
    let aname = child_desc.field_name(afield).unwrap_or_default();
    let agg_field = FieldDef::named(Type::Int, format!("{}({})", op, aname));

    let fields = match group_by {
        None => vec![agg_field],
        Some(g) => {
            let gtype = *child_desc
                .field_type(g)
                .ok_or(ExecutorError::FieldIndexOutOfBounds {
                    index: g,
                    len: child_desc.num_fields(),
                })?;
            let group_field = FieldDef {
                ty: gtype,
                name: child_desc.field_name(g).map(str::to_string),
            };
            vec![group_field, agg_field]
        }
    };
    Ok(Arc::new(TupleDesc::new(fields)))
}

/// Extracts the grouping key for one input tuple.
fn group_key(tuple: &Tuple, group_by: Option<usize>) -> Result<Option<Value>, ExecutorError> {
    match group_by {
        None => Ok(None),
        Some(g) => Ok(Some(
            tuple
                .value(g)
                .ok_or(ExecutorError::FieldIndexOutOfBounds {
                    index: g,
                    len: tuple.values().len(),
                })?
                .clone(),
        )),
    }
}

/// Running state for one integer group.
struct IntState {
    count: i32,
    sum: i32,
    min: i32,
    max: i32,
}

impl IntState {
    fn new() -> Self {
        Self {
            count: 0,
            sum: 0,
            min: i32::MAX,
            max: i32::MIN,
        }
    }

    fn update(&mut self, value: i32) {
        self.count += 1;
        // 32-bit accumulation: SUM (and therefore AVG) wraps silently on
        // overflow.
        self.sum = self.sum.wrapping_add(value);
        self.min = self.min.min(value);
        self.max = self.max.max(value);
    }

    fn emit(&self, op: AggregateOp) -> i32 {
        match op {
            AggregateOp::Count => self.count,
            AggregateOp::Sum => self.sum,
            AggregateOp::Avg => self.sum / self.count,
            AggregateOp::Min => self.min,
            AggregateOp::Max => self.max,
        }
    }
}

/// Grouped aggregation over an integer field. Supports every
/// [`AggregateOp`]; AVG is integer division of the running sum by the
/// count, truncated toward zero.
pub struct IntAggregator {
    afield: usize,
    group_by: Option<usize>,
    op: AggregateOp,
    groups: HashMap<Option<Value>, IntState>,
    desc: Arc<TupleDesc>,
}

impl IntAggregator {
    /// Creates an aggregator over integer field `afield`.
    pub fn new(
        child_desc: &TupleDesc,
        afield: usize,
        group_by: Option<usize>,
        op: AggregateOp,
    ) -> Result<Self, ExecutorError> {
        match child_desc.field_type(afield) {
            Some(Type::Int) => {}
            Some(ty) => {
                return Err(ExecutorError::TypeMismatch {
                    expected: "int aggregate field".into(),
                    found: ty.to_string(),
                });
            }
            None => {
                return Err(ExecutorError::FieldIndexOutOfBounds {
                    index: afield,
                    len: child_desc.num_fields(),
                });
            }
        }
        Ok(Self {
            afield,
            group_by,
            op,
            groups: HashMap::new(),
            desc: output_desc(child_desc, afield, group_by, op)?,
        })
    }
}

impl Aggregator for IntAggregator {
    fn merge(&mut self, tuple: &Tuple) -> Result<(), ExecutorError> {
        let value = match tuple.value(self.afield) {
            Some(Value::Int(v)) => *v,
            Some(other) => {
                return Err(ExecutorError::TypeMismatch {
                    expected: "int aggregate field".into(),
                    found: other.to_string(),
                });
            }
            None => {
                return Err(ExecutorError::FieldIndexOutOfBounds {
                    index: self.afield,
                    len: tuple.values().len(),
                });
            }
        };
        let key = group_key(tuple, self.group_by)?;
        self.groups.entry(key).or_insert_with(IntState::new).update(value);
        Ok(())
    }

    fn results(&self) -> Result<Vec<Tuple>, ExecutorError> {
        let mut out = Vec::with_capacity(self.groups.len());
        for (key, state) in &self.groups {
            let agg = Value::Int(state.emit(self.op));
            let values = match key {
                None => vec![agg],
                Some(group) => vec![group.clone(), agg],
            };
            out.push(Tuple::new(self.desc.clone(), values)?);
        }
        Ok(out)
    }

    fn output_desc(&self) -> &Arc<TupleDesc> {
        &self.desc
    }
}

/// Grouped aggregation over a string field. Only COUNT is defined for
/// strings; any other operator fails at construction.
pub struct StrAggregator {
    afield: usize,
    group_by: Option<usize>,
    counts: HashMap<Option<Value>, i32>,
    desc: Arc<TupleDesc>,
}

impl StrAggregator {
    /// Creates a COUNT aggregator over string field `afield`.
    ///
    /// # Errors
    ///
    /// Returns `UnsupportedAggregate` for any operator other than
    /// [`AggregateOp::Count`].
    pub fn new(
        child_desc: &TupleDesc,
        afield: usize,
        group_by: Option<usize>,
        op: AggregateOp,
    ) -> Result<Self, ExecutorError> {
        let ty = match child_desc.field_type(afield) {
            Some(ty @ Type::Varchar(_)) => *ty,
            Some(ty) => {
                return Err(ExecutorError::TypeMismatch {
                    expected: "varchar aggregate field".into(),
                    found: ty.to_string(),
                });
            }
            None => {
                return Err(ExecutorError::FieldIndexOutOfBounds {
                    index: afield,
                    len: child_desc.num_fields(),
                });
            }
        };
        if op != AggregateOp::Count {
            return Err(ExecutorError::UnsupportedAggregate { op, ty });
        }
        Ok(Self {
            afield,
            group_by,
            counts: HashMap::new(),
            desc: output_desc(child_desc, afield, group_by, op)?,
        })
    }
}

impl Aggregator for StrAggregator {
    fn merge(&mut self, tuple: &Tuple) -> Result<(), ExecutorError> {
        match tuple.value(self.afield) {
            Some(Value::Varchar(_)) => {}
            Some(other) => {
                return Err(ExecutorError::TypeMismatch {
                    expected: "varchar aggregate field".into(),
                    found: other.to_string(),
                });
            }
            None => {
                return Err(ExecutorError::FieldIndexOutOfBounds {
                    index: self.afield,
                    len: tuple.values().len(),
                });
            }
        }
        let key = group_key(tuple, self.group_by)?;
        *self.counts.entry(key).or_insert(0) += 1;
        Ok(())
    }

    fn results(&self) -> Result<Vec<Tuple>, ExecutorError> {
        let mut out = Vec::with_capacity(self.counts.len());
        for (key, count) in &self.counts {
            let agg = Value::Int(*count);
            let values = match key {
                None => vec![agg],
                Some(group) => vec![group.clone(), agg],
            };
            out.push(Tuple::new(self.desc.clone(), values)?);
        }
        Ok(out)
    }

    fn output_desc(&self) -> &Arc<TupleDesc> {
        &self.desc
    }
}
