//! Operator tree nodes.
//!
//! [`Operator`] owns the lifecycle every node shares — an open flag and a
//! one-tuple lookahead that makes `has_next` idempotent — and dispatches the
//! per-node work over a private enum. Nodes own their children, so a tree is
//! a plain recursive value with no back-pointers.
//!
//! Lifecycle contract: `open` before iteration (children are opened first,
//! then the node marks itself open; `close` releases in the reverse order),
//! `has_next`/`next`/`rewind` only while open, `close` safe at any point and
//! on partially opened trees.

use std::sync::Arc;

use crate::buffer::BufferPool;
use crate::heap::{HeapFile, HeapScan};
use crate::tuple::{Tuple, TupleDesc};
use crate::tx::TransactionId;

use super::aggregate::{build_aggregator, AggregateOp, Aggregator};
use super::error::ExecutorError;
use super::predicate::{JoinPredicate, Predicate};

/// A node in a pull-based operator tree.
pub struct Operator {
    kind: OpKind,
    open: bool,
    lookahead: Option<Tuple>,
}

enum OpKind {
    SeqScan(SeqScan),
    Filter(Filter),
    Join(Join),
    Aggregate(Aggregate),
}

/// Sequential scan over one table's heap file.
struct SeqScan {
    scan: HeapScan,
    desc: Arc<TupleDesc>,
}

/// Filters child tuples by a selection predicate.
struct Filter {
    predicate: Predicate,
    child: Box<Operator>,
}

/// Nested-loops join of two children.
struct Join {
    predicate: JoinPredicate,
    left: Box<Operator>,
    right: Box<Operator>,
    /// The left row currently paired against the right side.
    current_left: Option<Tuple>,
    /// Output descriptor, cached while open.
    out_desc: Arc<TupleDesc>,
}

/// Blocking grouped aggregation over one child.
struct Aggregate {
    child: Box<Operator>,
    afield: usize,
    group_by: Option<usize>,
    op: AggregateOp,
    aggregator: Box<dyn Aggregator>,
    results: Vec<Tuple>,
    cursor: usize,
}

impl Operator {
    fn new(kind: OpKind) -> Self {
        Self {
            kind,
            open: false,
            lookahead: None,
        }
    }

    /// Creates a sequential scan over `file`, fetching pages through `pool`
    /// on behalf of `tid`.
    pub fn seq_scan(
        file: Arc<HeapFile>,
        pool: Arc<dyn BufferPool>,
        tid: TransactionId,
    ) -> Operator {
        let desc = file.desc().clone();
        Operator::new(OpKind::SeqScan(SeqScan {
            scan: HeapScan::new(file, pool, tid),
            desc,
        }))
    }

    /// Creates a filter over `child`.
    pub fn filter(predicate: Predicate, child: Operator) -> Operator {
        Operator::new(OpKind::Filter(Filter {
            predicate,
            child: Box::new(child),
        }))
    }

    /// Creates a nested-loops join of `left` and `right`.
    ///
    /// The output schema is the concatenation of the children's schemas;
    /// rows come out ordered by (left position, right position).
    pub fn join(predicate: JoinPredicate, left: Operator, right: Operator) -> Operator {
        let out_desc = Arc::new(TupleDesc::merge(&left.tuple_desc(), &right.tuple_desc()));
        Operator::new(OpKind::Join(Join {
            predicate,
            left: Box::new(left),
            right: Box::new(right),
            current_left: None,
            out_desc,
        }))
    }

    /// Creates a grouped aggregation over `child`.
    ///
    /// `afield` is the aggregated field, `group_by` the optional grouping
    /// field (`None` collapses all rows into one group), `op` the
    /// aggregation operator. Evaluation is two-phase: `open` drains the
    /// child completely before the first row is available.
    ///
    /// # Errors
    ///
    /// Fails with `UnsupportedAggregate` or `FieldIndexOutOfBounds` when
    /// `op` is not defined for the aggregate field.
    pub fn aggregate(
        child: Operator,
        afield: usize,
        group_by: Option<usize>,
        op: AggregateOp,
    ) -> Result<Operator, ExecutorError> {
        let aggregator = build_aggregator(&child.tuple_desc(), afield, group_by, op)?;
        Ok(Operator::new(OpKind::Aggregate(Aggregate {
            child: Box::new(child),
            afield,
            group_by,
            op,
            aggregator,
            results: Vec::new(),
            cursor: 0,
        })))
    }

    /// Opens this node: children and resources first, then the node itself.
    pub fn open(&mut self) -> Result<(), ExecutorError> {
        self.kind.open()?;
        self.open = true;
        Ok(())
    }

    /// Returns whether another tuple is available.
    ///
    /// Idempotent between `next` calls: the produced tuple is buffered.
    ///
    /// # Errors
    ///
    /// Returns `NotOpen` before `open` or after `close`.
    pub fn has_next(&mut self) -> Result<bool, ExecutorError> {
        if !self.open {
            return Err(ExecutorError::NotOpen);
        }
        if self.lookahead.is_none() {
            self.lookahead = self.kind.fetch_next()?;
        }
        Ok(self.lookahead.is_some())
    }

    /// Returns the next tuple.
    ///
    /// # Errors
    ///
    /// Returns `NotOpen` before `open` or after `close`, and `NoMoreTuples`
    /// past the end of the sequence.
    pub fn next(&mut self) -> Result<Tuple, ExecutorError> {
        if !self.open {
            return Err(ExecutorError::NotOpen);
        }
        if self.lookahead.is_none() {
            self.lookahead = self.kind.fetch_next()?;
        }
        self.lookahead.take().ok_or(ExecutorError::NoMoreTuples)
    }

    /// Restarts iteration from the beginning. Defined while open.
    pub fn rewind(&mut self) -> Result<(), ExecutorError> {
        if !self.open {
            return Err(ExecutorError::NotOpen);
        }
        self.lookahead = None;
        self.kind.rewind()
    }

    /// Closes this node and, recursively, its children.
    ///
    /// Safe to call repeatedly and on partially opened trees.
    pub fn close(&mut self) {
        self.open = false;
        self.lookahead = None;
        self.kind.close();
    }

    /// Returns the output row descriptor of this node.
    pub fn tuple_desc(&self) -> Arc<TupleDesc> {
        match &self.kind {
            OpKind::SeqScan(scan) => scan.desc.clone(),
            OpKind::Filter(filter) => filter.child.tuple_desc(),
            OpKind::Join(join) => Arc::new(TupleDesc::merge(
                &join.left.tuple_desc(),
                &join.right.tuple_desc(),
            )),
            OpKind::Aggregate(agg) => agg.aggregator.output_desc().clone(),
        }
    }

    /// Returns this node's children in order.
    pub fn children(&self) -> Vec<&Operator> {
        match &self.kind {
            OpKind::SeqScan(_) => vec![],
            OpKind::Filter(filter) => vec![filter.child.as_ref()],
            OpKind::Join(join) => vec![join.left.as_ref(), join.right.as_ref()],
            OpKind::Aggregate(agg) => vec![agg.child.as_ref()],
        }
    }

    /// Replaces this node's children.
    ///
    /// # Errors
    ///
    /// Returns `WrongChildCount` unless exactly the node's arity is given
    /// (scan 0, filter 1, aggregate 1, join 2).
    pub fn set_children(&mut self, children: Vec<Operator>) -> Result<(), ExecutorError> {
        let expected = match &self.kind {
            OpKind::SeqScan(_) => 0,
            OpKind::Filter(_) | OpKind::Aggregate(_) => 1,
            OpKind::Join(_) => 2,
        };
        if children.len() != expected {
            return Err(ExecutorError::WrongChildCount {
                expected,
                actual: children.len(),
            });
        }

        let mut children = children.into_iter();
        match &mut self.kind {
            OpKind::SeqScan(_) => {}
            OpKind::Filter(filter) => {
                if let Some(child) = children.next() {
                    filter.child = Box::new(child);
                }
            }
            OpKind::Join(join) => {
                if let Some(left) = children.next() {
                    join.left = Box::new(left);
                }
                if let Some(right) = children.next() {
                    join.right = Box::new(right);
                }
                join.current_left = None;
            }
            OpKind::Aggregate(agg) => {
                if let Some(child) = children.next() {
                    agg.child = Box::new(child);
                }
            }
        }
        Ok(())
    }
}

impl OpKind {
    fn open(&mut self) -> Result<(), ExecutorError> {
        match self {
            OpKind::SeqScan(scan) => Ok(scan.scan.open()?),
            OpKind::Filter(filter) => filter.child.open(),
            OpKind::Join(join) => {
                join.left.open()?;
                join.right.open()?;
                join.current_left = None;
                join.out_desc = Arc::new(TupleDesc::merge(
                    &join.left.tuple_desc(),
                    &join.right.tuple_desc(),
                ));
                Ok(())
            }
            OpKind::Aggregate(agg) => {
                agg.child.open()?;
                // Fresh accumulator per open: a reopened child replays its
                // rows from the start.
                agg.aggregator = build_aggregator(
                    &agg.child.tuple_desc(),
                    agg.afield,
                    agg.group_by,
                    agg.op,
                )?;
                while agg.child.has_next()? {
                    let tuple = agg.child.next()?;
                    agg.aggregator.merge(&tuple)?;
                }
                agg.results = agg.aggregator.results()?;
                agg.cursor = 0;
                Ok(())
            }
        }
    }

    fn fetch_next(&mut self) -> Result<Option<Tuple>, ExecutorError> {
        match self {
            OpKind::SeqScan(scan) => {
                if scan.scan.has_next()? {
                    Ok(Some(scan.scan.next()?))
                } else {
                    Ok(None)
                }
            }
            OpKind::Filter(filter) => {
                while filter.child.has_next()? {
                    let tuple = filter.child.next()?;
                    if filter.predicate.eval(&tuple)? {
                        return Ok(Some(tuple));
                    }
                }
                Ok(None)
            }
            OpKind::Join(join) => join.fetch_next(),
            OpKind::Aggregate(agg) => {
                if agg.cursor < agg.results.len() {
                    let tuple = agg.results[agg.cursor].clone();
                    agg.cursor += 1;
                    Ok(Some(tuple))
                } else {
                    Ok(None)
                }
            }
        }
    }

    fn rewind(&mut self) -> Result<(), ExecutorError> {
        match self {
            OpKind::SeqScan(scan) => Ok(scan.scan.rewind()?),
            OpKind::Filter(filter) => filter.child.rewind(),
            OpKind::Join(join) => {
                join.left.rewind()?;
                join.right.rewind()?;
                join.current_left = None;
                Ok(())
            }
            OpKind::Aggregate(agg) => {
                // The aggregated results are already materialized; restart
                // the cursor without re-draining the child.
                agg.cursor = 0;
                Ok(())
            }
        }
    }

    fn close(&mut self) {
        match self {
            OpKind::SeqScan(scan) => scan.scan.close(),
            OpKind::Filter(filter) => filter.child.close(),
            OpKind::Join(join) => {
                join.current_left = None;
                join.left.close();
                join.right.close();
            }
            OpKind::Aggregate(agg) => {
                agg.results = Vec::new();
                agg.cursor = 0;
                agg.child.close();
            }
        }
    }
}

impl Join {
    /// Advances the nested loops: for the cached left row, walk the right
    /// side; on right exhaustion, advance the left and rewind the right.
    fn fetch_next(&mut self) -> Result<Option<Tuple>, ExecutorError> {
        let mut left = match self.current_left.take() {
            Some(tuple) => tuple,
            None => {
                if !self.left.has_next()? {
                    return Ok(None);
                }
                self.left.next()?
            }
        };

        loop {
            while self.right.has_next()? {
                let right = self.right.next()?;
                if self.predicate.eval(&left, &right)? {
                    let joined = concat_tuples(&left, &right, self.out_desc.clone())?;
                    self.current_left = Some(left);
                    return Ok(Some(joined));
                }
            }
            if !self.left.has_next()? {
                return Ok(None);
            }
            left = self.left.next()?;
            self.right.rewind()?;
        }
    }
}

/// Concatenates a left and right tuple positionally under `desc`.
fn concat_tuples(
    left: &Tuple,
    right: &Tuple,
    desc: Arc<TupleDesc>,
) -> Result<Tuple, ExecutorError> {
    let mut values = Vec::with_capacity(left.values().len() + right.values().len());
    values.extend(left.values().iter().cloned());
    values.extend(right.values().iter().cloned());
    Ok(Tuple::new(desc, values)?)
}
