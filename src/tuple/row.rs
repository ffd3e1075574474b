//! Tuples (rows).

use std::fmt;
use std::sync::Arc;

use bytes::{Buf, BufMut};

use crate::datum::{SerializationError, Value};
use crate::storage::RecordId;

use super::desc::TupleDesc;

/// A row conforming to a [`TupleDesc`], optionally located on a page.
///
/// Values are validated against the descriptor at construction and on every
/// [`set_value`](Tuple::set_value), so a tuple can always be serialized
/// without error and page round-trips are exact.
///
/// The serialized form is the concatenation of the fields in descriptor
/// order, `desc.byte_size()` bytes in total.
#[derive(Debug, Clone, PartialEq)]
pub struct Tuple {
    desc: Arc<TupleDesc>,
    values: Vec<Value>,
    record_id: Option<RecordId>,
}

impl Tuple {
    /// Creates a tuple from a descriptor and matching values.
    ///
    /// # Errors
    ///
    /// Returns `InvalidFormat` on an arity mismatch, `TypeMismatch` when a
    /// value has the wrong variant for its column, and `ValueTooWide` when a
    /// string exceeds its column width.
    pub fn new(desc: Arc<TupleDesc>, values: Vec<Value>) -> Result<Self, SerializationError> {
        if values.len() != desc.num_fields() {
            return Err(SerializationError::InvalidFormat(format!(
                "expected {} values, got {}",
                desc.num_fields(),
                values.len()
            )));
        }
        for (i, value) in values.iter().enumerate() {
            check_value(&desc, i, value)?;
        }
        Ok(Self {
            desc,
            values,
            record_id: None,
        })
    }

    /// Returns the tuple's descriptor.
    pub fn desc(&self) -> &Arc<TupleDesc> {
        &self.desc
    }

    /// Returns the value of field `i`, or `None` if out of range.
    pub fn value(&self, i: usize) -> Option<&Value> {
        self.values.get(i)
    }

    /// Returns all values in descriptor order.
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Replaces the value of field `i`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidFormat` for an out-of-range index, and the same
    /// validation errors as [`Tuple::new`] for a non-conforming value.
    pub fn set_value(&mut self, i: usize, value: Value) -> Result<(), SerializationError> {
        if i >= self.values.len() {
            return Err(SerializationError::InvalidFormat(format!(
                "field index {} out of range for {} fields",
                i,
                self.values.len()
            )));
        }
        check_value(&self.desc, i, &value)?;
        self.values[i] = value;
        Ok(())
    }

    /// Returns the tuple's on-page location, if it has one.
    pub fn record_id(&self) -> Option<RecordId> {
        self.record_id
    }

    /// Sets or clears the tuple's on-page location.
    pub fn set_record_id(&mut self, record_id: Option<RecordId>) {
        self.record_id = record_id;
    }

    /// Serializes this tuple into `buf`, writing exactly
    /// `desc.byte_size()` bytes.
    pub fn write_to(&self, buf: &mut impl BufMut) -> Result<(), SerializationError> {
        for (i, value) in self.values.iter().enumerate() {
            match self.desc.field_type(i) {
                Some(ty) => value.write(ty, buf)?,
                None => {
                    return Err(SerializationError::InvalidFormat(format!(
                        "descriptor has no field {}",
                        i
                    )));
                }
            }
        }
        Ok(())
    }

    /// Deserializes a tuple from `buf`, consuming exactly
    /// `desc.byte_size()` bytes.
    pub fn read_from(
        buf: &mut impl Buf,
        desc: Arc<TupleDesc>,
    ) -> Result<Self, SerializationError> {
        let mut values = Vec::with_capacity(desc.num_fields());
        for field in desc.fields() {
            values.push(Value::read(buf, &field.ty)?);
        }
        Ok(Self {
            desc,
            values,
            record_id: None,
        })
    }
}

fn check_value(desc: &TupleDesc, i: usize, value: &Value) -> Result<(), SerializationError> {
    match desc.field_type(i) {
        Some(ty) if ty.admits(value) => Ok(()),
        Some(ty) => match (ty, value) {
            (crate::datum::Type::Varchar(max), Value::Varchar(s)) => {
                Err(SerializationError::ValueTooWide {
                    max: *max,
                    len: s.len(),
                })
            }
            _ => Err(SerializationError::TypeMismatch { expected: *ty }),
        },
        None => Err(SerializationError::InvalidFormat(format!(
            "descriptor has no field {}",
            i
        ))),
    }
}

impl fmt::Display for Tuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, value) in self.values.iter().enumerate() {
            if i > 0 {
                write!(f, "\t")?;
            }
            write!(f, "{}", value)?;
        }
        Ok(())
    }
}
