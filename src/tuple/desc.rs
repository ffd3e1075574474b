//! Tuple descriptors (schemas).

use std::fmt;
use std::hash::{Hash, Hasher};

use crate::datum::Type;

/// One field of a schema: a type plus an optional, purely advisory name.
#[derive(Debug, Clone)]
pub struct FieldDef {
    /// Field type.
    pub ty: Type,
    /// Field name, if any. Names never affect descriptor equality.
    pub name: Option<String>,
}

impl FieldDef {
    /// Creates a named field.
    pub fn named(ty: Type, name: impl Into<String>) -> Self {
        Self {
            ty,
            name: Some(name.into()),
        }
    }

    /// Creates an anonymous field.
    pub fn unnamed(ty: Type) -> Self {
        Self { ty, name: None }
    }
}

/// Ordered schema of a tuple.
///
/// Because every [`Type`] has a fixed size, a descriptor implies a fixed row
/// width, given by [`byte_size()`](TupleDesc::byte_size).
///
/// Equality and hashing consider the type sequence only; field names are
/// advisory metadata.
#[derive(Debug, Clone)]
pub struct TupleDesc {
    fields: Vec<FieldDef>,
}

impl TupleDesc {
    /// Creates a descriptor from field definitions.
    pub fn new(fields: Vec<FieldDef>) -> Self {
        Self { fields }
    }

    /// Creates a descriptor of anonymous fields from a type list.
    pub fn from_types(types: impl IntoIterator<Item = Type>) -> Self {
        Self {
            fields: types.into_iter().map(FieldDef::unnamed).collect(),
        }
    }

    /// Returns the number of fields.
    pub fn num_fields(&self) -> usize {
        self.fields.len()
    }

    /// Returns the type of field `i`, or `None` if out of range.
    pub fn field_type(&self, i: usize) -> Option<&Type> {
        self.fields.get(i).map(|f| &f.ty)
    }

    /// Returns the name of field `i`, or `None` if out of range or unnamed.
    pub fn field_name(&self, i: usize) -> Option<&str> {
        self.fields.get(i).and_then(|f| f.name.as_deref())
    }

    /// Iterates over the field definitions in order.
    pub fn fields(&self) -> impl Iterator<Item = &FieldDef> {
        self.fields.iter()
    }

    /// Returns the serialized row width in bytes (sum of field sizes).
    pub fn byte_size(&self) -> usize {
        self.fields.iter().map(|f| f.ty.byte_size()).sum()
    }

    /// Concatenates two descriptors: all fields of `a` followed by all
    /// fields of `b`.
    pub fn merge(a: &TupleDesc, b: &TupleDesc) -> TupleDesc {
        let mut fields = Vec::with_capacity(a.fields.len() + b.fields.len());
        fields.extend(a.fields.iter().cloned());
        fields.extend(b.fields.iter().cloned());
        TupleDesc { fields }
    }
}

impl PartialEq for TupleDesc {
    fn eq(&self, other: &Self) -> bool {
        self.fields.len() == other.fields.len()
            && self
                .fields
                .iter()
                .zip(other.fields.iter())
                .all(|(a, b)| a.ty == b.ty)
    }
}

impl Eq for TupleDesc {}

impl Hash for TupleDesc {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for field in &self.fields {
            field.ty.hash(state);
        }
    }
}

impl fmt::Display for TupleDesc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, field) in self.fields.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            match &field.name {
                Some(name) => write!(f, "{} {}", name, field.ty)?,
                None => write!(f, "{}", field.ty)?,
            }
        }
        Ok(())
    }
}
