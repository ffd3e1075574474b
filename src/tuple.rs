//! Rows and schemas.
//!
//! - [`TupleDesc`]: ordered field descriptor (type + advisory name) with a
//!   fixed row width
//! - [`Tuple`]: a row of [`Value`](crate::datum::Value)s conforming to a
//!   descriptor, optionally located on a page by a
//!   [`RecordId`](crate::storage::RecordId)

pub mod desc;
pub mod row;

pub use desc::{FieldDef, TupleDesc};
pub use row::Tuple;
