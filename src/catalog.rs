//! Table registry.
//!
//! The catalog maps table ids to their heap files so that page fetches and
//! scans can resolve a [`HeapPageId`](crate::storage::HeapPageId) back to
//! the owning file. Table ids are derived from file paths
//! (see [`HeapFile::open`](crate::heap::HeapFile::open)); the catalog
//! refuses duplicates, which also catches the unlikely path-hash collision.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::heap::HeapFile;
use crate::tuple::TupleDesc;

/// Errors from catalog lookups and registration.
#[derive(Debug)]
pub enum CatalogError {
    /// No table is registered under the given id.
    TableNotFound(u64),
    /// A table with the given id is already registered.
    DuplicateTable(u64),
}

impl fmt::Display for CatalogError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CatalogError::TableNotFound(id) => write!(f, "table {} not found", id),
            CatalogError::DuplicateTable(id) => {
                write!(f, "table {} is already registered", id)
            }
        }
    }
}

impl std::error::Error for CatalogError {}

/// In-memory table registry keyed by table id.
pub struct Catalog {
    tables: RwLock<HashMap<u64, Arc<HeapFile>>>,
}

impl Catalog {
    /// Creates an empty catalog.
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(HashMap::new()),
        }
    }

    /// Registers a heap file under its table id.
    ///
    /// # Errors
    ///
    /// Returns `DuplicateTable` if the id is already taken.
    pub fn register(&self, file: Arc<HeapFile>) -> Result<(), CatalogError> {
        let mut tables = self.tables.write();
        let table_id = file.table_id();
        if tables.contains_key(&table_id) {
            return Err(CatalogError::DuplicateTable(table_id));
        }
        tables.insert(table_id, file);
        Ok(())
    }

    /// Returns the heap file registered under `table_id`.
    pub fn file(&self, table_id: u64) -> Result<Arc<HeapFile>, CatalogError> {
        self.tables
            .read()
            .get(&table_id)
            .cloned()
            .ok_or(CatalogError::TableNotFound(table_id))
    }

    /// Returns the row descriptor of the table registered under `table_id`.
    pub fn tuple_desc(&self, table_id: u64) -> Result<Arc<TupleDesc>, CatalogError> {
        Ok(self.file(table_id)?.desc().clone())
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::new()
    }
}
