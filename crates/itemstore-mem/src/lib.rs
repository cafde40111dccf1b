//! In-memory backend for itemstore.
//!
//! Items live in a map per table behind one mutex. No history is kept: an
//! accepted update or delete replaces or removes the stored revision. This is
//! the reference realisation the persistent backends are checked against.

mod index;
mod table;

use std::sync::Arc;

use itemstore_core::{Backend, Database, Record, Result, Schema, TableRef};

pub use index::MemIndex;
pub use table::MemTable;

/// Backend producing [`MemTable`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct MemBackend;

impl Backend for MemBackend {
  type Table<R: Record> = MemTable<R>;

  fn kind(&self) -> &'static str { "memory" }

  fn open_table<R: Record>(
    &self,
    table: TableRef,
    schema: Schema<R>,
  ) -> Result<Arc<MemTable<R>>> {
    Ok(Arc::new(MemTable::new(table, schema)))
  }
}

/// A new, empty in-memory database.
pub fn open(name: impl Into<String>) -> Database<MemBackend> {
  Database::new(name, MemBackend)
}

#[cfg(test)]
mod tests;
