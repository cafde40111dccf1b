//! The table contract every backend realises.
//!
//! Backends differ in how they persist items (in place, as rotated files or
//! as insert-only rows), but observable behaviour must not: the same calls
//! fail with the same [`Error`](crate::Error) variants and revision numbers
//! advance identically. The revision rule itself lives in [`crate::occ`].

use std::{any::Any, collections::HashMap, sync::Arc};

use crate::{
  Result,
  index::Index,
  item::{Item, TableRef},
  record::{Record, Schema},
};

// ─── Record-agnostic surface ─────────────────────────────────────────────────

/// Operations that do not depend on the record type; lets a
/// [`Database`](crate::Database) list tables of different shapes together.
pub trait AnyTable: Send + Sync {
  fn table_ref(&self) -> &TableRef;

  fn name(&self) -> &str { self.table_ref().name() }

  fn field_names(&self) -> Vec<&'static str>;

  fn index_names(&self) -> Vec<String>;

  /// Number of live (non-deleted) items.
  fn count(&self) -> Result<usize>;

  /// Remove every live item. Whether history survives depends on the
  /// backend.
  fn del_all(&self) -> Result<()>;

  fn as_any(&self) -> &dyn Any;
}

// ─── Table ───────────────────────────────────────────────────────────────────

/// A revision-aware collection of items of one record shape.
pub trait Table<R: Record>: AnyTable {
  fn schema(&self) -> &Schema<R>;

  /// Store a new item at revision 1. Fails with `Validation` or, before
  /// anything is written, with `DuplicateKey`.
  fn add_item(&self, data: R) -> Result<Item<R>>;

  /// Replace the current revision with `candidate`, whose revision number
  /// must be exactly one past the stored one.
  fn upd_item(&self, candidate: Item<R>) -> Result<Item<R>>;

  /// The latest live revision, or `None` if absent or deleted.
  fn get_item(&self, uid: &str) -> Result<Option<Item<R>>>;

  /// Delete the item; `candidate` follows the same revision rule as
  /// [`Table::upd_item`].
  fn del_item(&self, candidate: Item<R>) -> Result<()>;

  /// Point-in-time snapshot of all live items keyed by uid.
  fn items(&self) -> Result<HashMap<String, Item<R>>>;

  /// Declare a unique index over `fields`, backfilled from live items.
  fn index(&self, name: &str, fields: &[&str]) -> Result<Arc<dyn Index<R>>>;

  /// Update from the caller's latest copy.
  fn update(&self, current: &Item<R>, data: R) -> Result<Item<R>> {
    self.upd_item(current.next(data))
  }

  /// Delete from the caller's latest copy.
  fn delete(&self, current: &Item<R>) -> Result<()> {
    self.del_item(current.deletion())
  }
}
