//! Items: an identity bound to a revision and a payload.
//!
//! Items are values. A mutation never edits one in place; it builds a
//! successor with the next revision number and hands it to the owning table,
//! which accepts it only if the caller's copy was still current.

use std::{fmt, sync::Arc};

use uuid::Uuid;

use crate::revision::Revision;

// ─── TableRef ────────────────────────────────────────────────────────────────

/// Identifies one table instance. Two tables with the same name in different
/// databases are different tables.
#[derive(Clone)]
pub struct TableRef {
  id:   Uuid,
  name: Arc<str>,
}

impl TableRef {
  pub fn new(name: &str) -> Self { Self { id: Uuid::new_v4(), name: name.into() } }

  pub fn id(&self) -> Uuid { self.id }

  pub fn name(&self) -> &str { &self.name }
}

impl PartialEq for TableRef {
  fn eq(&self, other: &Self) -> bool { self.id == other.id }
}

impl Eq for TableRef {}

impl fmt::Debug for TableRef {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}#{}", self.name, self.id.simple())
  }
}

// ─── Item ────────────────────────────────────────────────────────────────────

/// Generate a fresh globally unique item id.
pub fn new_uid() -> String { Uuid::new_v4().hyphenated().to_string() }

/// One revision of a stored item.
#[derive(Debug, Clone)]
pub struct Item<R> {
  table: TableRef,
  nid:   u64,
  uid:   String,
  rev:   Revision,
  data:  R,
}

impl<R> Item<R> {
  pub fn new(table: TableRef, nid: u64, uid: String, rev: Revision, data: R) -> Self {
    Self { table, nid, uid, rev, data }
  }

  /// The table that owns this item.
  pub fn table(&self) -> &TableRef { &self.table }

  /// Table-local sequence number, assigned once at creation.
  pub fn nid(&self) -> u64 { self.nid }

  /// Globally unique id, assigned once at creation.
  pub fn uid(&self) -> &str { &self.uid }

  pub fn rev(&self) -> Revision { self.rev }

  pub fn data(&self) -> &R { &self.data }

  pub fn into_data(self) -> R { self.data }

  /// The same item at another revision; used by backends when the stored
  /// timestamp is coarser than the one proposed.
  pub fn with_rev(self, rev: Revision) -> Self { Self { rev, ..self } }
}

impl<R: Clone> Item<R> {
  /// Candidate for an update: same identity, next revision, new payload.
  pub fn next(&self, data: R) -> Self {
    Self {
      table: self.table.clone(),
      nid: self.nid,
      uid: self.uid.clone(),
      rev: self.rev.next(),
      data,
    }
  }

  /// Candidate for a delete: same identity and payload, next revision.
  pub fn deletion(&self) -> Self { self.next(self.data.clone()) }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn table_refs_compare_by_instance() {
    let a = TableRef::new("users");
    let b = TableRef::new("users");
    assert_ne!(a, b);
    assert_eq!(a, a.clone());
  }

  #[test]
  fn next_keeps_identity_and_advances_revision() {
    let table = TableRef::new("users");
    let item = Item::new(table.clone(), 3, new_uid(), Revision::first(), "one");
    let upd = item.next("ONE");
    assert_eq!(upd.table(), &table);
    assert_eq!(upd.nid(), 3);
    assert_eq!(upd.uid(), item.uid());
    assert_eq!(upd.rev().nr(), 2);
    assert_eq!(*upd.data(), "ONE");

    let del = upd.deletion();
    assert_eq!(del.rev().nr(), 3);
    assert_eq!(*del.data(), "ONE");
  }

  #[test]
  fn uids_are_unique() {
    let a = new_uid();
    let b = new_uid();
    assert_ne!(a, b);
    assert_eq!(a.len(), 36);
  }
}
