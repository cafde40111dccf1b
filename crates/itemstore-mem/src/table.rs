//! [`MemTable`]: items held in a map, guarded by one per-table mutex.

use std::{any::Any, collections::HashMap, sync::Arc};

use itemstore_core::{
  AnyTable, Index, Item, Record, Result, Revision, Schema, Table, TableRef,
  index::{IndexDef, KeyIndexes},
  item::new_uid,
  occ,
};
use parking_lot::{Mutex, MutexGuard};
use tracing::debug;

use crate::index::MemIndex;

pub(crate) struct Inner<R> {
  pub(crate) table:  TableRef,
  pub(crate) schema: Schema<R>,
  state:             Mutex<State<R>>,
}

pub(crate) struct State<R> {
  next_nid:           u64,
  pub(crate) items:   HashMap<String, Item<R>>,
  pub(crate) indexes: KeyIndexes<R>,
}

impl<R> Inner<R> {
  /// Every operation, reads included, goes through this lock.
  pub(crate) fn lock(&self) -> MutexGuard<'_, State<R>> {
    self.state.lock()
  }
}

/// A table whose items exist only in this process.
pub struct MemTable<R> {
  inner: Arc<Inner<R>>,
}

impl<R: Record> MemTable<R> {
  pub fn new(table: TableRef, schema: Schema<R>) -> Self {
    let indexes = KeyIndexes::new(table.name());
    Self {
      inner: Arc::new(Inner {
        table,
        schema,
        state: Mutex::new(State { next_nid: 1, items: HashMap::new(), indexes }),
      }),
    }
  }
}

impl<R: Record> AnyTable for MemTable<R> {
  fn table_ref(&self) -> &TableRef { &self.inner.table }

  fn field_names(&self) -> Vec<&'static str> { self.inner.schema.field_names() }

  fn index_names(&self) -> Vec<String> { self.inner.lock().indexes.names() }

  fn count(&self) -> Result<usize> { Ok(self.inner.lock().items.len()) }

  fn del_all(&self) -> Result<()> {
    let mut state = self.inner.lock();
    state.items.clear();
    state.indexes.clear();
    debug!(table = self.name(), "all items removed");
    Ok(())
  }

  fn as_any(&self) -> &dyn Any { self }
}

impl<R: Record> Table<R> for MemTable<R> {
  fn schema(&self) -> &Schema<R> { &self.inner.schema }

  fn add_item(&self, data: R) -> Result<Item<R>> {
    occ::validate(&self.inner.table, &self.inner.schema, &data)?;

    let mut state = self.inner.lock();
    let uid = new_uid();
    state.indexes.check(&uid, &data)?;

    let item = Item::new(self.inner.table.clone(), state.next_nid, uid, Revision::first(), data);
    state.indexes.apply(item.uid(), None, Some(item.data()));
    state.items.insert(item.uid().to_owned(), item.clone());
    state.next_nid += 1;

    debug!(table = self.name(), uid = item.uid(), nid = item.nid(), "item added");
    Ok(item)
  }

  fn upd_item(&self, candidate: Item<R>) -> Result<Item<R>> {
    let mut state = self.inner.lock();
    let current = occ::admit_update(&self.inner.table, &self.inner.schema, &candidate, || {
      Ok(state.items.get(candidate.uid()).cloned())
    })?;
    state.indexes.check(candidate.uid(), candidate.data())?;

    state
      .indexes
      .apply(candidate.uid(), Some(current.data()), Some(candidate.data()));
    state.items.insert(candidate.uid().to_owned(), candidate.clone());

    debug!(
      table = self.name(),
      uid = candidate.uid(),
      rev = candidate.rev().nr(),
      "item updated"
    );
    Ok(candidate)
  }

  fn get_item(&self, uid: &str) -> Result<Option<Item<R>>> {
    Ok(self.inner.lock().items.get(uid).cloned())
  }

  fn del_item(&self, candidate: Item<R>) -> Result<()> {
    let mut state = self.inner.lock();
    let current = occ::admit_delete(&self.inner.table, &candidate, || {
      Ok(state.items.get(candidate.uid()).cloned())
    })?;

    state.indexes.apply(current.uid(), Some(current.data()), None);
    state.items.remove(current.uid());

    debug!(table = self.name(), uid = current.uid(), "item deleted");
    Ok(())
  }

  fn items(&self) -> Result<HashMap<String, Item<R>>> { Ok(self.inner.lock().items.clone()) }

  fn index(&self, name: &str, fields: &[&str]) -> Result<Arc<dyn Index<R>>> {
    let def = IndexDef::new(&self.inner.schema, self.name(), name, fields)?;
    let field_names = def.field_names();

    let mut state = self.inner.lock();
    let State { items, indexes, .. } = &mut *state;
    indexes.declare(def, items.iter().map(|(uid, item)| (uid.as_str(), item.data())))?;

    debug!(table = self.name(), index = name, fields = ?field_names, "index declared");
    Ok(Arc::new(MemIndex::new(self.inner.clone(), name, field_names)))
  }
}

impl<R> std::fmt::Debug for MemTable<R> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_tuple("MemTable").field(&self.inner.table).finish()
  }
}
