//! [`MemIndex`]: a lookup handle onto a [`MemTable`](crate::MemTable)'s key
//! map.

use std::sync::Arc;

use itemstore_core::{Index, Item, Key, Record, Result};

use crate::table::Inner;

pub struct MemIndex<R> {
  table:  Arc<Inner<R>>,
  name:   String,
  fields: Vec<&'static str>,
}

impl<R> MemIndex<R> {
  pub(crate) fn new(table: Arc<Inner<R>>, name: &str, fields: Vec<&'static str>) -> Self {
    Self { table, name: name.to_owned(), fields }
  }
}

impl<R: Record> Index<R> for MemIndex<R> {
  fn name(&self) -> &str { &self.name }

  fn fields(&self) -> Vec<&'static str> { self.fields.clone() }

  fn find_one(&self, key: &Key) -> Result<Option<Item<R>>> {
    let state = self.table.lock();
    let Some(uid) = state.indexes.lookup(&self.name, key)? else {
      return Ok(None);
    };
    Ok(state.items.get(&uid).cloned())
  }
}
