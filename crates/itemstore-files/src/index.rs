//! [`FileIndex`]: key lookups answered from the in-process key map, items
//! read back from disk.

use std::sync::Arc;

use itemstore_core::{Index, Item, Key, Record, Result};

use crate::table::Inner;

pub struct FileIndex<R> {
  table:  Arc<Inner<R>>,
  name:   String,
  fields: Vec<&'static str>,
}

impl<R> FileIndex<R> {
  pub(crate) fn new(table: Arc<Inner<R>>, name: &str, fields: Vec<&'static str>) -> Self {
    Self { table, name: name.to_owned(), fields }
  }
}

impl<R: Record> Index<R> for FileIndex<R> {
  fn name(&self) -> &str { &self.name }

  fn fields(&self) -> Vec<&'static str> { self.fields.clone() }

  fn find_one(&self, key: &Key) -> Result<Option<Item<R>>> {
    let state = self.table.lock();
    let Some(uid) = state.indexes.lookup(&self.name, key)? else {
      return Ok(None);
    };
    self.table.read("find_one", &uid)
  }
}
