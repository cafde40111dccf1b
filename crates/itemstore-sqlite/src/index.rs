//! [`SqliteIndex`]: key lookups answered by a query on the live view.

use std::sync::Arc;

use itemstore_core::{BackendContext as _, Index, Item, Key, Record, Result, index::IndexDef};
use rusqlite::{OptionalExtension as _, params_from_iter};

use crate::{
  encode::{RawRow, encode_value},
  table::Inner,
};

pub struct SqliteIndex<R> {
  table: Arc<Inner<R>>,
  def:   IndexDef<R>,
}

impl<R> SqliteIndex<R> {
  pub(crate) fn new(table: Arc<Inner<R>>, def: IndexDef<R>) -> Self { Self { table, def } }
}

impl<R: Record> Index<R> for SqliteIndex<R> {
  fn name(&self) -> &str { self.def.name() }

  fn fields(&self) -> Vec<&'static str> { self.def.field_names() }

  fn find_one(&self, key: &Key) -> Result<Option<Item<R>>> {
    let values = self.def.values_from(key)?;
    let inner = &self.table;
    let table = inner.table.name();
    let fields = inner.schema.fields().len();
    let sql = inner.sql.find_by(&self.def.field_names());

    let conn = inner.conn();
    let row = conn
      .query_row(&sql, params_from_iter(values.iter().map(encode_value)), |row| {
        RawRow::read(row, fields)
      })
      .optional()
      .backend_ctx(table, "find_one", None)?;
    row
      .map(|row| row.decode(&inner.table, &inner.schema))
      .transpose()
      .backend_ctx(table, "find_one", None)
  }
}
