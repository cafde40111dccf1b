//! [`SqliteTable`]: append-only revision rows in one SQLite table.

use std::{
  any::Any,
  collections::{BTreeMap, HashMap, HashSet},
  sync::Arc,
};

use itemstore_core::{
  AnyTable, BackendContext as _, Error as CoreError, Index, Item, Record, Result, Revision,
  Schema, Table, TableRef,
  index::IndexDef,
  item::new_uid,
  occ,
};
use parking_lot::{Mutex, MutexGuard};
use rusqlite::{
  Connection, OptionalExtension as _, TransactionBehavior, params_from_iter, types::Value,
};
use tracing::{debug, warn};

use crate::{
  Error,
  encode::{REV_TS_DIGITS, RawRow, encode_rev_ts, encode_value},
  index::SqliteIndex,
  schema::{TableSql, is_reserved},
};

pub(crate) struct Inner<R> {
  pub(crate) table:  TableRef,
  pub(crate) schema: Schema<R>,
  pub(crate) sql:    TableSql,
  conn:              Arc<Mutex<Connection>>,
  indexes:           Mutex<BTreeMap<String, IndexDef<R>>>,
}

/// A table stored as revision rows in a shared SQLite connection.
pub struct SqliteTable<R> {
  inner: Arc<Inner<R>>,
}

impl<R: Record> SqliteTable<R> {
  /// Create (if needed) the table, its uid index and its live view.
  pub(crate) fn open(
    table: TableRef,
    schema: Schema<R>,
    conn: Arc<Mutex<Connection>>,
  ) -> Result<Self> {
    if let Some(field) = schema.field_names().into_iter().find(|f| is_reserved(f)) {
      return Err(CoreError::InvalidName {
        name:   field.to_owned(),
        reason: "field name is reserved for a header column",
      });
    }

    let sql = TableSql::new(table.name(), &schema);
    let inner = Inner {
      table,
      schema,
      sql,
      conn,
      indexes: Mutex::new(BTreeMap::new()),
    };
    inner.create().backend_ctx(inner.table.name(), "open", None)?;

    debug!(table = inner.table.name(), sql_table = %inner.sql.data, "table opened");
    Ok(Self { inner: Arc::new(inner) })
  }

  /// Delete every row of this table, history included. Unlike
  /// [`AnyTable::del_all`] nothing of the table's past survives. Sequence
  /// numbers are still never reused.
  pub fn purge(&self) -> Result<()> {
    let conn = self.inner.conn();
    let rows = conn
      .execute(&self.inner.sql.purge, [])
      .backend_ctx(self.name(), "purge", None)?;
    debug!(table = self.name(), rows, "table purged");
    Ok(())
  }
}

impl<R> Inner<R> {
  pub(crate) fn conn(&self) -> MutexGuard<'_, Connection> {
    self.conn.lock()
  }

  fn indexes(&self) -> MutexGuard<'_, BTreeMap<String, IndexDef<R>>> {
    self.indexes.lock()
  }

  fn name(&self) -> &str { self.table.name() }

  fn create(&self) -> crate::Result<()> {
    let conn = self.conn();
    conn.execute_batch(&self.sql.ddl)?;

    let mut stmt = conn.prepare("SELECT name FROM pragma_table_info(?1)")?;
    let found = stmt
      .query_map([&self.sql.data], |row| row.get::<_, String>(0))?
      .collect::<rusqlite::Result<Vec<_>>>()?;
    let expected = self.sql.expected_columns();
    if found != expected {
      return Err(Error::SchemaMismatch { table: self.sql.data.clone(), found, expected });
    }
    Ok(())
  }
}

impl<R: Record> Inner<R> {
  /// The newest row of `uid`, unless it is a tombstone.
  pub(crate) fn current(
    &self,
    conn: &Connection,
    uid: &str,
  ) -> crate::Result<Option<Item<R>>> {
    let fields = self.schema.fields().len();
    let row = conn
      .query_row(&self.sql.current, [uid], |row| RawRow::read(row, fields))
      .optional()?;
    match row {
      Some(row) if !row.deleted => Ok(Some(row.decode(&self.table, &self.schema)?)),
      _ => Ok(None),
    }
  }

  fn live(&self, conn: &Connection) -> crate::Result<Vec<Item<R>>> {
    let fields = self.schema.fields().len();
    let mut stmt = conn.prepare(&self.sql.all)?;
    let rows = stmt
      .query_map([], |row| RawRow::read(row, fields))?
      .collect::<rusqlite::Result<Vec<_>>>()?;
    rows
      .into_iter()
      .map(|row| row.decode(&self.table, &self.schema))
      .collect()
  }

  /// Append one revision row; returns its row id.
  fn insert(
    &self,
    conn: &Connection,
    uid: &str,
    rev: Revision,
    deleted: bool,
    data: &R,
  ) -> crate::Result<i64> {
    let mut values = vec![
      Value::Text(uid.to_owned()),
      Value::Integer(i64::from(rev.nr())),
      Value::Text(encode_rev_ts(rev.timestamp())),
      Value::Integer(i64::from(deleted)),
    ];
    values.extend(self.schema.values(data).iter().map(encode_value));
    conn.execute(&self.sql.insert, params_from_iter(values))?;
    Ok(conn.last_insert_rowid())
  }

  /// Fail with [`CoreError::DuplicateKey`] if another live item holds the
  /// key of `data` in any declared index.
  fn check_keys(
    &self,
    conn: &Connection,
    indexes: &BTreeMap<String, IndexDef<R>>,
    op: &'static str,
    uid: &str,
    data: &R,
  ) -> Result<()> {
    for def in indexes.values() {
      let mut params: Vec<Value> = def.values_of(data).iter().map(encode_value).collect();
      params.push(Value::Text(uid.to_owned()));
      let sql = self.sql.key_owner(&def.field_names());
      let owner: Option<String> = conn
        .query_row(&sql, params_from_iter(params), |row| row.get(0))
        .optional()
        .backend_ctx(self.name(), op, Some(uid))?;
      if owner.is_some() {
        return Err(def.duplicate(&def.key_of(data)));
      }
    }
    Ok(())
  }

  /// Map an insert failure; losing a race on `(uid, revNr)` is a stale
  /// revision.
  fn write_failed(&self, op: &'static str, candidate: &Item<R>, err: Error) -> CoreError {
    if err.is_unique_violation() {
      return occ::stale(&self.table, candidate, None);
    }
    CoreError::backend(self.name(), op, Some(candidate.uid()), err)
  }
}

impl<R: Record> AnyTable for SqliteTable<R> {
  fn table_ref(&self) -> &TableRef { &self.inner.table }

  fn field_names(&self) -> Vec<&'static str> { self.inner.schema.field_names() }

  fn index_names(&self) -> Vec<String> { self.inner.indexes().keys().cloned().collect() }

  fn count(&self) -> Result<usize> {
    let conn = self.inner.conn();
    let n: i64 = conn
      .query_row(&self.inner.sql.count, [], |row| row.get(0))
      .backend_ctx(self.name(), "count", None)?;
    Ok(usize::try_from(n).unwrap_or_default())
  }

  /// Appends a tombstone for every live item; history stays queryable.
  fn del_all(&self) -> Result<()> {
    let mut conn = self.inner.conn();
    let tx = conn
      .transaction_with_behavior(TransactionBehavior::Immediate)
      .backend_ctx(self.name(), "del_all", None)?;
    let live = self.inner.live(&tx).backend_ctx(self.name(), "del_all", None)?;

    let mut removed = 0;
    for item in &live {
      let rev = item.rev().next().truncated(REV_TS_DIGITS);
      match self.inner.insert(&tx, item.uid(), rev, true, item.data()) {
        Ok(_) => removed += 1,
        Err(e) if e.is_unique_violation() => {
          warn!(table = self.name(), uid = item.uid(), error = %e, "tombstone not written");
        }
        Err(e) => return Err(CoreError::backend(self.name(), "del_all", Some(item.uid()), e)),
      }
    }
    tx.commit().backend_ctx(self.name(), "del_all", None)?;

    debug!(table = self.name(), removed, "all items removed");
    Ok(())
  }

  fn as_any(&self) -> &dyn Any { self }
}

impl<R: Record> Table<R> for SqliteTable<R> {
  fn schema(&self) -> &Schema<R> { &self.inner.schema }

  fn add_item(&self, data: R) -> Result<Item<R>> {
    occ::validate(&self.inner.table, &self.inner.schema, &data)?;

    let mut conn = self.inner.conn();
    let indexes = self.inner.indexes();
    let tx = conn
      .transaction_with_behavior(TransactionBehavior::Immediate)
      .backend_ctx(self.name(), "add_item", None)?;

    let uid = new_uid();
    self.inner.check_keys(&tx, &indexes, "add_item", &uid, &data)?;

    let rev = Revision::first().truncated(REV_TS_DIGITS);
    let nid = self
      .inner
      .insert(&tx, &uid, rev, false, &data)
      .backend_ctx(self.name(), "add_item", Some(&uid))?;
    tx.commit().backend_ctx(self.name(), "add_item", Some(&uid))?;

    let nid = u64::try_from(nid).map_err(|_| {
      let err = Error::Corrupt(format!("row id {nid}"));
      CoreError::backend(self.name(), "add_item", Some(&uid), err)
    })?;
    let item = Item::new(self.inner.table.clone(), nid, uid, rev, data);
    debug!(table = self.name(), uid = item.uid(), nid = item.nid(), "item added");
    Ok(item)
  }

  fn upd_item(&self, candidate: Item<R>) -> Result<Item<R>> {
    let mut conn = self.inner.conn();
    let indexes = self.inner.indexes();
    let tx = conn
      .transaction_with_behavior(TransactionBehavior::Immediate)
      .backend_ctx(self.name(), "upd_item", Some(candidate.uid()))?;

    occ::admit_update(&self.inner.table, &self.inner.schema, &candidate, || {
      self
        .inner
        .current(&tx, candidate.uid())
        .backend_ctx(self.name(), "upd_item", Some(candidate.uid()))
    })?;
    self
      .inner
      .check_keys(&tx, &indexes, "upd_item", candidate.uid(), candidate.data())?;

    let rev = candidate.rev().truncated(REV_TS_DIGITS);
    self
      .inner
      .insert(&tx, candidate.uid(), rev, false, candidate.data())
      .map_err(|e| self.inner.write_failed("upd_item", &candidate, e))?;
    tx.commit().backend_ctx(self.name(), "upd_item", Some(candidate.uid()))?;

    debug!(table = self.name(), uid = candidate.uid(), rev = rev.nr(), "item updated");
    Ok(candidate.with_rev(rev))
  }

  fn get_item(&self, uid: &str) -> Result<Option<Item<R>>> {
    let conn = self.inner.conn();
    self.inner.current(&conn, uid).backend_ctx(self.name(), "get_item", Some(uid))
  }

  /// Appends a tombstone row carrying the deleted revision's data.
  fn del_item(&self, candidate: Item<R>) -> Result<()> {
    let mut conn = self.inner.conn();
    let tx = conn
      .transaction_with_behavior(TransactionBehavior::Immediate)
      .backend_ctx(self.name(), "del_item", Some(candidate.uid()))?;

    let current = occ::admit_delete(&self.inner.table, &candidate, || {
      self
        .inner
        .current(&tx, candidate.uid())
        .backend_ctx(self.name(), "del_item", Some(candidate.uid()))
    })?;

    let rev = candidate.rev().truncated(REV_TS_DIGITS);
    self
      .inner
      .insert(&tx, current.uid(), rev, true, current.data())
      .map_err(|e| self.inner.write_failed("del_item", &candidate, e))?;
    tx.commit().backend_ctx(self.name(), "del_item", Some(candidate.uid()))?;

    debug!(table = self.name(), uid = candidate.uid(), "item deleted");
    Ok(())
  }

  fn items(&self) -> Result<HashMap<String, Item<R>>> {
    let conn = self.inner.conn();
    let live = self.inner.live(&conn).backend_ctx(self.name(), "items", None)?;
    Ok(live.into_iter().map(|item| (item.uid().to_owned(), item)).collect())
  }

  /// Rejects the declaration if live items already share a key, then backs
  /// the index with a (non-unique) SQLite index.
  fn index(&self, name: &str, fields: &[&str]) -> Result<Arc<dyn Index<R>>> {
    let def = IndexDef::new(&self.inner.schema, self.name(), name, fields)?;
    let field_names = def.field_names();

    let conn = self.inner.conn();
    let mut indexes = self.inner.indexes();
    if indexes.contains_key(name) {
      return Err(CoreError::DuplicateIndex {
        table: self.name().to_owned(),
        index: name.to_owned(),
      });
    }

    let live = self.inner.live(&conn).backend_ctx(self.name(), "index", None)?;
    let mut seen = HashSet::new();
    for item in &live {
      let key = def.key_of(item.data());
      if !seen.insert(key.clone()) {
        return Err(def.duplicate(&key));
      }
    }

    conn
      .execute(&self.inner.sql.create_index(name, &field_names), [])
      .backend_ctx(self.name(), "index", None)?;
    indexes.insert(name.to_owned(), def.clone());

    debug!(table = self.name(), index = name, fields = ?field_names, "index declared");
    Ok(Arc::new(SqliteIndex::new(self.inner.clone(), def)))
  }
}

impl<R> std::fmt::Debug for SqliteTable<R> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("SqliteTable")
      .field("table", &self.inner.table)
      .field("sql_table", &self.inner.sql.data)
      .finish()
  }
}
