//! SQLite backend for itemstore.
//!
//! Each table is an append-only log of revision rows: updates and deletes add
//! a row, so the full history of every item stays in the database. Reads go
//! through a per-table view of the newest non-deleted rows. Revision
//! timestamps are kept to the millisecond.
//!
//! All tables of a database share one [`rusqlite::Connection`] behind a
//! mutex; mutations run in `IMMEDIATE` transactions so writers in other
//! processes are serialised by SQLite itself.

mod encode;
mod index;
mod schema;
mod table;

pub mod error;

use std::{path::Path, sync::Arc, time::Duration};

use itemstore_core::{BackendContext as _, Database, Record, Schema, TableRef};
use parking_lot::Mutex;
use rusqlite::Connection;

pub use error::{Error, Result};
pub use index::SqliteIndex;
pub use table::SqliteTable;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Backend producing [`SqliteTable`]s over one connection.
#[derive(Clone)]
pub struct SqliteBackend {
  conn: Arc<Mutex<Connection>>,
}

impl SqliteBackend {
  fn connect(conn: Connection, label: &str) -> itemstore_core::Result<Self> {
    conn.busy_timeout(BUSY_TIMEOUT).backend_ctx(label, "open", None)?;
    conn.execute_batch(schema::PRAGMAS).backend_ctx(label, "open", None)?;
    Ok(Self { conn: Arc::new(Mutex::new(conn)) })
  }
}

impl itemstore_core::Backend for SqliteBackend {
  type Table<R: Record> = SqliteTable<R>;

  fn kind(&self) -> &'static str { "sqlite" }

  fn open_table<R: Record>(
    &self,
    table: TableRef,
    schema: Schema<R>,
  ) -> itemstore_core::Result<Arc<SqliteTable<R>>> {
    Ok(Arc::new(SqliteTable::open(table, schema, Arc::clone(&self.conn))?))
  }
}

impl std::fmt::Debug for SqliteBackend {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("SqliteBackend").finish_non_exhaustive()
  }
}

/// Open (or create) the database file at `path`. Its name is the file stem.
pub fn open(path: impl AsRef<Path>) -> itemstore_core::Result<Database<SqliteBackend>> {
  let path = path.as_ref();
  let shown = path.display().to_string();
  let name = path
    .file_stem()
    .and_then(|s| s.to_str())
    .map(str::to_owned)
    .ok_or_else(|| itemstore_core::Error::InvalidName {
      name:   shown.clone(),
      reason: "database path has no file name",
    })?;

  let conn = Connection::open(path).backend_ctx(&shown, "open", None)?;
  Ok(Database::new(name, SqliteBackend::connect(conn, &shown)?))
}

/// Open a private in-memory database called `name`.
pub fn open_in_memory(name: &str) -> itemstore_core::Result<Database<SqliteBackend>> {
  let conn = Connection::open_in_memory().backend_ctx(name, "open", None)?;
  Ok(Database::new(name, SqliteBackend::connect(conn, name)?))
}

#[cfg(test)]
mod tests;
