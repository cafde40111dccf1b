//! Versioned item tables over interchangeable storage.
//!
//! Pick a backend at runtime from a [`StoreConfig`] and declare typed tables
//! on the resulting [`Store`]. The backend crates remain usable on their own
//! through the re-exported [`mem`], [`files`] and [`sqlite`] modules.
//!
//! ```no_run
//! use itemstore::{Store, StoreConfig, Table as _};
//! # use itemstore::{Field, Record};
//! # #[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
//! # struct User { name: String }
//! # impl Record for User {
//! #   fn fields() -> Vec<Field<Self>> { vec![Field::text("name", |u: &Self| u.name.clone().into())] }
//! # }
//!
//! let store = Store::open(&StoreConfig::default())?;
//! let users = store.table::<User>("users")?;
//! let item = users.add_item(User { name: "ada".into() })?;
//! let item = users.update(&item, User { name: "Ada".into() })?;
//! assert_eq!(item.rev().nr(), 2);
//! # Ok::<(), itemstore::Error>(())
//! ```

pub mod config;
pub mod error;

use std::{collections::BTreeMap, sync::Arc};

use tracing::debug;

pub use self::config::{StoreConfig, load_config};
pub use error::{Error, Result};
pub use itemstore_core::{
  AnyTable, Database, Field, FieldKind, FieldValue, Index, Item, Key, Record, Revision, Schema,
  Table, TableRef,
};
pub use itemstore_files as files;
pub use itemstore_mem as mem;
pub use itemstore_sqlite as sqlite;

/// A database on whichever backend the configuration selected.
#[derive(Debug)]
pub enum Store {
  Memory(Database<mem::MemBackend>),
  Files(Database<files::FileBackend>),
  Sqlite(Database<sqlite::SqliteBackend>),
}

impl Store {
  pub fn open(config: &StoreConfig) -> Result<Self> {
    let store = match config {
      StoreConfig::Memory { name } => Self::Memory(mem::open(name.as_str())),
      StoreConfig::Files { root, unreadable } => {
        let cfg = files::FileConfig { unreadable: *unreadable };
        Self::Files(files::open(root, cfg)?)
      }
      StoreConfig::Sqlite { path: Some(path), .. } => Self::Sqlite(sqlite::open(path)?),
      StoreConfig::Sqlite { path: None, name } => Self::Sqlite(sqlite::open_in_memory(name)?),
    };
    debug!(backend = store.kind(), name = store.name(), "store opened");
    Ok(store)
  }

  /// The backend name: `"memory"`, `"files"` or `"sqlite"`.
  pub fn kind(&self) -> &'static str {
    use itemstore_core::Backend as _;
    match self {
      Self::Memory(db) => db.backend().kind(),
      Self::Files(db) => db.backend().kind(),
      Self::Sqlite(db) => db.backend().kind(),
    }
  }

  pub fn name(&self) -> &str {
    match self {
      Self::Memory(db) => db.name(),
      Self::Files(db) => db.name(),
      Self::Sqlite(db) => db.name(),
    }
  }

  /// See [`Database::table`].
  pub fn table<R: Record>(&self, name: &str) -> itemstore_core::Result<Arc<dyn Table<R>>> {
    match self {
      Self::Memory(db) => db.table(name),
      Self::Files(db) => db.table(name),
      Self::Sqlite(db) => db.table(name),
    }
  }

  /// See [`Database::get_table`].
  pub fn get_table<R: Record>(&self, name: &str) -> Option<Arc<dyn Table<R>>> {
    match self {
      Self::Memory(db) => db.get_table(name),
      Self::Files(db) => db.get_table(name),
      Self::Sqlite(db) => db.get_table(name),
    }
  }

  pub fn tables(&self) -> BTreeMap<String, Arc<dyn AnyTable>> {
    match self {
      Self::Memory(db) => db.tables(),
      Self::Files(db) => db.tables(),
      Self::Sqlite(db) => db.tables(),
    }
  }

  pub fn remove_table(&self, name: &str) -> bool {
    match self {
      Self::Memory(db) => db.remove_table(name),
      Self::Files(db) => db.remove_table(name),
      Self::Sqlite(db) => db.remove_table(name),
    }
  }
}

#[cfg(test)]
mod tests;
