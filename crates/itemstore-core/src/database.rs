//! [`Database`]: a named registry of tables, generic over the backend that
//! realises them.

use std::{any::Any, collections::BTreeMap, sync::Arc};

use parking_lot::{Mutex, MutexGuard};
use tracing::debug;

use crate::{
  Error, Result,
  identifier::validate_identifier,
  item::TableRef,
  record::{Record, Schema},
  table::{AnyTable, Table},
};

/// A storage substrate able to open tables.
pub trait Backend: Send + Sync {
  /// Short substrate name used in logs, e.g. `"memory"`.
  fn kind(&self) -> &'static str;

  /// The table type this backend produces for records of type `R`.
  type Table<R: Record>: Table<R> + 'static;

  /// Open (creating if needed) the storage for one table.
  fn open_table<R: Record>(
    &self,
    table: TableRef,
    schema: Schema<R>,
  ) -> Result<Arc<Self::Table<R>>>;
}

struct Registered {
  table: Arc<dyn AnyTable>,
  /// An `Arc<dyn Table<R>>` for the record type the table was declared with.
  typed: Arc<dyn Any + Send + Sync>,
}

/// A named set of tables stored through one backend.
pub struct Database<B> {
  name:    String,
  backend: B,
  tables:  Mutex<BTreeMap<String, Registered>>,
}

impl<B: Backend> Database<B> {
  pub fn new(name: impl Into<String>, backend: B) -> Self {
    Self { name: name.into(), backend, tables: Mutex::new(BTreeMap::new()) }
  }

  pub fn name(&self) -> &str { &self.name }

  pub fn backend(&self) -> &B { &self.backend }

  /// Declare table `name` holding records of type `R`.
  pub fn table<R: Record>(&self, name: &str) -> Result<Arc<dyn Table<R>>> {
    validate_identifier(name)?;
    let schema = Schema::<R>::of()?;

    let mut tables = self.lock();
    if tables.contains_key(name) {
      return Err(Error::DuplicateName(name.to_owned()));
    }

    let opened = self.backend.open_table(TableRef::new(name), schema)?;
    let table: Arc<dyn Table<R>> = opened.clone();
    debug!(
      db = %self.name,
      backend = self.backend.kind(),
      table = name,
      "table declared"
    );
    tables.insert(name.to_owned(), Registered {
      table: opened,
      typed: Arc::new(table.clone()),
    });
    Ok(table)
  }

  /// The table called `name`, if it was declared with record type `R`.
  pub fn get_table<R: Record>(&self, name: &str) -> Option<Arc<dyn Table<R>>> {
    self
      .lock()
      .get(name)
      .and_then(|r| r.typed.downcast_ref::<Arc<dyn Table<R>>>())
      .cloned()
  }

  /// All declared tables, by name.
  pub fn tables(&self) -> BTreeMap<String, Arc<dyn AnyTable>> {
    self
      .lock()
      .iter()
      .map(|(name, r)| (name.clone(), r.table.clone()))
      .collect()
  }

  /// Forget table `name`. Stored data is left untouched.
  pub fn remove_table(&self, name: &str) -> bool { self.lock().remove(name).is_some() }

  fn lock(&self) -> MutexGuard<'_, BTreeMap<String, Registered>> { self.tables.lock() }
}

impl<B: Backend> std::fmt::Debug for Database<B> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Database")
      .field("name", &self.name)
      .field("backend", &self.backend.kind())
      .field("tables", &self.lock().keys().collect::<Vec<_>>())
      .finish()
  }
}
