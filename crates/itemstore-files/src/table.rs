//! [`FileTable`]: one directory per table, one JSON bundle per stored
//! revision.
//!
//! Reads go straight to disk. Mutations hold a per-table mutex while they
//! check the stored revision and rewrite the files, so writers within one
//! process are serialised. Nothing guards against a second process working on
//! the same directory.

use std::{
  any::Any,
  collections::HashMap,
  fs, io,
  path::{Path, PathBuf},
  sync::Arc,
};

use itemstore_core::{
  AnyTable, BackendContext as _, Index, Item, Record, Result, Revision, Schema, Table, TableRef,
  index::{IndexDef, KeyIndexes},
  item::new_uid,
  occ,
};
use parking_lot::{Mutex, MutexGuard};
use tracing::{debug, warn};

use crate::{
  config::{FileConfig, UnreadablePolicy},
  encode::{self, REV_TS_DIGITS},
  index::FileIndex,
  naming::{FileName, SEQUENCE_FILE, valid_uid},
};

pub(crate) struct Inner<R> {
  pub(crate) table:  TableRef,
  pub(crate) schema: Schema<R>,
  dir:               PathBuf,
  policy:            UnreadablePolicy,
  state:             Mutex<State<R>>,
}

pub(crate) struct State<R> {
  next_nid:           u64,
  pub(crate) indexes: KeyIndexes<R>,
}

/// A table persisted as JSON files under its own directory.
pub struct FileTable<R> {
  inner: Arc<Inner<R>>,
}

impl<R: Record> FileTable<R> {
  /// Open (creating if needed) the table stored in `dir`.
  ///
  /// The sequence counter continues after the highest `nid` found in any
  /// bundle (deleted ones included) or in the sequence file.
  pub fn open(
    table: TableRef,
    schema: Schema<R>,
    dir: PathBuf,
    config: &FileConfig,
  ) -> Result<Self> {
    fs::create_dir_all(&dir).backend_ctx(table.name(), "open", None)?;

    let indexes = KeyIndexes::new(table.name());
    let inner = Inner {
      table,
      schema,
      dir,
      policy: config.unreadable,
      state: Mutex::new(State { next_nid: 1, indexes }),
    };

    let mut max_nid = inner.read_sequence()?;
    for (_, path) in inner.scan("open")? {
      let nid = fs::read(&path)
        .map_err(crate::error::Error::from)
        .and_then(|bytes| encode::decode_nid(&bytes));
      match nid {
        Ok(nid) => max_nid = max_nid.max(nid),
        Err(e) => inner.unreadable("open", &path, e)?,
      }
    }
    inner.lock().next_nid = max_nid + 1;

    debug!(
      table = inner.name(),
      dir = %inner.dir.display(),
      next_nid = max_nid + 1,
      "table opened"
    );
    Ok(Self { inner: Arc::new(inner) })
  }

  /// The directory holding this table's bundles.
  pub fn dir(&self) -> &Path { &self.inner.dir }
}

impl<R> Inner<R> {
  /// Mutations and index declarations go through this lock.
  pub(crate) fn lock(&self) -> MutexGuard<'_, State<R>> {
    self.state.lock()
  }

  fn name(&self) -> &str { self.table.name() }

  fn path(&self, file: &FileName) -> PathBuf { self.dir.join(file.render(self.name())) }

  fn current_path(&self, uid: &str) -> PathBuf {
    self.path(&FileName::Current { uid: uid.to_owned() })
  }

  fn sequence_path(&self) -> PathBuf { self.dir.join(SEQUENCE_FILE) }

  /// The high-water mark saved by the last `del_all`, or 0.
  fn read_sequence(&self) -> Result<u64> {
    let path = self.sequence_path();
    let text = match fs::read_to_string(&path) {
      Ok(text) => text,
      Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
      Err(e) => return Err(itemstore_core::Error::backend(self.name(), "open", None, e)),
    };
    match text.trim().parse() {
      Ok(nid) => Ok(nid),
      Err(e) => {
        let err = crate::error::Error::Sequence(format!("{text:?}: {e}"));
        self.unreadable("open", &path, err)?;
        Ok(0)
      }
    }
  }

  /// Save `nid` as the high-water mark, with a temp file and a rename.
  fn write_sequence(&self, op: &'static str, nid: u64) -> Result<()> {
    let path = self.sequence_path();
    let tmp = self.dir.join(format!("{SEQUENCE_FILE}.tmp"));

    let write = || -> io::Result<()> {
      fs::write(&tmp, nid.to_string())?;
      fs::rename(&tmp, &path)
    };
    write().backend_ctx(self.name(), op, None)
  }

  /// Every bundle file in the directory, whatever its kind.
  fn scan(&self, op: &'static str) -> Result<Vec<(FileName, PathBuf)>> {
    let entries = fs::read_dir(&self.dir).backend_ctx(self.name(), op, None)?;
    let mut files = Vec::new();
    for entry in entries {
      let entry = entry.backend_ctx(self.name(), op, None)?;
      let Some(file) = entry.file_name().to_str().and_then(|n| FileName::parse(self.name(), n))
      else {
        continue;
      };
      files.push((file, entry.path()));
    }
    Ok(files)
  }

  /// Apply the configured policy to a bundle that could not be read.
  fn unreadable(&self, op: &'static str, path: &Path, err: crate::error::Error) -> Result<()> {
    match self.policy {
      UnreadablePolicy::Skip => {
        warn!(
          table = self.name(),
          op,
          path = %path.display(),
          error = %err,
          "skipping unreadable bundle"
        );
        Ok(())
      }
      UnreadablePolicy::Fail => Err(itemstore_core::Error::backend(self.name(), op, None, err)),
    }
  }
}

impl<R: Record> Inner<R> {
  /// The current revision of `uid`, if the item is live.
  pub(crate) fn read(&self, op: &'static str, uid: &str) -> Result<Option<Item<R>>> {
    if !valid_uid(uid) {
      return Ok(None);
    }
    match fs::read(self.current_path(uid)) {
      Ok(bytes) => encode::decode(&self.table, &bytes)
        .map(Some)
        .backend_ctx(self.name(), op, Some(uid)),
      Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
      Err(e) => Err(itemstore_core::Error::backend(self.name(), op, Some(uid), e)),
    }
  }

  /// Every live item that could be read.
  fn live(&self, op: &'static str) -> Result<Vec<Item<R>>> {
    let mut items = Vec::new();
    for (file, path) in self.scan(op)? {
      if !file.is_current() {
        continue;
      }
      let item = match fs::read(&path) {
        Ok(bytes) => encode::decode(&self.table, &bytes),
        // Deleted between listing and reading.
        Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
        Err(e) => Err(e.into()),
      };
      match item {
        Ok(item) => items.push(item),
        Err(e) => self.unreadable(op, &path, e)?,
      }
    }
    Ok(items)
  }

  /// Replace the current file of `item` with a temp file and a rename.
  fn write_current(&self, op: &'static str, item: &Item<R>) -> Result<()> {
    let name = FileName::Current { uid: item.uid().to_owned() }.render(self.name());
    let path = self.dir.join(&name);
    let tmp = self.dir.join(format!(".{name}.tmp"));

    let write = || -> crate::error::Result<()> {
      fs::write(&tmp, encode::encode(item)?)?;
      fs::rename(&tmp, &path)?;
      Ok(())
    };
    write().backend_ctx(self.name(), op, Some(item.uid()))
  }
}

impl<R: Record> AnyTable for FileTable<R> {
  fn table_ref(&self) -> &TableRef { &self.inner.table }

  fn field_names(&self) -> Vec<&'static str> { self.inner.schema.field_names() }

  fn index_names(&self) -> Vec<String> { self.inner.lock().indexes.names() }

  fn count(&self) -> Result<usize> { Ok(self.inner.live("count")?.len()) }

  /// Removes every bundle of this table, history and deleted markers included.
  /// The sequence file is written first and survives.
  fn del_all(&self) -> Result<()> {
    let mut state = self.inner.lock();
    self.inner.write_sequence("del_all", state.next_nid - 1)?;
    let files = self.inner.scan("del_all")?;
    for (file, path) in &files {
      match fs::remove_file(path) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => {
          return Err(itemstore_core::Error::backend(self.name(), "del_all", Some(file.uid()), e));
        }
        _ => {}
      }
    }
    state.indexes.clear();
    debug!(table = self.name(), files = files.len(), "all items removed");
    Ok(())
  }

  fn as_any(&self) -> &dyn Any { self }
}

impl<R: Record> Table<R> for FileTable<R> {
  fn schema(&self) -> &Schema<R> { &self.inner.schema }

  fn add_item(&self, data: R) -> Result<Item<R>> {
    occ::validate(&self.inner.table, &self.inner.schema, &data)?;

    let mut state = self.inner.lock();
    let uid = new_uid();
    state.indexes.check(&uid, &data)?;

    let rev = Revision::first().truncated(REV_TS_DIGITS);
    let item = Item::new(self.inner.table.clone(), state.next_nid, uid, rev, data);
    self.inner.write_current("add_item", &item)?;
    state.indexes.apply(item.uid(), None, Some(item.data()));
    state.next_nid += 1;

    debug!(table = self.name(), uid = item.uid(), nid = item.nid(), "item added");
    Ok(item)
  }

  fn upd_item(&self, candidate: Item<R>) -> Result<Item<R>> {
    let mut state = self.inner.lock();
    let current = occ::admit_update(&self.inner.table, &self.inner.schema, &candidate, || {
      self.inner.read("upd_item", candidate.uid())
    })?;
    state.indexes.check(candidate.uid(), candidate.data())?;

    let rev = candidate.rev().truncated(REV_TS_DIGITS);
    let item = candidate.with_rev(rev);
    let backup = self.inner.path(&FileName::Revision { uid: item.uid().to_owned(), nr: rev.nr() });
    fs::copy(self.inner.current_path(item.uid()), &backup).backend_ctx(
      self.name(),
      "upd_item",
      Some(item.uid()),
    )?;
    self.inner.write_current("upd_item", &item)?;
    state.indexes.apply(item.uid(), Some(current.data()), Some(item.data()));

    debug!(table = self.name(), uid = item.uid(), rev = rev.nr(), "item updated");
    Ok(item)
  }

  fn get_item(&self, uid: &str) -> Result<Option<Item<R>>> { self.inner.read("get_item", uid) }

  /// Moves the current bundle to the deleted marker; revision backups stay.
  fn del_item(&self, candidate: Item<R>) -> Result<()> {
    let mut state = self.inner.lock();
    let current = occ::admit_delete(&self.inner.table, &candidate, || {
      self.inner.read("del_item", candidate.uid())
    })?;

    let marker = self.inner.path(&FileName::Deleted { uid: current.uid().to_owned() });
    fs::rename(self.inner.current_path(current.uid()), marker).backend_ctx(
      self.name(),
      "del_item",
      Some(current.uid()),
    )?;
    state.indexes.apply(current.uid(), Some(current.data()), None);

    debug!(table = self.name(), uid = current.uid(), "item deleted");
    Ok(())
  }

  fn items(&self) -> Result<HashMap<String, Item<R>>> {
    let _state = self.inner.lock();
    let items = self.inner.live("items")?;
    Ok(items.into_iter().map(|item| (item.uid().to_owned(), item)).collect())
  }

  fn index(&self, name: &str, fields: &[&str]) -> Result<Arc<dyn Index<R>>> {
    let def = IndexDef::new(&self.inner.schema, self.name(), name, fields)?;
    let field_names = def.field_names();

    let mut state = self.inner.lock();
    let live = self.inner.live("index")?;
    state
      .indexes
      .declare(def, live.iter().map(|item| (item.uid(), item.data())))?;

    debug!(table = self.name(), index = name, fields = ?field_names, "index declared");
    Ok(Arc::new(FileIndex::new(self.inner.clone(), name, field_names)))
  }
}

impl<R> std::fmt::Debug for FileTable<R> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("FileTable")
      .field("table", &self.inner.table)
      .field("dir", &self.inner.dir)
      .finish()
  }
}
