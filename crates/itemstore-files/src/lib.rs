//! JSON-file backend for itemstore.
//!
//! A database is a directory; each table gets a sub-directory holding one
//! bundle file per live item, a backup per superseded revision and a marker
//! per deleted item (see [`naming`]). Revision timestamps are kept to whole
//! seconds.

pub mod config;
pub mod encode;
pub mod error;
mod index;
pub mod naming;
mod table;

use std::{
  path::{Path, PathBuf},
  sync::Arc,
};

use itemstore_core::{Backend, BackendContext as _, Database, Error, Record, Result, Schema, TableRef};

pub use config::{FileConfig, UnreadablePolicy};
pub use index::FileIndex;
pub use table::FileTable;

/// Backend producing [`FileTable`]s under one root directory.
#[derive(Debug, Clone)]
pub struct FileBackend {
  root:   PathBuf,
  config: FileConfig,
}

impl FileBackend {
  pub fn root(&self) -> &Path { &self.root }

  pub fn config(&self) -> &FileConfig { &self.config }
}

impl Backend for FileBackend {
  type Table<R: Record> = FileTable<R>;

  fn kind(&self) -> &'static str { "files" }

  fn open_table<R: Record>(
    &self,
    table: TableRef,
    schema: Schema<R>,
  ) -> Result<Arc<FileTable<R>>> {
    let dir = self.root.join(table.name());
    Ok(Arc::new(FileTable::open(table, schema, dir, &self.config)?))
  }
}

/// Open (creating if needed) the database rooted at `root`. Its name is the
/// last component of the path.
pub fn open(root: impl AsRef<Path>, config: FileConfig) -> Result<Database<FileBackend>> {
  let root = root.as_ref();
  let shown = root.display().to_string();
  std::fs::create_dir_all(root).backend_ctx(&shown, "open", None)?;
  let root = std::fs::canonicalize(root).backend_ctx(&shown, "open", None)?;

  let name = root
    .file_name()
    .and_then(|n| n.to_str())
    .map(str::to_owned)
    .ok_or_else(|| Error::InvalidName {
      name:   shown.clone(),
      reason: "database path has no usable last component",
    })?;

  Ok(Database::new(name, FileBackend { root, config }))
}
