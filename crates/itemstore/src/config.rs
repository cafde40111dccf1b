//! Store selection, read from a TOML file and `ITEMSTORE__*` environment
//! variables.
//!
//! ```toml
//! backend    = "files"
//! root       = "/var/lib/app/store"
//! unreadable = "fail"
//! ```
//!
//! Environment variables override the file, e.g. `ITEMSTORE__BACKEND=sqlite`
//! together with `ITEMSTORE__PATH=/tmp/store.db`.

use std::path::{Path, PathBuf};

use itemstore_files::UnreadablePolicy;
use serde::Deserialize;

use crate::Result;

/// Prefix of the environment variables read by [`load_config`].
pub const ENV_PREFIX: &str = "ITEMSTORE";

fn default_name() -> String { "store".to_owned() }

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum StoreConfig {
  /// Nothing persisted.
  Memory {
    #[serde(default = "default_name")]
    name: String,
  },
  /// One directory per table under `root`.
  Files {
    root:       PathBuf,
    #[serde(default)]
    unreadable: UnreadablePolicy,
  },
  /// A database file at `path`, or a private in-memory database named
  /// `name` when no path is given.
  Sqlite {
    path: Option<PathBuf>,
    #[serde(default = "default_name")]
    name: String,
  },
}

impl Default for StoreConfig {
  fn default() -> Self { Self::Memory { name: default_name() } }
}

/// Load the store configuration from `file` (if given and present) and the
/// environment.
pub fn load_config(file: Option<&Path>) -> Result<StoreConfig> {
  load(file, config::Environment::with_prefix(ENV_PREFIX).separator("__"))
}

pub(crate) fn load(file: Option<&Path>, env: config::Environment) -> Result<StoreConfig> {
  let mut builder = config::Config::builder().set_default("backend", "memory")?;
  if let Some(file) = file {
    builder = builder.add_source(config::File::from(file).required(false));
  }
  let settings = builder.add_source(env).build()?;
  Ok(settings.try_deserialize()?)
}
