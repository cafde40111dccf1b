//! Tests for configuration loading and backend dispatch.

use std::{collections::HashMap, fs, path::PathBuf};

use itemstore_core::testing::User;

use crate::{Store, StoreConfig, Table as _, config::load, files::UnreadablePolicy};

fn env(vars: &[(&str, &str)]) -> config::Environment {
  let vars: HashMap<String, String> =
    vars.iter().map(|(k, v)| ((*k).to_owned(), (*v).to_owned())).collect();
  config::Environment::with_prefix(crate::config::ENV_PREFIX)
    .separator("__")
    .source(Some(vars))
}

// ─── Configuration ───────────────────────────────────────────────────────────

#[test]
fn defaults_to_an_in_memory_store() {
  assert_eq!(load(None, env(&[])).unwrap(), StoreConfig::default());
  assert_eq!(StoreConfig::default(), StoreConfig::Memory { name: "store".into() });
}

#[test]
fn reads_a_toml_file() {
  let dir = tempfile::tempdir().unwrap();
  let file = dir.path().join("store.toml");
  fs::write(&file, "backend = \"files\"\nroot = \"/srv/items\"\nunreadable = \"fail\"\n").unwrap();

  assert_eq!(
    load(Some(&file), env(&[])).unwrap(),
    StoreConfig::Files { root: PathBuf::from("/srv/items"), unreadable: UnreadablePolicy::Fail }
  );
}

#[test]
fn missing_file_is_not_an_error() {
  let dir = tempfile::tempdir().unwrap();
  let cfg = load(Some(&dir.path().join("absent.toml")), env(&[])).unwrap();
  assert_eq!(cfg, StoreConfig::default());
}

#[test]
fn environment_overrides_the_file() {
  let dir = tempfile::tempdir().unwrap();
  let file = dir.path().join("store.toml");
  fs::write(&file, "backend = \"memory\"\nname = \"from_file\"\n").unwrap();

  let cfg = load(
    Some(&file),
    env(&[("ITEMSTORE__BACKEND", "sqlite"), ("ITEMSTORE__PATH", "/tmp/items.db")]),
  )
  .unwrap();
  assert_eq!(
    cfg,
    StoreConfig::Sqlite { path: Some(PathBuf::from("/tmp/items.db")), name: "from_file".into() }
  );
}

#[test]
fn unknown_backend_is_rejected() {
  let err = load(None, env(&[("ITEMSTORE__BACKEND", "floppy")])).unwrap_err();
  assert!(matches!(err, crate::Error::Config(_)), "{err}");
}

// ─── Dispatch ────────────────────────────────────────────────────────────────

fn exercise(store: &Store) {
  let users = store.table::<User>("users").unwrap();
  let u = users.add_item(User::new("a")).unwrap();
  let u = users.update(&u, User::new("b")).unwrap();
  assert_eq!(users.get_item(u.uid()).unwrap().unwrap().data(), &User::new("b"));

  assert!(store.get_table::<User>("users").is_some());
  assert_eq!(store.tables().keys().collect::<Vec<_>>(), ["users"]);
  assert!(store.remove_table("users"));
  assert!(store.tables().is_empty());
}

#[test]
fn opens_each_backend() {
  let dir = tempfile::tempdir().unwrap();

  let memory = Store::open(&StoreConfig::Memory { name: "scratch".into() }).unwrap();
  assert_eq!((memory.kind(), memory.name()), ("memory", "scratch"));
  exercise(&memory);

  let files = Store::open(&StoreConfig::Files {
    root:       dir.path().join("tree"),
    unreadable: UnreadablePolicy::Skip,
  })
  .unwrap();
  assert_eq!((files.kind(), files.name()), ("files", "tree"));
  exercise(&files);
  assert!(dir.path().join("tree/users").is_dir());

  let sqlite = Store::open(&StoreConfig::Sqlite {
    path: Some(dir.path().join("rows.db")),
    name: "ignored".into(),
  })
  .unwrap();
  assert_eq!((sqlite.kind(), sqlite.name()), ("sqlite", "rows"));
  exercise(&sqlite);

  let scratch = Store::open(&StoreConfig::Sqlite { path: None, name: "mem".into() }).unwrap();
  assert_eq!((scratch.kind(), scratch.name()), ("sqlite", "mem"));
  exercise(&scratch);
}
