//! Conformance and backend-specific tests for the SQLite backend.

use std::{sync::Arc, thread};

use chrono::Timelike as _;
use itemstore_core::{
  AnyTable as _, Database, Error, Field, Index as _, Key, Record, Table as _,
  testing::{self, Person, User},
};
use serde::{Deserialize, Serialize};
use tempfile::TempDir;

use crate::{SqliteBackend, SqliteTable};

fn db() -> Database<SqliteBackend> { crate::open_in_memory("store").unwrap() }

fn file_db(dir: &TempDir) -> Database<SqliteBackend> {
  crate::open(dir.path().join("store.db")).unwrap()
}

/// `(revNr, deleted)` of every stored row of `uid` in `tbl_<table>`.
fn history(db: &Database<SqliteBackend>, table: &str, uid: &str) -> Vec<(i64, bool)> {
  let conn = db.backend().conn.lock();
  let mut stmt = conn
    .prepare(&format!("SELECT revNr, deleted FROM tbl_{table} WHERE uid = ?1 ORDER BY nid"))
    .unwrap();
  stmt
    .query_map([uid], |row| Ok((row.get(0)?, row.get(1)?)))
    .unwrap()
    .collect::<rusqlite::Result<_>>()
    .unwrap()
}

fn row_count(db: &Database<SqliteBackend>, table: &str) -> i64 {
  let conn = db.backend().conn.lock();
  conn
    .query_row(&format!("SELECT COUNT(*) FROM tbl_{table}"), [], |row| row.get(0))
    .unwrap()
}

// ─── Conformance ─────────────────────────────────────────────────────────────

#[test]
fn table_registry() { testing::table_registry(&db()); }

#[test]
fn revision_lifecycle() { testing::revision_lifecycle(&db()); }

#[test]
fn update_requires_next_revision() { testing::update_requires_next_revision(&db()); }

#[test]
fn wrong_table_rejected() { testing::wrong_table_rejected(&db()); }

#[test]
fn missing_items_not_found() { testing::missing_items_not_found(&db()); }

#[test]
fn deletes_ignore_payload_validation() { testing::deletes_ignore_payload_validation(&db()); }

#[test]
fn identities_are_unique_and_sequential() {
  testing::identities_are_unique_and_sequential(&db());
}

#[test]
fn round_trip_all_field_kinds() { testing::round_trip_all_field_kinds(&db()); }

#[test]
fn non_finite_decimals_rejected() { testing::non_finite_decimals_rejected(&db()); }

#[test]
fn items_and_count_track_live_items() { testing::items_and_count_track_live_items(&db()); }

#[test]
fn del_all_empties_table() { testing::del_all_empties_table(&db()); }

#[test]
fn composite_index() { testing::composite_index(&db()); }

#[test]
fn index_declaration() { testing::index_declaration(&db()); }

#[test]
fn index_follows_updates_and_deletes() { testing::index_follows_updates_and_deletes(&db()); }

#[test]
fn index_on_typed_fields() { testing::index_on_typed_fields(&db()); }

// ─── History ─────────────────────────────────────────────────────────────────

#[test]
fn every_mutation_appends_a_row() {
  let db = db();
  let users = db.table::<User>("users").unwrap();
  let u = users.add_item(User::new("a")).unwrap();
  let u = users.update(&u, User::new("b")).unwrap();
  users.delete(&u).unwrap();

  assert_eq!(history(&db, "users", u.uid()), [(1, false), (2, false), (3, true)]);
  assert!(users.get_item(u.uid()).unwrap().is_none());
}

#[test]
fn del_all_writes_tombstones() {
  let db = db();
  let users = db.table::<User>("users").unwrap();
  let a = users.add_item(User::new("a")).unwrap();
  let a = users.update(&a, User::new("A")).unwrap();
  users.add_item(User::new("b")).unwrap();

  users.del_all().unwrap();
  assert_eq!(users.count().unwrap(), 0);
  assert_eq!(history(&db, "users", a.uid()), [(1, false), (2, false), (3, true)]);
  assert_eq!(row_count(&db, "users"), 5);

  // A second pass finds nothing live.
  users.del_all().unwrap();
  assert_eq!(row_count(&db, "users"), 5);
}

#[test]
fn purge_drops_history_but_not_the_sequence() {
  let db = db();
  let users = db.table::<User>("users").unwrap();
  let a = users.add_item(User::new("a")).unwrap();
  users.update(&a, User::new("b")).unwrap();

  let table = users.as_any().downcast_ref::<SqliteTable<User>>().unwrap();
  table.purge().unwrap();
  assert_eq!(row_count(&db, "users"), 0);
  assert!(users.get_item(a.uid()).unwrap().is_none());

  let again = users.add_item(User::new("a")).unwrap();
  assert!(again.nid() > a.nid());
}

#[test]
fn revision_timestamps_keep_milliseconds() {
  let db = db();
  let users = db.table::<User>("users").unwrap();
  let added = users.add_item(User::new("a")).unwrap();
  assert_eq!(added.rev().timestamp().nanosecond() % 1_000_000, 0);
  assert_eq!(users.get_item(added.uid()).unwrap().unwrap().rev(), added.rev());

  let upd = users.update(&added, User::new("b")).unwrap();
  assert_eq!(users.get_item(upd.uid()).unwrap().unwrap().rev(), upd.rev());
}

// ─── Schema ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Shadowing {
  #[serde(rename = "revnr")]
  rev: i64,
}

impl Record for Shadowing {
  fn fields() -> Vec<Field<Self>> {
    vec![Field::integer("revnr", |s: &Self| s.rev.into())]
  }
}

#[test]
fn header_column_names_are_reserved() {
  let db = db();
  assert!(matches!(db.table::<Shadowing>("odd"), Err(Error::InvalidName { .. })));
  assert!(db.tables().is_empty());
}

#[test]
fn reopening_with_another_shape_is_rejected() {
  let dir = tempfile::tempdir().unwrap();
  file_db(&dir).table::<User>("people").unwrap();

  let Err(err) = file_db(&dir).table::<Person>("people") else {
    panic!("a table stored for another record shape should not open");
  };
  assert!(matches!(err, Error::Backend { op: "open", .. }), "{err}");
}

// ─── Files and connections ───────────────────────────────────────────────────

#[test]
fn database_is_named_after_the_file_stem() {
  let dir = tempfile::tempdir().unwrap();
  assert_eq!(file_db(&dir).name(), "store");
}

#[test]
fn reopen_restores_items_and_sequence() {
  let dir = tempfile::tempdir().unwrap();
  let (kept, gone) = {
    let db = file_db(&dir);
    let persons = db.table::<Person>("persons").unwrap();
    let kept = persons.add_item(Person::new("a", "b")).unwrap();
    let kept = persons.update(&kept, Person::new("a", "B")).unwrap();
    let gone = persons.add_item(Person::new("c", "d")).unwrap();
    persons.delete(&gone).unwrap();
    (kept, gone)
  };

  let db = file_db(&dir);
  let persons = db.table::<Person>("persons").unwrap();
  let got = persons.get_item(kept.uid()).unwrap().unwrap();
  assert_eq!((got.nid(), got.rev()), (kept.nid(), kept.rev()));
  assert_eq!(got.data(), &Person::new("a", "B"));
  assert_eq!(persons.count().unwrap(), 1);

  let next = persons.add_item(Person::new("e", "f")).unwrap();
  assert!(next.nid() > gone.nid());

  // Declarations live in the process; the stored rows are checked again.
  assert!(persons.index_names().is_empty());
  let unique = persons.index("unique", &["name", "surname"]).unwrap();
  assert_eq!(unique.find_one(&Person::new("a", "B").key()).unwrap().unwrap().uid(), kept.uid());
}

#[test]
fn writers_on_separate_connections_see_each_others_revisions() {
  let dir = tempfile::tempdir().unwrap();
  let left = file_db(&dir);
  let right = file_db(&dir);
  let l_users = left.table::<User>("users").unwrap();
  let r_users = right.table::<User>("users").unwrap();

  let base = l_users.add_item(User::new("base")).unwrap();
  let seen = r_users.get_item(base.uid()).unwrap().unwrap();
  l_users.update(&base, User::new("left")).unwrap();

  let err = r_users.update(&seen, User::new("right")).unwrap_err();
  assert!(
    matches!(err, Error::StaleRevision { candidate: 2, expected: Some(3), .. }),
    "{err}"
  );
  assert_eq!(r_users.get_item(base.uid()).unwrap().unwrap().data(), &User::new("left"));
}

#[test]
fn unique_violations_are_recognised() {
  let conn = rusqlite::Connection::open_in_memory().unwrap();
  conn.execute_batch("CREATE TABLE t (a INTEGER, UNIQUE (a)); INSERT INTO t VALUES (1);").unwrap();
  let err = crate::Error::from(conn.execute("INSERT INTO t VALUES (1)", []).unwrap_err());
  assert!(err.is_unique_violation());

  let other = crate::Error::from(conn.execute("INSERT INTO nope VALUES (1)", []).unwrap_err());
  assert!(!other.is_unique_violation());
}

#[test]
fn concurrent_updates_admit_exactly_one_winner() {
  let db = db();
  let users = db.table::<User>("users").unwrap();
  let base = users.add_item(User::new("base")).unwrap();

  let handles: Vec<_> = (0..8)
    .map(|i| {
      let users = Arc::clone(&users);
      let base = base.clone();
      thread::spawn(move || users.update(&base, User::new(&format!("w{i}"))).is_ok())
    })
    .collect();
  let winners = handles
    .into_iter()
    .map(|h| h.join().unwrap())
    .filter(|won| *won)
    .count();

  assert_eq!(winners, 1);
  assert_eq!(users.get_item(base.uid()).unwrap().unwrap().rev().nr(), 2);
}

#[test]
fn key_lookup_uses_bound_values() {
  let db = db();
  let users = db.table::<User>("users").unwrap();
  let by_name = users.index("username", &["name"]).unwrap();
  users.add_item(User::new("o'brien")).unwrap();
  assert!(by_name.find_one(&Key::new().with("name", "o'brien")).unwrap().is_some());
  assert!(by_name.find_one(&Key::new().with("name", "x' OR '1'='1")).unwrap().is_none());
}
