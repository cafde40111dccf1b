//! Conformance and backend-specific tests for the in-memory backend.

use std::{sync::Arc, thread};

use itemstore_core::{
  AnyTable as _, Database, Table as _,
  testing::{self, User},
};

use crate::MemBackend;

fn db() -> Database<MemBackend> { crate::open("store") }

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

// ─── Memory-specific ─────────────────────────────────────────────────────────

#[test]
fn item_timestamps_are_kept_exactly() {
  let users = db().table::<User>("users").unwrap();
  let added = users.add_item(User::new("a")).unwrap();
  let got = users.get_item(added.uid()).unwrap().unwrap();
  assert_eq!(got.rev().timestamp(), added.rev().timestamp());
}

#[test]
fn concurrent_updates_admit_exactly_one_winner() {
  let users = db().table::<User>("users").unwrap();
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
  assert_eq!(users.count().unwrap(), 1);
}
