//! Conformance scenarios shared by every backend's test suite.
//!
//! Each scenario takes a freshly opened [`Database`] and panics on the first
//! deviation from the table contract. Backends call them from their own
//! `#[test]` functions so the memory, file and SQLite realisations are held
//! to exactly the same observable behaviour.

use std::{cell::Cell, collections::HashSet};

use chrono::{DateTime, TimeZone as _, Utc};
use serde::{Deserialize, Serialize};

use crate::{AnyTable as _, Backend, Database, Error, Field, Index as _, Key, Record, Table as _};

// ─── Record shapes ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
  pub name: String,
}

impl User {
  pub fn new(name: &str) -> Self { Self { name: name.into() } }
}

impl Record for User {
  fn fields() -> Vec<Field<Self>> {
    vec![Field::text("name", |u: &Self| u.name.clone().into())]
  }

  fn validate(&self) -> Result<(), String> {
    if self.name.is_empty() {
      return Err("missing user.name".into());
    }
    Ok(())
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
  pub sid:   String,
  pub uname: String,
}

impl Record for Session {
  fn fields() -> Vec<Field<Self>> {
    vec![
      Field::text("sid", |s: &Self| s.sid.clone().into()),
      Field::text("uname", |s: &Self| s.uname.clone().into()),
    ]
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Person {
  pub name:    String,
  pub surname: String,
}

impl Person {
  pub fn new(name: &str, surname: &str) -> Self {
    Self { name: name.into(), surname: surname.into() }
  }

  pub fn key(&self) -> Key {
    Key::new().with("name", self.name.as_str()).with("surname", self.surname.as_str())
  }
}

impl Record for Person {
  fn fields() -> Vec<Field<Self>> {
    vec![
      Field::text("name", |p: &Self| p.name.clone().into()),
      Field::text("surname", |p: &Self| p.surname.clone().into()),
    ]
  }
}

/// One field of every kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
  pub sensor: String,
  pub seq:    i64,
  pub value:  f64,
  pub at:     DateTime<Utc>,
}

impl Record for Reading {
  fn fields() -> Vec<Field<Self>> {
    vec![
      Field::text("sensor", |r: &Self| r.sensor.clone().into()),
      Field::integer("seq", |r: &Self| r.seq.into()),
      Field::decimal("value", |r: &Self| r.value.into()),
      Field::timestamp("at", |r: &Self| r.at.into()),
    ]
  }
}

thread_local! {
  static MAX_NOTE_LEN: Cell<usize> = const { Cell::new(usize::MAX) };
}

/// A record whose validation rule can be tightened after items are stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
  pub text: String,
}

impl Note {
  pub fn new(text: &str) -> Self { Self { text: text.into() } }
}

impl Record for Note {
  fn fields() -> Vec<Field<Self>> {
    vec![Field::text("text", |n: &Self| n.text.clone().into())]
  }

  fn validate(&self) -> Result<(), String> {
    if self.text.len() > MAX_NOTE_LEN.get() {
      return Err(format!("note longer than {} bytes", MAX_NOTE_LEN.get()));
    }
    Ok(())
  }
}

fn reading(sensor: &str, seq: i64) -> Reading {
  Reading {
    sensor: sensor.into(),
    seq,
    value: 21.25,
    at: Utc.with_ymd_and_hms(2024, 2, 29, 23, 59, 58).unwrap()
      + chrono::Duration::milliseconds(125),
  }
}

// ─── Registry ────────────────────────────────────────────────────────────────

pub fn table_registry<B: Backend>(db: &Database<B>) {
  db.table::<User>("users").unwrap();
  assert_eq!(db.tables().len(), 1);
  db.table::<Session>("sessions").unwrap();
  assert_eq!(db.tables().len(), 2);

  assert!(matches!(db.table::<User>("users"), Err(Error::DuplicateName(_))));
  assert!(matches!(db.table::<User>("9lives"), Err(Error::InvalidName { .. })));
  assert_eq!(db.tables().len(), 2);

  assert!(db.get_table::<User>("users").is_some());
  assert!(db.get_table::<Session>("users").is_none());
  assert!(db.get_table::<User>("nope").is_none());

  let names: Vec<_> = db.tables().into_keys().collect();
  assert_eq!(names, ["sessions", "users"]);
  assert_eq!(db.tables()["sessions"].field_names(), ["sid", "uname"]);

  assert!(db.remove_table("sessions"));
  assert!(!db.remove_table("sessions"));
  assert_eq!(db.tables().len(), 1);
}

// ─── Revisions ───────────────────────────────────────────────────────────────

/// Add, find, update, stale update, delete.
pub fn revision_lifecycle<B: Backend>(db: &Database<B>) {
  let users = db.table::<User>("users").unwrap();
  users.del_all().unwrap();
  let by_name = users.index("username", &["name"]).unwrap();

  let u1 = users.add_item(User::new("one")).unwrap();
  assert_eq!(u1.rev().nr(), 1);
  let got_u1 = users.get_item(u1.uid()).unwrap().expect("one stored");
  assert_eq!(users.count().unwrap(), 1);

  let u2 = users.add_item(User::new("two")).unwrap();
  let got_u2 = users.get_item(u2.uid()).unwrap().expect("two stored");
  assert_eq!((got_u1.rev().nr(), got_u2.rev().nr()), (1, 1));
  assert_ne!(u1.uid(), u2.uid());

  let found = by_name.find_one(&Key::new().with("name", "one")).unwrap().expect("indexed");
  assert_eq!(found.uid(), u1.uid());
  assert_eq!(found.data(), &User::new("one"));

  let u1 = users.update(&u1, User::new("ONE")).unwrap();
  assert_eq!(u1.rev().nr(), 2);

  let got_u1x = users.get_item(u1.uid()).unwrap().expect("ONE stored");
  assert_eq!((got_u1x.nid(), got_u1x.uid()), (u1.nid(), u1.uid()));
  assert_eq!(got_u1x.rev().nr(), 2);
  assert_eq!(got_u1x.data(), &User::new("ONE"));
  assert_eq!(users.count().unwrap(), 2);

  // The copy read before the update is stale, every time.
  for _ in 0..2 {
    let err = users.update(&got_u1, User::new("ONEONE")).unwrap_err();
    assert!(
      matches!(err, Error::StaleRevision { candidate: 2, expected: Some(3), .. }),
      "{err}"
    );
  }
  assert_eq!(users.get_item(u1.uid()).unwrap().unwrap().data(), &User::new("ONE"));

  assert!(users.delete(&got_u1).unwrap_err().is_stale());
  users.delete(&got_u1x).unwrap();
  users.delete(&got_u2).unwrap();

  assert!(users.get_item(u1.uid()).unwrap().is_none());
  assert!(users.get_item(u2.uid()).unwrap().is_none());
  assert_eq!(users.count().unwrap(), 0);
}

pub fn update_requires_next_revision<B: Backend>(db: &Database<B>) {
  let users = db.table::<User>("users").unwrap();
  let u = users.add_item(User::new("a")).unwrap();

  // Revision 1 is never a valid mutation candidate.
  assert!(matches!(
    users.upd_item(u.clone()),
    Err(Error::StaleRevision { candidate: 1, expected: None, .. })
  ));

  // Skipping a revision is as stale as repeating one.
  let skipped = u.next(User::new("b")).next(User::new("c"));
  assert!(users.upd_item(skipped).unwrap_err().is_stale());

  let u = users.update(&u, User::new("b")).unwrap();
  let u = users.update(&u, User::new("c")).unwrap();
  assert_eq!(u.rev().nr(), 3);
  assert_eq!(users.get_item(u.uid()).unwrap().unwrap().rev().nr(), 3);

  assert!(matches!(
    users.update(&u, User::new("")),
    Err(Error::Validation { .. })
  ));
  assert_eq!(users.get_item(u.uid()).unwrap().unwrap().data(), &User::new("c"));
}

pub fn wrong_table_rejected<B: Backend>(db: &Database<B>) {
  let left = db.table::<User>("left").unwrap();
  let right = db.table::<User>("right").unwrap();
  let item = left.add_item(User::new("l")).unwrap();

  assert!(matches!(
    right.update(&item, User::new("r")),
    Err(Error::WrongTable { .. })
  ));
  assert!(matches!(right.delete(&item), Err(Error::WrongTable { .. })));
  assert_eq!(left.get_item(item.uid()).unwrap().unwrap().rev().nr(), 1);
}

pub fn missing_items_not_found<B: Backend>(db: &Database<B>) {
  let users = db.table::<User>("users").unwrap();
  let u = users.add_item(User::new("gone")).unwrap();
  users.delete(&u).unwrap();

  assert!(matches!(users.update(&u, User::new("back")), Err(Error::NotFound { .. })));
  assert!(matches!(users.delete(&u), Err(Error::NotFound { .. })));
  assert!(users.get_item("no-such-item").unwrap().is_none());
}

pub fn deletes_ignore_payload_validation<B: Backend>(db: &Database<B>) {
  let notes = db.table::<Note>("notes").unwrap();
  let note = notes.add_item(Note::new("written before the limit")).unwrap();

  MAX_NOTE_LEN.set(4);
  assert!(matches!(
    notes.update(&note, Note::new("still too long")),
    Err(Error::Validation { .. })
  ));
  let deleted = notes.delete(&note);
  MAX_NOTE_LEN.set(usize::MAX);

  deleted.unwrap();
  assert!(notes.get_item(note.uid()).unwrap().is_none());
  assert_eq!(notes.count().unwrap(), 0);
}

// ─── Identity ────────────────────────────────────────────────────────────────

pub fn identities_are_unique_and_sequential<B: Backend>(db: &Database<B>) {
  let users = db.table::<User>("users").unwrap();

  let first = users.add_item(User::new("u0")).unwrap();
  assert!(matches!(users.add_item(User::new("")), Err(Error::Validation { .. })));
  let mut added = vec![first];
  for i in 1..5 {
    added.push(users.add_item(User::new(&format!("u{i}"))).unwrap());
  }

  // A rejected add does not consume a sequence number.
  assert_eq!(added[1].nid(), added[0].nid() + 1);
  assert!(added.windows(2).all(|w| w[0].nid() < w[1].nid()));
  assert!(added.iter().all(|i| i.rev().nr() == 1));
  let uids: HashSet<_> = added.iter().map(|i| i.uid().to_owned()).collect();
  assert_eq!(uids.len(), added.len());

  // Sequence numbers are never reused, even after deletion.
  let last = added.last().unwrap().clone();
  users.delete(&last).unwrap();
  let next = users.add_item(User::new("u5")).unwrap();
  assert!(next.nid() > last.nid());

  // Updates keep the identity.
  let upd = users.update(&added[0], User::new("renamed")).unwrap();
  assert_eq!((upd.nid(), upd.uid()), (added[0].nid(), added[0].uid()));
}

// ─── Round-trip ──────────────────────────────────────────────────────────────

pub fn round_trip_all_field_kinds<B: Backend>(db: &Database<B>) {
  let readings = db.table::<Reading>("readings").unwrap();

  let added = readings.add_item(reading("t1", 7)).unwrap();
  let got = readings.get_item(added.uid()).unwrap().unwrap();
  assert_eq!(got.data(), &reading("t1", 7));
  assert_eq!(got.rev(), added.rev());
  assert_eq!(got.nid(), added.nid());

  let mut changed = reading("t1", 8);
  changed.value = -0.5;
  let upd = readings.update(&got, changed.clone()).unwrap();
  let got = readings.get_item(upd.uid()).unwrap().unwrap();
  assert_eq!(got.data(), &changed);
  assert_eq!(got.rev(), upd.rev());
}

pub fn non_finite_decimals_rejected<B: Backend>(db: &Database<B>) {
  let readings = db.table::<Reading>("readings").unwrap();
  for bad in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
    let mut r = reading("t1", 1);
    r.value = bad;
    assert!(matches!(readings.add_item(r), Err(Error::Validation { .. })), "{bad}");
  }
  assert_eq!(readings.count().unwrap(), 0);

  let stored = readings.add_item(reading("t1", 1)).unwrap();
  let mut r = reading("t1", 2);
  r.value = f64::NAN;
  assert!(matches!(readings.update(&stored, r), Err(Error::Validation { .. })));

  // The stored item stays readable and mutable.
  let got = readings.get_item(stored.uid()).unwrap().unwrap();
  assert_eq!(got.data(), &reading("t1", 1));
  readings.delete(&got).unwrap();
  assert_eq!(readings.count().unwrap(), 0);
}

// ─── Listing ─────────────────────────────────────────────────────────────────

pub fn items_and_count_track_live_items<B: Backend>(db: &Database<B>) {
  let persons = db.table::<Person>("persons").unwrap();
  let a = persons.add_item(Person::new("a", "b")).unwrap();
  let c = persons.add_item(Person::new("c", "d")).unwrap();
  let e = persons.add_item(Person::new("e", "f")).unwrap();
  let c = persons.update(&c, Person::new("c", "D")).unwrap();

  let snapshot = persons.items().unwrap();
  assert_eq!(snapshot.len(), 3);
  assert_eq!(snapshot[c.uid()].rev().nr(), 2);
  assert_eq!(snapshot[c.uid()].data(), &Person::new("c", "D"));
  assert_eq!(snapshot[a.uid()].data(), &Person::new("a", "b"));

  persons.delete(&e).unwrap();
  assert_eq!(persons.count().unwrap(), 2);
  assert!(!persons.items().unwrap().contains_key(e.uid()));
  // The earlier snapshot is not a live view.
  assert_eq!(snapshot.len(), 3);
}

pub fn del_all_empties_table<B: Backend>(db: &Database<B>) {
  let persons = db.table::<Person>("persons").unwrap();
  let unique = persons.index("unique", &["name", "surname"]).unwrap();
  let mut last_nid = 0;
  for p in [Person::new("a", "b"), Person::new("c", "d"), Person::new("e", "f")] {
    last_nid = persons.add_item(p).unwrap().nid();
  }

  persons.del_all().unwrap();
  assert_eq!(persons.count().unwrap(), 0);
  assert!(persons.items().unwrap().is_empty());
  assert!(unique.find_one(&Person::new("a", "b").key()).unwrap().is_none());

  // Keys are free again and the sequence keeps counting.
  let again = persons.add_item(Person::new("a", "b")).unwrap();
  assert!(again.nid() > last_nid);
  assert_eq!(
    unique.find_one(&Person::new("a", "b").key()).unwrap().unwrap().uid(),
    again.uid()
  );
}

// ─── Indexes ─────────────────────────────────────────────────────────────────

/// Two-field composite index: lookups and duplicate rejection.
pub fn composite_index<B: Backend>(db: &Database<B>) {
  let persons = db.table::<Person>("persons").unwrap();
  persons.del_all().unwrap();
  let unique = persons.index("unique", &["name", "surname"]).unwrap();
  assert_eq!(unique.fields(), ["name", "surname"]);

  let list = [Person::new("a", "b"), Person::new("c", "d"), Person::new("e", "f")];
  let uids: Vec<_> = list
    .iter()
    .map(|p| persons.add_item(p.clone()).unwrap().uid().to_owned())
    .collect();

  for (p, uid) in list.iter().zip(&uids) {
    let got = persons.get_item(uid).unwrap().expect("stored");
    assert_eq!(got.data(), p);

    let found = unique.find_one(&p.key()).unwrap().expect("indexed");
    assert_eq!(found.uid(), uid);
    assert_eq!(found.data(), p);
  }

  let err = persons.add_item(Person::new("a", "b")).unwrap_err();
  assert!(matches!(err, Error::DuplicateKey { .. }), "{err}");
  assert_eq!(persons.count().unwrap(), 3);
  assert!(
    persons
      .items()
      .unwrap()
      .values()
      .filter(|i| i.data() == &Person::new("a", "b"))
      .count()
      == 1
  );

  // Components are not confused across field boundaries.
  assert!(unique.find_one(&Person::new("ab", "").key()).unwrap().is_none());
  persons.add_item(Person::new("ab", "")).unwrap();

  assert!(matches!(unique.find(&list[0].key()), Err(Error::NotImplemented { .. })));
}

pub fn index_declaration<B: Backend>(db: &Database<B>) {
  let persons = db.table::<Person>("persons").unwrap();
  let a = persons.add_item(Person::new("a", "b")).unwrap();
  persons.add_item(Person::new("a", "c")).unwrap();

  // Backfilled from existing items.
  let by_surname = persons.index("by_surname", &["surname"]).unwrap();
  let found = by_surname.find_one(&Key::new().with("surname", "b")).unwrap().unwrap();
  assert_eq!(found.uid(), a.uid());

  assert!(matches!(
    persons.index("by_surname", &["name"]),
    Err(Error::DuplicateIndex { .. })
  ));
  assert!(matches!(
    persons.index("by_nick", &["nickname"]),
    Err(Error::UnknownField { .. })
  ));
  // Existing items already collide on `name`.
  assert!(matches!(
    persons.index("by_name", &["name"]),
    Err(Error::DuplicateKey { .. })
  ));

  let mut names = persons.index_names();
  names.sort();
  assert_eq!(names, ["by_surname"]);

  assert!(matches!(
    by_surname.find_one(&Key::new().with("name", "a")),
    Err(Error::UnknownField { .. })
  ));
}

pub fn index_follows_updates_and_deletes<B: Backend>(db: &Database<B>) {
  let users = db.table::<User>("users").unwrap();
  let by_name = users.index("username", &["name"]).unwrap();
  let a = users.add_item(User::new("a")).unwrap();
  let b = users.add_item(User::new("b")).unwrap();

  let a = users.update(&a, User::new("z")).unwrap();
  assert!(by_name.find_one(&Key::new().with("name", "a")).unwrap().is_none());
  let found = by_name.find_one(&Key::new().with("name", "z")).unwrap().unwrap();
  assert_eq!((found.uid(), found.rev().nr()), (a.uid(), 2));

  // Updating onto another item's key is rejected and changes nothing.
  let err = users.update(&b, User::new("z")).unwrap_err();
  assert!(matches!(err, Error::DuplicateKey { .. }), "{err}");
  assert_eq!(users.get_item(b.uid()).unwrap().unwrap().rev().nr(), 1);

  // A deleted item releases its key.
  users.delete(&a).unwrap();
  assert!(by_name.find_one(&Key::new().with("name", "z")).unwrap().is_none());
  let z = users.add_item(User::new("z")).unwrap();
  assert_eq!(by_name.find_one(&Key::new().with("name", "z")).unwrap().unwrap().uid(), z.uid());
}

pub fn index_on_typed_fields<B: Backend>(db: &Database<B>) {
  let readings = db.table::<Reading>("readings").unwrap();
  let by_seq = readings.index("by_sensor_seq", &["sensor", "seq"]).unwrap();
  let by_value = readings.index("by_value", &["value"]).unwrap();

  let r = readings.add_item(reading("t1", 1)).unwrap();
  let mut other = reading("t1", 2);
  other.value = 3.0;
  let o = readings.add_item(other).unwrap();

  let key = Key::new().with("sensor", "t1").with("seq", 1);
  assert_eq!(by_seq.find_one(&key).unwrap().unwrap().uid(), r.uid());
  // An integer key value is accepted for a decimal field.
  assert_eq!(by_value.find_one(&Key::new().with("value", 3)).unwrap().unwrap().uid(), o.uid());
  assert!(matches!(
    by_seq.find_one(&Key::new().with("sensor", "t1").with("seq", "1")),
    Err(Error::InvalidKey { .. })
  ));
}
