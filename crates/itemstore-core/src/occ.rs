//! Optimistic concurrency control, applied identically by every backend.
//!
//! A mutation candidate is admitted only if it belongs to the receiving table
//! and carries exactly the stored revision number + 1. Update and delete use
//! the same rule; only updates carry a payload that must pass validation.

use crate::{
  Error, Result,
  item::{Item, TableRef},
  record::{Record, Schema},
};

/// Reject payloads that fail their own validation or hold values no backend
/// can store.
pub fn validate<R: Record>(table: &TableRef, schema: &Schema<R>, data: &R) -> Result<()> {
  data
    .validate()
    .and_then(|()| schema.check_values(data))
    .map_err(|reason| Error::Validation { table: table.name().to_owned(), reason })
}

/// Admit an update `candidate` against the receiving `table`.
///
/// `current` loads the stored live revision; it is only called once the
/// candidate passed the checks that need no stored state. On success the
/// stored revision is returned so the caller can re-key indexes.
pub fn admit_update<R, F>(
  table: &TableRef,
  schema: &Schema<R>,
  candidate: &Item<R>,
  current: F,
) -> Result<Item<R>>
where
  R: Record,
  F: FnOnce() -> Result<Option<Item<R>>>,
{
  admit(table, Some(schema), candidate, current)
}

/// Admit a delete `candidate`. Its payload is not validated: a stored item
/// can always be deleted from its latest copy.
pub fn admit_delete<R, F>(table: &TableRef, candidate: &Item<R>, current: F) -> Result<Item<R>>
where
  R: Record,
  F: FnOnce() -> Result<Option<Item<R>>>,
{
  admit(table, None, candidate, current)
}

fn admit<R, F>(
  table: &TableRef,
  schema: Option<&Schema<R>>,
  candidate: &Item<R>,
  current: F,
) -> Result<Item<R>>
where
  R: Record,
  F: FnOnce() -> Result<Option<Item<R>>>,
{
  if candidate.table() != table {
    return Err(Error::WrongTable {
      table: table.name().to_owned(),
      owner: candidate.table().name().to_owned(),
      uid:   candidate.uid().to_owned(),
    });
  }
  if candidate.rev().nr() <= 1 {
    return Err(stale(table, candidate, None));
  }
  if let Some(schema) = schema {
    validate(table, schema, candidate.data())?;
  }

  let not_found = || Error::NotFound {
    table: table.name().to_owned(),
    uid:   candidate.uid().to_owned(),
  };
  let cur = current()?.ok_or_else(not_found)?;
  if cur.nid() != candidate.nid() || cur.uid() != candidate.uid() {
    return Err(not_found());
  }

  let expected = cur.rev().nr() + 1;
  if candidate.rev().nr() != expected {
    return Err(stale(table, candidate, Some(expected)));
  }
  Ok(cur)
}

/// The error for a candidate whose revision is not the stored one + 1.
pub fn stale<R>(table: &TableRef, candidate: &Item<R>, expected: Option<u32>) -> Error {
  Error::StaleRevision {
    table:     table.name().to_owned(),
    uid:       candidate.uid().to_owned(),
    candidate: candidate.rev().nr(),
    expected,
  }
}
