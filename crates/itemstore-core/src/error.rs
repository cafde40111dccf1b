//! Error types for `itemstore-core`.
//!
//! Every backend reports through this one taxonomy so callers can match on the
//! same variants regardless of the substrate behind a table.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("invalid name {name:?}: {reason}")]
  InvalidName { name: String, reason: &'static str },

  #[error("invalid {table} record: {reason}")]
  Validation { table: String, reason: String },

  #[error("table {0} already exists")]
  DuplicateName(String),

  #[error("index {index} already exists on table {table}")]
  DuplicateIndex { table: String, index: String },

  #[error("duplicate key {key} in index {index} of table {table}")]
  DuplicateKey {
    table: String,
    index: String,
    key:   String,
  },

  #[error("{table}: no current item {uid}")]
  NotFound { table: String, uid: String },

  #[error("item {uid} belongs to table {owner}, not {table}")]
  WrongTable {
    table: String,
    owner: String,
    uid:   String,
  },

  /// The caller's copy is not the latest revision; re-read and retry.
  #[error(
    "{table}: stale revision {candidate} for item {uid} (expected {})",
    .expected.map_or_else(|| "a revision > 1".to_owned(), |nr| nr.to_string())
  )]
  StaleRevision {
    table:     String,
    uid:       String,
    candidate: u32,
    expected:  Option<u32>,
  },

  #[error("{table} has no field {field:?}")]
  UnknownField { table: String, field: String },

  #[error("{table} has no index {index}")]
  UnknownIndex { table: String, index: String },

  #[error("invalid key for index {index}: {reason}")]
  InvalidKey { index: String, reason: String },

  #[error("{op} is not implemented by index {index}")]
  NotImplemented { index: String, op: &'static str },

  /// Persistence failure: disk, encoding or relational round-trip.
  #[error(
    "{table}.{op}({}) failed: {source}",
    .uid.as_deref().unwrap_or("-")
  )]
  Backend {
    table:  String,
    op:     &'static str,
    uid:    Option<String>,
    #[source]
    source: Box<dyn std::error::Error + Send + Sync>,
  },
}

impl Error {
  /// Build a [`Error::Backend`] from any underlying failure.
  pub fn backend(
    table: &str,
    op: &'static str,
    uid: Option<&str>,
    source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
  ) -> Self {
    Self::Backend {
      table: table.to_owned(),
      op,
      uid: uid.map(str::to_owned),
      source: source.into(),
    }
  }

  /// Whether a caller should re-read the item and retry the mutation.
  pub fn is_stale(&self) -> bool { matches!(self, Self::StaleRevision { .. }) }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Attach table/operation/item context to substrate errors.
pub trait BackendContext<T> {
  fn backend_ctx(
    self,
    table: &str,
    op: &'static str,
    uid: Option<&str>,
  ) -> Result<T>;
}

impl<T, E> BackendContext<T> for std::result::Result<T, E>
where
  E: std::error::Error + Send + Sync + 'static,
{
  fn backend_ctx(
    self,
    table: &str,
    op: &'static str,
    uid: Option<&str>,
  ) -> Result<T> {
    self.map_err(|e| Error::backend(table, op, uid, e))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn backend_error_names_table_op_and_item() {
    let io = std::io::Error::new(std::io::ErrorKind::Other, "disk full");
    let err: Result<()> = Err(io).backend_ctx("users", "upd_item", Some("abc"));
    let msg = err.unwrap_err().to_string();
    assert_eq!(msg, "users.upd_item(abc) failed: disk full");
  }

  #[test]
  fn stale_revision_message_without_expectation() {
    let err = Error::StaleRevision {
      table:     "users".into(),
      uid:       "abc".into(),
      candidate: 1,
      expected:  None,
    };
    assert!(err.is_stale());
    assert!(err.to_string().contains("expected a revision > 1"));
  }
}
