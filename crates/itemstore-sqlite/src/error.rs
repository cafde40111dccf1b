//! Error type for `itemstore-sqlite`.
//!
//! Table operations report these wrapped in
//! [`itemstore_core::Error::Backend`], naming the table and operation.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("database error: {0}")]
  Database(#[from] rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  /// A stored row that no record of the declared shape can come from.
  #[error("corrupt row: {0}")]
  Corrupt(String),

  /// The stored table was created for a different record shape.
  #[error("table {table} has columns {found:?}, expected {expected:?}")]
  SchemaMismatch {
    table:    String,
    found:    Vec<String>,
    expected: Vec<String>,
  },
}

impl Error {
  /// Whether an insert lost against a concurrent writer of the same
  /// revision.
  pub fn is_unique_violation(&self) -> bool {
    matches!(
      self,
      Self::Database(rusqlite::Error::SqliteFailure(e, _))
        if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    )
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
