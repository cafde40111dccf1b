//! Error type for bundle and sequence files in `itemstore-files`.
//!
//! These never reach callers directly: the table wraps them in
//! [`itemstore_core::Error::Backend`] together with the failing operation.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("io error: {0}")]
  Io(#[from] std::io::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  #[error("bad sequence file: {0}")]
  Sequence(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
