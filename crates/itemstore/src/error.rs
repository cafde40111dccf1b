//! Error type for the `itemstore` facade.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("config error: {0}")]
  Config(#[from] config::ConfigError),

  #[error("store error: {0}")]
  Store(#[from] itemstore_core::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
