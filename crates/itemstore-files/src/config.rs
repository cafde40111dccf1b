//! Configuration for the file backend.

use serde::Deserialize;

/// What bulk listings (items, index backfill) do with a bundle file that
/// cannot be read or decoded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnreadablePolicy {
  /// Log a warning and leave the file out.
  #[default]
  Skip,
  /// Fail the whole listing.
  Fail,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct FileConfig {
  #[serde(default)]
  pub unreadable: UnreadablePolicy,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn defaults_to_skipping() {
    let cfg: FileConfig = serde_json::from_str("{}").unwrap();
    assert_eq!(cfg.unreadable, UnreadablePolicy::Skip);

    let cfg: FileConfig = serde_json::from_str(r#"{"unreadable":"fail"}"#).unwrap();
    assert_eq!(cfg.unreadable, UnreadablePolicy::Fail);
  }
}
