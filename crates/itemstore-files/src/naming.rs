//! File names inside a table directory.
//!
//! | file                             | meaning                               |
//! |----------------------------------|---------------------------------------|
//! | `{table}_{uid}.json`             | current revision                      |
//! | `{table}_{uid}_r{nr}.json`       | revision `nr - 1`, saved before update `nr` |
//! | `deleted_{table}_{uid}.json`     | last revision of a deleted item       |
//!
//! The sequence file [`SEQUENCE_FILE`] keeps the highest `nid` ever issued,
//! so `del_all` cannot make the table hand out old numbers again. Anything
//! else in the directory (temporary files included) is ignored.

/// Holds the sequence high-water mark; never removed with the bundles.
pub const SEQUENCE_FILE: &str = ".seq";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileName {
  Current { uid: String },
  Revision { uid: String, nr: u32 },
  Deleted { uid: String },
}

/// Item ids are hyphenated UUIDs; anything else cannot name a bundle file.
pub fn valid_uid(uid: &str) -> bool {
  !uid.is_empty() && uid.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
}

impl FileName {
  /// Classify `file_name` as a bundle of `table`, if it is one.
  pub fn parse(table: &str, file_name: &str) -> Option<Self> {
    let stem = file_name.strip_suffix(".json")?;

    if let Some(uid) = stem
      .strip_prefix("deleted_")
      .and_then(|rest| rest.strip_prefix(table))
      .and_then(|rest| rest.strip_prefix('_'))
      .filter(|uid| valid_uid(uid))
    {
      return Some(Self::Deleted { uid: uid.to_owned() });
    }

    let rest = stem.strip_prefix(table)?.strip_prefix('_')?;
    if let Some((uid, nr)) = rest.split_once("_r") {
      let nr = nr.parse().ok().filter(|nr| *nr > 1)?;
      return valid_uid(uid).then(|| Self::Revision { uid: uid.to_owned(), nr });
    }
    valid_uid(rest).then(|| Self::Current { uid: rest.to_owned() })
  }

  pub fn uid(&self) -> &str {
    match self {
      Self::Current { uid } | Self::Revision { uid, .. } | Self::Deleted { uid } => uid,
    }
  }

  pub fn is_current(&self) -> bool { matches!(self, Self::Current { .. }) }

  /// The on-disk name within the directory of `table`.
  pub fn render(&self, table: &str) -> String {
    match self {
      Self::Current { uid } => format!("{table}_{uid}.json"),
      Self::Revision { uid, nr } => format!("{table}_{uid}_r{nr}.json"),
      Self::Deleted { uid } => format!("deleted_{table}_{uid}.json"),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  const UID: &str = "0b6f3c1e-9d7a-4f43-8a51-1f2e3d4c5b6a";

  #[test]
  fn renders_the_three_layouts() {
    let cur = FileName::Current { uid: UID.into() };
    let rev = FileName::Revision { uid: UID.into(), nr: 3 };
    let del = FileName::Deleted { uid: UID.into() };
    assert_eq!(cur.render("users"), format!("users_{UID}.json"));
    assert_eq!(rev.render("users"), format!("users_{UID}_r3.json"));
    assert_eq!(del.render("users"), format!("deleted_users_{UID}.json"));
  }

  #[test]
  fn parse_inverts_render() {
    for name in [
      FileName::Current { uid: UID.into() },
      FileName::Revision { uid: UID.into(), nr: 12 },
      FileName::Deleted { uid: UID.into() },
    ] {
      for table in ["users", "deleted", "user_v2"] {
        assert_eq!(FileName::parse(table, &name.render(table)), Some(name.clone()));
      }
    }
  }

  #[test]
  fn only_current_files_are_current() {
    assert!(FileName::parse("users", &format!("users_{UID}.json")).unwrap().is_current());
    assert!(!FileName::parse("users", &format!("users_{UID}_r2.json")).unwrap().is_current());
    assert!(!FileName::parse("users", &format!("deleted_users_{UID}.json")).unwrap().is_current());
  }

  #[test]
  fn ignores_foreign_files() {
    for name in [
      format!(".users_{UID}.json.tmp"),
      format!("users_{UID}.txt"),
      format!("sessions_{UID}.json"),
      format!("users_{UID}_rx.json"),
      "users_.json".to_owned(),
      "users_../x.json".to_owned(),
    ] {
      assert_eq!(FileName::parse("users", &name), None, "{name}");
    }
  }

  #[test]
  fn uids_are_restricted() {
    assert!(valid_uid(UID));
    assert!(!valid_uid(""));
    assert!(!valid_uid("../etc/passwd"));
    assert!(!valid_uid("a_b"));
  }
}
