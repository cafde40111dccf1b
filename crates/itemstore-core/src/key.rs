//! Index lookup keys and their canonical encoding.
//!
//! A key component is type-tagged, and text is length-prefixed, so two keys
//! encode to the same string only when every component has the same kind and
//! the same value:
//!
//! | kind      | encoding                                   |
//! |-----------|--------------------------------------------|
//! | text      | `s<byte length>:<text>`                    |
//! | integer   | `i:<decimal>`                              |
//! | decimal   | `d:<shortest round-trip form>` (`-0` → `0`) |
//! | timestamp | `t:<RFC 3339, UTC, nanoseconds>`           |
//!
//! Components are joined with `|`.

use std::fmt::{self, Write as _};

use chrono::SecondsFormat;

use crate::record::FieldValue;

/// A lookup key: field names bound to values, in any order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Key {
  parts: Vec<(String, FieldValue)>,
}

impl Key {
  pub fn new() -> Self { Self::default() }

  /// Bind `name` to `value`, replacing an earlier binding of the same name.
  pub fn with(mut self, name: &str, value: impl Into<FieldValue>) -> Self {
    let value = value.into();
    match self.parts.iter_mut().find(|(n, _)| n == name) {
      Some(part) => part.1 = value,
      None => self.parts.push((name.to_owned(), value)),
    }
    self
  }

  pub fn get(&self, name: &str) -> Option<&FieldValue> {
    self.parts.iter().find(|(n, _)| n == name).map(|(_, v)| v)
  }

  pub fn names(&self) -> impl Iterator<Item = &str> {
    self.parts.iter().map(|(n, _)| n.as_str())
  }

  pub fn len(&self) -> usize { self.parts.len() }

  pub fn is_empty(&self) -> bool { self.parts.is_empty() }
}

/// The canonical string form of an ordered list of key values.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct IndexKey(String);

impl IndexKey {
  pub fn encode(values: &[FieldValue]) -> Self {
    let mut out = String::new();
    for (i, value) in values.iter().enumerate() {
      if i > 0 {
        out.push('|');
      }
      // Writing into a String cannot fail.
      let _ = match value {
        FieldValue::Text(s) => write!(out, "s{}:{s}", s.len()),
        FieldValue::Integer(n) => write!(out, "i:{n}"),
        FieldValue::Decimal(d) => {
          let d = if *d == 0.0 { 0.0 } else { *d };
          write!(out, "d:{d}")
        }
        FieldValue::Timestamp(ts) => write!(
          out,
          "t:{}",
          ts.to_rfc3339_opts(SecondsFormat::Nanos, true)
        ),
      };
    }
    Self(out)
  }

  pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for IndexKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
}

#[cfg(test)]
mod tests {
  use chrono::{TimeZone as _, Utc};

  use super::*;

  #[test]
  fn text_is_length_prefixed() {
    let a = IndexKey::encode(&["a|s1:b".into(), "c".into()]);
    let b = IndexKey::encode(&["a".into(), "b|s1:c".into()]);
    assert_ne!(a, b);
    assert_eq!(IndexKey::encode(&["ab".into()]).as_str(), "s2:ab");
  }

  #[test]
  fn kinds_are_tagged() {
    let text = IndexKey::encode(&["1".into()]);
    let int = IndexKey::encode(&[1i64.into()]);
    let dec = IndexKey::encode(&[1.0f64.into()]);
    assert_ne!(text, int);
    assert_ne!(int, dec);
  }

  #[test]
  fn decimals_are_canonical() {
    assert_eq!(
      IndexKey::encode(&[(-0.0f64).into()]),
      IndexKey::encode(&[0.0f64.into()])
    );
    assert_eq!(IndexKey::encode(&[2.50f64.into()]).as_str(), "d:2.5");
  }

  #[test]
  fn timestamps_are_fixed_width() {
    let ts = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
    assert_eq!(
      IndexKey::encode(&[ts.into()]).as_str(),
      "t:2024-01-02T03:04:05.000000000Z"
    );
  }

  #[test]
  fn key_with_replaces_binding() {
    let key = Key::new().with("name", "a").with("surname", "b").with("name", "c");
    assert_eq!(key.len(), 2);
    assert_eq!(key.get("name"), Some(&FieldValue::Text("c".into())));
    assert_eq!(key.names().collect::<Vec<_>>(), ["name", "surname"]);
  }
}
