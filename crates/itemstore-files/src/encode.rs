//! The on-disk bundle: one JSON object per stored revision.
//!
//! ```json
//! { "uid": "…", "nid": 7, "revNr": 2, "revTs": "20240229235958+0000", "data": { … } }
//! ```
//!
//! Revision timestamps keep whole seconds only; tables truncate before
//! writing so what they return matches what a later read produces.

use chrono::{DateTime, Utc};
use itemstore_core::{Item, Record, Revision, TableRef};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

const REV_TS_FORMAT: &str = "%Y%m%d%H%M%S%z";

/// Sub-second digits a revision timestamp survives with.
pub const REV_TS_DIGITS: u16 = 0;

#[derive(Serialize)]
struct BundleRef<'a, R> {
  uid:    &'a str,
  nid:    u64,
  #[serde(rename = "revNr")]
  rev_nr: u32,
  #[serde(rename = "revTs")]
  rev_ts: String,
  data:   &'a R,
}

#[derive(Deserialize)]
struct Bundle<R> {
  uid:    String,
  nid:    u64,
  #[serde(rename = "revNr")]
  rev_nr: u32,
  #[serde(rename = "revTs")]
  rev_ts: String,
  data:   R,
}

/// Just enough of a bundle to restore the sequence counter.
#[derive(Deserialize)]
struct Header {
  nid: u64,
}

// ─── Revision timestamps ─────────────────────────────────────────────────────

pub fn encode_rev_ts(ts: DateTime<Utc>) -> String { ts.format(REV_TS_FORMAT).to_string() }

pub fn decode_rev_ts(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_str(s, REV_TS_FORMAT)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(format!("{s:?}: {e}")))
}

// ─── Bundles ─────────────────────────────────────────────────────────────────

pub fn encode<R: Record>(item: &Item<R>) -> Result<Vec<u8>> {
  let bundle = BundleRef {
    uid:    item.uid(),
    nid:    item.nid(),
    rev_nr: item.rev().nr(),
    rev_ts: encode_rev_ts(item.rev().timestamp()),
    data:   item.data(),
  };
  Ok(serde_json::to_vec_pretty(&bundle)?)
}

pub fn decode<R: Record>(table: &TableRef, bytes: &[u8]) -> Result<Item<R>> {
  let bundle: Bundle<R> = serde_json::from_slice(bytes)?;
  let rev = Revision::new(bundle.rev_nr, decode_rev_ts(&bundle.rev_ts)?);
  Ok(Item::new(table.clone(), bundle.nid, bundle.uid, rev, bundle.data))
}

pub fn decode_nid(bytes: &[u8]) -> Result<u64> {
  Ok(serde_json::from_slice::<Header>(bytes)?.nid)
}

#[cfg(test)]
mod tests {
  use chrono::{TimeZone as _, Timelike as _};
  use itemstore_core::testing::User;

  use super::*;

  #[test]
  fn rev_ts_has_second_precision() {
    let ts = Utc.with_ymd_and_hms(2024, 2, 29, 23, 59, 58).unwrap();
    assert_eq!(encode_rev_ts(ts), "20240229235958+0000");
    assert_eq!(decode_rev_ts("20240229235958+0000").unwrap(), ts);

    let fine = ts.with_nanosecond(999_000_000).unwrap();
    assert_eq!(decode_rev_ts(&encode_rev_ts(fine)).unwrap(), ts);
  }

  #[test]
  fn rev_ts_offsets_normalise_to_utc() {
    let ts = decode_rev_ts("20240301015958+0200").unwrap();
    assert_eq!(ts, Utc.with_ymd_and_hms(2024, 2, 29, 23, 59, 58).unwrap());
  }

  #[test]
  fn rejects_garbage_rev_ts() {
    assert!(matches!(decode_rev_ts("yesterday"), Err(Error::DateParse(_))));
  }

  #[test]
  fn bundle_layout() {
    let table = TableRef::new("users");
    let ts = Utc.with_ymd_and_hms(2024, 2, 29, 23, 59, 58).unwrap();
    let item = Item::new(table.clone(), 7, "abc".into(), Revision::new(2, ts), User::new("x"));

    let bytes = encode(&item).unwrap();
    let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(
      json,
      serde_json::json!({
        "uid": "abc", "nid": 7, "revNr": 2, "revTs": "20240229235958+0000",
        "data": { "name": "x" }
      })
    );

    let back: Item<User> = decode(&table, &bytes).unwrap();
    assert_eq!((back.nid(), back.uid(), back.rev()), (7, "abc", item.rev()));
    assert_eq!(back.data(), &User::new("x"));
    assert_eq!(decode_nid(&bytes).unwrap(), 7);
  }

  #[test]
  fn truncated_payload_is_a_json_error() {
    let err = decode::<User>(&TableRef::new("users"), br#"{"uid": "abc", "nid""#);
    assert!(matches!(err, Err(Error::Json(_))));
  }
}
