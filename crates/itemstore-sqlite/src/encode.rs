//! Encoding and decoding between item parts and SQLite column values.
//!
//! Revision timestamps are stored as `YYYYmmddHHMMSS.fff` (UTC, millisecond
//! precision). Timestamp fields are stored as RFC 3339 strings with full
//! precision. Decimals are REAL, integers INTEGER, text TEXT.

use chrono::{DateTime, NaiveDateTime, Utc};
use itemstore_core::{
  FieldKind, FieldValue, Item, Record, Revision, Schema, TableRef,
  record::{decode_timestamp, encode_timestamp},
};
use rusqlite::types::Value;

use crate::{Error, Result};

const REV_TS_FORMAT: &str = "%Y%m%d%H%M%S%.3f";

/// Sub-second digits a revision timestamp survives with.
pub const REV_TS_DIGITS: u16 = 3;

// ─── Revision timestamps ─────────────────────────────────────────────────────

pub fn encode_rev_ts(ts: DateTime<Utc>) -> String { ts.format(REV_TS_FORMAT).to_string() }

pub fn decode_rev_ts(s: &str) -> Result<DateTime<Utc>> {
  NaiveDateTime::parse_from_str(s, REV_TS_FORMAT)
    .map(|dt| dt.and_utc())
    .map_err(|e| Error::DateParse(format!("{s:?}: {e}")))
}

// ─── Field values ────────────────────────────────────────────────────────────

pub fn encode_value(value: &FieldValue) -> Value {
  match value {
    FieldValue::Text(s) => Value::Text(s.clone()),
    FieldValue::Integer(n) => Value::Integer(*n),
    FieldValue::Decimal(d) => Value::Real(*d),
    FieldValue::Timestamp(ts) => Value::Text(encode_timestamp(*ts)),
  }
}

pub fn decode_value(field: &str, kind: FieldKind, value: Value) -> Result<FieldValue> {
  match (kind, value) {
    (FieldKind::Text, Value::Text(s)) => Ok(FieldValue::Text(s)),
    (FieldKind::Integer, Value::Integer(n)) => Ok(FieldValue::Integer(n)),
    (FieldKind::Decimal, Value::Real(d)) => Ok(FieldValue::Decimal(d)),
    (FieldKind::Decimal, Value::Integer(n)) => Ok(FieldValue::Decimal(n as f64)),
    (FieldKind::Timestamp, Value::Text(s)) => decode_timestamp(&s)
      .map(FieldValue::Timestamp)
      .map_err(|e| Error::DateParse(format!("{field} = {s:?}: {e}"))),
    (kind, other) => Err(Error::Corrupt(format!(
      "column {field} should hold {kind}, found {:?}",
      other.data_type()
    ))),
  }
}

// ─── Rows ────────────────────────────────────────────────────────────────────

/// One row as read from SQLite: the header columns, then one value per
/// field in schema order.
#[derive(Debug)]
pub struct RawRow {
  pub nid:     i64,
  pub uid:     String,
  pub rev_nr:  i64,
  pub rev_ts:  String,
  pub deleted: bool,
  pub values:  Vec<Value>,
}

impl RawRow {
  /// Read a row selected with [`TableSql`](crate::schema::TableSql)'s
  /// column order.
  pub fn read(row: &rusqlite::Row<'_>, fields: usize) -> rusqlite::Result<Self> {
    let mut values = Vec::with_capacity(fields);
    for i in 0..fields {
      values.push(row.get(5 + i)?);
    }
    Ok(Self {
      nid: row.get(0)?,
      uid: row.get(1)?,
      rev_nr: row.get(2)?,
      rev_ts: row.get(3)?,
      deleted: row.get(4)?,
      values,
    })
  }

  pub fn decode<R: Record>(self, table: &TableRef, schema: &Schema<R>) -> Result<Item<R>> {
    let nid = u64::try_from(self.nid)
      .map_err(|_| Error::Corrupt(format!("negative nid {}", self.nid)))?;
    let nr = u32::try_from(self.rev_nr)
      .map_err(|_| Error::Corrupt(format!("revision number {} out of range", self.rev_nr)))?;
    let rev = Revision::new(nr, decode_rev_ts(&self.rev_ts)?);

    let values = schema
      .fields()
      .iter()
      .zip(self.values)
      .map(|(field, value)| decode_value(field.name(), field.kind(), value))
      .collect::<Result<Vec<_>>>()?;
    let data = schema.decode(values)?;

    Ok(Item::new(table.clone(), nid, self.uid, rev, data))
  }
}
