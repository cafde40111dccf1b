//! Record shapes and their explicit schema descriptors.
//!
//! A record type lists its fields once, each with a name, a semantic kind and
//! an accessor. That [`Schema`] is reused for index keys, file bundles and
//! relational column mapping. Nothing is discovered by reflection.

use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Serialize, de::DeserializeOwned};

use crate::{Error, Result, identifier::validate_identifier};

// ─── Field kinds and values ──────────────────────────────────────────────────

/// The semantic type of a record field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
  Text,
  Integer,
  /// Fixed-point quantities, carried as `f64`.
  Decimal,
  Timestamp,
}

impl fmt::Display for FieldKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(match self {
      Self::Text => "text",
      Self::Integer => "integer",
      Self::Decimal => "decimal",
      Self::Timestamp => "timestamp",
    })
  }
}

/// A typed field value, as read through a [`Field`] accessor.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
  Text(String),
  Integer(i64),
  Decimal(f64),
  Timestamp(DateTime<Utc>),
}

impl FieldValue {
  pub fn kind(&self) -> FieldKind {
    match self {
      Self::Text(_) => FieldKind::Text,
      Self::Integer(_) => FieldKind::Integer,
      Self::Decimal(_) => FieldKind::Decimal,
      Self::Timestamp(_) => FieldKind::Timestamp,
    }
  }

  /// The JSON form serde expects for this value when decoding a record.
  pub fn to_json(&self) -> serde_json::Value {
    match self {
      Self::Text(s) => serde_json::Value::String(s.clone()),
      Self::Integer(i) => serde_json::Value::from(*i),
      Self::Decimal(d) => serde_json::Number::from_f64(*d)
        .map_or(serde_json::Value::Null, serde_json::Value::Number),
      Self::Timestamp(ts) => serde_json::Value::String(encode_timestamp(*ts)),
    }
  }
}

/// Lossless textual form for timestamp field values.
pub fn encode_timestamp(ts: DateTime<Utc>) -> String {
  ts.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

pub fn decode_timestamp(s: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
  DateTime::parse_from_rfc3339(s).map(|dt| dt.with_timezone(&Utc))
}

impl From<&str> for FieldValue {
  fn from(s: &str) -> Self { Self::Text(s.to_owned()) }
}

impl From<String> for FieldValue {
  fn from(s: String) -> Self { Self::Text(s) }
}

impl From<i64> for FieldValue {
  fn from(i: i64) -> Self { Self::Integer(i) }
}

impl From<i32> for FieldValue {
  fn from(i: i32) -> Self { Self::Integer(i.into()) }
}

impl From<u32> for FieldValue {
  fn from(i: u32) -> Self { Self::Integer(i.into()) }
}

impl From<f64> for FieldValue {
  fn from(d: f64) -> Self { Self::Decimal(d) }
}

impl From<DateTime<Utc>> for FieldValue {
  fn from(ts: DateTime<Utc>) -> Self { Self::Timestamp(ts) }
}

// ─── Record ──────────────────────────────────────────────────────────────────

/// A payload shape that can be stored in a table.
///
/// The serde field names must equal the names returned by [`Record::fields`];
/// the relational backend rebuilds records from columns keyed by those names.
pub trait Record:
  Clone + fmt::Debug + Serialize + DeserializeOwned + Send + Sync + 'static
{
  /// The fields of this shape, in column order.
  fn fields() -> Vec<Field<Self>>;

  /// Self-check run before a payload is persisted.
  fn validate(&self) -> Result<(), String> { Ok(()) }
}

/// One named, typed field of a record shape.
pub struct Field<R> {
  name: &'static str,
  kind: FieldKind,
  get:  fn(&R) -> FieldValue,
}

impl<R> Field<R> {
  pub fn new(name: &'static str, kind: FieldKind, get: fn(&R) -> FieldValue) -> Self {
    Self { name, kind, get }
  }

  pub fn text(name: &'static str, get: fn(&R) -> FieldValue) -> Self {
    Self::new(name, FieldKind::Text, get)
  }

  pub fn integer(name: &'static str, get: fn(&R) -> FieldValue) -> Self {
    Self::new(name, FieldKind::Integer, get)
  }

  pub fn decimal(name: &'static str, get: fn(&R) -> FieldValue) -> Self {
    Self::new(name, FieldKind::Decimal, get)
  }

  pub fn timestamp(name: &'static str, get: fn(&R) -> FieldValue) -> Self {
    Self::new(name, FieldKind::Timestamp, get)
  }

  pub fn name(&self) -> &'static str { self.name }

  pub fn kind(&self) -> FieldKind { self.kind }

  pub fn value(&self, record: &R) -> FieldValue { (self.get)(record) }
}

impl<R> Clone for Field<R> {
  fn clone(&self) -> Self { *self }
}

impl<R> Copy for Field<R> {}

impl<R> fmt::Debug for Field<R> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Field")
      .field("name", &self.name)
      .field("kind", &self.kind)
      .finish()
  }
}

// ─── Schema ──────────────────────────────────────────────────────────────────

/// The field list of a record shape, validated once per table declaration.
#[derive(Debug, Clone)]
pub struct Schema<R> {
  fields: Vec<Field<R>>,
}

impl<R: Record> Schema<R> {
  /// Describe `R`. Field names must be valid identifiers and unique.
  pub fn of() -> Result<Self> {
    let fields = R::fields();
    for (i, field) in fields.iter().enumerate() {
      validate_identifier(field.name)?;
      if fields[..i].iter().any(|f| f.name == field.name) {
        return Err(Error::InvalidName {
          name:   field.name.to_owned(),
          reason: "field declared twice",
        });
      }
    }
    Ok(Self { fields })
  }

  pub fn fields(&self) -> &[Field<R>] { &self.fields }

  pub fn field_names(&self) -> Vec<&'static str> {
    self.fields.iter().map(Field::name).collect()
  }

  pub fn position(&self, name: &str) -> Option<usize> {
    self.fields.iter().position(|f| f.name == name)
  }

  /// All field values of `record`, in schema order.
  pub fn values(&self, record: &R) -> Vec<FieldValue> {
    self.fields.iter().map(|f| f.value(record)).collect()
  }

  /// Reject values that cannot be stored faithfully: decimals must be
  /// finite.
  pub fn check_values(&self, record: &R) -> Result<(), String> {
    for field in &self.fields {
      match field.value(record) {
        FieldValue::Decimal(d) if !d.is_finite() => {
          return Err(format!("field {} holds {d}, not a finite decimal", field.name));
        }
        _ => {}
      }
    }
    Ok(())
  }

  /// Rebuild a record from values in schema order.
  pub fn decode(&self, values: Vec<FieldValue>) -> Result<R, serde_json::Error> {
    let object: serde_json::Map<String, serde_json::Value> = self
      .fields
      .iter()
      .zip(values)
      .map(|(field, value)| (field.name.to_owned(), value.to_json()))
      .collect();
    serde_json::from_value(serde_json::Value::Object(object))
  }
}

#[cfg(test)]
mod tests {
  use chrono::TimeZone as _;
  use serde::{Deserialize, Serialize};

  use super::*;

  #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
  struct Reading {
    sensor: String,
    seq:    i64,
    value:  f64,
    at:     DateTime<Utc>,
  }

  impl Record for Reading {
    fn fields() -> Vec<Field<Self>> {
      vec![
        Field::text("sensor", |r: &Self| r.sensor.clone().into()),
        Field::integer("seq", |r: &Self| r.seq.into()),
        Field::decimal("value", |r: &Self| r.value.into()),
        Field::timestamp("at", |r: &Self| r.at.into()),
      ]
    }
  }

  #[derive(Debug, Clone, Serialize, Deserialize)]
  struct Twice {
    a: String,
  }

  impl Record for Twice {
    fn fields() -> Vec<Field<Self>> {
      vec![
        Field::text("a", |r: &Self| r.a.clone().into()),
        Field::text("a", |r: &Self| r.a.clone().into()),
      ]
    }
  }

  #[test]
  fn values_follow_declaration_order() {
    let schema = Schema::<Reading>::of().unwrap();
    assert_eq!(schema.field_names(), ["sensor", "seq", "value", "at"]);
    assert_eq!(schema.position("value"), Some(2));
    assert_eq!(schema.position("missing"), None);
  }

  #[test]
  fn decode_rebuilds_record_from_values() {
    let schema = Schema::<Reading>::of().unwrap();
    let reading = Reading {
      sensor: "t1".into(),
      seq:    7,
      value:  21.25,
      at:     Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap(),
    };
    let decoded = schema.decode(schema.values(&reading)).unwrap();
    assert_eq!(decoded, reading);
  }

  #[test]
  fn non_finite_decimals_are_rejected() {
    let schema = Schema::<Reading>::of().unwrap();
    let mut reading = Reading {
      sensor: "t1".into(),
      seq:    1,
      value:  0.5,
      at:     Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap(),
    };
    assert!(schema.check_values(&reading).is_ok());

    for bad in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
      reading.value = bad;
      let reason = schema.check_values(&reading).unwrap_err();
      assert!(reason.contains("value"), "{reason}");
    }
  }

  #[test]
  fn duplicate_field_names_are_rejected() {
    assert!(matches!(
      Schema::<Twice>::of(),
      Err(Error::InvalidName { .. })
    ));
  }
}
