//! Secondary indexes: declaration, key computation and the in-process
//! key → uid bookkeeping shared by the memory and file backends.

use std::collections::BTreeMap;

use crate::{
  Error, Result,
  identifier::validate_identifier,
  item::Item,
  key::{IndexKey, Key},
  record::{Field, FieldKind, FieldValue, Record, Schema},
};

// ─── Trait ───────────────────────────────────────────────────────────────────

/// A unique lookup structure over a declared list of record fields.
pub trait Index<R: Record>: Send + Sync {
  fn name(&self) -> &str;

  /// The key schema, in declaration order.
  fn fields(&self) -> Vec<&'static str>;

  /// The current item whose key matches, if any.
  fn find_one(&self, key: &Key) -> Result<Option<Item<R>>>;

  /// Multi-result lookup. No backend supports it; callers must not rely on
  /// it.
  fn find(&self, key: &Key) -> Result<Vec<Item<R>>> {
    let _ = key;
    Err(Error::NotImplemented { index: self.name().to_owned(), op: "find" })
  }
}

// ─── Definition ──────────────────────────────────────────────────────────────

/// A validated index declaration: its name and the schema fields it covers.
#[derive(Debug, Clone)]
pub struct IndexDef<R> {
  table:  String,
  name:   String,
  fields: Vec<Field<R>>,
}

impl<R: Record> IndexDef<R> {
  pub fn new(
    schema: &Schema<R>,
    table: &str,
    name: &str,
    field_names: &[&str],
  ) -> Result<Self> {
    validate_identifier(name)?;
    if field_names.is_empty() {
      return Err(Error::InvalidName {
        name:   name.to_owned(),
        reason: "an index needs at least one field",
      });
    }

    let mut fields = Vec::with_capacity(field_names.len());
    for (i, field_name) in field_names.iter().enumerate() {
      let pos = schema.position(field_name).ok_or_else(|| Error::UnknownField {
        table: table.to_owned(),
        field: (*field_name).to_owned(),
      })?;
      if field_names[..i].contains(field_name) {
        return Err(Error::InvalidName {
          name:   (*field_name).to_owned(),
          reason: "field listed twice in index",
        });
      }
      fields.push(schema.fields()[pos]);
    }

    Ok(Self { table: table.to_owned(), name: name.to_owned(), fields })
  }

  pub fn name(&self) -> &str { &self.name }

  pub fn field_names(&self) -> Vec<&'static str> {
    self.fields.iter().map(Field::name).collect()
  }

  /// The indexed values of `record`, in declaration order.
  pub fn values_of(&self, record: &R) -> Vec<FieldValue> {
    self.fields.iter().map(|f| f.value(record)).collect()
  }

  pub fn key_of(&self, record: &R) -> IndexKey { IndexKey::encode(&self.values_of(record)) }

  /// The key values in declaration order. The key must bind exactly the
  /// indexed fields; an integer bound to a decimal field is widened.
  pub fn values_from(&self, key: &Key) -> Result<Vec<FieldValue>> {
    if let Some(extra) = key
      .names()
      .find(|n| !self.fields.iter().any(|f| f.name() == *n))
    {
      return Err(Error::UnknownField {
        table: self.table.clone(),
        field: extra.to_owned(),
      });
    }

    self
      .fields
      .iter()
      .map(|field| {
        let value = key.get(field.name()).ok_or_else(|| Error::InvalidKey {
          index:  self.name.clone(),
          reason: format!("missing value for field {}", field.name()),
        })?;
        match (field.kind(), value) {
          (FieldKind::Decimal, FieldValue::Integer(n)) => {
            Ok(FieldValue::Decimal(*n as f64))
          }
          (kind, value) if kind == value.kind() => Ok(value.clone()),
          (kind, value) => Err(Error::InvalidKey {
            index:  self.name.clone(),
            reason: format!(
              "field {} is {kind}, got a {} value",
              field.name(),
              value.kind()
            ),
          }),
        }
      })
      .collect()
  }

  pub fn key_from(&self, key: &Key) -> Result<IndexKey> {
    Ok(IndexKey::encode(&self.values_from(key)?))
  }

  /// The error for a second live item holding `key`.
  pub fn duplicate(&self, key: &IndexKey) -> Error {
    Error::DuplicateKey {
      table: self.table.clone(),
      index: self.name.clone(),
      key:   key.to_string(),
    }
  }
}

// ─── In-process bookkeeping ──────────────────────────────────────────────────

/// The declared indexes of one table, each mapping canonical keys to the uid
/// of the live item holding that key.
#[derive(Debug)]
pub struct KeyIndexes<R> {
  table:   String,
  indexes: BTreeMap<String, (IndexDef<R>, BTreeMap<IndexKey, String>)>,
}

impl<R: Record> KeyIndexes<R> {
  pub fn new(table: &str) -> Self {
    Self { table: table.to_owned(), indexes: BTreeMap::new() }
  }

  pub fn names(&self) -> Vec<String> { self.indexes.keys().cloned().collect() }

  pub fn contains(&self, name: &str) -> bool { self.indexes.contains_key(name) }

  /// Register `def`, backfilled from `live`. Nothing is registered when a
  /// duplicate name or key is found.
  pub fn declare<'a>(
    &mut self,
    def: IndexDef<R>,
    live: impl IntoIterator<Item = (&'a str, &'a R)>,
  ) -> Result<()> {
    if self.contains(def.name()) {
      return Err(Error::DuplicateIndex {
        table: self.table.clone(),
        index: def.name().to_owned(),
      });
    }

    let mut keys = BTreeMap::new();
    for (uid, record) in live {
      let key = def.key_of(record);
      if keys.contains_key(&key) {
        return Err(def.duplicate(&key));
      }
      keys.insert(key, uid.to_owned());
    }

    self.indexes.insert(def.name().to_owned(), (def, keys));
    Ok(())
  }

  /// Fail with [`Error::DuplicateKey`] if any index already holds the key of
  /// `record` for an item other than `uid`.
  pub fn check(&self, uid: &str, record: &R) -> Result<()> {
    for (def, keys) in self.indexes.values() {
      let key = def.key_of(record);
      match keys.get(&key) {
        Some(owner) if owner != uid => return Err(def.duplicate(&key)),
        _ => {}
      }
    }
    Ok(())
  }

  /// Move `uid` from the keys of `old` to the keys of `new`. Call only after
  /// [`KeyIndexes::check`] succeeded and the change was persisted.
  pub fn apply(&mut self, uid: &str, old: Option<&R>, new: Option<&R>) {
    for (def, keys) in self.indexes.values_mut() {
      if let Some(old) = old {
        let key = def.key_of(old);
        if keys.get(&key).is_some_and(|owner| owner == uid) {
          keys.remove(&key);
        }
      }
      if let Some(new) = new {
        keys.insert(def.key_of(new), uid.to_owned());
      }
    }
  }

  /// The uid holding `key` in index `name`.
  pub fn lookup(&self, name: &str, key: &Key) -> Result<Option<String>> {
    let Some((def, keys)) = self.indexes.get(name) else {
      return Err(Error::UnknownIndex { table: self.table.clone(), index: name.to_owned() });
    };
    Ok(keys.get(&def.key_from(key)?).cloned())
  }

  /// Forget every key; declarations are kept.
  pub fn clear(&mut self) {
    for (_, keys) in self.indexes.values_mut() {
      keys.clear();
    }
  }
}
