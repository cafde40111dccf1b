//! SQL for one item table.
//!
//! Every accepted mutation appends a row to `tbl_<name>`; nothing is updated
//! in place. The `live_<name>` view selects the newest row per uid unless it
//! is a tombstone, under the nid of the item's first row.

use itemstore_core::{FieldKind, Record, Schema};

/// Statements run once per connection.
pub const PRAGMAS: &str = "
PRAGMA journal_mode = WAL;
";

/// Header columns, in the order every `SELECT` here returns them.
pub const HEADER_COLUMNS: [&str; 5] = ["nid", "uid", "revNr", "revTs", "deleted"];

fn column_type(kind: FieldKind) -> &'static str {
  match kind {
    FieldKind::Text => "TEXT",
    FieldKind::Integer => "INTEGER",
    FieldKind::Decimal => "REAL",
    FieldKind::Timestamp => "TEXT",
  }
}

/// Whether a field name would shadow a header column. SQLite compares
/// identifiers without regard to ASCII case.
pub fn is_reserved(field: &str) -> bool {
  HEADER_COLUMNS.iter().any(|c| c.eq_ignore_ascii_case(field))
}

/// The statements for one table, built once when it is opened.
#[derive(Debug, Clone)]
pub struct TableSql {
  pub data:    String,
  pub live:    String,
  pub ddl:     String,
  pub current: String,
  pub all:     String,
  pub count:   String,
  pub insert:  String,
  pub purge:   String,
  columns:     String,
  fields:      Vec<&'static str>,
}

impl TableSql {
  pub fn new<R: Record>(table: &str, schema: &Schema<R>) -> Self {
    let data = format!("tbl_{table}");
    let live = format!("live_{table}");
    let fields = schema.field_names();
    let columns = fields.iter().map(|f| format!(", \"{f}\"")).collect::<String>();

    let definitions = schema
      .fields()
      .iter()
      .map(|f| format!("    \"{}\" {},\n", f.name(), column_type(f.kind())))
      .collect::<String>();
    let view_columns = fields.iter().map(|f| format!(", t.\"{f}\" AS \"{f}\"")).collect::<String>();

    let ddl = format!(
      "
CREATE TABLE IF NOT EXISTS \"{data}\" (
    nid     INTEGER PRIMARY KEY AUTOINCREMENT,
    uid     CHAR(36) NOT NULL,
    revNr   INTEGER NOT NULL,
    revTs   CHAR(18) NOT NULL,
    deleted INTEGER NOT NULL DEFAULT 0,
{definitions}    UNIQUE (uid, revNr)
);

CREATE INDEX IF NOT EXISTS \"{data}_uid\" ON \"{data}\" (uid);

CREATE VIEW IF NOT EXISTS \"{live}\" AS
SELECT h.nid AS nid, t.uid AS uid, t.revNr AS revNr, t.revTs AS revTs{view_columns}
  FROM \"{data}\" t
  JOIN (SELECT uid, MIN(nid) AS nid, MAX(revNr) AS revNr FROM \"{data}\" GROUP BY uid) h
    ON t.uid = h.uid AND t.revNr = h.revNr
 WHERE t.deleted = 0;
"
    );

    let current = format!(
      "SELECT (SELECT MIN(nid) FROM \"{data}\" WHERE uid = ?1), uid, revNr, revTs, deleted{columns}
         FROM \"{data}\" WHERE uid = ?1 ORDER BY revNr DESC LIMIT 1"
    );
    let all = format!("SELECT nid, uid, revNr, revTs, 0{columns} FROM \"{live}\"");
    let count = format!("SELECT COUNT(*) FROM \"{live}\"");

    let placeholders = (5..5 + fields.len()).map(|i| format!(", ?{i}")).collect::<String>();
    let insert = format!(
      "INSERT INTO \"{data}\" (uid, revNr, revTs, deleted{columns}) VALUES (?1, ?2, ?3, ?4{placeholders})"
    );
    let purge = format!("DELETE FROM \"{data}\"");

    Self { data, live, ddl, current, all, count, insert, purge, columns, fields }
  }

  /// Stored columns, header first, as `PRAGMA table_info` lists them.
  pub fn expected_columns(&self) -> Vec<String> {
    HEADER_COLUMNS.iter().chain(&self.fields).map(|c| (*c).to_owned()).collect()
  }

  fn conditions(fields: &[&str]) -> String {
    fields
      .iter()
      .enumerate()
      .map(|(i, f)| format!("\"{f}\" = ?{}", i + 1))
      .collect::<Vec<_>>()
      .join(" AND ")
  }

  /// The live item whose `fields` equal `?1..?n`.
  pub fn find_by(&self, fields: &[&str]) -> String {
    format!(
      "SELECT nid, uid, revNr, revTs, 0{} FROM \"{}\" WHERE {} LIMIT 1",
      self.columns,
      self.live,
      Self::conditions(fields)
    )
  }

  /// A live item other than `?{n+1}` whose `fields` equal `?1..?n`.
  pub fn key_owner(&self, fields: &[&str]) -> String {
    format!(
      "SELECT uid FROM \"{}\" WHERE {} AND uid <> ?{} LIMIT 1",
      self.live,
      Self::conditions(fields),
      fields.len() + 1
    )
  }

  pub fn create_index(&self, name: &str, fields: &[&str]) -> String {
    let columns = fields.iter().map(|f| format!("\"{f}\"")).collect::<Vec<_>>().join(", ");
    format!(
      "CREATE INDEX IF NOT EXISTS \"{}_{name}\" ON \"{}\" ({columns})",
      self.data, self.data
    )
  }
}

#[cfg(test)]
mod tests {
  use itemstore_core::testing::{Person, Reading};

  use super::*;

  #[test]
  fn field_columns_follow_the_schema() {
    let sql = TableSql::new("readings", &Schema::<Reading>::of().unwrap());
    assert!(sql.ddl.contains("\"seq\" INTEGER,"));
    assert!(sql.ddl.contains("\"value\" REAL,"));
    assert!(sql.ddl.contains("\"at\" TEXT,"));
    assert_eq!(
      sql.expected_columns(),
      ["nid", "uid", "revNr", "revTs", "deleted", "sensor", "seq", "value", "at"]
    );
    assert!(sql.insert.ends_with("VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"));
  }

  #[test]
  fn key_queries_bind_in_declaration_order() {
    let sql = TableSql::new("persons", &Schema::<Person>::of().unwrap());
    let q = sql.key_owner(&["name", "surname"]);
    assert!(q.contains("\"name\" = ?1 AND \"surname\" = ?2 AND uid <> ?3"));
    assert_eq!(
      sql.create_index("unique", &["name", "surname"]),
      "CREATE INDEX IF NOT EXISTS \"tbl_persons_unique\" ON \"tbl_persons\" (\"name\", \"surname\")"
    );
  }

  #[test]
  fn header_names_are_reserved_in_any_case() {
    assert!(is_reserved("uid"));
    assert!(is_reserved("REVNR"));
    assert!(!is_reserved("name"));
  }

  #[test]
  fn ddl_is_accepted_by_sqlite() {
    let conn = rusqlite::Connection::open_in_memory().unwrap();
    let sql = TableSql::new("readings", &Schema::<Reading>::of().unwrap());
    conn.execute_batch(&sql.ddl).unwrap();
    conn.execute_batch(&sql.ddl).unwrap();
    let n: i64 = conn.query_row(&sql.count, [], |r| r.get(0)).unwrap();
    assert_eq!(n, 0);
  }
}
