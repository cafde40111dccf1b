//! Name rules shared by tables, indexes and record fields.

use crate::{Error, Result};

/// Accept `[A-Za-z][A-Za-z0-9_]*`.
///
/// Names end up in file names and SQL identifiers, so only ASCII is allowed.
pub fn validate_identifier(name: &str) -> Result<()> {
  let invalid = |reason| Error::InvalidName { name: name.to_owned(), reason };

  let mut chars = name.chars();
  match chars.next() {
    None => return Err(invalid("empty")),
    Some(c) if !c.is_ascii_alphabetic() => {
      return Err(invalid("does not start with a letter"));
    }
    Some(_) => {}
  }
  if chars.any(|c| !(c.is_ascii_alphanumeric() || c == '_')) {
    return Err(invalid("only letters, digits and underscores are allowed"));
  }
  Ok(())
}
