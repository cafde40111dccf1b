//! Revisions: the (number, timestamp) pair identifying one version of an
//! item.

use chrono::{DateTime, SubsecRound as _, Utc};
use serde::{Deserialize, Serialize};

/// One version of an item. Numbers start at 1 and grow by exactly 1 per
/// accepted mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Revision {
  nr: u32,
  ts: DateTime<Utc>,
}

impl Revision {
  pub fn new(nr: u32, ts: DateTime<Utc>) -> Self { Self { nr, ts } }

  /// Revision 1, stamped now.
  pub fn first() -> Self { Self::new(1, Utc::now()) }

  /// The successor revision, stamped now.
  pub fn next(&self) -> Self { Self::new(self.nr + 1, Utc::now()) }

  pub fn nr(&self) -> u32 { self.nr }

  pub fn timestamp(&self) -> DateTime<Utc> { self.ts }

  /// Drop sub-second precision beyond `digits` so the value survives a
  /// round-trip through a coarser textual format.
  pub fn truncated(self, digits: u16) -> Self {
    Self { nr: self.nr, ts: self.ts.trunc_subsecs(digits) }
  }
}

#[cfg(test)]
mod tests {
  use chrono::{TimeZone as _, Timelike as _};

  use super::*;

  #[test]
  fn next_increments_by_one() {
    let first = Revision::first();
    assert_eq!(first.nr(), 1);
    let second = first.next();
    assert_eq!(second.nr(), 2);
    assert!(second.timestamp() >= first.timestamp());
  }

  #[test]
  fn truncated_keeps_number_and_drops_precision() {
    let ts = Utc
      .with_ymd_and_hms(2024, 5, 6, 7, 8, 9)
      .unwrap()
      .with_nanosecond(123_456_789)
      .unwrap();
    let rev = Revision::new(4, ts);
    assert_eq!(rev.truncated(3).timestamp().nanosecond(), 123_000_000);
    assert_eq!(rev.truncated(0).timestamp().nanosecond(), 0);
    assert_eq!(rev.truncated(0).nr(), 4);
  }
}
