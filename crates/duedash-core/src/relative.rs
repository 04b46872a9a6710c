//! Coarse "time ago" labels for task
//! timestamps.

use std::fmt;

use chrono::{
  DateTime,
  Utc
};
use tracing::debug;

use crate::datetime::parse_timestamp;

pub const JUST_NOW: &str = "just now";

const SECS_PER_MINUTE: i64 = 60;
const SECS_PER_HOUR: i64 = 3_600;
const SECS_PER_DAY: i64 = 86_400;

/// Elapsed time bucketed the way labels
/// show it. Magnitudes are floored.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq,
)]
pub enum Elapsed {
  JustNow,
  Minutes(i64),
  Hours(i64),
  Days(i64)
}

impl Elapsed {
  /// Future timestamps count as
  /// `JustNow`.
  pub fn between(
    timestamp: DateTime<Utc>,
    now: DateTime<Utc>
  ) -> Self {
    Self::from_seconds(
      now
        .signed_duration_since(timestamp)
        .num_seconds()
    )
  }

  pub fn from_seconds(
    elapsed: i64
  ) -> Self {
    if elapsed < SECS_PER_MINUTE {
      Elapsed::JustNow
    } else if elapsed < SECS_PER_HOUR {
      Elapsed::Minutes(
        elapsed / SECS_PER_MINUTE
      )
    } else if elapsed < SECS_PER_DAY {
      Elapsed::Hours(
        elapsed / SECS_PER_HOUR
      )
    } else {
      Elapsed::Days(elapsed / SECS_PER_DAY)
    }
  }
}

impl fmt::Display for Elapsed {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>
  ) -> fmt::Result {
    match self {
      | Elapsed::JustNow => {
        f.write_str(JUST_NOW)
      }
      | Elapsed::Minutes(n) => {
        write!(f, "{n} min ago")
      }
      | Elapsed::Hours(n) => {
        write!(f, "{n} hr ago")
      }
      | Elapsed::Days(n) => {
        write!(f, "{n} day ago")
      }
    }
  }
}

pub fn format_relative(
  timestamp: Option<DateTime<Utc>>,
  now: DateTime<Utc>
) -> String {
  match timestamp {
    | Some(ts) => {
      Elapsed::between(ts, now)
        .to_string()
    }
    | None => JUST_NOW.to_string()
  }
}

/// Like [`format_relative`] for a raw
/// stored value; unreadable input reads
/// as `just now`.
pub fn format_relative_str(
  raw: Option<&str>,
  now: DateTime<Utc>
) -> String {
  let parsed = raw.and_then(|value| {
    let parsed = parse_timestamp(value);
    if parsed.is_none() {
      debug!(
        raw = value,
        "unparsable timestamp for label"
      );
    }
    parsed
  });
  format_relative(parsed, now)
}
