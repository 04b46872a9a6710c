use std::fs;
use std::path::{
  Path,
  PathBuf
};
use std::sync::OnceLock;

use anyhow::{
  Context,
  anyhow
};
use chrono::{
  DateTime,
  Duration,
  NaiveDate,
  NaiveDateTime,
  Utc
};
use chrono_tz::Tz;
use regex::Regex;
use serde::Deserialize;
use tracing::{
  debug,
  error,
  info,
  warn
};

const TIMEZONE_CONFIG_FILE: &str =
  "duedash-time.toml";
const TIMEZONE_ENV_VAR: &str =
  "DUEDASH_TIMEZONE";
const TIMEZONE_CONFIG_ENV_VAR: &str =
  "DUEDASH_TIME_CONFIG";

const COMPACT_UTC_FORMAT: &str =
  "%Y%m%dT%H%M%SZ";

/// Shape of `duedash-time.toml`: a top
/// level `timezone` or one under `[time]`.
#[derive(Debug, Default, Deserialize)]
struct TimeFile {
  timezone: Option<String>,
  #[serde(default)]
  time:     TimeSection
}

#[derive(Debug, Default, Deserialize)]
struct TimeSection {
  timezone: Option<String>
}

/// Reference instant for a single
/// command, resolved once up front.
#[derive(Debug, Clone, Copy)]
pub struct Clock {
  pub now:   DateTime<Utc>,
  pub today: NaiveDate,
  pub tz:    Tz
}

impl Clock {
  pub fn new(
    now: DateTime<Utc>,
    tz: Tz
  ) -> Self {
    Self {
      now,
      today: local_date(now, tz),
      tz
    }
  }

  pub fn with_today(
    mut self,
    today: NaiveDate
  ) -> Self {
    self.today = today;
    self
  }
}

#[must_use]
pub fn local_date(
  dt: DateTime<Utc>,
  tz: Tz
) -> NaiveDate {
  dt.with_timezone(&tz).date_naive()
}

/// Picks the display timezone: env var,
/// then the `timezone` config key, then
/// the TOML time file, then UTC. Unusable
/// sources are logged and skipped.
pub fn resolve_timezone(
  configured: Option<&str>
) -> Tz {
  std::env::var(TIMEZONE_ENV_VAR)
    .ok()
    .and_then(|raw| {
      named_timezone(&raw, TIMEZONE_ENV_VAR)
    })
    .or_else(|| {
      configured.and_then(|raw| {
        named_timezone(raw, "duedashrc")
      })
    })
    .or_else(|| {
      time_file_path().and_then(|path| {
        timezone_from_file(&path)
      })
    })
    .unwrap_or_else(|| {
      debug!("display timezone defaults to UTC");
      chrono_tz::UTC
    })
}

fn time_file_path() -> Option<PathBuf> {
  match std::env::var(
    TIMEZONE_CONFIG_ENV_VAR
  ) {
    | Ok(raw) if !raw.trim().is_empty() => {
      Some(PathBuf::from(raw.trim()))
    }
    | _ => std::env::current_dir()
      .ok()
      .map(|cwd| {
        cwd.join(TIMEZONE_CONFIG_FILE)
      })
  }
}

fn timezone_from_file(
  path: &Path
) -> Option<Tz> {
  if !path.is_file() {
    debug!(file = %path.display(), "no time config file");
    return None;
  }

  let parsed: TimeFile =
    fs::read_to_string(path)
      .map_err(|err| err.to_string())
      .and_then(|raw| {
        toml::from_str(&raw)
          .map_err(|err| err.to_string())
      })
      .inspect_err(|err| {
        error!(
          file = %path.display(),
          error = %err,
          "unusable time config file"
        )
      })
      .ok()?;

  let Some(name) = parsed
    .timezone
    .or(parsed.time.timezone)
  else {
    warn!(file = %path.display(), "time config file names no timezone");
    return None;
  };

  named_timezone(
    &name,
    &path.display().to_string()
  )
}

fn named_timezone(
  raw: &str,
  source: &str
) -> Option<Tz> {
  let name = raw.trim();
  if name.is_empty() {
    warn!(source, "empty timezone value ignored");
    return None;
  }

  name
    .parse::<Tz>()
    .inspect(|_| {
      info!(source, timezone = name, "display timezone selected")
    })
    .inspect_err(|err| {
      error!(
        source,
        timezone = name,
        error = %err,
        "unknown timezone id"
      )
    })
    .ok()
}

/// Reads a stored timestamp. Offsetless
/// ISO forms are taken as UTC.
pub fn parse_timestamp(
  raw: &str
) -> Option<DateTime<Utc>> {
  let token = raw.trim();
  if token.is_empty() {
    return None;
  }

  if let Ok(dt) =
    DateTime::parse_from_rfc3339(token)
  {
    return Some(dt.with_timezone(&Utc));
  }

  if let Ok(ndt) =
    NaiveDateTime::parse_from_str(
      token,
      COMPACT_UTC_FORMAT
    )
  {
    return Some(ndt.and_utc());
  }

  for fmt in [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M"
  ] {
    if let Ok(ndt) =
      NaiveDateTime::parse_from_str(
        token, fmt
      )
    {
      return Some(ndt.and_utc());
    }
  }

  None
}

fn relative_offset_pattern()
-> Option<&'static Regex> {
  static PATTERN: OnceLock<Option<Regex>> =
    OnceLock::new();
  PATTERN
    .get_or_init(|| {
      Regex::new(r"^([+-])(\d{1,9})([dw])$")
        .inspect_err(|err| {
          error!(error = %err, "offset pattern failed to compile")
        })
        .ok()
    })
    .as_ref()
}

fn offset_date(
  today: NaiveDate,
  days: i64
) -> Option<NaiveDate> {
  Duration::try_days(days).and_then(
    |delta| today.checked_add_signed(delta)
  )
}

/// Parses a calendar day: `today`,
/// `tomorrow`, `yesterday`, `+Nd`/`-Nd`,
/// `+Nw`/`-Nw` or `YYYY-MM-DD`.
#[tracing::instrument(skip(today))]
pub fn parse_date_expr(
  input: &str,
  today: NaiveDate
) -> anyhow::Result<NaiveDate> {
  let word = input.trim().to_ascii_lowercase();

  let named = match word.as_str() {
    | "today" => Some(0),
    | "tomorrow" => Some(1),
    | "yesterday" => Some(-1),
    | _ => None
  };
  if let Some(days) = named {
    return offset_date(today, days)
      .ok_or_else(|| {
        anyhow!("{word} is out of range")
      });
  }

  if let Some(caps) =
    relative_offset_pattern()
      .and_then(|re| re.captures(&word))
  {
    let amount: i64 = caps[2]
      .parse()
      .with_context(|| {
        format!("bad offset in {input:?}")
      })?;
    let per_unit =
      if &caps[3] == "w" { 7 } else { 1 };
    let sign =
      if &caps[1] == "-" { -1 } else { 1 };
    return offset_date(
      today,
      sign * amount * per_unit
    )
    .ok_or_else(|| {
      anyhow!(
        "relative date out of range: \
         {input}"
      )
    });
  }

  NaiveDate::parse_from_str(
    input.trim(),
    "%Y-%m-%d"
  )
  .with_context(|| {
    format!(
      "unrecognized date expression \
       {input:?}; expected today, \
       tomorrow, yesterday, +Nd, -Nw or \
       YYYY-MM-DD"
    )
  })
}

/// Maps a month name or abbreviation to
/// its one-based number.
pub fn parse_month_name(
  token: &str
) -> Option<u32> {
  match token
    .trim()
    .to_ascii_lowercase()
    .as_str()
  {
    | "january" | "jan" => Some(1),
    | "february" | "feb" => Some(2),
    | "march" | "mar" => Some(3),
    | "april" | "apr" => Some(4),
    | "may" => Some(5),
    | "june" | "jun" => Some(6),
    | "july" | "jul" => Some(7),
    | "august" | "aug" => Some(8),
    | "september" | "sep" | "sept" => {
      Some(9)
    }
    | "october" | "oct" => Some(10),
    | "november" | "nov" => Some(11),
    | "december" | "dec" => Some(12),
    | _ => None
  }
}

#[cfg(test)]
mod tests {
  use chrono::{
    NaiveDate,
    TimeZone,
    Utc
  };

  use super::{
    Clock,
    parse_date_expr,
    parse_month_name,
    parse_timestamp
  };

  fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 2, 17)
      .expect("valid date")
  }

  #[test]
  fn parses_relative_days() {
    let parsed =
      parse_date_expr("+3d", today())
        .expect("parse relative");
    assert_eq!(
      parsed.format("%Y-%m-%d").to_string(),
      "2026-02-20"
    );

    let parsed =
      parse_date_expr("-1w", today())
        .expect("parse relative weeks");
    assert_eq!(
      parsed.format("%Y-%m-%d").to_string(),
      "2026-02-10"
    );
  }

  #[test]
  fn parses_named_days() {
    assert_eq!(
      parse_date_expr("Tomorrow", today())
        .expect("parse tomorrow"),
      NaiveDate::from_ymd_opt(2026, 2, 18)
        .expect("valid date")
    );
    assert_eq!(
      parse_date_expr(
        "2024-02-29",
        today()
      )
      .expect("parse iso date"),
      NaiveDate::from_ymd_opt(2024, 2, 29)
        .expect("valid date")
    );
    assert!(
      parse_date_expr("someday", today())
        .is_err()
    );
  }

  #[test]
  fn parses_stored_timestamps() {
    let expected = Utc
      .with_ymd_and_hms(
        2024, 2, 15, 10, 30, 0
      )
      .single()
      .expect("valid instant");

    for raw in [
      "2024-02-15T10:30:00Z",
      "2024-02-15T11:30:00+01:00",
      "20240215T103000Z",
      "2024-02-15T10:30:00",
      "2024-02-15 10:30:00.000000",
      "2024-02-15T10:30"
    ] {
      assert_eq!(
        parse_timestamp(raw),
        Some(expected),
        "{raw}"
      );
    }

    assert_eq!(
      parse_timestamp("not a time"),
      None
    );
    assert_eq!(parse_timestamp("  "), None);
  }

  #[test]
  fn clock_uses_local_date() {
    let now = Utc
      .with_ymd_and_hms(
        2026, 2, 17, 23, 30, 0
      )
      .single()
      .expect("valid now");
    let tz: chrono_tz::Tz = "Asia/Tokyo"
      .parse()
      .expect("known timezone");
    let clock = Clock::new(now, tz);
    assert_eq!(
      clock.today,
      NaiveDate::from_ymd_opt(2026, 2, 18)
        .expect("valid date")
    );
  }

  #[test]
  fn month_names_are_case_insensitive() {
    assert_eq!(
      parse_month_name("Feb"),
      Some(2)
    );
    assert_eq!(
      parse_month_name("SEPTEMBER"),
      Some(9)
    );
    assert_eq!(parse_month_name("13"), None);
  }
}

/// Writes RFC 3339 UTC, reads anything
/// [`parse_timestamp`] accepts.
pub mod timestamp_serde {
  use chrono::{
    DateTime,
    SecondsFormat,
    Utc
  };
  use serde::{
    Deserialize,
    Deserializer,
    Serializer
  };

  pub fn serialize<S>(
    dt: &DateTime<Utc>,
    serializer: S
  ) -> Result<S::Ok, S::Error>
  where
    S: Serializer
  {
    serializer.serialize_str(
      &dt.to_rfc3339_opts(
        SecondsFormat::Secs,
        true
      )
    )
  }

  pub fn deserialize<'de, D>(
    deserializer: D
  ) -> Result<DateTime<Utc>, D::Error>
  where
    D: Deserializer<'de>
  {
    let raw = String::deserialize(
      deserializer
    )?;
    super::parse_timestamp(&raw)
      .ok_or_else(|| {
        serde::de::Error::custom(
          format!(
            "unrecognized timestamp: {raw}"
          )
        )
      })
  }

  pub mod option {
    use chrono::{
      DateTime,
      Utc
    };
    use serde::{
      Deserialize,
      Deserializer,
      Serializer
    };

    pub fn serialize<S>(
      dt: &Option<DateTime<Utc>>,
      serializer: S
    ) -> Result<S::Ok, S::Error>
    where
      S: Serializer
    {
      match dt {
        | Some(value) => {
          super::serialize(
            value, serializer
          )
        }
        | None => {
          serializer.serialize_none()
        }
      }
    }

    /// Unreadable values load as `None`
    /// so a bad row still lists.
    pub fn deserialize<'de, D>(
      deserializer: D
    ) -> Result<
      Option<DateTime<Utc>>,
      D::Error
    >
    where
      D: Deserializer<'de>
    {
      let opt =
        Option::<String>::deserialize(
          deserializer
        )?;
      Ok(opt.as_deref().and_then(
        crate::datetime::parse_timestamp
      ))
    }
  }
}
