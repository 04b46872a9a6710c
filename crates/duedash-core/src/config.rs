//! `duedashrc` loading: built-in defaults,
//! one rc file with nested `include`s, then
//! `rc.KEY=VALUE` overrides from argv.

use std::collections::BTreeMap;
use std::fs;
use std::path::{
  Path,
  PathBuf
};

use anyhow::{
  Context,
  anyhow,
  bail
};
use tracing::{
  debug,
  info,
  trace,
  warn
};

const RC_ENV_VAR: &str = "DUEDASHRC";
const RC_FILE_NAME: &str = ".duedashrc";
const DATA_DIR_NAME: &str = ".duedash";
const DISABLED_RC: &str = "/dev/null";

const DEFAULTS: [(&str, &str); 5] = [
  ("data.location", "~/.duedash"),
  ("default.command", "dashboard"),
  ("color", "on"),
  ("list.per_page", "20"),
  ("analytics.period", "week")
];

#[derive(Debug, Clone)]
pub struct Config {
  values:           BTreeMap<String, String>,
  pub loaded_files: Vec<PathBuf>
}

impl Default for Config {
  fn default() -> Self {
    Config {
      values:       DEFAULTS
        .iter()
        .map(|(k, v)| {
          (k.to_string(), v.to_string())
        })
        .collect(),
      loaded_files: Vec::new()
    }
  }
}

/// One meaningful line of an rc file.
#[derive(Debug, PartialEq, Eq)]
enum RcLine<'a> {
  Include(&'a str),
  Setting(&'a str, &'a str)
}

fn parse_rc_line(
  raw: &str
) -> Option<Result<RcLine<'_>, ()>> {
  let content = raw
    .split('#')
    .next()
    .unwrap_or_default()
    .trim();
  if content.is_empty() {
    return None;
  }

  if let Some(target) =
    content.strip_prefix("include ")
  {
    return Some(Ok(RcLine::Include(
      target.trim()
    )));
  }

  Some(
    content
      .split_once('=')
      .map(|(k, v)| {
        RcLine::Setting(k.trim(), v.trim())
      })
      .ok_or(())
  )
}

impl Config {
  /// Defaults merged with the rc file, if
  /// one is found.
  #[tracing::instrument(skip_all)]
  pub fn load(
    rc_override: Option<&Path>
  ) -> anyhow::Result<Self> {
    let mut cfg = Config::default();

    match locate_rc(rc_override) {
      | Some(path) => {
        info!(rc = %path.display(), "reading duedashrc");
        cfg.read_rc(&path)?;
      }
      | None => {
        debug!("running on built-in defaults")
      }
    }

    Ok(cfg)
  }

  pub fn apply_overrides<I>(
    &mut self,
    overrides: I
  ) where
    I: IntoIterator<
      Item = (String, String)
    >
  {
    for (raw_key, value) in overrides {
      let key = match raw_key
        .strip_prefix("rc.")
      {
        | Some(stripped) => {
          stripped.to_string()
        }
        | None => raw_key
      };
      debug!(%key, %value, "config override");
      self.values.insert(key, value);
    }
  }

  pub fn get(
    &self,
    key: &str
  ) -> Option<&str> {
    self.values.get(key).map(String::as_str)
  }

  pub fn get_bool(
    &self,
    key: &str
  ) -> Option<bool> {
    self.get(key).map(is_truthy)
  }

  pub fn get_usize(
    &self,
    key: &str
  ) -> anyhow::Result<Option<usize>> {
    let Some(raw) = self.get(key) else {
      return Ok(None);
    };
    raw
      .trim()
      .parse::<usize>()
      .map(Some)
      .with_context(|| {
        format!(
          "{key} must be a whole number, \
           found {raw:?}"
        )
      })
  }

  /// Entries in key order.
  pub fn iter(
    &self
  ) -> impl Iterator<Item = (&str, &str)>
  {
    self
      .values
      .iter()
      .map(|(k, v)| (k.as_str(), v.as_str()))
  }

  fn read_rc(
    &mut self,
    file: &Path
  ) -> anyhow::Result<()> {
    let file = expand_home(file);
    if self.loaded_files.contains(&file) {
      bail!(
        "rc file included twice: {}",
        file.display()
      );
    }

    let text = fs::read_to_string(&file)
      .with_context(|| {
        format!(
          "cannot read rc file {}",
          file.display()
        )
      })?;
    self.loaded_files.push(file.clone());

    let dir = file
      .parent()
      .unwrap_or_else(|| Path::new("."))
      .to_path_buf();

    for (idx, raw) in text.lines().enumerate()
    {
      match parse_rc_line(raw) {
        | None => {}
        | Some(Ok(RcLine::Include(target))) => {
          let nested =
            include_target(&dir, target)?;
          if nested.exists() {
            debug!(
              from = %file.display(),
              line = idx + 1,
              nested = %nested.display(),
              "following include"
            );
            self.read_rc(&nested)?;
          } else {
            warn!(nested = %nested.display(), "included rc file is missing, ignoring");
          }
        }
        | Some(Ok(RcLine::Setting(
          key,
          value
        ))) => {
          trace!(key, value, "rc setting");
          self.values.insert(
            key.to_string(),
            value.to_string()
          );
        }
        | Some(Err(())) => {
          bail!(
            "{}:{}: expected KEY = VALUE, \
             found {raw:?}",
            file.display(),
            idx + 1
          );
        }
      }
    }

    Ok(())
  }
}

/// Directory holding `tasks.data`: the
/// `--data` flag, else `data.location`,
/// else `~/.duedash`. Created on demand.
pub fn resolve_data_dir(
  cfg: &Config,
  override_dir: Option<&Path>
) -> anyhow::Result<PathBuf> {
  let dir = match (
    override_dir,
    cfg.get("data.location")
  ) {
    | (Some(flag), _) => flag.to_path_buf(),
    | (None, Some(location)) => {
      expand_home(Path::new(location))
    }
    | (None, None) => dirs::home_dir()
      .map(|home| home.join(DATA_DIR_NAME))
      .ok_or_else(|| {
        anyhow!(
          "no home directory to hold \
           {DATA_DIR_NAME}"
        )
      })?
  };

  if !dir.is_dir() {
    info!(dir = %dir.display(), "creating data directory");
    fs::create_dir_all(&dir).with_context(
      || {
        format!(
          "cannot create data directory {}",
          dir.display()
        )
      }
    )?;
  }

  Ok(dir)
}

/// `--rcfile`, then `$DUEDASHRC`
/// (`/dev/null` disables), then
/// `~/.duedashrc` when present.
fn locate_rc(
  flag: Option<&Path>
) -> Option<PathBuf> {
  if let Some(path) = flag {
    return Some(path.to_path_buf());
  }

  if let Ok(from_env) =
    std::env::var(RC_ENV_VAR)
  {
    return (from_env != DISABLED_RC)
      .then(|| PathBuf::from(from_env));
  }

  match dirs::home_dir() {
    | Some(home) => {
      Some(home.join(RC_FILE_NAME))
        .filter(|candidate| {
          candidate.is_file()
        })
    }
    | None => {
      warn!("home directory unknown, no rc file read");
      None
    }
  }
}

fn include_target(
  dir: &Path,
  target: &str
) -> anyhow::Result<PathBuf> {
  if target.is_empty() {
    bail!("include needs a file name");
  }

  let expanded =
    expand_home(Path::new(target));
  Ok(if expanded.is_absolute() {
    expanded
  } else {
    dir.join(expanded)
  })
}

fn expand_home(path: &Path) -> PathBuf {
  if let Ok(rest) = path.strip_prefix("~")
    && let Some(home) = dirs::home_dir()
  {
    return home.join(rest);
  }
  path.to_path_buf()
}

fn is_truthy(raw: &str) -> bool {
  let lowered =
    raw.trim().to_ascii_lowercase();
  ["1", "y", "yes", "on", "true"]
    .contains(&lowered.as_str())
}
