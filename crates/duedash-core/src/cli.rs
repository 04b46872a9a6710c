use std::ffi::OsString;
use std::io::IsTerminal;
use std::path::PathBuf;

use anyhow::anyhow;
use clap::{ArgAction, Parser};
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

use crate::commands::{expand_command_abbrev, known_command_names};
use crate::config::Config;

#[derive(Debug, Clone)]
pub struct PreprocessedArgs {
    pub cleaned_args: Vec<OsString>,
    pub rc_overrides: Vec<(String, String)>,
}

/// `--rc KEY=VALUE` argument.
#[derive(Debug, Clone)]
pub struct KeyVal {
    pub key: String,
    pub value: String,
}

impl std::str::FromStr for KeyVal {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('=') {
            Some((key, value)) if !key.trim().is_empty() => Ok(Self {
                key: key.trim().to_string(),
                value: value.trim().to_string(),
            }),
            _ => Err(anyhow!("--rc expects KEY=VALUE, got {s:?}")),
        }
    }
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "duedash",
    version,
    about = "duedash: a terminal to-do dashboard",
    disable_help_subcommand = true,
    arg_required_else_help = false
)]
pub struct GlobalCli {
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    pub verbose: u8,

    #[arg(short = 'q', long = "quiet", action = ArgAction::Count)]
    pub quiet: u8,

    #[arg(
        long = "rc",
        value_parser = clap::builder::ValueParser::new(|s: &str| s.parse::<KeyVal>()),
        action = ArgAction::Append
    )]
    pub rc_overrides: Vec<KeyVal>,

    #[arg(long = "rcfile")]
    pub rcfile: Option<PathBuf>,

    #[arg(long = "data")]
    pub data: Option<PathBuf>,

    /// Reference day for calendars and summaries (YYYY-MM-DD).
    #[arg(long = "today")]
    pub today: Option<String>,

    /// Print command output as JSON.
    #[arg(long = "json")]
    pub json: bool,

    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub rest: Vec<OsString>,
}

fn default_log_level(verbose: u8, quiet: u8) -> &'static str {
    match (quiet, verbose) {
        (2.., _) => "error",
        (1, _) | (0, 0) => "warn",
        (0, 1) => "info",
        (0, 2) => "debug",
        (0, _) => "trace",
    }
}

/// Logs go to stderr so command output on stdout stays machine readable.
pub fn init_tracing(verbose: u8, quiet: u8) -> anyhow::Result<()> {
    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(default_log_level(verbose, quiet))
            .map_err(|e| anyhow!("invalid log filter: {e}"))?,
    };

    let stderr_is_tty = std::io::stderr().is_terminal();
    if let Err(err) = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_ansi(stderr_is_tty)
        .try_init()
    {
        debug!(error = %err, "global subscriber already installed");
    }

    Ok(())
}

fn split_rc_override(arg: &str) -> Option<(String, String)> {
    let body = arg.strip_prefix("rc.")?;
    let at = body.find(['=', ':'])?;
    let (key, value) = (&body[..at], &body[at + 1..]);
    (!key.is_empty()).then(|| (format!("rc.{key}"), value.to_string()))
}

/// Pulls positional `rc.KEY=VALUE` / `rc.KEY:VALUE` overrides out of argv.
#[tracing::instrument(skip_all)]
pub fn preprocess_args(raw: &[OsString]) -> anyhow::Result<PreprocessedArgs> {
    let mut pre = PreprocessedArgs {
        cleaned_args: Vec::with_capacity(raw.len()),
        rc_overrides: Vec::new(),
    };

    for (idx, arg) in raw.iter().enumerate() {
        let parsed = (idx > 0)
            .then(|| arg.to_str().and_then(split_rc_override))
            .flatten();
        match parsed {
            Some((key, value)) => {
                debug!(%key, %value, "positional rc override");
                pre.rc_overrides.push((key, value));
            }
            None => pre.cleaned_args.push(arg.clone()),
        }
    }

    Ok(pre)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub filter_terms: Vec<String>,
    pub command: String,
    pub command_args: Vec<String>,
}

impl Invocation {
    /// Terms before the first command word filter, terms after it are the
    /// command's arguments.
    #[tracing::instrument(skip(cfg, rest))]
    pub fn parse(cfg: &Config, rest: Vec<OsString>) -> anyhow::Result<Self> {
        let tokens: Vec<String> = rest
            .into_iter()
            .map(|arg| arg.to_string_lossy().to_string())
            .collect();

        let default_command = cfg
            .get("default.command")
            .unwrap_or("dashboard")
            .to_string();

        if tokens.is_empty() {
            debug!(command = %default_command, "no explicit command, using default");
            return Ok(Self {
                filter_terms: vec![],
                command: default_command,
                command_args: vec![],
            });
        }

        let known = known_command_names();
        for (i, token) in tokens.iter().enumerate() {
            if let Some(full) = expand_command_abbrev(token, &known) {
                debug!(
                    token = %token,
                    expanded = %full,
                    split_index = i,
                    "resolved command token"
                );
                return Ok(Self {
                    filter_terms: tokens[..i].to_vec(),
                    command: full.to_string(),
                    command_args: tokens[i + 1..].to_vec(),
                });
            }
        }

        warn!("no command detected, treated all terms as list filter");
        Ok(Self {
            filter_terms: tokens,
            command: "list".to_string(),
            command_args: vec![],
        })
    }
}

#[cfg(test)]
mod tests {
    use std::ffi::OsString;

    use super::*;

    fn os(args: &[&str]) -> Vec<OsString> {
        args.iter().map(OsString::from).collect()
    }

    #[test]
    fn extracts_positional_rc_overrides() {
        let pre = preprocess_args(&os(&["duedash", "rc.color=off", "calendar", "rc.list.per_page:5"]))
            .expect("preprocess");
        assert_eq!(pre.cleaned_args, os(&["duedash", "calendar"]));
        assert_eq!(
            pre.rc_overrides,
            vec![
                ("rc.color".to_string(), "off".to_string()),
                ("rc.list.per_page".to_string(), "5".to_string()),
            ]
        );
    }

    #[test]
    fn log_level_follows_flag_counts() {
        assert_eq!(default_log_level(0, 0), "warn");
        assert_eq!(default_log_level(1, 0), "info");
        assert_eq!(default_log_level(3, 0), "trace");
        assert_eq!(default_log_level(3, 1), "warn");
        assert_eq!(default_log_level(0, 2), "error");
    }

    #[test]
    fn rc_key_val_requires_key() {
        let kv: KeyVal = "color = off".parse().expect("key val");
        assert_eq!((kv.key.as_str(), kv.value.as_str()), ("color", "off"));
        assert!("=off".parse::<KeyVal>().is_err());
        assert!("color".parse::<KeyVal>().is_err());
    }

    #[test]
    fn splits_filters_from_command() {
        let cfg = Config::default();
        let inv = Invocation::parse(&cfg, os(&["status:pending", "+work", "li", "extra"]))
            .expect("parse invocation");
        assert_eq!(inv.filter_terms, vec!["status:pending", "+work"]);
        assert_eq!(inv.command, "list");
        assert_eq!(inv.command_args, vec!["extra"]);
    }

    #[test]
    fn empty_invocation_uses_default_command() {
        let cfg = Config::default();
        let inv = Invocation::parse(&cfg, vec![]).expect("parse invocation");
        assert_eq!(inv.command, "dashboard");
    }

    #[test]
    fn bare_terms_fall_back_to_list() {
        let cfg = Config::default();
        let inv = Invocation::parse(&cfg, os(&["status:completed"])).expect("parse invocation");
        assert_eq!(inv.command, "list");
        assert_eq!(inv.filter_terms, vec!["status:completed"]);
    }

    #[test]
    fn global_flags_parse() {
        let cli = GlobalCli::parse_from(os(&[
            "duedash", "-vv", "--json", "--today", "2024-02-15", "calendar", "2", "2024",
        ]));
        assert_eq!(cli.verbose, 2);
        assert!(cli.json);
        assert_eq!(cli.today.as_deref(), Some("2024-02-15"));
        assert_eq!(cli.rest, os(&["calendar", "2", "2024"]));
    }
}
