pub mod calendar;
pub mod cli;
pub mod commands;
pub mod config;
pub mod dashboard;
pub mod datastore;
pub mod datetime;
pub mod error;
pub mod filter;
pub mod relative;
pub mod render;
pub mod task;

use std::ffi::OsString;

use anyhow::Context;
use chrono::Utc;
use clap::Parser;
use tracing::{
  debug,
  info
};

#[tracing::instrument(skip_all)]
pub fn run(
  raw_args: Vec<OsString>
) -> anyhow::Result<()> {
  let pre =
    cli::preprocess_args(&raw_args)?;
  let cli = cli::GlobalCli::parse_from(
    pre.cleaned_args
  );

  cli::init_tracing(
    cli.verbose,
    cli.quiet
  )?;

  info!(
    verbose = cli.verbose,
    quiet = cli.quiet,
    "starting duedash"
  );
  debug!(?pre.rc_overrides, "preprocessed rc overrides");

  let mut cfg = config::Config::load(
    cli.rcfile.as_deref()
  )?;
  cfg.apply_overrides(
    pre.rc_overrides.into_iter().chain(
      cli
        .rc_overrides
        .into_iter()
        .map(|kv| (kv.key, kv.value))
    )
  );

  let tz = datetime::resolve_timezone(
    cfg.get("timezone")
  );
  let mut clock =
    datetime::Clock::new(Utc::now(), tz);
  if let Some(raw) = cli.today.as_deref() {
    clock = clock.with_today(
      calendar::parse_calendar_date(raw)?
    );
  }
  debug!(today = %clock.today, %tz, "resolved clock");

  let data_dir =
    config::resolve_data_dir(
      &cfg,
      cli.data.as_deref()
    )
    .context(
      "failed to resolve data \
       directory"
    )?;

  let mut store =
    datastore::DataStore::open(
      &data_dir
    )
    .with_context(|| {
      format!(
        "failed to open datastore at \
         {}",
        data_dir.display()
      )
    })?;

  let renderer =
    render::Renderer::new(&cfg, cli.json)?;
  let inv = cli::Invocation::parse(
    &cfg, cli.rest
  )?;

  let stdout = std::io::stdout();
  let mut out = stdout.lock();
  commands::dispatch(
    &mut store,
    &cfg,
    &renderer,
    inv,
    &clock,
    &mut out
  )?;

  info!("done");
  Ok(())
}
