pub mod cli;
pub mod commands;
pub mod config;
pub mod datetime;
pub mod filter;
pub mod notify;
pub mod render;
pub mod session;
pub mod storage;
pub mod store;
pub mod task;

use std::ffi::OsString;

use anyhow::Context;
use clap::Parser;
use tracing::{
  debug,
  info
};

use crate::datetime::Zone;
use crate::notify::TerminalSink;
use crate::session::Session;
use crate::storage::{
  DirStore,
  Persistence
};
use crate::task::Theme;

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
    "starting taskflow"
  );
  debug!(?pre.rc_overrides, "preprocessed rc overrides");

  let mut cfg = config::Config::load(
    cli.config.as_deref()
  )?;
  cfg.apply_overrides(
    pre.rc_overrides.into_iter().chain(
      cli
        .rc_overrides
        .into_iter()
        .map(|kv| (kv.key, kv.value))
    )
  );

  commands::validate_config(&cfg)?;
  let renderer =
    render::Renderer::new(&cfg)?;
  let zone = Zone::resolve(
    cfg.get("timezone").as_deref()
  )?;
  let fallback_theme = cfg
    .get_parsed::<Theme>(
      "theme.default"
    )?
    .unwrap_or_default();

  let data_dir =
    config::resolve_data_dir(
      &cfg,
      cli.data.as_deref()
    )
    .context(
      "failed to resolve data \
       directory"
    )?;

  let kv = DirStore::open(&data_dir)
    .with_context(|| {
      format!(
        "failed to open data \
         directory {}",
        data_dir.display()
      )
    })?;

  let mut session = Session::open(
    Persistence::new(kv),
    TerminalSink::new(
      renderer.color_enabled()
    ),
    fallback_theme
  );

  let inv = cli::Invocation::parse(
    &cfg, cli.rest, cli.json
  )?;

  commands::dispatch(
    &mut session,
    &cfg,
    &renderer,
    zone,
    inv
  )?;

  info!("done");
  Ok(())
}
