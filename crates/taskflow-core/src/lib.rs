pub mod chat;
pub mod cli;
pub mod client;
pub mod commands;
pub mod config;
pub mod datetime;
pub mod filter;
pub mod form;
pub mod render;
pub mod session;
pub mod stats;
pub mod sync;

use std::ffi::OsString;
use std::io;

use anyhow::Context;
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
    cli::preprocess_args(&raw_args);
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

  let settings = cfg
    .service_settings()
    .context(
      "invalid service settings"
    )?;
  debug!(
    task_url = %settings.task_url,
    assistant_url = %settings.assistant_url,
    timeout = ?settings.timeout,
    "resolved service settings"
  );

  let service =
    client::HttpTaskService::from_settings(
      &settings
    )?;
  let assistant =
    client::HttpAssistant::from_settings(
      &settings
    )?;
  let app = commands::App::new(
    service,
    assistant,
    render::Renderer::new(&cfg)
  );

  let runtime =
    tokio::runtime::Builder::new_current_thread()
      .enable_all()
      .build()
      .context(
        "failed to start async runtime"
      )?;

  let mut out = io::stdout().lock();
  runtime.block_on(app.dispatch(
    cli.command,
    io::stdin().lock(),
    &mut out
  ))?;

  info!("done");
  Ok(())
}
