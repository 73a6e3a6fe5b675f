pub mod api;
pub mod cli;
pub mod commands;
pub mod config;
pub mod datetime;
pub mod error;
pub mod events;
pub mod fetch;
pub mod filter;
pub mod keyboard;
pub mod memory;
pub mod palette;
pub mod pomodoro;
pub mod render;
pub mod repository;
pub mod store;

use std::ffi::OsString;

pub use focusboard_shared::{
  Priority,
  SubItem,
  Task,
  TaskCreate,
  TaskPatch
};

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
    "starting focusboard"
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
  if let Some(url) = cli.api {
    cfg.set("api.url", url);
  }
  if cli.offline {
    cfg.set("fetch.offline", "on");
  }

  let command = cli
    .command
    .unwrap_or_else(commands::default_command);
  if let cli::Command::Focus {
    minutes: Some(minutes),
    ..
  } = &command
  {
    cfg.set(
      "pomodoro.minutes",
      minutes.to_string()
    );
  }

  let runtime =
    tokio::runtime::Builder::new_current_thread()
      .enable_all()
      .build()
      .context(
        "failed to start async runtime"
      )?;

  runtime.block_on(async {
    let mut app =
      commands::App::connect(cfg).await?;
    commands::dispatch(&mut app, command)
      .await
  })?;

  info!("done");
  Ok(())
}
