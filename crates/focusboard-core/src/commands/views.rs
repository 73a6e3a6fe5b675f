use std::io::{
  self,
  Write
};

use anyhow::anyhow;
use chrono::Utc;
use tracing::{
  debug,
  info,
  instrument
};

use super::App;
use crate::error::RepoError;
use crate::fetch::QueryKey;
use crate::filter::FilterMode;
use crate::keyboard::{
  KeyInput,
  handle_key
};
use crate::palette;

#[instrument(skip(app))]
pub(super) fn cmd_list(
  app: &mut App,
  filter: FilterMode,
  search: Option<String>,
  select: Option<String>
) -> anyhow::Result<()> {
  info!("command list");
  app.store.set_filter(filter);
  if let Some(query) = search {
    app.store.set_search_query(query);
  }
  if select.is_some() {
    app
      .store
      .set_selected_task_id(select.as_deref());
  }

  let visible = app.store.filtered_tasks();
  let mut out = io::stdout().lock();
  app.renderer.write_task_table(
    &mut out,
    &visible,
    app.store.selected_task_id(),
    Utc::now()
  )?;
  writeln!(
    out,
    "\n{} of {} task(s), {} data",
    visible.len(),
    app.store.tasks().len(),
    app.fetcher.backend()
  )?;
  Ok(())
}

#[instrument(skip(app))]
pub(super) async fn cmd_show(
  app: &mut App,
  id: &str
) -> anyhow::Result<()> {
  info!("command show");
  let task = match app.store.task(id) {
    | Some(task) => task.clone(),
    | None => {
      app
        .fetcher
        .query(
          &app.store,
          QueryKey::One(id.to_string())
        )
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| {
          RepoError::NotFound(
            id.to_string()
          )
        })?
    }
  };

  let mut out = io::stdout().lock();
  app.renderer.write_task_detail(
    &mut out,
    &task,
    Utc::now()
  )
}

#[instrument(skip(app))]
pub(super) async fn cmd_query(
  app: &mut App,
  key: QueryKey
) -> anyhow::Result<()> {
  info!("command query");
  let tasks = app
    .fetcher
    .query(&app.store, key)
    .await?;
  debug!(
    count = tasks.len(),
    "query returned"
  );

  let refs: Vec<_> = tasks.iter().collect();
  let mut out = io::stdout().lock();
  app.renderer.write_task_table(
    &mut out,
    &refs,
    None,
    Utc::now()
  )
}

#[instrument(skip(app))]
pub(super) fn cmd_stats(
  app: &mut App
) -> anyhow::Result<()> {
  info!("command stats");
  let mut out = io::stdout().lock();
  app.renderer.write_stats(
    &mut out,
    &app.store.stats(),
    &app.store.tag_counts()
  )
}

#[instrument(skip(app))]
pub(super) fn cmd_palette(
  app: &mut App,
  query: Option<&str>,
  run: Option<&str>
) -> anyhow::Result<()> {
  info!("command palette");
  let mut out = io::stdout().lock();

  let Some(value) = run else {
    let entries = palette::entries(
      &app.store,
      query.unwrap_or_default()
    );
    return app
      .renderer
      .write_palette(&mut out, &entries);
  };

  app.store.set_command_open(true);
  palette::execute(&mut app.store, value)?;
  app.renderer.write_state(&mut out, &app.store)
}

/// Replays chords through the keyboard
/// dispatcher, one line per chord, then
/// prints the resulting state.
#[instrument(skip(app, chords))]
pub(super) fn cmd_keys(
  app: &mut App,
  chords: &[String],
  select: Option<String>
) -> anyhow::Result<()> {
  info!(
    count = chords.len(),
    "command keys"
  );
  if select.is_some() {
    app
      .store
      .set_selected_task_id(select.as_deref());
  }

  let inputs = chords
    .iter()
    .map(|chord| {
      chord.parse::<KeyInput>().map_err(
        |err| {
          anyhow!(
            "invalid chord {chord:?}: {err}"
          )
        }
      )
    })
    .collect::<anyhow::Result<Vec<_>>>()?;

  let mut out = io::stdout().lock();
  for input in &inputs {
    let result =
      handle_key(&mut app.store, input);
    let action = result
      .action
      .as_ref()
      .map(|a| format!("{a:?}"))
      .unwrap_or_else(|| "-".to_string());
    let prevented = if result.prevent_default
    {
      " (default prevented)"
    } else {
      ""
    };
    writeln!(
      out,
      "{:<14} {action}{prevented}",
      input.to_string()
    )?;
  }
  writeln!(out)?;
  app.renderer.write_state(&mut out, &app.store)
}
